//! Subset operators applied to the events matching a data criterion

use octofhir_hqmf_diagnostics::{HqmfError, NodePath, Result};
use serde_json::Value as Json;
use std::fmt;
use std::str::FromStr;

use crate::structural::{NodeReader, NodeWriter};
use crate::value::{RangeType, RangeValue};

/// Subset operator codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubsetType {
    First,
    Second,
    Third,
    Fourth,
    Fifth,
    /// Most recent event
    Recent,
    Last,
    Min,
    Max,
    Sum,
    Median,
    Count,
    /// Count of events within a range
    Summary,
    DateDiff,
    TimeDiff,
}

impl SubsetType {
    pub const ALL: [SubsetType; 15] = [
        Self::First,
        Self::Second,
        Self::Third,
        Self::Fourth,
        Self::Fifth,
        Self::Recent,
        Self::Last,
        Self::Min,
        Self::Max,
        Self::Sum,
        Self::Median,
        Self::Count,
        Self::Summary,
        Self::DateDiff,
        Self::TimeDiff,
    ];

    pub const fn code(&self) -> &'static str {
        match self {
            Self::First => "FIRST",
            Self::Second => "SECOND",
            Self::Third => "THIRD",
            Self::Fourth => "FOURTH",
            Self::Fifth => "FIFTH",
            Self::Recent => "RECENT",
            Self::Last => "LAST",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Sum => "SUM",
            Self::Median => "MEDIAN",
            Self::Count => "COUNT",
            Self::Summary => "SUMMARY",
            Self::DateDiff => "DATEDIFF",
            Self::TimeDiff => "TIMEDIFF",
        }
    }
}

impl FromStr for SubsetType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|subset| subset.code() == s)
            .ok_or_else(|| format!("unknown subset operator '{}'", s))
    }
}

impl fmt::Display for SubsetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A post-filter over the events matching a criterion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsetOperator {
    pub subset_type: SubsetType,
    /// Bound of the operator, e.g. the count range of `SUMMARY`
    pub value: Option<RangeValue>,
}

impl SubsetOperator {
    pub fn new(subset_type: SubsetType) -> Self {
        Self {
            subset_type,
            value: None,
        }
    }

    pub fn with_value(mut self, value: RangeValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn from_structural(node: &Json, path: NodePath) -> Result<Self> {
        let reader = NodeReader::new(node, path)?;
        let subset_type = reader
            .req_str("type")?
            .parse::<SubsetType>()
            .map_err(|message| HqmfError::malformed(message, reader.path().key("type")))?;
        let value = reader
            .opt_node("value")
            .map(|(node, path)| RangeValue::from_structural(node, path, RangeType::PhysicalQuantity))
            .transpose()?;

        Ok(Self { subset_type, value })
    }

    pub fn to_structural(&self) -> Json {
        NodeWriter::new()
            .str("type", self.subset_type.code())
            .opt_node("value", self.value.as_ref().map(RangeValue::to_structural))
            .finish()
    }
}
