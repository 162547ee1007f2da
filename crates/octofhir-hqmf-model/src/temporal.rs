//! Temporal references between data criteria

use octofhir_hqmf_diagnostics::{HqmfError, NodePath, Result};
use serde_json::Value as Json;
use std::fmt;
use std::str::FromStr;

use crate::structural::{NodeReader, NodeWriter};
use crate::value::{RangeType, RangeValue};

/// A non-owning reference to another entity of the same document, by id
///
/// Resolution is lazy: see [`crate::DocumentModel::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub id: String,
}

impl Reference {
    /// Reserved id that names the document's measure period
    pub const MEASURE_PERIOD: &'static str = "MeasurePeriod";

    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Check if this reference targets the measure period
    pub fn is_measure_period(&self) -> bool {
        self.id == Self::MEASURE_PERIOD
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Temporal relationship codes
///
/// The first letter names the boundary of this criterion (Start/End), the
/// last the boundary of the referenced one; `B`/`A` read before/after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalRelation {
    /// Starts before start
    Sbs,
    /// Starts after start
    Sas,
    /// Starts before end
    Sbe,
    /// Starts after end
    Sae,
    /// Ends before start
    Ebs,
    /// Ends after start
    Eas,
    /// Ends before end
    Ebe,
    /// Ends after end
    Eae,
    /// Starts during
    Sdu,
    /// Ends during
    Edu,
    /// Ends concurrent with
    Ecw,
    /// Starts concurrent with
    Scw,
    /// Ends concurrent with start
    Ecws,
    /// Starts concurrent with end
    Scwe,
    Concurrent,
    During,
    Overlap,
}

impl TemporalRelation {
    pub const ALL: [TemporalRelation; 17] = [
        Self::Sbs,
        Self::Sas,
        Self::Sbe,
        Self::Sae,
        Self::Ebs,
        Self::Eas,
        Self::Ebe,
        Self::Eae,
        Self::Sdu,
        Self::Edu,
        Self::Ecw,
        Self::Scw,
        Self::Ecws,
        Self::Scwe,
        Self::Concurrent,
        Self::During,
        Self::Overlap,
    ];

    pub const fn code(&self) -> &'static str {
        match self {
            Self::Sbs => "SBS",
            Self::Sas => "SAS",
            Self::Sbe => "SBE",
            Self::Sae => "SAE",
            Self::Ebs => "EBS",
            Self::Eas => "EAS",
            Self::Ebe => "EBE",
            Self::Eae => "EAE",
            Self::Sdu => "SDU",
            Self::Edu => "EDU",
            Self::Ecw => "ECW",
            Self::Scw => "SCW",
            Self::Ecws => "ECWS",
            Self::Scwe => "SCWE",
            Self::Concurrent => "CONCURRENT",
            Self::During => "DURING",
            Self::Overlap => "OVERLAP",
        }
    }
}

impl FromStr for TemporalRelation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|relation| relation.code() == s)
            .ok_or_else(|| format!("unknown temporal relation '{}'", s))
    }
}

impl fmt::Display for TemporalRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A timing relationship anchoring one criterion to another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalReference {
    pub relation: TemporalRelation,
    pub reference: Reference,
    /// Offset or duration bounds of the relationship
    pub range: Option<RangeValue>,
}

impl TemporalReference {
    pub fn new(relation: TemporalRelation, reference: impl Into<String>) -> Self {
        Self {
            relation,
            reference: Reference::new(reference),
            range: None,
        }
    }

    pub fn with_range(mut self, range: RangeValue) -> Self {
        self.range = Some(range);
        self
    }

    pub fn from_structural(node: &Json, path: NodePath) -> Result<Self> {
        let reader = NodeReader::new(node, path)?;
        let relation = reader
            .req_str("type")?
            .parse::<TemporalRelation>()
            .map_err(|message| HqmfError::malformed(message, reader.path().key("type")))?;
        let range = reader
            .opt_node("range")
            .map(|(node, path)| RangeValue::from_structural(node, path, RangeType::PhysicalQuantity))
            .transpose()?;

        Ok(Self {
            relation,
            reference: Reference::new(reader.req_str("reference")?),
            range,
        })
    }

    pub fn to_structural(&self) -> Json {
        NodeWriter::new()
            .str("type", self.relation.code())
            .str("reference", self.reference.id.as_str())
            .opt_node("range", self.range.as_ref().map(RangeValue::to_structural))
            .finish()
    }
}
