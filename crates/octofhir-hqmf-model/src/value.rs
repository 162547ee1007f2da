//! Value variants
//!
//! A data criterion's `value` is one of three closed variants, selected by
//! the `type` discriminator of its structural node: `TS` (a timestamp
//! scalar), `IVL_PQ` (a range of physical quantities) or `CD` (a code).
//! The discriminator switch happens once, in [`Value::from_structural`].
//!
//! Literal values, units and derivation expressions are kept as verbatim
//! text. An expression such as `EndDate.add(new PQ(-2,"a"))` is the
//! authoritative form of a derived time point and is never re-derived.

use chrono::{NaiveDate, NaiveDateTime};
use octofhir_hqmf_diagnostics::{HqmfError, NodePath, Result};
use rust_decimal::Decimal;
use serde_json::Value as Json;

use crate::structural::{NodeReader, NodeWriter};

// ============================================================================
// Scalars
// ============================================================================

/// Type code of a scalar value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// `TS` - point in time
    Timestamp,
    /// `PQ` - number with a unit
    PhysicalQuantity,
}

impl ScalarType {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Timestamp => "TS",
            Self::PhysicalQuantity => "PQ",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "TS" => Some(Self::Timestamp),
            "PQ" => Some(Self::PhysicalQuantity),
            _ => None,
        }
    }
}

/// A single scalar, either a literal or a derived expression
///
/// Used directly as the `TS` value variant and as the low/high/width bound
/// of a [`RangeValue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampValue {
    /// `TS` or `PQ`
    pub scalar_type: ScalarType,
    /// Literal text, e.g. `20100101` or `50`
    pub value: Option<String>,
    /// Unit of a physical quantity, e.g. `a` for years
    pub unit: Option<String>,
    /// Whether the bound is closed when used inside a range
    pub inclusive: bool,
    /// Derivation expression relative to another named time point
    pub expression: Option<String>,
}

impl TimestampValue {
    /// A literal timestamp
    pub fn timestamp(value: impl Into<String>) -> Self {
        Self {
            scalar_type: ScalarType::Timestamp,
            value: Some(value.into()),
            unit: None,
            inclusive: true,
            expression: None,
        }
    }

    /// A literal physical quantity
    pub fn quantity(value: impl Into<String>, unit: Option<&str>) -> Self {
        Self {
            scalar_type: ScalarType::PhysicalQuantity,
            value: Some(value.into()),
            unit: unit.map(String::from),
            inclusive: true,
            expression: None,
        }
    }

    /// A value derived from an expression
    pub fn derived(scalar_type: ScalarType, expression: impl Into<String>) -> Self {
        Self {
            scalar_type,
            value: None,
            unit: None,
            inclusive: true,
            expression: Some(expression.into()),
        }
    }

    /// Mark the bound as open or closed
    pub fn with_inclusive(mut self, inclusive: bool) -> Self {
        self.inclusive = inclusive;
        self
    }

    /// True iff the value comes from an expression rather than a literal
    pub fn is_derived(&self) -> bool {
        self.expression.is_some()
    }

    /// Interpret the literal as a decimal number
    pub fn as_decimal(&self) -> Option<Decimal> {
        self.value.as_deref()?.parse().ok()
    }

    /// Interpret the literal as an HL7 timestamp (`YYYY[MM[DD[HH[MM[SS]]]]]`)
    ///
    /// Missing components default to the start of the period. Any timezone
    /// suffix is ignored.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        if self.scalar_type != ScalarType::Timestamp {
            return None;
        }
        let literal = self.value.as_deref()?;
        let digits: String = literal.chars().take_while(char::is_ascii_digit).collect();
        if digits.len() < 4 || digits.len() % 2 != 0 || digits.len() > 14 {
            return None;
        }
        let part = |from: usize, default: u32| -> Option<u32> {
            match digits.get(from..from + 2) {
                Some(s) => s.parse().ok(),
                None => Some(default),
            }
        };
        let year: i32 = digits.get(0..4)?.parse().ok()?;
        NaiveDate::from_ymd_opt(year, part(4, 1)?, part(6, 1)?)?
            .and_hms_opt(part(8, 0)?, part(10, 0)?, part(12, 0)?)
    }

    /// Build from a structural node; `default_type` applies when `type` is absent
    pub fn from_structural(node: &Json, path: NodePath, default_type: ScalarType) -> Result<Self> {
        let reader = NodeReader::new(node, path)?;
        let scalar_type = match reader.opt_str("type")? {
            None => default_type,
            Some(code) => ScalarType::from_code(&code).ok_or_else(|| {
                HqmfError::unsupported_value_type(code.clone(), reader.path().key("type"))
            })?,
        };
        let expression = reader.opt_str("expression")?;
        if let Some(derived) = reader.opt_bool("derived")? {
            if derived != expression.is_some() {
                return Err(HqmfError::malformed(
                    "'derived' must be true exactly when an 'expression' is present",
                    reader.path().key("derived"),
                ));
            }
        }

        Ok(Self {
            scalar_type,
            value: reader.opt_literal("value")?,
            unit: reader.opt_str("unit")?,
            inclusive: reader.opt_bool("inclusive")?.unwrap_or(true),
            expression,
        })
    }

    pub fn to_structural(&self) -> Json {
        NodeWriter::new()
            .str("type", self.scalar_type.code())
            .opt_str("value", self.value.as_deref())
            .opt_str("unit", self.unit.as_deref())
            .flag("inclusive", self.inclusive, true)
            .flag("derived", self.is_derived(), false)
            .opt_str("expression", self.expression.as_deref())
            .finish()
    }
}

// ============================================================================
// Ranges
// ============================================================================

/// Type code of a range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeType {
    /// `IVL_PQ` - interval of physical quantities
    PhysicalQuantity,
    /// `IVL_TS` - interval of timestamps
    Timestamp,
}

impl RangeType {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::PhysicalQuantity => "IVL_PQ",
            Self::Timestamp => "IVL_TS",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "IVL_PQ" => Some(Self::PhysicalQuantity),
            "IVL_TS" => Some(Self::Timestamp),
            _ => None,
        }
    }

    /// Scalar type of untyped low/high bounds
    pub const fn bound_type(&self) -> ScalarType {
        match self {
            Self::PhysicalQuantity => ScalarType::PhysicalQuantity,
            Self::Timestamp => ScalarType::Timestamp,
        }
    }
}

/// An interval with independently optional bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeValue {
    pub range_type: RangeType,
    pub low: Option<TimestampValue>,
    pub high: Option<TimestampValue>,
    /// Duration of the interval; always a physical quantity
    pub width: Option<TimestampValue>,
}

impl RangeValue {
    /// An unbounded range
    pub fn new(range_type: RangeType) -> Self {
        Self {
            range_type,
            low: None,
            high: None,
            width: None,
        }
    }

    pub fn with_low(mut self, low: TimestampValue) -> Self {
        self.low = Some(low);
        self
    }

    pub fn with_high(mut self, high: TimestampValue) -> Self {
        self.high = Some(high);
        self
    }

    pub fn with_width(mut self, width: TimestampValue) -> Self {
        self.width = Some(width);
        self
    }

    /// Build from a structural node; `default_type` applies when `type` is absent
    pub fn from_structural(node: &Json, path: NodePath, default_type: RangeType) -> Result<Self> {
        let reader = NodeReader::new(node, path)?;
        let range_type = match reader.opt_str("type")? {
            None => default_type,
            Some(code) => RangeType::from_code(&code).ok_or_else(|| {
                HqmfError::unsupported_value_type(code.clone(), reader.path().key("type"))
            })?,
        };
        let bound = |key: &str, scalar: ScalarType| -> Result<Option<TimestampValue>> {
            reader
                .opt_node(key)
                .map(|(node, path)| TimestampValue::from_structural(node, path, scalar))
                .transpose()
        };

        Ok(Self {
            range_type,
            low: bound("low", range_type.bound_type())?,
            high: bound("high", range_type.bound_type())?,
            width: bound("width", ScalarType::PhysicalQuantity)?,
        })
    }

    pub fn to_structural(&self) -> Json {
        NodeWriter::new()
            .str("type", self.range_type.code())
            .opt_node("low", self.low.as_ref().map(TimestampValue::to_structural))
            .opt_node("high", self.high.as_ref().map(TimestampValue::to_structural))
            .opt_node("width", self.width.as_ref().map(TimestampValue::to_structural))
            .finish()
    }
}

// ============================================================================
// Codes
// ============================================================================

/// A code from a code system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodedValue {
    /// Code system identifier
    pub system: String,
    pub code: String,
    pub display_name: Option<String>,
}

impl CodedValue {
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            code: code.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn from_structural(node: &Json, path: NodePath) -> Result<Self> {
        let reader = NodeReader::new(node, path)?;
        Ok(Self {
            system: reader.req_str("system")?,
            code: reader.req_str("code")?,
            display_name: reader.opt_str("display_name")?,
        })
    }

    pub fn to_structural(&self) -> Json {
        NodeWriter::new()
            .str("type", Value::CODED)
            .str("system", self.system.as_str())
            .str("code", self.code.as_str())
            .opt_str("display_name", self.display_name.as_deref())
            .finish()
    }
}

// ============================================================================
// Discriminated union
// ============================================================================

/// The value of a data criterion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Timestamp(TimestampValue),
    Range(RangeValue),
    Coded(CodedValue),
}

impl Value {
    pub const TIMESTAMP: &'static str = "TS";
    pub const RANGE: &'static str = "IVL_PQ";
    pub const CODED: &'static str = "CD";

    /// Build the variant named by the node's `type` discriminator
    pub fn from_structural(node: &Json, path: NodePath) -> Result<Self> {
        let reader = NodeReader::new(node, path)?;
        let value_type = reader.req_str("type")?;
        let path = reader.path().clone();
        match value_type.as_str() {
            Self::TIMESTAMP => {
                TimestampValue::from_structural(node, path, ScalarType::Timestamp).map(Self::Timestamp)
            }
            Self::RANGE => {
                RangeValue::from_structural(node, path, RangeType::PhysicalQuantity).map(Self::Range)
            }
            Self::CODED => CodedValue::from_structural(node, path).map(Self::Coded),
            _ => Err(HqmfError::unsupported_value_type(value_type, path.key("type"))),
        }
    }

    pub fn to_structural(&self) -> Json {
        match self {
            Self::Timestamp(v) => v.to_structural(),
            Self::Range(v) => v.to_structural(),
            Self::Coded(v) => v.to_structural(),
        }
    }

    /// Check that the payload carries the variant's own type code
    ///
    /// A `TS` value must hold a timestamp scalar and an `IVL_PQ` value a
    /// physical quantity range; anything else serializes under a
    /// discriminator that does not read back.
    pub fn validate(&self, path: &NodePath) -> Result<()> {
        let payload_code = match self {
            Self::Timestamp(v) => v.scalar_type.code(),
            Self::Range(v) => v.range_type.code(),
            Self::Coded(_) => Self::CODED,
        };
        if payload_code != self.type_code() {
            return Err(HqmfError::unsupported_value_type(payload_code, path.key("type")));
        }
        Ok(())
    }

    /// The discriminator this variant serializes with
    pub fn type_code(&self) -> &'static str {
        match self {
            Self::Timestamp(_) => Self::TIMESTAMP,
            Self::Range(_) => Self::RANGE,
            Self::Coded(_) => Self::CODED,
        }
    }

    pub fn as_timestamp(&self) -> Option<&TimestampValue> {
        match self {
            Self::Timestamp(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_range(&self) -> Option<&RangeValue> {
        match self {
            Self::Range(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_coded(&self) -> Option<&CodedValue> {
        match self {
            Self::Coded(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn parse(node: Json) -> Result<Value> {
        Value::from_structural(&node, NodePath::root().key("value"))
    }

    #[rstest]
    #[case(json!({"type": "TS", "value": "20100101"}))]
    #[case(json!({"type": "IVL_PQ", "low": {"type": "PQ", "value": "9", "unit": "%"}}))]
    #[case(json!({"type": "CD", "system": "2.16.840.1.113883.6.96", "code": "127355002"}))]
    fn test_discriminator_closure(#[case] node: Json) {
        let value = parse(node.clone()).unwrap();
        let emitted = value.to_structural();
        assert_eq!(emitted["type"], node["type"]);
        assert_eq!(parse(emitted).unwrap(), value);
    }

    #[test]
    fn test_unknown_discriminator() {
        let err = parse(json!({"type": "XYZ"})).unwrap_err();
        match err {
            HqmfError::UnsupportedValueType { value_type, path } => {
                assert_eq!(value_type, "XYZ");
                assert_eq!(path.to_string(), "$.value.type");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_timestamp_range_is_not_a_value() {
        assert!(matches!(
            parse(json!({"type": "IVL_TS"})),
            Err(HqmfError::UnsupportedValueType { .. })
        ));
    }

    #[test]
    fn test_missing_discriminator() {
        assert!(matches!(
            parse(json!({"value": "1"})),
            Err(HqmfError::MalformedStructural { .. })
        ));
    }

    #[test]
    fn test_derived_expression_kept_verbatim() {
        let node = json!({
            "type": "IVL_TS",
            "high": {"derived": true, "expression": "EndDate.add(new PQ(-2,\"a\"))"}
        });
        let range = RangeValue::from_structural(&node, NodePath::root(), RangeType::Timestamp).unwrap();
        let high = range.high.as_ref().unwrap();

        assert!(high.is_derived());
        assert_eq!(high.scalar_type, ScalarType::Timestamp);
        assert_eq!(high.expression.as_deref(), Some("EndDate.add(new PQ(-2,\"a\"))"));
        assert_eq!(
            range.to_structural(),
            json!({
                "type": "IVL_TS",
                "high": {"type": "TS", "derived": true, "expression": "EndDate.add(new PQ(-2,\"a\"))"}
            })
        );
    }

    #[test]
    fn test_derived_flag_without_expression() {
        let node = json!({"type": "TS", "derived": true});
        assert!(matches!(
            TimestampValue::from_structural(&node, NodePath::root(), ScalarType::Timestamp),
            Err(HqmfError::MalformedStructural { .. })
        ));
    }

    #[test]
    fn test_bound_defaults_and_inclusive() {
        let node = json!({"low": {"value": "50", "unit": "a", "inclusive": false}});
        let range =
            RangeValue::from_structural(&node, NodePath::root(), RangeType::PhysicalQuantity).unwrap();
        let low = range.low.as_ref().unwrap();

        assert_eq!(range.range_type, RangeType::PhysicalQuantity);
        assert_eq!(low.scalar_type, ScalarType::PhysicalQuantity);
        assert!(!low.inclusive);
        assert!(range.high.is_none());
        assert_eq!(
            range.to_structural(),
            json!({"type": "IVL_PQ", "low": {"type": "PQ", "value": "50", "unit": "a", "inclusive": false}})
        );
    }

    #[test]
    fn test_unknown_bound_type() {
        let node = json!({"type": "IVL_PQ", "low": {"type": "INT", "value": "1"}});
        let err = RangeValue::from_structural(&node, NodePath::root(), RangeType::PhysicalQuantity)
            .unwrap_err();
        assert_eq!(
            err,
            HqmfError::unsupported_value_type("INT", NodePath::root().key("low").key("type"))
        );
    }

    #[test]
    fn test_coded_requires_code() {
        assert!(matches!(
            parse(json!({"type": "CD", "system": "LOINC"})),
            Err(HqmfError::MalformedStructural { .. })
        ));
    }

    #[test]
    fn test_scalar_interpretation() {
        let ts = TimestampValue::timestamp("20111231");
        let expected = NaiveDate::from_ymd_opt(2011, 12, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(ts.as_datetime(), Some(expected));
        assert_eq!(TimestampValue::timestamp("2011").as_datetime().map(|d| d.date()),
            NaiveDate::from_ymd_opt(2011, 1, 1));
        assert_eq!(TimestampValue::timestamp("20111").as_datetime(), None);

        let pq = TimestampValue::quantity("-1.5", Some("a"));
        assert_eq!(pq.as_decimal(), Some(Decimal::new(-15, 1)));
        assert_eq!(pq.as_datetime(), None);
    }
}
