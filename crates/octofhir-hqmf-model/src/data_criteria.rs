//! Data criteria
//!
//! A data criterion is a clinical fact pattern referenced by population
//! logic. It is either *primitive* (coded by a value set or an inline code
//! list, optionally constrained by value, effective time, temporal
//! references and subset operators) or *derived* (a set composition of
//! other criteria, named by id).

use indexmap::IndexMap;
use octofhir_hqmf_diagnostics::{Diagnostic, HqmfError, NodePath, Result, HQMF0110, HQMF0111};
use serde_json::{Map, Value as Json};
use std::fmt;
use std::str::FromStr;

use crate::structural::{NodeReader, NodeWriter};
use crate::subset::SubsetOperator;
use crate::temporal::{Reference, TemporalReference};
use crate::value::{RangeType, RangeValue, Value};

/// Code system name to ordered codes; duplicates are kept
pub type InlineCodeList = IndexMap<String, Vec<String>>;

/// Symbolic category of a data criterion
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CriteriaType {
    AllergiesIntolerances,
    Characteristic,
    Communications,
    Conditions,
    Derived,
    Devices,
    DiagnosticStudies,
    Encounters,
    FunctionalStatuses,
    Interventions,
    LaboratoryTests,
    MedicationSupply,
    Medications,
    PhysicalExams,
    Procedures,
    Results,
    RiskCategoryAssessments,
    Symptoms,
    /// Any category outside the known set, kept verbatim
    Other(String),
}

impl CriteriaType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::AllergiesIntolerances => "allergies_intolerances",
            Self::Characteristic => "characteristic",
            Self::Communications => "communications",
            Self::Conditions => "conditions",
            Self::Derived => "derived",
            Self::Devices => "devices",
            Self::DiagnosticStudies => "diagnostic_studies",
            Self::Encounters => "encounters",
            Self::FunctionalStatuses => "functional_statuses",
            Self::Interventions => "interventions",
            Self::LaboratoryTests => "laboratory_tests",
            Self::MedicationSupply => "medication_supply",
            Self::Medications => "medications",
            Self::PhysicalExams => "physical_exams",
            Self::Procedures => "procedures",
            Self::Results => "results",
            Self::RiskCategoryAssessments => "risk_category_assessments",
            Self::Symptoms => "symptoms",
            Self::Other(other) => other,
        }
    }
}

impl From<&str> for CriteriaType {
    fn from(s: &str) -> Self {
        match s {
            "allergies_intolerances" => Self::AllergiesIntolerances,
            "characteristic" => Self::Characteristic,
            "communications" => Self::Communications,
            "conditions" => Self::Conditions,
            "derived" => Self::Derived,
            "devices" => Self::Devices,
            "diagnostic_studies" => Self::DiagnosticStudies,
            "encounters" => Self::Encounters,
            "functional_statuses" => Self::FunctionalStatuses,
            "interventions" => Self::Interventions,
            "laboratory_tests" => Self::LaboratoryTests,
            "medication_supply" => Self::MedicationSupply,
            "medications" => Self::Medications,
            "physical_exams" => Self::PhysicalExams,
            "procedures" => Self::Procedures,
            "results" => Self::Results,
            "risk_category_assessments" => Self::RiskCategoryAssessments,
            "symptoms" => Self::Symptoms,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for CriteriaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set operator composing the children of a derived criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivationOperator {
    Union,
    Intersect,
    /// Cross product
    XProduct,
}

impl DerivationOperator {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Union => "UNION",
            Self::Intersect => "INTERSECT",
            Self::XProduct => "XPRODUCT",
        }
    }
}

impl FromStr for DerivationOperator {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "UNION" => Ok(Self::Union),
            "INTERSECT" => Ok(Self::Intersect),
            "XPRODUCT" => Ok(Self::XProduct),
            _ => Err(format!("unknown derivation operator '{}'", s)),
        }
    }
}

impl fmt::Display for DerivationOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A data criterion
///
/// The id is fixed at construction; every other attribute is a public,
/// mutable field. The type intentionally does not implement `Clone`, see
/// [`DataCriteria::try_clone`].
#[derive(Debug, PartialEq, Eq)]
pub struct DataCriteria {
    id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub section: Option<String>,
    pub standard_category: Option<String>,
    pub qds_data_type: Option<String>,
    pub subset_code: Option<String>,
    /// Value set reference
    pub code_list_id: Option<String>,
    pub inline_code_list: Option<InlineCodeList>,
    /// Attribute of the concept being measured, e.g. `birthtime`
    pub property: Option<String>,
    pub criteria_type: Option<CriteriaType>,
    /// Clinical status filter, e.g. `completed`
    pub status: Option<String>,
    pub value: Option<Value>,
    pub effective_time: Option<RangeValue>,
    pub negation: bool,
    /// Value set qualifying the negation reason
    pub negation_code_list_id: Option<String>,
    pub temporal_references: Vec<TemporalReference>,
    pub subset_operators: Vec<SubsetOperator>,
    pub derivation_operator: Option<DerivationOperator>,
    /// Ids of the criteria composed by the derivation operator
    pub children_criteria: Vec<String>,
}

impl DataCriteria {
    /// An empty primitive criterion
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            description: None,
            section: None,
            standard_category: None,
            qds_data_type: None,
            subset_code: None,
            code_list_id: None,
            inline_code_list: None,
            property: None,
            criteria_type: None,
            status: None,
            value: None,
            effective_time: None,
            negation: false,
            negation_code_list_id: None,
            temporal_references: Vec::new(),
            subset_operators: Vec::new(),
            derivation_operator: None,
            children_criteria: Vec::new(),
        }
    }

    /// Start building a criterion
    pub fn builder(id: impl Into<String>) -> DataCriteriaBuilder {
        DataCriteriaBuilder {
            criteria: Self::new(id),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Check whether this criterion is a composition of other criteria
    pub fn is_derived(&self) -> bool {
        self.derivation_operator.is_some()
    }

    /// Ids of every criterion this one points at: temporal anchors, then
    /// derivation children
    pub fn referenced_ids(&self) -> impl Iterator<Item = &str> {
        self.temporal_references
            .iter()
            .map(|t| t.reference.id.as_str())
            .chain(self.children_criteria.iter().map(String::as_str))
    }

    /// Check the derivation invariants
    pub fn validate(&self) -> Result<()> {
        match (self.derivation_operator, self.children_criteria.is_empty()) {
            (Some(op), true) => {
                return Err(HqmfError::invalid_derivation(
                    &self.id,
                    format!("derivation operator {} has no children criteria", op),
                ));
            }
            (None, false) => {
                return Err(HqmfError::invalid_derivation(
                    &self.id,
                    "children criteria without a derivation operator",
                ));
            }
            _ => {}
        }
        if self.criteria_type == Some(CriteriaType::Derived) && !self.is_derived() {
            return Err(HqmfError::invalid_derivation(
                &self.id,
                "derived criteria requires a derivation operator and children criteria",
            ));
        }
        if let Some(value) = &self.value {
            value.validate(&NodePath::root().key("value"))?;
        }
        Ok(())
    }

    /// Warnings for content the model accepts but that is likely a mistake
    pub fn lint(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if self.code_list_id.is_some() && self.inline_code_list.is_some() {
            diagnostics.push(
                Diagnostic::warning(HQMF0110, "both code_list_id and inline_code_list are set")
                    .with_subject(self.id.clone()),
            );
        }
        if self.is_derived() && (self.value.is_some() || self.code_list_id.is_some()) {
            diagnostics.push(
                Diagnostic::warning(
                    HQMF0111,
                    "value and code_list_id have no meaning on a derived criterion",
                )
                .with_subject(self.id.clone()),
            );
        }
        diagnostics
    }

    /// Build a criterion from its structural node
    ///
    /// Any failure in a nested value, range, temporal reference or subset
    /// operator fails the whole criterion.
    pub fn from_structural(id: impl Into<String>, node: &Json, path: NodePath) -> Result<Self> {
        let reader = NodeReader::new(node, path)?;
        let mut criteria = Self::new(id);

        criteria.title = reader.opt_str("title")?;
        criteria.description = reader.opt_str("description")?;
        criteria.section = reader.opt_str("section")?;
        criteria.standard_category = reader.opt_str("standard_category")?;
        criteria.qds_data_type = reader.opt_str("qds_data_type")?;
        criteria.subset_code = reader.opt_str("subset_code")?;
        criteria.code_list_id = reader.opt_str("code_list_id")?;
        criteria.property = reader.opt_str("property")?;
        criteria.criteria_type = reader.opt_str("type")?.map(|t| CriteriaType::from(t.as_str()));
        criteria.status = reader.opt_str("status")?;
        criteria.negation = reader.opt_bool("negation")?.unwrap_or(false);
        criteria.negation_code_list_id = reader.opt_str("negation_code_list_id")?;

        criteria.value = reader
            .opt_node("value")
            .map(|(node, path)| Value::from_structural(node, path))
            .transpose()?;
        criteria.effective_time = reader
            .opt_node("effective_time")
            .map(|(node, path)| RangeValue::from_structural(node, path, RangeType::Timestamp))
            .transpose()?;
        criteria.inline_code_list = reader
            .opt_map("inline_code_list")?
            .map(|(map, path)| parse_inline_code_list(map, &path))
            .transpose()?;

        if let Some((items, path)) = reader.opt_array("temporal_references")? {
            criteria.temporal_references = items
                .iter()
                .enumerate()
                .map(|(i, item)| TemporalReference::from_structural(item, path.index(i)))
                .collect::<Result<_>>()?;
        }
        if let Some((items, path)) = reader.opt_array("subset_operators")? {
            criteria.subset_operators = items
                .iter()
                .enumerate()
                .map(|(i, item)| SubsetOperator::from_structural(item, path.index(i)))
                .collect::<Result<_>>()?;
        }

        criteria.derivation_operator = reader
            .opt_str("derivation_operator")?
            .map(|op| {
                op.parse::<DerivationOperator>().map_err(|message| {
                    HqmfError::malformed(message, reader.path().key("derivation_operator"))
                })
            })
            .transpose()?;
        criteria.children_criteria = reader.opt_str_array("children_criteria")?.unwrap_or_default();

        criteria.validate()?;
        log::trace!("built data criteria '{}'", criteria.id);
        Ok(criteria)
    }

    /// Serialize to the structural form, with `id` as the first member
    ///
    /// `negation` is emitted only when true.
    pub fn to_structural(&self) -> Json {
        let inline_code_list = self.inline_code_list.as_ref().map(|codes| {
            Json::Object(
                codes
                    .iter()
                    .map(|(system, codes)| {
                        let codes = codes.iter().cloned().map(Json::String).collect();
                        (system.clone(), Json::Array(codes))
                    })
                    .collect::<Map<_, _>>(),
            )
        });

        NodeWriter::new()
            .str("id", self.id.as_str())
            .opt_str("title", self.title.as_deref())
            .opt_str("description", self.description.as_deref())
            .opt_str("section", self.section.as_deref())
            .opt_str("standard_category", self.standard_category.as_deref())
            .opt_str("qds_data_type", self.qds_data_type.as_deref())
            .opt_str("subset_code", self.subset_code.as_deref())
            .opt_str("code_list_id", self.code_list_id.as_deref())
            .opt_str("property", self.property.as_deref())
            .opt_str("type", self.criteria_type.as_ref().map(CriteriaType::as_str))
            .opt_str("status", self.status.as_deref())
            .opt_node("value", self.value.as_ref().map(Value::to_structural))
            .opt_node(
                "effective_time",
                self.effective_time.as_ref().map(RangeValue::to_structural),
            )
            .opt_node("inline_code_list", inline_code_list)
            .flag("negation", self.negation, false)
            .opt_str("negation_code_list_id", self.negation_code_list_id.as_deref())
            .seq(
                "temporal_references",
                self.temporal_references
                    .iter()
                    .map(TemporalReference::to_structural)
                    .collect(),
            )
            .seq(
                "subset_operators",
                self.subset_operators
                    .iter()
                    .map(SubsetOperator::to_structural)
                    .collect(),
            )
            .opt_str(
                "derivation_operator",
                self.derivation_operator.as_ref().map(DerivationOperator::code),
            )
            .seq(
                "children_criteria",
                self.children_criteria
                    .iter()
                    .cloned()
                    .map(Json::String)
                    .collect(),
            )
            .finish()
    }

    /// Deep, independent copy made by serializing and re-parsing
    ///
    /// The copy is exactly what re-reading this criterion's structural form
    /// produces; this is deliberately not a field-by-field copy. Fails only
    /// when the criterion was mutated into an invalid derivation or value.
    pub fn try_clone(&self) -> Result<Self> {
        Self::from_structural(self.id.clone(), &self.to_structural(), NodePath::root())
    }

    /// Temporal references anchored on a given criterion id
    pub fn temporal_references_to<'a>(
        &'a self,
        reference: &'a Reference,
    ) -> impl Iterator<Item = &'a TemporalReference> {
        self.temporal_references
            .iter()
            .filter(move |t| &t.reference == reference)
    }
}

fn parse_inline_code_list(map: &Map<String, Json>, path: &NodePath) -> Result<InlineCodeList> {
    map.iter()
        .map(|(system, codes)| {
            let codes_path = path.key(system.as_str());
            let Json::Array(items) = codes else {
                return Err(HqmfError::malformed(
                    "expected an array of codes",
                    codes_path,
                ));
            };
            let codes = items
                .iter()
                .enumerate()
                .map(|(i, code)| match code {
                    Json::String(code) => Ok(code.clone()),
                    _ => Err(HqmfError::malformed("expected a string code", codes_path.index(i))),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok((system.clone(), codes))
        })
        .collect()
}

/// Fluent builder for [`DataCriteria`]
#[derive(Debug)]
pub struct DataCriteriaBuilder {
    criteria: DataCriteria,
}

impl DataCriteriaBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.criteria.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.criteria.description = Some(description.into());
        self
    }

    pub fn section(mut self, section: impl Into<String>) -> Self {
        self.criteria.section = Some(section.into());
        self
    }

    pub fn standard_category(mut self, category: impl Into<String>) -> Self {
        self.criteria.standard_category = Some(category.into());
        self
    }

    pub fn qds_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.criteria.qds_data_type = Some(data_type.into());
        self
    }

    pub fn subset_code(mut self, code: impl Into<String>) -> Self {
        self.criteria.subset_code = Some(code.into());
        self
    }

    pub fn code_list_id(mut self, code_list_id: impl Into<String>) -> Self {
        self.criteria.code_list_id = Some(code_list_id.into());
        self
    }

    /// Append codes for a code system, creating the inline list on first use
    pub fn inline_codes<I, S>(mut self, system: impl Into<String>, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.criteria
            .inline_code_list
            .get_or_insert_with(InlineCodeList::new)
            .entry(system.into())
            .or_default()
            .extend(codes.into_iter().map(Into::into));
        self
    }

    pub fn property(mut self, property: impl Into<String>) -> Self {
        self.criteria.property = Some(property.into());
        self
    }

    pub fn criteria_type(mut self, criteria_type: CriteriaType) -> Self {
        self.criteria.criteria_type = Some(criteria_type);
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.criteria.status = Some(status.into());
        self
    }

    pub fn value(mut self, value: Value) -> Self {
        self.criteria.value = Some(value);
        self
    }

    pub fn effective_time(mut self, range: RangeValue) -> Self {
        self.criteria.effective_time = Some(range);
        self
    }

    /// Negate the criterion, optionally with a reason value set
    pub fn negated(mut self, reason_code_list_id: Option<&str>) -> Self {
        self.criteria.negation = true;
        self.criteria.negation_code_list_id = reason_code_list_id.map(String::from);
        self
    }

    pub fn temporal_reference(mut self, temporal: TemporalReference) -> Self {
        self.criteria.temporal_references.push(temporal);
        self
    }

    pub fn subset_operator(mut self, subset: SubsetOperator) -> Self {
        self.criteria.subset_operators.push(subset);
        self
    }

    /// Make the criterion a derivation over the given children
    pub fn derivation<I, S>(mut self, operator: DerivationOperator, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.criteria.derivation_operator = Some(operator);
        self.criteria.children_criteria = children.into_iter().map(Into::into).collect();
        self
    }

    /// Validate and return the criterion
    pub fn build(self) -> Result<DataCriteria> {
        self.criteria.validate()?;
        Ok(self.criteria)
    }
}
