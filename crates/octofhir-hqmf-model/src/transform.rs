//! Conversion between a whole document and its structural form
//!
//! `to_model` walks the structural document, builds every data criterion
//! and every population tree, and assembles the [`DocumentModel`].
//! `to_structural` is its inverse. Any failure aborts the call; no partial
//! document is ever returned.

use octofhir_hqmf_diagnostics::{HqmfError, NodePath, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::data_criteria::DataCriteria;
use crate::document::DocumentModel;
use crate::precondition::PopulationCriteria;
use crate::structural::{NodeReader, NodeWriter};
use crate::value::{RangeType, RangeValue};

/// When references between entities are checked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceResolution {
    /// On demand, through `DocumentModel::resolve` and `validate`
    #[default]
    Lazy,
    /// Once the document is assembled; any unresolved reference fails the load
    Eager,
}

/// Options for [`to_model_with_options`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    pub reference_resolution: ReferenceResolution,
}

impl TransformOptions {
    pub fn eager() -> Self {
        Self {
            reference_resolution: ReferenceResolution::Eager,
        }
    }
}

/// Build a document model with lazy reference resolution
pub fn to_model(node: &Json) -> Result<DocumentModel> {
    to_model_with_options(node, &TransformOptions::default())
}

/// Build a document model
pub fn to_model_with_options(node: &Json, options: &TransformOptions) -> Result<DocumentModel> {
    let reader = NodeReader::new(node, NodePath::root())?;
    let mut model = DocumentModel::new(reader.req_str("id")?);
    model.title = reader.opt_str("title")?;
    model.description = reader.opt_str("description")?;
    model.measure_period = reader
        .opt_node("measure_period")
        .map(|(node, path)| RangeValue::from_structural(node, path, RangeType::Timestamp))
        .transpose()?;

    if let Some((items, path)) = reader.opt_array("data_criteria")? {
        for (i, item) in items.iter().enumerate() {
            let item_path = path.index(i);
            let id = NodeReader::new(item, item_path.clone())?.req_str("id")?;
            model.add_data_criteria(DataCriteria::from_structural(id, item, item_path)?)?;
        }
    }

    if let Some((items, path)) = reader.opt_array("population_criteria")? {
        for (i, item) in items.iter().enumerate() {
            model.add_population_criteria(PopulationCriteria::from_structural(item, path.index(i))?)?;
        }
    }

    log::debug!(
        "assembled document '{}': {} data criteria, {} population criteria",
        model.id(),
        model.all_data_criteria().len(),
        model.all_population_criteria().len()
    );

    if options.reference_resolution == ReferenceResolution::Eager {
        model.validate()?;
        for diagnostic in model.diagnostics() {
            log::warn!("{}", diagnostic);
        }
    }

    Ok(model)
}

/// Serialize a document model
pub fn to_structural(model: &DocumentModel) -> Json {
    let data_criteria: Vec<Json> = model
        .all_data_criteria()
        .map(|criteria| {
            log::trace!("serializing data criteria '{}'", criteria.id());
            criteria.to_structural()
        })
        .collect();
    let population_criteria: Vec<Json> = model
        .all_population_criteria()
        .map(PopulationCriteria::to_structural)
        .collect();

    NodeWriter::new()
        .str("id", model.id())
        .opt_str("title", model.title.as_deref())
        .opt_str("description", model.description.as_deref())
        .opt_node("measure_period", model.measure_period.as_ref().map(RangeValue::to_structural))
        .node("data_criteria", Json::Array(data_criteria))
        .node("population_criteria", Json::Array(population_criteria))
        .finish()
}

impl DocumentModel {
    /// Build a document from its structural form, resolving references lazily
    pub fn from_structural(node: &Json) -> Result<Self> {
        to_model(node)
    }

    pub fn to_structural(&self) -> Json {
        to_structural(self)
    }
}

/// Same as [`to_model`]
impl TryFrom<&Json> for DocumentModel {
    type Error = HqmfError;

    fn try_from(node: &Json) -> Result<Self> {
        to_model(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_hqmf_diagnostics::HQMF0102;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn minimal() -> Json {
        json!({
            "id": "CMS0",
            "data_criteria": [
                {"id": "enc", "type": "encounters", "code_list_id": "2.16.840.1.113883.3.464.1003.101.12.1001"}
            ],
            "population_criteria": [
                {"id": "IPP", "conjunction_code": "allTrue", "preconditions": [{"reference": "enc"}]}
            ]
        })
    }

    #[test]
    fn test_minimal_document_round_trip() {
        let model = to_model(&minimal()).unwrap();
        assert_eq!(model.id(), "CMS0");
        assert_eq!(to_structural(&model), minimal());
    }

    #[test]
    fn test_sequences_always_emitted() {
        let model = DocumentModel::new("empty");
        assert_eq!(
            model.to_structural(),
            json!({"id": "empty", "data_criteria": [], "population_criteria": []})
        );
    }

    #[test]
    fn test_duplicate_id_aborts() {
        let node = json!({"id": "d", "data_criteria": [{"id": "x"}, {"id": "x"}]});
        assert_eq!(
            to_model(&node).unwrap_err(),
            HqmfError::DuplicateCriteriaId { id: "x".to_string() }
        );
    }

    #[test]
    fn test_missing_document_id() {
        let err = to_model(&json!({"data_criteria": []})).unwrap_err();
        assert_eq!(err.path().map(ToString::to_string), Some("$.id".to_string()));
    }

    #[test]
    fn test_missing_criteria_id_reports_path() {
        let node = json!({"id": "d", "data_criteria": [{"id": "a"}, {"title": "no id"}]});
        let err = to_model(&node).unwrap_err();
        assert_eq!(
            err.path().map(ToString::to_string),
            Some("$.data_criteria[1].id".to_string())
        );
    }

    #[test]
    fn test_lazy_and_eager_resolution() {
        let node = json!({
            "id": "d",
            "population_criteria": [{"id": "IPP", "reference": "undefined"}]
        });

        let model = to_model(&node).unwrap();
        assert_eq!(model.validate().unwrap_err().code(), HQMF0102);

        let err = to_model_with_options(&node, &TransformOptions::eager()).unwrap_err();
        assert_eq!(err, HqmfError::unresolved("undefined", "IPP"));
    }

    #[test]
    fn test_options_from_config() {
        let options: TransformOptions = serde_json::from_str(r#"{"reference_resolution": "eager"}"#).unwrap();
        assert_eq!(options, TransformOptions::eager());
        let options: TransformOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.reference_resolution, ReferenceResolution::Lazy);
    }

    #[test]
    fn test_measure_period_defaults_to_timestamps() {
        let node = json!({
            "id": "d",
            "measure_period": {"low": {"value": "20240101"}, "high": {"value": "20241231"}}
        });
        let model = to_model(&node).unwrap();
        let period = model.measure_period.as_ref().unwrap();
        assert_eq!(period.range_type, RangeType::Timestamp);
        assert!(period.low.as_ref().and_then(|low| low.as_datetime()).is_some());
    }

    #[test]
    fn test_deep_population_model_drops() {
        let depth = 100_000;
        let mut tree = json!({"reference": "a"});
        for _ in 0..depth {
            tree = json!({"conjunction_code": "allTrue", "preconditions": [tree]});
        }
        if let Json::Object(fields) = &mut tree {
            fields.insert("id".to_string(), json!("IPP"));
        }
        let node = json!({
            "id": "deep",
            "data_criteria": [{"id": "a"}],
            "population_criteria": [tree]
        });

        let model = to_model(&node).unwrap();
        let root = &model.population_criteria("IPP").unwrap().root;
        assert_eq!(root.depth(), depth + 1);
        assert!(model.validate().is_ok());
        drop(model);

        // serde_json drops nested values recursively
        std::mem::forget(node);
    }
}
