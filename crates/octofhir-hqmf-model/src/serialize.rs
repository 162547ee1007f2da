//! Document text serialization
//!
//! Renders the structural form of a document as JSON text and reads it
//! back through the document transform.

use std::io::{Read, Write};

use octofhir_hqmf_diagnostics::{ErrorCode, HqmfError, HQMF0401, HQMF0406};

use crate::document::DocumentModel;
use crate::transform;

/// Errors that can occur during serialization
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    /// JSON syntax error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Well-formed JSON that is not a valid document
    #[error(transparent)]
    Model(#[from] HqmfError),
}

impl SerializeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Json(_) => HQMF0406,
            Self::Io(_) => HQMF0401,
            Self::Model(err) => err.code(),
        }
    }
}

/// Trait for document serializers
pub trait DocumentSerializer {
    /// Serialize a document to a string
    fn serialize(&self, document: &DocumentModel) -> Result<String, SerializeError>;

    /// Serialize a document to a writer
    fn serialize_to_writer<W: Write>(
        &self,
        document: &DocumentModel,
        writer: W,
    ) -> Result<(), SerializeError>;

    /// Deserialize a document from a string
    fn deserialize(&self, input: &str) -> Result<DocumentModel, SerializeError>;

    /// Deserialize a document from a reader
    fn deserialize_from_reader<R: Read>(&self, reader: R) -> Result<DocumentModel, SerializeError>;
}

/// JSON serializer for documents
#[derive(Debug, Default, Clone)]
pub struct JsonSerializer {
    /// Whether to produce pretty-printed output
    pub pretty: bool,
}

impl JsonSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl DocumentSerializer for JsonSerializer {
    fn serialize(&self, document: &DocumentModel) -> Result<String, SerializeError> {
        let node = transform::to_structural(document);
        let text = if self.pretty {
            serde_json::to_string_pretty(&node)?
        } else {
            serde_json::to_string(&node)?
        };
        Ok(text)
    }

    fn serialize_to_writer<W: Write>(
        &self,
        document: &DocumentModel,
        writer: W,
    ) -> Result<(), SerializeError> {
        let node = transform::to_structural(document);
        if self.pretty {
            serde_json::to_writer_pretty(writer, &node)?;
        } else {
            serde_json::to_writer(writer, &node)?;
        }
        Ok(())
    }

    fn deserialize(&self, input: &str) -> Result<DocumentModel, SerializeError> {
        let node: serde_json::Value = serde_json::from_str(input)?;
        Ok(transform::to_model(&node)?)
    }

    fn deserialize_from_reader<R: Read>(&self, mut reader: R) -> Result<DocumentModel, SerializeError> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        self.deserialize(&content)
    }
}

/// Convenience functions for documents
impl DocumentModel {
    /// Serialize to compact JSON
    pub fn to_json(&self) -> Result<String, SerializeError> {
        JsonSerializer::new().serialize(self)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String, SerializeError> {
        JsonSerializer::pretty().serialize(self)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self, SerializeError> {
        JsonSerializer::new().deserialize(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::precondition::{PopulationCriteria, Precondition};
    use crate::DataCriteria;
    use crate::value::Value;

    fn sample() -> DocumentModel {
        let mut model = DocumentModel::new("CMS122");
        model.title = Some("Diabetes: Hemoglobin A1c Poor Control".to_string());
        model.add_data_criteria(DataCriteria::new("HbA1C")).unwrap();
        model
            .add_population_criteria(PopulationCriteria::new("NUMER", Precondition::leaf("HbA1C")))
            .unwrap();
        model
    }

    #[test]
    fn test_json_round_trip() {
        let model = sample();
        let json = model.to_json().unwrap();
        assert!(json.starts_with(r#"{"id":"CMS122""#));
        assert_eq!(DocumentModel::from_json(&json).unwrap(), model);
    }

    #[test]
    fn test_pretty_output() {
        let json = sample().to_json_pretty().unwrap();
        assert!(json.contains('\n'));
        assert_eq!(DocumentModel::from_json(&json).unwrap(), sample());
    }

    #[test]
    fn test_writer_and_reader() {
        let mut buffer = Vec::new();
        JsonSerializer::new()
            .serialize_to_writer(&sample(), &mut buffer)
            .unwrap();
        let model = JsonSerializer::new()
            .deserialize_from_reader(buffer.as_slice())
            .unwrap();
        assert_eq!(model, sample());
    }

    #[test]
    fn test_syntax_and_model_errors_differ() {
        assert!(matches!(
            DocumentModel::from_json("{not json"),
            Err(SerializeError::Json(_))
        ));
        assert!(matches!(
            DocumentModel::from_json(r#"{"title": "no id"}"#),
            Err(SerializeError::Model(HqmfError::MalformedStructural { .. }))
        ));
        let err = DocumentModel::from_json("[").unwrap_err();
        assert_eq!(err.code(), HQMF0406);
    }

    #[test]
    fn test_numeric_literal_text_survives() {
        let json = r#"{
            "id": "CMS122",
            "data_criteria": [
                {"id": "HbA1C", "value": {"type": "IVL_PQ", "low": {"type": "PQ", "value": 1.50, "unit": "%"}}}
            ]
        }"#;
        let model = DocumentModel::from_json(json).unwrap();
        let low = model
            .data_criteria("HbA1C")
            .and_then(|c| c.value.as_ref())
            .and_then(Value::as_range)
            .and_then(|r| r.low.as_ref())
            .unwrap();
        assert_eq!(low.value.as_deref(), Some("1.50"));
        assert!(model.to_json().unwrap().contains(r#""value":"1.50""#));
    }
}
