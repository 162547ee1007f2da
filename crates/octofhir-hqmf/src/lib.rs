//! HQMF quality measure documents for Rust
//!
//! This crate provides:
//! - A typed model of measure documents: data criteria, value variants,
//!   temporal references, subset operators and population precondition trees
//! - Lossless conversion to and from the structural (JSON) form exchanged
//!   with XML adapters
//! - Whole-document reference validation and diagnostics
//!
//! # Example
//!
//! ```
//! use octofhir_hqmf::{to_model, to_structural};
//! use serde_json::json;
//!
//! let node = json!({
//!     "id": "CMS0",
//!     "data_criteria": [{"id": "enc", "type": "encounters"}],
//!     "population_criteria": [{"id": "IPP", "reference": "enc"}]
//! });
//!
//! let model = to_model(&node)?;
//! assert_eq!(model.population_criteria("IPP").unwrap().root.leaf_count(), 1);
//! assert_eq!(to_structural(&model), node);
//! # Ok::<(), octofhir_hqmf::HqmfError>(())
//! ```

// Re-export all public APIs from internal crates
pub use octofhir_hqmf_diagnostics as diagnostics;
pub use octofhir_hqmf_model as model;

// Convenience re-exports
pub use octofhir_hqmf_diagnostics::{Diagnostic, HqmfError, NodePath, Result, Severity};
pub use octofhir_hqmf_model::{
    ConjunctionCode, DataCriteria, DocumentModel, DocumentSerializer, JsonSerializer,
    PopulationCriteria, Precondition, Reference, ResolvedReference, SerializeError,
    TransformOptions, Value, to_model, to_model_with_options, to_structural,
};
