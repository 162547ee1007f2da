//! HQMF measure document model
//!
//! This crate provides:
//! - Typed entities for data criteria, value variants, temporal references,
//!   subset operators and population precondition trees
//! - The document aggregate with ordered, id-indexed criteria
//! - Lossless conversion between the model and its structural (JSON) form
//! - JSON text serialization

pub mod data_criteria;
pub mod document;
pub mod precondition;
pub mod serialize;
pub mod structural;
pub mod subset;
pub mod temporal;
pub mod transform;
pub mod value;

pub use data_criteria::*;
pub use document::*;
pub use precondition::*;
pub use serialize::*;
pub use structural::{NodeReader, NodeWriter};
pub use subset::*;
pub use temporal::*;
pub use transform::*;
pub use value::*;

pub use octofhir_hqmf_diagnostics::{HqmfError, NodePath, Result};
