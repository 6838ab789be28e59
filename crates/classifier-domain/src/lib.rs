//! Classifier Domain Layer
//!
//! This crate contains the core domain model for the LLM record classifier.
//! It has no external dependencies beyond `uuid` and defines the value objects
//! and trait interfaces that all other layers depend upon.
//!
//! ## Key Concepts
//!
//! - **Record**: One unit of input data, an ordered set of named typed fields
//! - **RecordSchema**: Field-descriptor table describing a record type
//! - **ResultSchema**: Caller-supplied description of the classification output
//! - **ClassificationResult**: The structured output produced for a record
//! - **RunId**: Identifier of a single batch invocation
//!
//! ## Architecture
//!
//! - Pure domain types only
//! - Infrastructure implementations live in other crates
//! - Trait definitions for storage interactions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod record;
pub mod result;
pub mod run;
pub mod schema;
pub mod traits;

// Re-exports for convenience
pub use record::{Field, FieldValue, NewRecord, Record, RecordId};
pub use result::{ClassificationResult, PersistOutcome, StoredResult};
pub use run::RunId;
pub use schema::{is_internal_field, FieldDescriptor, FieldType, RecordSchema, ResultSchema, INTERNAL_FIELDS};
