//! Error types for the classification pipeline

use classifier_domain::{FieldType, RecordId};
use classifier_llm::LlmError;
use thiserror::Error;

/// A prompt template that does not fit its record type
///
/// Raised while the template is being configured, before any record is
/// processed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A placeholder names a field the record type does not have
    #[error("Column '{field}' in prompt template not found in {schema} model.")]
    UnknownField {
        /// Offending placeholder
        field: String,
        /// Record type name
        schema: String,
    },

    /// A required field has no placeholder
    #[error("Required column '{field}' of {schema} model is missing from prompt template.")]
    MissingRequiredField {
        /// Required field without a placeholder
        field: String,
        /// Record type name
        schema: String,
    },
}

impl TemplateError {
    /// Name of the field the error is about
    pub fn field(&self) -> &str {
        match self {
            TemplateError::UnknownField { field, .. } => field,
            TemplateError::MissingRequiredField { field, .. } => field,
        }
    }
}

/// Provider output that does not match the result schema
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Not valid JSON after unwrapping fences and quotes
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// Valid JSON, but not an object
    #[error("Expected a JSON object, got: {0}")]
    NotAnObject(String),

    /// A required field is absent or null
    #[error("Missing required field '{0}'")]
    MissingField(String),

    /// A value that cannot be coerced to its declared type
    #[error("Field '{field}' is not a valid {expected}: {found}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Declared type
        expected: FieldType,
        /// The JSON value received
        found: String,
    },
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        ParseError::InvalidJson(e.to_string())
    }
}

/// Failure of a single classification call
#[derive(Error, Debug)]
pub enum ClassificationError {
    /// Provider error that is not retried
    #[error("Provider error: {0}")]
    Provider(#[from] LlmError),

    /// Provider output did not match the result schema
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Rate limited on every attempt
    #[error("Rate limited on all {attempts} attempts")]
    RetriesExhausted {
        /// Attempts made
        attempts: u32,
    },
}

/// Errors that can occur in the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Prompt template does not fit the record type
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Record id does not exist
    #[error("Input with id {0} not found")]
    NotFound(RecordId),

    /// Record lacks a field the template needs
    #[error("Record {record_id} has no field '{field}'")]
    MissingField {
        /// Record being rendered
        record_id: RecordId,
        /// Missing field name
        field: String,
    },

    /// Record store error
    #[error("Store error: {0}")]
    Store(String),

    /// LLM classification failed
    #[error("Classification failed: {0}")]
    Classification(#[from] ClassificationError),

    /// Downloader failed to enumerate records
    #[error("Ingestion error: {0}")]
    Ingest(String),
}
