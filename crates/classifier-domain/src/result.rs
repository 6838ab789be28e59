//! Classification results

use crate::record::{lookup, Field, FieldValue, RecordId};

/// The structured output produced for one record
///
/// Holds one value per field declared in the result schema, in declaration
/// order. Optional fields the provider left out hold [`FieldValue::Null`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassificationResult {
    /// Field values in schema order
    pub values: Vec<Field>,
}

impl ClassificationResult {
    /// Create a result from ordered field values
    pub fn new(values: Vec<Field>) -> Self {
        Self { values }
    }

    /// Look up a value by field name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        lookup(&self.values, name)
    }
}

/// A classification result as persisted by the storage layer
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResult {
    /// Storage-assigned identifier of the result row
    pub id: i64,

    /// Back-reference to the classified record
    pub record_id: RecordId,

    /// The classification itself
    pub result: ClassificationResult,

    /// When this result was persisted (seconds since the Unix epoch)
    pub created_at: u64,
}

/// Outcome of an at-most-once persistence attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The result was inserted and committed
    Inserted,
    /// A result already existed for the record; the new one was discarded
    AlreadyExists,
}

impl PersistOutcome {
    /// Returns true if this attempt wrote the result
    pub fn is_inserted(&self) -> bool {
        matches!(self, PersistOutcome::Inserted)
    }
}
