//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and infrastructure.
//! Infrastructure implementations live in other crates.

use crate::{ClassificationResult, NewRecord, PersistOutcome, Record, RecordId, StoredResult};

/// Trait for storing records and their classification results
///
/// Implemented by the infrastructure layer (classifier-store)
pub trait RecordStore {
    /// Error type for store operations
    type Error;

    /// Persist a new record, returning its assigned identifier
    fn insert_record(&mut self, record: NewRecord) -> Result<RecordId, Self::Error>;

    /// Get a record by ID
    fn get_record(&self, id: RecordId) -> Result<Option<Record>, Self::Error>;

    /// Delete a record and its classification result.
    ///
    /// Returns false if no such record existed.
    fn delete_record(&mut self, id: RecordId) -> Result<bool, Self::Error>;

    /// Identifiers of all stored records, ascending
    fn list_record_ids(&self) -> Result<Vec<RecordId>, Self::Error>;

    /// Whether a classification result exists for the record
    fn has_result(&self, record_id: RecordId) -> Result<bool, Self::Error>;

    /// Get the classification result for a record
    fn get_result(&self, record_id: RecordId) -> Result<Option<StoredResult>, Self::Error>;

    /// Insert a result unless one already exists for the record.
    ///
    /// The existence check and the insert form a single unit of work:
    /// implementations must not let another writer slip in between them.
    fn persist_result_once(
        &mut self,
        record_id: RecordId,
        result: &ClassificationResult,
    ) -> Result<PersistOutcome, Self::Error>;

    /// Total number of stored results
    fn count_results(&self) -> Result<usize, Self::Error>;
}
