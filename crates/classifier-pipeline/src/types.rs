//! Outcome and report types

use classifier_domain::{RecordId, RunId};

/// What happened to one record in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new result was stored
    Persisted,
    /// A result already existed; the new one was discarded
    AlreadyClassified,
    /// The provider call failed, nothing was stored
    Unclassified,
}

impl RecordOutcome {
    /// Returns true if this call stored a result
    pub fn is_persisted(&self) -> bool {
        matches!(self, RecordOutcome::Persisted)
    }
}

/// Summary of one batch invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Identifier of the batch, also present on its log lines
    pub run_id: RunId,

    /// Record ids submitted
    pub attempted: usize,

    /// Records that received a new result
    pub persisted: usize,

    /// Records that already had a result
    pub already_classified: usize,

    /// Records whose provider call failed
    pub unclassified: usize,

    /// Records that could not be processed at all, with the reason
    pub failed: Vec<(RecordId, String)>,
}

impl BatchReport {
    pub(crate) fn new(run_id: RunId, attempted: usize) -> Self {
        Self {
            run_id,
            attempted,
            persisted: 0,
            already_classified: 0,
            unclassified: 0,
            failed: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Persisted => self.persisted += 1,
            RecordOutcome::AlreadyClassified => self.already_classified += 1,
            RecordOutcome::Unclassified => self.unclassified += 1,
        }
    }
}

/// Summary of one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Ids assigned to the stored records, in arrival order
    pub record_ids: Vec<RecordId>,

    /// Listed ids the source returned nothing for
    pub skipped: usize,

    /// Records that failed to fetch or store
    pub failed: usize,
}
