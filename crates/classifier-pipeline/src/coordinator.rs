//! Batch classification with at-most-once persistence

use crate::client::ClassificationClient;
use crate::error::PipelineError;
use crate::prompt::PromptTemplate;
use crate::schema::validate_result_schema;
use crate::types::{BatchReport, RecordOutcome};
use classifier_domain::traits::RecordStore;
use classifier_domain::{ClassificationResult, PersistOutcome, Record, RecordId, RecordSchema, ResultSchema, RunId};
use classifier_llm::LlmProvider;
use futures_util::future::join_all;
use std::sync::{Arc, Mutex};
use tracing::{error, info, info_span, warn, Instrument};

/// Fans record ids out to the classification client and stores results
///
/// The store sits behind a mutex that is only ever held for synchronous
/// store calls, never across an `.await`.
pub struct BatchCoordinator<P, S>
where
    S: RecordStore,
{
    client: ClassificationClient<P>,
    store: Arc<Mutex<S>>,
    record_schema: RecordSchema,
}

impl<P, S> BatchCoordinator<P, S>
where
    P: LlmProvider,
    S: RecordStore,
    S::Error: std::fmt::Display,
{
    /// Create a coordinator that owns its store
    pub fn new(client: ClassificationClient<P>, store: S, record_schema: RecordSchema) -> Self {
        Self::with_shared_store(client, Arc::new(Mutex::new(store)), record_schema)
    }

    /// Create a coordinator over a store shared with other components
    pub fn with_shared_store(
        client: ClassificationClient<P>,
        store: Arc<Mutex<S>>,
        record_schema: RecordSchema,
    ) -> Self {
        Self {
            client,
            store,
            record_schema,
        }
    }

    /// Handle to the underlying store
    pub fn store(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.store)
    }

    /// The classification client in use
    pub fn client(&self) -> &ClassificationClient<P> {
        &self.client
    }

    /// Check the client configuration, a template and a result schema before
    /// any record is touched
    pub fn prepare(
        &self,
        template_text: &str,
        result_schema: &ResultSchema,
    ) -> Result<PromptTemplate, PipelineError> {
        self.client.config().validate().map_err(PipelineError::Config)?;
        validate_result_schema(result_schema)?;
        Ok(PromptTemplate::new(template_text, &self.record_schema)?)
    }

    /// Classify a batch of records
    ///
    /// Records are processed concurrently; the client's limiter bounds the
    /// number of provider calls in flight. A failure on one record is logged
    /// and counted without affecting the others.
    ///
    /// # Errors
    ///
    /// Only configuration problems escape: an invalid template
    /// ([`PipelineError::Template`]) or result schema
    /// ([`PipelineError::Config`]), both detected before any record is
    /// processed.
    pub async fn classify_batch(
        &self,
        record_ids: &[RecordId],
        template_text: &str,
        result_schema: &ResultSchema,
    ) -> Result<BatchReport, PipelineError> {
        let template = self.prepare(template_text, result_schema)?;
        let run_id = RunId::new();

        info!(%run_id, records = record_ids.len(), "Starting classification batch");

        let template = &template;
        let tasks = record_ids.iter().map(|&record_id| {
            let span = info_span!("classify", %run_id, %record_id);
            async move {
                let outcome = self.classify_one(record_id, template, result_schema).await;
                (record_id, outcome)
            }
            .instrument(span)
        });

        let mut report = BatchReport::new(run_id, record_ids.len());
        for (record_id, outcome) in join_all(tasks).await {
            match outcome {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    error!(%run_id, %record_id, error = %e, "Error processing record");
                    report.failed.push((record_id, e.to_string()));
                }
            }
        }

        info!(
            %run_id,
            persisted = report.persisted,
            already_classified = report.already_classified,
            unclassified = report.unclassified,
            failed = report.failed.len(),
            "Classification batch complete"
        );
        Ok(report)
    }

    /// Classify one record and store the result unless one exists
    ///
    /// # Errors
    ///
    /// - [`PipelineError::NotFound`] if the record does not exist
    /// - [`PipelineError::MissingField`] if the record lacks a placeholder field
    /// - [`PipelineError::Store`] if the store fails
    ///
    /// A failed provider call is not an error: it yields
    /// [`RecordOutcome::Unclassified`].
    pub async fn classify_one(
        &self,
        record_id: RecordId,
        template: &PromptTemplate,
        result_schema: &ResultSchema,
    ) -> Result<RecordOutcome, PipelineError> {
        let record = self
            .load_record(record_id)?
            .ok_or(PipelineError::NotFound(record_id))?;

        let prompt = template.render(&record)?;

        let result = match self
            .client
            .classify(&prompt.text, &prompt.attachments, result_schema)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(%record_id, error = %e, "Record left unclassified");
                return Ok(RecordOutcome::Unclassified);
            }
        };

        match self.persist(record_id, &result)? {
            PersistOutcome::Inserted => {
                info!(%record_id, "Stored classification result");
                Ok(RecordOutcome::Persisted)
            }
            PersistOutcome::AlreadyExists => {
                info!(%record_id, "Result already exists, discarding new one");
                Ok(RecordOutcome::AlreadyClassified)
            }
        }
    }

    fn load_record(&self, record_id: RecordId) -> Result<Option<Record>, PipelineError> {
        let store = self
            .store
            .lock()
            .map_err(|e| PipelineError::Store(format!("Store lock error: {}", e)))?;
        store
            .get_record(record_id)
            .map_err(|e| PipelineError::Store(e.to_string()))
    }

    /// Check-then-insert as one store call, under the lock
    fn persist(
        &self,
        record_id: RecordId,
        result: &ClassificationResult,
    ) -> Result<PersistOutcome, PipelineError> {
        let mut store = self
            .store
            .lock()
            .map_err(|e| PipelineError::Store(format!("Store lock error: {}", e)))?;
        store
            .persist_result_once(record_id, result)
            .map_err(|e| PipelineError::Store(e.to_string()))
    }
}
