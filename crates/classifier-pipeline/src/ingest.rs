//! Record ingestion from external sources
//!
//! A source either hands over every record at once ([`BulkSource`]) or lists
//! identifiers and fetches records one by one ([`ListingSource`]). Either way
//! each record is stored on its own, so one bad record never blocks the rest.
//!
//! Sources are queried once per input type. Every stored record carries its
//! input type in the [`INPUT_TYPE_FIELD`] field.

use crate::error::PipelineError;
use crate::types::IngestReport;
use async_trait::async_trait;
use classifier_domain::traits::RecordStore;
use classifier_domain::{FieldValue, NewRecord};
use tracing::{debug, info, info_span, warn, Instrument};

/// Record field holding the input type a record was downloaded under
pub const INPUT_TYPE_FIELD: &str = "input_type";

/// A source that returns all of its records of one input type in one call
#[async_trait]
pub trait BulkSource: Send + Sync {
    /// Fetch every record of `input_type`
    async fn fetch_all(&self, input_type: &str) -> anyhow::Result<Vec<NewRecord>>;
}

/// A source that lists identifiers, then fetches records individually
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Identifiers of the records available for `input_type`
    async fn list_ids(&self, input_type: &str) -> anyhow::Result<Vec<String>>;

    /// Fetch one record; `None` means there is nothing to store for this id
    async fn fetch(&self, id: &str) -> anyhow::Result<Option<NewRecord>>;
}

/// How records are obtained
pub enum Downloader {
    /// Everything in one call
    Bulk(Box<dyn BulkSource>),
    /// List, then fetch one at a time
    Listing(Box<dyn ListingSource>),
}

impl Downloader {
    /// Wrap a bulk source
    pub fn bulk(source: impl BulkSource + 'static) -> Self {
        Downloader::Bulk(Box::new(source))
    }

    /// Wrap a listing source
    pub fn listing(source: impl ListingSource + 'static) -> Self {
        Downloader::Listing(Box::new(source))
    }
}

/// Pull records of each input type from a downloader into the store
///
/// Input types are processed in order. A record without an
/// [`INPUT_TYPE_FIELD`] field is tagged with the input type it was fetched
/// under; a source that sets the field itself is left alone.
///
/// # Errors
///
/// Returns [`PipelineError::Ingest`] only if the source cannot enumerate its
/// records for an input type. Records stored before that point stay stored.
/// Individual fetch or store failures are logged and counted.
pub async fn ingest<S>(
    downloader: &Downloader,
    input_types: &[String],
    store: &mut S,
) -> Result<IngestReport, PipelineError>
where
    S: RecordStore,
    S::Error: std::fmt::Display,
{
    let mut report = IngestReport::default();

    for input_type in input_types {
        let span = info_span!("ingest", input_type = %input_type);
        ingest_input_type(downloader, input_type, store, &mut report)
            .instrument(span)
            .await?;
    }

    info!(
        input_types = input_types.len(),
        stored = report.record_ids.len(),
        skipped = report.skipped,
        failed = report.failed,
        "Ingestion complete"
    );
    Ok(report)
}

async fn ingest_input_type<S>(
    downloader: &Downloader,
    input_type: &str,
    store: &mut S,
    report: &mut IngestReport,
) -> Result<(), PipelineError>
where
    S: RecordStore,
    S::Error: std::fmt::Display,
{
    let enumerate_failed =
        |e: anyhow::Error| PipelineError::Ingest(format!("{}: {:#}", input_type, e));

    match downloader {
        Downloader::Bulk(source) => {
            let records = source.fetch_all(input_type).await.map_err(enumerate_failed)?;
            debug!(count = records.len(), "Bulk source returned records");

            for record in records {
                store_one(store, tag(record, input_type), report);
            }
        }
        Downloader::Listing(source) => {
            let ids = source.list_ids(input_type).await.map_err(enumerate_failed)?;
            debug!(count = ids.len(), "Listing source returned ids");

            for id in ids {
                match source.fetch(&id).await {
                    Ok(Some(record)) => store_one(store, tag(record, input_type), report),
                    Ok(None) => {
                        debug!(source_id = %id, "Nothing to store");
                        report.skipped += 1;
                    }
                    Err(e) => {
                        let reason = format!("{:#}", e);
                        warn!(source_id = %id, error = %reason, "Failed to fetch record");
                        report.failed += 1;
                    }
                }
            }
        }
    }

    Ok(())
}

fn tag(record: NewRecord, input_type: &str) -> NewRecord {
    if record.get(INPUT_TYPE_FIELD).is_some() {
        record
    } else {
        record.with_field(INPUT_TYPE_FIELD, input_type)
    }
}

fn store_one<S>(store: &mut S, record: NewRecord, report: &mut IngestReport)
where
    S: RecordStore,
    S::Error: std::fmt::Display,
{
    match store.insert_record(record) {
        Ok(id) => report.record_ids.push(id),
        Err(e) => {
            warn!(error = %e, "Failed to store record");
            report.failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_adds_input_type() {
        let record = tag(NewRecord::new().with_field("title", "t"), "8-K");
        assert_eq!(record.get(INPUT_TYPE_FIELD), Some(&FieldValue::from("8-K")));
        assert_eq!(record.fields.len(), 2);
    }

    #[test]
    fn test_tag_keeps_source_input_type() {
        let record = NewRecord::new().with_field(INPUT_TYPE_FIELD, "10-K");
        let record = tag(record, "8-K");
        assert_eq!(record.get(INPUT_TYPE_FIELD), Some(&FieldValue::from("10-K")));
        assert_eq!(record.fields.len(), 1);
    }
}
