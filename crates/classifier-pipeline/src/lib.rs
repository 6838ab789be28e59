//! Classifier Pipeline
//!
//! Classifies stored records with an LLM and persists one result per record.
//!
//! # Overview
//!
//! A batch is a list of record ids, a prompt template and a result schema.
//! The template is checked against the record type before anything else
//! happens. Each record is then rendered into a prompt (binary fields travel
//! as base64 attachments), sent to the provider under a process-wide
//! concurrency limit, parsed against the result schema and stored, unless a
//! result for that record already exists.
//!
//! # Architecture
//!
//! ```text
//! ids → BatchCoordinator → PromptTemplate → ClassificationClient → LLM
//!                 │                                   │
//!                 └──────── RecordStore ◄── parse ◄───┘
//! ```
//!
//! # Key Features
//!
//! - **Fail-fast templates**: Unknown placeholders and missing required fields
//!   are rejected before any record is processed
//! - **Bounded concurrency**: One shared semaphore caps in-flight provider calls
//! - **Rate-limit retry**: Capped exponential backoff, for rate limiting only
//! - **At-most-once persistence**: Transactional check-then-insert per record
//! - **Failure isolation**: One bad record never stops the batch
//! - **Ingestion**: Bulk or listing downloaders feed the record store, one
//!   input type at a time
//!
//! # Example Usage
//!
//! ```no_run
//! use classifier_domain::traits::RecordStore;
//! use classifier_domain::{FieldType, RecordSchema, ResultSchema};
//! use classifier_llm::MockProvider;
//! use classifier_pipeline::{BatchCoordinator, ClassificationClient, PipelineConfig};
//! use classifier_store::SqliteStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::default();
//! let client = ClassificationClient::new(
//!     MockProvider::new(r#"{"label": "positive"}"#),
//!     config.limiter(),
//!     config,
//! );
//!
//! let records = RecordSchema::new("Review").with_required("text", FieldType::String);
//! let results = ResultSchema::new("Sentiment").with_required("label", FieldType::String);
//! let store = SqliteStore::new("reviews.db")?;
//! let coordinator = BatchCoordinator::new(client, store, records);
//!
//! let ids = coordinator.store().lock().unwrap().list_record_ids()?;
//! let report = coordinator
//!     .classify_batch(&ids, "What is the sentiment of: {text}", &results)
//!     .await?;
//!
//! println!("Persisted: {}", report.persisted);
//! println!("Already classified: {}", report.already_classified);
//! println!("Failed: {}", report.failed.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod client;
mod config;
mod coordinator;
mod error;
mod ingest;
mod prompt;
mod schema;
mod types;


pub use client::ClassificationClient;
pub use config::{PipelineConfig, DEFAULT_MODEL};
pub use coordinator::BatchCoordinator;
pub use error::{ClassificationError, ParseError, PipelineError, TemplateError};
pub use ingest::{ingest, BulkSource, Downloader, ListingSource, INPUT_TYPE_FIELD};
pub use prompt::{extract_placeholders, guess_media_type, Attachment, PromptTemplate, RenderedPrompt};
pub use schema::{extract_json, parse_response, to_provider_schema, validate_result_schema};
pub use types::{BatchReport, IngestReport, RecordOutcome};
