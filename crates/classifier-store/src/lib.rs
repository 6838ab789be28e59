//! Classifier Storage Layer
//!
//! Implements the RecordStore trait using SQLite.
//!
//! # Architecture
//!
//! - `records` / `record_fields`: input records, one row per field value
//! - `results` / `result_fields`: classification results, at most one per record
//! - Foreign keys with `ON DELETE CASCADE` so deleting a record removes its result
//!
//! # Examples
//!
//! ```no_run
//! use classifier_store::SqliteStore;
//!
//! let store = SqliteStore::new(":memory:").unwrap();
//! // Store is now ready for record operations
//! ```

#![warn(missing_docs)]

use classifier_domain::traits::RecordStore;
use classifier_domain::{
    ClassificationResult, Field, FieldType, FieldValue, NewRecord, PersistOutcome, Record,
    RecordId, StoredResult,
};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(RecordId),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Which field table a row set belongs to
#[derive(Clone, Copy)]
enum FieldTable {
    Record,
    Result,
}

impl FieldTable {
    fn insert_sql(self) -> &'static str {
        match self {
            FieldTable::Record => {
                "INSERT INTO record_fields (record_id, position, name, kind, text_value, int_value, real_value, blob_value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            }
            FieldTable::Result => {
                "INSERT INTO result_fields (result_id, position, name, kind, text_value, int_value, real_value, blob_value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            }
        }
    }

    fn select_sql(self) -> &'static str {
        match self {
            FieldTable::Record => {
                "SELECT name, kind, text_value, int_value, real_value, blob_value
                 FROM record_fields WHERE record_id = ?1 ORDER BY position"
            }
            FieldTable::Result => {
                "SELECT name, kind, text_value, int_value, real_value, blob_value
                 FROM result_fields WHERE result_id = ?1 ORDER BY position"
            }
        }
    }
}

/// SQLite-based implementation of RecordStore
///
/// # Thread Safety
///
/// SQLite connections are not thread-safe. Share a store between tasks behind
/// a mutex, or give each thread its own SqliteStore instance.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Create a new SqliteStore with the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use classifier_store::SqliteStore;
    ///
    /// let store = SqliteStore::new("classifier.db").unwrap();
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create a store backed by a private in-memory database
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::new(":memory:")
    }

    /// Initialize the database schema
    fn initialize_schema(&mut self) -> Result<(), StoreError> {
        // Cascades only fire when foreign key enforcement is on for this connection
        self.conn.pragma_update(None, "foreign_keys", true)?;

        let schema = include_str!("schema.sql");
        self.conn.execute_batch(schema)?;

        Ok(())
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    fn write_fields(
        conn: &Connection,
        table: FieldTable,
        owner_id: i64,
        fields: &[Field],
    ) -> Result<(), StoreError> {
        let mut stmt = conn.prepare(table.insert_sql())?;

        for (position, field) in fields.iter().enumerate() {
            let (kind, text, int, real, blob): (
                &str,
                Option<&str>,
                Option<i64>,
                Option<f64>,
                Option<&[u8]>,
            ) = match &field.value {
                FieldValue::Null => ("null", None, None, None, None),
                FieldValue::String(s) => (FieldType::String.as_str(), Some(s.as_str()), None, None, None),
                FieldValue::Integer(n) => (FieldType::Integer.as_str(), None, Some(*n), None, None),
                // SQLite turns NaN into NULL and the row could never be read back.
                FieldValue::Float(x) if !x.is_finite() => {
                    return Err(StoreError::InvalidData(format!(
                        "field '{}' holds non-finite float {}",
                        field.name, x
                    )));
                }
                FieldValue::Float(x) => (FieldType::Float.as_str(), None, None, Some(*x), None),
                FieldValue::Boolean(b) => {
                    (FieldType::Boolean.as_str(), None, Some(i64::from(*b)), None, None)
                }
                FieldValue::Binary(bytes) => {
                    (FieldType::Binary.as_str(), None, None, None, Some(bytes.as_slice()))
                }
            };

            stmt.execute(params![
                owner_id,
                position as i64,
                &field.name,
                kind,
                text,
                int,
                real,
                blob,
            ])?;
        }

        Ok(())
    }

    fn read_fields(
        conn: &Connection,
        table: FieldTable,
        owner_id: i64,
    ) -> Result<Vec<Field>, StoreError> {
        let mut stmt = conn.prepare(table.select_sql())?;

        let fields = stmt
            .query_map(params![owner_id], |row| {
                let name: String = row.get(0)?;
                let kind: String = row.get(1)?;

                let value = if kind == "null" {
                    FieldValue::Null
                } else {
                    match FieldType::parse(&kind) {
                        Some(FieldType::String) => FieldValue::String(row.get(2)?),
                        Some(FieldType::Integer) => FieldValue::Integer(row.get(3)?),
                        Some(FieldType::Boolean) => FieldValue::Boolean(row.get::<_, i64>(3)? != 0),
                        Some(FieldType::Float) => FieldValue::Float(row.get(4)?),
                        Some(FieldType::Binary) => FieldValue::Binary(row.get(5)?),
                        None => {
                            return Err(rusqlite::Error::FromSqlConversionFailure(
                                1,
                                rusqlite::types::Type::Text,
                                Box::new(StoreError::InvalidData(format!(
                                    "Unknown field kind: {}",
                                    kind
                                ))),
                            ))
                        }
                    }
                };

                Ok(Field { name, value })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(fields)
    }

    fn is_unique_violation(err: &rusqlite::Error) -> bool {
        matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == ErrorCode::ConstraintViolation
                    && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        )
    }
}

impl RecordStore for SqliteStore {
    type Error = StoreError;

    fn insert_record(&mut self, record: NewRecord) -> Result<RecordId, Self::Error> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO records (created_at) VALUES (?1)",
            params![Self::now()],
        )?;
        let id = tx.last_insert_rowid();
        Self::write_fields(&tx, FieldTable::Record, id, &record.fields)?;

        tx.commit()?;
        Ok(RecordId::new(id))
    }

    fn get_record(&self, id: RecordId) -> Result<Option<Record>, Self::Error> {
        let created_at: Option<i64> = self
            .conn
            .query_row(
                "SELECT created_at FROM records WHERE id = ?1",
                params![id.value()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(created_at) = created_at else {
            return Ok(None);
        };

        let fields = Self::read_fields(&self.conn, FieldTable::Record, id.value())?;

        Ok(Some(Record {
            id,
            fields,
            created_at: created_at as u64,
        }))
    }

    fn delete_record(&mut self, id: RecordId) -> Result<bool, Self::Error> {
        let deleted = self
            .conn
            .execute("DELETE FROM records WHERE id = ?1", params![id.value()])?;
        Ok(deleted > 0)
    }

    fn list_record_ids(&self) -> Result<Vec<RecordId>, Self::Error> {
        let mut stmt = self.conn.prepare("SELECT id FROM records ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0).map(RecordId::new))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn has_result(&self, record_id: RecordId) -> Result<bool, Self::Error> {
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM results WHERE record_id = ?1",
                params![record_id.value()],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(exists)
    }

    fn get_result(&self, record_id: RecordId) -> Result<Option<StoredResult>, Self::Error> {
        let row: Option<(i64, i64)> = self
            .conn
            .query_row(
                "SELECT id, created_at FROM results WHERE record_id = ?1",
                params![record_id.value()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((result_id, created_at)) = row else {
            return Ok(None);
        };

        let values = Self::read_fields(&self.conn, FieldTable::Result, result_id)?;

        Ok(Some(StoredResult {
            id: result_id,
            record_id,
            result: ClassificationResult::new(values),
            created_at: created_at as u64,
        }))
    }

    fn persist_result_once(
        &mut self,
        record_id: RecordId,
        result: &ClassificationResult,
    ) -> Result<PersistOutcome, Self::Error> {
        // IMMEDIATE takes the write lock up front, so no other connection can
        // insert between the existence check and our insert.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let record_exists = tx
            .query_row(
                "SELECT 1 FROM records WHERE id = ?1",
                params![record_id.value()],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !record_exists {
            return Err(StoreError::NotFound(record_id));
        }

        let already = tx
            .query_row(
                "SELECT 1 FROM results WHERE record_id = ?1",
                params![record_id.value()],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if already {
            return Ok(PersistOutcome::AlreadyExists);
        }

        match tx.execute(
            "INSERT INTO results (record_id, created_at) VALUES (?1, ?2)",
            params![record_id.value(), Self::now()],
        ) {
            Ok(_) => {}
            Err(e) if Self::is_unique_violation(&e) => return Ok(PersistOutcome::AlreadyExists),
            Err(e) => return Err(e.into()),
        }

        let result_id = tx.last_insert_rowid();
        Self::write_fields(&tx, FieldTable::Result, result_id, &result.values)?;

        tx.commit()?;
        Ok(PersistOutcome::Inserted)
    }

    fn count_results(&self) -> Result<usize, Self::Error> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM results", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
