//! Record module - the unit of input data to be classified

use crate::schema::FieldType;
use std::fmt;

/// Storage-assigned identifier of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(i64);

impl RecordId {
    /// Wrap a raw row identifier
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the raw row identifier
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A typed field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Absent value of an optional field
    Null,
    /// UTF-8 text
    String(String),
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit float
    Float(f64),
    /// Boolean
    Boolean(bool),
    /// Raw bytes
    Binary(Vec<u8>),
}

impl FieldValue {
    /// Type of the value, or `None` for [`FieldValue::Null`]
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            FieldValue::Null => None,
            FieldValue::String(_) => Some(FieldType::String),
            FieldValue::Integer(_) => Some(FieldType::Integer),
            FieldValue::Float(_) => Some(FieldType::Float),
            FieldValue::Boolean(_) => Some(FieldType::Boolean),
            FieldValue::Binary(_) => Some(FieldType::Binary),
        }
    }

    /// Returns true for [`FieldValue::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Borrow the bytes of a binary value
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Borrow the text of a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get an integer value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

/// Text form used when a value is substituted into a prompt.
///
/// Null renders as the empty string. Binary values render as their length
/// only; callers are expected to send them as attachments instead.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::String(s) => f.write_str(s),
            FieldValue::Integer(n) => write!(f, "{}", n),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Binary(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        FieldValue::Binary(value)
    }
}

/// A named field value
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field name
    pub name: String,
    /// Field value
    pub value: FieldValue,
}

impl Field {
    /// Create a field
    pub fn new(name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Look up a field value by name in an ordered field list
pub(crate) fn lookup<'a>(fields: &'a [Field], name: &str) -> Option<&'a FieldValue> {
    fields.iter().find(|f| f.name == name).map(|f| &f.value)
}

/// A record that has not been persisted yet
///
/// The storage layer assigns the identifier and creation timestamp on insert.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewRecord {
    /// Fields in order
    pub fields: Vec<Field>,
}

impl NewRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.push(Field::new(name, value));
        self
    }

    /// Look up a field value by name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        lookup(&self.fields, name)
    }
}

/// A persisted record
///
/// Records are immutable once created. Deleting a record also deletes its
/// classification result.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Unique identifier
    pub id: RecordId,

    /// Fields in order
    pub fields: Vec<Field>,

    /// When this record was created (seconds since the Unix epoch)
    pub created_at: u64,
}

impl Record {
    /// Look up a field value by name
    ///
    /// # Examples
    ///
    /// ```
    /// use classifier_domain::{Field, FieldValue, Record, RecordId};
    ///
    /// let record = Record {
    ///     id: RecordId::new(1),
    ///     fields: vec![Field::new("title", "Hello")],
    ///     created_at: 0,
    /// };
    /// assert_eq!(record.get("title"), Some(&FieldValue::from("Hello")));
    /// assert_eq!(record.get("body"), None);
    /// ```
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        lookup(&self.fields, name)
    }

    /// Non-null binary fields in record order
    pub fn binary_fields(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.fields
            .iter()
            .filter_map(|f| f.value.as_binary().map(|bytes| (f.name.as_str(), bytes)))
    }
}
