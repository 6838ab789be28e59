//! Field-descriptor tables for record and result types
//!
//! Records and classification results are described by explicit, ordered
//! descriptor tables built when the schema is defined. Nothing in the pipeline
//! inspects concrete Rust types to discover fields.

use std::fmt;

/// Field names reserved for identifiers managed by the storage layer.
///
/// These are never requested from or supplied by the LLM, and never need a
/// placeholder in a prompt template.
pub const INTERNAL_FIELDS: [&str; 2] = ["id", "record_id"];

/// Returns true if `name` is a storage-managed identifier field
pub fn is_internal_field(name: &str) -> bool {
    INTERNAL_FIELDS.contains(&name)
}

/// Primitive type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// UTF-8 text
    String,
    /// 64-bit signed integer
    Integer,
    /// 64-bit float
    Float,
    /// Boolean
    Boolean,
    /// Raw bytes (images and other media)
    Binary,
}

impl FieldType {
    /// Lowercase name used in storage and log output
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Binary => "binary",
        }
    }

    /// Parse a type name as produced by [`FieldType::as_str`]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(FieldType::String),
            "integer" => Some(FieldType::Integer),
            "float" => Some(FieldType::Float),
            "boolean" => Some(FieldType::Boolean),
            "binary" => Some(FieldType::Binary),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description of one named field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name
    pub name: String,

    /// Declared primitive type
    pub field_type: FieldType,

    /// Required fields are non-nullable and have no default
    pub required: bool,
}

impl FieldDescriptor {
    /// A required field
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
        }
    }

    /// An optional (nullable or defaulted) field
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }
}

fn find<'a>(fields: &'a [FieldDescriptor], name: &str) -> Option<&'a FieldDescriptor> {
    fields.iter().find(|f| f.name == name)
}

/// Describes the fields of a record type
///
/// # Examples
///
/// ```
/// use classifier_domain::{FieldType, RecordSchema};
///
/// let schema = RecordSchema::new("Post")
///     .with_required("title", FieldType::String)
///     .with_optional("image", FieldType::Binary);
///
/// assert!(schema.field("title").unwrap().required);
/// assert!(schema.field("missing").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    /// Name of the record type, used in error messages
    pub name: String,

    /// Fields in declaration order
    pub fields: Vec<FieldDescriptor>,
}

impl RecordSchema {
    /// Create an empty schema
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a required field
    pub fn with_required(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldDescriptor::required(name, field_type));
        self
    }

    /// Append an optional field
    pub fn with_optional(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldDescriptor::optional(name, field_type));
        self
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        find(&self.fields, name)
    }

    /// Required fields that callers must supply (internal identifiers excluded)
    pub fn required_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(|f| f.required && !is_internal_field(&f.name))
    }
}

/// Describes the expected shape of a classification result
///
/// Supplied by the caller per batch and immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSchema {
    /// Name of the result type; also sent to the provider as the schema name
    pub name: String,

    /// Fields in declaration order
    pub fields: Vec<FieldDescriptor>,
}

impl ResultSchema {
    /// Create an empty schema
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a required field
    pub fn with_required(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldDescriptor::required(name, field_type));
        self
    }

    /// Append an optional field
    pub fn with_optional(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldDescriptor::optional(name, field_type));
        self
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        find(&self.fields, name)
    }

    /// Fields the LLM is asked to produce
    pub fn output_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| !is_internal_field(&f.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_round_trip() {
        for ty in [
            FieldType::String,
            FieldType::Integer,
            FieldType::Float,
            FieldType::Boolean,
            FieldType::Binary,
        ] {
            assert_eq!(FieldType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(FieldType::parse("decimal"), None);
    }

    #[test]
    fn test_required_fields_skip_internal() {
        let schema = RecordSchema::new("Input")
            .with_required("id", FieldType::Integer)
            .with_required("input_text", FieldType::String)
            .with_optional("extra_field", FieldType::String);

        let required: Vec<_> = schema.required_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(required, vec!["input_text"]);
    }

    #[test]
    fn test_output_fields_skip_internal() {
        let schema = ResultSchema::new("Response")
            .with_optional("id", FieldType::Integer)
            .with_required("score", FieldType::Integer)
            .with_optional("record_id", FieldType::Integer);

        let names: Vec<_> = schema.output_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["score"]);
    }
}
