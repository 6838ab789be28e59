//! Result schema adapter
//!
//! Translates a [`ResultSchema`] into the JSON schema a provider uses to
//! constrain its output, and turns the provider's raw text back into a typed
//! [`ClassificationResult`].

use crate::error::{ParseError, PipelineError};
use classifier_domain::{is_internal_field, ClassificationResult, Field, FieldType, FieldValue, ResultSchema};
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::LazyLock;

/// A ```` ```json ```` fenced block; the tag may be separated from the backticks
static RE_JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```\s*json\s*(.*?)\s*```").unwrap());

/// JSON schema type keyword for a field type
fn json_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::String => "string",
        FieldType::Integer => "integer",
        FieldType::Float => "number",
        FieldType::Boolean => "boolean",
        _ => "string",
    }
}

/// Build the constrained-output schema for a result schema
///
/// Internal identifier fields are left out. Optional fields are described by
/// their non-null type and simply omitted from `required`.
pub fn to_provider_schema(schema: &ResultSchema) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for field in schema.output_fields() {
        properties.insert(
            field.name.clone(),
            json!({ "type": json_type(field.field_type) }),
        );
        if field.required {
            required.push(Value::String(field.name.clone()));
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Check that a result schema can be requested from a provider
///
/// # Errors
///
/// Returns [`PipelineError::Config`] for an empty schema, a duplicated field
/// name, or a binary field.
pub fn validate_result_schema(schema: &ResultSchema) -> Result<(), PipelineError> {
    let mut seen = HashSet::new();
    for field in &schema.fields {
        if !seen.insert(field.name.as_str()) {
            return Err(PipelineError::Config(format!(
                "Result schema {} declares '{}' more than once",
                schema.name, field.name
            )));
        }
        if field.field_type == FieldType::Binary && !is_internal_field(&field.name) {
            return Err(PipelineError::Config(format!(
                "Result schema {} field '{}' cannot be binary",
                schema.name, field.name
            )));
        }
    }

    if schema.output_fields().next().is_none() {
        return Err(PipelineError::Config(format!(
            "Result schema {} has no output fields",
            schema.name
        )));
    }
    Ok(())
}

/// Pull the JSON payload out of a provider response
///
/// A ```` ```json ```` fenced block wins; otherwise surrounding whitespace
/// and one layer of quote characters are removed.
pub fn extract_json(raw: &str) -> &str {
    if let Some(body) = RE_JSON_FENCE.captures(raw).and_then(|c| c.get(1)) {
        return body.as_str();
    }

    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix(['"', '\''])
        .unwrap_or(trimmed);
    trimmed.strip_suffix(['"', '\'']).unwrap_or(trimmed)
}

/// Parse raw provider output against a result schema
///
/// # Errors
///
/// Returns a [`ParseError`] if the payload is not a JSON object, a required
/// field is missing, or a value cannot be coerced to its declared type.
pub fn parse_response(raw: &str, schema: &ResultSchema) -> Result<ClassificationResult, ParseError> {
    let value: Value = serde_json::from_str(extract_json(raw))?;
    let object = match value {
        Value::Object(object) => object,
        other => return Err(ParseError::NotAnObject(other.to_string())),
    };

    let mut values = Vec::new();
    for field in schema.output_fields() {
        let value = match object.get(&field.name) {
            None | Some(Value::Null) if field.required => {
                return Err(ParseError::MissingField(field.name.clone()));
            }
            None | Some(Value::Null) => FieldValue::Null,
            Some(v) => coerce(v, field.field_type).ok_or_else(|| ParseError::InvalidValue {
                field: field.name.clone(),
                expected: field.field_type,
                found: v.to_string(),
            })?,
        };
        values.push(Field::new(field.name.clone(), value));
    }

    Ok(ClassificationResult::new(values))
}

fn coerce(value: &Value, field_type: FieldType) -> Option<FieldValue> {
    match (field_type, value) {
        (FieldType::String, Value::String(s)) => Some(FieldValue::String(s.clone())),
        (FieldType::Integer, Value::Number(n)) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            })
            .map(FieldValue::Integer),
        (FieldType::Integer, Value::String(s)) => s.trim().parse().ok().map(FieldValue::Integer),
        (FieldType::Float, Value::Number(n)) => {
            n.as_f64().filter(|x| x.is_finite()).map(FieldValue::Float)
        }
        (FieldType::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .map(FieldValue::Float),
        (FieldType::Boolean, Value::Bool(b)) => Some(FieldValue::Boolean(*b)),
        (FieldType::Boolean, Value::String(s)) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") {
                Some(FieldValue::Boolean(true))
            } else if s.eq_ignore_ascii_case("false") {
                Some(FieldValue::Boolean(false))
            } else {
                None
            }
        }
        _ => None,
    }
}
