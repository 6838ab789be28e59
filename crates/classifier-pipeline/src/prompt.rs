//! Prompt templates rendered against records
//!
//! A template is plain text with `{field}` placeholders. `{{` and `}}` stand
//! for literal braces. Templates are checked against the record type once,
//! when they are built; rendering a record can then only fail if the record
//! itself is missing a required field.

use crate::error::{PipelineError, TemplateError};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use classifier_domain::{FieldValue, Record, RecordSchema};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Escaped braces or a `{name}` placeholder
static RE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{|\}\}|\{(\w+)\}").unwrap());

/// Names of the placeholders in `template`, in order of appearance
fn scan(template: &str) -> Vec<String> {
    RE_PLACEHOLDER
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Extract and validate the placeholders of a template
///
/// # Errors
///
/// - [`TemplateError::UnknownField`] for the first placeholder the record
///   type does not declare
/// - [`TemplateError::MissingRequiredField`] for the first required field
///   (other than internal identifiers) with no placeholder
pub fn extract_placeholders(
    template: &str,
    schema: &RecordSchema,
) -> Result<Vec<String>, TemplateError> {
    let placeholders = scan(template);

    if let Some(unknown) = placeholders.iter().find(|p| schema.field(p).is_none()) {
        return Err(TemplateError::UnknownField {
            field: unknown.clone(),
            schema: schema.name.clone(),
        });
    }

    if let Some(missing) = schema
        .required_fields()
        .find(|f| !placeholders.contains(&f.name))
    {
        return Err(TemplateError::MissingRequiredField {
            field: missing.name.clone(),
            schema: schema.name.clone(),
        });
    }

    Ok(placeholders)
}

/// A template validated against a record type
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    text: String,
    placeholders: Vec<String>,
    required: HashSet<String>,
}

impl PromptTemplate {
    /// Validate `text` against `schema`
    pub fn new(text: impl Into<String>, schema: &RecordSchema) -> Result<Self, TemplateError> {
        let text = text.into();
        let placeholders = extract_placeholders(&text, schema)?;
        let required = placeholders
            .iter()
            .filter(|p| schema.field(p).is_some_and(|f| f.required))
            .cloned()
            .collect();
        Ok(Self {
            text,
            placeholders,
            required,
        })
    }

    /// Raw template text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Placeholder names in order of appearance, repeats included
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// Render the template for one record
    ///
    /// Binary fields are never written into the text. Each non-null binary
    /// field on the record becomes an [`Attachment`], and a placeholder that
    /// names one renders as `[attachment: <name>]`. An optional field the
    /// record does not carry renders like `Null`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingField`] if the record has no field for
    /// a required placeholder.
    pub fn render(&self, record: &Record) -> Result<RenderedPrompt, PipelineError> {
        let mut text = String::with_capacity(self.text.len());
        let mut last = 0;

        for caps in RE_PLACEHOLDER.captures_iter(&self.text) {
            let Some(whole) = caps.get(0) else { continue };
            text.push_str(&self.text[last..whole.start()]);
            last = whole.end();

            let Some(name) = caps.get(1) else {
                // `{{` or `}}`
                text.push_str(&whole.as_str()[..1]);
                continue;
            };

            let value = match record.get(name.as_str()) {
                Some(value) => value,
                None if self.required.contains(name.as_str()) => {
                    return Err(PipelineError::MissingField {
                        record_id: record.id,
                        field: name.as_str().to_string(),
                    });
                }
                None => &FieldValue::Null,
            };
            match value {
                FieldValue::Binary(_) => {
                    text.push_str(&format!("[attachment: {}]", name.as_str()));
                }
                other => text.push_str(&other.to_string()),
            }
        }
        text.push_str(&self.text[last..]);

        let attachments = record
            .binary_fields()
            .map(|(field, bytes)| Attachment::new(field, bytes))
            .collect();

        Ok(RenderedPrompt { text, attachments })
    }
}

/// A prompt ready to send
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    /// Prompt text with placeholders substituted
    pub text: String,
    /// Media parts, in record field order
    pub attachments: Vec<Attachment>,
}

/// A base64-encoded media payload accompanying a prompt
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    /// Record field the payload came from
    pub field: String,
    /// Guessed media type
    pub media_type: &'static str,
    /// Base64 (standard alphabet, padded)
    pub data: String,
}

impl Attachment {
    /// Encode raw bytes from a record field
    pub fn new(field: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            field: field.into(),
            media_type: guess_media_type(bytes),
            data: BASE64.encode(bytes),
        }
    }

    /// `data:` URL form used in provider requests
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

/// Guess a media type from leading magic bytes
pub fn guess_media_type(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        [b'%', b'P', b'D', b'F', ..] => "application/pdf",
        _ => "application/octet-stream",
    }
}
