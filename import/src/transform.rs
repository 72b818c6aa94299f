//! Field-level conversions from dump documents to store values.

use bson::{Bson, Document};
use flow_core::Answer;

use crate::error::{ImportError, Result};

/// Longest `program_name` kept on import. Longer values are pasted
/// transcripts rather than program names.
pub const MAX_PROGRAM_LEN: usize = 256;

/// Maps an optional survey value onto a three-valued answer.
///
/// Missing and null values are unanswered. Anything else is read for
/// truthiness: zero, empty strings and `false` are "no", everything else is
/// "yes".
///
/// # Examples
///
/// ```
/// use bson::Bson;
/// use flow_core::Answer;
/// use flow_import::trinary;
///
/// assert_eq!(trinary(None), Answer::Unknown);
/// assert_eq!(trinary(Some(&Bson::Null)), Answer::Unknown);
/// assert_eq!(trinary(Some(&Bson::Double(0.0))), Answer::No);
/// assert_eq!(trinary(Some(&Bson::Double(0.6))), Answer::Yes);
/// ```
pub fn trinary(value: Option<&Bson>) -> Answer {
    let truthy = match value {
        None | Some(Bson::Null) | Some(Bson::Undefined) => return Answer::Unknown,
        Some(Bson::Boolean(b)) => *b,
        Some(Bson::Int32(n)) => *n != 0,
        Some(Bson::Int64(n)) => *n != 0,
        Some(Bson::Double(n)) => *n != 0.0,
        Some(Bson::String(s)) => !s.is_empty(),
        Some(Bson::Array(items)) => !items.is_empty(),
        Some(Bson::Document(doc)) => !doc.is_empty(),
        Some(_) => true,
    };
    Answer::from(truthy)
}

/// Joins first and last name with a space and trims the result.
pub fn full_name(doc: &Document) -> String {
    let first = doc.get_str("first_name").unwrap_or_default();
    let last = doc.get_str("last_name").unwrap_or_default();
    format!("{first} {last}").trim().to_string()
}

/// Returns a string field, mapping absent, non-string, empty and blank
/// values to `None`.
pub fn non_blank(doc: &Document, key: &str) -> Option<String> {
    doc.get_str(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Returns `program_name` unless it is blank or implausibly long.
pub fn program(doc: &Document) -> Option<String> {
    non_blank(doc, "program_name").filter(|p| p.chars().count() <= MAX_PROGRAM_LEN)
}

/// Returns a required string field.
pub fn required_str<'a>(
    doc: &'a Document,
    collection: &'static str,
    field: &'static str,
) -> Result<&'a str> {
    doc.get_str(field)
        .map_err(|_| ImportError::MissingField { collection, field })
}

/// Returns a review sub-document, or an empty one when it is absent.
pub fn sub_document<'a>(doc: &'a Document, key: &str) -> &'a Document {
    static EMPTY: std::sync::OnceLock<Document> = std::sync::OnceLock::new();
    doc.get_document(key)
        .unwrap_or_else(|_| EMPTY.get_or_init(Document::new))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_trinary_truthiness() {
        assert_eq!(trinary(Some(&Bson::Boolean(false))), Answer::No);
        assert_eq!(trinary(Some(&Bson::Boolean(true))), Answer::Yes);
        assert_eq!(trinary(Some(&Bson::Int32(0))), Answer::No);
        assert_eq!(trinary(Some(&Bson::Int64(3))), Answer::Yes);
        assert_eq!(trinary(Some(&Bson::String(String::new()))), Answer::No);
        assert_eq!(trinary(Some(&Bson::String("no".into()))), Answer::Yes);
    }

    #[test]
    fn test_full_name_trims_missing_parts() {
        assert_eq!(full_name(&doc! { "first_name": "Ada", "last_name": "Lovelace" }), "Ada Lovelace");
        assert_eq!(full_name(&doc! { "first_name": "Cher", "last_name": "" }), "Cher");
        assert_eq!(full_name(&doc! { "last_name": "Hopper" }), "Hopper");
        assert_eq!(full_name(&doc! {}), "");
    }

    #[test]
    fn test_non_blank() {
        let doc = doc! { "a": "", "b": "   ", "c": "text", "d": 4 };
        assert_eq!(non_blank(&doc, "a"), None);
        assert_eq!(non_blank(&doc, "b"), None);
        assert_eq!(non_blank(&doc, "c").as_deref(), Some("text"));
        assert_eq!(non_blank(&doc, "d"), None);
        assert_eq!(non_blank(&doc, "missing"), None);
    }

    #[test]
    fn test_program_drops_long_values() {
        let long = "x".repeat(MAX_PROGRAM_LEN + 1);
        assert_eq!(program(&doc! { "program_name": long }), None);

        let exact = "y".repeat(MAX_PROGRAM_LEN);
        assert_eq!(program(&doc! { "program_name": exact.clone() }), Some(exact));
    }

    #[test]
    fn test_required_str_reports_field() {
        let err = required_str(&doc! { "name": 1 }, "course", "name").unwrap_err();
        assert!(matches!(
            err,
            ImportError::MissingField { collection: "course", field: "name" }
        ));
    }

    #[test]
    fn test_sub_document_defaults_to_empty() {
        let doc = doc! { "course_review": { "comment": "ok" } };
        assert_eq!(sub_document(&doc, "course_review").get_str("comment").unwrap(), "ok");
        assert!(sub_document(&doc, "professor_review").is_empty());
    }
}
