//! Application-level document guard.
//!
//! Evaluates the subset of `$jsonSchema` used by the collection validators
//! (`bsonType`, `required`, `properties`, `enum`) so documents can be checked
//! before they ever reach the server, then applies the typed model invariants.


use chrono::DateTime;
use itertools::Itertools;
use mongodb::bson::{self, Bson, Document};
use serde_json::Value;
use thiserror::Error;

use super::models::{Building, Municipality};
use super::{CollectionKind, json_schema};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(String),
    #[error("field `{path}` must be of type {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: String,
        found: &'static str,
    },
    #[error("field `{path}` must be one of [{allowed}], found {found}")]
    NotAllowed {
        path: String,
        allowed: String,
        found: String,
    },
    #[error("field `{path}`: {reason}")]
    Invariant { path: String, reason: String },
    #[error("document shape: {0}")]
    Shape(String),
}

impl ValidationError {
    #[inline]
    pub fn invariant(path: &str, reason: &str) -> Self {
        Self::Invariant {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Dotted path of the offending field, when there is one
    #[inline]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::MissingField(path)
            | Self::TypeMismatch { path, .. }
            | Self::NotAllowed { path, .. }
            | Self::Invariant { path, .. } => Some(path),
            Self::Shape(_) => None,
        }
    }
}

/// Check `document` against a `$jsonSchema` body.
#[inline]
pub fn check_schema(schema: &Document, document: &Document) -> Result<(), ValidationError> {
    check_object(schema, document, "")?;
    Ok(())
}

/// Full check for a document bound for `kind`: server-side rules first, then model invariants.
#[inline]
pub fn check_document(kind: CollectionKind, document: &Document) -> Result<(), ValidationError> {
    check_schema(&json_schema(kind), document)?;

    match kind {
        CollectionKind::Municipalities => {
            let municipality: Municipality = bson::from_document(document.clone())
                .map_err(|e| ValidationError::Shape(e.to_string()))?;
            municipality.validate()
        }
        CollectionKind::Buildings(source) => {
            let building: Building = bson::from_document(document.clone())
                .map_err(|e| ValidationError::Shape(e.to_string()))?;
            building.validate(source)
        }
    }
}

fn join_path(parent: &str, field: &str) -> String {
    if parent.is_empty() {
        field.to_string()
    } else {
        format!("{parent}.{field}")
    }
}

fn check_object(schema: &Document, object: &Document, path: &str) -> Result<(), ValidationError> {
    if let Ok(required) = schema.get_array("required") {
        for field in required.iter().filter_map(Bson::as_str) {
            if !object.contains_key(field) {
                return Err(ValidationError::MissingField(join_path(path, field)));
            }
        }
    }

    if let Ok(properties) = schema.get_document("properties") {
        for (field, rule) in properties {
            if let (Some(value), Bson::Document(rule)) = (object.get(field), rule) {
                check_value(rule, value, &join_path(path, field))?;
            }
        }
    }

    Ok(())
}

fn check_value(schema: &Document, value: &Bson, path: &str) -> Result<(), ValidationError> {
    if let Ok(expected) = schema.get_str("bsonType") {
        if !bson_type_matches(expected, value) {
            return Err(ValidationError::TypeMismatch {
                path: path.to_string(),
                expected: expected.to_string(),
                found: bson_type_name(value),
            });
        }
    }

    if let Ok(allowed) = schema.get_array("enum") {
        if !allowed.contains(value) {
            return Err(ValidationError::NotAllowed {
                path: path.to_string(),
                allowed: allowed.iter().join(", "),
                found: value.to_string(),
            });
        }
    }

    if let Bson::Document(object) = value {
        check_object(schema, object, path)?;
    }

    Ok(())
}

fn bson_type_matches(expected: &str, value: &Bson) -> bool {
    match expected {
        "number" => matches!(
            value,
            Bson::Double(_) | Bson::Int32(_) | Bson::Int64(_) | Bson::Decimal128(_)
        ),
        other => bson_type_name(value) == other,
    }
}

/// `$jsonSchema` alias of a value's BSON type
fn bson_type_name(value: &Bson) -> &'static str {
    match value {
        Bson::Double(_) => "double",
        Bson::String(_) => "string",
        Bson::Array(_) => "array",
        Bson::Document(_) => "object",
        Bson::Boolean(_) => "bool",
        Bson::Null => "null",
        Bson::RegularExpression(_) => "regex",
        Bson::JavaScriptCode(_) => "javascript",
        Bson::JavaScriptCodeWithScope(_) => "javascriptWithScope",
        Bson::Int32(_) => "int",
        Bson::Int64(_) => "long",
        Bson::Timestamp(_) => "timestamp",
        Bson::Binary(_) => "binData",
        Bson::ObjectId(_) => "objectId",
        Bson::DateTime(_) => "date",
        Bson::Symbol(_) => "symbol",
        Bson::Decimal128(_) => "decimal",
        Bson::Undefined => "undefined",
        Bson::MaxKey => "maxKey",
        Bson::MinKey => "minKey",
        Bson::DbPointer(_) => "dbPointer",
    }
}

/// Convert JSON read from disk into a BSON document.
///
/// Numbers become doubles, matching how the mongo shell stores numeric literals,
/// and `{"$date": "<RFC 3339>"}` becomes a BSON date.
#[inline]
pub fn json_to_document(value: &Value) -> Result<Document, ValidationError> {
    match json_to_bson(value)? {
        Bson::Document(document) => Ok(document),
        other => Err(ValidationError::Shape(format!(
            "expected a JSON object, found {}",
            bson_type_name(&other)
        ))),
    }
}

fn json_to_bson(value: &Value) -> Result<Bson, ValidationError> {
    Ok(match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => Bson::Double(
            n.as_f64()
                .ok_or_else(|| ValidationError::Shape(format!("number out of range: {n}")))?,
        ),
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(
            items
                .iter()
                .map(json_to_bson)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Object(map) => {
            if let (1, Some(Value::String(date))) = (map.len(), map.get("$date")) {
                let parsed = DateTime::parse_from_rfc3339(date)
                    .map_err(|e| ValidationError::Shape(format!("invalid $date {date:?}: {e}")))?;
                return Ok(Bson::DateTime(bson::DateTime::from_millis(
                    parsed.timestamp_millis(),
                )));
            }
            let mut document = Document::new();
            for (key, item) in map {
                document.insert(key.clone(), json_to_bson(item)?);
            }
            Bson::Document(document)
        }
    })
}
