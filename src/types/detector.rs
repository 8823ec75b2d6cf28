//! Type detector (C2). Given a token value, produces a `TypedValue`.
//! Pure, total: every input resolves to some variant, with STRING as
//! the sink.

use serde::{Deserialize, Serialize};

use super::timestamp::{normalize_timestamp, parse_timestamp};
use crate::tokenizer::TokenType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    String,
    Integer,
    Float,
    Bool,
    Timestamp,
    Ip,
    Uuid,
    Url,
    Email,
    Json,
    Null,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedValueData {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Timestamp(String),
    Ip(String),
    Uuid(String),
    Url(String),
    Email(String),
    Json(String),
    Null,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedValue {
    pub field_type: FieldType,
    pub raw: String,
    pub value: TypedValueData,
}

/// Order of attempts: BOOL -> INTEGER -> FLOAT -> UUID -> IP -> URL ->
/// EMAIL -> TIMESTAMP -> JSON -> STRING. `null`/empty -> NULL.
pub fn detect_type(raw: &str, token_type: TokenType) -> TypedValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        return TypedValue {
            field_type: FieldType::Null,
            raw: raw.to_owned(),
            value: TypedValueData::Null,
        };
    }

    if trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("false") {
        return TypedValue {
            field_type: FieldType::Bool,
            raw: raw.to_owned(),
            value: TypedValueData::Bool(trimmed.eq_ignore_ascii_case("true")),
        };
    }

    if let Ok(i) = trimmed.parse::<i64>() {
        return TypedValue {
            field_type: FieldType::Integer,
            raw: raw.to_owned(),
            value: TypedValueData::Integer(i),
        };
    }

    if let Ok(f) = trimmed.parse::<f64>() {
        return TypedValue {
            field_type: FieldType::Float,
            raw: raw.to_owned(),
            value: TypedValueData::Float(f),
        };
    }

    if token_type == TokenType::Uuid || is_uuid_shaped(trimmed) {
        return TypedValue {
            field_type: FieldType::Uuid,
            raw: raw.to_owned(),
            value: TypedValueData::Uuid(trimmed.to_owned()),
        };
    }

    if token_type == TokenType::Ip || is_ip_shaped(trimmed) {
        return TypedValue {
            field_type: FieldType::Ip,
            raw: raw.to_owned(),
            value: TypedValueData::Ip(trimmed.to_owned()),
        };
    }

    if token_type == TokenType::Url || trimmed.contains("://") {
        return TypedValue {
            field_type: FieldType::Url,
            raw: raw.to_owned(),
            value: TypedValueData::Url(trimmed.to_owned()),
        };
    }

    if token_type == TokenType::Email || is_email_shaped(trimmed) {
        return TypedValue {
            field_type: FieldType::Email,
            raw: raw.to_owned(),
            value: TypedValueData::Email(trimmed.to_owned()),
        };
    }

    if let Some(dt) = parse_timestamp(trimmed) {
        return TypedValue {
            field_type: FieldType::Timestamp,
            raw: raw.to_owned(),
            value: TypedValueData::Timestamp(normalize_timestamp(dt)),
        };
    }

    if looks_like_json(trimmed) {
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(trimmed) {
            return TypedValue {
                field_type: FieldType::Json,
                raw: raw.to_owned(),
                value: TypedValueData::Json(parsed.to_string()),
            };
        }
    }

    TypedValue {
        field_type: FieldType::String,
        raw: raw.to_owned(),
        value: TypedValueData::String(trimmed.to_owned()),
    }
}

fn is_uuid_shaped(s: &str) -> bool {
    let parts: Vec<&str> = s.split('-').collect();
    parts.len() == 5
        && [8, 4, 4, 4, 12]
            .iter()
            .zip(parts.iter())
            .all(|(len, part)| part.len() == *len && part.chars().all(|c| c.is_ascii_hexdigit()))
}

fn is_ip_shaped(s: &str) -> bool {
    let octets: Vec<&str> = s.split('.').collect();
    octets.len() == 4
        && octets
            .iter()
            .all(|o| !o.is_empty() && o.parse::<u16>().map(|n| n <= 255).unwrap_or(false))
}

fn is_email_shaped(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    }
}

fn looks_like_json(s: &str) -> bool {
    let first = s.chars().next();
    let last = s.chars().last();
    matches!((first, last), (Some('{'), Some('}')) | (Some('['), Some(']')))
}
