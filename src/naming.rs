//! Field naming (C9). A pure heuristic mapping token context to a
//! stable, collision-free field name.

use hashbrown::HashSet;

use crate::tokenizer::{Token, TokenType};

const INDICATORS: &[&str] = &[
    "status", "user", "id", "host", "port", "path", "method", "code", "error", "time", "duration",
    "size", "bytes",
];

const HTTP_METHODS: &[&str] = &[
    "GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS", "TRACE", "CONNECT",
];

const LEVELS: &[&str] = &["INFO", "WARN", "ERROR", "DEBUG", "TRACE", "FATAL"];

/// `infer_field_name(token, index, prev_non_ws, next_non_ws, siblings, taken_names)`.
/// `index`, `next_non_ws`, and `siblings` are carried for interface
/// parity with the heuristic's context but do not currently affect the
/// decision beyond `prev_non_ws`.
pub fn infer_field_name(
    token: &Token,
    _index: usize,
    prev_non_ws: Option<&Token>,
    _next_non_ws: Option<&Token>,
    _siblings: &[Token],
    taken_names: &HashSet<String>,
) -> String {
    let base = base_name(token, prev_non_ws);
    uniquify(base, taken_names)
}

fn base_name(token: &Token, prev_non_ws: Option<&Token>) -> String {
    if let Some(prev) = prev_non_ws {
        let lower = prev.value.to_lowercase();
        if INDICATORS.contains(&lower.as_str()) {
            return lower;
        }
    }

    if token.token_type == TokenType::Word {
        let upper = token.value.to_uppercase();
        if HTTP_METHODS.contains(&upper.as_str()) {
            return "method".to_owned();
        }
        if LEVELS.contains(&upper.as_str()) {
            return "level".to_owned();
        }
        if token.value.starts_with('/') {
            return "path".to_owned();
        }
        if is_uuid_shaped(&token.value) {
            return "uuid".to_owned();
        }
    }

    if token.token_type == TokenType::Number && is_status_code(&token.value) {
        return "status".to_owned();
    }

    canonical_type_name(token.token_type).to_owned()
}

fn is_status_code(value: &str) -> bool {
    if value.len() != 3 && value.len() != 4 {
        return false;
    }
    value
        .parse::<u32>()
        .map(|n| (100..=599).contains(&n))
        .unwrap_or(false)
}

fn is_uuid_shaped(s: &str) -> bool {
    let parts: Vec<&str> = s.split('-').collect();
    parts.len() == 5
        && [8, 4, 4, 4, 12]
            .iter()
            .zip(parts.iter())
            .all(|(len, part)| part.len() == *len && part.chars().all(|c| c.is_ascii_hexdigit()))
}

fn canonical_type_name(token_type: TokenType) -> &'static str {
    match token_type {
        TokenType::Whitespace => "whitespace",
        TokenType::Word => "text",
        TokenType::Number => "value",
        TokenType::Punct => "symbol",
        TokenType::Quoted => "message",
        TokenType::Bracketed => "group",
        TokenType::Ip => "ip",
        TokenType::Timestamp => "timestamp",
        TokenType::Email => "email",
        TokenType::Url => "url",
        TokenType::Uuid => "uuid",
    }
}

fn uniquify(base: String, taken_names: &HashSet<String>) -> String {
    if !taken_names.contains(&base) {
        return base;
    }
    let mut n = 1;
    loop {
        let candidate = format!("{base}_{n}");
        if !taken_names.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Walks a tokenized line and names every non-whitespace token,
/// threading `prev_non_ws`/`next_non_ws` and enforcing uniqueness
/// across the whole line.
pub fn generate_field_names(tokens: &[Token]) -> Vec<String> {
    let non_ws_indices: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| t.token_type != TokenType::Whitespace)
        .map(|(i, _)| i)
        .collect();

    let mut taken: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(non_ws_indices.len());
    for (pos, &idx) in non_ws_indices.iter().enumerate() {
        let prev = pos.checked_sub(1).map(|p| &tokens[non_ws_indices[p]]);
        let next = non_ws_indices.get(pos + 1).map(|&n| &tokens[n]);
        let name = infer_field_name(&tokens[idx], idx, prev, next, tokens, &taken);
        taken.insert(name.clone());
        names.push(name);
    }
    names
}
