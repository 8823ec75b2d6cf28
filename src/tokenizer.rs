//! Left-to-right tokenizer (C1). Splits a single line of text into a
//! typed, ordered token sequence covering every character of the input.

use std::sync::OnceLock;

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};

/// The fixed set of token types. Order matters for `Ord`/`Hash`
/// stability of signatures but carries no scanning priority of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TokenType {
    Whitespace,
    Word,
    Number,
    Punct,
    Quoted,
    Bracketed,
    Ip,
    Timestamp,
    Email,
    Url,
    Uuid,
}

/// A contiguous slice of the source line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub token_type: TokenType,
    pub value: String,
    pub start: usize,
    pub end: usize,
}

impl Token {
    fn new(token_type: TokenType, value: &str, start: usize) -> Self {
        Token {
            token_type,
            value: value.to_owned(),
            start,
            end: start + value.len(),
        }
    }
}

/// A line's token-type signature: the ordered type sequence, ignoring
/// literal values. Used as the clustering/cache hash key.
pub type Signature = Vec<TokenType>;

pub fn signature(tokens: &[Token]) -> Signature {
    tokens.iter().map(|t| t.token_type).collect()
}

/// Tokenizes one line (trailing newline already stripped). Deterministic,
/// allocation-light, locale-independent. Concatenating the returned
/// tokens' values reproduces `line` exactly.
pub fn tokenize(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut pos = 0usize;
    while pos < line.len() {
        let rest = &line[pos..];
        let (token_type, len) = next_token(rest);
        let value = &rest[..len];
        tokens.push(Token::new(token_type, value, pos));
        pos += len;
    }
    tokens
}

fn next_token(rest: &str) -> (TokenType, usize) {
    if let Some((t, len)) = match_composite(rest) {
        return (t, len);
    }
    if let Some(len) = match_quoted(rest) {
        return (TokenType::Quoted, len);
    }
    if let Some(len) = match_bracketed(rest) {
        return (TokenType::Bracketed, len);
    }
    if let Some(len) = match_number(rest) {
        return (TokenType::Number, len);
    }
    if let Some(len) = match_word(rest) {
        return (TokenType::Word, len);
    }
    if let Some(len) = match_whitespace(rest) {
        return (TokenType::Whitespace, len);
    }
    // PUNCT: a single remaining character (may be multi-byte UTF-8).
    let len = rest.chars().next().map(char::len_utf8).unwrap_or(1);
    (TokenType::Punct, len)
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static tokenizer regex must compile"))
}

fn match_len(re: &Regex, rest: &str) -> Option<usize> {
    re.find(rest).ok().flatten().map(|m| m.end())
}

/// Composite types recognized by greedy pre-scan: the longest match
/// wins; ties broken by TIMESTAMP > IP > URL > EMAIL > UUID.
fn match_composite(rest: &str) -> Option<(TokenType, usize)> {
    let candidates = [
        (TokenType::Timestamp, match_timestamp(rest)),
        (TokenType::Ip, match_ip(rest)),
        (TokenType::Url, match_url(rest)),
        (TokenType::Email, match_email(rest)),
        (TokenType::Uuid, match_uuid(rest)),
    ];
    candidates
        .into_iter()
        .filter_map(|(t, len)| len.map(|len| (t, len)))
        .filter(|(_, len)| *len > 0)
        .max_by_key(|(_, len)| *len)
}

/// Delegates to the shared shape-regex set in `types::timestamp` so the
/// tokenizer's composite pre-scan and `types::timestamp::is_likely_timestamp`
/// can never drift apart.
fn match_timestamp(rest: &str) -> Option<usize> {
    crate::types::timestamp::timestamp_prefix_len(rest)
}

fn match_ip(rest: &str) -> Option<usize> {
    static V4: OnceLock<Regex> = OnceLock::new();
    let v4 = regex(
        &V4,
        r"^(25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])(\.(25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])){3}",
    );
    [match_len(v4, rest), match_ipv6(rest)].into_iter().flatten().max()
}

/// Matches the longest leading run of hex digits and colons, then
/// validates it as a real IPv6 shape (8 groups, or `::` compression
/// accounting for the omitted groups) rather than accepting any
/// colon-separated hex run. A bare clock time like `10:30:00` is three
/// hex-looking groups with no compression and no way to reach 8 groups,
/// so it is rejected here rather than mis-tokenized as an IP.
fn match_ipv6(rest: &str) -> Option<usize> {
    let mut end = 0;
    for (idx, c) in rest.char_indices() {
        if c.is_ascii_hexdigit() || c == ':' {
            end = idx + c.len_utf8();
        } else {
            break;
        }
    }
    if end == 0 {
        return None;
    }
    is_valid_ipv6_shape(&rest[..end]).then_some(end)
}

fn is_valid_ipv6_shape(s: &str) -> bool {
    if !s.contains(':') {
        return false;
    }
    let double_colons = s.matches("::").count();
    if double_colons > 1 {
        return false;
    }
    if double_colons == 0 {
        if s.starts_with(':') || s.ends_with(':') {
            return false;
        }
        let groups: Vec<&str> = s.split(':').collect();
        return groups.len() == 8 && groups.iter().all(|g| is_hex_group(g));
    }

    let (left, right) = s.split_once("::").unwrap();
    let left_groups: Vec<&str> = if left.is_empty() { Vec::new() } else { left.split(':').collect() };
    let right_groups: Vec<&str> = if right.is_empty() { Vec::new() } else { right.split(':').collect() };
    // `::` must stand in for at least one omitted group.
    left_groups.len() + right_groups.len() < 8
        && left_groups.iter().chain(right_groups.iter()).all(|g| is_hex_group(g))
}

fn is_hex_group(g: &str) -> bool {
    !g.is_empty() && g.len() <= 4 && g.chars().all(|c| c.is_ascii_hexdigit())
}

fn match_url(rest: &str) -> Option<usize> {
    static URL: OnceLock<Regex> = OnceLock::new();
    match_len(regex(&URL, r"^[A-Za-z][A-Za-z0-9+.\-]*://[^\s]+"), rest)
}

fn match_email(rest: &str) -> Option<usize> {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    match_len(
        regex(&EMAIL, r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}"),
        rest,
    )
}

fn match_uuid(rest: &str) -> Option<usize> {
    static UUID: OnceLock<Regex> = OnceLock::new();
    match_len(
        regex(
            &UUID,
            r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}",
        ),
        rest,
    )
}

/// `"…"` or `'…'` with backslash escapes. Returns `None` (falls back to
/// PUNCT for the opener) when unterminated.
fn match_quoted(rest: &str) -> Option<usize> {
    let mut chars = rest.char_indices();
    let (_, quote) = chars.next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let mut escaped = false;
    for (idx, c) in chars {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
            continue;
        }
        if c == quote {
            return Some(idx + c.len_utf8());
        }
    }
    None
}

/// Matched `[...]`, `(...)`, `{...}`, honoring nesting of the same
/// bracket kind. Returns `None` (falls back to PUNCT) when unmatched.
fn match_bracketed(rest: &str) -> Option<usize> {
    let mut chars = rest.char_indices();
    let (_, open) = chars.next()?;
    let close = match open {
        '[' => ']',
        '(' => ')',
        '{' => '}',
        _ => return None,
    };
    let mut depth = 1i32;
    for (idx, c) in chars {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(idx + c.len_utf8());
            }
        }
    }
    None
}

fn match_number(rest: &str) -> Option<usize> {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    match_len(regex(&NUMBER, r"^[+\-]?\d+(\.\d+)?([eE][+\-]?\d+)?"), rest)
}

fn match_word(rest: &str) -> Option<usize> {
    let len: usize = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '/' | '.'))
        .map(|c| c.len_utf8())
        .sum();
    (len > 0).then_some(len)
}

fn match_whitespace(rest: &str) -> Option<usize> {
    let len: usize = rest
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| c.len_utf8())
        .sum();
    (len > 0).then_some(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_simple() {
        let tokens = tokenize("INFO test");
        let types: Vec<_> = tokens.iter().map(|t| t.token_type).collect();
        assert_eq!(
            types,
            vec![TokenType::Word, TokenType::Whitespace, TokenType::Word]
        );
        let values: Vec<_> = tokens.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(values, vec!["INFO", " ", "test"]);
    }

    #[test]
    fn reconstructs_line_exactly() {
        for line in [
            "GET /api/v1/users 200 192.168.1.1",
            "2024-01-15T10:30:00Z ERROR \"boom\" [retrying] (attempt 3)",
            "user@example.com visited https://example.com/a?b=c",
            "unterminated \"quote here",
            "unterminated [bracket here",
            "550e8400-e29b-41d4-a716-446655440000 matched",
            "",
        ] {
            let tokens = tokenize(line);
            let joined: String = tokens.iter().map(|t| t.value.as_str()).collect();
            assert_eq!(joined, line);
        }
    }

    #[test]
    fn recognizes_ip() {
        let tokens = tokenize("192.168.1.1 connected");
        assert_eq!(tokens[0].token_type, TokenType::Ip);
    }

    #[test]
    fn recognizes_full_ipv6() {
        let tokens = tokenize("2001:0db8:85a3:0000:0000:8a2e:0370:7334 connected");
        assert_eq!(tokens[0].token_type, TokenType::Ip);
    }

    #[test]
    fn recognizes_compressed_ipv6() {
        let tokens = tokenize("::1 localhost");
        assert_eq!(tokens[0].token_type, TokenType::Ip);
        let tokens = tokenize("2001:db8::1 connected");
        assert_eq!(tokens[0].token_type, TokenType::Ip);
    }

    #[test]
    fn bare_clock_time_is_not_an_ip() {
        let tokens = tokenize("elapsed: 01:02:03");
        assert!(tokens.iter().all(|t| t.token_type != TokenType::Ip));
        let tokens = tokenize("connection established at 10:30:00");
        assert!(tokens.iter().all(|t| t.token_type != TokenType::Ip));
    }

    #[test]
    fn recognizes_timestamp() {
        let tokens = tokenize("2024-01-15T10:30:00Z INFO message");
        assert_eq!(tokens[0].token_type, TokenType::Timestamp);
    }

    #[test]
    fn timestamp_prescan_agrees_with_is_likely_timestamp() {
        // The tokenizer's composite pre-scan shares its shape regexes
        // with `types::timestamp::is_likely_timestamp`, so any string
        // that pre-scan consumes in full must also read as "likely a
        // timestamp" standalone.
        for s in [
            "2024-01-15T10:30:00Z",
            "2024-01-15",
            "15/Jan/2024:10:30:00 +0000",
            "15/Jan/2024:10:30:00",
            "Jan 15 10:30:00",
        ] {
            let tokens = tokenize(s);
            assert_eq!(tokens[0].token_type, TokenType::Timestamp, "{s}");
            assert_eq!(tokens[0].value, s, "{s}");
            assert!(
                crate::types::timestamp::is_likely_timestamp(s),
                "is_likely_timestamp disagreed with tokenizer for {s}"
            );
        }
    }

    #[test]
    fn recognizes_url_and_email() {
        let tokens = tokenize("https://example.com/path user@example.com");
        assert_eq!(tokens[0].token_type, TokenType::Url);
        assert_eq!(tokens[2].token_type, TokenType::Email);
    }

    #[test]
    fn recognizes_uuid() {
        let tokens = tokenize("id=550e8400-e29b-41d4-a716-446655440000");
        assert!(tokens.iter().any(|t| t.token_type == TokenType::Uuid));
    }

    #[test]
    fn unterminated_quote_falls_back_to_punct() {
        let tokens = tokenize("say \"hello");
        let quote_tok = &tokens[2];
        assert_eq!(quote_tok.token_type, TokenType::Punct);
        assert_eq!(quote_tok.value, "\"");
    }

    #[test]
    fn unterminated_bracket_falls_back_to_punct() {
        let tokens = tokenize("oops [unterminated");
        let bracket_tok = &tokens[2];
        assert_eq!(bracket_tok.token_type, TokenType::Punct);
        assert_eq!(bracket_tok.value, "[");
    }

    #[test]
    fn word_absorbs_path_like_runs() {
        let tokens = tokenize("GET /api/v1 200");
        assert_eq!(tokens[2].token_type, TokenType::Word);
        assert_eq!(tokens[2].value, "/api/v1");
    }

    #[test]
    fn bracketed_handles_nesting() {
        let tokens = tokenize("[outer [inner] tail] rest");
        assert_eq!(tokens[0].token_type, TokenType::Bracketed);
        assert_eq!(tokens[0].value, "[outer [inner] tail]");
    }
}
