//! Pattern matcher and cache (C6). Signature-indexed lookup with a
//! deterministic specificity/frequency tie-break.

use hashbrown::HashMap;

use crate::patterns::{Pattern, PatternElement, PatternSet};
use crate::tokenizer::{tokenize, Signature};

pub struct PatternCache {
    pub patterns: PatternSet,
    index: HashMap<Signature, Vec<usize>>,
}

impl PatternCache {
    /// Indexes `patterns` by token-type signature: each bucket is
    /// ordered by decreasing specificity (literal count desc), then by
    /// frequency desc.
    pub fn new(patterns: PatternSet) -> Self {
        let mut index: HashMap<Signature, Vec<usize>> = HashMap::new();
        for (i, pattern) in patterns.patterns.iter().enumerate() {
            index.entry(pattern.signature()).or_default().push(i);
        }
        for bucket in index.values_mut() {
            bucket.sort_by(|&a, &b| {
                let pa = &patterns.patterns[a];
                let pb = &patterns.patterns[b];
                pb.literal_count()
                    .cmp(&pa.literal_count())
                    .then(pb.frequency.cmp(&pa.frequency))
            });
        }
        PatternCache { patterns, index }
    }

    /// Tokenizes `line`, looks up candidates by signature, and returns
    /// the first candidate whose literal positions all match. Extracts
    /// field values from the matched pattern's field positions.
    pub fn match_line(&self, line: &str) -> (Option<&Pattern>, Option<HashMap<String, String>>) {
        let tokens = tokenize(line);
        let sig: Signature = tokens.iter().map(|t| t.token_type).collect();
        let Some(candidates) = self.index.get(&sig) else {
            return (None, None);
        };

        for &idx in candidates {
            let pattern = &self.patterns.patterns[idx];
            if let Some(fields) = try_match(pattern, &tokens) {
                return (Some(pattern), Some(fields));
            }
        }
        (None, None)
    }
}

fn try_match(
    pattern: &Pattern,
    tokens: &[crate::tokenizer::Token],
) -> Option<HashMap<String, String>> {
    if pattern.elements.len() != tokens.len() {
        return None;
    }
    let mut fields = HashMap::new();
    for (element, token) in pattern.elements.iter().zip(tokens) {
        match element {
            PatternElement::Literal { value, .. } => {
                if token.value != *value {
                    return None;
                }
            }
            PatternElement::Field { name, .. } => {
                fields.insert(name.clone(), token.value.clone());
            }
        }
    }
    Some(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use crate::patterns::learn_from_lines;

    #[test]
    fn cache_matches_learned_pattern() {
        let lines: Vec<String> = vec!["2024-01-15 INFO message".to_owned()];
        let set = learn_from_lines(lines, &Options::default());
        let cache = PatternCache::new(set);
        let (pattern, fields) = cache.match_line("2024-01-15 INFO message");
        assert!(pattern.is_some());
        assert!(fields.is_some());
    }

    #[test]
    fn cache_reports_miss_for_unknown_shape() {
        let lines: Vec<String> = vec!["2024-01-15 INFO message".to_owned()];
        let set = learn_from_lines(lines, &Options::default());
        let cache = PatternCache::new(set);
        let (pattern, fields) = cache.match_line("completely different format");
        assert!(pattern.is_none());
        assert!(fields.is_none());
    }

    #[test]
    fn more_specific_pattern_wins_tie_break() {
        use crate::tokenizer::TokenType;
        let mut set = PatternSet::new();
        set.add(Pattern {
            id: "generic".to_owned(),
            elements: vec![PatternElement::Field {
                token_type: TokenType::Word,
                name: "w".to_owned(),
            }],
            frequency: 100,
            confidence: 0.0,
        });
        set.add(Pattern {
            id: "specific".to_owned(),
            elements: vec![PatternElement::Literal {
                token_type: TokenType::Word,
                value: "INFO".to_owned(),
            }],
            frequency: 1,
            confidence: 1.0,
        });
        let cache = PatternCache::new(set);
        let (pattern, _) = cache.match_line("INFO");
        assert_eq!(pattern.unwrap().id, "specific");
    }
}
