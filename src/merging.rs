//! Pattern merger (C5). Collapses structurally compatible patterns
//! while preserving frequency/confidence.

use tracing::instrument;

use crate::patterns::{Pattern, PatternElement, PatternSet};
use crate::tokenizer::TokenType;

/// True iff `p` and `q` have equal length and equal token type at every
/// position. Literal-vs-field does not block merging; literal values do
/// not block merging.
pub fn can_merge(p: &Pattern, q: &Pattern) -> bool {
    p.elements.len() == q.elements.len()
        && p.elements
            .iter()
            .zip(&q.elements)
            .all(|(a, b)| a.token_type() == b.token_type())
}

/// Produces the pattern resulting from merging two mergeable patterns.
/// Position `i` stays a literal iff both sides are literals of the same
/// value; otherwise it becomes a field, inheriting a name from whichever
/// side already had one, else generating a fresh one.
pub fn merge_two(p: &Pattern, q: &Pattern) -> Pattern {
    let elements: Vec<PatternElement> = p
        .elements
        .iter()
        .zip(&q.elements)
        .enumerate()
        .map(|(i, (a, b))| merge_element(i, a, b))
        .collect();

    let frequency = p.frequency + q.frequency;
    let confidence = if frequency == 0 {
        0.0
    } else {
        (p.confidence * p.frequency as f64 + q.confidence * q.frequency as f64) / frequency as f64
    };

    Pattern {
        id: p.id.clone(),
        elements,
        frequency,
        confidence,
    }
}

fn merge_element(index: usize, a: &PatternElement, b: &PatternElement) -> PatternElement {
    let token_type = a.token_type();
    match (a, b) {
        (
            PatternElement::Literal { value: va, .. },
            PatternElement::Literal { value: vb, .. },
        ) if va == vb => PatternElement::Literal {
            token_type,
            value: va.clone(),
        },
        _ => {
            let name = match (a, b) {
                (PatternElement::Field { name, .. }, _) => name.clone(),
                (_, PatternElement::Field { name, .. }) => name.clone(),
                _ => format!("field_{index}"),
            };
            PatternElement::Field { token_type, name }
        }
    }
}

/// Repeatedly finds any mergeable pair and replaces it with the merge,
/// terminating when no pair is mergeable. Discovery iterates by index
/// for deterministic output. Returns patterns sorted by frequency
/// descending, ties broken by higher confidence.
#[instrument(skip(patterns))]
pub fn merge_patterns(mut patterns: Vec<Pattern>) -> Vec<Pattern> {
    loop {
        let mut merge_at = None;
        'search: for i in 0..patterns.len() {
            for j in (i + 1)..patterns.len() {
                if can_merge(&patterns[i], &patterns[j]) {
                    merge_at = Some((i, j));
                    break 'search;
                }
            }
        }
        let Some((i, j)) = merge_at else {
            break;
        };
        let merged = merge_two(&patterns[i], &patterns[j]);
        // Remove the higher index first so the lower index stays valid.
        patterns.remove(j);
        patterns.remove(i);
        patterns.push(merged);
    }

    patterns.sort_by(|a, b| {
        b.frequency
            .cmp(&a.frequency)
            .then(b.confidence.partial_cmp(&a.confidence).unwrap())
    });
    patterns
}

/// Runs `merge_patterns` over a `PatternSet` and returns the reduced set.
pub fn merge_pattern_set(set: PatternSet) -> PatternSet {
    let merged = merge_patterns(set.patterns);
    let mut result = PatternSet { patterns: merged };
    result.sort();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    fn lit(token_type: TokenType, value: &str) -> PatternElement {
        PatternElement::Literal {
            token_type,
            value: value.to_owned(),
        }
    }

    fn field(token_type: TokenType, name: &str) -> PatternElement {
        PatternElement::Field {
            token_type,
            name: name.to_owned(),
        }
    }

    fn pattern(elements: Vec<PatternElement>, id: &str, frequency: usize) -> Pattern {
        Pattern {
            id: id.to_owned(),
            elements,
            frequency,
            confidence: 1.0,
        }
    }

    #[test]
    fn identical_patterns_can_merge() {
        let p1 = pattern(
            vec![
                field(TokenType::Timestamp, "ts"),
                lit(TokenType::Whitespace, " "),
                lit(TokenType::Word, "INFO"),
            ],
            "p1",
            1,
        );
        let p2 = p1.clone();
        assert!(can_merge(&p1, &p2));
    }

    #[test]
    fn same_types_different_literals_can_merge() {
        let p1 = pattern(
            vec![
                field(TokenType::Timestamp, "ts"),
                lit(TokenType::Whitespace, " "),
                lit(TokenType::Word, "INFO"),
            ],
            "p1",
            1,
        );
        let p2 = pattern(
            vec![
                field(TokenType::Timestamp, "ts"),
                lit(TokenType::Whitespace, " "),
                lit(TokenType::Word, "ERROR"),
            ],
            "p2",
            1,
        );
        assert!(can_merge(&p1, &p2));
    }

    #[test]
    fn different_lengths_cannot_merge() {
        let p1 = pattern(vec![lit(TokenType::Word, "a")], "p1", 1);
        let p2 = pattern(
            vec![lit(TokenType::Word, "a"), lit(TokenType::Word, "b")],
            "p2",
            1,
        );
        assert!(!can_merge(&p1, &p2));
    }

    #[test]
    fn different_token_types_cannot_merge() {
        let p1 = pattern(vec![field(TokenType::Number, "value")], "p1", 1);
        let p2 = pattern(vec![field(TokenType::Word, "name")], "p2", 1);
        assert!(!can_merge(&p1, &p2));
    }

    #[test]
    fn merge_two_keeps_same_literal() {
        let p1 = pattern(
            vec![
                lit(TokenType::Word, "INFO"),
                lit(TokenType::Whitespace, " "),
                field(TokenType::Word, "msg"),
            ],
            "p1",
            5,
        );
        let p2 = pattern(
            vec![
                lit(TokenType::Word, "INFO"),
                lit(TokenType::Whitespace, " "),
                field(TokenType::Word, "msg"),
            ],
            "p2",
            3,
        );
        let merged = merge_two(&p1, &p2);
        assert_eq!(merged.frequency, 8);
        assert!(matches!(&merged.elements[0], PatternElement::Literal { value, .. } if value == "INFO"));
    }

    #[test]
    fn merge_two_differing_literals_become_field() {
        let p1 = pattern(
            vec![
                lit(TokenType::Word, "INFO"),
                lit(TokenType::Whitespace, " "),
                field(TokenType::Word, "msg"),
            ],
            "p1",
            5,
        );
        let p2 = pattern(
            vec![
                lit(TokenType::Word, "ERROR"),
                lit(TokenType::Whitespace, " "),
                field(TokenType::Word, "msg"),
            ],
            "p2",
            3,
        );
        let merged = merge_two(&p1, &p2);
        assert!(matches!(&merged.elements[0], PatternElement::Field { token_type, .. } if *token_type == TokenType::Word));
    }

    #[test]
    fn merge_two_weights_confidence_by_frequency() {
        let mut p1 = pattern(vec![field(TokenType::Word, "msg")], "p1", 10);
        p1.confidence = 0.9;
        let mut p2 = pattern(vec![field(TokenType::Word, "msg")], "p2", 10);
        p2.confidence = 0.7;
        let merged = merge_two(&p1, &p2);
        assert!(approx_eq!(f64, merged.confidence, 0.8, epsilon = 1e-9));
    }

    #[test]
    fn merge_patterns_collapses_compatible_set() {
        let patterns = vec![
            pattern(
                vec![
                    lit(TokenType::Word, "INFO"),
                    lit(TokenType::Whitespace, " "),
                    field(TokenType::Word, "m"),
                ],
                "p1",
                5,
            ),
            pattern(
                vec![
                    lit(TokenType::Word, "WARN"),
                    lit(TokenType::Whitespace, " "),
                    field(TokenType::Word, "m"),
                ],
                "p2",
                3,
            ),
            pattern(
                vec![
                    lit(TokenType::Word, "ERROR"),
                    lit(TokenType::Whitespace, " "),
                    field(TokenType::Word, "m"),
                ],
                "p3",
                2,
            ),
        ];
        let result = merge_patterns(patterns);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].frequency, 10);
    }

    #[test]
    fn merge_patterns_keeps_incompatible_separate() {
        let patterns = vec![
            pattern(
                vec![
                    lit(TokenType::Word, "INFO"),
                    lit(TokenType::Whitespace, " "),
                    field(TokenType::Word, "m"),
                ],
                "p1",
                1,
            ),
            pattern(
                vec![
                    field(TokenType::Timestamp, "ts"),
                    lit(TokenType::Whitespace, " "),
                    field(TokenType::Word, "m"),
                ],
                "p2",
                1,
            ),
        ];
        let result = merge_patterns(patterns);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn merge_patterns_idempotent() {
        let patterns = vec![
            pattern(vec![lit(TokenType::Word, "INFO")], "p1", 5),
            pattern(vec![lit(TokenType::Word, "WARN")], "p2", 3),
        ];
        let once = merge_patterns(patterns);
        let twice = merge_patterns(once.clone());
        assert_eq!(once.len(), twice.len());
        assert_eq!(once[0].frequency, twice[0].frequency);
    }

    #[test]
    fn merge_patterns_empty_list() {
        assert!(merge_patterns(Vec::new()).is_empty());
    }

    #[test]
    fn merge_pattern_set_sorts_by_frequency() {
        let mut set = PatternSet::new();
        set.patterns.push(pattern(vec![field(TokenType::Number, "n")], "p1", 2));
        set.patterns.push(pattern(vec![field(TokenType::Word, "w")], "p2", 10));
        let merged = merge_pattern_set(set);
        assert!(merged.patterns[0].frequency >= merged.patterns.last().unwrap().frequency);
    }
}
