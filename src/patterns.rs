//! Pattern synthesizer (C4) and the core pattern data model (§3).

use std::path::Path;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::clustering::{cluster_lines, Cluster};
use crate::error::Result;
use crate::merging::merge_patterns;
use crate::naming::infer_field_name;
use crate::options::Options;
use crate::streaming::read_lines;
use crate::tokenizer::{tokenize, Token, TokenType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PatternElement {
    Literal { token_type: TokenType, value: String },
    Field { token_type: TokenType, name: String },
}

impl PatternElement {
    pub fn token_type(&self) -> TokenType {
        match self {
            PatternElement::Literal { token_type, .. } => *token_type,
            PatternElement::Field { token_type, .. } => *token_type,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub elements: Vec<PatternElement>,
    pub frequency: usize,
    pub confidence: f64,
}

impl Pattern {
    pub fn literal_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| matches!(e, PatternElement::Literal { .. }))
            .count()
    }

    pub fn signature(&self) -> Vec<TokenType> {
        self.elements.iter().map(|e| e.token_type()).collect()
    }
}

/// An ordered collection of patterns, sorted by frequency descending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternSet {
    pub patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn new() -> Self {
        PatternSet::default()
    }

    pub fn add(&mut self, pattern: Pattern) {
        self.patterns.push(pattern);
        self.sort();
    }

    pub fn sort(&mut self) {
        self.patterns.sort_by(|a, b| {
            b.frequency
                .cmp(&a.frequency)
                .then(b.confidence.partial_cmp(&a.confidence).unwrap())
        });
    }

    pub fn get(&self, id: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Widens a position's token type when Stage-B-merged clusters of equal
/// signature disagree on the underlying type at that position: this
/// spec's normative resolution of the Open Question in spec.md §9.
/// NUMBER/WORD widen to WORD; disparate composites widen to WORD.
pub fn widen_type(types: impl IntoIterator<Item = TokenType>) -> TokenType {
    let mut iter = types.into_iter();
    let first = match iter.next() {
        Some(t) => t,
        None => return TokenType::Word,
    };
    let mut widened = first;
    for t in iter {
        if t != widened {
            widened = TokenType::Word;
        }
    }
    widened
}

/// Synthesizes one pattern from a cluster of lines sharing a token
/// count. Position `i` is a literal iff every member's token at `i` has
/// an identical value; otherwise it's a field, named by the naming
/// collaborator (§4.9), unique within the pattern.
///
/// `cluster_lines` never offers length-mismatched centroids as merge
/// candidates, so in practice every member shares one token count. This
/// still guards against it explicitly: any member whose token count
/// differs from the cluster's first member is excluded from synthesis
/// rather than indexed out of bounds, so a future clustering change
/// degrades this pattern instead of panicking mid-stream.
pub fn synthesize_pattern(cluster: &Cluster, pattern_id: impl Into<String>) -> Option<Pattern> {
    let n = cluster.members.first()?.0.len();
    let members: Vec<usize> = cluster
        .members
        .iter()
        .enumerate()
        .filter(|(_, (toks, _))| toks.len() == n)
        .map(|(idx, _)| idx)
        .collect();
    let member_count = members.len();
    if member_count == 0 {
        return None;
    }

    let mut elements = Vec::with_capacity(n);
    let mut taken_names: HashSet<String> = HashSet::new();

    for i in 0..n {
        let types_at_i = members.iter().map(|&m| cluster.members[m].0[i].token_type);
        let token_type = widen_type(types_at_i);

        let mut values = members.iter().map(|&m| cluster.members[m].0[i].value.as_str());
        let first_value = values.next().unwrap();
        let all_same = values.all(|v| v == first_value);

        if all_same {
            elements.push(PatternElement::Literal {
                token_type,
                value: first_value.to_owned(),
            });
        } else {
            let tokens = &cluster.members[members[0]].0;
            let prev_non_ws = tokens[..i].iter().rev().find(|t| t.token_type != TokenType::Whitespace);
            let next_non_ws = tokens[i + 1..].iter().find(|t| t.token_type != TokenType::Whitespace);
            let name = infer_field_name(&tokens[i], i, prev_non_ws, next_non_ws, tokens, &taken_names);
            taken_names.insert(name.clone());
            elements.push(PatternElement::Field { token_type, name });
        }
    }

    let literal_count = elements
        .iter()
        .filter(|e| matches!(e, PatternElement::Literal { .. }))
        .count();
    let confidence = if n == 0 {
        0.0
    } else {
        literal_count as f64 / n as f64
    };

    Some(Pattern {
        id: pattern_id.into(),
        elements,
        frequency: member_count,
        confidence,
    })
}

/// Sequential learner: tokenize -> cluster -> synthesize -> merge.
#[instrument(skip(lines))]
pub fn learn_from_lines(lines: Vec<String>, options: &Options) -> PatternSet {
    if lines.is_empty() {
        return PatternSet::new();
    }

    let tokenized: Vec<(Vec<Token>, &str)> = lines
        .iter()
        .map(|line| (tokenize(line), line.as_str()))
        .collect();

    let clusters = cluster_lines(tokenized, options.threshold);
    debug!(cluster_count = clusters.len(), "clustered learning sample");

    let mut patterns = Vec::new();
    for (idx, cluster) in clusters.iter().enumerate() {
        if cluster.members.is_empty() {
            continue;
        }
        if let Some(pattern) = synthesize_pattern(cluster, format!("p_{idx}")) {
            patterns.push(pattern);
        }
    }

    let merged = merge_patterns(patterns);
    info!(pattern_count = merged.len(), "learned pattern set");

    let mut set = PatternSet { patterns: merged };
    set.sort();
    set
}

/// `learn_patterns(path, options) -> PatternSet`. Reads up to
/// `options.sample_size` lines (or all) and runs the sequential learner.
#[instrument(skip(options))]
pub fn learn_patterns(path: impl AsRef<Path>, options: &Options) -> Result<PatternSet> {
    let mut lines = read_lines(path.as_ref(), options.use_mmap)?;
    if let Some(sample) = options.sample_size {
        lines.truncate(sample);
    }
    Ok(learn_from_lines(lines, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::cluster_by_exact_signature;

    fn tokens_for(lines: &[&str]) -> Vec<(Vec<Token>, &str)> {
        lines.iter().map(|l| (tokenize(l), *l)).collect()
    }

    #[test]
    fn synthesizes_literal_and_field_positions() {
        let lines = tokens_for(&["INFO message one", "INFO message two"]);
        let clusters = cluster_by_exact_signature(lines);
        let pattern = synthesize_pattern(&clusters[0], "p_0").unwrap();
        assert_eq!(pattern.frequency, 2);
        assert!(matches!(pattern.elements[0], PatternElement::Literal { .. }));
        assert!(matches!(pattern.elements[4], PatternElement::Field { .. }));
    }

    #[test]
    fn confidence_matches_literal_ratio() {
        let lines = tokens_for(&["INFO message one", "INFO message two", "INFO message three"]);
        let clusters = cluster_by_exact_signature(lines);
        let pattern = synthesize_pattern(&clusters[0], "p_0").unwrap();
        let expected = pattern.literal_count() as f64 / pattern.elements.len() as f64;
        assert!((pattern.confidence - expected).abs() < 1e-9);
    }

    #[test]
    fn widen_prefers_word_on_disagreement() {
        assert_eq!(
            widen_type([TokenType::Number, TokenType::Word]),
            TokenType::Word
        );
        assert_eq!(widen_type([TokenType::Word, TokenType::Word]), TokenType::Word);
        assert_eq!(widen_type([TokenType::Ip]), TokenType::Ip);
    }

    #[test]
    fn learn_from_uniform_lines_yields_one_pattern() {
        let lines: Vec<String> = (0..10).map(|_| "2024-01-15 INFO message here".to_owned()).collect();
        let options = Options::default();
        let set = learn_from_lines(lines, &options);
        assert_eq!(set.len(), 1);
        assert_eq!(set.patterns[0].frequency, 10);
    }

    #[test]
    fn learn_from_empty_lines_yields_empty_set() {
        let set = learn_from_lines(Vec::new(), &Options::default());
        assert!(set.is_empty());
    }
}
