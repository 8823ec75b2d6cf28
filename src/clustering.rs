//! Signature-based clusterer (C3). Groups tokenized lines by shared
//! token-type shape, then optionally refines groups by sequence
//! similarity.

use hashbrown::HashMap;

use crate::tokenizer::{signature, Signature, Token, TokenType};

/// A line plus its already-computed token sequence, paired for reuse
/// across clustering and synthesis.
pub type LineTokens<'a> = (Vec<Token>, &'a str);

#[derive(Debug, Clone)]
pub struct Cluster<'a> {
    pub id: usize,
    pub members: Vec<LineTokens<'a>>,
    pub centroid: Signature,
    pub cohesion: f64,
}

/// Stage A: exact signature bucketing. Empty input yields empty output.
pub fn cluster_by_exact_signature<'a>(lines: Vec<LineTokens<'a>>) -> Vec<Cluster<'a>> {
    let mut buckets: HashMap<Signature, Vec<LineTokens<'a>>> = HashMap::new();
    let mut order: Vec<Signature> = Vec::new();
    for (tokens, raw) in lines {
        let sig = signature(&tokens);
        if !buckets.contains_key(&sig) {
            order.push(sig.clone());
        }
        buckets.entry(sig).or_default().push((tokens, raw));
    }
    order
        .into_iter()
        .enumerate()
        .map(|(id, sig)| {
            let members = buckets.remove(&sig).unwrap_or_default();
            Cluster {
                id,
                members,
                centroid: sig,
                cohesion: 1.0,
            }
        })
        .collect()
}

/// `sequence_similarity(a, b)`:
/// - `(), ()` => 1.0
/// - exactly one empty => 0.0
/// - otherwise LCS-length-based, scaled by the length ratio.
pub fn sequence_similarity(a: &[TokenType], b: &[TokenType]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let l = lcs_len(a, b) as f64;
    let length_ratio = a.len().min(b.len()) as f64 / a.len().max(b.len()) as f64;
    let similarity = (2.0 * l / (a.len() + b.len()) as f64) * length_ratio;
    similarity.clamp(0.0, 1.0)
}

fn lcs_len(a: &[TokenType], b: &[TokenType]) -> usize {
    let mut dp = vec![0usize; b.len() + 1];
    for &at in a {
        let mut prev = 0usize;
        for (j, &bt) in b.iter().enumerate() {
            let tmp = dp[j + 1];
            dp[j + 1] = if at == bt { prev + 1 } else { dp[j + 1].max(dp[j]) };
            prev = tmp;
        }
    }
    dp[b.len()]
}

/// Stage B: greedy similarity refinement. Repeatedly merges the pair
/// with highest mutual similarity >= `threshold`; ties broken by the
/// cluster with the higher total member count, then lower cluster id.
/// Only clusters whose centroids share the same token count are
/// candidates for merging: the synthesizer (`patterns::synthesize_pattern`)
/// indexes every member at the same positions, so a length-mismatched
/// merge would desynchronize that indexing. Two signatures of equal
/// length can still disagree on type at a position; that case is
/// resolved by `patterns::widen_type`.
pub fn cluster_lines<'a>(lines: Vec<LineTokens<'a>>, threshold: f64) -> Vec<Cluster<'a>> {
    if lines.is_empty() {
        return Vec::new();
    }
    let mut clusters = cluster_by_exact_signature(lines);

    loop {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..clusters.len() {
            for j in (i + 1)..clusters.len() {
                if clusters[i].centroid.len() != clusters[j].centroid.len() {
                    continue;
                }
                let sim = sequence_similarity(&clusters[i].centroid, &clusters[j].centroid);
                if sim < threshold {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some((bi, bj, bsim)) => {
                        sim > bsim
                            || (sim == bsim
                                && tie_break_wins(&clusters, i, j, bi, bj))
                    }
                };
                if better {
                    best = Some((i, j, sim));
                }
            }
        }
        let Some((i, j, _)) = best else {
            break;
        };
        let merged = merge_clusters(&clusters[i], &clusters[j], clusters[i].id);
        let mut next = Vec::with_capacity(clusters.len() - 1);
        for (idx, c) in clusters.into_iter().enumerate() {
            if idx != i && idx != j {
                next.push(c);
            }
        }
        next.push(merged);
        clusters = next;
    }

    clusters
}

fn tie_break_wins(
    clusters: &[Cluster],
    i: usize,
    j: usize,
    best_i: usize,
    best_j: usize,
) -> bool {
    let count = clusters[i].members.len() + clusters[j].members.len();
    let best_count = clusters[best_i].members.len() + clusters[best_j].members.len();
    if count != best_count {
        return count > best_count;
    }
    clusters[i].id.min(clusters[j].id) < clusters[best_i].id.min(clusters[best_j].id)
}

fn merge_clusters<'a>(a: &Cluster<'a>, b: &Cluster<'a>, id: usize) -> Cluster<'a> {
    let mut members = a.members.clone();
    members.extend(b.members.clone());

    let mut pairwise = Vec::new();
    for (ta, _) in &a.members {
        for (tb, _) in &b.members {
            pairwise.push(sequence_similarity(&signature(ta), &signature(tb)));
        }
    }
    let cohesion = if members.len() <= 1 {
        1.0
    } else if pairwise.is_empty() {
        1.0
    } else {
        pairwise.iter().sum::<f64>() / pairwise.len() as f64
    };

    // `cluster_lines` only ever offers equal-length centroids as merge
    // candidates, so either side is an equally valid representative shape.
    let centroid = a.centroid.clone();

    Cluster {
        id,
        members,
        centroid,
        cohesion,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;

    fn make<'a>(lines: &[&'a str]) -> Vec<LineTokens<'a>> {
        lines.iter().map(|l| (tokenize(l), *l)).collect()
    }

    #[test]
    fn same_signatures_cluster() {
        let lines = make(&[
            "INFO server started",
            "WARN server stopped",
            "ERROR server crashed",
        ]);
        let clusters = cluster_by_exact_signature(lines);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 3);
    }

    #[test]
    fn different_signatures_separate() {
        let lines = make(&["INFO started", "192.168.1.1 connected"]);
        let clusters = cluster_by_exact_signature(lines);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn empty_input_yields_empty() {
        assert!(cluster_by_exact_signature(Vec::<LineTokens>::new()).is_empty());
        assert!(cluster_lines(Vec::<LineTokens>::new(), 0.7).is_empty());
    }

    #[test]
    fn single_line_single_cluster() {
        let lines = make(&["test line"]);
        let clusters = cluster_by_exact_signature(lines);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 1);
    }

    #[test]
    fn similarity_identity_and_symmetry() {
        let a = [TokenType::Word, TokenType::Whitespace, TokenType::Number];
        let b = [TokenType::Word, TokenType::Whitespace, TokenType::Word];
        assert_eq!(sequence_similarity(&a, &a), 1.0);
        assert_eq!(sequence_similarity(&a, &b), sequence_similarity(&b, &a));
        let sim = sequence_similarity(&a, &b);
        assert!((0.0..=1.0).contains(&sim));
        assert!(sim > 0.0 && sim < 1.0);
    }

    #[test]
    fn similarity_empty_sequences() {
        assert_eq!(sequence_similarity(&[], &[]), 1.0);
        assert_eq!(sequence_similarity(&[TokenType::Word], &[]), 0.0);
        assert_eq!(sequence_similarity(&[], &[TokenType::Word]), 0.0);
    }

    #[test]
    fn threshold_affects_clustering() {
        let lines_low = make(&[
            "INFO server started",
            "WARN server stopped",
            "ERROR 404 not found",
        ]);
        let lines_high = make(&[
            "INFO server started",
            "WARN server stopped",
            "ERROR 404 not found",
        ]);
        let clusters_low = cluster_lines(lines_low, 0.5);
        let clusters_high = cluster_lines(lines_high, 0.9);
        assert!(clusters_low.len() <= clusters_high.len());
    }

    #[test]
    fn never_merges_differing_lengths_even_above_threshold() {
        // "[a][b] 12" (4 tokens) vs "[a][b] 12!" (5 tokens): LCS=4 over
        // these signatures gives similarity (2*4/9)*(4/5) ~= 0.711, which
        // clears a 0.7 threshold, but the two have different token counts.
        let lines = make(&["[a][b] 12", "[a][b] 12!"]);
        let clusters = cluster_lines(lines, 0.7);
        assert_eq!(clusters.len(), 2);
        for cluster in &clusters {
            assert!(cluster.members.iter().all(|(toks, _)| toks.len() == cluster.centroid.len()));
        }
    }
}
