//! Drift detector (C8). Parses a file in consecutive non-overlapping
//! windows and tracks which pattern dominates each one; a format change
//! is recorded wherever the dominant pattern shifts and the new
//! dominant holds a strong enough share of its window (spec §4.8).

use std::collections::HashMap as StdHashMap;
use std::path::Path;

use hashbrown::HashMap as FastHashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::cache::PatternCache;
use crate::error::Result;
use crate::options::Options;
use crate::patterns::PatternSet;
use crate::streaming::{read_lines, ParsedRecord};

/// A dominant-pattern shift observed at a window boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatChange {
    pub line_number: usize,
    pub from_pattern_id: Option<String>,
    pub to_pattern_id: Option<String>,
    pub confidence: f64,
}

/// The winning pattern of one window and the line it starts at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DominantPattern {
    pub window_start_line: usize,
    pub pattern_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    pub total_lines: usize,
    pub matched_lines: usize,
    /// Global per-pattern line counts; `None` key folded into the
    /// `"<unmatched>"` bucket so the map stays `String`-keyed for easy
    /// serialization.
    pub pattern_distribution: StdHashMap<String, usize>,
    pub format_changes: Vec<FormatChange>,
    pub dominant_patterns: Vec<DominantPattern>,
    pub window_size: usize,
    pub change_threshold: f64,
}

const UNMATCHED_KEY: &str = "<unmatched>";

impl DriftReport {
    /// `matched/total`, or `0.0` when the file had no lines.
    pub fn match_rate(&self) -> f64 {
        if self.total_lines == 0 {
            0.0
        } else {
            self.matched_lines as f64 / self.total_lines as f64
        }
    }

    /// True iff any format change was recorded, or more than one
    /// distinct pattern ever dominated a window.
    pub fn has_drift(&self) -> bool {
        if !self.format_changes.is_empty() {
            return true;
        }
        let distinct: std::collections::HashSet<&Option<String>> =
            self.dominant_patterns.iter().map(|d| &d.pattern_id).collect();
        distinct.len() > 1
    }

    pub fn summary(&self) -> String {
        if self.has_drift() {
            format!(
                "{} of {} lines matched ({:.1}%); {} format change(s) across {} window(s)",
                self.matched_lines,
                self.total_lines,
                self.match_rate() * 100.0,
                self.format_changes.len(),
                self.dominant_patterns.len()
            )
        } else {
            format!(
                "{} of {} lines matched ({:.1}%); no drift detected",
                self.matched_lines,
                self.total_lines,
                self.match_rate() * 100.0
            )
        }
    }
}

/// `detect_drift(path, patterns, options) -> DriftReport`. Partitions
/// parsed records into consecutive windows of `options.window_size`
/// lines (final window may be shorter), computes each window's
/// dominant pattern, and records a format change at every boundary
/// where the dominant pattern shifts and the new dominant holds at
/// least `options.change_threshold` of its window.
#[instrument(skip(patterns, options))]
pub fn detect_drift(path: impl AsRef<Path>, patterns: &PatternSet, options: &Options) -> Result<DriftReport> {
    let lines = read_lines(path.as_ref(), options.use_mmap)?;
    let cache = PatternCache::new(patterns.clone());

    let records: Vec<ParsedRecord> = lines
        .into_iter()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| !l.is_empty())
        .map(|(line_number, raw_line)| {
            let (pattern, fields) = cache.match_line(&raw_line);
            ParsedRecord {
                line_number,
                raw_line,
                pattern_id: pattern.map(|p| p.id.clone()),
                fields: fields.map(|f| f.into_iter().collect()).unwrap_or_default(),
                typed_fields: None,
            }
        })
        .collect();

    let total_lines = records.len();
    let window_size = options.window_size.max(1);

    let mut pattern_distribution: StdHashMap<String, usize> = StdHashMap::new();
    let mut matched_lines = 0usize;
    for record in &records {
        let key = record.pattern_id.clone().unwrap_or_else(|| UNMATCHED_KEY.to_owned());
        *pattern_distribution.entry(key).or_insert(0) += 1;
        if record.pattern_id.is_some() {
            matched_lines += 1;
        }
    }

    if total_lines == 0 {
        return Ok(DriftReport {
            total_lines: 0,
            matched_lines: 0,
            pattern_distribution,
            format_changes: Vec::new(),
            dominant_patterns: Vec::new(),
            window_size,
            change_threshold: options.change_threshold,
        });
    }

    let global_frequency: FastHashMap<&str, usize> =
        patterns.patterns.iter().map(|p| (p.id.as_str(), p.frequency)).collect();

    let mut dominant_patterns = Vec::new();
    let mut window_shares = Vec::new();
    for window in records.chunks(window_size) {
        let window_start_line = window.first().unwrap().line_number;
        let mut counts: FastHashMap<Option<String>, usize> = FastHashMap::new();
        for record in window {
            *counts.entry(record.pattern_id.clone()).or_insert(0) += 1;
        }

        let (dominant_id, dominant_count) = counts
            .into_iter()
            .max_by(|(id_a, count_a), (id_b, count_b)| {
                count_a
                    .cmp(count_b)
                    .then_with(|| {
                        global_freq_of(id_a, &global_frequency).cmp(&global_freq_of(id_b, &global_frequency))
                    })
                    .then_with(|| id_a.cmp(id_b))
            })
            .unwrap_or((None, 0));

        let share = dominant_count as f64 / window.len() as f64;
        dominant_patterns.push(DominantPattern {
            window_start_line,
            pattern_id: dominant_id.clone(),
        });
        window_shares.push((window_start_line, dominant_id, share));
    }

    let mut format_changes = Vec::new();
    for pair in window_shares.windows(2) {
        let (_, from_id, _) = &pair[0];
        let (next_start, to_id, to_share) = &pair[1];
        if from_id != to_id && *to_share >= options.change_threshold {
            warn!(line_number = next_start, ?from_id, ?to_id, to_share, "format change detected");
            format_changes.push(FormatChange {
                line_number: *next_start,
                from_pattern_id: from_id.clone(),
                to_pattern_id: to_id.clone(),
                confidence: *to_share,
            });
        }
    }

    info!(
        window_count = dominant_patterns.len(),
        change_count = format_changes.len(),
        "drift detection complete"
    );

    Ok(DriftReport {
        total_lines,
        matched_lines,
        pattern_distribution,
        format_changes,
        dominant_patterns,
        window_size,
        change_threshold: options.change_threshold,
    })
}

fn global_freq_of(id: &Option<String>, global_frequency: &FastHashMap<&str, usize>) -> usize {
    id.as_deref().and_then(|id| global_frequency.get(id).copied()).unwrap_or(0)
}
