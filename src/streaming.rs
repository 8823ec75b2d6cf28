//! Streaming parse engine (C7): memory-mapped line reader, streaming
//! parse, and the parallel learner.

use std::collections::HashMap as StdHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use hashbrown::HashMap;
use memmap2::Mmap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::cache::PatternCache;
use crate::clustering::cluster_by_exact_signature;
use crate::error::{LogSculptError, Result};
use crate::merging::merge_patterns;
use crate::options::Options;
use crate::patterns::{synthesize_pattern, Pattern, PatternElement, PatternSet};
use crate::tokenizer::{tokenize, Token, TokenType};
use crate::types::{detect_type, TypedValue};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedRecord {
    pub line_number: usize,
    pub raw_line: String,
    pub pattern_id: Option<String>,
    pub fields: StdHashMap<String, String>,
    pub typed_fields: Option<StdHashMap<String, TypedValue>>,
}

/// Reads `path` into UTF-8 lines (trailing newlines stripped, invalid
/// bytes replaced). Tries a memory-mapped read when `use_mmap` is set,
/// falling back to buffered reads with identical semantics on any
/// mapping failure (spec §9: mmap is an optimization, not a contract).
#[instrument]
pub fn read_lines(path: &Path, use_mmap: bool) -> Result<Vec<String>> {
    if use_mmap {
        if let Some(lines) = read_lines_mmap(path)? {
            return Ok(lines);
        }
        debug!("mmap unavailable, falling back to buffered reads");
    }
    read_lines_buffered(path)
}

fn read_lines_mmap(path: &Path) -> Result<Option<Vec<String>>> {
    let file = File::open(path).map_err(|e| LogSculptError::io(path, e))?;
    // SAFETY: the file is not mutated elsewhere for the lifetime of this
    // read; any page fault races that violate that degrade to a garbled
    // read, not memory unsafety.
    let mmap = match unsafe { Mmap::map(&file) } {
        Ok(m) => m,
        Err(_) => return Ok(None),
    };
    let text = String::from_utf8_lossy(&mmap);
    Ok(Some(split_lines(&text)))
}

fn read_lines_buffered(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|e| LogSculptError::io(path, e))?;
    let reader = BufReader::new(file);
    let mut lines = Vec::new();
    for line in reader.lines() {
        match line {
            Ok(l) => lines.push(l),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                // Should not normally happen since `lines()` already
                // assumes UTF-8; kept for parity with the mmap path.
                lines.push(String::new());
            }
            Err(e) => return Err(LogSculptError::io(path, e)),
        }
    }
    Ok(lines)
}

fn split_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text.split('\n').map(|l| l.trim_end_matches('\r').to_owned()).collect();
    if lines.last().map(|l| l.is_empty()).unwrap_or(false) && text.ends_with('\n') {
        lines.pop();
    }
    lines
}

/// Lazy, pull-based stream of parsed records. Emits in source order,
/// never reorders, skips empty source lines without emitting a record
/// for them (the next emitted record still carries its true source
/// line number).
pub struct StreamParse {
    lines: std::vec::IntoIter<(usize, String)>,
    cache: PatternCache,
    detect_types: bool,
    callback: Option<Box<dyn FnMut(&ParsedRecord)>>,
}

impl Iterator for StreamParse {
    type Item = ParsedRecord;

    fn next(&mut self) -> Option<ParsedRecord> {
        for (line_number, raw_line) in self.lines.by_ref() {
            if raw_line.is_empty() {
                continue;
            }
            let record = build_record(line_number, raw_line, &self.cache, self.detect_types);
            if let Some(cb) = self.callback.as_mut() {
                cb(&record);
            }
            return Some(record);
        }
        None
    }
}

/// `stream_parse(path, patterns, options) -> iterable<ParsedRecord>`.
#[instrument(skip(patterns, options))]
pub fn stream_parse(path: impl AsRef<Path>, patterns: &PatternSet, options: &Options) -> Result<StreamParse> {
    stream_parse_with_callback(path, patterns, options, None)
}

/// Same contract as [`stream_parse`], with a callback invoked for each
/// emitted record for side-effectful observation (spec §4.7).
pub fn stream_parse_with_callback(
    path: impl AsRef<Path>,
    patterns: &PatternSet,
    options: &Options,
    callback: Option<Box<dyn FnMut(&ParsedRecord)>>,
) -> Result<StreamParse> {
    let lines = read_lines(path.as_ref(), options.use_mmap)?;
    let numbered = lines.into_iter().enumerate().map(|(i, l)| (i + 1, l)).collect::<Vec<_>>();
    Ok(StreamParse {
        lines: numbered.into_iter(),
        cache: PatternCache::new(patterns.clone()),
        detect_types: options.detect_types,
        callback,
    })
}

/// `parse_logs(path, patterns, options) -> iterable<ParsedRecord>`. An
/// eagerly materialized realization of the same contract as
/// `stream_parse` (spec §9: pull iterator, channel, or eager list are
/// all valid realizations so long as order and count hold).
pub fn parse_logs(path: impl AsRef<Path>, patterns: &PatternSet, options: &Options) -> Result<Vec<ParsedRecord>> {
    Ok(stream_parse(path, patterns, options)?.collect())
}

fn build_record(
    line_number: usize,
    raw_line: String,
    cache: &PatternCache,
    detect_types: bool,
) -> ParsedRecord {
    let (pattern, fields) = cache.match_line(&raw_line);
    let pattern_id = pattern.map(|p| p.id.clone());

    let field_types: HashMap<&str, TokenType> = pattern
        .map(|p| {
            p.elements
                .iter()
                .filter_map(|e| match e {
                    PatternElement::Field { token_type, name } => Some((name.as_str(), *token_type)),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let fields: StdHashMap<String, String> = fields.map(|f| f.into_iter().collect()).unwrap_or_default();

    let typed_fields = detect_types.then(|| {
        fields
            .iter()
            .map(|(name, value)| {
                let token_type = field_types.get(name.as_str()).copied().unwrap_or(TokenType::Word);
                (name.clone(), detect_type(value, token_type))
            })
            .collect::<StdHashMap<_, _>>()
    });

    ParsedRecord {
        line_number,
        raw_line,
        pattern_id,
        fields,
        typed_fields,
    }
}

/// `parallel_learn(path, options) -> PatternSet`. Falls back to the
/// sequential learner when the sample fits in one chunk or only one
/// worker is requested; otherwise splits into `options.num_workers`
/// contiguous chunks, learns each independently (tokenize -> exact
/// signature bucket -> synthesize), and reduces with a global
/// `merge_patterns`.
#[instrument(skip(options))]
pub fn parallel_learn(path: impl AsRef<Path>, options: &Options) -> Result<PatternSet> {
    let mut lines = read_lines(path.as_ref(), options.use_mmap)?;
    if let Some(sample) = options.sample_size {
        lines.truncate(sample);
    }
    if lines.is_empty() {
        return Ok(PatternSet::new());
    }

    if lines.len() <= options.chunk_size || options.num_workers <= 1 {
        debug!("parallel_learn falling back to sequential learner");
        return Ok(crate::patterns::learn_from_lines(lines, options));
    }

    let chunks = split_into_chunks(lines, options.num_workers);
    let per_worker: Vec<Vec<Pattern>> = chunks
        .into_par_iter()
        .enumerate()
        .map(|(worker_idx, chunk)| learn_chunk(worker_idx, chunk))
        .collect();

    let all_patterns: Vec<Pattern> = per_worker.into_iter().flatten().collect();
    let merged = merge_patterns(all_patterns);
    info!(pattern_count = merged.len(), "parallel_learn reduced worker pattern sets");
    let mut set = PatternSet { patterns: merged };
    set.sort();
    Ok(set)
}

fn learn_chunk(worker_idx: usize, lines: Vec<String>) -> Vec<Pattern> {
    let tokenized: Vec<(Vec<Token>, &str)> = lines.iter().map(|l| (tokenize(l), l.as_str())).collect();
    let clusters = cluster_by_exact_signature(tokenized);
    clusters
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.members.is_empty())
        .filter_map(|(i, c)| synthesize_pattern(c, format!("w{worker_idx}_p{i}")))
        .collect()
}

fn split_into_chunks(lines: Vec<String>, num_workers: usize) -> Vec<Vec<String>> {
    let n = lines.len();
    let base = n / num_workers;
    let rem = n % num_workers;
    let mut chunks = Vec::with_capacity(num_workers);
    let mut iter = lines.into_iter();
    for i in 0..num_workers {
        let size = base + usize::from(i < rem);
        chunks.push(iter.by_ref().take(size).collect());
    }
    chunks
}
