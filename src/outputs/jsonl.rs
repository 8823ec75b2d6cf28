//! JSONL output sink. One `ParsedRecord` per line, in iteration order.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::instrument;

use crate::error::{LogSculptError, Result};
use crate::streaming::ParsedRecord;

/// Writes `records` to `path` as newline-delimited JSON, one object per
/// record, preserving the order of the iterator.
#[instrument(skip(records))]
pub fn write_jsonl(path: impl AsRef<Path>, records: impl IntoIterator<Item = ParsedRecord>) -> Result<usize> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| LogSculptError::io(path, e))?;
    let mut writer = BufWriter::new(file);

    let mut count = 0;
    for record in records {
        let line = serde_json::to_string(&record)
            .map_err(|e| LogSculptError::output(format!("failed to serialize record: {e}")))?;
        writeln!(writer, "{line}").map_err(|e| LogSculptError::io(path, e))?;
        count += 1;
    }
    writer.flush().map_err(|e| LogSculptError::io(path, e))?;
    Ok(count)
}
