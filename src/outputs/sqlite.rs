//! SQLite output sink. Writes records into a single `records` table
//! inside one batched transaction.

use std::path::Path;

use rusqlite::{params, Connection};
use tracing::instrument;

use crate::error::{LogSculptError, Result};
use crate::streaming::ParsedRecord;

const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS records (
        line_number INTEGER NOT NULL,
        raw_line    TEXT NOT NULL,
        pattern_id  TEXT,
        fields      TEXT NOT NULL,
        typed_fields TEXT
    )
";

/// Writes `records` into a `records` table at `path`, creating the
/// table if absent, inside a single transaction for throughput.
#[instrument(skip(records))]
pub fn write_sqlite(path: impl AsRef<Path>, records: impl IntoIterator<Item = ParsedRecord>) -> Result<usize> {
    let path = path.as_ref();
    let mut conn =
        Connection::open(path).map_err(|e| LogSculptError::output(format!("failed to open {}: {e}", path.display())))?;
    conn.execute(CREATE_TABLE, [])
        .map_err(|e| LogSculptError::output(format!("failed to create table: {e}")))?;

    let tx = conn
        .transaction()
        .map_err(|e| LogSculptError::output(format!("failed to begin transaction: {e}")))?;

    let mut count = 0;
    {
        let mut stmt = tx
            .prepare("INSERT INTO records (line_number, raw_line, pattern_id, fields, typed_fields) VALUES (?1, ?2, ?3, ?4, ?5)")
            .map_err(|e| LogSculptError::output(format!("failed to prepare insert: {e}")))?;

        for record in records {
            let fields_json = serde_json::to_string(&record.fields)
                .map_err(|e| LogSculptError::output(format!("failed to serialize fields: {e}")))?;
            let typed_json = record
                .typed_fields
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| LogSculptError::output(format!("failed to serialize typed_fields: {e}")))?;

            stmt.execute(params![
                record.line_number as i64,
                record.raw_line,
                record.pattern_id,
                fields_json,
                typed_json,
            ])
            .map_err(|e| LogSculptError::output(format!("failed to insert record: {e}")))?;
            count += 1;
        }
    }

    tx.commit()
        .map_err(|e| LogSculptError::output(format!("failed to commit transaction: {e}")))?;
    Ok(count)
}
