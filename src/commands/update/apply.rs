use anyhow::{Context, Result, bail};
use rusqlite::{Connection, params};
use tracing::debug;

use crate::model::TranslationDocument;
use crate::store::TargetColumn;

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Treat a verse id with no matching row as a failure.
    pub strict: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub verses_written: usize,
    pub rows_changed: usize,
    pub unmatched_ids: Vec<i64>,
}

/// Result of one import transaction.
///
/// `RolledBack` means nothing from this run reached the store.
#[derive(Debug)]
pub enum UpdateOutcome {
    Committed(UpdateReport),
    RolledBack { cause: anyhow::Error },
}

/// Writes every verse of `document` into the target column inside a single
/// transaction. Errors raised while writing or committing are returned as
/// `RolledBack` instead of being propagated.
pub fn apply_translations(
    connection: &mut Connection,
    document: &TranslationDocument,
    target: &TargetColumn,
    options: ApplyOptions,
) -> UpdateOutcome {
    match write_verses(connection, document, target, options) {
        Ok(report) => UpdateOutcome::Committed(report),
        Err(cause) => UpdateOutcome::RolledBack { cause },
    }
}

fn write_verses(
    connection: &mut Connection,
    document: &TranslationDocument,
    target: &TargetColumn,
    options: ApplyOptions,
) -> Result<UpdateReport> {
    // Dropping `tx` on any early return rolls the whole run back.
    let tx = connection
        .transaction()
        .context("failed to begin transaction")?;
    let mut report = UpdateReport::default();

    {
        let mut statement = tx
            .prepare(&target.update_sql())
            .with_context(|| format!("failed to prepare update on {}", target.table()))?;

        for verse in document.verses() {
            let verse = verse.context("malformed verse record")?;
            let changed = statement
                .execute(params![verse.text, verse.number])
                .with_context(|| format!("failed to update {} row {}", target.table(), verse.number))?;

            report.verses_written += 1;
            report.rows_changed += changed;

            if changed == 0 {
                if options.strict {
                    bail!(
                        "verse {} matches no row in {}",
                        verse.number,
                        target.table()
                    );
                }
                debug!(id = verse.number, "verse matched no row");
                report.unmatched_ids.push(verse.number);
            }
        }
    }

    tx.commit().context("failed to commit translation update")?;
    Ok(report)
}
