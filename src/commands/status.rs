use anyhow::Result;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::store::{TargetColumn, count_filled, count_rows, ensure_target_columns, open_read_only};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StoreSummary {
    rows: i64,
    filled: i64,
}

pub fn run(args: StatusArgs) -> Result<()> {
    let target = args.target.to_target()?;

    info!(path = %args.db_path.display(), "status requested");

    if !args.db_path.exists() {
        warn!(path = %args.db_path.display(), "database file missing");
        return Ok(());
    }

    let connection = open_read_only(&args.db_path)?;
    ensure_target_columns(&connection, &target)?;
    let summary = summarize(&connection, &target)?;

    info!(
        table = target.table(),
        column = target.text_column(),
        rows = summary.rows,
        filled = summary.filled,
        "database status"
    );
    println!(
        "{}: {} of {} rows have {}",
        target.table(),
        summary.filled,
        summary.rows,
        target.text_column()
    );

    Ok(())
}

fn summarize(connection: &Connection, target: &TargetColumn) -> Result<StoreSummary> {
    Ok(StoreSummary {
        rows: count_rows(connection, target)?,
        filled: count_filled(connection, target)?,
    })
}
