use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use regex::Regex;
use rusqlite::{Connection, OpenFlags, OptionalExtension};

use crate::model::UpdateTarget;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The table and column pair a translation is written into.
///
/// Names are checked against a plain identifier pattern on construction, so
/// the SQL built from them never needs quoting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetColumn {
    table: String,
    id_column: String,
    text_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerseLookup {
    Found(Option<String>),
    NotFound,
}

impl TargetColumn {
    pub fn new(table: &str, id_column: &str, text_column: &str) -> Result<Self> {
        let pattern = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
            .context("failed to compile SQL identifier regex")?;

        for (role, name) in [
            ("table", table),
            ("id column", id_column),
            ("text column", text_column),
        ] {
            if !pattern.is_match(name) {
                bail!("invalid {role} name: {name:?}");
            }
        }

        Ok(Self {
            table: table.to_string(),
            id_column: id_column.to_string(),
            text_column: text_column.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn text_column(&self) -> &str {
        &self.text_column
    }

    pub fn update_sql(&self) -> String {
        format!(
            "UPDATE {} SET {} = ?1 WHERE {} = ?2",
            self.table, self.text_column, self.id_column
        )
    }

    fn select_sql(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            self.text_column, self.table, self.id_column
        )
    }

    pub fn describe(&self) -> UpdateTarget {
        UpdateTarget {
            table: self.table.clone(),
            id_column: self.id_column.clone(),
            text_column: self.text_column.clone(),
        }
    }
}

impl Default for TargetColumn {
    fn default() -> Self {
        Self {
            table: "ayah".to_string(),
            id_column: "id".to_string(),
            text_column: "text_english".to_string(),
        }
    }
}

/// Opens an existing store for writing. The file is never created.
pub fn open_read_write(path: &Path) -> Result<Connection> {
    let connection = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open {}", path.display()))?;
    configure_connection(&connection)?;
    Ok(connection)
}

pub fn open_read_only(path: &Path) -> Result<Connection> {
    let connection = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open {}", path.display()))?;
    configure_connection(&connection)?;
    Ok(connection)
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .busy_timeout(BUSY_TIMEOUT)
        .context("failed to set busy timeout")?;
    Ok(())
}

pub fn ensure_target_columns(connection: &Connection, target: &TargetColumn) -> Result<()> {
    let pragma_sql = format!("PRAGMA table_info({})", target.table);
    let mut statement = connection
        .prepare(&pragma_sql)
        .with_context(|| format!("failed to inspect table {}", target.table))?;

    let mut has_id = false;
    let mut has_text = false;
    let mut rows = statement.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        has_id |= name == target.id_column;
        has_text |= name == target.text_column;
    }

    if !has_id && !has_text {
        bail!("table {} not found or has neither target column", target.table);
    }
    if !has_id {
        bail!("table {} has no column {}", target.table, target.id_column);
    }
    if !has_text {
        bail!("table {} has no column {}", target.table, target.text_column);
    }

    Ok(())
}

pub fn fetch_text(connection: &Connection, target: &TargetColumn, id: i64) -> Result<VerseLookup> {
    let text = connection
        .query_row(&target.select_sql(), [id], |row| row.get::<_, Option<String>>(0))
        .optional()
        .with_context(|| format!("failed to read {} row {id}", target.table))?;

    Ok(match text {
        Some(text) => VerseLookup::Found(text),
        None => VerseLookup::NotFound,
    })
}

pub fn count_rows(connection: &Connection, target: &TargetColumn) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", target.table);
    let count = connection.query_row(&sql, [], |row| row.get(0))?;
    Ok(count)
}

pub fn count_filled(connection: &Connection, target: &TargetColumn) -> Result<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {col} IS NOT NULL AND {col} <> ''",
        target.table,
        col = target.text_column
    );
    let count = connection.query_row(&sql, [], |row| row.get(0))?;
    Ok(count)
}
