use std::path::Path;

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::cli::VerifyArgs;
use crate::store::{TargetColumn, VerseLookup, fetch_text, open_read_only};

pub fn run(args: VerifyArgs) -> Result<()> {
    let target = args.target.to_target()?;
    info!(path = %args.db_path.display(), id = args.id, "verifying stored translation");

    let text = read_verse(&args.db_path, &target, args.id)?;
    if text.is_none() {
        warn!(id = args.id, column = target.text_column(), "stored text is NULL");
    }

    println!(
        "Verse {} {}: {}",
        args.id,
        target.text_column(),
        text.unwrap_or_default()
    );
    Ok(())
}

/// Reads the text column of exactly one row. A missing row is an error.
pub fn read_verse(db_path: &Path, target: &TargetColumn, id: i64) -> Result<Option<String>> {
    let connection = open_read_only(db_path)?;

    match fetch_text(&connection, target, id)? {
        VerseLookup::Found(text) => Ok(text),
        VerseLookup::NotFound => bail!(
            "no row in {} with {} = {id}",
            target.table(),
            target.id_column()
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rusqlite::Connection;

    use super::*;
    use crate::cli::{TargetArgs, UpdateArgs};
    use crate::commands::update::{UpdateOutcome, sync};
    use crate::store::tests::seed_store;

    #[test]
    fn read_verse_returns_text_written_by_update() {
        let dir = tempfile::tempdir().expect("tempdir");
        let args = UpdateArgs {
            json_path: dir.path().join("quran-english.json"),
            db_path: dir.path().join("quran.db"),
            target: TargetArgs {
                table: "ayah".to_string(),
                id_column: "id".to_string(),
                text_column: "text_english".to_string(),
            },
            strict: false,
            manifest_path: None,
        };
        fs::write(
            &args.json_path,
            r#"{"data":{"surahs":[{"ayahs":[{"number":1,"text":"In the name of Allah"}]}]}}"#,
        )
        .expect("write document");
        {
            let connection = Connection::open(&args.db_path).expect("create store");
            seed_store(&connection, &[(1, "")]);
        }

        let outcome = sync(&args).expect("update runs");
        assert!(matches!(outcome, UpdateOutcome::Committed(_)));

        let text = read_verse(&args.db_path, &TargetColumn::default(), 1).expect("row exists");
        assert_eq!(text.as_deref(), Some("In the name of Allah"));
    }

    #[test]
    fn read_verse_fails_when_no_row_matches() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("quran.db");
        {
            let connection = Connection::open(&db_path).expect("create store");
            seed_store(&connection, &[(2, "B")]);
        }

        let err = read_verse(&db_path, &TargetColumn::default(), 1).expect_err("no row 1");
        assert_eq!(err.to_string(), "no row in ayah with id = 1");
    }

    #[test]
    fn read_verse_fails_when_store_is_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("missing.db");

        let err = read_verse(&db_path, &TargetColumn::default(), 1).expect_err("no store");
        assert!(err.to_string().contains("failed to open"));
    }
}
