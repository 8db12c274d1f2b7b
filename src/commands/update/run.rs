use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use super::apply::{ApplyOptions, UpdateOutcome, apply_translations};
use crate::cli::UpdateArgs;
use crate::model::{LoadedDocument, UpdateCounts, UpdateRunManifest, load_document};
use crate::store::{TargetColumn, ensure_target_columns, open_read_write};
use crate::util::{now_utc_string, utc_compact_string, write_json_pretty};

const UNMATCHED_PREVIEW: usize = 10;

pub fn run(args: UpdateArgs) -> Result<()> {
    let outcome = sync(&args)?;

    match &outcome {
        UpdateOutcome::Committed(report) => {
            println!("Successfully updated {} verses.", report.verses_written);
        }
        UpdateOutcome::RolledBack { cause } => {
            println!("Error updating database: {cause:#}");
        }
    }

    Ok(())
}

/// Loads the document, opens the store and applies the update.
///
/// Failures before the transaction starts are returned as `Err`; failures
/// inside it come back as `UpdateOutcome::RolledBack`. The run manifest is
/// best effort and only logged when it cannot be written.
pub(crate) fn sync(args: &UpdateArgs) -> Result<UpdateOutcome> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("update-{}", utc_compact_string(started_ts));
    let target = args.target.to_target()?;

    info!(path = %args.json_path.display(), run_id = %run_id, "loading translation document");
    let loaded = load_document(&args.json_path)?;
    info!(
        surahs = loaded.document.surah_count(),
        verses = loaded.document.verse_count(),
        sha256 = %loaded.sha256,
        "loaded translation document"
    );

    info!(path = %args.db_path.display(), "connecting to database");
    let mut connection = open_read_write(&args.db_path)?;
    ensure_target_columns(&connection, &target)?;

    info!(
        table = target.table(),
        column = target.text_column(),
        strict = args.strict,
        "updating database"
    );
    let outcome = apply_translations(
        &mut connection,
        &loaded.document,
        &target,
        ApplyOptions {
            strict: args.strict,
        },
    );

    if let Err((_, err)) = connection.close() {
        warn!(error = %err, "failed to close database connection");
    }

    match &outcome {
        UpdateOutcome::Committed(report) => {
            if !report.unmatched_ids.is_empty() {
                let preview = &report.unmatched_ids
                    [..report.unmatched_ids.len().min(UNMATCHED_PREVIEW)];
                warn!(
                    count = report.unmatched_ids.len(),
                    ids = ?preview,
                    "verses matched no row"
                );
            }
            info!(
                verses = report.verses_written,
                rows_changed = report.rows_changed,
                "update committed"
            );
        }
        UpdateOutcome::RolledBack { cause } => {
            let reason = format!("{cause:#}");
            warn!(error = %reason, "update rolled back");
        }
    }

    // The transaction has already finished here; a manifest failure must not
    // change how the run is reported.
    if let Some(manifest_path) = &args.manifest_path {
        let manifest = build_manifest(args, &run_id, started_at, &loaded, &target, &outcome);
        match write_json_pretty(manifest_path, &manifest) {
            Ok(()) => info!(path = %manifest_path.display(), "wrote update run manifest"),
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(
                    path = %manifest_path.display(),
                    error = %reason,
                    "failed to write update run manifest"
                );
            }
        }
    }

    Ok(outcome)
}

fn build_manifest(
    args: &UpdateArgs,
    run_id: &str,
    started_at: String,
    loaded: &LoadedDocument,
    target: &TargetColumn,
    outcome: &UpdateOutcome,
) -> UpdateRunManifest {
    let (status, counts, unmatched_ids, failure_reason) = match outcome {
        UpdateOutcome::Committed(report) => (
            "committed",
            UpdateCounts {
                surah_count: loaded.document.surah_count(),
                verse_count: loaded.document.verse_count(),
                verses_written: report.verses_written,
                rows_changed: report.rows_changed,
                unmatched_count: report.unmatched_ids.len(),
            },
            report.unmatched_ids.clone(),
            None,
        ),
        UpdateOutcome::RolledBack { cause } => (
            "rolled_back",
            UpdateCounts {
                surah_count: loaded.document.surah_count(),
                verse_count: loaded.document.verse_count(),
                verses_written: 0,
                rows_changed: 0,
                unmatched_count: 0,
            },
            Vec::new(),
            Some(format!("{cause:#}")),
        ),
    };

    UpdateRunManifest {
        manifest_version: 1,
        run_id: run_id.to_string(),
        status: status.to_string(),
        started_at,
        updated_at: now_utc_string(),
        source_path: args.json_path.display().to_string(),
        source_sha256: loaded.sha256.clone(),
        db_path: args.db_path.display().to_string(),
        strict: args.strict,
        target: target.describe(),
        counts,
        unmatched_ids,
        failure_reason,
    }
}
