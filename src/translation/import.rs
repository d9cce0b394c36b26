//! CSV import of translator output.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::Local;
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use super::{REQUIRED_IMPORT_COLUMNS, TEMPLATE_FILE_NAME, TranslationError, UTF8_BOM};
use crate::store::{PaperStore, TranslationStatus, TranslationUpdate};

static BATCH_FILE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^translation_batch_(.+)\.csv$").ok());

/// How an import should behave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    /// Validate and count without writing or archiving.
    pub dry_run: bool,
    /// Move the file here after a successful import; `None` leaves it in place.
    pub archive_dir: Option<PathBuf>,
}

impl ImportOptions {
    /// Archive into `<file dir>/archive` unless `no_archive` is set.
    #[must_use]
    pub fn for_file(path: &Path, dry_run: bool, no_archive: bool) -> Self {
        let archive_dir = if no_archive {
            None
        } else {
            Some(
                path.parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join("archive"),
            )
        };
        Self {
            dry_run,
            archive_dir,
        }
    }
}

/// Counters and errors from one import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub total_rows: usize,
    /// Rows written, or that would be written in a dry run.
    pub updated: usize,
    /// Rows with a blank `paper_id` or a finished status without Korean text.
    pub skipped: usize,
    /// Per-row problems that did not abort the file.
    pub errors: Vec<String>,
    /// Batch id parsed from the file name.
    pub batch_id: Option<String>,
    pub batch_marked: bool,
    pub archived_to: Option<PathBuf>,
    pub dry_run: bool,
}

/// One validated data row.
#[derive(Debug)]
struct ImportRow {
    line: usize,
    paper_id: Option<i64>,
    korean: String,
    status: TranslationStatus,
    notes: String,
}

/// Applies translation CSV files to the store.
#[derive(Debug, Clone)]
pub struct TranslationImporter {
    store: PaperStore,
}

impl TranslationImporter {
    #[must_use]
    pub fn new(store: PaperStore) -> Self {
        Self { store }
    }

    /// Imports one translation file.
    ///
    /// The whole file is validated before anything is written; a rejected
    /// file leaves the database untouched. Rows naming unknown papers are
    /// reported in [`ImportSummary::errors`] and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`TranslationError::Validation`] when the file is rejected, and
    /// [`TranslationError::Io`], [`TranslationError::Csv`] or
    /// [`TranslationError::Store`] when reading or writing fails.
    #[instrument(skip(self, options), fields(path = %path.display(), dry_run = options.dry_run))]
    pub async fn import_file(
        &self,
        path: &Path,
        options: &ImportOptions,
    ) -> Result<ImportSummary, TranslationError> {
        let raw = fs::read_to_string(path).map_err(|err| TranslationError::io(path, err))?;
        let rows = parse_rows(&raw)?;

        let mut summary = ImportSummary {
            total_rows: rows.len(),
            dry_run: options.dry_run,
            batch_id: batch_id_from_path(path),
            ..ImportSummary::default()
        };

        let mut pending: Vec<(usize, TranslationUpdate)> = Vec::new();
        for row in rows {
            let Some(paper_id) = row.paper_id else {
                debug!(line = row.line, "Blank paper_id; row skipped");
                summary.skipped += 1;
                continue;
            };
            if row.status.requires_translation() && row.korean.trim().is_empty() {
                warn!(
                    line = row.line,
                    paper_id,
                    status = %row.status,
                    "Finished status without Korean abstract; row skipped"
                );
                summary.skipped += 1;
                continue;
            }
            pending.push((
                row.line,
                TranslationUpdate {
                    paper_id,
                    abstract_korean: non_blank(row.korean),
                    status: row.status,
                    translator_notes: non_blank(row.notes),
                },
            ));
        }

        let missing: HashSet<i64> = if options.dry_run {
            let ids: Vec<i64> = pending.iter().map(|(_, update)| update.paper_id).collect();
            let found: HashSet<i64> = self
                .store
                .existing_paper_ids(&ids)
                .await?
                .into_iter()
                .collect();
            ids.into_iter().filter(|id| !found.contains(id)).collect()
        } else {
            let updates: Vec<TranslationUpdate> =
                pending.iter().map(|(_, update)| update.clone()).collect();
            let report = self.store.apply_translations(&updates).await?;
            report.missing.into_iter().collect()
        };

        let mut completed = 0;
        for (line, update) in &pending {
            if missing.contains(&update.paper_id) {
                summary
                    .errors
                    .push(format!("line {line}: paper_id {} not found", update.paper_id));
                continue;
            }
            summary.updated += 1;
            if update.abstract_korean.is_some() {
                completed += 1;
            }
        }

        if options.dry_run {
            info!(
                rows = summary.total_rows,
                would_update = summary.updated,
                errors = summary.errors.len(),
                "Dry run complete; nothing written"
            );
            return Ok(summary);
        }

        if let Some(batch_id) = &summary.batch_id {
            summary.batch_marked = self.store.mark_batch_imported(batch_id, completed).await?;
            if !summary.batch_marked {
                warn!(batch_id = %batch_id, "No exported batch with this id");
            }
        }

        if let Some(archive_dir) = &options.archive_dir {
            summary.archived_to = Some(archive_file(
                path,
                archive_dir,
                summary.batch_id.as_deref(),
            )?);
        }

        info!(
            rows = summary.total_rows,
            updated = summary.updated,
            skipped = summary.skipped,
            errors = summary.errors.len(),
            "Imported translations"
        );
        Ok(summary)
    }
}

/// Validates the whole file and returns its rows.
fn parse_rows(raw: &str) -> Result<Vec<ImportRow>, TranslationError> {
    let body = raw.strip_prefix(UTF8_BOM).unwrap_or(raw);
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|header| header == name);

    let missing: Vec<&str> = REQUIRED_IMPORT_COLUMNS
        .iter()
        .copied()
        .filter(|&name| column(name).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(TranslationError::validation(format!(
            "missing required columns: {}",
            missing.join(", ")
        )));
    }
    let (Some(id_col), Some(korean_col), Some(status_col)) = (
        column("paper_id"),
        column("abstract_korean"),
        column("translation_status"),
    ) else {
        return Err(TranslationError::validation("missing required columns"));
    };
    let notes_col = column("translator_notes");

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        // Header is line 1.
        let line = index + 2;
        let field = |col: usize| record.get(col).unwrap_or_default();

        let raw_id = field(id_col).trim();
        let paper_id = if raw_id.is_empty() {
            None
        } else {
            Some(raw_id.parse::<i64>().map_err(|_| {
                TranslationError::validation(format!(
                    "line {line}: paper_id '{raw_id}' is not a number"
                ))
            })?)
        };

        let raw_status = field(status_col).trim();
        let status = if paper_id.is_none() && raw_status.is_empty() {
            TranslationStatus::Pending
        } else {
            raw_status.parse::<TranslationStatus>().map_err(|_| {
                TranslationError::validation(format!(
                    "line {line}: invalid translation_status '{raw_status}' (expected one of: {})",
                    TranslationStatus::EXPECTED
                ))
            })?
        };

        rows.push(ImportRow {
            line,
            paper_id,
            korean: field(korean_col).to_string(),
            status,
            notes: notes_col.map(field).unwrap_or_default().to_string(),
        });
    }

    if rows.is_empty() {
        return Err(TranslationError::validation("file contains no data rows"));
    }
    Ok(rows)
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn batch_id_from_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let pattern = BATCH_FILE_PATTERN.as_ref()?;
    pattern
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn archive_file(
    path: &Path,
    archive_dir: &Path,
    batch_id: Option<&str>,
) -> Result<PathBuf, TranslationError> {
    fs::create_dir_all(archive_dir).map_err(|err| TranslationError::io(archive_dir, err))?;

    let label = batch_id.map_or_else(
        || {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "translations".to_string())
        },
        str::to_string,
    );
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let destination = archive_dir.join(format!("imported_{label}_{timestamp}.csv"));

    if fs::rename(path, &destination).is_err() {
        // Cross-device moves need a copy.
        fs::copy(path, &destination).map_err(|err| TranslationError::io(&destination, err))?;
        fs::remove_file(path).map_err(|err| TranslationError::io(path, err))?;
    }
    info!(to = %destination.display(), "Archived imported file");
    Ok(destination)
}

/// CSV files in `dir` that look importable, sorted by name.
///
/// A missing directory yields an empty list. The template file is excluded.
///
/// # Errors
///
/// Returns [`TranslationError::Io`] if the directory cannot be read.
pub fn list_import_files(dir: &Path) -> Result<Vec<PathBuf>, TranslationError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|err| TranslationError::io(dir, err))? {
        let path = entry.map_err(|err| TranslationError::io(dir, err))?.path();
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        let is_template = path
            .file_name()
            .is_some_and(|name| name == TEMPLATE_FILE_NAME);
        if path.is_file() && is_csv && !is_template {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
