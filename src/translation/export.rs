//! CSV export of papers awaiting translation.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info, instrument, warn};

use super::{BATCH_FILE_PREFIX, CSV_HEADERS, TEMPLATE_FILE_NAME, TranslationError, UTF8_BOM};
use crate::store::{Paper, PaperStore, TranslationStatus};

/// Default number of papers per export.
pub const DEFAULT_EXPORT_LIMIT: u32 = 50;

/// Suffixed ids tried after the bare timestamp is taken.
const MAX_BATCH_ID_SUFFIX: u32 = 99;

/// A written batch file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedBatch {
    /// `YYYYMMDD_HHMMSS`, with `_N` appended when that second is already taken.
    pub batch_id: String,
    pub path: PathBuf,
    pub papers: usize,
}

/// Writes translation batches into one directory.
#[derive(Debug, Clone)]
pub struct TranslationExporter {
    store: PaperStore,
    export_dir: PathBuf,
}

impl TranslationExporter {
    #[must_use]
    pub fn new(store: PaperStore, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            export_dir: export_dir.into(),
        }
    }

    #[must_use]
    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    /// Exports up to `limit` papers in `status` that carry an English abstract.
    ///
    /// Returns `Ok(None)` when nothing matches; no file or batch row is created.
    ///
    /// # Errors
    ///
    /// Returns [`TranslationError`] when the file cannot be written or the
    /// batch cannot be recorded. A file whose batch row fails is removed.
    /// Existing batch files are never overwritten.
    #[instrument(skip(self), fields(dir = %self.export_dir.display()))]
    pub async fn export_batch(
        &self,
        limit: u32,
        status: TranslationStatus,
    ) -> Result<Option<ExportedBatch>, TranslationError> {
        let papers = self.store.papers_for_translation(status, limit).await?;
        if papers.is_empty() {
            info!(%status, "No papers to export");
            return Ok(None);
        }

        fs::create_dir_all(&self.export_dir)
            .map_err(|err| TranslationError::io(&self.export_dir, err))?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let (batch_id, path, file) = self.reserve_batch(&stamp).await?;
        if let Err(err) = write_batch_file(file, &path, &papers) {
            discard_file(&path);
            return Err(err);
        }

        if let Err(err) = self
            .store
            .record_batch(&batch_id, &path.display().to_string(), papers.len())
            .await
        {
            discard_file(&path);
            return Err(err.into());
        }

        if let Err(err) = ensure_template(&self.export_dir) {
            warn!(error = %err, "Could not write translation template");
        }

        info!(batch_id = %batch_id, papers = papers.len(), path = %path.display(), "Exported translation batch");
        Ok(Some(ExportedBatch {
            batch_id,
            path,
            papers: papers.len(),
        }))
    }

    /// Picks the first id derived from `stamp` with no batch row and no file,
    /// creating the file so a concurrent export cannot take it.
    async fn reserve_batch(
        &self,
        stamp: &str,
    ) -> Result<(String, PathBuf, File), TranslationError> {
        for suffix in 1..=MAX_BATCH_ID_SUFFIX {
            let batch_id = if suffix == 1 {
                stamp.to_string()
            } else {
                format!("{stamp}_{suffix}")
            };
            if self.store.get_batch(&batch_id).await?.is_some() {
                continue;
            }
            let path = self
                .export_dir
                .join(format!("{BATCH_FILE_PREFIX}{batch_id}.csv"));
            match create_new_with_bom(&path)? {
                Some(file) => return Ok((batch_id, path, file)),
                None => debug!(path = %path.display(), "Batch file already exists"),
            }
        }
        Err(TranslationError::io(
            &self.export_dir,
            io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("no free batch id left for {stamp}"),
            ),
        ))
    }
}

/// Removes a batch file created by the current export.
fn discard_file(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %err, "Could not remove orphaned batch file");
    }
}

/// Creates `path` and writes the BOM. `None` when the file already exists.
fn create_new_with_bom(path: &Path) -> Result<Option<File>, TranslationError> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => return Ok(None),
        Err(err) => return Err(TranslationError::io(path, err)),
    };
    if let Err(err) = file.write_all(UTF8_BOM.as_bytes()) {
        discard_file(path);
        return Err(TranslationError::io(path, err));
    }
    Ok(Some(file))
}

fn write_batch_file(file: File, path: &Path, papers: &[Paper]) -> Result<(), TranslationError> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    writer.write_record(CSV_HEADERS)?;

    for paper in papers {
        let paper_id = paper.id.to_string();
        writer.write_record([
            paper_id.as_str(),
            paper.pmid.as_str(),
            paper.title.as_str(),
            paper.abstract_text.as_deref().unwrap_or_default(),
            paper.journal_name.as_deref().unwrap_or_default(),
            paper.publication_year.as_deref().unwrap_or_default(),
            paper.created_date.as_str(),
            paper.translation_status_str.as_str(),
            paper.abstract_korean.as_deref().unwrap_or_default(),
            paper.translator_notes.as_deref().unwrap_or_default(),
            "",
        ])?;
    }

    writer
        .flush()
        .map_err(|err| TranslationError::io(path, err))?;
    Ok(())
}

/// Writes `translation_template.csv` into `dir` unless it already exists.
///
/// Returns the template path.
///
/// # Errors
///
/// Returns [`TranslationError`] when the file cannot be written.
pub fn ensure_template(dir: &Path) -> Result<PathBuf, TranslationError> {
    let path = dir.join(TEMPLATE_FILE_NAME);
    let Some(file) = create_new_with_bom(&path)? else {
        return Ok(path);
    };
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    writer.write_record(CSV_HEADERS)?;
    writer.write_record([
        "1",
        "12345678",
        "Example paper title",
        "English abstract to translate.",
        "Example Journal",
        "2024",
        "2024-01-01",
        "completed",
        "번역된 한국어 초록을 입력하세요.",
        "Optional translator notes",
        "Reviewer initials",
    ])?;
    writer
        .flush()
        .map_err(|err| TranslationError::io(&path, err))?;
    Ok(path)
}
