//! Manual translation workflow over CSV files.
//!
//! Papers are exported in batches to `translation_batch_<id>.csv`, translated
//! by hand in a spreadsheet, and imported back. Files are UTF-8 with a BOM so
//! spreadsheet tools pick the right encoding.

mod error;
mod export;
mod import;

pub use error::TranslationError;
pub use export::{DEFAULT_EXPORT_LIMIT, ExportedBatch, TranslationExporter, ensure_template};
pub use import::{ImportOptions, ImportSummary, TranslationImporter, list_import_files};

/// Column order of batch files.
pub const CSV_HEADERS: [&str; 11] = [
    "paper_id",
    "pmid",
    "title",
    "abstract_english",
    "journal_name",
    "publication_year",
    "created_date",
    "translation_status",
    "abstract_korean",
    "translator_notes",
    "quality_check",
];

/// Columns an import file must carry.
pub const REQUIRED_IMPORT_COLUMNS: [&str; 3] =
    ["paper_id", "abstract_korean", "translation_status"];

pub(crate) const UTF8_BOM: &str = "\u{feff}";
pub(crate) const BATCH_FILE_PREFIX: &str = "translation_batch_";
pub(crate) const TEMPLATE_FILE_NAME: &str = "translation_template.csv";
