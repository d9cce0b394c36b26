//! Translation command handlers: export, import and import-list.

use anyhow::Result;
use harvester_core::translation::list_import_files;
use harvester_core::{
    ImportOptions, TranslationExporter, TranslationImporter, TranslationStatus,
};

use crate::app::context::AppContext;
use crate::cli::{ExportArgs, ImportArgs, ImportListArgs};

pub async fn run_export_command(ctx: &AppContext, args: &ExportArgs) -> Result<()> {
    let store = ctx.open_store().await?;
    let export_dir = args
        .export_dir
        .clone()
        .unwrap_or_else(|| ctx.settings.translations_dir.clone());
    let status = TranslationStatus::from(args.status);

    let exporter = TranslationExporter::new(store, export_dir);
    match exporter.export_batch(args.limit, status).await? {
        Some(batch) => {
            println!("Exported {} papers to {}", batch.papers, batch.path.display());
            println!("Batch id: {}", batch.batch_id);
        }
        None => println!("No papers with status '{status}' to export."),
    }
    Ok(())
}

pub async fn run_import_command(ctx: &AppContext, args: &ImportArgs) -> Result<()> {
    let store = ctx.open_store().await?;
    let options = ImportOptions::for_file(&args.file, args.dry_run, args.no_archive);
    let importer = TranslationImporter::new(store);
    let summary = importer.import_file(&args.file, &options).await?;

    if summary.dry_run {
        println!("Dry run: no changes were written.");
    }
    println!("Rows: {}", summary.total_rows);
    println!(
        "{}: {}",
        if summary.dry_run { "Would update" } else { "Updated" },
        summary.updated
    );
    println!("Skipped: {}", summary.skipped);
    if let Some(batch_id) = &summary.batch_id
        && !summary.dry_run
    {
        if summary.batch_marked {
            println!("Batch {batch_id} marked as imported");
        } else {
            println!("Batch {batch_id} not found in database");
        }
    }
    if let Some(archived) = &summary.archived_to {
        println!("Archived to {}", archived.display());
    }
    if !summary.errors.is_empty() {
        println!("Errors ({}):", summary.errors.len());
        for error in &summary.errors {
            println!("  - {error}");
        }
    }
    Ok(())
}

pub fn run_import_list_command(ctx: &AppContext, args: &ImportListArgs) -> Result<()> {
    let dir = args
        .dir
        .clone()
        .unwrap_or_else(|| ctx.settings.translations_dir.clone());
    let files = list_import_files(&dir)?;
    if files.is_empty() {
        println!("No CSV files found in {}", dir.display());
        return Ok(());
    }
    println!("CSV files in {}:", dir.display());
    for file in &files {
        println!("  {}", file.display());
    }
    Ok(())
}
