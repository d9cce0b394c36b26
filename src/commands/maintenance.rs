//! Maintenance and reporting command handlers.

use anyhow::Result;
use chrono::Local;
use harvester_core::report::{write_blog_post, write_trend_report};
use harvester_core::store::Paper;

use crate::app::context::AppContext;
use crate::cli::{PapersArgs, RecategorizeArgs, ReportArgs};

const UNCATEGORIZED_LABEL: &str = "Uncategorized";

pub async fn run_recategorize_command(ctx: &AppContext, args: &RecategorizeArgs) -> Result<()> {
    let store = ctx.open_store().await?;
    if store.categorizer().is_empty() {
        println!(
            "Warning: no category rules loaded from {}; every paper will lose its categories.",
            ctx.settings.rules_file.display()
        );
    }
    let batch_size = usize::try_from(args.batch_size).unwrap_or(usize::MAX);
    let report = store.recategorize_all(batch_size).await?;

    println!("Processed: {}", report.processed);
    println!("Succeeded: {}", report.succeeded);
    println!("Failed: {}", report.failed);
    println!("Batches committed: {}", report.batches);
    Ok(())
}

pub async fn run_report_command(ctx: &AppContext, args: &ReportArgs) -> Result<()> {
    let store = ctx.open_store().await?;
    let today = Local::now().date_naive();
    let output_dir = &ctx.settings.output_dir;

    let path = write_trend_report(&store, output_dir, args.months, today).await?;
    println!("Trend report saved: {}", path.display());
    if args.blog {
        let post = write_blog_post(&store, output_dir, args.months, today).await?;
        println!("Blog post saved: {}", post.display());
    }
    Ok(())
}

fn render_paper_line(paper: &Paper, categories: &[String]) -> String {
    let journal = paper.journal_name.as_deref().unwrap_or("Unknown journal");
    let year = paper.publication_year.as_deref().unwrap_or("n.d.");
    let categories = if categories.is_empty() {
        UNCATEGORIZED_LABEL.to_string()
    } else {
        categories.join(", ")
    };
    format!(
        "[{}] {}\n    {journal} ({year}) | {categories} | added {} | translation: {}",
        paper.pmid,
        paper.title,
        paper.created_date,
        paper.translation_status()
    )
}

pub async fn run_papers_command(ctx: &AppContext, args: &PapersArgs) -> Result<()> {
    let store = ctx.open_store().await?;
    let papers = store.latest(args.limit).await?;
    if papers.is_empty() {
        println!("No papers stored yet.");
        return Ok(());
    }
    for paper in &papers {
        let categories = store.categories_for(paper.id).await?;
        println!("{}", render_paper_line(paper, &categories));
    }
    println!("Total papers in database: {}", store.count_papers().await?);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn paper() -> Paper {
        Paper {
            id: 1,
            pmid: "123".to_string(),
            title: "A study".to_string(),
            abstract_text: None,
            journal_name: None,
            journal_volume: None,
            journal_issue: None,
            publication_year: Some("2024".to_string()),
            created_date: "2024-05-01".to_string(),
            abstract_korean: None,
            translation_status_str: "pending".to_string(),
            translation_date: None,
            translator_notes: None,
        }
    }

    #[test]
    fn test_render_paper_line_uses_uncategorized_fallback() {
        let line = render_paper_line(&paper(), &[]);
        assert!(line.starts_with("[123] A study"));
        assert!(line.contains("Unknown journal (2024)"));
        assert!(line.contains("| Uncategorized |"));
        assert!(line.contains("translation: pending"));
    }

    #[test]
    fn test_render_paper_line_joins_categories() {
        let line = render_paper_line(&paper(), &["ai_ml".to_string(), "imaging".to_string()]);
        assert!(line.contains("| ai_ml, imaging |"));
    }
}
