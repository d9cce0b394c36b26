//! Category trend analysis and markdown rendering.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};
use thiserror::Error;
use tracing::{info, instrument};

use crate::store::{Paper, PaperStore, StoreError};

/// Default analysis window.
pub const DEFAULT_TREND_MONTHS: u32 = 12;

/// Papers listed in a blog post.
pub const BLOG_LATEST_PAPERS: u32 = 10;

/// Errors from building or writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to write report '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Paper counts of one category over the analysis window.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTrend {
    pub category: String,
    /// `(YYYY-MM, papers)` for every month in the window, zero-filled.
    pub monthly: Vec<(String, i64)>,
    pub total: i64,
    /// Mean papers per month across the months in the window.
    pub average_per_month: f64,
}

/// Aggregates papers per month and category ingested in the last `months * 30` days.
///
/// Categories come back alphabetical. Months with no papers in any category
/// are not part of the window.
///
/// # Errors
///
/// Returns [`StoreError`] if the aggregate query fails.
#[instrument(skip(store))]
pub async fn analyze_category_trends(
    store: &PaperStore,
    months: u32,
    today: NaiveDate,
) -> Result<Vec<CategoryTrend>, StoreError> {
    let since = today - Duration::days(i64::from(months) * 30);
    let rows = store.monthly_category_counts(since).await?;

    let all_months: BTreeSet<String> = rows.iter().map(|row| row.month.clone()).collect();
    let mut by_category: BTreeMap<String, BTreeMap<String, i64>> = BTreeMap::new();
    for row in rows {
        by_category
            .entry(row.category)
            .or_default()
            .insert(row.month, row.papers);
    }

    let trends = by_category
        .into_iter()
        .map(|(category, counts)| {
            let monthly: Vec<(String, i64)> = all_months
                .iter()
                .map(|month| (month.clone(), counts.get(month).copied().unwrap_or(0)))
                .collect();
            let total: i64 = monthly.iter().map(|(_, papers)| papers).sum();
            #[allow(clippy::cast_precision_loss)]
            let average_per_month = if monthly.is_empty() {
                0.0
            } else {
                total as f64 / monthly.len() as f64
            };
            CategoryTrend {
                category,
                monthly,
                total,
                average_per_month,
            }
        })
        .collect::<Vec<_>>();

    info!(months, categories = trends.len(), "Analyzed category trends");
    Ok(trends)
}

/// Renders the markdown trend report.
#[must_use]
pub fn render_trend_report(trends: &[CategoryTrend], generated_on: NaiveDate) -> String {
    let mut lines = vec![
        "# Literature Trend Report".to_string(),
        format!("Generated on: {}", generated_on.format("%Y-%m-%d")),
        String::new(),
        "## Category Trends".to_string(),
    ];
    for trend in trends {
        lines.push(String::new());
        lines.push(format!("### {}", trend.category));
        lines.push(format!("- Total papers: {}", trend.total));
        lines.push(format!(
            "- Average papers per month: {:.1}",
            trend.average_per_month
        ));
    }
    lines.join("\n") + "\n"
}

/// Wraps a trend report in Hugo front matter and lists the latest papers.
#[must_use]
pub fn render_blog_post(
    trend_report: &str,
    date: NaiveDate,
    categories: &[String],
    latest: &[Paper],
) -> String {
    let day = date.format("%Y-%m-%d");
    let mut out = [
        "---".to_string(),
        format!("title: \"Literature Trend Report ({day})\""),
        format!("date: {day}"),
        format!("categories: [{}]", categories.join(", ")),
        "tags: [Research, Trends]".to_string(),
        "draft: false".to_string(),
        "---".to_string(),
        String::new(),
        String::new(),
    ]
    .join("\n");
    out.push_str(trend_report);

    if !latest.is_empty() {
        out.push_str("\n## Latest Papers\n\n");
        for paper in latest {
            let journal = paper.journal_name.as_deref().unwrap_or("Unknown journal");
            out.push_str(&format!(
                "- [{}](https://pubmed.ncbi.nlm.nih.gov/{}/) ({journal})\n",
                paper.title, paper.pmid
            ));
        }
    }
    out
}

/// Writes `trend_report_YYYYMMDD.md` into `output_dir` and returns its path.
///
/// # Errors
///
/// Returns [`ReportError`] if the analysis or the write fails.
pub async fn write_trend_report(
    store: &PaperStore,
    output_dir: &Path,
    months: u32,
    today: NaiveDate,
) -> Result<PathBuf, ReportError> {
    let trends = analyze_category_trends(store, months, today).await?;
    let report = render_trend_report(&trends, today);
    let path = output_dir.join(format!("trend_report_{}.md", today.format("%Y%m%d")));
    write_file(&path, &report)?;
    info!(path = %path.display(), "Trend report saved");
    Ok(path)
}

/// Writes `posts/detailed-report-YYYYMMDD.md` into `output_dir` and returns its path.
///
/// # Errors
///
/// Returns [`ReportError`] if a query or the write fails.
pub async fn write_blog_post(
    store: &PaperStore,
    output_dir: &Path,
    months: u32,
    today: NaiveDate,
) -> Result<PathBuf, ReportError> {
    let trends = analyze_category_trends(store, months, today).await?;
    let report = render_trend_report(&trends, today);
    let categories = store.get_all_category_names().await?;
    let latest = store.latest(BLOG_LATEST_PAPERS).await?;
    let post = render_blog_post(&report, today, &categories, &latest);

    let path = output_dir
        .join("posts")
        .join(format!("detailed-report-{}.md", today.format("%Y%m%d")));
    write_file(&path, &post)?;
    info!(path = %path.display(), "Blog post saved");
    Ok(path)
}

fn write_file(path: &Path, contents: &str) -> Result<(), ReportError> {
    let io_err = |source| ReportError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, contents).map_err(io_err)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::Database;
    use crate::pubmed::ArticleRecord;
    use crate::topics::{Categorizer, RuleTable};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn seeded_store() -> PaperStore {
        let db = Database::new_in_memory().await.unwrap();
        let rules = RuleTable::from_pairs([
            ("imaging", vec!["mri"]),
            ("biomarkers", vec!["biomarker"]),
        ])
        .unwrap();
        let store = PaperStore::new(db, Arc::new(Categorizer::new(rules)));
        for (pmid, title, created) in [
            ("1", "MRI one", "2024-01-10"),
            ("2", "MRI two", "2024-01-20"),
            ("3", "Biomarker study", "2024-02-05"),
            ("4", "MRI old", "2022-01-01"),
        ] {
            store
                .add(&ArticleRecord {
                    pmid: pmid.to_string(),
                    title: title.to_string(),
                    ..ArticleRecord::default()
                })
                .await
                .unwrap();
            sqlx::query("UPDATE papers SET created_date = ? WHERE pmid = ?")
                .bind(created)
                .bind(pmid)
                .execute(store.database().pool())
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_analyze_category_trends_zero_fills_months() {
        let store = seeded_store().await;
        let trends = analyze_category_trends(&store, 3, date(2024, 2, 28))
            .await
            .unwrap();

        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].category, "biomarkers");
        assert_eq!(
            trends[0].monthly,
            vec![("2024-01".to_string(), 0), ("2024-02".to_string(), 1)]
        );
        assert_eq!(trends[1].category, "imaging");
        assert_eq!(trends[1].total, 2);
        assert!((trends[1].average_per_month - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_render_trend_report_format() {
        let trends = vec![CategoryTrend {
            category: "imaging".to_string(),
            monthly: vec![("2024-01".to_string(), 2), ("2024-02".to_string(), 1)],
            total: 3,
            average_per_month: 1.5,
        }];
        let report = render_trend_report(&trends, date(2024, 3, 1));
        assert_eq!(
            report,
            "# Literature Trend Report\nGenerated on: 2024-03-01\n\n## Category Trends\n\n\
             ### imaging\n- Total papers: 3\n- Average papers per month: 1.5\n"
        );
    }

    #[tokio::test]
    async fn test_blog_post_has_front_matter_and_papers() {
        let store = seeded_store().await;
        let latest = store.latest(2).await.unwrap();
        let post = render_blog_post(
            "# Literature Trend Report\n",
            date(2024, 3, 1),
            &["imaging".to_string()],
            &latest,
        );
        assert!(post.starts_with("---\ntitle: \"Literature Trend Report (2024-03-01)\""));
        assert!(post.contains("categories: [imaging]"));
        assert!(post.contains("draft: false"));
        assert!(post.contains("https://pubmed.ncbi.nlm.nih.gov/3/"));
    }

    #[test]
    fn test_render_blog_post_exact_layout() {
        let paper = Paper {
            id: 1,
            pmid: "42".to_string(),
            title: "MRI one".to_string(),
            abstract_text: None,
            journal_name: None,
            journal_volume: None,
            journal_issue: None,
            publication_year: None,
            created_date: "2024-01-10".to_string(),
            abstract_korean: None,
            translation_status_str: "pending".to_string(),
            translation_date: None,
            translator_notes: None,
        };
        let post = render_blog_post(
            "# Literature Trend Report\n",
            date(2024, 3, 1),
            &["imaging".to_string(), "biomarkers".to_string()],
            &[paper],
        );
        assert_eq!(
            post,
            "---\ntitle: \"Literature Trend Report (2024-03-01)\"\ndate: 2024-03-01\n\
             categories: [imaging, biomarkers]\ntags: [Research, Trends]\ndraft: false\n---\n\n\
             # Literature Trend Report\n\n## Latest Papers\n\n\
             - [MRI one](https://pubmed.ncbi.nlm.nih.gov/42/) (Unknown journal)\n"
        );

        let empty = render_blog_post("body\n", date(2024, 3, 1), &[], &[]);
        assert!(empty.ends_with("draft: false\n---\n\nbody\n"));
    }

    #[tokio::test]
    async fn test_write_trend_report_creates_dated_file() {
        let store = seeded_store().await;
        let dir = tempfile::tempdir().unwrap();
        let path = write_trend_report(&store, &dir.path().join("output"), 12, date(2024, 2, 28))
            .await
            .unwrap();
        assert!(path.ends_with("trend_report_20240228.md"));
        let contents = fs::read_to_string(path).unwrap();
        assert!(contents.contains("### imaging"));

        let post = write_blog_post(&store, dir.path(), 12, date(2024, 2, 28))
            .await
            .unwrap();
        assert!(post.ends_with("posts/detailed-report-20240228.md"));
    }
}
