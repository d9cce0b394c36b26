//! Streaming parser for efetch `PubmedArticleSet` documents.
//!
//! The document is walked once with a `quick_xml` event reader while an
//! element-name stack tracks where each text node sits. Each `PubmedArticle`
//! is accumulated into a draft and either emitted as an [`ArticleRecord`] or
//! skipped with a warning; one bad article never discards the batch.

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, instrument, warn};

use super::error::ParseError;

const ROOT: &str = "PubmedArticleSet";
const ARTICLE: &str = "PubmedArticle";

/// Journal metadata; each field is empty when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalInfo {
    pub name: String,
    pub volume: String,
    pub issue: String,
    pub year: String,
}

/// One parsed article.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleRecord {
    /// PubMed identifier, never empty.
    pub pmid: String,
    /// Article title with inline markup flattened; empty when missing.
    pub title: String,
    /// `"ForeName LastName"` for authors that carry both parts.
    pub authors: Vec<String>,
    /// Abstract segments joined with a single space.
    pub abstract_text: String,
    pub journal: JournalInfo,
}

/// Parses a batch efetch document.
///
/// # Errors
///
/// Returns [`ParseError`] only when the document as a whole is unreadable.
/// Articles missing a PMID or containing undecodable text are logged and skipped.
#[instrument(skip(xml), fields(xml_size = xml.len()))]
pub fn parse_article_set(xml: &str) -> Result<Vec<ArticleRecord>, ParseError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut draft: Option<ArticleDraft> = None;
    let mut saw_root = false;
    let mut records = Vec::new();
    let mut skipped = 0_usize;

    loop {
        let event = reader.read_event().map_err(|err| {
            ParseError::Malformed(format!("{err} at byte {}", reader.buffer_position()))
        })?;

        match event {
            Event::Start(start) => {
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                if name == ROOT {
                    saw_root = true;
                }
                if name == ARTICLE && stack.last().is_some_and(|parent| parent == ROOT) {
                    draft = Some(ArticleDraft::default());
                }
                if let Some(article) = draft.as_mut() {
                    article.open(&name);
                }
                stack.push(name);
            }
            Event::End(_) => {
                let Some(name) = stack.pop() else {
                    return Err(ParseError::Malformed("unbalanced closing tag".to_string()));
                };
                if let Some(article) = draft.as_mut() {
                    article.close(&stack, &name);
                }
                if name == ARTICLE
                    && let Some(article) = draft.take()
                {
                    match article.finish() {
                        Ok(record) => records.push(record),
                        Err(reason) => {
                            skipped += 1;
                            warn!(reason = %reason, "Skipping unparseable article");
                        }
                    }
                }
            }
            Event::Text(text) => match draft.as_mut() {
                Some(article) => match text.unescape() {
                    Ok(value) => article.push_text(&stack, &value),
                    Err(err) => article.fail(format!("undecodable text: {err}")),
                },
                None => {
                    if stack.is_empty() && !text.iter().all(u8::is_ascii_whitespace) {
                        return Err(ParseError::Malformed(
                            "text outside the root element".to_string(),
                        ));
                    }
                }
            },
            Event::CData(data) => {
                if let Some(article) = draft.as_mut() {
                    let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    article.push_text(&stack, &value);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(ParseError::Malformed(format!(
            "document ended inside <{}>",
            stack.join("/")
        )));
    }
    if !saw_root {
        return Err(ParseError::MissingRoot);
    }

    debug!(parsed = records.len(), skipped, "Parsed article set");
    Ok(records)
}

#[derive(Debug, Default)]
struct ArticleDraft {
    pmid: String,
    pmid_closed: bool,
    title: String,
    title_closed: bool,
    authors: Vec<String>,
    last_name: String,
    fore_name: String,
    abstract_segments: Vec<String>,
    segment: String,
    journal: JournalInfo,
    journal_closed: bool,
    failure: Option<String>,
}

impl ArticleDraft {
    fn open(&mut self, name: &str) {
        match name {
            "Author" => {
                self.last_name.clear();
                self.fore_name.clear();
            }
            "AbstractText" => self.segment.clear(),
            _ => {}
        }
    }

    fn close(&mut self, parents: &[String], name: &str) {
        let parent = parents.last().map(String::as_str);
        match (name, parent) {
            ("PMID", Some("MedlineCitation")) => self.pmid_closed = true,
            ("ArticleTitle", _) => self.title_closed = true,
            ("AbstractText", Some("Abstract")) => {
                let segment = self.segment.trim();
                if !segment.is_empty() {
                    self.abstract_segments.push(segment.to_string());
                }
                self.segment.clear();
            }
            ("Author", _) => {
                let last = self.last_name.trim();
                let fore = self.fore_name.trim();
                if !last.is_empty() && !fore.is_empty() {
                    self.authors.push(format!("{fore} {last}"));
                }
            }
            ("Journal", _) => self.journal_closed = true,
            _ => {}
        }
    }

    fn push_text(&mut self, stack: &[String], text: &str) {
        if let Some(target) = self.target(stack) {
            target.push_str(text);
        }
    }

    fn target(&mut self, stack: &[String]) -> Option<&mut String> {
        let (last, parents) = stack.split_last()?;
        let parent = parents.last().map(String::as_str);

        if !self.pmid_closed && last == "PMID" && parent == Some("MedlineCitation") {
            return Some(&mut self.pmid);
        }
        if !self.title_closed && contains(stack, "ArticleTitle") {
            return Some(&mut self.title);
        }
        if stack
            .windows(2)
            .any(|pair| pair[0] == "Abstract" && pair[1] == "AbstractText")
        {
            return Some(&mut self.segment);
        }
        if parent == Some("Author") {
            return match last.as_str() {
                "LastName" => Some(&mut self.last_name),
                "ForeName" => Some(&mut self.fore_name),
                _ => None,
            };
        }
        if !self.journal_closed && contains(stack, "Journal") {
            return match (last.as_str(), parent) {
                ("Title", Some("Journal")) => Some(&mut self.journal.name),
                ("Volume", Some("JournalIssue")) => Some(&mut self.journal.volume),
                ("Issue", Some("JournalIssue")) => Some(&mut self.journal.issue),
                ("Year", Some("PubDate")) => Some(&mut self.journal.year),
                _ => None,
            };
        }
        None
    }

    fn fail(&mut self, reason: String) {
        if self.failure.is_none() {
            self.failure = Some(reason);
        }
    }

    fn finish(self) -> Result<ArticleRecord, String> {
        let pmid = self.pmid.trim().to_string();
        if let Some(reason) = self.failure {
            let label = if pmid.is_empty() { "<unknown>" } else { pmid.as_str() };
            return Err(format!("PMID {label}: {reason}"));
        }
        if pmid.is_empty() {
            return Err("article has no PMID".to_string());
        }

        Ok(ArticleRecord {
            pmid,
            title: self.title.trim().to_string(),
            authors: self.authors,
            abstract_text: self.abstract_segments.join(" "),
            journal: JournalInfo {
                name: self.journal.name.trim().to_string(),
                volume: self.journal.volume.trim().to_string(),
                issue: self.journal.issue.trim().to_string(),
                year: self.journal.year.trim().to_string(),
            },
        })
    }
}

fn contains(stack: &[String], name: &str) -> bool {
    stack.iter().any(|entry| entry == name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn article(pmid: &str, body: &str) -> String {
        format!(
            "<PubmedArticle><MedlineCitation><PMID Version=\"1\">{pmid}</PMID><Article>{body}</Article></MedlineCitation></PubmedArticle>"
        )
    }

    fn set(articles: &[String]) -> String {
        format!(
            "<?xml version=\"1.0\" ?>\n<PubmedArticleSet>\n{}\n</PubmedArticleSet>",
            articles.join("\n")
        )
    }

    #[test]
    fn test_parse_two_articles_joins_abstract_segments() {
        let xml = set(&[
            article("111", "<ArticleTitle>No abstract here</ArticleTitle>"),
            article(
                "222",
                "<ArticleTitle>Two segments</ArticleTitle>\
                 <Abstract><AbstractText Label=\"BACKGROUND\">Background.</AbstractText>\
                 <AbstractText Label=\"METHODS\">  Methods are X. </AbstractText></Abstract>",
            ),
        ]);

        let records = parse_article_set(&xml).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].pmid, "111");
        assert_eq!(records[0].abstract_text, "");
        assert_eq!(records[1].abstract_text, "Background. Methods are X.");
    }

    #[test]
    fn test_parse_full_article_fields() {
        let xml = set(&[article(
            "31452104",
            "<Journal><ISSN>1234-5678</ISSN><JournalIssue><Volume>12</Volume><Issue>3</Issue>\
             <PubDate><Year>2024</Year><Month>Jan</Month></PubDate></JournalIssue>\
             <Title>Journal of Memory</Title></Journal>\
             <ArticleTitle>Effects of <i>APOE</i> &amp; sleep on MCI</ArticleTitle>\
             <AuthorList><Author><LastName>Kim</LastName><ForeName>Min-ji</ForeName></Author>\
             <Author><LastName>Solo</LastName></Author>\
             <Author><CollectiveName>Study Group</CollectiveName></Author>\
             <Author><LastName>Lee</LastName><ForeName>Jun</ForeName></Author></AuthorList>",
        )]);

        let records = parse_article_set(&xml).unwrap();
        let record = &records[0];
        assert_eq!(record.pmid, "31452104");
        assert_eq!(record.title, "Effects of APOE & sleep on MCI");
        assert_eq!(record.authors, vec!["Min-ji Kim", "Jun Lee"]);
        assert_eq!(
            record.journal,
            JournalInfo {
                name: "Journal of Memory".to_string(),
                volume: "12".to_string(),
                issue: "3".to_string(),
                year: "2024".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_missing_journal_fields_are_empty() {
        let xml = set(&[article("5", "<Journal><Title>Only Name</Title></Journal><ArticleTitle>T</ArticleTitle>")]);
        let record = &parse_article_set(&xml).unwrap()[0];
        assert_eq!(record.journal.name, "Only Name");
        assert_eq!(record.journal.volume, "");
        assert_eq!(record.journal.issue, "");
        assert_eq!(record.journal.year, "");
    }

    #[test]
    fn test_parse_skips_article_without_pmid() {
        let xml = set(&[
            "<PubmedArticle><MedlineCitation><Article><ArticleTitle>Orphan</ArticleTitle></Article></MedlineCitation></PubmedArticle>".to_string(),
            article("7", "<ArticleTitle>Kept</ArticleTitle>"),
        ]);
        let records = parse_article_set(&xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pmid, "7");
    }

    #[test]
    fn test_parse_skips_article_with_bad_entity_only() {
        let xml = set(&[
            article("8", "<ArticleTitle>Broken &notanentity; title</ArticleTitle>"),
            article("9", "<ArticleTitle>Fine</ArticleTitle>"),
        ]);
        let records = parse_article_set(&xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pmid, "9");
    }

    #[test]
    fn test_parse_ignores_cited_pmids_and_other_abstracts() {
        let xml = set(&[String::from(
            "<PubmedArticle><MedlineCitation><PMID>10</PMID><Article><ArticleTitle>T</ArticleTitle>\
             <Abstract><AbstractText>Main.</AbstractText></Abstract></Article>\
             <OtherAbstract><AbstractText>Other language.</AbstractText></OtherAbstract>\
             <CommentsCorrectionsList><CommentsCorrections><PMID>99</PMID></CommentsCorrections></CommentsCorrectionsList>\
             </MedlineCitation></PubmedArticle>",
        )]);
        let record = &parse_article_set(&xml).unwrap()[0];
        assert_eq!(record.pmid, "10");
        assert_eq!(record.abstract_text, "Main.");
    }

    #[test]
    fn test_parse_empty_set_returns_no_records() {
        let records = parse_article_set("<PubmedArticleSet></PubmedArticleSet>").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_malformed_document_fails_whole_batch() {
        let result = parse_article_set("<PubmedArticleSet><PubmedArticle></Wrong></PubmedArticleSet>");
        assert!(matches!(result, Err(ParseError::Malformed(_))));
    }

    #[test]
    fn test_parse_truncated_document_fails() {
        let result = parse_article_set("<PubmedArticleSet><PubmedArticle><MedlineCitation>");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_plain_text_is_rejected() {
        assert!(parse_article_set("Service unavailable").is_err());
    }

    #[test]
    fn test_parse_other_root_is_rejected() {
        assert_eq!(
            parse_article_set("<eFetchResult><ERROR>bad id</ERROR></eFetchResult>"),
            Err(ParseError::MissingRoot)
        );
    }
}
