//! Project Gutenberg catalog implementation.
//!
//! Gutenberg has no JSON search API, so result pages are scraped. Every
//! Gutenberg book is offered as plain text, EPUB and HTML, so those formats
//! are inferred rather than declared.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::models::{CandidateRecord, Query};
use crate::resolve::{FormatSpec, FormatTable};
use crate::search::SearchStrategy;
use crate::sources::{CatalogSource, PageRequest, SourceError};

/// Gutenberg always serves 25 results per search page
const GUTENBERG_PAGE_SIZE: usize = 25;

const INFERRED_FORMATS: &[&str] = &["txt", "epub", "html"];

const GUTENBERG_FORMATS: &[FormatSpec] = &[
    FormatSpec {
        tag: "txt",
        aliases: &["plain text"],
        patterns: &[
            "ebooks/{id}.txt.utf-8",
            "cache/epub/{id}/pg{id}.txt",
            "files/{id}/{id}-0.txt",
            "files/{id}/{id}.txt",
        ],
        auth_only: false,
    },
    FormatSpec {
        tag: "epub",
        aliases: &[],
        patterns: &[
            "ebooks/{id}.epub3.images",
            "ebooks/{id}.epub.images",
            "ebooks/{id}.epub.noimages",
            "cache/epub/{id}/pg{id}-images.epub",
        ],
        auth_only: false,
    },
    FormatSpec {
        tag: "html",
        aliases: &[],
        patterns: &["ebooks/{id}.html.images", "files/{id}/{id}-h/{id}-h.htm"],
        auth_only: false,
    },
];

/// Project Gutenberg source
#[derive(Debug, Clone)]
pub struct GutenbergSource {
    base_url: String,
    formats: FormatTable,
}

impl GutenbergSource {
    pub fn new(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let formats = FormatTable::new(base_url.clone(), GUTENBERG_FORMATS);

        Self { base_url, formats }
    }

    /// Build the free-text query understood by the Gutenberg search box
    fn build_search_query(query: &Query) -> String {
        let mut parts = Vec::new();

        if let Some(title) = query.title() {
            parts.push(title.to_string());
        }
        if let Some(author) = query.author() {
            parts.push(author.to_string());
        }
        if let Some(code) = language_filter(query.language()) {
            parts.push(format!("l.{}", code));
        }

        parts.join(" ")
    }

    fn sort_param(strategy: SearchStrategy) -> Option<&'static str> {
        match strategy {
            SearchStrategy::Relevance => None,
            SearchStrategy::Popularity => Some("downloads"),
            SearchStrategy::Recency => Some("release_date"),
            SearchStrategy::Random => Some("random"),
            SearchStrategy::Title => Some("title"),
        }
    }

    /// Parse a search results page into candidate records
    pub(crate) fn parse_page(html: &str, language: &str) -> Result<Vec<CandidateRecord>, SourceError> {
        let document = Html::parse_document(html);
        let booklink = Selector::parse("li.booklink")
            .map_err(|e| SourceError::Parse(format!("Invalid selector: {}", e)))?;

        Ok(document
            .select(&booklink)
            .filter_map(|entry| Self::parse_entry(&entry, language))
            .collect())
    }

    fn parse_entry(entry: &ElementRef, language: &str) -> Option<CandidateRecord> {
        let link_selector = Selector::parse("a.link").ok()?;
        let href = entry.select(&link_selector).next()?.value().attr("href")?;
        let identifier = href
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))?
            .to_string();

        let title = select_text(entry, "span.title").unwrap_or_else(|| identifier.clone());
        let downloads = select_text(entry, "span.extra")
            .and_then(|extra| {
                let digits: String = extra.chars().filter(|c| c.is_ascii_digit()).collect();
                digits.parse().ok()
            })
            .unwrap_or(0);

        let mut record = CandidateRecord::new(identifier, title)
            .formats(INFERRED_FORMATS.iter().copied())
            .downloads(downloads)
            .language(language);
        if let Some(author) = select_text(entry, "span.subtitle") {
            record = record.author(author);
        }

        Some(record)
    }
}

fn select_text(entry: &ElementRef, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    let text = entry
        .select(&selector)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();

    (!text.is_empty()).then_some(text)
}

/// Gutenberg filters languages by ISO 639-1 code
fn language_filter(language: &str) -> Option<&str> {
    match language {
        code if code.len() == 2 => Some(code),
        "eng" => Some("en"),
        "spa" => Some("es"),
        "fre" | "fra" => Some("fr"),
        "ger" | "deu" => Some("de"),
        "ita" => Some("it"),
        "por" => Some("pt"),
        "dut" | "nld" => Some("nl"),
        "fin" => Some("fi"),
        "lat" => Some("la"),
        _ => None,
    }
}

#[async_trait]
impl CatalogSource for GutenbergSource {
    fn id(&self) -> &str {
        "gutenberg"
    }

    fn name(&self) -> &str {
        "Project Gutenberg"
    }

    fn formats(&self) -> &FormatTable {
        &self.formats
    }

    async fn fetch_page(&self, request: PageRequest<'_>) -> Result<Vec<CandidateRecord>, SourceError> {
        let start_index = (request.page.max(1) - 1) * GUTENBERG_PAGE_SIZE + 1;
        let mut params: Vec<(&str, String)> = vec![
            ("query", Self::build_search_query(request.query)),
            ("start_index", start_index.to_string()),
        ];
        if let Some(sort) = Self::sort_param(request.strategy) {
            params.push(("sort_order", sort.to_string()));
        }

        let response = request
            .client
            .client()
            .get(format!("{}/ebooks/search/", self.base_url))
            .query(&params)
            .header("Accept", "text/html")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::from_status(response.status(), "Gutenberg search"));
        }

        let html = response.text().await?;
        Self::parse_page(&html, request.query.language())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryConfig;
    use crate::models::RawQuery;

    const RESULTS_PAGE: &str = r#"
    <html><body><ul class="results">
      <li class="booklink">
        <a class="link" href="/ebooks/1342" accesskey="1">
          <span class="cell content">
            <span class="title">Pride and Prejudice</span>
            <span class="subtitle">Jane Austen</span>
            <span class="extra">51,349 downloads</span>
          </span>
        </a>
      </li>
      <li class="booklink">
        <a class="link" href="/ebooks/158/">
          <span class="title">Emma</span>
        </a>
      </li>
      <li class="navlink"><a class="link" href="/ebooks/search/?start_index=26">Next</a></li>
      <li class="booklink"><a class="link" href="/ebooks/authors/a">Not a book</a></li>
    </ul></body></html>
    "#;

    #[test]
    fn test_parse_page() {
        let records = GutenbergSource::parse_page(RESULTS_PAGE, "eng").unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].identifier, "1342");
        assert_eq!(records[0].title, "Pride and Prejudice");
        assert_eq!(records[0].author.as_deref(), Some("Jane Austen"));
        assert_eq!(records[0].downloads, 51349);
        assert!(records[0].declared_formats.contains("epub"));

        assert_eq!(records[1].identifier, "158");
        assert_eq!(records[1].author, None);
        assert_eq!(records[1].downloads, 0);
    }

    #[test]
    fn test_parse_page_without_results() {
        let records = GutenbergSource::parse_page("<html><p>No results</p></html>", "eng").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_build_search_query() {
        let q = Query::normalize(
            &RawQuery::new("emma", 5).author("austen").language("eng"),
            &QueryConfig::default(),
        )
        .unwrap();
        assert_eq!(GutenbergSource::build_search_query(&q), "Emma Austen l.en");
    }

    #[test]
    fn test_unknown_language_has_no_filter() {
        assert_eq!(language_filter("xyz"), None);
        assert_eq!(language_filter("es"), Some("es"));
    }

    #[test]
    fn test_text_urls_follow_conventions() {
        let source = GutenbergSource::new("https://www.gutenberg.org");
        let record = CandidateRecord::new("158", "Emma").formats(["txt"]);
        let urls = source.formats().candidate_urls(
            &record.identifier,
            &record.declared_formats,
            &["txt".to_string()],
        );

        assert_eq!(urls[0].url, "https://www.gutenberg.org/ebooks/158.txt.utf-8");
        assert_eq!(urls[1].url, "https://www.gutenberg.org/cache/epub/158/pg158.txt");
        assert_eq!(urls.len(), 4);
    }
}
