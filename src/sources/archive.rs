//! Internet Archive catalog implementation.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::auth::AuthEndpoints;
use crate::models::{CandidateRecord, Query};
use crate::resolve::{FormatSpec, FormatTable};
use crate::search::SearchStrategy;
use crate::sources::{CatalogSource, PageRequest, SourceError};

/// Fields requested from the advanced search API
const SEARCH_FIELDS: &[&str] = &[
    "identifier",
    "title",
    "creator",
    "downloads",
    "format",
    "language",
    "year",
];

/// Known filename conventions under `/download/{id}/`
const ARCHIVE_FORMATS: &[FormatSpec] = &[
    FormatSpec {
        tag: "txt",
        aliases: &["djvutxt", "full text", "text"],
        patterns: &["{id}/{id}_text.txt", "{id}/{id}.txt", "{id}/{id}_djvu.txt"],
        auth_only: false,
    },
    FormatSpec {
        tag: "pdf",
        aliases: &["text pdf", "additional text pdf", "image container pdf"],
        patterns: &["{id}/{id}.pdf", "{id}/{id}_text.pdf"],
        auth_only: false,
    },
    FormatSpec {
        tag: "epub",
        aliases: &[],
        patterns: &["{id}/{id}.epub"],
        auth_only: false,
    },
    FormatSpec {
        tag: "djvu",
        aliases: &[],
        patterns: &["{id}/{id}.djvu", "{id}/{id}_text.djvu"],
        auth_only: false,
    },
    FormatSpec {
        tag: "lcp pdf",
        aliases: &["lcp encrypted pdf"],
        patterns: &["{id}/{id}_lcp.pdf"],
        auth_only: true,
    },
    FormatSpec {
        tag: "lcp epub",
        aliases: &["lcp encrypted epub"],
        patterns: &["{id}/{id}_lcp.epub"],
        auth_only: true,
    },
];

/// Internet Archive source
///
/// Searches `mediatype:texts` items through `advancedsearch.php`.
#[derive(Debug, Clone)]
pub struct ArchiveSource {
    base_url: String,
    formats: FormatTable,
}

impl ArchiveSource {
    pub fn new(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let formats = FormatTable::new(format!("{}/download", base_url), ARCHIVE_FORMATS)
            .with_fallback("{id}/{id}.{ext}");

        Self { base_url, formats }
    }

    /// Build the Lucene-style query string
    fn build_search_query(query: &Query) -> String {
        let mut parts = vec!["mediatype:texts".to_string()];

        if let Some(title) = query.title() {
            parts.push(format!("title:\"{}\"", title.replace('"', "")));
        }

        parts.push(format!("language:{}", query.language()));

        if let Some(author) = query.author() {
            parts.push(format!("creator:\"{}\"", author.replace('"', "")));
        }

        parts.join(" AND ")
    }

    fn sort_param(strategy: SearchStrategy) -> Option<&'static str> {
        match strategy {
            SearchStrategy::Relevance | SearchStrategy::Random => None,
            SearchStrategy::Popularity => Some("downloads desc"),
            SearchStrategy::Recency => Some("publicdate desc"),
            SearchStrategy::Title => Some("titleSorter asc"),
        }
    }

    /// Parse an advanced search JSON body into candidate records
    pub(crate) fn parse_page(body: &str) -> Result<Vec<CandidateRecord>, SourceError> {
        let data: SearchResponse = serde_json::from_str(body)?;

        if let Some(error) = data.error {
            return Err(SourceError::Api(format!("Archive search error: {}", error)));
        }

        let docs = data
            .response
            .ok_or_else(|| SourceError::Parse("Missing 'response' object".to_string()))?
            .docs;

        Ok(docs.into_iter().filter_map(Self::parse_doc).collect())
    }

    fn parse_doc(doc: ArchiveDoc) -> Option<CandidateRecord> {
        let identifier = doc.identifier.filter(|id| !id.trim().is_empty())?;
        let title = text_values(doc.title.as_ref())
            .into_iter()
            .next()
            .unwrap_or_else(|| identifier.clone());

        let mut record = CandidateRecord::new(identifier, title)
            .author(text_values(doc.creator.as_ref()).join("; "))
            .formats(text_values(doc.format.as_ref()))
            .downloads(doc.downloads.as_ref().and_then(number_value).unwrap_or(0));

        if let Some(year) = doc.year.as_ref().and_then(year_value) {
            record = record.year(year);
        }
        if let Some(language) = text_values(doc.language.as_ref()).into_iter().next() {
            record = record.language(language);
        }

        Some(record)
    }
}

#[async_trait]
impl CatalogSource for ArchiveSource {
    fn id(&self) -> &str {
        "archive"
    }

    fn name(&self) -> &str {
        "Internet Archive"
    }

    fn supports(&self, strategy: SearchStrategy) -> bool {
        strategy != SearchStrategy::Random
    }

    fn formats(&self) -> &FormatTable {
        &self.formats
    }

    fn auth_endpoints(&self) -> Option<AuthEndpoints> {
        Some(AuthEndpoints {
            login_url: format!("{}/account/login", self.base_url),
            logout_url: Some(format!("{}/account/logout", self.base_url)),
        })
    }

    async fn fetch_page(&self, request: PageRequest<'_>) -> Result<Vec<CandidateRecord>, SourceError> {
        let mut params: Vec<(&str, String)> = vec![
            ("q", Self::build_search_query(request.query)),
            ("rows", request.page_size.to_string()),
            ("page", request.page.to_string()),
            ("output", "json".to_string()),
        ];
        params.extend(SEARCH_FIELDS.iter().map(|f| ("fl[]", f.to_string())));
        if let Some(sort) = Self::sort_param(request.strategy) {
            params.push(("sort[]", sort.to_string()));
        }

        let response = request
            .client
            .client()
            .get(format!("{}/advancedsearch.php", self.base_url))
            .query(&params)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::from_status(response.status(), "Archive search"));
        }

        let body = response.text().await?;
        Self::parse_page(&body)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    response: Option<ResponseBody>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    #[serde(default)]
    docs: Vec<ArchiveDoc>,
}

/// Advanced search documents are loosely typed: most fields may be a string,
/// a number, or a list of either.
#[derive(Debug, Deserialize)]
struct ArchiveDoc {
    identifier: Option<String>,
    title: Option<Value>,
    creator: Option<Value>,
    downloads: Option<Value>,
    format: Option<Value>,
    language: Option<Value>,
    year: Option<Value>,
}

fn text_values(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.trim().to_string()],
        Some(Value::Number(n)) => vec![n.to_string()],
        Some(Value::Array(items)) => items
            .iter()
            .flat_map(|item| text_values(Some(item)))
            .collect(),
        _ => Vec::new(),
    }
    .into_iter()
    .filter(|s| !s.is_empty())
    .collect()
}

fn number_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn year_value(value: &Value) -> Option<i32> {
    let text = text_values(Some(value)).into_iter().next()?;
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).take(4).collect();
    if digits.len() == 4 {
        digits.parse().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryConfig;
    use crate::models::RawQuery;
    use crate::utils::HttpClient;

    fn query(raw: RawQuery) -> Query {
        Query::normalize(&raw, &QueryConfig::default()).unwrap()
    }

    #[test]
    fn test_build_search_query() {
        let q = query(RawQuery::new("la regenta", 5).author("Clarín"));
        let search = ArchiveSource::build_search_query(&q);

        assert_eq!(
            search,
            "mediatype:texts AND title:\"La Regenta\" AND language:spa AND creator:\"Clarín\""
        );
    }

    #[test]
    fn test_build_search_query_strips_quotes() {
        let q = query(RawQuery::new("don \"quijote\"", 5));
        let search = ArchiveSource::build_search_query(&q);
        assert!(search.contains("title:\"Don quijote\""));
    }

    #[test]
    fn test_build_search_query_without_author() {
        let q = query(RawQuery::new("niebla", 5).language("eng"));
        let search = ArchiveSource::build_search_query(&q);
        assert!(!search.contains("creator"));
        assert!(search.contains("language:eng"));
    }

    #[test]
    fn test_parse_page_handles_loose_fields() {
        let body = r#"{
            "responseHeader": {"status": 0},
            "response": {"numFound": 3, "start": 0, "docs": [
                {"identifier": "laregenta01alas", "title": "La Regenta",
                 "creator": ["Alas, Leopoldo", "Clarín"], "downloads": 1520,
                 "format": ["DjVuTXT", "Text PDF", "Metadata"], "language": "spa", "year": "1884"},
                {"identifier": "niebla00unam", "title": "Niebla", "creator": "Unamuno",
                 "downloads": "77", "format": "EPUB", "year": 1914},
                {"title": "No identifier here"}
            ]}
        }"#;

        let records = ArchiveSource::parse_page(body).unwrap();
        assert_eq!(records.len(), 2);

        let regenta = &records[0];
        assert_eq!(regenta.identifier, "laregenta01alas");
        assert_eq!(regenta.author.as_deref(), Some("Alas, Leopoldo; Clarín"));
        assert_eq!(regenta.downloads, 1520);
        assert_eq!(regenta.year, Some(1884));
        assert!(regenta.declared_formats.contains("Text PDF"));
        assert_eq!(regenta.language.as_deref(), Some("spa"));

        let niebla = &records[1];
        assert_eq!(niebla.downloads, 77);
        assert_eq!(niebla.year, Some(1914));
        assert!(niebla.declared_formats.contains("EPUB"));
    }

    #[test]
    fn test_parse_page_empty_docs() {
        let body = r#"{"response": {"numFound": 0, "start": 0, "docs": []}}"#;
        assert!(ArchiveSource::parse_page(body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_page_errors() {
        assert!(matches!(
            ArchiveSource::parse_page("<html>oops</html>"),
            Err(SourceError::Parse(_))
        ));
        assert!(matches!(
            ArchiveSource::parse_page(r#"{"error": "bad query"}"#),
            Err(SourceError::Api(_))
        ));
    }

    #[test]
    fn test_random_strategy_is_unsupported() {
        let source = ArchiveSource::new("https://archive.org/");
        assert!(!source.supports(SearchStrategy::Random));
        assert!(source.supports(SearchStrategy::Popularity));
        assert_eq!(source.formats().base_url(), "https://archive.org/download");
    }

    #[tokio::test]
    async fn test_fetch_page_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/advancedsearch.php")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("page".into(), "2".into()),
                mockito::Matcher::UrlEncoded("rows".into(), "10".into()),
                mockito::Matcher::UrlEncoded("sort[]".into(), "downloads desc".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"response": {"docs": [{"identifier": "x1", "format": "PDF"}]}}"#)
            .create_async()
            .await;

        let source = ArchiveSource::new(&server.url());
        let client = HttpClient::new().unwrap();
        let q = query(RawQuery::new("emma", 5));
        let records = source
            .fetch_page(PageRequest {
                client: &client,
                query: &q,
                strategy: SearchStrategy::Popularity,
                page: 2,
                page_size: 10,
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "x1");
    }

    #[tokio::test]
    async fn test_fetch_page_maps_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/advancedsearch.php")
            .match_query(mockito::Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let source = ArchiveSource::new(&server.url());
        let client = HttpClient::new().unwrap();
        let q = query(RawQuery::new("emma", 5));
        let result = source
            .fetch_page(PageRequest {
                client: &client,
                query: &q,
                strategy: SearchStrategy::Relevance,
                page: 1,
                page_size: 10,
            })
            .await;

        assert!(matches!(result, Err(SourceError::Server(_))));
    }
}
