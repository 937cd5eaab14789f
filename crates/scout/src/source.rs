//! Paper source adapter for the arXiv export API.
//!
//! This module wraps the catalog query behind the [`PaperSource`] trait:
//! given a category set and a half-open time window `[start, end)`, the
//! adapter produces a finite, deduplicated sequence of [`Paper`] records.
//!
//! The arXiv API returns Atom XML sorted by submission date descending, but
//! the adapter does not rely on that ordering: it pages through results and
//! only stops early once an entire page falls before the window start, so an
//! unordered upstream would still be handled correctly (at the cost of more
//! pages).
//!
//! Transport failures are retried a bounded number of times with exponential
//! backoff; once the policy is exhausted the call fails with
//! [`ScoutError::SourceUnavailable`], which the pipeline treats as fatal to
//! the run. "No new papers" and "could not reach the source" are never
//! conflated.

use std::collections::HashSet;

use quick_xml::{events::Event, Reader};

use super::*;

/// Endpoint of the arXiv export API.
const ARXIV_API: &str = "http://export.arxiv.org/api/query";
/// Entries requested per page.
const PAGE_SIZE: usize = 100;
/// Hard cap on pages fetched per call, keeping the sequence finite even for
/// pathological windows.
const MAX_PAGES: usize = 10;
/// Transport attempts per page before the source is declared unavailable.
const FETCH_ATTEMPTS: u32 = 3;
/// Base delay for the per-page retry backoff.
const FETCH_BACKOFF: Duration = Duration::from_millis(500);

/// Half-open time window `[start, end)` over publication timestamps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
  /// Inclusive lower bound
  pub start: DateTime<Utc>,
  /// Exclusive upper bound
  pub end:   DateTime<Utc>,
}

impl TimeWindow {
  /// Window covering the `days` days ending at `end`.
  pub fn lookback(end: DateTime<Utc>, days: i64) -> Self {
    Self { start: end - chrono::Duration::days(days), end }
  }

  /// Whether `instant` falls inside the window.
  pub fn contains(&self, instant: DateTime<Utc>) -> bool {
    self.start <= instant && instant < self.end
  }
}

/// Boundary trait for the external paper catalog.
///
/// The pipeline depends only on this trait; tests substitute an in-memory
/// implementation so no network is involved.
#[async_trait]
pub trait PaperSource: Send + Sync {
  /// Fetches papers for `categories` published inside `window`.
  ///
  /// Implementations must deduplicate by identifier within one call and must
  /// not assume any ordering of the upstream results. A failure here is
  /// terminal for the run.
  async fn fetch(&self, categories: &BTreeSet<String>, window: TimeWindow) -> Result<Vec<Paper>>;
}

/// [`PaperSource`] backed by the arXiv export API.
///
/// # Examples
///
/// ```no_run
/// use chrono::Utc;
/// use scout::source::{ArxivSource, PaperSource, TimeWindow};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let source = ArxivSource::new();
/// let categories = ["cs.AI".to_string()].into_iter().collect();
/// let window = TimeWindow::lookback(Utc::now(), 1);
/// let papers = source.fetch(&categories, window).await?;
/// println!("fetched {} papers", papers.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ArxivSource {
  /// Base URL of the export API
  base_url: String,
  /// Shared HTTP client
  client:   reqwest::Client,
}

impl Default for ArxivSource {
  fn default() -> Self { Self::new() }
}

impl ArxivSource {
  /// Creates an adapter against the public arXiv endpoint.
  pub fn new() -> Self { Self { base_url: ARXIV_API.to_string(), client: reqwest::Client::new() } }

  /// Creates an adapter against a custom endpoint (used by tests).
  pub fn with_base_url(base_url: impl Into<String>) -> Self {
    Self { base_url: base_url.into(), client: reqwest::Client::new() }
  }

  /// Fetches one page of results, retrying transport failures with backoff.
  async fn fetch_page(&self, query: &str, start: usize) -> Result<String> {
    let mut last_error = String::new();
    for attempt in 1..=FETCH_ATTEMPTS {
      let request = self.client.get(&self.base_url).query(&[
        ("search_query", query),
        ("start", &start.to_string()),
        ("max_results", &PAGE_SIZE.to_string()),
        ("sortBy", "submittedDate"),
        ("sortOrder", "descending"),
      ]);

      match request.send().await {
        Ok(response) if response.status().is_success() => return Ok(response.text().await?),
        Ok(response) => last_error = format!("catalog returned HTTP {}", response.status()),
        Err(e) => last_error = e.to_string(),
      }

      if attempt < FETCH_ATTEMPTS {
        let delay = FETCH_BACKOFF * 2u32.pow(attempt - 1);
        warn!("catalog fetch attempt {attempt} failed ({last_error}), retrying in {delay:?}");
        tokio::time::sleep(delay).await;
      }
    }
    Err(ScoutError::SourceUnavailable(last_error))
  }
}

#[async_trait]
impl PaperSource for ArxivSource {
  async fn fetch(&self, categories: &BTreeSet<String>, window: TimeWindow) -> Result<Vec<Paper>> {
    let query = category_query(categories);
    debug!("fetching papers with query: {query}");

    let mut seen = HashSet::new();
    let mut papers = Vec::new();

    for page in 0..MAX_PAGES {
      let body = self.fetch_page(&query, page * PAGE_SIZE).await?;
      trace!("arxiv page {page} response: {body}");
      let entries = parse_feed(&body)?;
      let count = entries.len();

      // A page whose entries all predate the window means deeper pages are
      // out of range too (submittedDate-descending order); an unordered feed
      // just costs extra pages until the count underrun below.
      let exhausted = count > 0 && entries.iter().all(|p| p.published < window.start);

      for paper in entries {
        if window.contains(paper.published) && seen.insert(paper.id.clone()) {
          papers.push(paper);
        }
      }

      if count < PAGE_SIZE || exhausted {
        break;
      }
    }

    info!("fetched {} papers in window", papers.len());
    Ok(papers)
  }
}

/// Builds the arXiv `search_query` expression from a category set.
fn category_query(categories: &BTreeSet<String>) -> String {
  if categories.is_empty() {
    // The API rejects empty queries; cs.AI is the conventional fallback.
    return "cat:cs.AI".to_string();
  }
  let clauses = categories.iter().map(|c| format!("cat:{c}")).collect::<Vec<_>>();
  format!("({})", clauses.join(" OR "))
}

/// Partially assembled feed entry.
#[derive(Default)]
struct EntryBuilder {
  /// Catalog identifier extracted from the entry id URL
  id:               Option<String>,
  /// Entry title text
  title:            Option<String>,
  /// Entry summary (abstract) text
  summary:          Option<String>,
  /// Author names in feed order
  authors:          Vec<String>,
  /// Category terms in feed order
  categories:       Vec<String>,
  /// Primary category term
  primary_category: Option<String>,
  /// Publication timestamp
  published:        Option<DateTime<Utc>>,
  /// Update timestamp
  updated:          Option<DateTime<Utc>>,
}

impl EntryBuilder {
  /// Finalizes the entry, or returns `None` when mandatory fields are
  /// missing. Incomplete entries are skipped with a warning rather than
  /// failing the whole feed.
  fn build(self) -> Option<Paper> {
    let id = self.id?;
    let published = self.published?;
    let primary_category =
      self.primary_category.or_else(|| self.categories.first().cloned()).unwrap_or_default();
    Some(
      Paper {
        abstract_url: format!("https://arxiv.org/abs/{id}"),
        pdf_url: format!("https://arxiv.org/pdf/{id}.pdf"),
        title: self.title.unwrap_or_default(),
        authors: self
          .authors
          .into_iter()
          .map(|name| Author { name, affiliation: None, email: None })
          .collect(),
        abstract_text: self.summary.unwrap_or_default(),
        categories: self.categories.into_iter().collect(),
        primary_category,
        published,
        updated: self.updated.unwrap_or(published),
        id,
      }
      .tidy(),
    )
  }
}

/// Parses an Atom feed document into paper records.
///
/// Works on local element names, so namespace prefixes (`arxiv:`) need no
/// special handling. Malformed XML is a source failure; individually
/// incomplete entries are skipped.
pub fn parse_feed(xml: &str) -> Result<Vec<Paper>> {
  let mut reader = Reader::from_str(xml);
  reader.config_mut().trim_text(true);

  let mut papers = Vec::new();
  let mut entry: Option<EntryBuilder> = None;
  let mut path: Vec<String> = Vec::new();

  loop {
    match reader.read_event() {
      Ok(Event::Start(e)) => {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        if name == "entry" {
          entry = Some(EntryBuilder::default());
        }
        path.push(name);
      },
      Ok(Event::Empty(e)) => {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        if let Some(builder) = entry.as_mut() {
          if name == "category" || name == "primary_category" {
            for attr in e.attributes().flatten() {
              if attr.key.as_ref() == b"term" {
                let term = String::from_utf8_lossy(&attr.value).into_owned();
                if name == "primary_category" {
                  builder.primary_category = Some(term);
                } else {
                  builder.categories.push(term);
                }
              }
            }
          }
        }
      },
      Ok(Event::Text(t)) => {
        let Some(builder) = entry.as_mut() else { continue };
        let text = t
          .unescape()
          .map_err(|e| ScoutError::SourceUnavailable(format!("malformed feed text: {e}")))?
          .into_owned();
        match path.last().map(String::as_str) {
          Some("id") => builder.id = text.rsplit('/').next().map(str::to_string),
          Some("title") => builder.title = Some(text),
          Some("summary") => builder.summary = Some(text),
          Some("name") if path.iter().any(|p| p == "author") => builder.authors.push(text),
          Some("published") => builder.published = parse_timestamp(&text),
          Some("updated") => builder.updated = parse_timestamp(&text),
          _ => {},
        }
      },
      Ok(Event::End(e)) => {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        if name == "entry" {
          match entry.take().and_then(EntryBuilder::build) {
            Some(paper) => papers.push(paper),
            None => warn!("skipping feed entry with missing mandatory fields"),
          }
        }
        path.pop();
      },
      Ok(Event::Eof) => break,
      Err(e) => return Err(ScoutError::SourceUnavailable(format!("malformed feed: {e}"))),
      _ => {},
    }
  }

  Ok(papers)
}

/// Parses an Atom RFC 3339 timestamp into UTC.
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
  use super::*;

  const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title>ArXiv Query Results</title>
  <entry>
    <id>http://arxiv.org/abs/2401.11111v1</id>
    <title>Scaling  Laws for
 Sparse Models</title>
    <summary>We study sparse scaling.</summary>
    <published>2024-01-20T10:00:00Z</published>
    <updated>2024-01-21T10:00:00Z</updated>
    <author><name>Alice Researcher</name></author>
    <author><name>Bob Scholar</name></author>
    <arxiv:primary_category term="cs.LG"/>
    <category term="cs.LG"/>
    <category term="cs.AI"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2401.22222v2</id>
    <title>Another Paper</title>
    <summary>Abstract text.</summary>
    <published>2024-01-10T08:30:00Z</published>
    <updated>2024-01-10T08:30:00Z</updated>
    <author><name>Carol Author</name></author>
    <category term="cs.CL"/>
  </entry>
</feed>"#;

  #[test]
  fn parses_entries_with_authors_and_categories() {
    let papers = parse_feed(FEED).unwrap();
    assert_eq!(papers.len(), 2);

    let first = &papers[0];
    assert_eq!(first.id, "2401.11111v1");
    assert_eq!(first.title, "Scaling Laws for Sparse Models");
    assert_eq!(first.authors.len(), 2);
    assert_eq!(first.authors[0].name, "Alice Researcher");
    assert_eq!(first.primary_category, "cs.LG");
    assert!(first.categories.contains("cs.AI"));
    assert_eq!(first.abstract_url, "https://arxiv.org/abs/2401.11111v1");
    assert_eq!(first.published, Utc.with_ymd_and_hms(2024, 1, 20, 10, 0, 0).unwrap());
  }

  #[test]
  fn entry_without_id_is_skipped() {
    let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
      <entry><title>No id</title><published>2024-01-20T10:00:00Z</published></entry>
    </feed>"#;
    assert!(parse_feed(xml).unwrap().is_empty());
  }

  #[test]
  fn malformed_xml_is_a_source_failure() {
    let result = parse_feed("<feed><entry><title>broken");
    assert!(matches!(result, Err(ScoutError::SourceUnavailable(_))));
  }

  #[test]
  fn category_query_joins_with_or() {
    let categories: BTreeSet<String> =
      ["cs.AI".to_string(), "cs.LG".to_string()].into_iter().collect();
    assert_eq!(category_query(&categories), "(cat:cs.AI OR cat:cs.LG)");
    assert_eq!(category_query(&BTreeSet::new()), "cat:cs.AI");
  }

  #[test]
  fn window_is_half_open() {
    let end = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let window = TimeWindow::lookback(end, 1);
    assert!(window.contains(window.start));
    assert!(!window.contains(end));
    assert!(window.contains(end - chrono::Duration::seconds(1)));
  }
}
