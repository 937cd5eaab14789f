//! Core paper metadata types.
//!
//! This module provides the immutable record describing one paper as fetched
//! from the catalog. Records are constructed by the source adapter and never
//! mutated afterwards; everything the later pipeline stages add lives in the
//! wrapper types of [`crate::digest`].
//!
//! # Examples
//!
//! ```
//! use chrono::Utc;
//! use scout::paper::{Author, Paper};
//!
//! let paper = Paper {
//!   id:               "2301.07041".into(),
//!   title:            "Verifiable  Fully\nHomomorphic Encryption".into(),
//!   authors:          vec![Author { name: "Alice Researcher".into(), affiliation: None, email: None }],
//!   abstract_text:    "We present...".into(),
//!   categories:       ["cs.CR".to_string()].into_iter().collect(),
//!   primary_category: "cs.CR".into(),
//!   published:        Utc::now(),
//!   updated:          Utc::now(),
//!   abstract_url:     "https://arxiv.org/abs/2301.07041".into(),
//!   pdf_url:          "https://arxiv.org/pdf/2301.07041.pdf".into(),
//! }
//! .tidy();
//!
//! assert_eq!(paper.title, "Verifiable Fully Homomorphic Encryption");
//! ```

use super::*;

/// Complete representation of one paper as returned by the catalog.
///
/// Field contents mirror what the arXiv Atom feed provides. The record is
/// treated as immutable once constructed: the source adapter builds it,
/// applies [`Paper::tidy`], and every later stage only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
  /// Catalog identifier, unique within one run (e.g. "2301.07041v2")
  pub id:               String,
  /// The paper's full title
  pub title:            String,
  /// Ordered list of paper authors
  pub authors:          Vec<Author>,
  /// Full abstract text
  pub abstract_text:    String,
  /// All category tags attached to the paper
  pub categories:       BTreeSet<String>,
  /// The catalog's primary category for the paper
  pub primary_category: String,
  /// Original submission timestamp
  pub published:        DateTime<Utc>,
  /// Last update timestamp (equals `published` for unrevised papers)
  pub updated:          DateTime<Utc>,
  /// URL of the abstract page
  pub abstract_url:     String,
  /// URL of the PDF document
  pub pdf_url:          String,
}

/// Author information for a paper.
///
/// Sources vary in how much author detail they expose; the arXiv feed only
/// carries names, so affiliation and email are usually `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
  /// Author's full name
  pub name:        String,
  /// Optional institutional affiliation
  pub affiliation: Option<String>,
  /// Optional contact email
  pub email:       Option<String>,
}

impl Paper {
  /// Normalizes whitespace in the title and abstract.
  ///
  /// Feed text frequently contains hard line breaks and runs of spaces from
  /// the upstream XML; this collapses them to single spaces and trims the
  /// ends. Applied once by the source adapter at construction time.
  pub fn tidy(mut self) -> Self {
    self.title = normalize_whitespace(&self.title);
    self.abstract_text = normalize_whitespace(&self.abstract_text);
    self
  }

  /// Combined lowercase title and abstract, used for keyword screening.
  pub fn search_text(&self) -> String {
    format!("{} {}", self.title, self.abstract_text).to_lowercase()
  }
}

/// Collapses all whitespace runs to single spaces and trims the result.
fn normalize_whitespace(text: &str) -> String {
  lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
  }
  WHITESPACE.replace_all(text.trim(), " ").into_owned()
}
