//! Cheap local relevance screening.
//!
//! This stage exists purely for cost control: it cuts the candidate set with
//! keyword and category heuristics before any paid analyzer call is made. It
//! is deterministic, makes no network calls, and has no side effects, so the
//! keep/drop policy is trivially testable.
//!
//! The policy, in order:
//! 1. Papers mentioning an exclude keyword (e.g. "survey") are dropped.
//! 2. A paper must share at least one category with the allow-list.
//! 3. Unless category membership alone is configured as sufficient, at least
//!    one interest keyword must appear in the title or abstract.
//! 4. The remaining papers are scored in `[0.0, 1.0]`; papers below the
//!    minimum relevance score are dropped.
//!
//! The score doubles as the ranking key for analyzer budget selection.

use super::*;

/// Deterministic keyword/category filter over [`Paper`] records.
///
/// Construct once per run from configuration; all keyword lists are held
/// lowercase so matching is case-insensitive.
///
/// # Examples
///
/// ```
/// use scout::filter::RelevanceFilter;
///
/// let filter = RelevanceFilter::new(
///   ["cs.AI".into()],
///   ["language model".into()],
///   ["breakthrough".into()],
///   ["survey".into()],
///   false,
///   0.1,
/// );
/// ```
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
  /// Category allow-list; a paper must intersect it to be kept
  allowed_categories:        BTreeSet<String>,
  /// Interest keywords matched against title and abstract
  keywords:                  Vec<String>,
  /// High-value keywords that raise the relevance score
  boost_keywords:            Vec<String>,
  /// Keywords that drop a paper outright
  exclude_keywords:          Vec<String>,
  /// When set, a category match alone keeps a paper even without keyword hits
  category_match_sufficient: bool,
  /// Minimum relevance score required to keep a paper
  min_score:                 f64,
}

impl RelevanceFilter {
  /// Creates a filter from explicit keyword lists.
  ///
  /// All keywords are lowercased on construction.
  pub fn new(
    allowed_categories: impl IntoIterator<Item = String>,
    keywords: impl IntoIterator<Item = String>,
    boost_keywords: impl IntoIterator<Item = String>,
    exclude_keywords: impl IntoIterator<Item = String>,
    category_match_sufficient: bool,
    min_score: f64,
  ) -> Self {
    let lower = |it: Vec<String>| it.into_iter().map(|k| k.to_lowercase()).collect::<Vec<_>>();
    Self {
      allowed_categories: allowed_categories.into_iter().collect(),
      keywords: lower(keywords.into_iter().collect()),
      boost_keywords: lower(boost_keywords.into_iter().collect()),
      exclude_keywords: lower(exclude_keywords.into_iter().collect()),
      category_match_sufficient,
      min_score,
    }
  }

  /// Creates a filter from the research section of the configuration.
  pub fn from_config(config: &crate::config::ResearchConfig) -> Self {
    Self::new(
      config.categories.iter().cloned(),
      config.keywords.iter().cloned(),
      config.boost_keywords.iter().cloned(),
      config.exclude_keywords.iter().cloned(),
      config.category_match_sufficient,
      config.min_relevance,
    )
  }

  /// The category allow-list, also used to scope the catalog query.
  pub fn allowed_categories(&self) -> &BTreeSet<String> { &self.allowed_categories }

  /// Applies the keep/drop policy to one paper.
  ///
  /// Returns `Some(score)` when the paper should proceed to analysis, `None`
  /// when it is dropped. `reference` anchors the recency bonus; the pipeline
  /// passes the end of the fetch window so results are reproducible for a
  /// given input, never dependent on wall-clock time at evaluation.
  pub fn evaluate(&self, paper: &Paper, reference: DateTime<Utc>) -> Option<f64> {
    let text = paper.search_text();

    if self.exclude_keywords.iter().any(|k| text.contains(k.as_str())) {
      trace!("dropping {}: exclude keyword matched", paper.id);
      return None;
    }

    if paper.categories.intersection(&self.allowed_categories).next().is_none() {
      trace!("dropping {}: no allowed category", paper.id);
      return None;
    }

    let keyword_hits = self.keywords.iter().filter(|k| text.contains(k.as_str())).count();
    if keyword_hits == 0 && !self.category_match_sufficient {
      trace!("dropping {}: no interest keyword", paper.id);
      return None;
    }

    let score = self.score_with_hits(paper, reference, keyword_hits, &text);
    if score < self.min_score {
      trace!("dropping {}: score {score:.2} below minimum", paper.id);
      return None;
    }
    Some(score)
  }

  /// Computes the cheap relevance score in `[0.0, 1.0]` for one paper.
  ///
  /// Deterministic given the same paper and reference timestamp.
  pub fn score(&self, paper: &Paper, reference: DateTime<Utc>) -> f64 {
    let text = paper.search_text();
    let keyword_hits = self.keywords.iter().filter(|k| text.contains(k.as_str())).count();
    self.score_with_hits(paper, reference, keyword_hits, &text)
  }

  /// Scoring core shared by [`Self::evaluate`] and [`Self::score`].
  fn score_with_hits(
    &self,
    paper: &Paper,
    reference: DateTime<Utc>,
    keyword_hits: usize,
    text: &str,
  ) -> f64 {
    let mut score = 0.1 * keyword_hits.min(3) as f64;

    for keyword in &self.boost_keywords {
      if text.contains(keyword.as_str()) {
        score += 0.2;
      }
    }

    // Recency tiers relative to the fetch window end.
    let age_days = (reference - paper.published).num_days();
    score += match age_days {
      d if d <= 1 => 0.3,
      d if d <= 3 => 0.2,
      d if d <= 7 => 0.1,
      _ => 0.0,
    };

    if self.allowed_categories.contains(&paper.primary_category) {
      score += 0.2;
    }

    score.min(1.0)
  }
}
