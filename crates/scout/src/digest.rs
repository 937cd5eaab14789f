//! Digest data model and aggregation.
//!
//! An [`AnalyzedPaper`] wraps one [`Paper`] together with the structured
//! analysis returned by the language model; a [`Digest`] is the ordered,
//! deduplicated collection of analyzed papers for one run plus its summary
//! statistics. [`Digest::assemble`] is a pure transformation so the whole
//! aggregation stage is testable without any collaborators.
//!
//! Digests serialize losslessly to JSON: the JSON artifact written by the
//! renderer is the canonical machine-readable form and round-trips to an
//! equal value.

use super::*;

/// Significance at or above this value counts as "high significance" in the
/// summary statistics.
pub const HIGH_SIGNIFICANCE: f64 = 0.7;

/// Structured analysis of one paper as produced by the language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
  /// Potential significance to the field, in `[0.0, 1.0]`
  pub significance:              f64,
  /// How novel the work is, in `[0.0, 1.0]`
  pub novelty:                   f64,
  /// Two-to-three sentence summary of the main contribution
  pub summary:                   String,
  /// Ordered key insights extracted from the paper
  pub key_insights:              Vec<String>,
  /// Assessment of commercial relevance
  pub business_relevance:        String,
  /// Estimated effort to put the work into practice
  pub implementation_difficulty: Difficulty,
  /// Topic tags assigned by the model
  pub tags:                      BTreeSet<String>,
}

/// Coarse implementation-effort assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
  /// Straightforward to reproduce or apply
  Low,
  /// Requires meaningful engineering effort
  Medium,
  /// Requires substantial expertise or resources
  High,
}

impl Display for Difficulty {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Difficulty::Low => write!(f, "low"),
      Difficulty::Medium => write!(f, "medium"),
      Difficulty::High => write!(f, "high"),
    }
  }
}

impl FromStr for Difficulty {
  type Err = ScoutError;

  /// Maps the model's free-text assessments (the prompt suggests
  /// Easy/Medium/Hard/Expert) onto the closed three-level scale.
  fn from_str(s: &str) -> Result<Self> {
    let lowered = s.to_lowercase();
    let head = lowered.split([' ', '/', '-', ':']).next().unwrap_or("");
    match head {
      "low" | "easy" | "trivial" => Ok(Difficulty::Low),
      "medium" | "moderate" => Ok(Difficulty::Medium),
      "high" | "hard" | "expert" | "difficult" => Ok(Difficulty::High),
      other => Err(ScoutError::Config(format!("unknown difficulty: {other}"))),
    }
  }
}

/// One paper together with its successful analysis.
///
/// Created only after a successful analyzer call; a paper that was filtered
/// out or whose analysis failed simply never gets this wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedPaper {
  /// The underlying catalog record
  pub paper:    Paper,
  /// The model's structured analysis
  pub analysis: Analysis,
}

/// Which schedule (or manual trigger) produced a digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestKind {
  /// Produced by the daily schedule
  Daily,
  /// Produced by the weekly schedule (7-day window)
  Weekly,
  /// Produced by a manual one-shot invocation
  Manual,
}

impl Display for DigestKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      DigestKind::Daily => write!(f, "daily"),
      DigestKind::Weekly => write!(f, "weekly"),
      DigestKind::Manual => write!(f, "manual"),
    }
  }
}

/// Summary statistics over a digest's papers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestStats {
  /// Number of papers in the digest
  pub analyzed:          usize,
  /// Papers with significance at or above [`HIGH_SIGNIFICANCE`]
  pub high_significance: usize,
  /// Mean significance over the digest (0.0 for an empty digest)
  pub mean_significance: f64,
}

/// The assembled result of one pipeline run.
///
/// Papers are sorted by significance descending, publication timestamp
/// descending, then identifier ascending; identifiers are unique; every
/// entry's significance is at or above the threshold the digest was
/// assembled with. An empty digest is a valid, renderable outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Digest {
  /// Which trigger produced this digest
  pub kind:         DigestKind,
  /// Generation timestamp, also used for artifact filenames
  pub generated_at: DateTime<Utc>,
  /// Analyzed papers in display order
  pub papers:       Vec<AnalyzedPaper>,
  /// Summary statistics over `papers`
  pub stats:        DigestStats,
}

impl Digest {
  /// Assembles a digest from analyzed papers.
  ///
  /// Pure: filters out papers below `min_significance`, deduplicates by
  /// identifier (first occurrence wins), sorts deterministically, and
  /// computes summary statistics. Empty input yields an empty digest with
  /// zero-valued statistics.
  ///
  /// # Examples
  ///
  /// ```
  /// use chrono::Utc;
  /// use scout::digest::{Digest, DigestKind};
  ///
  /// let digest = Digest::assemble(DigestKind::Manual, Utc::now(), vec![], 0.4);
  /// assert!(digest.papers.is_empty());
  /// assert_eq!(digest.stats.analyzed, 0);
  /// ```
  pub fn assemble(
    kind: DigestKind,
    generated_at: DateTime<Utc>,
    papers: Vec<AnalyzedPaper>,
    min_significance: f64,
  ) -> Self {
    let mut seen = BTreeSet::new();
    let mut kept: Vec<AnalyzedPaper> = papers
      .into_iter()
      .filter(|p| p.analysis.significance >= min_significance)
      .filter(|p| seen.insert(p.paper.id.clone()))
      .collect();

    kept.sort_by(|a, b| {
      b.analysis
        .significance
        .partial_cmp(&a.analysis.significance)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| b.paper.published.cmp(&a.paper.published))
        .then_with(|| a.paper.id.cmp(&b.paper.id))
    });

    let stats = DigestStats {
      analyzed:          kept.len(),
      high_significance: kept
        .iter()
        .filter(|p| p.analysis.significance >= HIGH_SIGNIFICANCE)
        .count(),
      mean_significance: if kept.is_empty() {
        0.0
      } else {
        kept.iter().map(|p| p.analysis.significance).sum::<f64>() / kept.len() as f64
      },
    };

    Self { kind, generated_at, papers: kept, stats }
  }
}
