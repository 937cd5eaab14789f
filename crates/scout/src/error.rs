//! Error types for the scout library.
//!
//! This module provides a comprehensive error type covering every failure mode
//! of the digest pipeline:
//! - Source retrieval failures (fatal to a run)
//! - Per-paper analysis failures (non-fatal, the paper is dropped)
//! - Per-format rendering and per-sink delivery failures (non-fatal)
//! - Configuration and filesystem errors
//!
//! The severity of an error is decided by the caller, not the variant: the
//! pipeline treats [`ScoutError::SourceUnavailable`] and a run timeout as
//! fatal, and degrades everything else into run warnings.

use thiserror::Error;

/// Error type alias used for the [`scout`](crate) crate.
pub type Result<T> = core::result::Result<T, ScoutError>;

/// Errors that can occur while fetching, analyzing, and publishing digests.
///
/// Most variants carry enough context to be logged as-is; the analysis parse
/// failure additionally retains the raw model output for diagnostics, since
/// free-text responses that fail strict parsing are otherwise unrecoverable.
#[derive(Error, Debug)]
pub enum ScoutError {
  /// The paper catalog could not be reached after the adapter's own retry
  /// policy was exhausted.
  ///
  /// This is fatal to the run: an unreachable source is deliberately
  /// distinguished from a source that returned zero new papers.
  #[error("paper source unavailable: {0}")]
  SourceUnavailable(String),

  /// A network request failed.
  ///
  /// Covers DNS, connection, TLS, and HTTP-level transport failures from any
  /// of the HTTP clients (catalog, language model, webhook).
  #[error(transparent)]
  Network(#[from] reqwest::Error),

  /// A language model request exceeded its per-request timeout.
  ///
  /// Treated as transient: the analyzer retries the affected paper with
  /// backoff before giving up on it.
  #[error("language model request timed out after {0:?}")]
  LlmTimeout(std::time::Duration),

  /// The language model produced output that failed strict parsing.
  ///
  /// This includes responses with no JSON object, JSON that does not match
  /// the expected shape, and numeric scores outside `[0.0, 1.0]`. The raw
  /// response text is retained so the failure can be diagnosed from logs.
  #[error("unparseable analysis response: {reason}")]
  MalformedAnalysis {
    /// Why parsing was rejected.
    reason: String,
    /// The raw response text as received from the model.
    raw:    String,
  },

  /// Analysis of a single paper failed after all retry attempts.
  ///
  /// Non-fatal: the paper is dropped from the digest and the failure is
  /// recorded as a run warning.
  #[error("analysis failed for paper {id}: {reason}")]
  Analysis {
    /// Catalog identifier of the affected paper.
    id:     String,
    /// Final failure reason after retries were exhausted.
    reason: String,
  },

  /// Rendering one output format failed.
  ///
  /// Non-fatal: other enabled formats are still attempted.
  #[error("failed to render {format} output: {reason}")]
  Render {
    /// The output format that failed.
    format: String,
    /// Why rendering failed.
    reason: String,
  },

  /// Delivery through one sink failed.
  ///
  /// Non-fatal: remaining sinks are still attempted.
  #[error("delivery via {sink} failed: {reason}")]
  Delivery {
    /// Name of the sink that failed.
    sink:   String,
    /// Why delivery failed.
    reason: String,
  },

  /// A filesystem operation failed.
  #[error(transparent)]
  Path(#[from] std::io::Error),

  /// A TOML configuration file could not be parsed.
  #[error(transparent)]
  TomlDe(#[from] toml::de::Error),

  /// JSON serialization or deserialization failed.
  #[error(transparent)]
  Json(#[from] serde_json::Error),

  /// The configuration is invalid or incomplete.
  #[error("{0}")]
  Config(String),

  /// The whole run exceeded its timeout budget.
  ///
  /// In-flight analyzer calls are abandoned; they are idempotent reads so
  /// fire-and-forget is acceptable.
  #[error("run exceeded its timeout budget of {0}s")]
  RunTimeout(u64),
}
