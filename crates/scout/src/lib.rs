//! Automated research monitoring and digest generation.
//!
//! `scout` watches arXiv categories for new papers, screens them with cheap
//! keyword heuristics, analyzes the most relevant ones with a language model,
//! and assembles the results into ranked digests delivered as files, webhook
//! posts, or email.
//!
//! # Pipeline
//!
//! Each run flows through fixed stages:
//!
//! 1. **Fetch**: pull the publication window from the catalog ([`source`])
//! 2. **Filter**: deterministic keyword/category screening ([`filter`])
//! 3. **Analyze**: budgeted language-model analysis ([`analyzer`])
//! 4. **Aggregate**: threshold, dedupe, and rank ([`digest`])
//! 5. **Render**: HTML, Markdown, JSON, and email bodies ([`render`])
//! 6. **Deliver**: fan out to configured sinks ([`deliver`])
//!
//! Runs are isolated: any failure is captured in the run's
//! [`pipeline::RunResult`] instead of escaping to the scheduler.
//!
//! # Getting Started
//!
//! ```no_run
//! use scout::{config::Config, digest::DigestKind, pipeline::Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!   let config = Config::from_path("scout.toml")?;
//!   let pipeline = Pipeline::from_config(&config, false)?;
//!
//!   let result = pipeline.execute(DigestKind::Manual).await;
//!   println!("run finished: {:?}", result.status);
//!
//!   Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`paper`]: Core paper metadata types
//! - [`source`]: Catalog fetching and feed parsing
//! - [`filter`]: Cheap local relevance screening
//! - [`analyzer`]: Language-model analysis with budget and retry policy
//! - [`digest`]: Digest assembly and statistics
//! - [`render`]: Output formats
//! - [`deliver`]: File, webhook, and email sinks
//! - [`pipeline`]: End-to-end run orchestration
//! - [`scheduler`]: Daily and weekly triggers
//! - [`config`]: TOML configuration
//! - [`prelude`]: Common traits and types for ergonomic imports

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::{
  collections::BTreeSet,
  fmt::Display,
  path::{Path, PathBuf},
  str::FromStr,
  sync::Arc,
  time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, TimeZone, Utc, Weekday};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

pub mod analyzer;
pub mod config;
pub mod deliver;
pub mod digest;
pub mod error;
pub mod filter;
pub mod paper;
pub mod pipeline;
pub mod render;
pub mod scheduler;
pub mod source;

use crate::{
  analyzer::{Analyzer, AnalyzerSettings, OllamaModel},
  config::Config,
  deliver::{DeliverySink, EmailSink, FileSink, SmtpMailer, WebhookSink},
  digest::{Analysis, AnalyzedPaper, Difficulty, Digest, DigestKind, HIGH_SIGNIFICANCE},
  error::*,
  filter::RelevanceFilter,
  paper::{Author, Paper},
  pipeline::{Pipeline, PipelineSettings, RunResult, RunStatus},
  render::{Artifact, OutputFormat},
  source::{ArxivSource, PaperSource, TimeWindow},
};

/// Common traits and types for ergonomic imports.
///
/// A single glob import pulls in the pieces almost every caller touches:
///
/// ```no_run
/// use scout::prelude::*;
///
/// async fn example() -> Result<()> {
///   let config = scout::config::Config::from_path("scout.toml")?;
///   let pipeline = scout::pipeline::Pipeline::from_config(&config, true)?;
///   pipeline.execute(scout::digest::DigestKind::Manual).await;
///   Ok(())
/// }
/// ```
pub mod prelude {
  pub use crate::{
    analyzer::LanguageModel,
    deliver::{DeliverySink, MailTransport},
    error::{Result, ScoutError},
    source::PaperSource,
  };
}
