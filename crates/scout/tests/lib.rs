//! End-to-end pipeline tests over in-memory fakes.
//!
//! Everything here runs offline: the paper catalog, the language model, and
//! the delivery sinks are all substituted with in-memory implementations so
//! the tests exercise orchestration, budget, and failure policy rather than
//! the network.

use std::{
  collections::BTreeSet,
  error::Error,
  sync::{Arc, Mutex},
  time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use scout::{
  analyzer::{Analyzer, AnalyzerSettings},
  digest::DigestKind,
  filter::RelevanceFilter,
  paper::{Author, Paper},
  pipeline::{Pipeline, PipelineSettings, RunLog, RunStatus, WarningKind},
  prelude::{DeliverySink, LanguageModel, PaperSource},
  render::{Artifact, OutputFormat},
  source::TimeWindow,
};
use tracing_test::traced_test;

// The library's own Result alias collides with the std one in test
// signatures, so it is re-exported under a distinct name.
pub use scout::error::{Result as ScoutResult, ScoutError};

mod workflows;

pub type TestResult<T> = Result<T, Box<dyn Error>>;

/// Canned model response accepted by the strict parser.
pub const GOOD_ANALYSIS: &str = r#"{
  "significance": 0.9,
  "novelty": 0.7,
  "summary": "Strong result on efficient reasoning.",
  "key_insights": ["smaller models can reason", "distillation transfers skills"],
  "business_relevance": "cheaper deployments",
  "implementation_difficulty": "medium",
  "tags": ["reasoning", "efficiency"]
}"#;

/// In-memory catalog returning a fixed paper set, or failing outright.
pub struct FakeSource {
  papers:  Vec<Paper>,
  failing: bool,
}

impl FakeSource {
  pub fn with_papers(papers: Vec<Paper>) -> Self { Self { papers, failing: false } }

  pub fn unavailable() -> Self { Self { papers: Vec::new(), failing: true } }
}

#[async_trait]
impl PaperSource for FakeSource {
  async fn fetch(&self, _: &BTreeSet<String>, window: TimeWindow) -> ScoutResult<Vec<Paper>> {
    if self.failing {
      return Err(ScoutError::SourceUnavailable("connection refused".to_string()));
    }
    Ok(self.papers.iter().filter(|p| window.contains(p.published)).cloned().collect())
  }
}

/// Model that answers from a script keyed on paper identifiers found in the
/// prompt, with a catch-all default.
pub struct ScriptedModel {
  responses: Vec<(String, ScoutResult<String>)>,
  default:   String,
}

impl ScriptedModel {
  pub fn answering(default: &str) -> Self { Self { responses: Vec::new(), default: default.into() } }

  pub fn with_response(mut self, id: &str, response: ScoutResult<String>) -> Self {
    self.responses.push((id.to_string(), response));
    self
  }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
  async fn complete(&self, prompt: &str) -> ScoutResult<String> {
    for (id, response) in &self.responses {
      if prompt.contains(id.as_str()) {
        return match response {
          Ok(text) => Ok(text.clone()),
          Err(ScoutError::LlmTimeout(d)) => Err(ScoutError::LlmTimeout(*d)),
          Err(e) => Err(ScoutError::Analysis { id: id.clone(), reason: e.to_string() }),
        };
      }
    }
    Ok(self.default.clone())
  }
}

/// Sink recording every artifact it is handed.
#[derive(Default)]
pub struct RecordingSink {
  pub delivered: Arc<Mutex<Vec<Artifact>>>,
}

#[async_trait]
impl DeliverySink for RecordingSink {
  fn name(&self) -> &str { "recording" }

  fn wants(&self, _: OutputFormat) -> bool { true }

  async fn deliver(&self, artifact: &Artifact) -> ScoutResult<()> {
    self.delivered.lock().unwrap().push(artifact.clone());
    Ok(())
  }
}

/// A paper published `age_days` before the fixed reference time.
pub fn paper(id: &str, title: &str, abstract_text: &str, age_days: i64) -> Paper {
  let published = reference_time() - chrono::Duration::days(age_days) - chrono::Duration::hours(1);
  Paper {
    id:               id.into(),
    title:            title.into(),
    authors:          vec![Author { name: "Test Author".into(), affiliation: None, email: None }],
    abstract_text:    abstract_text.into(),
    categories:       ["cs.AI".to_string()].into_iter().collect(),
    primary_category: "cs.AI".into(),
    published,
    updated:          published,
    abstract_url:     format!("https://arxiv.org/abs/{id}"),
    pdf_url:          format!("https://arxiv.org/pdf/{id}.pdf"),
  }
}

pub fn reference_time() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() }

/// Standard filter used across the workflow tests.
pub fn test_filter() -> RelevanceFilter {
  RelevanceFilter::new(
    ["cs.AI".to_string()],
    ["language model".to_string(), "reasoning".to_string()],
    [],
    ["survey".to_string()],
    false,
    0.1,
  )
}

/// Pipeline over the given fakes with permissive defaults.
pub fn test_pipeline(
  source: FakeSource,
  model: ScriptedModel,
  sink: RecordingSink,
  min_significance: f64,
  budget: usize,
  run_log: Option<RunLog>,
) -> Pipeline {
  let analyzer = Analyzer::new(Arc::new(model), AnalyzerSettings {
    budget,
    max_attempts: 2,
    initial_backoff: Duration::from_millis(1),
    request_timeout: Duration::from_secs(5),
    concurrency: 3,
  });
  Pipeline::new(
    Box::new(source),
    test_filter(),
    analyzer,
    vec![Box::new(sink)],
    PipelineSettings {
      min_significance,
      enabled_formats: vec![OutputFormat::Json, OutputFormat::Markdown],
      run_timeout: Duration::from_secs(30),
      dry_run: false,
      lookback_days: 1000,
    },
    run_log,
  )
}
