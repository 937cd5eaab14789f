//! Language-model analysis client.
//!
//! This module turns kept papers into [`AnalyzedPaper`] records by prompting
//! a chat-style model endpoint (an Ollama-compatible API) with a fixed
//! template and strictly parsing the structured JSON it returns.
//!
//! Cost control is enforced here: each run carries a hard analysis budget of
//! at most N papers. The kept papers are ranked by the cheap relevance score
//! and only the top N are ever sent to the model; excess papers are dropped
//! for this run, never queued for the next one.
//!
//! Failure handling is per paper. Transient failures (transport errors,
//! timeouts) are retried a fixed number of times with exponential backoff;
//! a response that fails strict parsing drops the paper immediately. Either
//! way the rest of the batch proceeds, and every drop is reported to the
//! caller as a non-fatal failure.

use futures::stream::{self, StreamExt};

use super::*;

/// Capability boundary for the language-model service.
///
/// The analyzer depends only on this trait; production uses [`OllamaModel`],
/// tests substitute canned or failing implementations.
#[async_trait]
pub trait LanguageModel: Send + Sync {
  /// Sends one prompt and returns the model's full text response.
  async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Generation parameters sent with every model request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
  /// Maximum number of tokens to generate
  num_predict: u64,
  /// Top-k sampling parameter
  top_k:       u64,
  /// Top-p (nucleus) sampling parameter
  top_p:       f64,
  /// Sampling temperature; kept low since we want parseable JSON
  temperature: f64,
}

impl Default for GenerationOptions {
  fn default() -> Self { Self { num_predict: 4096, top_k: 50, top_p: 0.95, temperature: 0.2 } }
}

/// One message in a chat exchange.
#[derive(Debug, Serialize, Deserialize)]
struct Message {
  /// "user" for prompts, "assistant" for responses
  role:    String,
  /// Message text
  content: String,
}

/// Request body for the chat endpoint.
#[derive(Serialize)]
struct ChatRequest<'a> {
  /// Model name as known to the serving endpoint
  model:    &'a str,
  /// Conversation; always a single user message here
  messages: Vec<Message>,
  /// Streaming is never used
  stream:   bool,
  /// Generation parameters
  options:  &'a GenerationOptions,
}

/// The subset of the chat response we consume.
#[derive(Deserialize)]
struct ChatResponse {
  /// The assistant message containing the analysis text
  message: Message,
}

/// [`LanguageModel`] backed by an Ollama-compatible chat endpoint.
///
/// # Examples
///
/// ```no_run
/// use scout::analyzer::{LanguageModel, OllamaModel};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let model = OllamaModel::new("http://localhost:11434", "llama3.2:3b")?;
/// let text = model.complete("Summarize transformers in one sentence.").await?;
/// # Ok(())
/// # }
/// ```
pub struct OllamaModel {
  /// Fully resolved chat endpoint URL
  url:     Url,
  /// Model name passed through to the endpoint
  model:   String,
  /// Shared HTTP client
  client:  reqwest::Client,
  /// Generation parameters
  options: GenerationOptions,
}

impl OllamaModel {
  /// Creates a client for the chat endpoint at `host`.
  pub fn new(host: &str, model: &str) -> Result<Self> {
    let base = Url::parse(host).map_err(|e| ScoutError::Config(format!("invalid LLM host: {e}")))?;
    let url = base
      .join("api/chat")
      .map_err(|e| ScoutError::Config(format!("invalid LLM endpoint: {e}")))?;
    Ok(Self {
      url,
      model: model.to_string(),
      client: reqwest::Client::new(),
      options: GenerationOptions::default(),
    })
  }

  /// Overrides the default generation parameters.
  pub fn with_options(mut self, options: GenerationOptions) -> Self {
    self.options = options;
    self
  }
}

#[async_trait]
impl LanguageModel for OllamaModel {
  async fn complete(&self, prompt: &str) -> Result<String> {
    let request = ChatRequest {
      model:    &self.model,
      messages: vec![Message { role: "user".to_string(), content: prompt.to_string() }],
      stream:   false,
      options:  &self.options,
    };

    let response = self.client.post(self.url.clone()).json(&request).send().await?;
    let response = response.error_for_status()?;
    let chat: ChatResponse = response.json().await?;
    Ok(chat.message.content)
  }
}

/// Tunable behavior of the [`Analyzer`].
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
  /// Hard per-run budget: at most this many papers are analyzed
  pub budget:          usize,
  /// Attempts per paper before it is dropped
  pub max_attempts:    u32,
  /// Base delay of the exponential backoff between attempts
  pub initial_backoff: Duration,
  /// Per-request timeout
  pub request_timeout: Duration,
  /// Concurrent in-flight model requests
  pub concurrency:     usize,
}

impl Default for AnalyzerSettings {
  fn default() -> Self {
    Self {
      budget:          10,
      max_attempts:    3,
      initial_backoff: Duration::from_secs(1),
      request_timeout: Duration::from_secs(120),
      concurrency:     3,
    }
  }
}

/// A paper dropped during analysis, with the final reason.
#[derive(Debug, Clone)]
pub struct AnalysisFailure {
  /// Catalog identifier of the dropped paper
  pub paper_id: String,
  /// Final failure reason after retries
  pub reason:   String,
}

/// Batch analyzer enforcing budget, retry, and concurrency policy.
pub struct Analyzer {
  /// The language-model capability
  model:    Arc<dyn LanguageModel>,
  /// Behavior knobs
  settings: AnalyzerSettings,
}

impl Analyzer {
  /// Creates an analyzer over the given model capability.
  pub fn new(model: Arc<dyn LanguageModel>, settings: AnalyzerSettings) -> Self {
    Self { model, settings }
  }

  /// Selects the papers that fit the analysis budget.
  ///
  /// Input pairs each kept paper with its cheap relevance score; output is
  /// the top-N by score (ties broken by identifier for reproducibility),
  /// preserving rank order. Excess papers are simply not analyzed.
  pub fn select(&self, mut ranked: Vec<(Paper, f64)>) -> Vec<Paper> {
    ranked.sort_by(|a, b| {
      b.1
        .partial_cmp(&a.1)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| a.0.id.cmp(&b.0.id))
    });
    ranked.truncate(self.settings.budget);
    ranked.into_iter().map(|(paper, _)| paper).collect()
  }

  /// Analyzes the budgeted papers concurrently.
  ///
  /// Dispatches up to the configured number of concurrent requests and waits
  /// for every attempt to resolve to success or final drop before returning
  /// — aggregation must never start with analyses still in flight. Result
  /// order is not meaningful; the aggregator re-sorts.
  pub async fn analyze(
    &self,
    ranked: Vec<(Paper, f64)>,
  ) -> (Vec<AnalyzedPaper>, Vec<AnalysisFailure>) {
    let selected = self.select(ranked);
    info!("analyzing {} papers (budget {})", selected.len(), self.settings.budget);

    let outcomes = stream::iter(selected)
      .map(|paper| async move {
        let outcome = self.analyze_one(&paper).await;
        (paper, outcome)
      })
      .buffer_unordered(self.settings.concurrency.max(1))
      .collect::<Vec<_>>()
      .await;

    let mut analyzed = Vec::new();
    let mut failures = Vec::new();
    for (paper, outcome) in outcomes {
      match outcome {
        Ok(analysis) => analyzed.push(AnalyzedPaper { paper, analysis }),
        Err(e) => {
          warn!("dropping paper {}: {e}", paper.id);
          failures.push(AnalysisFailure { paper_id: paper.id, reason: e.to_string() });
        },
      }
    }
    (analyzed, failures)
  }

  /// Analyzes a single paper with bounded retry.
  ///
  /// Transient failures are retried with exponential backoff; a parse
  /// failure is final immediately since resending the same prompt is
  /// unlikely to fix malformed output and would burn budget.
  async fn analyze_one(&self, paper: &Paper) -> Result<Analysis> {
    let prompt = render_prompt(paper);
    let mut last_error = None;

    for attempt in 1..=self.settings.max_attempts {
      let request = self.model.complete(&prompt);
      let response = match tokio::time::timeout(self.settings.request_timeout, request).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
          if !is_transient(&e) {
            return Err(e);
          }
          last_error = Some(e);
          self.wait_before_retry(attempt, paper).await;
          continue;
        },
        Err(_) => {
          last_error = Some(ScoutError::LlmTimeout(self.settings.request_timeout));
          self.wait_before_retry(attempt, paper).await;
          continue;
        },
      };

      return parse_analysis(&response);
    }

    Err(ScoutError::Analysis {
      id:     paper.id.clone(),
      reason: last_error.map(|e| e.to_string()).unwrap_or_else(|| "unknown".to_string()),
    })
  }

  /// Sleeps for the backoff delay unless this was the final attempt.
  async fn wait_before_retry(&self, attempt: u32, paper: &Paper) {
    if attempt < self.settings.max_attempts {
      let delay = backoff_delay(attempt, self.settings.initial_backoff);
      debug!("retrying analysis of {} in {delay:?} (attempt {attempt})", paper.id);
      tokio::time::sleep(delay).await;
    }
  }
}

/// Exponential backoff schedule: `initial * 2^(attempt - 1)`.
///
/// Pure so the schedule itself is testable without a clock.
pub fn backoff_delay(attempt: u32, initial: Duration) -> Duration {
  initial * 2u32.saturating_pow(attempt.saturating_sub(1))
}

/// Returns whether an error is worth retrying for the same paper.
fn is_transient(error: &ScoutError) -> bool {
  matches!(error, ScoutError::Network(_) | ScoutError::LlmTimeout(_))
}

/// Renders the fixed analysis prompt for one paper.
pub fn render_prompt(paper: &Paper) -> String {
  let authors = paper.authors.iter().map(|a| a.name.as_str()).collect::<Vec<_>>().join(", ");
  let categories = paper.categories.iter().cloned().collect::<Vec<_>>().join(", ");
  format!(
    r#"You are an expert AI research analyst. Analyze the following paper.

Title: {title}
Authors: {authors}
Categories: {categories}
Identifier: {id}
Abstract: {abstract_text}

Respond with a single JSON object and nothing else:

{{
  "significance": <float 0-1, potential significance to the field>,
  "novelty": <float 0-1, how novel this work is>,
  "summary": "<2-3 sentence summary of the main contribution>",
  "key_insights": ["<insight 1>", "<insight 2>", "<insight 3>"],
  "business_relevance": "<how this could affect commercial applications>",
  "implementation_difficulty": "<one of: low, medium, high>",
  "tags": ["<tag1>", "<tag2>", "<tag3>"]
}}

Be concise and honest; do not inflate scores."#,
    title = paper.title,
    id = paper.id,
    abstract_text = paper.abstract_text,
  )
}

/// Shape of the JSON object we require from the model.
#[derive(Deserialize)]
struct RawAnalysis {
  /// Significance score as returned
  significance:              f64,
  /// Novelty score as returned
  novelty:                   f64,
  /// Summary text
  #[serde(default)]
  summary:                   String,
  /// Key insights list
  #[serde(default)]
  key_insights:              Vec<String>,
  /// Business relevance text
  #[serde(default)]
  business_relevance:        String,
  /// Difficulty as free text, parsed strictly afterwards
  #[serde(default = "default_difficulty")]
  implementation_difficulty: String,
  /// Tag list
  #[serde(default)]
  tags:                      Vec<String>,
}

/// Default difficulty when the model omits the field.
fn default_difficulty() -> String { "medium".to_string() }

/// Strictly parses a model response into an [`Analysis`].
///
/// The JSON object is located between the first `{` and the last `}` in the
/// response, tolerating prose or code fences around it. Anything else is a
/// parse failure that retains the raw text: missing object, wrong shape,
/// unknown difficulty, or numeric scores outside `[0.0, 1.0]`. There is no
/// best-effort partial result.
pub fn parse_analysis(raw: &str) -> Result<Analysis> {
  let malformed = |reason: String| ScoutError::MalformedAnalysis { reason, raw: raw.to_string() };

  let start = raw.find('{').ok_or_else(|| malformed("no JSON object in response".into()))?;
  let end = raw.rfind('}').ok_or_else(|| malformed("no JSON object in response".into()))?;
  if end < start {
    return Err(malformed("no JSON object in response".into()));
  }

  let parsed: RawAnalysis =
    serde_json::from_str(&raw[start..=end]).map_err(|e| malformed(e.to_string()))?;

  for (name, value) in [("significance", parsed.significance), ("novelty", parsed.novelty)] {
    if !(0.0..=1.0).contains(&value) || !value.is_finite() {
      return Err(malformed(format!("{name} {value} outside [0.0, 1.0]")));
    }
  }

  let implementation_difficulty = parsed
    .implementation_difficulty
    .parse::<Difficulty>()
    .map_err(|e| malformed(e.to_string()))?;

  Ok(Analysis {
    significance: parsed.significance,
    novelty: parsed.novelty,
    summary: parsed.summary,
    key_insights: parsed.key_insights,
    business_relevance: parsed.business_relevance,
    implementation_difficulty,
    tags: parsed.tags.into_iter().collect(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  const GOOD_RESPONSE: &str = r#"Here is the analysis you asked for:
{
  "significance": 0.8,
  "novelty": 0.6,
  "summary": "A solid contribution.",
  "key_insights": ["sparse attention scales", "training is cheaper"],
  "business_relevance": "cuts inference cost",
  "implementation_difficulty": "medium",
  "tags": ["efficiency", "transformers"]
}"#;

  #[test]
  fn parses_response_with_surrounding_prose() {
    let analysis = parse_analysis(GOOD_RESPONSE).unwrap();
    assert_eq!(analysis.significance, 0.8);
    assert_eq!(analysis.key_insights.len(), 2);
    assert_eq!(analysis.implementation_difficulty, Difficulty::Medium);
    assert!(analysis.tags.contains("efficiency"));
  }

  #[test]
  fn response_without_json_is_rejected_with_raw_text() {
    let err = parse_analysis("I could not analyze this paper.").unwrap_err();
    match err {
      ScoutError::MalformedAnalysis { raw, .. } => assert!(raw.contains("could not analyze")),
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn out_of_range_score_is_a_parse_failure() {
    let response = r#"{"significance": 1.7, "novelty": 0.5}"#;
    let err = parse_analysis(response).unwrap_err();
    assert!(matches!(err, ScoutError::MalformedAnalysis { .. }));
  }

  #[test]
  fn unknown_difficulty_is_a_parse_failure() {
    let response = r#"{"significance": 0.5, "novelty": 0.5, "implementation_difficulty": "??"}"#;
    assert!(parse_analysis(response).is_err());
  }

  #[test]
  fn backoff_doubles_per_attempt() {
    let initial = Duration::from_millis(250);
    assert_eq!(backoff_delay(1, initial), Duration::from_millis(250));
    assert_eq!(backoff_delay(2, initial), Duration::from_millis(500));
    assert_eq!(backoff_delay(3, initial), Duration::from_millis(1000));
  }

  #[test]
  fn prompt_embeds_paper_fields() {
    let paper = Paper {
      id:               "2401.12345".into(),
      title:            "Sparse Attention at Scale".into(),
      authors:          vec![Author {
        name:        "Alice Researcher".into(),
        affiliation: None,
        email:       None,
      }],
      abstract_text:    "We scale sparse attention.".into(),
      categories:       ["cs.LG".to_string()].into_iter().collect(),
      primary_category: "cs.LG".into(),
      published:        Utc::now(),
      updated:          Utc::now(),
      abstract_url:     String::new(),
      pdf_url:          String::new(),
    };
    let prompt = render_prompt(&paper);
    assert!(prompt.contains("Sparse Attention at Scale"));
    assert!(prompt.contains("Alice Researcher"));
    assert!(prompt.contains("2401.12345"));
    assert!(prompt.contains("We scale sparse attention."));
  }

  /// Budget selection must take exactly the top-N by cheap relevance score.
  #[test]
  fn budget_selects_top_n_by_score() {
    let analyzer = Analyzer::new(
      Arc::new(FixedModel(GOOD_RESPONSE.to_string())),
      AnalyzerSettings { budget: 10, ..Default::default() },
    );

    let ranked: Vec<(Paper, f64)> = (0..50)
      .map(|i| {
        let mut paper = blank_paper(&format!("paper-{i:02}"));
        paper.title = format!("Paper {i}");
        (paper, f64::from(i) / 50.0)
      })
      .collect();

    let selected = analyzer.select(ranked);
    assert_eq!(selected.len(), 10);
    // Scores ascend with index, so the top ten are papers 40..=49.
    for (rank, paper) in selected.iter().enumerate() {
      assert_eq!(paper.id, format!("paper-{:02}", 49 - rank));
    }
  }

  struct FixedModel(String);

  #[async_trait]
  impl LanguageModel for FixedModel {
    async fn complete(&self, _prompt: &str) -> Result<String> { Ok(self.0.clone()) }
  }

  fn blank_paper(id: &str) -> Paper {
    Paper {
      id:               id.into(),
      title:            String::new(),
      authors:          vec![],
      abstract_text:    String::new(),
      categories:       BTreeSet::new(),
      primary_category: String::new(),
      published:        Utc::now(),
      updated:          Utc::now(),
      abstract_url:     String::new(),
      pdf_url:          String::new(),
    }
  }

  #[tokio::test]
  async fn analyze_collects_successes_and_failures() {
    struct FlakyModel;

    #[async_trait]
    impl LanguageModel for FlakyModel {
      async fn complete(&self, prompt: &str) -> Result<String> {
        if prompt.contains("bad-paper") {
          Ok("no json here".to_string())
        } else {
          Ok(GOOD_RESPONSE.to_string())
        }
      }
    }

    let analyzer = Analyzer::new(Arc::new(FlakyModel), AnalyzerSettings {
      budget: 10,
      max_attempts: 1,
      ..Default::default()
    });

    let ranked = vec![(blank_paper("good-paper"), 0.9), (blank_paper("bad-paper"), 0.8)];
    let (analyzed, failures) = analyzer.analyze(ranked).await;

    assert_eq!(analyzed.len(), 1);
    assert_eq!(analyzed[0].paper.id, "good-paper");
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].paper_id, "bad-paper");
  }
}
