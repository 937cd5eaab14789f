//! The end-to-end digest pipeline.
//!
//! [`Pipeline::execute`] runs one complete pass: fetch the window from the
//! paper source, screen with the cheap relevance filter, analyze the budgeted
//! papers, assemble the digest, render every enabled format, and deliver the
//! artifacts. Each run is isolated: every outcome, including a panic-free
//! failure of any stage, is captured in a [`RunResult`] rather than escaping
//! to the caller, and an optional append-only history file records one JSON
//! line per run.
//!
//! A run is [`RunStatus::Failed`] only when no digest could be produced at
//! all (source unavailable, or the whole-run timeout elapsed). Per-paper
//! analysis drops, render failures, and delivery failures degrade the run to
//! [`RunStatus::Partial`] with a warning each, never to failure.

use super::*;

/// Run-level behavior knobs derived from configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
  /// Minimum analyzed significance for digest inclusion
  pub min_significance: f64,
  /// Formats rendered each run
  pub enabled_formats:  Vec<OutputFormat>,
  /// Hard wall-clock limit for one run
  pub run_timeout:      Duration,
  /// When set, skip delivery and only report what would be sent
  pub dry_run:          bool,
  /// Fetch window length in days for daily and manual runs
  pub lookback_days:    i64,
}

/// Final classification of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
  /// Digest produced and every stage completed cleanly
  Success,
  /// Digest produced but some papers, formats, or sinks were lost
  Partial,
  /// No digest could be produced
  Failed,
}

/// Which stage a warning came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningKind {
  /// A paper was dropped after exhausting analysis attempts
  Analysis,
  /// One output format could not be rendered
  Render,
  /// One sink could not deliver an artifact
  Delivery,
}

/// One non-fatal problem encountered during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunWarning {
  /// Originating stage
  pub kind:    WarningKind,
  /// What the warning is about (paper id, format, or sink name)
  pub subject: String,
  /// Human-readable reason
  pub reason:  String,
}

/// Complete record of one pipeline run, serialized to the run history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
  /// Which trigger produced this run
  pub kind:         DigestKind,
  /// Final classification
  pub status:       RunStatus,
  /// Filenames of the digest files rendered this run
  pub digest_files: Vec<String>,
  /// Non-fatal problems, empty on a clean run
  pub warnings:     Vec<RunWarning>,
  /// Fatal error when `status` is `Failed`
  pub error:        Option<String>,
  /// When the run started
  pub started_at:   DateTime<Utc>,
  /// When the run finished (including on failure)
  pub finished_at:  DateTime<Utc>,
}

/// Append-only JSONL run history.
pub struct RunLog {
  /// History file path; parent directories are created on first append
  path: PathBuf,
}

impl RunLog {
  /// Creates a log appending to `path`.
  pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

  /// Appends one run record as a single JSON line.
  pub fn append(&self, result: &RunResult) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    let mut file =
      std::fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
    let line = serde_json::to_string(result)?;
    writeln!(file, "{line}")?;
    Ok(())
  }

  /// Reads back every recorded run, oldest first.
  pub fn read_all(&self) -> Result<Vec<RunResult>> {
    let content = match std::fs::read_to_string(&self.path) {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(e.into()),
    };
    content
      .lines()
      .filter(|l| !l.trim().is_empty())
      .map(|l| serde_json::from_str(l).map_err(Into::into))
      .collect()
  }
}

/// The assembled pipeline over its capability boundaries.
pub struct Pipeline {
  /// Paper catalog capability
  source:   Box<dyn PaperSource>,
  /// Cheap relevance screen
  filter:   RelevanceFilter,
  /// Budgeted language-model analysis
  analyzer: Analyzer,
  /// Delivery destinations
  sinks:    Vec<Box<dyn DeliverySink>>,
  /// Run-level knobs
  settings: PipelineSettings,
  /// Optional run history
  run_log:  Option<RunLog>,
}

impl Pipeline {
  /// Assembles a pipeline from explicit parts. Tests use this directly with
  /// fake capabilities.
  pub fn new(
    source: Box<dyn PaperSource>,
    filter: RelevanceFilter,
    analyzer: Analyzer,
    sinks: Vec<Box<dyn DeliverySink>>,
    settings: PipelineSettings,
    run_log: Option<RunLog>,
  ) -> Self {
    Self { source, filter, analyzer, sinks, settings, run_log }
  }

  /// Assembles the production pipeline from configuration.
  pub fn from_config(config: &Config, dry_run: bool) -> Result<Self> {
    let source = Box::new(ArxivSource::new());
    let filter = RelevanceFilter::from_config(&config.research);

    let model = OllamaModel::new(&config.llm.host, &config.llm.model)?;
    let analyzer = Analyzer::new(Arc::new(model), AnalyzerSettings {
      budget:          config.research.analysis_budget,
      max_attempts:    config.llm.attempts,
      initial_backoff: Duration::from_millis(config.llm.initial_backoff_ms),
      request_timeout: Duration::from_secs(config.llm.timeout_secs),
      concurrency:     config.llm.concurrency,
    });

    let mut sinks: Vec<Box<dyn DeliverySink>> =
      vec![Box::new(FileSink::new(config.output.directory.clone()))];
    if let Some(url) = &config.delivery.webhook_url {
      sinks.push(Box::new(WebhookSink::new(url)?));
    }
    if config.delivery.email.enabled {
      let email = &config.delivery.email;
      let mailer = SmtpMailer::new(
        &email.smtp_host,
        email.smtp_port,
        &email.username,
        &email.password,
        &email.from_address,
      )?;
      sinks.push(Box::new(EmailSink::new(
        Arc::new(mailer),
        email.recipients.clone(),
        email.subject_template.clone(),
      )));
    }

    // Webhook and email both consume the short text body.
    let mut enabled_formats = config.output.formats.clone();
    let wants_email_body = sinks.iter().any(|s| s.wants(OutputFormat::Email));
    if wants_email_body && !enabled_formats.contains(&OutputFormat::Email) {
      enabled_formats.push(OutputFormat::Email);
    }

    let settings = PipelineSettings {
      min_significance: config.research.min_significance,
      enabled_formats,
      run_timeout: Duration::from_secs(config.run.timeout_secs),
      dry_run,
      lookback_days: config.research.days_back,
    };
    let run_log = config.run.log_path.clone().map(RunLog::new);

    Ok(Self::new(source, filter, analyzer, sinks, settings, run_log))
  }

  /// Runs one complete pass and records the outcome.
  ///
  /// Never returns an error: every failure mode, including the whole-run
  /// timeout, becomes a [`RunResult`] so a crashed run cannot take the
  /// scheduler down with it.
  pub async fn execute(&self, kind: DigestKind) -> RunResult {
    let started_at = Utc::now();
    info!("starting {kind} run");

    let outcome = tokio::time::timeout(self.settings.run_timeout, self.run_inner(kind)).await;
    let (status, digest_files, warnings, error) = match outcome {
      Ok(Ok((digest_files, warnings))) => {
        let status = if warnings.is_empty() { RunStatus::Success } else { RunStatus::Partial };
        (status, digest_files, warnings, None)
      },
      Ok(Err(e)) => {
        warn!("{kind} run failed: {e}");
        (RunStatus::Failed, Vec::new(), Vec::new(), Some(e.to_string()))
      },
      Err(_) => {
        let secs = self.settings.run_timeout.as_secs();
        warn!("{kind} run timed out after {secs}s");
        (RunStatus::Failed, Vec::new(), Vec::new(), Some(
          ScoutError::RunTimeout(secs).to_string(),
        ))
      },
    };

    let result = RunResult {
      kind,
      status,
      digest_files,
      warnings,
      error,
      started_at,
      finished_at: Utc::now(),
    };

    if let Some(log) = &self.run_log {
      // History write failures must not change the run outcome.
      if let Err(e) = log.append(&result) {
        warn!("could not append run history: {e}");
      }
    }

    info!("{kind} run finished: {:?}, {} files", result.status, result.digest_files.len());
    result
  }

  /// Fetch through delivery; a returned error means no digest was produced.
  async fn run_inner(&self, kind: DigestKind) -> Result<(Vec<String>, Vec<RunWarning>)> {
    let days = match kind {
      DigestKind::Weekly => 7,
      DigestKind::Daily | DigestKind::Manual => self.settings.lookback_days,
    };
    let window = TimeWindow::lookback(Utc::now(), days);

    let papers = self.source.fetch(self.filter.allowed_categories(), window).await?;
    info!("fetched {} candidate papers", papers.len());

    let ranked: Vec<(Paper, f64)> = papers
      .into_iter()
      .filter_map(|p| self.filter.evaluate(&p, window.end).map(|score| (p, score)))
      .collect();
    info!("{} papers passed relevance screening", ranked.len());

    let (analyzed, failures) = self.analyzer.analyze(ranked).await;
    let mut warnings: Vec<RunWarning> = failures
      .into_iter()
      .map(|f| RunWarning {
        kind:    WarningKind::Analysis,
        subject: f.paper_id,
        reason:  f.reason,
      })
      .collect();

    let digest = Digest::assemble(kind, Utc::now(), analyzed, self.settings.min_significance);

    let mut artifacts = Vec::new();
    let mut digest_files = Vec::new();
    for &format in &self.settings.enabled_formats {
      match render::render(&digest, format) {
        Ok(artifact) => {
          if format != OutputFormat::Email {
            digest_files.push(artifact.filename.clone());
          }
          artifacts.push(artifact);
        },
        Err(e) => warnings.push(RunWarning {
          kind:    WarningKind::Render,
          subject: format.to_string(),
          reason:  e.to_string(),
        }),
      }
    }

    if self.settings.dry_run {
      info!("dry run: skipping delivery of {} artifacts", artifacts.len());
      return Ok((digest_files, warnings));
    }

    for sink in &self.sinks {
      for artifact in artifacts.iter().filter(|a| sink.wants(a.format)) {
        if let Err(e) = sink.deliver(artifact).await {
          warn!("delivery through {} failed: {e}", sink.name());
          warnings.push(RunWarning {
            kind:    WarningKind::Delivery,
            subject: sink.name().to_string(),
            reason:  e.to_string(),
          });
        }
      }
    }

    Ok((digest_files, warnings))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn run_log_appends_and_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let log = RunLog::new(dir.path().join("history/runs.jsonl"));

    let result = RunResult {
      kind:         DigestKind::Manual,
      status:       RunStatus::Success,
      digest_files: vec!["digest_20240510_093000.md".into()],
      warnings:     vec![],
      error:        None,
      started_at:   Utc::now(),
      finished_at:  Utc::now(),
    };
    log.append(&result).unwrap();
    log.append(&result).unwrap();

    let read = log.read_all().unwrap();
    assert_eq!(read.len(), 2);
    assert_eq!(read[0].status, RunStatus::Success);
    assert_eq!(read[0].digest_files, result.digest_files);
  }

  #[test]
  fn missing_run_log_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let log = RunLog::new(dir.path().join("absent.jsonl"));
    assert!(log.read_all().unwrap().is_empty());
  }
}
