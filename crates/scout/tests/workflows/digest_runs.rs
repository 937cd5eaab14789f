use scout::digest::Digest;

use super::*;

/// Canned response with significance below the default digest threshold.
const LOW_ANALYSIS: &str = r#"{
  "significance": 0.3,
  "novelty": 0.4,
  "summary": "Incremental tweak to a known method.",
  "key_insights": ["minor gains"],
  "business_relevance": "limited",
  "implementation_difficulty": "low",
  "tags": ["incremental"]
}"#;

#[traced_test]
#[tokio::test]
async fn fetch_filter_analyze_and_aggregate() -> TestResult<()> {
  let source = FakeSource::with_papers(vec![
    paper("2406.00001", "Scaling language model reasoning", "We scale reasoning.", 0),
    paper("2406.00002", "Spectral graph partitioning", "Pure combinatorics.", 0),
    paper("2406.00003", "Efficient reasoning distillation", "Distilling reasoning.", 0),
  ]);
  let model = ScriptedModel::answering(GOOD_ANALYSIS)
    .with_response("2406.00003", Ok(LOW_ANALYSIS.to_string()));
  let sink = RecordingSink::default();
  let delivered = sink.delivered.clone();

  let pipeline = test_pipeline(source, model, sink, 0.4, 10, None);
  let result = pipeline.execute(DigestKind::Daily).await;

  // The off-topic paper never reached analysis; the low-significance one was
  // analyzed but aggregated out.
  assert_eq!(result.status, RunStatus::Success);
  assert!(result.warnings.is_empty());
  assert_eq!(result.digest_files.len(), 2);

  let delivered = delivered.lock().unwrap();
  let json = delivered.iter().find(|a| a.format == OutputFormat::Json).unwrap();
  let digest: Digest = serde_json::from_str(&json.content)?;
  assert_eq!(digest.papers.len(), 1);
  assert_eq!(digest.papers[0].paper.id, "2406.00001");
  assert_eq!(digest.stats.analyzed, 1);
  Ok(())
}

#[tokio::test]
async fn analysis_timeout_degrades_run_to_partial() -> TestResult<()> {
  let source = FakeSource::with_papers(vec![
    paper("2406.00010", "Robust language model evaluation", "Evaluation.", 0),
    paper("2406.00011", "Chain of reasoning benchmarks", "Benchmarks.", 0),
  ]);
  let model = ScriptedModel::answering(GOOD_ANALYSIS)
    .with_response("2406.00011", Err(ScoutError::LlmTimeout(Duration::from_secs(5))));
  let sink = RecordingSink::default();
  let delivered = sink.delivered.clone();

  let pipeline = test_pipeline(source, model, sink, 0.4, 10, None);
  let result = pipeline.execute(DigestKind::Daily).await;

  assert_eq!(result.status, RunStatus::Partial);
  assert_eq!(result.warnings.len(), 1);
  assert_eq!(result.warnings[0].kind, WarningKind::Analysis);
  assert_eq!(result.warnings[0].subject, "2406.00011");

  // The digest still went out, without the dropped paper.
  let delivered = delivered.lock().unwrap();
  let json = delivered.iter().find(|a| a.format == OutputFormat::Json).unwrap();
  let digest: Digest = serde_json::from_str(&json.content)?;
  assert_eq!(digest.papers.len(), 1);
  assert_eq!(digest.papers[0].paper.id, "2406.00010");
  Ok(())
}

#[tokio::test]
async fn analysis_budget_caps_model_calls() -> TestResult<()> {
  let papers: Vec<Paper> = (0..50)
    .map(|i| {
      paper(
        &format!("2406.1{i:04}"),
        "Language model reasoning study",
        "On reasoning.",
        i64::from(i % 5),
      )
    })
    .collect();
  let source = FakeSource::with_papers(papers);
  let sink = RecordingSink::default();
  let delivered = sink.delivered.clone();

  let pipeline =
    test_pipeline(source, ScriptedModel::answering(GOOD_ANALYSIS), sink, 0.0, 10, None);
  let result = pipeline.execute(DigestKind::Daily).await;

  assert_eq!(result.status, RunStatus::Success);
  let delivered = delivered.lock().unwrap();
  let json = delivered.iter().find(|a| a.format == OutputFormat::Json).unwrap();
  let digest: Digest = serde_json::from_str(&json.content)?;
  // Fifty papers passed screening but only the budgeted ten were analyzed.
  assert_eq!(digest.papers.len(), 10);
  Ok(())
}

#[tokio::test]
async fn unavailable_source_fails_the_run_and_is_logged() -> TestResult<()> {
  let dir = tempfile::tempdir()?;
  let log_path = dir.path().join("runs.jsonl");

  let pipeline = test_pipeline(
    FakeSource::unavailable(),
    ScriptedModel::answering(GOOD_ANALYSIS),
    RecordingSink::default(),
    0.4,
    10,
    Some(RunLog::new(&log_path)),
  );
  let result = pipeline.execute(DigestKind::Manual).await;

  assert_eq!(result.status, RunStatus::Failed);
  assert!(result.digest_files.is_empty());
  assert!(result.error.as_deref().unwrap().contains("unavailable"));

  // The failure is durably recorded in the run history.
  let history = RunLog::new(&log_path).read_all()?;
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].status, RunStatus::Failed);
  Ok(())
}

#[tokio::test]
async fn empty_window_produces_a_valid_empty_digest() -> TestResult<()> {
  let sink = RecordingSink::default();
  let delivered = sink.delivered.clone();

  let pipeline = test_pipeline(
    FakeSource::with_papers(vec![]),
    ScriptedModel::answering(GOOD_ANALYSIS),
    sink,
    0.4,
    10,
    None,
  );
  let result = pipeline.execute(DigestKind::Daily).await;

  // Zero papers is a successful run, clearly distinct from a source failure.
  assert_eq!(result.status, RunStatus::Success);
  assert!(result.error.is_none());

  let delivered = delivered.lock().unwrap();
  let json = delivered.iter().find(|a| a.format == OutputFormat::Json).unwrap();
  let digest: Digest = serde_json::from_str(&json.content)?;
  assert!(digest.papers.is_empty());
  assert_eq!(digest.stats.analyzed, 0);
  Ok(())
}

#[tokio::test]
async fn dry_run_renders_but_delivers_nothing() -> TestResult<()> {
  let source = FakeSource::with_papers(vec![paper(
    "2406.00020",
    "Language model planning",
    "Planning.",
    0,
  )]);
  let analyzer = Analyzer::new(
    Arc::new(ScriptedModel::answering(GOOD_ANALYSIS)),
    AnalyzerSettings { budget: 10, ..Default::default() },
  );
  let sink = RecordingSink::default();
  let delivered = sink.delivered.clone();

  let pipeline = Pipeline::new(
    Box::new(source),
    test_filter(),
    analyzer,
    vec![Box::new(sink)],
    PipelineSettings {
      min_significance: 0.4,
      enabled_formats:  vec![OutputFormat::Json],
      run_timeout:      Duration::from_secs(30),
      dry_run:          true,
      lookback_days:    1000,
    },
    None,
  );
  let result = pipeline.execute(DigestKind::Manual).await;

  assert_eq!(result.status, RunStatus::Success);
  assert_eq!(result.digest_files.len(), 1);
  assert!(delivered.lock().unwrap().is_empty());
  Ok(())
}
