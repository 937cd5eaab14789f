//! Configuration loading and validation.
//!
//! Configuration lives in a single TOML file with one table per concern.
//! Every field has a default, so an empty file is a valid configuration and
//! a partial file only overrides what it names. Secrets (webhook URL, SMTP
//! password) can be supplied through environment variables instead of the
//! file; the environment wins when both are set.
//!
//! # Examples
//!
//! ```
//! use scout::config::Config;
//!
//! let config: Config = toml::from_str(
//!   r#"
//!   [research]
//!   categories = ["cs.AI", "cs.CR"]
//!   keywords = ["zero-knowledge"]
//!
//!   [schedule]
//!   daily_time = "07:30"
//!   "#,
//! )
//! .unwrap();
//! assert_eq!(config.research.categories, vec!["cs.AI", "cs.CR"]);
//! ```

use super::*;

/// Environment variable overriding `[delivery] webhook_url`.
const ENV_WEBHOOK_URL: &str = "SCOUT_WEBHOOK_URL";
/// Environment variable overriding `[delivery.email] password`.
const ENV_SMTP_PASSWORD: &str = "SCOUT_SMTP_PASSWORD";

/// Root configuration, one field per TOML table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// What to monitor and how aggressively to filter
  pub research: ResearchConfig,
  /// Language-model endpoint and retry policy
  pub llm:      LlmConfig,
  /// When scheduled runs trigger
  pub schedule: ScheduleConfig,
  /// Where and in which formats digests are written
  pub output:   OutputConfig,
  /// Optional webhook and email delivery
  pub delivery: DeliveryConfig,
  /// Run-level limits and history
  pub run:      RunConfig,
}

/// The `[research]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
  /// Category allow-list for fetching and filtering
  pub categories:                Vec<String>,
  /// Interest keywords matched against title and abstract
  pub keywords:                  Vec<String>,
  /// Keywords that raise the relevance score
  pub boost_keywords:            Vec<String>,
  /// Keywords that drop a paper outright
  pub exclude_keywords:          Vec<String>,
  /// Fetch window length in days for daily and manual runs
  pub days_back:                 i64,
  /// Minimum cheap relevance score to keep a paper
  pub min_relevance:             f64,
  /// Minimum analyzed significance to appear in the digest
  pub min_significance:          f64,
  /// Hard per-run analysis budget
  pub analysis_budget:           usize,
  /// Keep papers on category match alone, without keyword hits
  pub category_match_sufficient: bool,
}

impl Default for ResearchConfig {
  fn default() -> Self {
    Self {
      categories:                vec!["cs.AI".into(), "cs.LG".into(), "cs.CL".into()],
      keywords:                  vec![
        "large language model".into(),
        "reasoning".into(),
        "agent".into(),
        "transformer".into(),
      ],
      boost_keywords:            vec!["state-of-the-art".into(), "breakthrough".into()],
      exclude_keywords:          vec!["survey".into(), "review".into(), "tutorial".into()],
      days_back:                 1,
      min_relevance:             0.3,
      min_significance:          0.4,
      analysis_budget:           10,
      category_match_sufficient: false,
    }
  }
}

/// The `[llm]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
  /// Base URL of the Ollama-compatible endpoint
  pub host:               String,
  /// Model name
  pub model:              String,
  /// Per-request timeout in seconds
  pub timeout_secs:       u64,
  /// Attempts per paper before it is dropped
  pub attempts:           u32,
  /// Concurrent in-flight requests
  pub concurrency:        usize,
  /// Base backoff delay between attempts, in milliseconds
  pub initial_backoff_ms: u64,
}

impl Default for LlmConfig {
  fn default() -> Self {
    Self {
      host:               "http://localhost:11434".into(),
      model:              "llama3.2:3b".into(),
      timeout_secs:       120,
      attempts:           3,
      concurrency:        3,
      initial_backoff_ms: 1000,
    }
  }
}

/// The `[schedule]` table. Times are "HH:MM" in UTC.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
  /// Whether the daily digest runs
  pub daily_enabled:  bool,
  /// Daily trigger time
  pub daily_time:     String,
  /// Whether the weekly digest runs
  pub weekly_enabled: bool,
  /// Weekday of the weekly trigger
  pub weekly_day:     String,
  /// Weekly trigger time
  pub weekly_time:    String,
}

impl Default for ScheduleConfig {
  fn default() -> Self {
    Self {
      daily_enabled:  true,
      daily_time:     "09:00".into(),
      weekly_enabled: true,
      weekly_day:     "monday".into(),
      weekly_time:    "08:00".into(),
    }
  }
}

/// The `[output]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
  /// Directory digest files are written into
  pub directory: PathBuf,
  /// Formats rendered each run
  pub formats:   Vec<OutputFormat>,
}

impl Default for OutputConfig {
  fn default() -> Self {
    Self {
      directory: dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("scout/digests"),
      formats:   vec![OutputFormat::Html, OutputFormat::Markdown, OutputFormat::Json],
    }
  }
}

/// The `[delivery]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
  /// Discord-compatible webhook for the short digest, if set
  pub webhook_url: Option<String>,
  /// Email delivery settings
  pub email:       EmailConfig,
}

/// The `[delivery.email]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
  /// Whether email delivery is attempted
  pub enabled:          bool,
  /// SMTP relay hostname
  pub smtp_host:        String,
  /// SMTP relay port (STARTTLS)
  pub smtp_port:        u16,
  /// SMTP username
  pub username:         String,
  /// SMTP password; prefer the environment variable
  pub password:         String,
  /// From header address
  pub from_address:     String,
  /// Recipient addresses
  pub recipients:       Vec<String>,
  /// Subject line; `{date}` expands to the delivery date
  pub subject_template: String,
}

impl Default for EmailConfig {
  fn default() -> Self {
    Self {
      enabled:          false,
      smtp_host:        "smtp.gmail.com".into(),
      smtp_port:        587,
      username:         String::new(),
      password:         String::new(),
      from_address:     String::new(),
      recipients:       Vec::new(),
      subject_template: "Research Digest {date}".into(),
    }
  }
}

/// The `[run]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
  /// Whole-run timeout in seconds
  pub timeout_secs: u64,
  /// Append-only run history file, if set
  pub log_path:     Option<PathBuf>,
}

impl Default for RunConfig {
  fn default() -> Self { Self { timeout_secs: 900, log_path: None } }
}

impl Config {
  /// Platform-specific default location of the configuration file.
  pub fn default_path() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("scout/scout.toml")
  }

  /// Loads, validates, and applies environment overrides.
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let mut config: Config = toml::from_str(&content)?;
    config.apply_env();
    config.validate()?;
    Ok(config)
  }

  /// Applies environment variable overrides for secrets.
  fn apply_env(&mut self) {
    if let Ok(url) = std::env::var(ENV_WEBHOOK_URL) {
      if !url.is_empty() {
        self.delivery.webhook_url = Some(url);
      }
    }
    if let Ok(password) = std::env::var(ENV_SMTP_PASSWORD) {
      if !password.is_empty() {
        self.delivery.email.password = password;
      }
    }
  }

  /// Rejects configurations that cannot produce a sensible run.
  pub fn validate(&self) -> Result<()> {
    if self.research.categories.is_empty() {
      return Err(ScoutError::Config("at least one category is required".into()));
    }
    for (name, value) in [
      ("min_relevance", self.research.min_relevance),
      ("min_significance", self.research.min_significance),
    ] {
      if !(0.0..=1.0).contains(&value) {
        return Err(ScoutError::Config(format!("{name} must be within [0.0, 1.0], got {value}")));
      }
    }
    if self.research.analysis_budget == 0 {
      return Err(ScoutError::Config("analysis_budget must be at least 1".into()));
    }
    if self.research.days_back < 1 {
      return Err(ScoutError::Config("days_back must be at least 1".into()));
    }
    if self.output.formats.is_empty() {
      return Err(ScoutError::Config("at least one output format is required".into()));
    }
    parse_time(&self.schedule.daily_time)?;
    parse_time(&self.schedule.weekly_time)?;
    parse_weekday(&self.schedule.weekly_day)?;
    if self.delivery.email.enabled && self.delivery.email.recipients.is_empty() {
      return Err(ScoutError::Config("email delivery enabled without recipients".into()));
    }
    Ok(())
  }

  /// Writes the default configuration as documented TOML.
  pub fn write_default(path: impl AsRef<Path>) -> Result<()> {
    let rendered = toml::to_string_pretty(&Config::default())
      .map_err(|e| ScoutError::Config(e.to_string()))?;
    std::fs::write(path.as_ref(), rendered)?;
    Ok(())
  }
}

/// Parses "HH:MM" into an hour/minute pair.
pub fn parse_time(time: &str) -> Result<(u32, u32)> {
  let invalid = || ScoutError::Config(format!("invalid time of day: {time}"));
  let (hour, minute) = time.split_once(':').ok_or_else(invalid)?;
  let hour: u32 = hour.parse().map_err(|_| invalid())?;
  let minute: u32 = minute.parse().map_err(|_| invalid())?;
  if hour > 23 || minute > 59 {
    return Err(invalid());
  }
  Ok((hour, minute))
}

/// Parses a weekday name ("monday", "tue", ...).
pub fn parse_weekday(day: &str) -> Result<Weekday> {
  match day.to_lowercase().as_str() {
    "monday" | "mon" => Ok(Weekday::Mon),
    "tuesday" | "tue" => Ok(Weekday::Tue),
    "wednesday" | "wed" => Ok(Weekday::Wed),
    "thursday" | "thu" => Ok(Weekday::Thu),
    "friday" | "fri" => Ok(Weekday::Fri),
    "saturday" | "sat" => Ok(Weekday::Sat),
    "sunday" | "sun" => Ok(Weekday::Sun),
    other => Err(ScoutError::Config(format!("invalid weekday: {other}"))),
  }
}
