//! Delivery sinks for rendered artifacts.
//!
//! A [`DeliverySink`] receives finished [`Artifact`]s and pushes them to one
//! destination: the local filesystem, a chat webhook, or email over SMTP.
//! Sinks declare which formats they want so the pipeline renders each format
//! once and fans it out. Sink failures are reported to the caller but never
//! abort the run; the digest files on disk remain the source of truth.

use lettre::{
  message::header::ContentType,
  transport::smtp::authentication::Credentials,
  AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use super::*;

/// One delivery destination.
#[async_trait]
pub trait DeliverySink: Send + Sync {
  /// Short name used in logs and warnings.
  fn name(&self) -> &str;

  /// Whether this sink wants artifacts of the given format.
  fn wants(&self, format: OutputFormat) -> bool;

  /// Delivers one artifact.
  async fn deliver(&self, artifact: &Artifact) -> Result<()>;
}

/// Writes artifacts into the configured output directory.
pub struct FileSink {
  /// Directory digest files are written into, created on demand
  dir: PathBuf,
}

impl FileSink {
  /// Creates a sink writing into `dir`.
  pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }
}

#[async_trait]
impl DeliverySink for FileSink {
  fn name(&self) -> &str { "file" }

  // The email body is a delivery payload, not a digest file.
  fn wants(&self, format: OutputFormat) -> bool { format != OutputFormat::Email }

  async fn deliver(&self, artifact: &Artifact) -> Result<()> {
    tokio::fs::create_dir_all(&self.dir).await?;
    let path = self.dir.join(&artifact.filename);
    tokio::fs::write(&path, &artifact.content).await?;
    info!("wrote {}", path.display());
    Ok(())
  }
}

/// Webhook payloads are truncated to stay under chat message size limits.
const WEBHOOK_MAX_CHARS: usize = 1900;

/// Posts the short text digest to a chat webhook (Discord-compatible).
pub struct WebhookSink {
  /// Webhook endpoint
  url:    Url,
  /// Shared HTTP client
  client: reqwest::Client,
}

/// JSON body accepted by Discord-style webhooks.
#[derive(Serialize)]
struct WebhookPayload<'a> {
  /// Message text
  content:  &'a str,
  /// Display name for the post
  username: &'a str,
}

impl WebhookSink {
  /// Creates a sink posting to `url`.
  pub fn new(url: &str) -> Result<Self> {
    let url = Url::parse(url).map_err(|e| ScoutError::Config(format!("invalid webhook URL: {e}")))?;
    Ok(Self { url, client: reqwest::Client::new() })
  }

  /// Truncates `text` on a character boundary and marks the cut.
  fn truncate(text: &str) -> String {
    if text.chars().count() <= WEBHOOK_MAX_CHARS {
      return text.to_string();
    }
    let mut cut: String = text.chars().take(WEBHOOK_MAX_CHARS - 20).collect();
    cut.push_str("\n...(truncated)");
    cut
  }
}

#[async_trait]
impl DeliverySink for WebhookSink {
  fn name(&self) -> &str { "webhook" }

  fn wants(&self, format: OutputFormat) -> bool { format == OutputFormat::Email }

  async fn deliver(&self, artifact: &Artifact) -> Result<()> {
    let content = Self::truncate(&artifact.content);
    let payload = WebhookPayload { content: &content, username: "scout" };
    let response = self.client.post(self.url.clone()).json(&payload).send().await?;
    response
      .error_for_status()
      .map_err(|e| ScoutError::Delivery { sink: "webhook".into(), reason: e.to_string() })?;
    debug!("posted digest to webhook");
    Ok(())
  }
}

/// Capability boundary for outbound mail, so tests never open sockets.
#[async_trait]
pub trait MailTransport: Send + Sync {
  /// Sends one plain-text message.
  async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// [`MailTransport`] over SMTP with STARTTLS.
pub struct SmtpMailer {
  /// Prebuilt transport
  transport:    AsyncSmtpTransport<Tokio1Executor>,
  /// Sender address placed in the From header
  from_address: String,
}

impl SmtpMailer {
  /// Creates a mailer for the given SMTP relay.
  pub fn new(
    host: &str,
    port: u16,
    username: &str,
    password: &str,
    from_address: &str,
  ) -> Result<Self> {
    let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
      .map_err(|e| ScoutError::Delivery { sink: "email".into(), reason: e.to_string() })?
      .port(port)
      .credentials(Credentials::new(username.to_string(), password.to_string()))
      .build();
    Ok(Self { transport, from_address: from_address.to_string() })
  }
}

#[async_trait]
impl MailTransport for SmtpMailer {
  async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
    let delivery_err =
      |reason: String| ScoutError::Delivery { sink: "email".into(), reason };

    let message = Message::builder()
      .from(self.from_address.parse().map_err(|e| delivery_err(format!("from address: {e}")))?)
      .to(to.parse().map_err(|e| delivery_err(format!("recipient {to}: {e}")))?)
      .subject(subject)
      .header(ContentType::TEXT_PLAIN)
      .body(body.to_string())
      .map_err(|e| delivery_err(e.to_string()))?;

    self.transport.send(message).await.map_err(|e| delivery_err(e.to_string()))?;
    Ok(())
  }
}

/// Emails the short text digest to the configured recipients.
pub struct EmailSink {
  /// Mail capability, SMTP in production
  transport:        Arc<dyn MailTransport>,
  /// Recipient addresses
  recipients:       Vec<String>,
  /// Subject line; `{date}` expands to the delivery date
  subject_template: String,
}

impl EmailSink {
  /// Creates a sink sending through `transport`.
  pub fn new(
    transport: Arc<dyn MailTransport>,
    recipients: Vec<String>,
    subject_template: String,
  ) -> Self {
    Self { transport, recipients, subject_template }
  }
}

#[async_trait]
impl DeliverySink for EmailSink {
  fn name(&self) -> &str { "email" }

  fn wants(&self, format: OutputFormat) -> bool { format == OutputFormat::Email }

  /// Attempts every recipient even when earlier ones fail, then reports the
  /// failed addresses together.
  async fn deliver(&self, artifact: &Artifact) -> Result<()> {
    let subject =
      self.subject_template.replace("{date}", &Utc::now().format("%Y-%m-%d").to_string());

    let mut failed = Vec::new();
    for recipient in &self.recipients {
      if let Err(e) = self.transport.send(recipient, &subject, &artifact.content).await {
        warn!("email to {recipient} failed: {e}");
        failed.push(recipient.clone());
      }
    }

    if failed.is_empty() {
      Ok(())
    } else {
      Err(ScoutError::Delivery {
        sink:   "email".into(),
        reason: format!("failed recipients: {}", failed.join(", ")),
      })
    }
  }
}
