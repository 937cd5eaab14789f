//! Digest rendering.
//!
//! Turns an assembled [`Digest`] into concrete artifacts: styled HTML for
//! browsers, Markdown for notes, pretty-printed JSON as the canonical
//! machine-readable form, and a short plain-text variant used as an email
//! body. Rendering is pure; the same digest always produces byte-identical
//! content per format, and timestamps come from the digest itself rather than
//! the clock.

use super::*;

/// Output formats a digest can be rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
  /// Self-contained styled HTML page
  Html,
  /// Markdown document
  Markdown,
  /// Canonical machine-readable form, lossless round-trip
  Json,
  /// Short plain-text body for email delivery
  Email,
}

impl OutputFormat {
  /// File extension for artifacts of this format.
  pub fn extension(&self) -> &'static str {
    match self {
      OutputFormat::Html => "html",
      OutputFormat::Markdown => "md",
      OutputFormat::Json => "json",
      OutputFormat::Email => "txt",
    }
  }
}

impl Display for OutputFormat {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      OutputFormat::Html => write!(f, "html"),
      OutputFormat::Markdown => write!(f, "markdown"),
      OutputFormat::Json => write!(f, "json"),
      OutputFormat::Email => write!(f, "email"),
    }
  }
}

impl FromStr for OutputFormat {
  type Err = ScoutError;

  fn from_str(s: &str) -> Result<Self> {
    match s.to_lowercase().as_str() {
      "html" => Ok(OutputFormat::Html),
      "markdown" | "md" => Ok(OutputFormat::Markdown),
      "json" => Ok(OutputFormat::Json),
      "email" | "txt" | "text" => Ok(OutputFormat::Email),
      other => Err(ScoutError::Config(format!("unknown output format: {other}"))),
    }
  }
}

/// One rendered digest ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
  /// Format this artifact was rendered in
  pub format:   OutputFormat,
  /// Timestamped filename, e.g. `digest_20240510_093000.html`
  pub filename: String,
  /// Full rendered content
  pub content:  String,
}

/// Renders a digest into one format.
///
/// Filenames carry the digest's generation timestamp to the second; two
/// digests generated within the same second in the same directory would
/// collide, which is accepted since runs take minutes.
pub fn render(digest: &Digest, format: OutputFormat) -> Result<Artifact> {
  let filename =
    format!("digest_{}.{}", digest.generated_at.format("%Y%m%d_%H%M%S"), format.extension());
  let content = match format {
    OutputFormat::Html => render_html(digest),
    OutputFormat::Markdown => render_markdown(digest),
    OutputFormat::Json => serde_json::to_string_pretty(digest)
      .map_err(|e| ScoutError::Render { format: format.to_string(), reason: e.to_string() })?,
    OutputFormat::Email => render_email(digest),
  };
  Ok(Artifact { format, filename, content })
}

/// Label for a significance score, used by the human-readable formats.
fn significance_tier(score: f64) -> &'static str {
  if score >= HIGH_SIGNIFICANCE {
    "high"
  } else if score >= 0.4 {
    "medium"
  } else {
    "low"
  }
}

/// Renders the self-contained HTML page.
fn render_html(digest: &Digest) -> String {
  let mut out = String::new();
  out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
  out.push_str(&format!("<title>Research Digest ({})</title>\n", digest.kind));
  out.push_str(
    "<style>\n\
     body { font-family: sans-serif; max-width: 52rem; margin: 2rem auto; color: #222; }\n\
     .paper { border-left: 4px solid #ccc; padding: 0 1rem; margin: 1.5rem 0; }\n\
     .paper.high { border-color: #c0392b; }\n\
     .paper.medium { border-color: #e67e22; }\n\
     .meta { color: #666; font-size: 0.9rem; }\n\
     .tags span { background: #eee; border-radius: 3px; padding: 0.1rem 0.4rem; margin-right: 0.3rem; }\n\
     </style>\n</head>\n<body>\n",
  );
  out.push_str(&format!(
    "<h1>Research Digest</h1>\n<p class=\"meta\">{} digest generated {} UTC &middot; {} papers, {} \
     high significance, mean significance {:.2}</p>\n",
    digest.kind,
    digest.generated_at.format("%Y-%m-%d %H:%M"),
    digest.stats.analyzed,
    digest.stats.high_significance,
    digest.stats.mean_significance,
  ));

  if digest.papers.is_empty() {
    out.push_str("<p>No papers met the significance threshold for this period.</p>\n");
  }

  for entry in &digest.papers {
    let analysis = &entry.analysis;
    let paper = &entry.paper;
    out.push_str(&format!(
      "<div class=\"paper {}\">\n<h2><a href=\"{}\">{}</a></h2>\n",
      significance_tier(analysis.significance),
      escape_html(&paper.abstract_url),
      escape_html(&paper.title),
    ));
    out.push_str(&format!(
      "<p class=\"meta\">{} &middot; {} &middot; published {} &middot; significance {:.2}, \
       novelty {:.2}, difficulty {}</p>\n",
      escape_html(&author_line(paper)),
      escape_html(&paper.primary_category),
      paper.published.format("%Y-%m-%d"),
      analysis.significance,
      analysis.novelty,
      analysis.implementation_difficulty,
    ));
    out.push_str(&format!("<p>{}</p>\n", escape_html(&analysis.summary)));
    if !analysis.key_insights.is_empty() {
      out.push_str("<ul>\n");
      for insight in &analysis.key_insights {
        out.push_str(&format!("<li>{}</li>\n", escape_html(insight)));
      }
      out.push_str("</ul>\n");
    }
    if !analysis.business_relevance.is_empty() {
      out.push_str(&format!(
        "<p><strong>Business relevance:</strong> {}</p>\n",
        escape_html(&analysis.business_relevance)
      ));
    }
    if !analysis.tags.is_empty() {
      out.push_str("<p class=\"tags\">");
      for tag in &analysis.tags {
        out.push_str(&format!("<span>{}</span>", escape_html(tag)));
      }
      out.push_str("</p>\n");
    }
    out.push_str(&format!("<p class=\"meta\"><a href=\"{}\">PDF</a></p>\n", escape_html(&paper.pdf_url)));
    out.push_str("</div>\n");
  }

  out.push_str("</body>\n</html>\n");
  out
}

/// Renders the Markdown document.
fn render_markdown(digest: &Digest) -> String {
  let mut out = String::new();
  out.push_str(&format!("# Research Digest ({})\n\n", digest.kind));
  out.push_str(&format!(
    "Generated {} UTC. {} papers, {} high significance, mean significance {:.2}.\n\n",
    digest.generated_at.format("%Y-%m-%d %H:%M"),
    digest.stats.analyzed,
    digest.stats.high_significance,
    digest.stats.mean_significance,
  ));

  if digest.papers.is_empty() {
    out.push_str("No papers met the significance threshold for this period.\n");
    return out;
  }

  for entry in &digest.papers {
    let analysis = &entry.analysis;
    let paper = &entry.paper;
    out.push_str(&format!("## [{}]({})\n\n", paper.title, paper.abstract_url));
    out.push_str(&format!(
      "*{}* | {} | published {} | significance **{:.2}** ({}) | novelty {:.2} | difficulty {}\n\n",
      author_line(paper),
      paper.primary_category,
      paper.published.format("%Y-%m-%d"),
      analysis.significance,
      significance_tier(analysis.significance),
      analysis.novelty,
      analysis.implementation_difficulty,
    ));
    out.push_str(&format!("{}\n\n", analysis.summary));
    for insight in &analysis.key_insights {
      out.push_str(&format!("- {insight}\n"));
    }
    if !analysis.key_insights.is_empty() {
      out.push('\n');
    }
    if !analysis.business_relevance.is_empty() {
      out.push_str(&format!("**Business relevance:** {}\n\n", analysis.business_relevance));
    }
    if !analysis.tags.is_empty() {
      let tags: Vec<&str> = analysis.tags.iter().map(String::as_str).collect();
      out.push_str(&format!("Tags: {}\n\n", tags.join(", ")));
    }
    out.push_str(&format!("[PDF]({})\n\n", paper.pdf_url));
  }
  out
}

/// Number of papers included in the short email body.
const EMAIL_TOP_N: usize = 5;

/// Renders the short plain-text email body.
///
/// Papers are already in display order, so the first entries are the most
/// significant ones.
fn render_email(digest: &Digest) -> String {
  let mut out = String::new();
  out.push_str(&format!(
    "Research Digest ({}) - {} UTC\n{} papers analyzed, {} high significance.\n\n",
    digest.kind,
    digest.generated_at.format("%Y-%m-%d %H:%M"),
    digest.stats.analyzed,
    digest.stats.high_significance,
  ));

  if digest.papers.is_empty() {
    out.push_str("No papers met the significance threshold for this period.\n");
    return out;
  }

  for (i, entry) in digest.papers.iter().take(EMAIL_TOP_N).enumerate() {
    out.push_str(&format!(
      "{}. {} (significance {:.2})\n   {}\n   {}\n\n",
      i + 1,
      entry.paper.title,
      entry.analysis.significance,
      entry.analysis.summary,
      entry.paper.abstract_url,
    ));
  }

  if digest.papers.len() > EMAIL_TOP_N {
    out.push_str(&format!("...and {} more in the full digest.\n", digest.papers.len() - EMAIL_TOP_N));
  }
  out
}

/// "First Author et al." or the single author's name.
fn author_line(paper: &Paper) -> String {
  match paper.authors.as_slice() {
    [] => "Unknown authors".to_string(),
    [only] => only.name.clone(),
    [first, ..] => format!("{} et al.", first.name),
  }
}

/// Minimal HTML escaping for text interpolated into the page.
fn escape_html(text: &str) -> String {
  text
    .replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
    .replace('"', "&quot;")
}
