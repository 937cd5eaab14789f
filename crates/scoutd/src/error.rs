//! Error types for the scout CLI.

use thiserror::Error;

/// Error type alias used for the CLI.
pub type Result<T> = core::result::Result<T, ScoutdError>;

/// Errors that can occur while running CLI commands.
#[derive(Error, Debug)]
pub enum ScoutdError {
  /// An error bubbled up from the `scout` library.
  #[error(transparent)]
  Scout(#[from] scout::error::ScoutError),

  /// A filesystem operation failed.
  #[error(transparent)]
  Io(#[from] std::io::Error),

  /// A scheduled or one-shot run finished without producing a digest.
  #[error("run failed: {0}")]
  RunFailed(String),
}
