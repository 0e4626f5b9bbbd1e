use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Unified error type for the crate.
///
/// Low-level failures are aggregated into the categories the batch machinery
/// actually branches on: transient request failures (retried), exhausted
/// retry budgets (scoped to one work item), checkpoint I/O (fatal to the
/// item on append, fatal to the run on load), and configuration errors
/// (rejected before any dispatch).
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A single attempt exceeded its deadline.
    #[error("attempt timed out after {after:?}")]
    Timeout { after: Duration },

    /// The HTTP exchange succeeded but the body carries an error envelope
    /// instead of a completion.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    /// The endpoint answered with a non-success status.
    #[error("endpoint returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// All allowed attempts for one work item failed.
    #[error("retries exhausted after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: Box<Error> },

    #[error("checkpoint I/O error at {path}: {source}")]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration {
            message: msg.into(),
        }
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Error::InvalidResponse {
            message: msg.into(),
        }
    }

    pub(crate) fn checkpoint(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Checkpoint {
            path: path.into(),
            source,
        }
    }

    /// Whether a failed attempt with this error may be retried.
    ///
    /// Transport faults, timeouts, non-success statuses and error envelopes
    /// are all transient from the retry unit's point of view; everything
    /// else fails the attempt loop immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Transport(_)
                | Error::Timeout { .. }
                | Error::InvalidResponse { .. }
                | Error::Status { .. }
                | Error::Serialization(_)
        )
    }
}
