#[cfg(feature = "backtrace")]
use backtrace::Backtrace;
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    reason: ErrorReason,
    #[cfg(feature = "backtrace")]
    bt: Backtrace,
}

impl AppError {
    pub(crate) fn new(reason: ErrorReason) -> Self {
        Self {
            reason,
            #[cfg(feature = "backtrace")]
            bt: Backtrace::new(),
        }
    }

    #[cfg(test)]
    pub fn reason(&self) -> &ErrorReason {
        &self.reason
    }
}

impl<E> From<E> for AppError
where
    E: Into<ErrorReason>,
{
    fn from(reason: E) -> Self {
        Self::new(reason.into())
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", &self.reason)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.reason.source()
    }
}

/// Transport-level variants print the underlying message verbatim, since that text becomes the
/// `detail` of a DOWN record.
#[derive(Debug, Error)]
pub enum ErrorReason {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Resolver(#[from] hickory_resolver::error::ResolveError),
    #[error("{0}")]
    Http(#[from] hyper::Error),
    #[error("failed to build the request: {0}")]
    Request(#[from] http::Error),
    #[error("invalid URL: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("no address found for {0}")]
    NoAddress(String),
    #[error("unexpected response status {0}")]
    UnexpectedStatus(http::StatusCode),
    #[error("timed out")]
    Timeout,
    #[error("malformed transition log line")]
    InvalidLogLine,
}
