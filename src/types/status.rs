use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use crate::error::{AppError, ErrorReason};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Down,
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Status::Ok => f.write_str("OK"),
            Status::Down => f.write_str("DOWN"),
        }
    }
}

impl FromStr for Status {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("ok") {
            Ok(Status::Ok)
        } else if s.eq_ignore_ascii_case("down") {
            Ok(Status::Down)
        } else {
            Err(ErrorReason::InvalidLogLine.into())
        }
    }
}

/// The latest known state of one endpoint.
///
/// Serialized as `{"status": "ok", "error": "...", "lastChecked": "..."}` so existing status files
/// keep loading.
#[skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: Status,
    #[serde(default, rename = "error", alias = "detail")]
    pub detail: Option<String>,
    #[serde(rename = "lastChecked")]
    pub last_checked_at: DateTime<Utc>,
}

impl StatusRecord {
    pub fn is_down(&self) -> bool {
        self.status == Status::Down
    }
}

/// Classified result of a single probe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status: Status,
    pub detail: Option<String>,
}

impl ProbeOutcome {
    pub fn ok() -> Self {
        Self {
            status: Status::Ok,
            detail: None,
        }
    }

    pub fn down(detail: impl Into<String>) -> Self {
        Self {
            status: Status::Down,
            detail: Some(detail.into()),
        }
    }

    pub fn timed_out() -> Self {
        Self::down("timed out")
    }

    /// Classify a received HTTP response status.
    ///
    /// 4xx still means the endpoint is up and answering, only 5xx counts as an outage.
    pub fn from_status_code(code: u16) -> Self {
        match code {
            0..=399 => Self::ok(),
            400..=499 => Self {
                status: Status::Ok,
                detail: Some(format!("client error {}", code)),
            },
            _ => Self::down(format!("server error {}", code)),
        }
    }

    pub fn into_record(self, checked_at: DateTime<Utc>) -> StatusRecord {
        StatusRecord {
            status: self.status,
            detail: self.detail,
            last_checked_at: checked_at,
        }
    }
}
