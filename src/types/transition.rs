use super::{Endpoint, Status, StatusRecord};
use crate::error::{AppError, ErrorReason};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

const FIELD_SEPARATOR: &str = " | ";
const REASON_PREFIX: &str = "Reason: ";

/// One line of the transition log:
/// `<timestamp> | <STATUS> | <endpoint> | Reason: <detail-or-OK>`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransitionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub endpoint: Endpoint,
    pub status: Status,
    pub reason: String,
}

impl TransitionLogEntry {
    pub fn new(timestamp: DateTime<Utc>, endpoint: Endpoint, record: &StatusRecord) -> Self {
        // A line break inside the reason would split the entry in two.
        let reason = match &record.detail {
            Some(detail) => detail.replace(['\r', '\n'], " "),
            None => "OK".to_owned(),
        };

        Self {
            timestamp,
            endpoint,
            status: record.status,
            reason,
        }
    }
}

impl Display for TransitionLogEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}{}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.status,
            self.endpoint,
            REASON_PREFIX,
            self.reason,
            sep = FIELD_SEPARATOR,
        )
    }
}

impl FromStr for TransitionLogEntry {
    type Err = AppError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = line.trim_end().splitn(4, FIELD_SEPARATOR);
        let (Some(timestamp), Some(status), Some(endpoint), Some(reason)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(ErrorReason::InvalidLogLine.into());
        };

        let timestamp = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|_| ErrorReason::InvalidLogLine)?
            .with_timezone(&Utc);
        let reason = reason
            .strip_prefix(REASON_PREFIX)
            .ok_or(ErrorReason::InvalidLogLine)?;

        Ok(Self {
            timestamp,
            endpoint: Endpoint::new(endpoint),
            status: status.parse()?,
            reason: reason.to_owned(),
        })
    }
}
