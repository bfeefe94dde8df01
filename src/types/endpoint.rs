use crate::error::{AppResult, ErrorReason};
use http::Uri;
use serde::{Deserialize, Serialize};
use std::{
    convert::Infallible,
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

/// A monitored target, identified by its URL.
///
/// The URL is kept as configured; it is only parsed when a probe needs to connect, so a malformed
/// URL surfaces as a DOWN record rather than a startup failure.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let trimmed = url.trim();
        if trimmed.len() == url.len() {
            Self(url)
        } else {
            Self(trimmed.to_owned())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_uri(&self) -> AppResult<Uri> {
        let uri: Uri = self.as_str().parse()?;
        match uri.scheme_str() {
            Some("http") | Some("https") => {}
            Some(other) => {
                return Err(
                    ErrorReason::InvalidEndpoint(format!("unsupported scheme `{}`", other)).into(),
                )
            }
            None => return Err(ErrorReason::InvalidEndpoint("missing scheme".to_owned()).into()),
        }
        if uri.host().is_none() {
            return Err(ErrorReason::InvalidEndpoint("missing host".to_owned()).into());
        }
        Ok(uri)
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Endpoint {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
