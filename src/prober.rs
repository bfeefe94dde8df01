use crate::{
    error::AppResult,
    http_client::HttpClient,
    types::{Endpoint, ProbeOutcome},
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::timeout;

/// A single bounded reachability check.
///
/// Implementations never fail: every problem is folded into a DOWN [`ProbeOutcome`].
#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self, endpoint: &Endpoint, limit: Duration) -> ProbeOutcome;
}

/// Probes an endpoint with one HTTP(S) GET.
#[derive(Clone)]
pub struct HttpProber {
    client: HttpClient,
}

impl HttpProber {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    async fn fetch_status(&self, endpoint: &Endpoint) -> AppResult<u16> {
        let uri = endpoint.to_uri()?;
        let response = self.client.get(&uri).await?;
        Ok(response.status().as_u16())
    }
}

#[async_trait]
impl Probe for HttpProber {
    async fn check(&self, endpoint: &Endpoint, limit: Duration) -> ProbeOutcome {
        let outcome = match timeout(limit, self.fetch_status(endpoint)).await {
            Ok(Ok(code)) => ProbeOutcome::from_status_code(code),
            Ok(Err(e)) => ProbeOutcome::down(e.to_string()),
            Err(_elapsed) => ProbeOutcome::timed_out(),
        };
        trace!("prober.check({}) = {:?}", endpoint, &outcome);
        outcome
    }
}
