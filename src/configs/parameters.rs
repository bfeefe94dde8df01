use super::GlobalConfig;
use crate::types::Endpoint;
use std::{collections::HashSet, time::Duration};

/// Resolved inputs of the sweep loop.
#[derive(Clone, Debug)]
pub struct SweepParameters {
    /// Probe order of a sweep; unique, non-empty URLs in configured order.
    pub endpoints: Vec<Endpoint>,
    pub timeout: Duration,
    pub interval: Duration,
}

impl SweepParameters {
    pub fn from_config(config: &GlobalConfig) -> Self {
        let mut seen = HashSet::new();
        let mut endpoints = Vec::with_capacity(config.targets.len());

        for target in &config.targets {
            let endpoint = Endpoint::new(target.as_str());
            if endpoint.is_empty() {
                continue;
            }
            if !seen.insert(endpoint.clone()) {
                warn!("Ignoring duplicated target: {}", endpoint);
                continue;
            }
            endpoints.push(endpoint);
        }

        if endpoints.is_empty() {
            warn!("No targets configured, every sweep will be a no-op");
        }

        Self {
            endpoints,
            timeout: config.timeout,
            interval: config.effective_interval(),
        }
    }
}
