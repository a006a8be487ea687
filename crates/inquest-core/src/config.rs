//! Configuration for the session engine.
//!
//! Polling cadence and the flow descriptor catalog come from static
//! configuration; both can be overridden per deployment through
//! environment variables.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::records::FlowDescriptor;
use crate::error::EngineError;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between flow list and scheduled-flow list refreshes
    #[serde(default = "default_flow_list_poll_ms")]
    pub flow_list_poll_interval_ms: u64,

    /// Interval between result fetches for one query
    #[serde(default = "default_flow_results_poll_ms")]
    pub flow_results_poll_interval_ms: u64,

    /// Flow descriptors keyed by canonical flow name
    #[serde(default)]
    pub flow_descriptors: HashMap<String, FlowDescriptor>,
}

fn default_flow_list_poll_ms() -> u64 {
    5000
}

fn default_flow_results_poll_ms() -> u64 {
    3000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flow_list_poll_interval_ms: default_flow_list_poll_ms(),
            flow_results_poll_interval_ms: default_flow_results_poll_ms(),
            flow_descriptors: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables over the defaults.
    pub fn load() -> Result<Self, EngineError> {
        let mut config = Self::default();

        if let Ok(value) = env::var("INQUEST_FLOW_LIST_POLL_MS") {
            if let Ok(ms) = value.parse::<u64>() {
                config.flow_list_poll_interval_ms = ms;
            } else {
                warn!("Invalid INQUEST_FLOW_LIST_POLL_MS value: {}", value);
            }
        }

        if let Ok(value) = env::var("INQUEST_FLOW_RESULTS_POLL_MS") {
            if let Ok(ms) = value.parse::<u64>() {
                config.flow_results_poll_interval_ms = ms;
            } else {
                warn!("Invalid INQUEST_FLOW_RESULTS_POLL_MS value: {}", value);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Replace the descriptor catalog, keyed by each descriptor's name.
    #[must_use]
    pub fn with_descriptors(mut self, descriptors: Vec<FlowDescriptor>) -> Self {
        self.flow_descriptors = descriptors
            .into_iter()
            .map(|descriptor| (descriptor.name.clone(), descriptor))
            .collect();
        self
    }

    /// Look up a flow descriptor by canonical name.
    pub fn descriptor(&self, name: &str) -> Option<&FlowDescriptor> {
        self.flow_descriptors.get(name)
    }

    /// Flow list polling interval as a [`Duration`].
    pub fn flow_list_poll_interval(&self) -> Duration {
        Duration::from_millis(self.flow_list_poll_interval_ms)
    }

    /// Result polling interval as a [`Duration`].
    pub fn flow_results_poll_interval(&self) -> Duration {
        Duration::from_millis(self.flow_results_poll_interval_ms)
    }

    /// Check invariants the engine relies on.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.flow_list_poll_interval_ms == 0 {
            return Err(EngineError::Configuration(
                "flow_list_poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.flow_results_poll_interval_ms == 0 {
            return Err(EngineError::Configuration(
                "flow_results_poll_interval_ms must be positive".to_string(),
            ));
        }
        for (name, descriptor) in &self.flow_descriptors {
            if name != &descriptor.name {
                return Err(EngineError::Configuration(format!(
                    "descriptor catalog key {} does not match descriptor name {}",
                    name, descriptor.name
                )));
            }
        }
        Ok(())
    }
}
