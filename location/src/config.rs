use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{LocationContext, LocationCoordinator, LocationError};

const DEFAULT_UPDATE_INTERVAL_MS: u64 = 15 * 1000;
const DEFAULT_FASTEST_INTERVAL_MS: u64 = 10 * 1000;

/// Trade-off between accuracy and power use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    /// Most accurate fixes available, typically GPS.
    #[default]
    HighAccuracy,
    /// Block-level accuracy.
    Balanced,
    /// City-level accuracy.
    LowPower,
    /// Only fixes computed for other clients.
    Passive,
}

/// Immutable acquisition settings handed to the location provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AcquisitionConfig {
    update_interval_ms: u64,
    fastest_interval_ms: u64,
    use_dedicated_dispatch_loop: bool,
    priority: Priority,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            fastest_interval_ms: DEFAULT_FASTEST_INTERVAL_MS,
            use_dedicated_dispatch_loop: false,
            priority: Priority::HighAccuracy,
        }
    }
}

impl AcquisitionConfig {
    /// Parses a configuration from JSON; missing fields take their defaults.
    ///
    /// ```
    /// use trackkit_location::{AcquisitionConfig, Priority};
    ///
    /// let json = r#"{"updateIntervalMs": 2000, "priority": "balanced"}"#;
    /// let config = AcquisitionConfig::from_json(json)?;
    /// assert_eq!(config.update_interval_ms(), 2000);
    /// assert_eq!(config.fastest_interval_ms(), 10_000);
    /// assert_eq!(config.priority(), Priority::Balanced);
    /// # Ok::<(), trackkit_location::LocationError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::InvalidConfig`] if `json` is malformed.
    pub fn from_json(json: &str) -> Result<Self, LocationError> {
        serde_json::from_str(json).map_err(|e| LocationError::InvalidConfig(e.to_string()))
    }

    /// Desired interval between fixes, in milliseconds.
    #[must_use]
    pub const fn update_interval_ms(&self) -> u64 {
        self.update_interval_ms
    }

    /// Fastest rate at which fixes are accepted, in milliseconds.
    #[must_use]
    pub const fn fastest_interval_ms(&self) -> u64 {
        self.fastest_interval_ms
    }

    /// Desired interval between fixes.
    #[must_use]
    pub const fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    /// Fastest rate at which fixes are accepted.
    #[must_use]
    pub const fn fastest_interval(&self) -> Duration {
        Duration::from_millis(self.fastest_interval_ms)
    }

    /// Whether fixes should be delivered from a loop dedicated to this subscription.
    #[must_use]
    pub const fn use_dedicated_dispatch_loop(&self) -> bool {
        self.use_dedicated_dispatch_loop
    }

    /// Accuracy/power trade-off.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }
}

/// Fluent builder for a [`LocationCoordinator`].
///
/// Each builder is consumed by `build`, so every coordinator gets its own
/// configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinatorBuilder {
    config: AcquisitionConfig,
}

impl CoordinatorBuilder {
    /// Starts from an existing configuration.
    #[must_use]
    pub const fn from_config(config: AcquisitionConfig) -> Self {
        Self { config }
    }

    /// Sets the desired interval between fixes.
    #[must_use]
    pub const fn set_update_interval(mut self, milliseconds: u64) -> Self {
        self.config.update_interval_ms = milliseconds;
        self
    }

    /// Sets the fastest rate at which fixes are accepted.
    #[must_use]
    pub const fn set_fastest_interval(mut self, milliseconds: u64) -> Self {
        self.config.fastest_interval_ms = milliseconds;
        self
    }

    /// Asks the provider to deliver fixes from a dedicated loop.
    #[must_use]
    pub const fn use_looper(mut self, use_looper: bool) -> Self {
        self.config.use_dedicated_dispatch_loop = use_looper;
        self
    }

    /// Sets the accuracy/power trade-off.
    #[must_use]
    pub const fn set_priority(mut self, priority: Priority) -> Self {
        self.config.priority = priority;
        self
    }

    /// The configuration built so far.
    #[must_use]
    pub const fn config(&self) -> AcquisitionConfig {
        self.config
    }

    /// Creates a coordinator over `context`'s collaborators.
    #[must_use]
    pub fn build(self, context: LocationContext) -> LocationCoordinator {
        let config = self.config;
        if config.fastest_interval_ms > config.update_interval_ms {
            debug!(
                "fastest interval {}ms exceeds update interval {}ms",
                config.fastest_interval_ms, config.update_interval_ms
            );
        }
        LocationCoordinator::new(config, context)
    }
}
