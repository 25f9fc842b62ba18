//! Permission-gated location tracking.
//!
//! [`LocationCoordinator`] sequences the manifest check, the runtime grant
//! and the location provider, and relays every fix or failure to a single
//! [`LocationListener`].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use trackkit_location::{LocationContext, LocationCoordinator};
//! use trackkit_permission::{Permission, StaticManifest};
//!
//! let manifest = Arc::new(StaticManifest::new([Permission::FineLocation]));
//! let mut coordinator = LocationCoordinator::builder()
//!     .set_update_interval(10_000)
//!     .set_fastest_interval(5_000)
//!     .build(LocationContext::system(manifest));
//!
//! coordinator.start_location_updates(None)?;
//! loop {
//!     coordinator.dispatch_pending();
//! #   break;
//! }
//! # Ok::<(), trackkit_location::LocationError>(())
//! ```

#![warn(missing_docs)]

mod config;
mod coordinator;
mod event;
mod provider;
mod sys;

pub use config::{AcquisitionConfig, CoordinatorBuilder, Priority};
pub use coordinator::{
    CoordinatorState, LocationContext, LocationCoordinator, LocationListener, REQUIRED_PERMISSION,
};
pub use provider::{FixSink, LastKnownReply, LocationProvider, ProviderKind, SubscriptionId};
pub use sys::system_provider;

pub use trackkit_permission::{Permission, PermissionError, PermissionState, UiContext};

use serde::{Deserialize, Serialize};

/// A single reported geographic position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,
    /// Timestamp as Unix epoch milliseconds.
    pub timestamp: u64,
    /// Horizontal accuracy in meters, if available.
    pub accuracy: Option<f64>,
    /// Altitude in meters above sea level, if available.
    pub altitude: Option<f64>,
}

impl LocationFix {
    /// Creates a fix without accuracy or altitude.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64, timestamp: u64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
            accuracy: None,
            altitude: None,
        }
    }

    /// Sets the horizontal accuracy.
    #[must_use]
    pub const fn with_accuracy(mut self, meters: f64) -> Self {
        self.accuracy = Some(meters);
        self
    }

    /// Sets the altitude.
    #[must_use]
    pub const fn with_altitude(mut self, meters: f64) -> Self {
        self.altitude = Some(meters);
        self
    }
}

/// Failures reported by a location provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The device's location settings cannot satisfy the request.
    #[error("location settings unsatisfied: {0}")]
    SettingsUnsatisfied(String),
    /// No location provider is available.
    #[error("location provider unavailable")]
    Unavailable,
    /// The provider has no cached location to report.
    #[error("no cached location available")]
    NoCachedFix,
    /// Querying the provider failed.
    #[error("location query failed: {0}")]
    QueryFailed(String),
}

/// Errors that can occur when acquiring a location.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    /// The required permission is not declared in the manifest.
    ///
    /// Returned to the caller; never sent to the listener.
    #[error("manifest permission missing: {0} must be declared to use location services")]
    ManifestPermissionMissing(Permission),
    /// The user denied the permission, or no dialog could be shown.
    #[error("location services won't work if location permissions are denied; {0} is required")]
    PermissionDenied(Permission),
    /// The permission system failed in another way.
    #[error(transparent)]
    Permission(PermissionError),
    /// The location provider failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// A configuration description could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<PermissionError> for LocationError {
    fn from(err: PermissionError) -> Self {
        match err {
            PermissionError::ManifestPermissionMissing(permission) => {
                Self::ManifestPermissionMissing(permission)
            }
            other => Self::Permission(other),
        }
    }
}

/// Result type for location operations.
pub type LocationResult<T> = Result<T, LocationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_error_converts_to_its_own_variant() {
        let err = LocationError::from(PermissionError::ManifestPermissionMissing(
            Permission::FineLocation,
        ));
        assert_eq!(
            err,
            LocationError::ManifestPermissionMissing(Permission::FineLocation)
        );

        let err = LocationError::from(PermissionError::NotSupported);
        assert_eq!(err, LocationError::Permission(PermissionError::NotSupported));
    }

    #[test]
    fn fix_builder_sets_optional_fields() {
        let fix = LocationFix::new(1.0, 2.0, 3)
            .with_accuracy(4.5)
            .with_altitude(120.0);
        assert_eq!(fix.accuracy, Some(4.5));
        assert_eq!(fix.altitude, Some(120.0));
        assert_eq!(fix.timestamp, 3);
    }
}
