//! Manifest-aware runtime permission handling.
//!
//! A permission is usable only when it is both declared in the application's
//! static manifest and granted at runtime. [`PermissionGate`] combines the two
//! facts and drives the platform's grant dialog through a
//! [`PermissionBackend`], reporting the outcome to a [`GrantObserver`].

#![warn(missing_docs)]

mod gate;
mod manifest;
mod sys;

use std::fmt;

pub use gate::{GrantObserver, GrantResponder, PermissionBackend, PermissionGate, UiContext};
pub use manifest::{ManifestInspector, StaticManifest};
pub use sys::system_backend;

/// Permissions that can be declared and requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub enum Permission {
    /// Precise location, backed by GPS.
    FineLocation,
    /// Approximate location, backed by network positioning.
    CoarseLocation,
}

impl Permission {
    /// Identifier used for this permission in application manifests.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::FineLocation => "android.permission.ACCESS_FINE_LOCATION",
            Self::CoarseLocation => "android.permission.ACCESS_COARSE_LOCATION",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Runtime status of a permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionStatus {
    /// Permission has been granted by the user.
    Granted,
    /// Permission has been denied by the user.
    Denied,
    /// Permission is restricted (e.g., parental controls).
    Restricted,
    /// Permission has not been requested yet.
    NotDetermined,
}

/// Combined manifest and runtime view of a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionState {
    /// The permission is not declared, so its runtime state is irrelevant.
    Unknown,
    /// Declared but not yet granted.
    DeclaredNotGranted,
    /// Declared and granted.
    Granted,
    /// Declared, but denied or restricted at runtime.
    Denied,
}

impl PermissionState {
    /// Derives the state from a manifest declaration and a runtime status.
    #[must_use]
    pub const fn derive(declared: bool, status: PermissionStatus) -> Self {
        if !declared {
            return Self::Unknown;
        }
        match status {
            PermissionStatus::Granted => Self::Granted,
            PermissionStatus::Denied | PermissionStatus::Restricted => Self::Denied,
            PermissionStatus::NotDetermined => Self::DeclaredNotGranted,
        }
    }
}

/// Errors that can occur when requesting permissions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermissionError {
    /// The permission is not declared in the manifest; no grant can satisfy it.
    #[error("manifest permission missing: {0} must be declared to use this feature")]
    ManifestPermissionMissing(Permission),
    /// The permission type is not supported on this platform.
    #[error("permission not supported on this platform")]
    NotSupported,
    /// The platform reported a failure.
    #[error("platform error: {0}")]
    Platform(String),
    /// A manifest description could not be parsed.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),
}
