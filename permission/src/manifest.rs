use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Permission, PermissionError};

/// Read-only view of the permissions an application declares statically.
pub trait ManifestInspector: Send + Sync + fmt::Debug {
    /// Whether `permission` is declared.
    fn has_declared_permission(&self, permission: Permission) -> bool;
}

/// A manifest with a fixed set of declared permission ids.
///
/// Ids are kept as strings so manifests listing permissions unrelated to
/// location still load.
///
/// ```
/// use trackkit_permission::{ManifestInspector, Permission, StaticManifest};
///
/// let json = r#"{
///     "permissions": ["android.permission.ACCESS_FINE_LOCATION", "android.permission.INTERNET"]
/// }"#;
/// let manifest = StaticManifest::from_json(json).unwrap();
/// assert!(manifest.has_declared_permission(Permission::FineLocation));
/// assert!(!manifest.has_declared_permission(Permission::CoarseLocation));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticManifest {
    #[serde(default)]
    permissions: BTreeSet<String>,
}

impl StaticManifest {
    /// Creates a manifest declaring `permissions`.
    pub fn new(permissions: impl IntoIterator<Item = Permission>) -> Self {
        permissions.into_iter().collect()
    }

    /// Parses a manifest from its JSON description.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError::InvalidManifest`] if `json` is malformed.
    pub fn from_json(json: &str) -> Result<Self, PermissionError> {
        serde_json::from_str(json).map_err(|e| PermissionError::InvalidManifest(e.to_string()))
    }

    /// Adds a declaration.
    #[must_use]
    pub fn declare(mut self, permission: Permission) -> Self {
        self.permissions.insert(permission.id().to_owned());
        self
    }

    /// Declared permission ids, in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.permissions.iter().map(String::as_str)
    }
}

impl FromIterator<Permission> for StaticManifest {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self {
            permissions: iter.into_iter().map(|p| p.id().to_owned()).collect(),
        }
    }
}

impl ManifestInspector for StaticManifest {
    fn has_declared_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(permission.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_permissions_are_found() {
        let manifest = StaticManifest::default().declare(Permission::CoarseLocation);
        assert!(manifest.has_declared_permission(Permission::CoarseLocation));
        assert!(!manifest.has_declared_permission(Permission::FineLocation));
    }

    #[test]
    fn empty_json_object_declares_nothing() {
        let manifest = StaticManifest::from_json("{}").unwrap();
        assert_eq!(manifest.ids().count(), 0);
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = StaticManifest::from_json("{\"permissions\": 3}").unwrap_err();
        assert!(matches!(err, PermissionError::InvalidManifest(_)));
    }
}
