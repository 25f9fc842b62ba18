//! Platform-specific permission backends.

use std::sync::Arc;

use crate::PermissionBackend;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "linux")]
use linux::SystemPermissions;

/// Returns the permission backend for the current platform.
#[must_use]
pub fn system_backend() -> Arc<dyn PermissionBackend> {
    Arc::new(SystemPermissions)
}

// Fallback for platforms without a backend
#[cfg(not(target_os = "linux"))]
#[derive(Debug)]
struct SystemPermissions;

#[cfg(not(target_os = "linux"))]
impl PermissionBackend for SystemPermissions {
    fn status(&self, _permission: crate::Permission) -> crate::PermissionStatus {
        crate::PermissionStatus::NotDetermined
    }

    fn request(
        &self,
        _permission: crate::Permission,
        _ui: &crate::UiContext,
        responder: crate::GrantResponder,
    ) {
        responder.fail(&crate::PermissionError::NotSupported);
    }
}
