//! Linux permission backend.
//!
//! Traditional Linux desktops have no runtime permission prompt. Location
//! access is mediated by GeoClue itself, which applies its own agent policy
//! when a client starts, so the permission is reported as granted.

use crate::{GrantResponder, Permission, PermissionBackend, PermissionStatus, UiContext};

#[derive(Debug)]
pub(super) struct SystemPermissions;

impl PermissionBackend for SystemPermissions {
    fn status(&self, _permission: Permission) -> PermissionStatus {
        PermissionStatus::Granted
    }

    fn request(&self, _permission: Permission, _ui: &UiContext, responder: GrantResponder) {
        // Sandboxed apps (Flatpak/Snap) go through the location portal instead
        responder.grant();
    }
}
