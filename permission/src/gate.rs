use std::any::Any;
use std::fmt;
use std::sync::Arc;

use log::{debug, error, warn};

use crate::{ManifestInspector, Permission, PermissionError, PermissionState, PermissionStatus};

/// Receives the outcome of a grant request.
///
/// Exactly one of the two methods is called per answered request, from
/// whichever thread the platform answers on.
pub trait GrantObserver: Send + Sync {
    /// The user granted `permission`.
    fn on_granted(&self, permission: Permission);
    /// The user denied `permission`, or no dialog could be shown.
    fn on_denied(&self, permission: Permission);
}

/// Platform side of the runtime permission system.
pub trait PermissionBackend: Send + Sync + fmt::Debug {
    /// Current OS-level status of `permission`.
    fn status(&self, permission: Permission) -> PermissionStatus;

    /// Shows the platform's permission dialog bound to `ui`.
    ///
    /// The backend answers through `responder` once the user has decided.
    /// Dropping the responder without answering reports a denial.
    fn request(&self, permission: Permission, ui: &UiContext, responder: GrantResponder);
}

/// Opaque handle to the UI surface a permission dialog is attached to.
///
/// Backends downcast it to their concrete type (an activity, a window, ...).
#[derive(Clone)]
pub struct UiContext {
    inner: Arc<dyn Any + Send + Sync>,
}

impl UiContext {
    /// Wraps a platform UI handle.
    pub fn new<T: Any + Send + Sync>(handle: T) -> Self {
        Self {
            inner: Arc::new(handle),
        }
    }

    /// Returns the wrapped handle if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for UiContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiContext").finish_non_exhaustive()
    }
}

/// One-shot reply handle for a pending grant request.
///
/// Answering consumes the responder. A responder dropped without an answer
/// (the dialog was dismissed with its UI, say) reports a denial, so an
/// observer hears about every request exactly once.
pub struct GrantResponder {
    permission: Permission,
    observer: Option<Arc<dyn GrantObserver>>,
}

impl GrantResponder {
    fn new(permission: Permission, observer: Arc<dyn GrantObserver>) -> Self {
        Self {
            permission,
            observer: Some(observer),
        }
    }

    /// The permission this responder answers for.
    #[must_use]
    pub const fn permission(&self) -> Permission {
        self.permission
    }

    /// Reports that the user granted the permission.
    pub fn grant(mut self) {
        debug!("permission {} granted", self.permission);
        self.answer(true);
    }

    /// Reports that the user denied the permission.
    pub fn deny(mut self) {
        debug!("permission {} denied", self.permission);
        self.answer(false);
    }

    /// Answers from a platform status; anything but `Granted` is a denial.
    pub fn respond(self, status: PermissionStatus) {
        if status == PermissionStatus::Granted {
            self.grant();
        } else {
            self.deny();
        }
    }

    /// Reports a platform failure, which the observer sees as a denial.
    pub fn fail(self, err: &PermissionError) {
        error!("permission request for {} failed: {err}", self.permission);
        self.deny();
    }
}

impl GrantResponder {
    fn answer(&mut self, granted: bool) {
        let Some(observer) = self.observer.take() else {
            return;
        };
        if granted {
            observer.on_granted(self.permission);
        } else {
            observer.on_denied(self.permission);
        }
    }
}

impl Drop for GrantResponder {
    fn drop(&mut self) {
        if self.observer.is_some() {
            warn!(
                "request for {} dropped without an answer, treating as denied",
                self.permission
            );
            self.answer(false);
        }
    }
}

impl fmt::Debug for GrantResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrantResponder")
            .field("permission", &self.permission)
            .finish_non_exhaustive()
    }
}

/// Single source of truth for whether a permission can be used.
#[derive(Debug, Clone)]
pub struct PermissionGate {
    manifest: Arc<dyn ManifestInspector>,
    backend: Arc<dyn PermissionBackend>,
}

impl PermissionGate {
    /// Creates a gate over a manifest and a platform backend.
    #[must_use]
    pub fn new(manifest: Arc<dyn ManifestInspector>, backend: Arc<dyn PermissionBackend>) -> Self {
        Self { manifest, backend }
    }

    /// Creates a gate using this platform's permission backend.
    #[must_use]
    pub fn system(manifest: Arc<dyn ManifestInspector>) -> Self {
        Self::new(manifest, crate::system_backend())
    }

    /// Whether `permission` is declared in the application manifest.
    #[must_use]
    pub fn is_declared_in_manifest(&self, permission: Permission) -> bool {
        self.manifest.has_declared_permission(permission)
    }

    /// Whether `permission` is currently granted at runtime.
    #[must_use]
    pub fn is_granted(&self, permission: Permission) -> bool {
        self.backend.status(permission) == PermissionStatus::Granted
    }

    /// Combined manifest and runtime state of `permission`.
    #[must_use]
    pub fn state(&self, permission: Permission) -> PermissionState {
        let declared = self.is_declared_in_manifest(permission);
        PermissionState::derive(declared, self.backend.status(permission))
    }

    /// Asks the user to grant `permission`.
    ///
    /// The outcome reaches `observer` exactly once. When the permission is
    /// already granted, or when there is no `ui` to attach the dialog to, the
    /// observer is called before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError::ManifestPermissionMissing`] without showing
    /// a dialog if the manifest does not declare `permission`.
    pub fn request_grant(
        &self,
        permission: Permission,
        ui: Option<&UiContext>,
        observer: Arc<dyn GrantObserver>,
    ) -> Result<(), PermissionError> {
        if !self.is_declared_in_manifest(permission) {
            return Err(PermissionError::ManifestPermissionMissing(permission));
        }

        let responder = GrantResponder::new(permission, observer);
        if self.is_granted(permission) {
            responder.grant();
            return Ok(());
        }

        match ui {
            Some(ui) => self.backend.request(permission, ui, responder),
            None => {
                warn!("no UI context to request {permission}, treating as denied");
                responder.deny();
            }
        }
        Ok(())
    }
}
