use std::fmt;
use std::sync::Arc;

use async_channel::{Receiver, Sender, unbounded};
use log::{debug, warn};
use trackkit_permission::{ManifestInspector, Permission, PermissionGate, UiContext};

use crate::event::{CoordinatorEvent, GrantRelay};
use crate::{
    AcquisitionConfig, CoordinatorBuilder, FixSink, LastKnownReply, LocationError, LocationFix,
    LocationProvider, LocationResult, ProviderKind, SubscriptionId,
};

/// Permission every location request is gated on.
pub const REQUIRED_PERMISSION: Permission = Permission::FineLocation;

/// Receives the results of location requests.
///
/// Methods are called synchronously from the coordinator call that
/// dispatched the underlying event.
pub trait LocationListener: Send + Sync {
    /// A new fix is available.
    fn on_location_has_changed(&self, fix: LocationFix);
    /// A request failed.
    fn on_location_has_changed_error(&self, error: LocationError);
}

/// Lifecycle of continuous updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinatorState {
    /// Nothing requested, or the last request was denied.
    Idle,
    /// Waiting for the user to answer the permission dialog.
    AwaitingPermission,
    /// The provider is delivering fixes.
    Active,
    /// Updates were stopped explicitly.
    Stopped,
}

/// Collaborators a coordinator drives.
#[derive(Debug, Clone)]
pub struct LocationContext {
    gate: PermissionGate,
    provider: Arc<dyn LocationProvider>,
}

impl LocationContext {
    /// Bundles a permission gate with a location provider.
    #[must_use]
    pub fn new(gate: PermissionGate, provider: Arc<dyn LocationProvider>) -> Self {
        Self { gate, provider }
    }

    /// Uses this platform's permission backend and location provider.
    #[must_use]
    pub fn system(manifest: Arc<dyn ManifestInspector>) -> Self {
        Self::new(PermissionGate::system(manifest), crate::system_provider())
    }
}

/// What is waiting on the outstanding permission request.
#[derive(Debug)]
struct PendingGrant {
    ticket: u64,
    start_updates: bool,
    queries: usize,
}

/// Drives permission-gated location acquisition for one listener.
///
/// Platform callbacks never mutate the coordinator directly: they post events
/// into its queue, which the owner drains with
/// [`dispatch_pending`](Self::dispatch_pending) or
/// [`dispatch_next`](Self::dispatch_next). Events answering requests that are
/// no longer current (fixes from a stopped subscription, a grant after
/// [`stop_location_updates`](Self::stop_location_updates)) are dropped.
///
/// A provider may still produce one fix that was in flight when `stop` was
/// called; it is discarded on dispatch.
pub struct LocationCoordinator {
    config: AcquisitionConfig,
    gate: PermissionGate,
    provider: Arc<dyn LocationProvider>,
    listener: Option<Arc<dyn LocationListener>>,
    state: CoordinatorState,
    pending_grant: Option<PendingGrant>,
    subscription: Option<SubscriptionId>,
    next_ticket: u64,
    inbox: Receiver<CoordinatorEvent>,
    outbox: Sender<CoordinatorEvent>,
}

impl fmt::Debug for LocationCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationCoordinator")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("subscription", &self.subscription)
            .field("pending_grant", &self.pending_grant)
            .field("has_listener", &self.listener.is_some())
            .finish_non_exhaustive()
    }
}

impl LocationCoordinator {
    /// Starts configuring a coordinator.
    #[must_use]
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::default()
    }

    pub(crate) fn new(config: AcquisitionConfig, context: LocationContext) -> Self {
        let (outbox, inbox) = unbounded();
        Self {
            config,
            gate: context.gate,
            provider: context.provider,
            listener: None,
            state: CoordinatorState::Idle,
            pending_grant: None,
            subscription: None,
            next_ticket: 1,
            inbox,
            outbox,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Acquisition settings this coordinator was built with.
    #[must_use]
    pub const fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Binds the listener, replacing any previous one. `None` unbinds.
    pub fn set_listener(&mut self, listener: Option<Arc<dyn LocationListener>>) {
        self.listener = listener;
    }

    /// Starts continuous location updates.
    ///
    /// If the permission has not been granted, the grant dialog is attached to
    /// `ui`. Without a `ui` the request is denied at once and the listener
    /// hears about it before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::ManifestPermissionMissing`] if the manifest
    /// does not declare [`REQUIRED_PERMISSION`].
    pub fn start_location_updates(&mut self, ui: Option<&UiContext>) -> LocationResult<()> {
        self.ensure_declared()?;

        match self.state {
            CoordinatorState::Active | CoordinatorState::AwaitingPermission => {
                debug!("location updates already requested ({:?})", self.state);
                return Ok(());
            }
            CoordinatorState::Idle | CoordinatorState::Stopped => {}
        }

        if self.gate.is_granted(REQUIRED_PERMISSION) {
            self.start_provider();
            return Ok(());
        }

        self.await_grant(ui)?;
        if let Some(pending) = &mut self.pending_grant {
            pending.start_updates = true;
        }
        self.transition(CoordinatorState::AwaitingPermission);
        self.dispatch_pending();
        Ok(())
    }

    /// Requests the most recent cached fix.
    ///
    /// Exactly one fix or error reaches the listener per call. The lifecycle
    /// state is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::ManifestPermissionMissing`] if the manifest
    /// does not declare [`REQUIRED_PERMISSION`].
    pub fn get_last_location(&mut self, ui: Option<&UiContext>) -> LocationResult<()> {
        self.ensure_declared()?;

        if self.gate.is_granted(REQUIRED_PERMISSION) {
            self.query_last_known();
        } else {
            self.await_grant(ui)?;
            if let Some(pending) = &mut self.pending_grant {
                pending.queries += 1;
            }
        }
        self.dispatch_pending();
        Ok(())
    }

    /// Stops continuous location updates. Calling it again is a no-op.
    pub fn stop_location_updates(&mut self) {
        match self.state {
            CoordinatorState::Active => {
                if let Some(subscription) = self.subscription.take() {
                    self.provider.stop(subscription);
                }
                self.transition(CoordinatorState::Stopped);
            }
            CoordinatorState::AwaitingPermission => {
                if let Some(pending) = &mut self.pending_grant {
                    pending.start_updates = false;
                }
                self.transition(CoordinatorState::Stopped);
            }
            CoordinatorState::Idle | CoordinatorState::Stopped => {
                debug!("location updates not running ({:?})", self.state);
            }
        }
    }

    /// Whether GPS or network positioning is enabled and the permission granted.
    #[must_use]
    pub fn are_services_enabled(&self) -> bool {
        let any_provider = self.provider.is_provider_enabled(ProviderKind::Gps)
            || self.provider.is_provider_enabled(ProviderKind::Network);
        any_provider && self.gate.is_granted(REQUIRED_PERMISSION)
    }

    /// Handles every queued event without waiting. Returns how many were handled.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.inbox.try_recv() {
            self.handle(event);
            handled += 1;
        }
        handled
    }

    /// Waits for the next event and handles it.
    pub async fn dispatch_next(&mut self) {
        if let Ok(event) = self.inbox.recv().await {
            self.handle(event);
        }
    }

    fn ensure_declared(&self) -> LocationResult<()> {
        if self.gate.is_declared_in_manifest(REQUIRED_PERMISSION) {
            Ok(())
        } else {
            Err(LocationError::ManifestPermissionMissing(REQUIRED_PERMISSION))
        }
    }

    fn next_ticket(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        ticket
    }

    fn transition(&mut self, next: CoordinatorState) {
        if self.state != next {
            debug!("location coordinator {:?} -> {next:?}", self.state);
            self.state = next;
        }
    }

    /// Issues a grant request unless one is already outstanding.
    fn await_grant(&mut self, ui: Option<&UiContext>) -> LocationResult<()> {
        if self.pending_grant.is_some() {
            debug!("joining outstanding {REQUIRED_PERMISSION} request");
            return Ok(());
        }

        let ticket = self.next_ticket();
        self.pending_grant = Some(PendingGrant {
            ticket,
            start_updates: false,
            queries: 0,
        });

        let relay = Arc::new(GrantRelay::new(ticket, self.outbox.clone()));
        if let Err(err) = self.gate.request_grant(REQUIRED_PERMISSION, ui, relay) {
            self.pending_grant = None;
            return Err(err.into());
        }
        Ok(())
    }

    fn start_provider(&mut self) {
        if let Err(error) = self.provider.check_settings(&self.config) {
            self.transition(CoordinatorState::Idle);
            self.emit_error(error.into());
            return;
        }

        let subscription = SubscriptionId::new(self.next_ticket());
        let sink = FixSink::new(subscription, self.outbox.clone());
        match self.provider.start(&self.config, sink) {
            Ok(()) => {
                self.subscription = Some(subscription);
                self.transition(CoordinatorState::Active);
            }
            Err(error) => {
                self.transition(CoordinatorState::Idle);
                self.emit_error(error.into());
            }
        }
    }

    fn query_last_known(&mut self) {
        let query = self.next_ticket();
        self.provider
            .last_known(&self.config, LastKnownReply::new(query, self.outbox.clone()));
    }

    fn handle(&mut self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::Grant { ticket, granted } => self.on_grant(ticket, granted),
            CoordinatorEvent::Fix { subscription, fix } => {
                if self.is_current(subscription) {
                    self.emit_fix(fix);
                } else {
                    debug!("dropping fix from stale subscription {subscription}");
                }
            }
            CoordinatorEvent::ProviderFailed {
                subscription,
                error,
            } => {
                if self.is_current(subscription) {
                    self.emit_error(error.into());
                } else {
                    debug!("dropping error from stale subscription {subscription}: {error}");
                }
            }
            CoordinatorEvent::LastKnown { query, result } => {
                debug!("last known location query {query} completed");
                match result {
                    Ok(fix) => self.emit_fix(fix),
                    Err(error) => self.emit_error(error.into()),
                }
            }
        }
    }

    fn on_grant(&mut self, ticket: u64, granted: bool) {
        let Some(pending) = self.pending_grant.take_if(|p| p.ticket == ticket) else {
            debug!("dropping stale grant reply {ticket}");
            return;
        };

        if pending.start_updates && self.state == CoordinatorState::AwaitingPermission {
            if granted {
                self.start_provider();
            } else {
                self.transition(CoordinatorState::Idle);
                self.emit_error(LocationError::PermissionDenied(REQUIRED_PERMISSION));
            }
        }

        for _ in 0..pending.queries {
            if granted {
                self.query_last_known();
            } else {
                self.emit_error(LocationError::PermissionDenied(REQUIRED_PERMISSION));
            }
        }
    }

    fn is_current(&self, subscription: SubscriptionId) -> bool {
        self.state == CoordinatorState::Active && self.subscription == Some(subscription)
    }

    fn emit_fix(&self, fix: LocationFix) {
        match &self.listener {
            Some(listener) => listener.on_location_has_changed(fix),
            None => debug!("no location listener bound, dropping fix"),
        }
    }

    fn emit_error(&self, error: LocationError) {
        match &self.listener {
            Some(listener) => listener.on_location_has_changed_error(error),
            None => warn!("no location listener bound, dropping error: {error}"),
        }
    }
}

