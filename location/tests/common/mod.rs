//! In-memory collaborators for coordinator tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use trackkit_location::{
    AcquisitionConfig, CoordinatorBuilder, FixSink, LastKnownReply, LocationContext,
    LocationCoordinator, LocationError, LocationFix, LocationListener, LocationProvider,
    ProviderError, ProviderKind, SubscriptionId,
};
use trackkit_permission::{
    GrantResponder, Permission, PermissionBackend, PermissionGate, PermissionStatus,
    StaticManifest, UiContext,
};

/// A call observed by [`FakeProvider`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    CheckSettings,
    Start(AcquisitionConfig),
    Stop(SubscriptionId),
    LastKnown(AcquisitionConfig),
    IsEnabled(ProviderKind),
}

/// How [`FakeProvider`] answers last-known queries.
#[derive(Debug, Clone)]
pub enum LastKnownBehavior {
    Answer(Result<LocationFix, ProviderError>),
    Park,
    Drop,
}

#[derive(Debug)]
pub struct FakeProvider {
    calls: Mutex<Vec<ProviderCall>>,
    sinks: Mutex<Vec<FixSink>>,
    parked: Mutex<Vec<LastKnownReply>>,
    settings: Mutex<Result<(), ProviderError>>,
    start_result: Mutex<Result<(), ProviderError>>,
    last_known: Mutex<LastKnownBehavior>,
    gps: bool,
    network: bool,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            sinks: Mutex::new(Vec::new()),
            parked: Mutex::new(Vec::new()),
            settings: Mutex::new(Ok(())),
            start_result: Mutex::new(Ok(())),
            last_known: Mutex::new(LastKnownBehavior::Answer(Ok(LocationFix::new(0.0, 0.0, 0)))),
            gps: true,
            network: true,
        }
    }
}

impl FakeProvider {
    pub fn with_enabled(gps: bool, network: bool) -> Self {
        Self {
            gps,
            network,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn starts(&self) -> usize {
        self.count(|call| matches!(call, ProviderCall::Start(_)))
    }

    pub fn stops(&self) -> usize {
        self.count(|call| matches!(call, ProviderCall::Stop(_)))
    }

    fn count(&self, predicate: impl Fn(&ProviderCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }

    /// Sink handed over by the most recent `start`.
    pub fn sink(&self) -> FixSink {
        self.sinks.lock().unwrap().last().cloned().expect("provider was never started")
    }

    pub fn emit(&self, fix: LocationFix) {
        assert!(self.sink().deliver(fix));
    }

    pub fn fail_settings(&self, error: ProviderError) {
        *self.settings.lock().unwrap() = Err(error);
    }

    pub fn fail_start(&self, error: ProviderError) {
        *self.start_result.lock().unwrap() = Err(error);
    }

    pub fn answer_last_known(&self, behavior: LastKnownBehavior) {
        *self.last_known.lock().unwrap() = behavior;
    }

    pub fn take_parked(&self) -> Vec<LastKnownReply> {
        std::mem::take(&mut *self.parked.lock().unwrap())
    }

    fn record(&self, call: ProviderCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl LocationProvider for FakeProvider {
    fn check_settings(&self, _config: &AcquisitionConfig) -> Result<(), ProviderError> {
        self.record(ProviderCall::CheckSettings);
        self.settings.lock().unwrap().clone()
    }

    fn start(&self, config: &AcquisitionConfig, sink: FixSink) -> Result<(), ProviderError> {
        self.record(ProviderCall::Start(*config));
        self.start_result.lock().unwrap().clone()?;
        self.sinks.lock().unwrap().push(sink);
        Ok(())
    }

    fn stop(&self, subscription: SubscriptionId) {
        self.record(ProviderCall::Stop(subscription));
    }

    fn last_known(&self, config: &AcquisitionConfig, reply: LastKnownReply) {
        self.record(ProviderCall::LastKnown(*config));
        let behavior = self.last_known.lock().unwrap().clone();
        match behavior {
            LastKnownBehavior::Answer(result) => reply.send(result),
            LastKnownBehavior::Park => self.parked.lock().unwrap().push(reply),
            LastKnownBehavior::Drop => drop(reply),
        }
    }

    fn is_provider_enabled(&self, kind: ProviderKind) -> bool {
        self.record(ProviderCall::IsEnabled(kind));
        match kind {
            ProviderKind::Gps => self.gps,
            ProviderKind::Network => self.network,
        }
    }
}

/// Permission backend whose dialog answers are scripted by the test.
#[derive(Debug)]
pub struct ScriptedPermissions {
    status: Mutex<PermissionStatus>,
    pending: Mutex<Vec<GrantResponder>>,
    requests: Mutex<usize>,
    abandon: Mutex<bool>,
}

impl ScriptedPermissions {
    pub fn new(status: PermissionStatus) -> Self {
        Self {
            status: Mutex::new(status),
            pending: Mutex::new(Vec::new()),
            requests: Mutex::new(0),
            abandon: Mutex::new(false),
        }
    }

    /// Makes every later dialog disappear without an answer, as when its
    /// activity is destroyed.
    pub fn abandon_requests(&self) {
        *self.abandon.lock().unwrap() = true;
    }

    pub fn requests(&self) -> usize {
        *self.requests.lock().unwrap()
    }

    pub fn set_status(&self, status: PermissionStatus) {
        *self.status.lock().unwrap() = status;
    }

    /// Answers the oldest open dialog the way a user would.
    pub fn answer(&self, granted: bool) {
        let responder = self.pending.lock().unwrap().remove(0);
        if granted {
            self.set_status(PermissionStatus::Granted);
            responder.grant();
        } else {
            self.set_status(PermissionStatus::Denied);
            responder.deny();
        }
    }
}

impl PermissionBackend for ScriptedPermissions {
    fn status(&self, _permission: Permission) -> PermissionStatus {
        *self.status.lock().unwrap()
    }

    fn request(&self, _permission: Permission, _ui: &UiContext, responder: GrantResponder) {
        *self.requests.lock().unwrap() += 1;
        if *self.abandon.lock().unwrap() {
            drop(responder);
        } else {
            self.pending.lock().unwrap().push(responder);
        }
    }
}

/// What a [`RecordingListener`] heard.
#[derive(Debug, Clone, PartialEq)]
pub enum Heard {
    Fix(LocationFix),
    Error(LocationError),
}

#[derive(Debug, Default)]
pub struct RecordingListener {
    heard: Mutex<Vec<Heard>>,
}

impl RecordingListener {
    pub fn heard(&self) -> Vec<Heard> {
        self.heard.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<LocationError> {
        self.heard()
            .into_iter()
            .filter_map(|h| match h {
                Heard::Error(error) => Some(error),
                Heard::Fix(_) => None,
            })
            .collect()
    }

    pub fn fixes(&self) -> Vec<LocationFix> {
        self.heard()
            .into_iter()
            .filter_map(|h| match h {
                Heard::Fix(fix) => Some(fix),
                Heard::Error(_) => None,
            })
            .collect()
    }
}

impl LocationListener for RecordingListener {
    fn on_location_has_changed(&self, fix: LocationFix) {
        self.heard.lock().unwrap().push(Heard::Fix(fix));
    }

    fn on_location_has_changed_error(&self, error: LocationError) {
        self.heard.lock().unwrap().push(Heard::Error(error));
    }
}

pub struct Harness {
    pub coordinator: LocationCoordinator,
    pub provider: Arc<FakeProvider>,
    pub permissions: Arc<ScriptedPermissions>,
    pub listener: Arc<RecordingListener>,
}

impl Harness {
    pub fn new(declared: bool, status: PermissionStatus) -> Self {
        Self::with(LocationCoordinator::builder(), declared, status, FakeProvider::default())
    }

    pub fn with(
        builder: CoordinatorBuilder,
        declared: bool,
        status: PermissionStatus,
        provider: FakeProvider,
    ) -> Self {
        let manifest = if declared {
            StaticManifest::new([Permission::FineLocation])
        } else {
            StaticManifest::default()
        };
        let provider = Arc::new(provider);
        let permissions = Arc::new(ScriptedPermissions::new(status));
        let gate = PermissionGate::new(Arc::new(manifest), permissions.clone());

        let mut coordinator = builder.build(LocationContext::new(gate, provider.clone()));
        let listener = Arc::new(RecordingListener::default());
        coordinator.set_listener(Some(listener.clone()));

        Self {
            coordinator,
            provider,
            permissions,
            listener,
        }
    }

    pub fn granted() -> Self {
        Self::new(true, PermissionStatus::Granted)
    }

    pub fn ungranted() -> Self {
        Self::new(true, PermissionStatus::NotDetermined)
    }
}

pub fn ui() -> UiContext {
    UiContext::new("main-activity")
}
