//! Linux location provider using the GeoClue2 D-Bus service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::executor::{ThreadPool, block_on};
use futures_timer::Delay;
use log::debug;
use zbus::zvariant::OwnedObjectPath;
use zbus::{Connection, Proxy};

use crate::{
    AcquisitionConfig, FixSink, LastKnownReply, LocationFix, LocationProvider, Priority,
    ProviderError, ProviderKind, SubscriptionId,
};

const GEOCLUE_BUS: &str = "org.freedesktop.GeoClue2";
const MANAGER_PATH: &str = "/org/freedesktop/GeoClue2/Manager";
const MANAGER_IFACE: &str = "org.freedesktop.GeoClue2.Manager";
const CLIENT_IFACE: &str = "org.freedesktop.GeoClue2.Client";
const LOCATION_IFACE: &str = "org.freedesktop.GeoClue2.Location";
const DESKTOP_ID: &str = "trackkit";

// GeoClue accuracy levels
const LEVEL_COUNTRY: u32 = 1;
const LEVEL_CITY: u32 = 4;
const LEVEL_STREET: u32 = 6;
const LEVEL_EXACT: u32 = 8;

/// A freshly started client reports "/" until its first fix arrives.
const FIRST_FIX_ATTEMPTS: u32 = 10;
const FIRST_FIX_BACKOFF: Duration = Duration::from_millis(500);

/// Lower bound between two reads of the same client.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Cancel flags of the running poll loops.
#[derive(Debug, Default, Clone)]
struct Subscriptions(Arc<Mutex<HashMap<SubscriptionId, Arc<AtomicBool>>>>);

impl Subscriptions {
    fn register(&self, subscription: SubscriptionId) -> Arc<AtomicBool> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subscription, cancelled.clone());
        cancelled
    }

    /// Removes the entry, returning its cancel flag if it was still running.
    fn remove(&self, subscription: SubscriptionId) -> Option<Arc<AtomicBool>> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&subscription)
    }

    fn is_empty(&self) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
    }
}

/// Provider backed by GeoClue2 on the system bus.
#[derive(Debug, Default)]
pub(crate) struct GeoClueProvider {
    subscriptions: Subscriptions,
    pool: OnceLock<ThreadPool>,
}

impl GeoClueProvider {
    fn shared_pool(&self) -> Result<&ThreadPool, ProviderError> {
        if let Some(pool) = self.pool.get() {
            return Ok(pool);
        }
        let pool = ThreadPool::builder()
            .pool_size(1)
            .name_prefix("trackkit-geoclue-")
            .create()
            .map_err(|e| ProviderError::QueryFailed(format!("failed to start executor: {e}")))?;
        Ok(self.pool.get_or_init(|| pool))
    }
}

impl LocationProvider for GeoClueProvider {
    fn start(&self, config: &AcquisitionConfig, sink: FixSink) -> Result<(), ProviderError> {
        let subscription = sink.subscription();
        let cancelled = self.subscriptions.register(subscription);
        let task = poll_updates(*config, sink, cancelled, self.subscriptions.clone());

        let spawned = if config.use_dedicated_dispatch_loop() {
            std::thread::Builder::new()
                .name(format!("trackkit-geoclue-{}", subscription.get()))
                .spawn(move || block_on(task))
                .map(drop)
                .map_err(|e| ProviderError::QueryFailed(format!("failed to spawn loop: {e}")))
        } else {
            self.shared_pool().map(|pool| pool.spawn_ok(task))
        };
        if let Err(err) = spawned {
            self.subscriptions.remove(subscription);
            return Err(err);
        }

        debug!("GeoClue subscription {subscription} started");
        Ok(())
    }

    fn stop(&self, subscription: SubscriptionId) {
        match self.subscriptions.remove(subscription) {
            Some(flag) => flag.store(true, Ordering::Release),
            None => debug!("GeoClue subscription {subscription} already finished"),
        }
    }

    fn last_known(&self, config: &AcquisitionConfig, reply: LastKnownReply) {
        let config = *config;
        match self.shared_pool() {
            Ok(pool) => pool.spawn_ok(async move {
                reply.send(read_once(&config).await);
            }),
            Err(err) => reply.send(Err(err)),
        }
    }

    fn is_provider_enabled(&self, kind: ProviderKind) -> bool {
        let required = match kind {
            ProviderKind::Gps => LEVEL_EXACT,
            ProviderKind::Network => LEVEL_CITY,
        };
        match block_on(available_accuracy_level()) {
            Ok(level) => level >= required,
            Err(err) => {
                debug!("GeoClue unavailable: {err}");
                false
            }
        }
    }
}

const fn accuracy_level(priority: Priority) -> u32 {
    match priority {
        Priority::HighAccuracy => LEVEL_EXACT,
        Priority::Balanced => LEVEL_STREET,
        Priority::LowPower => LEVEL_CITY,
        Priority::Passive => LEVEL_COUNTRY,
    }
}

/// Delay between two reads; a zero update interval must not spin.
fn poll_interval(config: &AcquisitionConfig) -> Duration {
    config
        .update_interval()
        .max(config.fastest_interval())
        .max(MIN_POLL_INTERVAL)
}

/// GeoClue stamps fixes as seconds plus microseconds since the epoch.
const fn timestamp_millis(seconds: u64, micros: u64) -> u64 {
    seconds.saturating_mul(1000).saturating_add(micros / 1000)
}

#[allow(clippy::needless_pass_by_value)]
fn dbus_error(err: zbus::Error) -> ProviderError {
    ProviderError::QueryFailed(err.to_string())
}

async fn available_accuracy_level() -> Result<u32, ProviderError> {
    let connection = Connection::system().await.map_err(dbus_error)?;
    let manager = Proxy::new(&connection, GEOCLUE_BUS, MANAGER_PATH, MANAGER_IFACE)
        .await
        .map_err(dbus_error)?;
    manager
        .get_property::<u32>("AvailableAccuracyLevel")
        .await
        .map_err(dbus_error)
}

/// A started GeoClue client.
struct Session {
    connection: Connection,
    client: OwnedObjectPath,
}

impl Session {
    async fn open(config: &AcquisitionConfig) -> Result<Self, ProviderError> {
        let connection = Connection::system().await.map_err(dbus_error)?;

        let manager = Proxy::new(&connection, GEOCLUE_BUS, MANAGER_PATH, MANAGER_IFACE)
            .await
            .map_err(dbus_error)?;
        let client: OwnedObjectPath = manager.call("GetClient", &()).await.map_err(|e| {
            ProviderError::SettingsUnsatisfied(format!("GeoClue2 not available: {e}"))
        })?;

        let proxy = Proxy::new(&connection, GEOCLUE_BUS, client.as_str(), CLIENT_IFACE)
            .await
            .map_err(dbus_error)?;
        proxy
            .set_property("DesktopId", DESKTOP_ID)
            .await
            .map_err(|e| ProviderError::QueryFailed(format!("failed to set desktop ID: {e}")))?;
        proxy
            .set_property("RequestedAccuracyLevel", accuracy_level(config.priority()))
            .await
            .map_err(|e| ProviderError::SettingsUnsatisfied(format!("accuracy level: {e}")))?;
        let threshold = u32::try_from(config.fastest_interval().as_secs()).unwrap_or(u32::MAX);
        proxy
            .set_property("TimeThreshold", threshold)
            .await
            .map_err(|e| ProviderError::SettingsUnsatisfied(format!("time threshold: {e}")))?;
        proxy
            .call_method("Start", &())
            .await
            .map_err(|e| ProviderError::QueryFailed(format!("failed to start client: {e}")))?;

        Ok(Self { connection, client })
    }

    async fn read_fix(&self) -> Result<LocationFix, ProviderError> {
        let client = Proxy::new(&self.connection, GEOCLUE_BUS, self.client.as_str(), CLIENT_IFACE)
            .await
            .map_err(dbus_error)?;
        let path: OwnedObjectPath = client.get_property("Location").await.map_err(dbus_error)?;
        if path.as_str() == "/" {
            return Err(ProviderError::NoCachedFix);
        }

        let location = Proxy::new(&self.connection, GEOCLUE_BUS, path.as_str(), LOCATION_IFACE)
            .await
            .map_err(dbus_error)?;
        let latitude: f64 = location
            .get_property("Latitude")
            .await
            .map_err(|e| ProviderError::QueryFailed(format!("failed to get latitude: {e}")))?;
        let longitude: f64 = location
            .get_property("Longitude")
            .await
            .map_err(|e| ProviderError::QueryFailed(format!("failed to get longitude: {e}")))?;

        let timestamp = location
            .get_property::<(u64, u64)>("Timestamp")
            .await
            .map_or_else(|_| now_millis(), |(secs, micros)| timestamp_millis(secs, micros));

        Ok(LocationFix {
            latitude,
            longitude,
            timestamp,
            accuracy: location.get_property("Accuracy").await.ok(),
            altitude: location.get_property("Altitude").await.ok(),
        })
    }

    /// Polls until the client has produced its first fix.
    async fn first_fix(&self) -> Result<LocationFix, ProviderError> {
        for _ in 1..FIRST_FIX_ATTEMPTS {
            match self.read_fix().await {
                Err(ProviderError::NoCachedFix) => Delay::new(FIRST_FIX_BACKOFF).await,
                other => return other,
            }
        }
        self.read_fix().await
    }

    async fn close(self) {
        let client =
            Proxy::new(&self.connection, GEOCLUE_BUS, self.client.as_str(), CLIENT_IFACE).await;
        let stopped = match client {
            Ok(client) => client.call_method("Stop", &()).await.map(drop),
            Err(err) => Err(err),
        };
        if let Err(err) = stopped {
            debug!("failed to stop GeoClue client: {err}");
        }
    }
}

async fn read_once(config: &AcquisitionConfig) -> Result<LocationFix, ProviderError> {
    let session = Session::open(config).await?;
    let fix = session.first_fix().await;
    session.close().await;
    fix
}

async fn poll_updates(
    config: AcquisitionConfig,
    sink: FixSink,
    cancelled: Arc<AtomicBool>,
    subscriptions: Subscriptions,
) {
    match Session::open(&config).await {
        Ok(session) => {
            relay_fixes(&session, &config, &sink, &cancelled).await;
            session.close().await;
        }
        Err(err) => {
            sink.fail(err);
        }
    }

    subscriptions.remove(sink.subscription());
    debug!("GeoClue subscription {} finished", sink.subscription());
}

async fn relay_fixes(
    session: &Session,
    config: &AcquisitionConfig,
    sink: &FixSink,
    cancelled: &AtomicBool,
) {
    let interval = poll_interval(config);
    let mut last_timestamp = None;

    while !cancelled.load(Ordering::Acquire) {
        let connected = match session.read_fix().await {
            Ok(fix) if is_new(&mut last_timestamp, &fix) => sink.deliver(fix),
            Ok(_) | Err(ProviderError::NoCachedFix) => sink.is_connected(),
            Err(err) => sink.fail(err),
        };
        if !connected {
            break;
        }
        Delay::new(interval).await;
    }
}

/// GeoClue keeps serving the same Location object until it moves.
fn is_new(last_timestamp: &mut Option<u64>, fix: &LocationFix) -> bool {
    if *last_timestamp == Some(fix.timestamp) {
        return false;
    }
    *last_timestamp = Some(fix.timestamp);
    true
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
