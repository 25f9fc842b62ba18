//! Linux test binary for trackkit-location.
//!
//! Needs a running GeoClue2 service on the system bus.
//!
//! Run with: cargo run -p trackkit-location-test

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use trackkit_location::{
    CoordinatorState, LocationContext, LocationCoordinator, LocationError, LocationFix,
    LocationListener, REQUIRED_PERMISSION,
};
use trackkit_permission::StaticManifest;

#[derive(Debug, Default)]
struct Printer {
    heard: AtomicUsize,
}

impl LocationListener for Printer {
    fn on_location_has_changed(&self, fix: LocationFix) {
        self.heard.fetch_add(1, Ordering::SeqCst);
        println!("✓ Location received");
        println!("  Latitude:  {:.6}°", fix.latitude);
        println!("  Longitude: {:.6}°", fix.longitude);
        if let Some(alt) = fix.altitude {
            println!("  Altitude:  {alt:.1}m");
        }
        if let Some(acc) = fix.accuracy {
            println!("  Accuracy:  {acc:.1}m");
        }
        println!("  Timestamp: {}", fix.timestamp);
    }

    fn on_location_has_changed_error(&self, error: LocationError) {
        self.heard.fetch_add(1, Ordering::SeqCst);
        println!("✗ Location error: {error}");
    }
}

#[tokio::main]
async fn main() {
    println!("=== Trackkit Location Test (Linux) ===\n");

    let manifest = Arc::new(StaticManifest::new([REQUIRED_PERMISSION]));
    let mut coordinator = LocationCoordinator::builder()
        .set_update_interval(2_000)
        .set_fastest_interval(1_000)
        .build(LocationContext::system(manifest));
    let printer = Arc::new(Printer::default());
    coordinator.set_listener(Some(printer.clone()));

    println!("Services enabled: {}\n", coordinator.are_services_enabled());

    println!("Getting last known location...");
    if let Err(e) = coordinator.get_last_location(None) {
        println!("Request rejected: {e}");
        return;
    }
    while printer.heard.load(Ordering::SeqCst) == 0 {
        coordinator.dispatch_next().await;
    }

    println!("\nStarting continuous updates...");
    if let Err(e) = coordinator.start_location_updates(None) {
        println!("Request rejected: {e}");
        return;
    }
    if coordinator.state() != CoordinatorState::Active {
        println!("Updates did not start ({:?})", coordinator.state());
        return;
    }
    while printer.heard.load(Ordering::SeqCst) < 4 {
        coordinator.dispatch_next().await;
    }

    coordinator.stop_location_updates();
    println!("\nStopped ({:?})", coordinator.state());
}
