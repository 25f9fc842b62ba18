//! # Trackkit
//!
//! Permission-gated location acquisition.
//!
//! Trackkit checks that the location permission is declared in the
//! application's manifest, asks the user for it when needed, and only then
//! drives the platform's location provider. Results reach a single listener
//! as fixes or errors.
//!
//! ## Features
//!
//! - `permission`: Manifest inspection and the runtime grant flow.
//! - `location`: The location coordinator and platform providers.
//!
//! Use the `full` feature to enable everything.
//!
//! ## Example
//!
//! ```toml
//! [dependencies]
//! trackkit = { version = "0.1", features = ["location"] }
//! ```
//!
//! ```rust,no_run
//! # #[cfg(feature = "location")]
//! # fn main() -> Result<(), trackkit::location::LocationError> {
//! use std::sync::Arc;
//!
//! use trackkit::location::{LocationContext, LocationCoordinator};
//! use trackkit::permission::{Permission, StaticManifest};
//!
//! let manifest = Arc::new(StaticManifest::new([Permission::FineLocation]));
//! let mut coordinator = LocationCoordinator::builder()
//!     .set_update_interval(10_000)
//!     .build(LocationContext::system(manifest));
//! coordinator.get_last_location(None)?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "location"))]
//! # fn main() {}
//! ```

#[cfg(feature = "location")]
pub use trackkit_location as location;

#[cfg(feature = "permission")]
pub use trackkit_permission as permission;
