//! Platform-specific location providers.

use std::sync::Arc;

use crate::LocationProvider;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "linux")]
use linux::GeoClueProvider as SystemProvider;

/// Returns the location provider for the current platform.
///
/// No I/O happens until the provider is first used.
#[must_use]
pub fn system_provider() -> Arc<dyn LocationProvider> {
    Arc::new(SystemProvider::default())
}

// Fallback for platforms without a provider
#[cfg(not(target_os = "linux"))]
#[derive(Debug, Default)]
struct SystemProvider;

#[cfg(not(target_os = "linux"))]
impl LocationProvider for SystemProvider {
    fn start(
        &self,
        _config: &crate::AcquisitionConfig,
        _sink: crate::FixSink,
    ) -> Result<(), crate::ProviderError> {
        Err(crate::ProviderError::Unavailable)
    }

    fn stop(&self, _subscription: crate::SubscriptionId) {}

    fn last_known(&self, _config: &crate::AcquisitionConfig, reply: crate::LastKnownReply) {
        reply.send(Err(crate::ProviderError::Unavailable));
    }

    fn is_provider_enabled(&self, _kind: crate::ProviderKind) -> bool {
        false
    }
}
