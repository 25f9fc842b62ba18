use std::fmt;

use async_channel::Sender;

use crate::event::{CoordinatorEvent, post};
use crate::{AcquisitionConfig, LocationFix, ProviderError};

/// Kinds of positioning a provider may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Satellite positioning.
    Gps,
    /// Network-based positioning (Wi-Fi, cell towers, IP).
    Network,
}

/// Identifies one continuous-update registration with a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The subsystem producing location fixes.
///
/// Implementations may deliver through [`FixSink`] and [`LastKnownReply`]
/// from any thread.
pub trait LocationProvider: Send + Sync + fmt::Debug {
    /// Verifies that the device settings can satisfy `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::SettingsUnsatisfied`] when they cannot.
    fn check_settings(&self, _config: &AcquisitionConfig) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Registers for continuous fixes, delivered through `sink`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if updates could not be started.
    fn start(&self, config: &AcquisitionConfig, sink: FixSink) -> Result<(), ProviderError>;

    /// Unregisters the subscription started with the matching sink.
    fn stop(&self, subscription: SubscriptionId);

    /// Reports the most recent cached fix through `reply`, at the accuracy
    /// `config` asks for.
    fn last_known(&self, config: &AcquisitionConfig, reply: LastKnownReply);

    /// Whether positioning of `kind` is currently enabled.
    fn is_provider_enabled(&self, kind: ProviderKind) -> bool;
}

/// Delivery handle for one continuous-update subscription.
#[derive(Debug, Clone)]
pub struct FixSink {
    subscription: SubscriptionId,
    sender: Sender<CoordinatorEvent>,
}

impl FixSink {
    pub(crate) const fn new(
        subscription: SubscriptionId,
        sender: Sender<CoordinatorEvent>,
    ) -> Self {
        Self {
            subscription,
            sender,
        }
    }

    /// The subscription this sink delivers for.
    #[must_use]
    pub const fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    /// Delivers a fix. Returns `false` once the coordinator has been dropped.
    pub fn deliver(&self, fix: LocationFix) -> bool {
        post(
            &self.sender,
            CoordinatorEvent::Fix {
                subscription: self.subscription,
                fix,
            },
        )
    }

    /// Reports a provider failure. Returns `false` once the coordinator has
    /// been dropped.
    pub fn fail(&self, error: ProviderError) -> bool {
        post(
            &self.sender,
            CoordinatorEvent::ProviderFailed {
                subscription: self.subscription,
                error,
            },
        )
    }

    /// Whether the coordinator is still listening.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// One-shot reply handle for a last-known-location query.
///
/// Sending consumes the reply. A reply dropped without being sent reports a
/// [`ProviderError::QueryFailed`], so every query completes exactly once.
#[derive(Debug)]
pub struct LastKnownReply {
    query: u64,
    sender: Option<Sender<CoordinatorEvent>>,
}

impl LastKnownReply {
    pub(crate) const fn new(query: u64, sender: Sender<CoordinatorEvent>) -> Self {
        Self {
            query,
            sender: Some(sender),
        }
    }

    /// Completes the query.
    pub fn send(mut self, result: Result<LocationFix, ProviderError>) {
        self.complete(result);
    }

    fn complete(&mut self, result: Result<LocationFix, ProviderError>) {
        if let Some(sender) = self.sender.take() {
            post(
                &sender,
                CoordinatorEvent::LastKnown {
                    query: self.query,
                    result,
                },
            );
        }
    }
}

impl Drop for LastKnownReply {
    fn drop(&mut self) {
        self.complete(Err(ProviderError::QueryFailed(
            "provider dropped the query without answering".into(),
        )));
    }
}

#[cfg(test)]
mod tests {
    use async_channel::unbounded;

    use super::*;

    #[test]
    fn reply_is_sent_once() {
        let (sender, receiver) = unbounded();
        LastKnownReply::new(7, sender).send(Ok(LocationFix::new(1.0, 2.0, 0)));

        assert!(matches!(
            receiver.try_recv(),
            Ok(CoordinatorEvent::LastKnown { query: 7, result: Ok(_) })
        ));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn dropped_reply_reports_a_failure() {
        let (sender, receiver) = unbounded();
        drop(LastKnownReply::new(3, sender));

        assert!(matches!(
            receiver.try_recv(),
            Ok(CoordinatorEvent::LastKnown {
                query: 3,
                result: Err(ProviderError::QueryFailed(_))
            })
        ));
    }

    #[test]
    fn sink_notices_a_dropped_coordinator() {
        let (sender, receiver) = unbounded();
        let sink = FixSink::new(SubscriptionId::new(1), sender);
        assert!(sink.is_connected());

        drop(receiver);

        assert!(!sink.is_connected());
        assert!(!sink.deliver(LocationFix::new(0.0, 0.0, 0)));
    }
}
