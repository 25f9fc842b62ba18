//! Events posted into a coordinator's queue by platform callbacks.

use async_channel::Sender;
use log::warn;
use trackkit_permission::{GrantObserver, Permission};

use crate::{LocationFix, ProviderError, SubscriptionId};

/// Something that happened outside the coordinator's control.
///
/// Every variant carries the ticket of the request it answers, so replies to
/// requests the coordinator has since abandoned can be recognized and dropped.
#[derive(Debug)]
pub(crate) enum CoordinatorEvent {
    Grant {
        ticket: u64,
        granted: bool,
    },
    Fix {
        subscription: SubscriptionId,
        fix: LocationFix,
    },
    ProviderFailed {
        subscription: SubscriptionId,
        error: ProviderError,
    },
    LastKnown {
        query: u64,
        result: Result<LocationFix, ProviderError>,
    },
}

/// Posts `event`, returning `false` once the coordinator is gone.
pub(crate) fn post(sender: &Sender<CoordinatorEvent>, event: CoordinatorEvent) -> bool {
    match sender.try_send(event) {
        Ok(()) => true,
        Err(err) => {
            warn!("dropping location event: {err}");
            false
        }
    }
}

/// Forwards grant outcomes for one permission request into the queue.
#[derive(Debug)]
pub(crate) struct GrantRelay {
    ticket: u64,
    sender: Sender<CoordinatorEvent>,
}

impl GrantRelay {
    pub(crate) const fn new(ticket: u64, sender: Sender<CoordinatorEvent>) -> Self {
        Self { ticket, sender }
    }
}

impl GrantObserver for GrantRelay {
    fn on_granted(&self, _permission: Permission) {
        post(
            &self.sender,
            CoordinatorEvent::Grant {
                ticket: self.ticket,
                granted: true,
            },
        );
    }

    fn on_denied(&self, _permission: Permission) {
        post(
            &self.sender,
            CoordinatorEvent::Grant {
                ticket: self.ticket,
                granted: false,
            },
        );
    }
}
