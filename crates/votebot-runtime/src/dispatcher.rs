//! [`RobotEventDispatcher`] – the single entry point for device callbacks.
//!
//! The dispatcher is the only [`RobotListener`] the runtime registers.  It
//! routes each [`RobotCallback`] variant to the component that owns the
//! matching gate, or onto the [`InteractionBus`]:
//!
//! | Callback | Destination |
//! |---|---|
//! | speech status | [`SpeechCoordinator::on_status`] (terminal statuses only) |
//! | user interaction (`true`) | [`InteractionBus::publish`] |
//! | hard button (`clicked`) | [`InteractionBus::publish`] |
//! | navigation status | [`NavigationCoordinator::on_status`] |
//! | permission result | [`PermissionGate::on_result`] |
//!
//! Nothing here waits: resolving a gate and publishing on the bus are both
//! non-blocking, so the device thread is released immediately.

use std::sync::Arc;

use tracing::trace;
use votebot_middleware::{InteractionBus, RobotListener};
use votebot_types::{ButtonStatus, RobotCallback};

use crate::navigation::NavigationCoordinator;
use crate::permission::PermissionGate;
use crate::speech::SpeechCoordinator;

/// What happened to a dispatched callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// A waiting gate was resolved.
    Resolved,
    /// An interaction event was handed to this many subscribers.
    Published(usize),
    /// Non-terminal, stale, or irrelevant.
    Ignored,
}

pub struct RobotEventDispatcher {
    speech: Arc<SpeechCoordinator>,
    navigation: Arc<NavigationCoordinator>,
    permission: Arc<PermissionGate>,
    interactions: InteractionBus,
}

impl RobotEventDispatcher {
    pub fn new(
        speech: Arc<SpeechCoordinator>,
        navigation: Arc<NavigationCoordinator>,
        permission: Arc<PermissionGate>,
        interactions: InteractionBus,
    ) -> Self {
        Self {
            speech,
            navigation,
            permission,
            interactions,
        }
    }

    pub fn dispatch(&self, callback: RobotCallback) -> Routed {
        let resolved = |woke: bool| if woke { Routed::Resolved } else { Routed::Ignored };

        match callback {
            RobotCallback::SpeechStatus { request_id, status } => {
                resolved(self.speech.on_status(request_id, status))
            }
            RobotCallback::UserInteraction { is_interacting } => {
                if is_interacting {
                    Routed::Published(self.interactions.publish())
                } else {
                    Routed::Ignored
                }
            }
            RobotCallback::HardButton { status, .. } => {
                if status == ButtonStatus::Clicked {
                    Routed::Published(self.interactions.publish())
                } else {
                    Routed::Ignored
                }
            }
            RobotCallback::NavigationStatus {
                location, status, ..
            } => resolved(self.navigation.on_status(&location, status)),
            RobotCallback::PermissionResult {
                permission,
                grant,
                request_code,
            } => resolved(self.permission.on_result(permission, grant, request_code)),
        }
    }
}

impl RobotListener for RobotEventDispatcher {
    fn on_callback(&self, callback: RobotCallback) {
        let kind = callback.kind();
        let routed = self.dispatch(callback);
        trace!(kind, ?routed, "device callback dispatched");
    }
}
