//! [`PermissionGate`] – awaitable map-permission request.
//!
//! Only one request can be outstanding: the robot's permission dialog is
//! modal, so a second call simply replaces the first call's gate (the first
//! caller then sees `false`).

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use votebot_middleware::RobotDevice;
use votebot_types::{Permission, PermissionGrant};

use crate::gate::GateSlot;

pub struct PermissionGate {
    device: Arc<dyn RobotDevice>,
    slot: GateSlot<bool>,
    request_code: i32,
    timeout: Duration,
}

impl PermissionGate {
    pub fn new(device: Arc<dyn RobotDevice>, request_code: i32, timeout: Duration) -> Self {
        Self {
            device,
            slot: GateSlot::new(),
            request_code,
            timeout,
        }
    }

    pub fn has_map_permission(&self) -> bool {
        self.device.check_self_permission(Permission::Map).is_granted()
    }

    pub async fn ensure_map_permission(&self) -> bool {
        self.ensure_map_permission_for(self.timeout).await
    }

    /// Make sure the map permission is granted, asking the operator if
    /// needed.
    ///
    /// Returns `true` immediately, without touching the device, when the
    /// permission is already held.  A denial, a timeout, a replaced request
    /// or a rejected command all yield `false`.
    pub async fn ensure_map_permission_for(&self, timeout: Duration) -> bool {
        if self.has_map_permission() {
            return true;
        }

        let waiter = self.slot.arm();
        if let Err(e) = self
            .device
            .request_permissions(&[Permission::Map], self.request_code)
        {
            warn!(error = %e, "permission request rejected by device");
            self.slot.cancel();
            return false;
        }

        let granted = match waiter.wait_for(timeout).await {
            Ok(granted) => granted,
            Err(e) => {
                warn!(error = %e, "map permission request did not complete");
                false
            }
        };
        self.slot.clear_if_closed();
        info!(granted, "map permission request finished");
        granted
    }

    /// Apply a permission result from the device.  Results for another
    /// request code or another permission are ignored.
    pub fn on_result(&self, permission: Permission, grant: PermissionGrant, request_code: i32) -> bool {
        if request_code != self.request_code || permission != Permission::Map {
            debug!(?permission, request_code, "permission result for another request");
            return false;
        }
        self.slot.resolve(grant.is_granted())
    }

    /// Cancel the outstanding request; its waiter observes `false`.
    pub fn cancel(&self) {
        self.slot.cancel();
    }

    pub fn is_pending(&self) -> bool {
        self.slot.is_armed()
    }
}
