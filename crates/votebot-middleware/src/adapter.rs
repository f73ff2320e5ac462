//! The Robot Adapter Pattern.
//!
//! The runtime never calls a vendor SDK directly.  It talks to a
//! [`RobotDevice`], and receives everything the robot reports through a
//! single [`RobotListener`].
//!
//! # Overview
//!
//! - [`RobotDevice`] – the command surface: speech, navigation, stop,
//!   saved locations and permissions.
//! - [`RobotListener`] – one callback for every notification kind, carried as
//!   a tagged [`RobotCallback`].
//! - [`SimRobot`][crate::sim::SimRobot] – an in-process implementation.

use std::sync::Arc;

use votebot_types::{Permission, PermissionGrant, RobotCallback, SpeechRequest, VoteBotError};

/// Receiver for every asynchronous notification the robot produces.
///
/// # Contract
///
/// `on_callback` is invoked on the device's own thread.  Implementations
/// must return quickly and must never block on the caller side of the
/// runtime.
pub trait RobotListener: Send + Sync {
    fn on_callback(&self, callback: RobotCallback);
}

/// Command surface of the robot.
///
/// # Contract
///
/// * Commands are fire-and-forget.  An `Ok(())` only means the request was
///   accepted; its result arrives later through a [`RobotListener`].
///
/// * Results may arrive in any order relative to the commands that caused
///   them, including after a newer command has been issued.
pub trait RobotDevice: Send + Sync {
    /// Queue a text-to-speech request.  Status updates are tagged with
    /// `request.id`.
    fn speak(&self, request: &SpeechRequest) -> Result<(), VoteBotError>;

    /// Start driving to a saved location.
    ///
    /// `no_rotation_at_end` skips the final in-place turn so consecutive
    /// goals blend into continuous movement.
    fn go_to(&self, location: &str, no_rotation_at_end: bool) -> Result<(), VoteBotError>;

    /// Halt all base movement immediately.
    fn stop_movement(&self) -> Result<(), VoteBotError>;

    /// Names of the locations saved on the robot's map, in device order.
    fn locations(&self) -> Vec<String>;

    fn check_self_permission(&self, permission: Permission) -> PermissionGrant;

    /// Ask the operator to grant `permissions`.  The answer comes back as a
    /// [`RobotCallback::PermissionResult`] carrying `request_code`.
    fn request_permissions(
        &self,
        permissions: &[Permission],
        request_code: i32,
    ) -> Result<(), VoteBotError>;

    fn add_listener(&self, listener: Arc<dyn RobotListener>);

    /// Detach a listener previously passed to [`add_listener`][Self::add_listener].
    /// Unknown listeners are ignored.
    fn remove_listener(&self, listener: &Arc<dyn RobotListener>);
}
