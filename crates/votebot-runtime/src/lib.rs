//! `votebot-runtime` – robot control for the voting kiosk.
//!
//! Turns the robot's callback-style SDK into awaitable operations and a
//! cancellable patrol loop.
//!
//! # Modules
//!
//! - [`gate`] – one-shot completion gates: [`GateRegistry`][gate::GateRegistry]
//!   for keyed waits and [`GateSlot`][gate::GateSlot] for a single
//!   outstanding wait.
//! - [`speech`] – [`SpeechCoordinator`]: fire-and-forget and awaited TTS.
//! - [`navigation`] – [`NavigationCoordinator`]: awaited `go_to` with a
//!   single active goal, retries, and stop.
//! - [`patrol`] – [`PatrolEngine`]: a background task that cycles through
//!   saved locations until cancelled.
//! - [`permission`] – [`PermissionGate`]: awaited map-permission request.
//! - [`dispatcher`] – [`RobotEventDispatcher`]: routes device callbacks to
//!   the gates above and to the interaction bus.
//! - [`controller`] – [`RobotController`]: the facade the kiosk UI uses.
//! - [`ballot`] – [`Ballot`]: on-screen ballot selection logic.
//! - [`config`] – [`ControllerConfig`]: timeouts, delays and route rules.
//! - [`telemetry`] – [`init_tracing`]: global `tracing` subscriber.
//!
//! # Threading
//!
//! Device callbacks may arrive on any thread.  Nothing on the callback path
//! blocks or awaits; it only resolves gates and publishes on a broadcast
//! channel.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod ballot;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod gate;
pub mod navigation;
pub mod patrol;
pub mod permission;
pub mod speech;
pub mod telemetry;

pub use ballot::{Ballot, BallotEvent, BallotState, DEFAULT_WINNING_NUMBER};
pub use config::{ControllerConfig, MAP_PERMISSION_REQUEST_CODE};
pub use controller::RobotController;
pub use dispatcher::{RobotEventDispatcher, Routed};
pub use navigation::NavigationCoordinator;
pub use patrol::{Navigator, PatrolEngine, PatrolPolicy, PatrolState, build_route};
pub use permission::PermissionGate;
pub use speech::SpeechCoordinator;
pub use telemetry::{LogFormat, init_tracing};

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// Every critical section in this crate leaves its data consistent before
/// any call that could panic, so the poisoned value is still valid.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
