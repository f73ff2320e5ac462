//! `votebot-middleware` – the device boundary.
//!
//! Everything that touches the robot directly lives here, so the control
//! runtime only ever speaks to traits and channels.
//!
//! # Modules
//!
//! - [`adapter`] – [`RobotDevice`] (commands issued to the robot) and
//!   [`RobotListener`] (callbacks the robot delivers).
//! - [`bus`] – [`InteractionBus`], a bounded broadcast channel that fans
//!   physical-interaction signals out to any number of subscribers.
//! - [`sim`] – [`SimRobot`], an in-process robot used by tests and the CLI.

pub mod adapter;
pub mod bus;
pub mod sim;

pub use adapter::{RobotDevice, RobotListener};
pub use bus::{InteractionBus, InteractionSubscriber};
pub use sim::{DeviceCommand, SimBehavior, SimRobot};
