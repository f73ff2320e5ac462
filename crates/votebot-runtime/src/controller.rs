//! [`RobotController`] – the facade the kiosk UI talks to.
//!
//! Wires the coordinators, the patrol engine and the interaction bus to one
//! [`RobotDevice`], and registers a single [`RobotEventDispatcher`] as the
//! device's listener.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use votebot_middleware::SimRobot;
//! use votebot_runtime::{ControllerConfig, RobotController};
//!
//! # async fn demo() {
//! let robot = SimRobot::new();
//! robot.set_locations(["ubicacion1", "ubicacion2"]);
//!
//! let controller = RobotController::new(Arc::new(robot), ControllerConfig::default());
//! controller.start_patrol(controller.default_patrol_route()).unwrap();
//!
//! let mut touches = controller.interactions();
//! touches.recv().await;
//! controller.stop_patrol();
//! controller.speak_and_wait("¡Hola!").await.ok();
//! controller.dispose();
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::stream::BoxStream;
use tracing::info;
use uuid::Uuid;
use votebot_middleware::{InteractionBus, InteractionSubscriber, RobotDevice, RobotListener};
use votebot_types::{InteractionEvent, VoteBotError};

use crate::config::ControllerConfig;
use crate::dispatcher::RobotEventDispatcher;
use crate::navigation::NavigationCoordinator;
use crate::patrol::{self, PatrolEngine, PatrolPolicy, PatrolState};
use crate::permission::PermissionGate;
use crate::speech::SpeechCoordinator;

pub struct RobotController {
    device: Arc<dyn RobotDevice>,
    config: ControllerConfig,
    speech: Arc<SpeechCoordinator>,
    navigation: Arc<NavigationCoordinator>,
    permission: Arc<PermissionGate>,
    patrol: PatrolEngine,
    interactions: InteractionBus,
    listener: Arc<dyn RobotListener>,
    disposed: AtomicBool,
}

impl RobotController {
    /// Build the controller and attach its dispatcher to `device`.
    pub fn new(device: Arc<dyn RobotDevice>, config: ControllerConfig) -> Self {
        let speech = Arc::new(SpeechCoordinator::new(
            Arc::clone(&device),
            config.speech_timeout,
        ));
        let navigation = Arc::new(NavigationCoordinator::new(
            Arc::clone(&device),
            config.navigation_timeout,
            config.retry_delay,
        ));
        let permission = Arc::new(PermissionGate::new(
            Arc::clone(&device),
            config.permission_request_code,
            config.permission_timeout,
        ));
        let patrol = PatrolEngine::new(
            navigation.clone(),
            PatrolPolicy {
                retries: config.patrol_retries,
                failure_cooldown: config.failure_cooldown,
            },
        );
        let interactions = InteractionBus::new(config.interaction_capacity);

        let listener: Arc<dyn RobotListener> = Arc::new(RobotEventDispatcher::new(
            Arc::clone(&speech),
            Arc::clone(&navigation),
            Arc::clone(&permission),
            interactions.clone(),
        ));
        device.add_listener(Arc::clone(&listener));
        info!("robot controller attached");

        Self {
            device,
            config,
            speech,
            navigation,
            permission,
            patrol,
            interactions,
            listener,
            disposed: AtomicBool::new(false),
        }
    }

    // ── Speech ──────────────────────────────────────────────────────────────

    /// Fire-and-forget speech.  Returns the request id.
    pub fn speak(&self, text: &str) -> Result<Uuid, VoteBotError> {
        self.ensure_live()?;
        self.speech.speak(text)
    }

    /// Speak and wait up to the configured speech timeout.
    pub async fn speak_and_wait(&self, text: &str) -> Result<(), VoteBotError> {
        self.speak_and_wait_for(text, self.config.speech_timeout).await
    }

    pub async fn speak_and_wait_for(&self, text: &str, timeout: Duration) -> Result<(), VoteBotError> {
        self.ensure_live()?;
        self.speech.speak_and_wait_for(text, timeout).await
    }

    // ── Movement ────────────────────────────────────────────────────────────

    pub fn stop_movement(&self) -> Result<(), VoteBotError> {
        self.navigation.stop_movement()
    }

    /// Patrol route from the device's saved locations.
    pub fn build_patrol_route(&self, prefix: &str, max: usize) -> Vec<String> {
        patrol::build_route(&self.device.locations(), prefix, max)
    }

    /// [`build_patrol_route`][Self::build_patrol_route] with the configured
    /// prefix and length.
    pub fn default_patrol_route(&self) -> Vec<String> {
        self.build_patrol_route(&self.config.route_prefix, self.config.max_route_len)
    }

    /// Start cycling through `route`; an empty route is a no-op.
    pub fn start_patrol(&self, route: Vec<String>) -> Result<(), VoteBotError> {
        self.ensure_live()?;
        self.patrol.start(route)
    }

    /// Stop the patrol and halt the base.  Safe to call at any time.
    pub fn stop_patrol(&self) {
        self.patrol.stop();
    }

    pub fn patrol_state(&self) -> PatrolState {
        self.patrol.state()
    }

    pub fn is_patrolling(&self) -> bool {
        self.patrol.is_active()
    }

    // ── Permissions ─────────────────────────────────────────────────────────

    pub fn has_map_permission(&self) -> bool {
        self.permission.has_map_permission()
    }

    pub async fn ensure_map_permission(&self) -> bool {
        if self.ensure_live().is_err() {
            return false;
        }
        self.permission.ensure_map_permission().await
    }

    // ── Interactions ────────────────────────────────────────────────────────

    /// Subscribe to physical interactions (touch, clicked hard button).
    pub fn interactions(&self) -> InteractionSubscriber {
        self.interactions.subscribe()
    }

    pub fn interaction_stream(&self) -> BoxStream<'static, InteractionEvent> {
        self.interactions.stream()
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Tear everything down: stop the patrol, detach from the device and
    /// fail every outstanding wait.  Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.patrol.stop();
        self.device.remove_listener(&self.listener);
        self.permission.cancel();
        self.speech.cancel_all();
        self.navigation.cancel_goal();
        info!("robot controller disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn ensure_live(&self) -> Result<(), VoteBotError> {
        if self.is_disposed() {
            Err(VoteBotError::Cancelled("robot controller disposed".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Drop for RobotController {
    fn drop(&mut self) {
        self.dispose();
    }
}
