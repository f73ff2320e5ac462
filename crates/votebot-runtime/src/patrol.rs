//! [`PatrolEngine`] – autonomous cyclic patrol over saved locations.
//!
//! # State machine
//!
//! ```text
//!   Idle ──start(route)──▶ Stepping(0) ──▶ Stepping(1) ──▶ … ──▶ Stepping(n-1)
//!    ▲                          ▲                                      │
//!    │                          └──────────────────────────────────────┘
//!    └────────────────────────── stop() from any state
//! ```
//!
//! Each step drives to `route[index]` through a [`Navigator`] with a bounded
//! retry, then advances the index whether the stop was reached or not.  A
//! step that was given up on is followed by a short cooldown so a
//! persistently unreachable location cannot spin the loop.
//!
//! The loop runs in its own task and is cancelled through a
//! [`CancellationToken`].  Every suspension point (the navigation await and
//! the cooldown) races against the token, so [`PatrolEngine::stop`]
//! interrupts an in-flight wait instead of waiting for the step to finish.
//! The token is also handed to the [`Navigator`], which must not issue a
//! new goal once it has fired.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use votebot_types::VoteBotError;

use crate::lock;

/// The navigation surface the patrol loop needs.
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Drive to `location`, retrying up to `retries` extra times.  Returns
    /// `true` once the location was reached, `false` as soon as `cancel`
    /// has fired.
    async fn go_to_with_retry(&self, location: &str, retries: u32, cancel: &CancellationToken) -> bool;

    /// Cancel the goal currently being awaited, if any.
    fn cancel_goal(&self);

    fn stop_movement(&self) -> Result<(), VoteBotError>;
}

/// Observable patrol state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatrolState {
    Idle,
    Stepping { location: String, index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatrolPolicy {
    /// Extra attempts per stop after an abort.
    pub retries: u32,
    /// Pause after a stop was skipped.
    pub failure_cooldown: Duration,
}

impl Default for PatrolPolicy {
    fn default() -> Self {
        Self {
            retries: 1,
            failure_cooldown: Duration::from_millis(150),
        }
    }
}

struct PatrolRun {
    route: Arc<[String]>,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct PatrolEngine {
    navigator: Arc<dyn Navigator>,
    policy: PatrolPolicy,
    run: Mutex<Option<PatrolRun>>,
    state: Arc<Mutex<PatrolState>>,
}

impl PatrolEngine {
    pub fn new(navigator: Arc<dyn Navigator>, policy: PatrolPolicy) -> Self {
        Self {
            navigator,
            policy,
            run: Mutex::new(None),
            state: Arc::new(Mutex::new(PatrolState::Idle)),
        }
    }

    /// Start patrolling `route`, stopping any patrol already running.
    ///
    /// An empty route is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`VoteBotError::NoRuntime`] when called outside a Tokio
    /// runtime.
    pub fn start(&self, route: Vec<String>) -> Result<(), VoteBotError> {
        if route.is_empty() {
            debug!("empty patrol route, staying idle");
            return Ok(());
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| VoteBotError::NoRuntime)?;

        self.stop();

        let route: Arc<[String]> = route.into();
        let token = CancellationToken::new();
        let handle = runtime.spawn(run_patrol(
            Arc::clone(&self.navigator),
            Arc::clone(&route),
            self.policy,
            token.clone(),
            Arc::clone(&self.state),
        ));
        info!(stops = route.len(), route = ?route, "patrol started");

        *lock(&self.run) = Some(PatrolRun {
            route,
            token,
            handle,
        });
        Ok(())
    }

    /// Stop the patrol: cancel the loop, cancel the pending goal and halt
    /// the base.  Safe to call when nothing is running.
    pub fn stop(&self) {
        let run = lock(&self.run).take();
        if let Some(run) = run {
            run.token.cancel();
            info!(stops = run.route.len(), "patrol stopped");
        }
        *lock(&self.state) = PatrolState::Idle;

        self.navigator.cancel_goal();
        if let Err(e) = self.navigator.stop_movement() {
            warn!(error = %e, "stop_movement failed while stopping patrol");
        }
    }

    /// `true` while a patrol task is running.
    pub fn is_active(&self) -> bool {
        lock(&self.run)
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
    }

    pub fn state(&self) -> PatrolState {
        lock(&self.state).clone()
    }

    /// The route of the running patrol.
    pub fn route(&self) -> Option<Vec<String>> {
        lock(&self.run).as_ref().map(|run| run.route.to_vec())
    }
}

async fn run_patrol(
    navigator: Arc<dyn Navigator>,
    route: Arc<[String]>,
    policy: PatrolPolicy,
    token: CancellationToken,
    state: Arc<Mutex<PatrolState>>,
) {
    let mut index = 0;
    loop {
        let location = &route[index];
        {
            // Checked under the state lock so a concurrent stop() always has
            // the last word on the published state.
            let mut state = lock(&state);
            if token.is_cancelled() {
                break;
            }
            *state = PatrolState::Stepping {
                location: location.clone(),
                index,
            };
        }

        let reached = tokio::select! {
            biased;
            () = token.cancelled() => break,
            reached = navigator.go_to_with_retry(location, policy.retries, &token) => reached,
        };

        index = (index + 1) % route.len();

        if !reached {
            debug!(%location, "patrol stop skipped");
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                () = tokio::time::sleep(policy.failure_cooldown) => {}
            }
        }
    }
    debug!("patrol task exited");
}

/// Build a patrol route from the robot's saved locations.
///
/// Keeps names that start with `prefix` (case-insensitively) followed by an
/// integer, orders them by that integer and keeps the first `max`.
pub fn build_route(saved: &[String], prefix: &str, max: usize) -> Vec<String> {
    let prefix = prefix.to_lowercase();
    let mut numbered: Vec<(i64, &String)> = saved
        .iter()
        .filter_map(|name| {
            let lower = name.trim().to_lowercase();
            let suffix = lower.strip_prefix(prefix.as_str())?.trim();
            suffix.parse::<i64>().ok().map(|n| (n, name))
        })
        .collect();
    numbered.sort_by_key(|(n, _)| *n);
    numbered
        .into_iter()
        .take(max)
        .map(|(_, name)| name.clone())
        .collect()
}
