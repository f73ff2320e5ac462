//! [`NavigationCoordinator`] – one awaited navigation goal at a time.
//!
//! Each call to [`go_to_and_await`][NavigationCoordinator::go_to_and_await]
//! installs a fresh goal (destination name + gate), replacing and cancelling
//! whatever goal was there before, then issues the `go_to` command.  Status
//! callbacks are matched case-insensitively against the current goal's
//! destination, so a late `complete` for an abandoned destination can never
//! resolve the current one.
//!
//! Every failure mode (device abort, timeout, cancellation, rejected
//! command) folds into [`GoToOutcome::Abort`].
//!
//! Issuing `go_to` and [`cancel_goal`][NavigationCoordinator::cancel_goal]
//! are serialised, so once a goal was cancelled (or the caller's token
//! fired) no `go_to` for it reaches the device afterwards.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use votebot_middleware::RobotDevice;
use votebot_types::{GoToOutcome, NavigationStatus, VoteBotError};

use crate::gate::{GateError, Resolver, gate};
use crate::lock;
use crate::patrol::Navigator;

struct ActiveGoal {
    id: u64,
    location: String,
    resolver: Resolver<GoToOutcome>,
}

pub struct NavigationCoordinator {
    device: Arc<dyn RobotDevice>,
    goal: Mutex<Option<ActiveGoal>>,
    /// Held while a `go_to` is issued and while a goal is cancelled.
    issue: Mutex<()>,
    next_goal_id: AtomicU64,
    timeout: Duration,
    retry_delay: Duration,
}

/// Clears the goal slot when an await ends, but only if the slot still
/// holds the goal this await installed.
struct GoalGuard<'a> {
    nav: &'a NavigationCoordinator,
    id: u64,
}

impl Drop for GoalGuard<'_> {
    fn drop(&mut self) {
        let mut goal = lock(&self.nav.goal);
        if goal.as_ref().is_some_and(|g| g.id == self.id) {
            *goal = None;
        }
    }
}

impl NavigationCoordinator {
    /// `timeout` bounds each attempt; `retry_delay` separates an abort from
    /// its retry in [`go_to_with_retry`][Self::go_to_with_retry].
    pub fn new(device: Arc<dyn RobotDevice>, timeout: Duration, retry_delay: Duration) -> Self {
        Self {
            device,
            goal: Mutex::new(None),
            issue: Mutex::new(()),
            next_goal_id: AtomicU64::new(1),
            timeout,
            retry_delay,
        }
    }

    pub async fn go_to_and_await(&self, location: &str) -> GoToOutcome {
        self.go_to_and_await_for(location, self.timeout).await
    }

    /// Drive to `location` and wait at most `timeout` for `complete` or
    /// `abort`.
    ///
    /// The final in-place rotation is suppressed so consecutive goals flow
    /// into each other.  Dropping the returned future clears the goal.
    pub async fn go_to_and_await_for(&self, location: &str, timeout: Duration) -> GoToOutcome {
        self.attempt(location, timeout, None).await
    }

    async fn attempt(
        &self,
        location: &str,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> GoToOutcome {
        let (resolver, waiter) = gate();
        let id = self.next_goal_id.fetch_add(1, Ordering::Relaxed);

        let previous = lock(&self.goal).replace(ActiveGoal {
            id,
            location: location.to_string(),
            resolver,
        });
        if let Some(previous) = previous {
            debug!(superseded = %previous.location, %location, "navigation goal replaced");
        }
        let _guard = GoalGuard { nav: self, id };

        {
            let _issue = lock(&self.issue);
            if cancel.is_some_and(CancellationToken::is_cancelled) || !self.holds_goal(id) {
                debug!(%location, "goal withdrawn before go_to was issued");
                return GoToOutcome::Abort;
            }
            // The slot lock is released: the device may call back synchronously.
            if let Err(e) = self.device.go_to(location, true) {
                warn!(%location, error = %e, "go_to rejected by device");
                return GoToOutcome::Abort;
            }
        }

        match waiter.wait_for(timeout).await {
            Ok(outcome) => {
                debug!(%location, ?outcome, "navigation goal resolved");
                outcome
            }
            Err(GateError::TimedOut) => {
                warn!(%location, ?timeout, "navigation goal timed out");
                GoToOutcome::Abort
            }
            Err(e) => {
                debug!(%location, error = %e, "navigation goal cancelled");
                GoToOutcome::Abort
            }
        }
    }

    /// Try `location` up to `retries + 1` times.
    ///
    /// Returns `true` on the first `Complete`.  Aborted attempts are
    /// separated by the configured retry delay.
    pub async fn go_to_with_retry(&self, location: &str, retries: u32) -> bool {
        self.retry(location, retries, None).await
    }

    /// [`go_to_with_retry`][Self::go_to_with_retry] that gives up, without
    /// issuing further commands, once `cancel` fires.
    pub async fn go_to_with_retry_until(
        &self,
        location: &str,
        retries: u32,
        cancel: &CancellationToken,
    ) -> bool {
        self.retry(location, retries, Some(cancel)).await
    }

    async fn retry(&self, location: &str, retries: u32, cancel: Option<&CancellationToken>) -> bool {
        for attempt in 0..=retries {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return false;
            }
            if self.attempt(location, self.timeout, cancel).await == GoToOutcome::Complete {
                return true;
            }
            if attempt < retries {
                debug!(%location, attempt, "navigation aborted, retrying");
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        false
    }

    /// Halt the base.  The device reports `abort` for the goal it was
    /// driving to, which resolves the current goal.
    pub fn stop_movement(&self) -> Result<(), VoteBotError> {
        self.device.stop_movement()
    }

    /// Apply a navigation status update from the device.
    ///
    /// Returns `true` when the current goal was resolved.
    pub fn on_status(&self, location: &str, status: NavigationStatus) -> bool {
        let outcome = match status {
            NavigationStatus::Complete => GoToOutcome::Complete,
            NavigationStatus::Abort => GoToOutcome::Abort,
            _ => return false,
        };

        let resolver = {
            let mut goal = lock(&self.goal);
            match goal.as_ref() {
                Some(g) if g.location.to_lowercase() == location.to_lowercase() => {
                    goal.take().map(|g| g.resolver)
                }
                Some(g) => {
                    debug!(%location, current = %g.location, %status, "stale navigation status");
                    None
                }
                None => {
                    debug!(%location, %status, "navigation status with no active goal");
                    None
                }
            }
        };
        resolver.is_some_and(|r| r.resolve(outcome))
    }

    /// Cancel the current goal; its waiter observes `Abort`.
    pub fn cancel_goal(&self) -> bool {
        let _issue = lock(&self.issue);
        lock(&self.goal).take().is_some()
    }

    fn holds_goal(&self, id: u64) -> bool {
        lock(&self.goal).as_ref().is_some_and(|g| g.id == id)
    }

    /// Destination of the current goal, if any.
    pub fn current_goal(&self) -> Option<String> {
        lock(&self.goal).as_ref().map(|g| g.location.clone())
    }
}

#[async_trait]
impl Navigator for NavigationCoordinator {
    async fn go_to_with_retry(&self, location: &str, retries: u32, cancel: &CancellationToken) -> bool {
        self.go_to_with_retry_until(location, retries, cancel).await
    }

    fn cancel_goal(&self) {
        NavigationCoordinator::cancel_goal(self);
    }

    fn stop_movement(&self) -> Result<(), VoteBotError> {
        NavigationCoordinator::stop_movement(self)
    }
}
