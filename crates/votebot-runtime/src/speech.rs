//! [`SpeechCoordinator`] – text-to-speech with optional completion wait.
//!
//! [`speak`][SpeechCoordinator::speak] fires and forgets.
//! [`speak_and_wait`][SpeechCoordinator::speak_and_wait] registers a gate
//! under the request's fresh id and suspends until the device reports a
//! terminal status for that exact id, or until the timeout elapses.
//! Concurrent waits never cross-resolve because each id is unique.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;
use votebot_middleware::RobotDevice;
use votebot_types::{SpeechRequest, SpeechStatus, VoteBotError};

use crate::gate::{GateError, GateRegistry};

pub struct SpeechCoordinator {
    device: Arc<dyn RobotDevice>,
    pending: GateRegistry<Uuid, ()>,
    timeout: Duration,
}

impl SpeechCoordinator {
    /// `timeout` is the default bound used by
    /// [`speak_and_wait`][Self::speak_and_wait].
    pub fn new(device: Arc<dyn RobotDevice>, timeout: Duration) -> Self {
        Self {
            device,
            pending: GateRegistry::new(),
            timeout,
        }
    }

    /// Issue a speech request and return immediately.
    pub fn speak(&self, text: &str) -> Result<Uuid, VoteBotError> {
        let request = SpeechRequest::new(text);
        self.device.speak(&request)?;
        debug!(request_id = %request.id, "speech issued");
        Ok(request.id)
    }

    /// Speak and wait for the default timeout.
    pub async fn speak_and_wait(&self, text: &str) -> Result<(), VoteBotError> {
        self.speak_and_wait_for(text, self.timeout).await
    }

    /// Speak and suspend until the device reports completed, error, canceled
    /// or not-allowed for this request.
    ///
    /// # Errors
    ///
    /// * [`VoteBotError::Timeout`] – no terminal status within `timeout`.
    ///   The gate is removed; the device request itself is left alone.
    /// * [`VoteBotError::Cancelled`] – the coordinator was torn down while
    ///   waiting.
    /// * Any error the device returned when the request was issued.
    pub async fn speak_and_wait_for(
        &self,
        text: &str,
        timeout: Duration,
    ) -> Result<(), VoteBotError> {
        let request = SpeechRequest::new(text);
        let registration = self
            .pending
            .register(request.id)
            .map_err(|e| VoteBotError::Channel(format!("speech gate {}: {e}", request.id)))?;

        // On error the registration drops here and takes its entry with it.
        self.device.speak(&request)?;

        match registration.wait_for(timeout).await {
            Ok(()) => Ok(()),
            Err(GateError::TimedOut) => {
                warn!(request_id = %request.id, ?timeout, "speech did not finish in time");
                Err(VoteBotError::Timeout {
                    operation: "speak_and_wait",
                    after: timeout,
                })
            }
            Err(e) => Err(VoteBotError::Cancelled(format!(
                "speech request {}: {e}",
                request.id
            ))),
        }
    }

    /// Apply a speech status update from the device.
    ///
    /// Only terminal statuses resolve a gate.  Returns `true` when a waiter
    /// was woken.
    pub fn on_status(&self, request_id: Uuid, status: SpeechStatus) -> bool {
        if !status.is_terminal() {
            return false;
        }
        let woke = self.pending.resolve(&request_id, ());
        if !woke {
            debug!(%request_id, ?status, "speech status for no pending request");
        }
        woke
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Cancel every outstanding wait.
    pub fn cancel_all(&self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use votebot_middleware::{RobotListener, SimRobot};
    use votebot_types::RobotCallback;

    /// Routes speech callbacks straight into the coordinator.
    struct SpeechOnly(Arc<SpeechCoordinator>);

    impl RobotListener for SpeechOnly {
        fn on_callback(&self, callback: RobotCallback) {
            if let RobotCallback::SpeechStatus { request_id, status } = callback {
                self.0.on_status(request_id, status);
            }
        }
    }

    fn setup(robot: &SimRobot, timeout: Duration) -> Arc<SpeechCoordinator> {
        let speech = Arc::new(SpeechCoordinator::new(Arc::new(robot.clone()), timeout));
        robot.add_listener(Arc::new(SpeechOnly(Arc::clone(&speech))));
        speech
    }

    #[tokio::test]
    async fn speak_and_wait_returns_on_completion() {
        let robot = SimRobot::new();
        let speech = setup(&robot, Duration::from_secs(2));

        speech.speak_and_wait("hola").await.unwrap();
        assert_eq!(speech.pending_count(), 0);
    }

    #[tokio::test]
    async fn device_answering_inline_still_completes() {
        let robot = SimRobot::new();
        robot.configure(|b| b.speech_latency = Some(Duration::ZERO));
        let speech = setup(&robot, Duration::from_millis(200));

        speech.speak_and_wait("hola").await.unwrap();
        assert_eq!(speech.pending_count(), 0);
    }

    #[tokio::test]
    async fn error_status_also_unblocks() {
        let robot = SimRobot::new();
        robot.configure(|b| b.speech_outcome = SpeechStatus::NotAllowed);
        let speech = setup(&robot, Duration::from_secs(2));

        assert!(speech.speak_and_wait("hola").await.is_ok());
    }

    #[tokio::test]
    async fn silent_device_times_out_and_cleans_up() {
        let robot = SimRobot::new();
        robot.configure(|b| b.speech_latency = None);
        let speech = setup(&robot, Duration::from_millis(50));

        let result = speech.speak_and_wait("¿hay alguien?").await;
        assert_eq!(
            result,
            Err(VoteBotError::Timeout {
                operation: "speak_and_wait",
                after: Duration::from_millis(50)
            })
        );
        assert_eq!(speech.pending_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_waits_are_independent() {
        let robot = SimRobot::new();
        let speech = setup(&robot, Duration::from_secs(2));

        let (a, b, c) = tokio::join!(
            speech.speak_and_wait("uno"),
            speech.speak_and_wait("dos"),
            speech.speak_and_wait("tres"),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(speech.pending_count(), 0);
    }

    #[test]
    fn fire_and_forget_registers_nothing() {
        let robot = SimRobot::new();
        robot.configure(|b| b.speech_latency = None);
        let speech = setup(&robot, Duration::from_secs(2));

        let id = speech.speak("hola").unwrap();
        assert_eq!(speech.pending_count(), 0);
        assert!(!speech.on_status(id, SpeechStatus::Completed));
    }

    #[tokio::test]
    async fn non_terminal_status_is_ignored() {
        let robot = SimRobot::new();
        robot.configure(|b| b.speech_latency = None);
        let speech = setup(&robot, Duration::from_secs(2));

        let waiting = {
            let speech = Arc::clone(&speech);
            tokio::spawn(async move { speech.speak_and_wait("hola").await })
        };
        while speech.pending_count() == 0 {
            tokio::task::yield_now().await;
        }
        let id = robot
            .commands()
            .iter()
            .find_map(|c| match c {
                votebot_middleware::DeviceCommand::Speak { id, .. } => Some(*id),
                _ => None,
            })
            .unwrap();

        assert!(!speech.on_status(id, SpeechStatus::Processing));
        assert_eq!(speech.pending_count(), 1);
        assert!(speech.on_status(id, SpeechStatus::Canceled));
        assert!(waiting.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn cancel_all_fails_waiters_with_cancelled() {
        let robot = SimRobot::new();
        robot.configure(|b| b.speech_latency = None);
        let speech = setup(&robot, Duration::from_secs(5));

        let waiting = {
            let speech = Arc::clone(&speech);
            tokio::spawn(async move { speech.speak_and_wait("hola").await })
        };
        while speech.pending_count() == 0 {
            tokio::task::yield_now().await;
        }
        speech.cancel_all();
        assert!(matches!(waiting.await.unwrap(), Err(VoteBotError::Cancelled(_))));
    }
}
