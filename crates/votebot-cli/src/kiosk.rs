//! Kiosk screen flow: `Attract -> Ballot -> Video -> Ballot`.
//!
//! While on Attract the robot patrols.  A physical interaction stops the
//! patrol and opens the ballot; a ballot left alone for the inactivity
//! timeout is reset and the kiosk falls back to Attract, which restarts the
//! patrol.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use votebot_runtime::{Ballot, BallotEvent, BallotState, RobotController};
use votebot_types::VoteBotError;

/// How often the background task checks the inactivity deadline.
const INACTIVITY_POLL: Duration = Duration::from_millis(500);

pub const ATTRACT_ANNOUNCEMENT: &str =
    "¡Hola! Toca la pantalla para jugar. O presiona el botón seguir.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Attract,
    Ballot,
    Video,
}

#[derive(Debug, Clone)]
pub struct KioskSettings {
    pub inactivity_timeout: Duration,
    pub winning_number: u32,
    pub candidate: String,
    /// Path or URI of the candidate video.
    pub video: String,
    pub announcement: String,
}

struct KioskState {
    screen: Screen,
    ballot: Ballot,
    last_activity: Instant,
}

pub struct Kiosk {
    controller: Arc<RobotController>,
    settings: KioskSettings,
    state: Mutex<KioskState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Kiosk {
    /// The kiosk starts on Attract with the patrol not yet running; call
    /// [`enter_attract`][Self::enter_attract] to start it.
    pub fn new(controller: Arc<RobotController>, settings: KioskSettings) -> Self {
        let ballot = Ballot::new(settings.winning_number, settings.candidate.clone());
        Self {
            controller,
            settings,
            state: Mutex::new(KioskState {
                screen: Screen::Attract,
                ballot,
                last_activity: Instant::now(),
            }),
        }
    }

    pub fn screen(&self) -> Screen {
        lock(&self.state).screen
    }

    pub fn ballot_state(&self) -> BallotState {
        lock(&self.state).ballot.state().clone()
    }

    pub fn settings(&self) -> &KioskSettings {
        &self.settings
    }

    /// Show Attract with a blank ballot and start patrolling.
    pub fn enter_attract(&self) -> Result<(), VoteBotError> {
        {
            let mut state = lock(&self.state);
            state.screen = Screen::Attract;
            state.ballot.staff_reset();
        }
        let route = self.controller.default_patrol_route();
        if route.is_empty() {
            warn!("no saved patrol locations, robot stays in place");
        }
        info!(?route, "attract screen");
        self.controller.start_patrol(route)
    }

    /// React to a touch or a clicked button.  Only Attract responds.
    pub fn on_interaction(&self) -> bool {
        {
            let mut state = lock(&self.state);
            if state.screen != Screen::Attract {
                return false;
            }
            state.screen = Screen::Ballot;
            state.last_activity = Instant::now();
        }
        self.controller.stop_patrol();
        info!("interaction detected, showing ballot");
        true
    }

    /// Press a number on the ballot and carry out the resulting events.
    ///
    /// Returns the events that were performed; empty when the ballot is not
    /// on screen.
    pub async fn press(&self, number: u32) -> Vec<BallotEvent> {
        let events = {
            let mut state = lock(&self.state);
            if state.screen != Screen::Ballot {
                debug!(number, screen = ?state.screen, "ballot not on screen");
                return Vec::new();
            }
            state.last_activity = Instant::now();
            state.ballot.press(number)
        };

        for event in &events {
            match event {
                BallotEvent::PlayWin | BallotEvent::PlayLose => {
                    debug!(?event, "sound effect");
                }
                BallotEvent::Speak(text) => {
                    if let Err(e) = self.controller.speak_and_wait(text).await {
                        warn!(error = %e, "ballot speech did not finish");
                    }
                }
                BallotEvent::NavigateToVideo => {
                    let mut state = lock(&self.state);
                    if state.screen == Screen::Ballot {
                        state.screen = Screen::Video;
                        info!(video = %self.settings.video, "playing candidate video");
                    }
                }
            }
        }
        lock(&self.state).last_activity = Instant::now();
        events
    }

    pub fn dismiss_lose_dialog(&self) {
        let mut state = lock(&self.state);
        state.ballot.dismiss_lose_dialog();
        state.last_activity = Instant::now();
    }

    /// Staff shortcut: clear the ballot without leaving it.
    pub fn staff_reset(&self) {
        let mut state = lock(&self.state);
        state.ballot.staff_reset();
        state.last_activity = Instant::now();
    }

    /// The candidate video ended; go back to a fresh ballot.
    pub fn finish_video(&self) -> bool {
        let mut state = lock(&self.state);
        if state.screen != Screen::Video {
            return false;
        }
        state.screen = Screen::Ballot;
        state.ballot.staff_reset();
        state.last_activity = Instant::now();
        true
    }

    /// Fall back to Attract if the ballot has been idle too long.
    pub fn check_inactivity(&self) -> Result<bool, VoteBotError> {
        let expired = {
            let state = lock(&self.state);
            state.screen == Screen::Ballot
                && state.last_activity.elapsed() >= self.settings.inactivity_timeout
        };
        if expired {
            info!(timeout = ?self.settings.inactivity_timeout, "ballot idle, back to attract");
            self.enter_attract()?;
        }
        Ok(expired)
    }

    /// Pause the patrol for the spoken invitation, then resume it unless
    /// someone walked up in the meantime.
    pub async fn announce(&self) -> bool {
        if self.screen() != Screen::Attract {
            return false;
        }
        self.controller.stop_patrol();
        if let Err(e) = self
            .controller
            .speak_and_wait(&self.settings.announcement)
            .await
        {
            warn!(error = %e, "attract announcement did not finish");
        }
        if self.screen() == Screen::Attract {
            let route = self.controller.default_patrol_route();
            if let Err(e) = self.controller.start_patrol(route) {
                warn!(error = %e, "could not resume patrol");
            }
        }
        true
    }

    /// Run the interaction listener and the inactivity timer until `token`
    /// is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`VoteBotError::NoRuntime`] when called outside a Tokio
    /// runtime.
    pub fn spawn_background(
        self: &Arc<Self>,
        token: CancellationToken,
    ) -> Result<JoinHandle<()>, VoteBotError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| VoteBotError::NoRuntime)?;
        let kiosk = Arc::clone(self);
        let mut interactions = self.controller.interactions();

        Ok(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(INACTIVITY_POLL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    event = interactions.recv() => match event {
                        Some(_) => {
                            kiosk.on_interaction();
                        }
                        None => break,
                    },
                    _ = ticker.tick() => {
                        if let Err(e) = kiosk.check_inactivity() {
                            warn!(error = %e, "inactivity check failed");
                        }
                    }
                }
            }
            debug!("kiosk background task exited");
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use votebot_middleware::{DeviceCommand, SimRobot};
    use votebot_runtime::ControllerConfig;

    fn kiosk(inactivity: Duration) -> (SimRobot, Arc<Kiosk>) {
        let robot = SimRobot::new();
        robot.set_locations(["ubicacion1", "ubicacion2"]);
        robot.configure(|b| b.navigation_latency = None);
        let config = ControllerConfig {
            speech_timeout: Duration::from_secs(2),
            ..ControllerConfig::default()
        };
        let controller = Arc::new(RobotController::new(Arc::new(robot.clone()), config));
        let kiosk = Arc::new(Kiosk::new(
            controller,
            KioskSettings {
                inactivity_timeout: inactivity,
                winning_number: 5,
                candidate: "John Amaya".to_string(),
                video: "candidate.mp4".to_string(),
                announcement: ATTRACT_ANNOUNCEMENT.to_string(),
            },
        ));
        (robot, kiosk)
    }

    #[tokio::test]
    async fn attract_patrols_until_interaction() {
        let (_robot, kiosk) = kiosk(Duration::from_secs(15));
        kiosk.enter_attract().unwrap();
        assert!(kiosk.controller.is_patrolling());

        assert!(kiosk.on_interaction());
        assert_eq!(kiosk.screen(), Screen::Ballot);
        assert!(!kiosk.controller.is_patrolling());

        // Further touches on the ballot change nothing.
        assert!(!kiosk.on_interaction());
        assert_eq!(kiosk.screen(), Screen::Ballot);
    }

    #[tokio::test]
    async fn winning_vote_plays_video_then_returns_to_ballot() {
        let (robot, kiosk) = kiosk(Duration::from_secs(15));
        kiosk.on_interaction();

        let events = kiosk.press(5).await;
        assert_eq!(events.last(), Some(&BallotEvent::NavigateToVideo));
        assert_eq!(kiosk.screen(), Screen::Video);
        let spoken = robot
            .commands()
            .iter()
            .filter(|c| matches!(c, DeviceCommand::Speak { .. }))
            .count();
        assert_eq!(spoken, 1);

        assert!(kiosk.finish_video());
        assert_eq!(kiosk.screen(), Screen::Ballot);
        assert!(!kiosk.finish_video());
    }

    #[tokio::test]
    async fn losing_vote_keeps_ballot_with_dialog() {
        let (_robot, kiosk) = kiosk(Duration::from_secs(15));
        kiosk.on_interaction();

        let events = kiosk.press(3).await;
        assert_eq!(events[0], BallotEvent::PlayLose);
        assert_eq!(kiosk.screen(), Screen::Ballot);
        assert!(kiosk.ballot_state().show_lose_dialog);

        kiosk.dismiss_lose_dialog();
        assert!(!kiosk.ballot_state().show_lose_dialog);
    }

    #[tokio::test]
    async fn votes_outside_the_ballot_are_ignored() {
        let (robot, kiosk) = kiosk(Duration::from_secs(15));
        assert!(kiosk.press(5).await.is_empty());
        assert!(robot.commands().is_empty());
    }

    #[tokio::test]
    async fn idle_ballot_returns_to_attract() {
        let (_robot, kiosk) = kiosk(Duration::from_millis(20));
        kiosk.on_interaction();
        kiosk.press(1).await;
        assert!(!kiosk.check_inactivity().unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(kiosk.check_inactivity().unwrap());
        assert_eq!(kiosk.screen(), Screen::Attract);
        assert_eq!(kiosk.ballot_state(), BallotState::default());
        assert!(kiosk.controller.is_patrolling());
        kiosk.controller.stop_patrol();
    }

    #[tokio::test]
    async fn announcement_resumes_patrol_on_attract() {
        let (robot, kiosk) = kiosk(Duration::from_secs(15));
        kiosk.enter_attract().unwrap();

        assert!(kiosk.announce().await);
        assert!(robot.commands().iter().any(|c| matches!(
            c,
            DeviceCommand::Speak { text, .. } if text == ATTRACT_ANNOUNCEMENT
        )));
        assert!(kiosk.controller.is_patrolling());
        kiosk.controller.stop_patrol();

        kiosk.on_interaction();
        assert!(!kiosk.announce().await);
    }

    #[tokio::test]
    async fn background_task_opens_ballot_on_touch() {
        let (robot, kiosk) = kiosk(Duration::from_secs(15));
        kiosk.enter_attract().unwrap();
        let token = CancellationToken::new();
        let handle = kiosk.spawn_background(token.clone()).unwrap();

        robot.touch();
        tokio::time::timeout(Duration::from_secs(2), async {
            while kiosk.screen() != Screen::Ballot {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(!kiosk.controller.is_patrolling());

        token.cancel();
        handle.await.unwrap();
    }
}
