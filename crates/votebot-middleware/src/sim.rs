//! In-process simulated robot.
//!
//! [`SimRobot`] implements [`RobotDevice`] without any hardware:
//!
//! * **Speech** – reports `started` immediately and a terminal status after
//!   [`SimBehavior::speech_latency`] (or never, when the latency is `None`).
//!
//! * **Navigation** – reports `start` immediately, then `going` and
//!   `complete`, or `abort` for locations listed in
//!   [`SimBehavior::unreachable`].  Only the latest goal reports back; a
//!   `stop_movement` while it is in flight reports `abort` for it at once.
//!
//! * **Permissions** – answers requests with
//!   [`SimBehavior::permission_answer`] and remembers grants.
//!
//! Delayed callbacks are delivered from a dedicated thread, the way a vendor
//! SDK calls back from its own IPC thread.  A zero latency answers inline,
//! before the command returns.  Every command is recorded so tests can
//! assert on what the runtime asked the robot to do.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;
use votebot_types::{
    ButtonStatus, HardButton, NavigationStatus, Permission, PermissionGrant, RobotCallback,
    SpeechRequest, SpeechStatus, VoteBotError,
};

use crate::adapter::{RobotDevice, RobotListener};

/// A command the simulated robot received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    Speak { id: Uuid, text: String },
    GoTo { location: String, no_rotation_at_end: bool },
    StopMovement,
    RequestPermissions { permissions: Vec<Permission>, request_code: i32 },
}

/// How the simulated robot answers commands.
#[derive(Debug, Clone)]
pub struct SimBehavior {
    /// Delay before the terminal speech status.  `None` = never answer.
    pub speech_latency: Option<Duration>,
    /// Terminal status reported for every speech request.
    pub speech_outcome: SpeechStatus,
    /// Delay before the terminal navigation status.  `None` = never answer.
    pub navigation_latency: Option<Duration>,
    /// Lower-cased location names that always abort.
    pub unreachable: HashSet<String>,
    /// Answer given to permission requests.  `None` = never answer.
    pub permission_answer: Option<PermissionGrant>,
    /// Delay before the permission answer.
    pub permission_latency: Duration,
}

impl Default for SimBehavior {
    fn default() -> Self {
        Self {
            speech_latency: Some(Duration::from_millis(10)),
            speech_outcome: SpeechStatus::Completed,
            navigation_latency: Some(Duration::from_millis(10)),
            unreachable: HashSet::new(),
            permission_answer: Some(PermissionGrant::Granted),
            permission_latency: Duration::from_millis(10),
        }
    }
}

struct SimInner {
    locations: Mutex<Vec<String>>,
    granted: Mutex<HashSet<Permission>>,
    behavior: Mutex<SimBehavior>,
    commands: Mutex<Vec<DeviceCommand>>,
    listeners: Mutex<Vec<Arc<dyn RobotListener>>>,
    navigation: Mutex<NavigationSlot>,
}

/// The goal the simulated base is driving to.
#[derive(Default)]
struct NavigationSlot {
    seq: u64,
    active: Option<String>,
}

impl SimInner {
    /// Clear the goal numbered `seq` if it is still the one in flight.
    fn finish_navigation(&self, seq: u64) -> bool {
        let mut nav = lock(&self.navigation);
        if nav.seq != seq {
            return false;
        }
        nav.active.take().is_some()
    }
}

/// Simulated robot.  Clone it cheaply – all clones share the same state.
#[derive(Clone)]
pub struct SimRobot {
    inner: Arc<SimInner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimRobot {
    pub fn new() -> Self {
        Self::with_behavior(SimBehavior::default())
    }

    pub fn with_behavior(behavior: SimBehavior) -> Self {
        Self {
            inner: Arc::new(SimInner {
                locations: Mutex::new(Vec::new()),
                granted: Mutex::new(HashSet::new()),
                behavior: Mutex::new(behavior),
                commands: Mutex::new(Vec::new()),
                listeners: Mutex::new(Vec::new()),
                navigation: Mutex::new(NavigationSlot::default()),
            }),
        }
    }

    /// Replace the saved-location list.
    pub fn set_locations<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *lock(&self.inner.locations) = names.into_iter().map(Into::into).collect();
    }

    /// Mutate the answering behaviour in place.
    pub fn configure(&self, f: impl FnOnce(&mut SimBehavior)) {
        f(&mut lock(&self.inner.behavior));
    }

    /// Mark `location` as one the robot can never reach.
    pub fn set_unreachable(&self, location: &str) {
        self.configure(|b| {
            b.unreachable.insert(location.to_lowercase());
        });
    }

    pub fn grant(&self, permission: Permission) {
        lock(&self.inner.granted).insert(permission);
    }

    /// Snapshot of every command received so far.
    pub fn commands(&self) -> Vec<DeviceCommand> {
        lock(&self.inner.commands).clone()
    }

    pub fn clear_commands(&self) {
        lock(&self.inner.commands).clear();
    }

    /// Destinations of every `go_to` received, in order.
    pub fn go_to_targets(&self) -> Vec<String> {
        lock(&self.inner.commands)
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::GoTo { location, .. } => Some(location.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    /// Deliver `callback` synchronously on the calling thread.
    pub fn inject(&self, callback: RobotCallback) {
        deliver(&self.inner, callback);
    }

    /// Simulate a touch on the robot body.
    pub fn touch(&self) {
        self.inject(RobotCallback::UserInteraction { is_interacting: true });
    }

    /// Simulate a full click of a hard button.
    pub fn press_button(&self, button: HardButton) {
        self.inject(RobotCallback::HardButton {
            button,
            status: ButtonStatus::Pressed,
        });
        self.inject(RobotCallback::HardButton {
            button,
            status: ButtonStatus::Clicked,
        });
    }

    fn record(&self, command: DeviceCommand) {
        lock(&self.inner.commands).push(command);
    }

    fn deliver_after(&self, delay: Duration, callbacks: Vec<RobotCallback>) {
        self.schedule(delay, move |inner| {
            for cb in callbacks {
                deliver(inner, cb);
            }
        });
    }

    /// Run `job` after `delay` on another thread, or inline when `delay`
    /// is zero.
    fn schedule(&self, delay: Duration, job: impl FnOnce(&SimInner) + Send + 'static) {
        if delay.is_zero() {
            job(&self.inner);
            return;
        }
        let inner = Arc::clone(&self.inner);
        thread::spawn(move || {
            thread::sleep(delay);
            job(&inner);
        });
    }
}

impl Default for SimRobot {
    fn default() -> Self {
        Self::new()
    }
}

fn deliver(inner: &SimInner, callback: RobotCallback) {
    // Clone the listener list so a listener may detach itself mid-delivery.
    let listeners: Vec<_> = lock(&inner.listeners).clone();
    debug!(kind = callback.kind(), listeners = listeners.len(), "sim robot callback");
    for listener in listeners {
        listener.on_callback(callback.clone());
    }
}

impl RobotDevice for SimRobot {
    fn speak(&self, request: &SpeechRequest) -> Result<(), VoteBotError> {
        self.record(DeviceCommand::Speak {
            id: request.id,
            text: request.text.clone(),
        });
        self.inject(RobotCallback::SpeechStatus {
            request_id: request.id,
            status: SpeechStatus::Started,
        });

        let behavior = lock(&self.inner.behavior).clone();
        if let Some(latency) = behavior.speech_latency {
            self.deliver_after(
                latency,
                vec![RobotCallback::SpeechStatus {
                    request_id: request.id,
                    status: behavior.speech_outcome,
                }],
            );
        }
        Ok(())
    }

    fn go_to(&self, location: &str, no_rotation_at_end: bool) -> Result<(), VoteBotError> {
        self.record(DeviceCommand::GoTo {
            location: location.to_string(),
            no_rotation_at_end,
        });

        let behavior = lock(&self.inner.behavior).clone();
        let status_for = |status: NavigationStatus| RobotCallback::NavigationStatus {
            location: location.to_string(),
            status,
            description_id: 0,
            description: String::new(),
        };

        let seq = {
            let mut nav = lock(&self.inner.navigation);
            nav.seq += 1;
            nav.active = Some(location.to_string());
            nav.seq
        };

        self.inject(status_for(NavigationStatus::Start));
        if let Some(latency) = behavior.navigation_latency {
            let terminal = if behavior.unreachable.contains(&location.to_lowercase()) {
                NavigationStatus::Abort
            } else {
                NavigationStatus::Complete
            };
            let callbacks = vec![status_for(NavigationStatus::Going), status_for(terminal)];
            self.schedule(latency, move |inner| {
                // Superseded or stopped goals stay silent.
                if inner.finish_navigation(seq) {
                    for cb in callbacks {
                        deliver(inner, cb);
                    }
                }
            });
        }
        Ok(())
    }

    fn stop_movement(&self) -> Result<(), VoteBotError> {
        self.record(DeviceCommand::StopMovement);
        let interrupted = lock(&self.inner.navigation).active.take();
        if let Some(location) = interrupted {
            debug!(%location, "navigation interrupted by stop");
            self.inject(RobotCallback::NavigationStatus {
                location,
                status: NavigationStatus::Abort,
                description_id: 0,
                description: String::new(),
            });
        }
        Ok(())
    }

    fn locations(&self) -> Vec<String> {
        lock(&self.inner.locations).clone()
    }

    fn check_self_permission(&self, permission: Permission) -> PermissionGrant {
        if lock(&self.inner.granted).contains(&permission) {
            PermissionGrant::Granted
        } else {
            PermissionGrant::Denied
        }
    }

    fn request_permissions(
        &self,
        permissions: &[Permission],
        request_code: i32,
    ) -> Result<(), VoteBotError> {
        self.record(DeviceCommand::RequestPermissions {
            permissions: permissions.to_vec(),
            request_code,
        });

        let behavior = lock(&self.inner.behavior).clone();
        let Some(grant) = behavior.permission_answer else {
            return Ok(());
        };
        if grant.is_granted() {
            lock(&self.inner.granted).extend(permissions.iter().copied());
        }
        let answers = permissions
            .iter()
            .map(|&permission| RobotCallback::PermissionResult {
                permission,
                grant,
                request_code,
            })
            .collect();
        self.deliver_after(behavior.permission_latency, answers);
        Ok(())
    }

    fn add_listener(&self, listener: Arc<dyn RobotListener>) {
        lock(&self.inner.listeners).push(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn RobotListener>) {
        lock(&self.inner.listeners).retain(|l| !Arc::ptr_eq(l, listener));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    /// Forwards every callback into a std channel.
    struct Recorder(Mutex<mpsc::Sender<RobotCallback>>);

    impl RobotListener for Recorder {
        fn on_callback(&self, callback: RobotCallback) {
            let _ = lock(&self.0).send(callback);
        }
    }

    fn attach(robot: &SimRobot) -> (Arc<dyn RobotListener>, mpsc::Receiver<RobotCallback>) {
        let (tx, rx) = mpsc::channel();
        let listener: Arc<dyn RobotListener> = Arc::new(Recorder(Mutex::new(tx)));
        robot.add_listener(Arc::clone(&listener));
        (listener, rx)
    }

    fn drain_until_terminal_nav(rx: &mpsc::Receiver<RobotCallback>) -> NavigationStatus {
        loop {
            match rx.recv_timeout(Duration::from_secs(1)).expect("callback") {
                RobotCallback::NavigationStatus { status, .. }
                    if matches!(status, NavigationStatus::Complete | NavigationStatus::Abort) =>
                {
                    return status;
                }
                _ => continue,
            }
        }
    }

    #[test]
    fn speech_reports_started_then_terminal() {
        let robot = SimRobot::new();
        let (_listener, rx) = attach(&robot);
        let req = SpeechRequest::new("hola");
        robot.speak(&req).unwrap();

        let first = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(
            first,
            RobotCallback::SpeechStatus { request_id: req.id, status: SpeechStatus::Started }
        );
        let second = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(
            second,
            RobotCallback::SpeechStatus { request_id: req.id, status: SpeechStatus::Completed }
        );
    }

    #[test]
    fn silent_speech_never_terminates() {
        let robot = SimRobot::new();
        robot.configure(|b| b.speech_latency = None);
        let (_listener, rx) = attach(&robot);
        robot.speak(&SpeechRequest::new("...")).unwrap();

        assert!(rx.recv_timeout(Duration::from_secs(1)).is_ok()); // started
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn unreachable_locations_abort_case_insensitively() {
        let robot = SimRobot::new();
        robot.set_unreachable("Ubicacion2");
        let (_listener, rx) = attach(&robot);

        robot.go_to("ubicacion1", true).unwrap();
        assert_eq!(drain_until_terminal_nav(&rx), NavigationStatus::Complete);

        robot.go_to("UBICACION2", true).unwrap();
        assert_eq!(drain_until_terminal_nav(&rx), NavigationStatus::Abort);

        assert_eq!(robot.go_to_targets(), vec!["ubicacion1", "UBICACION2"]);
    }

    #[test]
    fn zero_latency_answers_before_the_command_returns() {
        let robot = SimRobot::new();
        robot.configure(|b| {
            b.speech_latency = Some(Duration::ZERO);
            b.navigation_latency = Some(Duration::ZERO);
        });
        let (_listener, rx) = attach(&robot);

        let req = SpeechRequest::new("hola");
        robot.speak(&req).unwrap();
        let spoken: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            spoken.last(),
            Some(&RobotCallback::SpeechStatus { request_id: req.id, status: SpeechStatus::Completed })
        );

        robot.go_to("ubicacion1", true).unwrap();
        let statuses: Vec<_> = rx
            .try_iter()
            .filter_map(|cb| match cb {
                RobotCallback::NavigationStatus { status, .. } => Some(status),
                _ => None,
            })
            .collect();
        assert_eq!(
            statuses,
            vec![NavigationStatus::Start, NavigationStatus::Going, NavigationStatus::Complete]
        );
    }

    #[test]
    fn stop_aborts_goal_in_flight_and_silences_it() {
        let robot = SimRobot::new();
        robot.configure(|b| b.navigation_latency = Some(Duration::from_millis(50)));
        let (_listener, rx) = attach(&robot);

        robot.go_to("ubicacion1", true).unwrap();
        robot.stop_movement().unwrap();

        let statuses: Vec<_> = rx
            .try_iter()
            .filter_map(|cb| match cb {
                RobotCallback::NavigationStatus { status, .. } => Some(status),
                _ => None,
            })
            .collect();
        assert_eq!(statuses, vec![NavigationStatus::Start, NavigationStatus::Abort]);
        // The scheduled `complete` never arrives.
        assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());

        // Stopping an idle base reports nothing.
        robot.stop_movement().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn superseded_goal_reports_nothing() {
        let robot = SimRobot::new();
        robot.configure(|b| b.navigation_latency = Some(Duration::from_millis(30)));
        let (_listener, rx) = attach(&robot);

        robot.go_to("ubicacion1", true).unwrap();
        robot.go_to("ubicacion2", true).unwrap();

        let mut terminal = Vec::new();
        while let Ok(cb) = rx.recv_timeout(Duration::from_millis(150)) {
            if let RobotCallback::NavigationStatus { location, status: NavigationStatus::Complete, .. } = cb {
                terminal.push(location);
            }
        }
        assert_eq!(terminal, vec!["ubicacion2"]);
    }

    #[test]
    fn permission_request_grants_and_answers() {
        let robot = SimRobot::new();
        let (_listener, rx) = attach(&robot);
        assert_eq!(robot.check_self_permission(Permission::Map), PermissionGrant::Denied);

        robot.request_permissions(&[Permission::Map], 1001).unwrap();
        let answer = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(
            answer,
            RobotCallback::PermissionResult {
                permission: Permission::Map,
                grant: PermissionGrant::Granted,
                request_code: 1001,
            }
        );
        assert_eq!(robot.check_self_permission(Permission::Map), PermissionGrant::Granted);
    }

    #[test]
    fn removed_listener_receives_nothing() {
        let robot = SimRobot::new();
        let (listener, rx) = attach(&robot);
        assert_eq!(robot.listener_count(), 1);

        robot.remove_listener(&listener);
        assert_eq!(robot.listener_count(), 0);
        robot.touch();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn press_button_emits_pressed_then_clicked() {
        let robot = SimRobot::new();
        let (_listener, rx) = attach(&robot);
        robot.press_button(HardButton::Main);

        let statuses: Vec<_> = rx
            .try_iter()
            .filter_map(|cb| match cb {
                RobotCallback::HardButton { status, .. } => Some(status),
                _ => None,
            })
            .collect();
        assert_eq!(statuses, vec![ButtonStatus::Pressed, ButtonStatus::Clicked]);
    }

    #[test]
    fn commands_are_recorded_in_order() {
        let robot = SimRobot::new();
        robot.configure(|b| b.navigation_latency = None);
        robot.go_to("ubicacion1", true).unwrap();
        robot.stop_movement().unwrap();

        assert_eq!(
            robot.commands(),
            vec![
                DeviceCommand::GoTo { location: "ubicacion1".to_string(), no_rotation_at_end: true },
                DeviceCommand::StopMovement,
            ]
        );
        robot.clear_commands();
        assert!(robot.commands().is_empty());
    }
}
