//! End-to-end tests of [`RobotController`] against the simulated robot.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use votebot_middleware::{DeviceCommand, SimRobot};
use votebot_runtime::{ControllerConfig, PatrolState, RobotController};
use votebot_types::{HardButton, InteractionEvent, Permission, VoteBotError};

fn fast_config() -> ControllerConfig {
    ControllerConfig {
        speech_timeout: Duration::from_secs(2),
        navigation_timeout: Duration::from_secs(2),
        retry_delay: Duration::from_millis(5),
        failure_cooldown: Duration::from_millis(5),
        permission_timeout: Duration::from_secs(2),
        ..ControllerConfig::default()
    }
}

fn setup() -> (SimRobot, RobotController) {
    let robot = SimRobot::new();
    robot.configure(|b| b.navigation_latency = Some(Duration::from_millis(5)));
    let controller = RobotController::new(Arc::new(robot.clone()), fast_config());
    (robot, controller)
}

async fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    let polled = tokio::time::timeout(Duration::from_secs(5), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "timed out waiting for {what}");
}

#[tokio::test]
async fn patrol_cycles_and_retries_unreachable_stop_once() {
    let (robot, controller) = setup();
    robot.set_locations(["ubicacion1", "ubicacion2", "ubicacion3"]);
    robot.set_unreachable("ubicacion2");

    controller
        .start_patrol(controller.default_patrol_route())
        .unwrap();
    assert!(controller.is_patrolling());

    wait_until("two laps", || robot.go_to_targets().len() >= 8).await;
    controller.stop_patrol();

    let targets = robot.go_to_targets();
    assert_eq!(
        &targets[..8],
        [
            "ubicacion1",
            "ubicacion2",
            "ubicacion2",
            "ubicacion3",
            "ubicacion1",
            "ubicacion2",
            "ubicacion2",
            "ubicacion3",
        ]
    );
    assert!(robot.commands().iter().all(|c| match c {
        DeviceCommand::GoTo {
            no_rotation_at_end, ..
        } => *no_rotation_at_end,
        _ => true,
    }));
    assert_eq!(controller.patrol_state(), PatrolState::Idle);
    assert!(!controller.is_patrolling());
}

#[tokio::test]
async fn stop_interrupts_a_goal_that_never_finishes() {
    let (robot, controller) = setup();
    robot.configure(|b| b.navigation_latency = None);

    controller
        .start_patrol(vec!["ubicacion1".to_string(), "ubicacion2".to_string()])
        .unwrap();
    wait_until("first go_to", || !robot.go_to_targets().is_empty()).await;
    assert!(matches!(
        controller.patrol_state(),
        PatrolState::Stepping { index: 0, .. }
    ));

    controller.stop_patrol();
    assert!(!controller.is_patrolling());

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(robot.go_to_targets(), vec!["ubicacion1"]);
    assert_eq!(robot.commands().last(), Some(&DeviceCommand::StopMovement));
}

#[tokio::test]
async fn stop_patrol_twice_is_harmless() {
    let (robot, controller) = setup();
    controller.stop_patrol();
    controller.stop_patrol();

    assert_eq!(controller.patrol_state(), PatrolState::Idle);
    assert_eq!(
        robot.commands(),
        vec![DeviceCommand::StopMovement, DeviceCommand::StopMovement]
    );
}

#[tokio::test]
async fn empty_route_leaves_running_patrol_alone() {
    let (robot, controller) = setup();
    robot.configure(|b| b.navigation_latency = None);

    controller.start_patrol(vec!["ubicacion1".to_string()]).unwrap();
    wait_until("first go_to", || !robot.go_to_targets().is_empty()).await;

    let stops = |robot: &SimRobot| {
        robot
            .commands()
            .iter()
            .filter(|c| **c == DeviceCommand::StopMovement)
            .count()
    };
    let before = stops(&robot);
    controller.start_patrol(Vec::new()).unwrap();
    assert!(controller.is_patrolling());
    assert_eq!(stops(&robot), before);

    controller.stop_patrol();
}

#[tokio::test]
async fn touches_and_clicks_reach_subscribers() {
    let (robot, controller) = setup();
    let mut first = controller.interactions();
    let mut second = controller.interactions();

    robot.touch();
    robot.press_button(HardButton::Main);

    for sub in [&mut first, &mut second] {
        assert!(sub.try_recv().is_some());
        assert!(sub.try_recv().is_some());
        assert!(sub.try_recv().is_none());
    }
}

#[tokio::test]
async fn interaction_stream_yields_touches() {
    let (robot, controller) = setup();
    let mut stream = controller.interaction_stream();

    robot.touch();
    let event = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("touch delivered");
    assert_eq!(event, Some(InteractionEvent));
}

#[tokio::test]
async fn speak_and_wait_completes() {
    let (robot, controller) = setup();

    controller.speak_and_wait("¡Hola!").await.unwrap();
    assert!(matches!(
        robot.commands().as_slice(),
        [DeviceCommand::Speak { text, .. }] if text == "¡Hola!"
    ));
}

#[tokio::test]
async fn speak_and_wait_times_out_when_robot_stays_silent() {
    let (robot, controller) = setup();
    robot.configure(|b| b.speech_latency = None);

    let err = controller
        .speak_and_wait_for("¿Hay alguien?", Duration::from_millis(30))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VoteBotError::Timeout {
            operation: "speak_and_wait",
            ..
        }
    ));
}

#[tokio::test]
async fn speak_and_wait_with_robot_answering_inline() {
    let (robot, controller) = setup();
    robot.configure(|b| b.speech_latency = Some(Duration::ZERO));

    controller
        .speak_and_wait_for("¡Hola!", Duration::from_millis(200))
        .await
        .unwrap();
}

#[tokio::test]
async fn dispose_cancels_waiters_and_detaches() {
    let robot = SimRobot::new();
    robot.configure(|b| {
        b.speech_latency = None;
        b.navigation_latency = None;
        b.permission_answer = None;
    });
    let controller = Arc::new(RobotController::new(
        Arc::new(robot.clone()),
        fast_config(),
    ));
    assert_eq!(robot.listener_count(), 1);

    let waiting = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.speak_and_wait("Un momento").await })
    };
    wait_until("speak command", || !robot.commands().is_empty()).await;

    controller
        .start_patrol(vec!["ubicacion1".to_string(), "ubicacion2".to_string()])
        .unwrap();
    wait_until("first go_to", || !robot.go_to_targets().is_empty()).await;
    assert!(controller.is_patrolling());

    let permission = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.ensure_map_permission().await })
    };
    wait_until("permission request", || {
        robot
            .commands()
            .iter()
            .any(|c| matches!(c, DeviceCommand::RequestPermissions { .. }))
    })
    .await;

    robot.clear_commands();
    controller.dispose();
    controller.dispose();

    assert!(matches!(
        waiting.await.unwrap(),
        Err(VoteBotError::Cancelled(_))
    ));
    assert!(!permission.await.unwrap());
    assert!(!controller.is_patrolling());
    assert_eq!(controller.patrol_state(), PatrolState::Idle);
    assert_eq!(robot.commands(), vec![DeviceCommand::StopMovement]);
    assert_eq!(robot.listener_count(), 0);
    assert!(controller.is_disposed());
    assert!(matches!(
        controller.speak("otra vez"),
        Err(VoteBotError::Cancelled(_))
    ));
}

#[tokio::test]
async fn dropping_the_controller_detaches_it() {
    let robot = SimRobot::new();
    {
        let _controller = RobotController::new(Arc::new(robot.clone()), fast_config());
        assert_eq!(robot.listener_count(), 1);
    }
    assert_eq!(robot.listener_count(), 0);
}

#[tokio::test]
async fn map_permission_already_held_issues_no_request() {
    let (robot, controller) = setup();
    robot.grant(Permission::Map);

    assert!(controller.has_map_permission());
    assert!(controller.ensure_map_permission().await);
    assert!(robot.commands().is_empty());
}

#[tokio::test]
async fn map_permission_requested_with_fixed_code() {
    let (robot, controller) = setup();

    assert!(!controller.has_map_permission());
    assert!(controller.ensure_map_permission().await);
    assert_eq!(
        robot.commands(),
        vec![DeviceCommand::RequestPermissions {
            permissions: vec![Permission::Map],
            request_code: 1001,
        }]
    );
}

#[test]
fn patrol_route_from_saved_locations() {
    let robot = SimRobot::new();
    robot.set_locations([
        "Ubicacion3",
        "lobby",
        "ubicacion1",
        "ubicacion 2",
        "ubicacion10",
        "ubicacionX",
    ]);
    let controller = RobotController::new(Arc::new(robot), ControllerConfig::default());

    assert_eq!(
        controller.default_patrol_route(),
        vec!["ubicacion1", "ubicacion 2", "Ubicacion3"]
    );
    assert_eq!(
        controller.build_patrol_route("ubicacion", 10),
        vec!["ubicacion1", "ubicacion 2", "Ubicacion3", "ubicacion10"]
    );
    assert!(controller.build_patrol_route("pasillo", 3).is_empty());
}

#[test]
fn start_patrol_outside_runtime_is_rejected() {
    let robot = SimRobot::new();
    let controller = RobotController::new(Arc::new(robot), ControllerConfig::default());

    assert_eq!(
        controller.start_patrol(vec!["ubicacion1".to_string()]),
        Err(VoteBotError::NoRuntime)
    );
}
