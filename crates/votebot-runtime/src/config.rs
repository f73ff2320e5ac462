//! Timing and routing policy for [`RobotController`][crate::RobotController].

use std::time::Duration;

/// Request code tagged onto the map-permission request.
pub const MAP_PERMISSION_REQUEST_CODE: i32 = 1001;

/// Configuration bundle for [`RobotController`][crate::RobotController].
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Upper bound for `speak_and_wait`.
    pub speech_timeout: Duration,
    /// Upper bound for a single navigation attempt.
    pub navigation_timeout: Duration,
    /// Pause between a navigation abort and its retry.
    pub retry_delay: Duration,
    /// Extra retries per patrol stop after the first attempt aborts.
    pub patrol_retries: u32,
    /// Pause after a patrol stop was given up on.
    pub failure_cooldown: Duration,
    /// Upper bound for `ensure_map_permission`.
    pub permission_timeout: Duration,
    pub permission_request_code: i32,
    /// Buffered interaction events per subscriber.
    pub interaction_capacity: usize,
    /// Saved-location prefix that marks patrol stops.
    pub route_prefix: String,
    pub max_route_len: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            speech_timeout: Duration::from_secs(20),
            navigation_timeout: Duration::from_secs(120),
            retry_delay: Duration::from_millis(250),
            patrol_retries: 1,
            failure_cooldown: Duration::from_millis(150),
            permission_timeout: Duration::from_secs(30),
            permission_request_code: MAP_PERMISSION_REQUEST_CODE,
            interaction_capacity: votebot_middleware::bus::DEFAULT_CAPACITY,
            route_prefix: "ubicacion".to_string(),
            max_route_len: 3,
        }
    }
}
