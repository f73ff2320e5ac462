//! `votebot-types` – shared vocabulary for the voting kiosk robot.
//!
//! Every value that crosses the device boundary (commands issued to the
//! robot, callbacks it delivers back) is defined here so the middleware and
//! runtime crates agree on a single representation.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Speech
// ────────────────────────────────────────────────────────────────────────────

/// A single text-to-speech request.  The `id` is freshly generated for every
/// request and is echoed back by the device in
/// [`RobotCallback::SpeechStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub id: Uuid,
    pub text: String,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
        }
    }
}

/// Lifecycle of a speech request as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechStatus {
    Pending,
    Processing,
    Started,
    Completed,
    Error,
    Canceled,
    NotAllowed,
}

impl SpeechStatus {
    /// `true` when no further updates will arrive for the request.
    ///
    /// Success and failure are not distinguished: a caller waiting on speech
    /// only needs to know it may proceed.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SpeechStatus::Completed
                | SpeechStatus::Error
                | SpeechStatus::Canceled
                | SpeechStatus::NotAllowed
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Navigation
// ────────────────────────────────────────────────────────────────────────────

/// Progress of a go-to-location command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationStatus {
    Start,
    Calculating,
    Going,
    Complete,
    Abort,
    Reposing,
}

impl NavigationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            NavigationStatus::Start => "start",
            NavigationStatus::Calculating => "calculating",
            NavigationStatus::Going => "going",
            NavigationStatus::Complete => "complete",
            NavigationStatus::Abort => "abort",
            NavigationStatus::Reposing => "reposing",
        }
    }
}

impl fmt::Display for NavigationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of one navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoToOutcome {
    Complete,
    Abort,
}

// ────────────────────────────────────────────────────────────────────────────
// Physical interaction
// ────────────────────────────────────────────────────────────────────────────

/// Physical buttons on the robot body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardButton {
    /// The interaction / follow button on the head.
    Main,
    Power,
    Volume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStatus {
    Pressed,
    Released,
    Clicked,
}

/// "Somebody touched the robot."  Carries no payload on purpose: subscribers
/// react to the fact, not to which sensor fired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionEvent;

// ────────────────────────────────────────────────────────────────────────────
// Permissions
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Map,
    Settings,
    Face,
    Sequence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionGrant {
    Granted,
    Denied,
}

impl PermissionGrant {
    pub fn is_granted(self) -> bool {
        self == PermissionGrant::Granted
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Callbacks
// ────────────────────────────────────────────────────────────────────────────

/// Every asynchronous notification the robot can deliver.
///
/// The device invokes these on its own thread with no ordering guarantee
/// relative to the commands that caused them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum RobotCallback {
    SpeechStatus {
        request_id: Uuid,
        status: SpeechStatus,
    },
    UserInteraction {
        is_interacting: bool,
    },
    HardButton {
        button: HardButton,
        status: ButtonStatus,
    },
    NavigationStatus {
        location: String,
        status: NavigationStatus,
        description_id: i32,
        description: String,
    },
    PermissionResult {
        permission: Permission,
        grant: PermissionGrant,
        request_code: i32,
    },
}

impl RobotCallback {
    /// Short label used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            RobotCallback::SpeechStatus { .. } => "speech_status",
            RobotCallback::UserInteraction { .. } => "user_interaction",
            RobotCallback::HardButton { .. } => "hard_button",
            RobotCallback::NavigationStatus { .. } => "navigation_status",
            RobotCallback::PermissionResult { .. } => "permission_result",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error type shared by the device boundary and the control runtime.
///
/// Navigation aborts and permission denials are not errors: they surface as
/// [`GoToOutcome::Abort`] and `false` respectively.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoteBotError {
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    #[error("device rejected {command}: {details}")]
    Device { command: String, details: String },

    #[error("channel error: {0}")]
    Channel(String),

    #[error("no async runtime available to spawn background tasks")]
    NoRuntime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_speech_statuses() {
        let terminal: Vec<_> = [
            SpeechStatus::Pending,
            SpeechStatus::Processing,
            SpeechStatus::Started,
            SpeechStatus::Completed,
            SpeechStatus::Error,
            SpeechStatus::Canceled,
            SpeechStatus::NotAllowed,
        ]
        .into_iter()
        .filter(|s| s.is_terminal())
        .collect();
        assert_eq!(
            terminal,
            vec![
                SpeechStatus::Completed,
                SpeechStatus::Error,
                SpeechStatus::Canceled,
                SpeechStatus::NotAllowed
            ]
        );
    }

    #[test]
    fn speech_requests_get_fresh_ids() {
        let a = SpeechRequest::new("hola");
        let b = SpeechRequest::new("hola");
        assert_ne!(a.id, b.id);
        assert_eq!(a.text, "hola");
    }

    #[test]
    fn callback_json_is_tagged_by_kind() {
        let cb = RobotCallback::NavigationStatus {
            location: "ubicacion1".to_string(),
            status: NavigationStatus::Complete,
            description_id: 0,
            description: String::new(),
        };
        let json = serde_json::to_value(&cb).unwrap();
        assert_eq!(json["kind"], "navigation_status");
        assert_eq!(json["payload"]["status"], "complete");
        let back: RobotCallback = serde_json::from_value(json).unwrap();
        assert_eq!(back, cb);
    }

    #[test]
    fn error_display() {
        let err = VoteBotError::Timeout {
            operation: "speak_and_wait",
            after: Duration::from_secs(20),
        };
        assert!(err.to_string().contains("speak_and_wait"));

        let err = VoteBotError::Device {
            command: "go_to".to_string(),
            details: "robot offline".to_string(),
        };
        assert!(err.to_string().contains("robot offline"));
    }
}
