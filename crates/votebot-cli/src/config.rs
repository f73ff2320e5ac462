//! Configuration Vault – reads/writes `~/.votebot/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use votebot_runtime::{ControllerConfig, DEFAULT_WINNING_NUMBER};

use crate::kiosk::{ATTRACT_ANNOUNCEMENT, KioskSettings};

/// Persisted kiosk configuration stored in `~/.votebot/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Number printed next to the candidate on the ballot.
    #[serde(default = "default_winning_number")]
    pub winning_number: u32,

    #[serde(default = "default_candidate_name")]
    pub candidate_name: String,

    /// Video played after a winning vote.
    #[serde(default = "default_video_path")]
    pub video_path: String,

    /// Idle time on the ballot before falling back to the attract screen.
    #[serde(default = "default_inactivity_timeout_ms")]
    pub inactivity_timeout_ms: u64,

    /// Saved-location prefix that marks patrol stops.
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,

    #[serde(default = "default_max_route_len")]
    pub max_route_len: usize,

    #[serde(default)]
    pub timeouts: Timeouts,

    #[serde(default)]
    pub sim: SimSettings,
}

/// Millisecond policy values mapped onto [`ControllerConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub speech_ms: u64,
    pub navigation_ms: u64,
    pub retry_delay_ms: u64,
    pub failure_cooldown_ms: u64,
    pub permission_ms: u64,
    pub patrol_retries: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        let base = ControllerConfig::default();
        Self {
            speech_ms: millis(base.speech_timeout),
            navigation_ms: millis(base.navigation_timeout),
            retry_delay_ms: millis(base.retry_delay),
            failure_cooldown_ms: millis(base.failure_cooldown),
            permission_ms: millis(base.permission_timeout),
            patrol_retries: base.patrol_retries,
        }
    }
}

/// How the simulated robot behaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    /// Saved locations reported by the robot.
    pub locations: Vec<String>,
    pub speech_latency_ms: u64,
    pub navigation_latency_ms: u64,
    /// Locations the robot can never reach.
    pub unreachable: Vec<String>,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            locations: vec![
                "ubicacion1".to_string(),
                "ubicacion2".to_string(),
                "ubicacion3".to_string(),
                "home base".to_string(),
            ],
            speech_latency_ms: 1_500,
            navigation_latency_ms: 4_000,
            unreachable: Vec::new(),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn default_winning_number() -> u32 {
    DEFAULT_WINNING_NUMBER
}
fn default_candidate_name() -> String {
    "John Amaya".to_string()
}
fn default_video_path() -> String {
    "candidate.mp4".to_string()
}
fn default_inactivity_timeout_ms() -> u64 {
    15_000
}
fn default_route_prefix() -> String {
    "ubicacion".to_string()
}
fn default_max_route_len() -> usize {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            winning_number: default_winning_number(),
            candidate_name: default_candidate_name(),
            video_path: default_video_path(),
            inactivity_timeout_ms: default_inactivity_timeout_ms(),
            route_prefix: default_route_prefix(),
            max_route_len: default_max_route_len(),
            timeouts: Timeouts::default(),
            sim: SimSettings::default(),
        }
    }
}

impl Config {
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            speech_timeout: Duration::from_millis(self.timeouts.speech_ms),
            navigation_timeout: Duration::from_millis(self.timeouts.navigation_ms),
            retry_delay: Duration::from_millis(self.timeouts.retry_delay_ms),
            failure_cooldown: Duration::from_millis(self.timeouts.failure_cooldown_ms),
            permission_timeout: Duration::from_millis(self.timeouts.permission_ms),
            patrol_retries: self.timeouts.patrol_retries,
            route_prefix: self.route_prefix.clone(),
            max_route_len: self.max_route_len,
            ..ControllerConfig::default()
        }
    }

    pub fn kiosk_settings(&self) -> KioskSettings {
        KioskSettings {
            inactivity_timeout: Duration::from_millis(self.inactivity_timeout_ms),
            winning_number: self.winning_number,
            candidate: self.candidate_name.clone(),
            video: self.video_path.clone(),
            announcement: ATTRACT_ANNOUNCEMENT.to_string(),
        }
    }
}

/// Return the path to `~/.votebot/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".votebot").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `VOTEBOT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `VOTEBOT_WINNING_NUMBER` | `winning_number` |
/// | `VOTEBOT_CANDIDATE` | `candidate_name` |
/// | `VOTEBOT_VIDEO` | `video_path` |
/// | `VOTEBOT_INACTIVITY_MS` | `inactivity_timeout_ms` |
/// | `VOTEBOT_LOCATIONS` | `sim.locations` (comma-separated) |
///
/// Values that fail to parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("VOTEBOT_WINNING_NUMBER")
        && let Ok(n) = v.trim().parse::<u32>()
    {
        cfg.winning_number = n;
    }
    if let Ok(v) = std::env::var("VOTEBOT_CANDIDATE") {
        cfg.candidate_name = v;
    }
    if let Ok(v) = std::env::var("VOTEBOT_VIDEO") {
        cfg.video_path = v;
    }
    if let Ok(v) = std::env::var("VOTEBOT_INACTIVITY_MS")
        && let Ok(ms) = v.trim().parse::<u64>()
    {
        cfg.inactivity_timeout_ms = ms;
    }
    if let Ok(v) = std::env::var("VOTEBOT_LOCATIONS") {
        cfg.sim.locations = parse_locations(&v);
    }
}

/// Split a comma-separated location list, dropping blanks.
pub fn parse_locations(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Save the config to disk, creating `~/.votebot/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
