//! REPL – operator console for the simulated kiosk.
//!
//! Supported slash-commands:
//!   /help               – show this list
//!   /touch              – touch the robot body
//!   /button [name]      – click a hard button (main, power, volume)
//!   /vote <n>           – press a number on the ballot
//!   /dismiss            – close the lose dialog
//!   /reset              – staff reset of the ballot
//!   /video-end          – the candidate video finished
//!   /attract            – go to the attract screen (starts the patrol)
//!   /announce           – speak the attract invitation
//!   /patrol | /stop     – start / stop the patrol directly
//!   /say <text>         – speak and wait
//!   /locations          – saved locations and the derived route
//!   /permission         – make sure the map permission is granted
//!   /status             – screen, patrol and ballot state
//!   /settings           – edit `~/.votebot/config.toml`
//!   /quit | /exit       – dispose the controller and exit

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::Handle;
use votebot_middleware::{RobotDevice, SimRobot};
use votebot_runtime::{BallotEvent, PatrolState, RobotController};
use votebot_types::HardButton;

use crate::config::{self, Config};
use crate::kiosk::{Kiosk, Screen};

/// Everything the console drives.
pub struct Session {
    pub runtime: Handle,
    pub robot: SimRobot,
    pub controller: Arc<RobotController>,
    pub kiosk: Arc<Kiosk>,
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(session: &Session, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", prompt(session.kiosk.screen()).bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (cmd, arg) = match line.split_once(char::is_whitespace) {
            Some((cmd, arg)) => (cmd, arg.trim()),
            None => (line, ""),
        };

        match cmd {
            "/help" => cmd_help(),
            "/touch" => {
                session.robot.touch();
                println!("  {}", "touch sent".dimmed());
            }
            "/button" => cmd_button(session, arg),
            "/vote" => cmd_vote(session, arg),
            "/dismiss" => session.kiosk.dismiss_lose_dialog(),
            "/reset" => {
                session.kiosk.staff_reset();
                println!("  {}", "✓ Ballot cleared".green());
            }
            "/video-end" => {
                if session.kiosk.finish_video() {
                    println!("  {}", "✓ Back to the ballot".green());
                } else {
                    println!("  {}", "No video is playing.".yellow());
                }
            }
            "/attract" => match session.kiosk.enter_attract() {
                Ok(()) => println!("  {}", "✓ Attract screen, patrol running".green()),
                Err(e) => println!("{}: {}", "Error".red(), e),
            },
            "/announce" => {
                if !session.runtime.block_on(session.kiosk.announce()) {
                    println!("  {}", "Announcements only play on the attract screen.".yellow());
                }
            }
            "/patrol" => cmd_patrol(session),
            "/stop" => {
                session.controller.stop_patrol();
                println!("  {}", "✓ Patrol stopped".green());
            }
            "/say" => cmd_say(session, arg),
            "/locations" => cmd_locations(session),
            "/permission" => {
                let granted = session
                    .runtime
                    .block_on(session.controller.ensure_map_permission());
                if granted {
                    println!("  {}", "✓ Map permission granted".green());
                } else {
                    println!("  {}", "✗ Map permission not granted".red());
                }
            }
            "/status" => cmd_status(session),
            "/settings" => cmd_settings(),
            "/quit" | "/exit" => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            other => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
            }
        }
    }
}

fn prompt(screen: Screen) -> &'static str {
    match screen {
        Screen::Attract => "votebot[attract]>",
        Screen::Ballot => "votebot[ballot]>",
        Screen::Video => "votebot[video]>",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "Kiosk".bold().underline());
    println!("  {}           – touch the robot body", "/touch".bold().cyan());
    println!("  {}  – click main / power / volume", "/button [name]".bold().cyan());
    println!("  {}        – press a number on the ballot", "/vote <n>".bold().cyan());
    println!("  {}         – close the lose dialog", "/dismiss".bold().cyan());
    println!("  {}           – staff reset of the ballot", "/reset".bold().cyan());
    println!("  {}       – the candidate video finished", "/video-end".bold().cyan());
    println!("  {}         – back to attract, start patrolling", "/attract".bold().cyan());
    println!("  {}        – speak the attract invitation", "/announce".bold().cyan());
    println!();
    println!("{}", "Robot".bold().underline());
    println!("  {}   – start / stop the patrol", "/patrol  /stop".bold().cyan());
    println!("  {}      – speak and wait", "/say <text>".bold().cyan());
    println!("  {}       – saved locations and patrol route", "/locations".bold().cyan());
    println!("  {}      – request the map permission", "/permission".bold().cyan());
    println!("  {}          – current state", "/status".bold().cyan());
    println!("  {}        – edit ~/.votebot/config.toml", "/settings".bold().cyan());
    println!("  {}    – exit the CLI", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_button(session: &Session, arg: &str) {
    let button = match arg.to_lowercase().as_str() {
        "" | "main" => HardButton::Main,
        "power" => HardButton::Power,
        "volume" => HardButton::Volume,
        other => {
            println!("{} '{}'", "Unknown button:".red(), other.yellow());
            return;
        }
    };
    session.robot.press_button(button);
    println!("  {} {:?}", "clicked".dimmed(), button);
}

fn cmd_vote(session: &Session, arg: &str) {
    let Ok(number) = arg.parse::<u32>() else {
        println!("  Usage: {}", "/vote <number>".bold());
        return;
    };
    let events = session.runtime.block_on(session.kiosk.press(number));
    if events.is_empty() {
        println!("  {}", "The ballot is not on screen. Try /touch first.".yellow());
        return;
    }
    for event in events {
        match event {
            BallotEvent::PlayWin => println!("  {}", "♪ win".green().bold()),
            BallotEvent::PlayLose => println!("  {}", "♪ lose".red().bold()),
            BallotEvent::Speak(text) => println!("  🗣  {}", text.italic()),
            BallotEvent::NavigateToVideo => println!(
                "  ▶ {} {}",
                "playing".bold(),
                session.kiosk.settings().video.yellow()
            ),
        }
    }
    if let Some(message) = session.kiosk.ballot_state().lose_message
        && session.kiosk.ballot_state().show_lose_dialog
    {
        println!("  {} {}", "[dialog]".yellow(), message);
    }
}

fn cmd_patrol(session: &Session) {
    let route = session.controller.default_patrol_route();
    if route.is_empty() {
        println!(
            "  {}",
            "No saved locations match the patrol prefix; robot stays in place.".yellow()
        );
        return;
    }
    match session.controller.start_patrol(route.clone()) {
        Ok(()) => println!("  {} {}", "✓ Patrolling".green(), route.join(" → ").bold()),
        Err(e) => println!("{}: {}", "Error".red(), e),
    }
}

fn cmd_say(session: &Session, text: &str) {
    if text.is_empty() {
        println!("  Usage: {}", "/say <text>".bold());
        return;
    }
    match session
        .runtime
        .block_on(session.controller.speak_and_wait(text))
    {
        Ok(()) => println!("  {}", "✓ Done speaking".green()),
        Err(e) => println!("  {}: {}", "Speech".yellow(), e),
    }
}

fn cmd_locations(session: &Session) {
    println!("{}", "Saved locations".bold().underline());
    for name in session.robot.locations() {
        println!("    • {}", name);
    }
    let route = session.controller.default_patrol_route();
    if route.is_empty() {
        println!("  Patrol route: {}", "(empty)".dimmed());
    } else {
        println!("  Patrol route: {}", route.join(" → ").bold());
    }
}

fn cmd_status(session: &Session) {
    println!("{}", "Status".bold().underline());
    println!("  Screen         : {}", format!("{:?}", session.kiosk.screen()).yellow());
    let patrol = match session.controller.patrol_state() {
        PatrolState::Idle => "idle".to_string(),
        PatrolState::Stepping { location, index } => format!("heading to {location} (#{index})"),
    };
    println!("  Patrol         : {}", patrol.yellow());
    let ballot = session.kiosk.ballot_state();
    println!(
        "  Lose dialog    : {}",
        if ballot.show_lose_dialog { "open".red() } else { "closed".green() }
    );
    println!(
        "  Map permission : {}",
        if session.controller.has_map_permission() {
            "granted".green()
        } else {
            "not granted".red()
        }
    );
}

fn cmd_settings() {
    let mut cfg = match config::load() {
        Ok(Some(c)) => c,
        Ok(None) => Config::default(),
        Err(e) => {
            println!("{}: {}", "Error loading config".red(), e);
            return;
        }
    };

    println!("{}", "Settings Editor".bold().underline());
    cfg.candidate_name = prompt_str(
        &format!("  Candidate name       [{}]: ", cfg.candidate_name),
        &cfg.candidate_name,
    );
    cfg.winning_number = prompt_parsed(
        &format!("  Winning number       [{}]: ", cfg.winning_number),
        cfg.winning_number,
    );
    cfg.inactivity_timeout_ms = prompt_parsed(
        &format!("  Inactivity (ms)      [{}]: ", cfg.inactivity_timeout_ms),
        cfg.inactivity_timeout_ms,
    );
    let locations = prompt_str(
        &format!("  Saved locations      [{}]: ", cfg.sim.locations.join(",")),
        &cfg.sim.locations.join(","),
    );
    cfg.sim.locations = config::parse_locations(&locations);

    match config::save(&cfg) {
        Ok(()) => println!(
            "{} {} {}",
            "✓ Settings saved to".green(),
            config::config_path().display().to_string().bold(),
            "(applied on next start)".dimmed()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Prompt for a parsed value.  Returns `default` on Enter or bad input.
fn prompt_parsed<T>(msg: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    let raw = prompt_str(msg, &default.to_string());
    match raw.parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            println!(
                "  {} '{}' is not a valid number, keeping {}",
                "Warning:".yellow(),
                raw,
                default
            );
            default
        }
    }
}

/// Prompt for a string value.  Returns `default` when the user presses Enter.
pub(crate) fn prompt_str(msg: &str, default: &str) -> String {
    print!("{}", msg);
    io::stdout().flush().ok();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let trimmed = line.trim().to_string();
            if trimmed.is_empty() {
                default.to_string()
            } else {
                trimmed
            }
        }
        Err(_) => default.to_string(),
    }
}
