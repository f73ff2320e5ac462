//! `votebot` – voting kiosk console.
//!
//! This binary runs the kiosk flow against a simulated robot.  It:
//!
//! 1. Checks for `~/.votebot/config.toml`; runs a **First-Run Wizard** when
//!    the file is absent.
//! 2. Builds a [`SimRobot`] and a [`RobotController`] on a Tokio runtime and
//!    asks for the map permission.
//! 3. Enters the attract screen (patrol running) and starts the kiosk's
//!    interaction listener and inactivity timer.
//! 4. Drops the operator into an **interactive REPL** (`/touch`, `/vote`,
//!    `/status`, `/help`, …).
//! 5. Intercepts **Ctrl-C** to stop the patrol and detach from the robot.

mod config;
mod kiosk;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use votebot_middleware::{SimBehavior, SimRobot};
use votebot_runtime::{LogFormat, RobotController, init_tracing};

use crate::kiosk::Kiosk;

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG filters (default "info"); VOTEBOT_LOG_FORMAT=json emits
    // newline-delimited JSON.  Operator output still uses println!.
    init_tracing(LogFormat::from_env());

    print_banner();

    // ── First-Run Wizard ──────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(None) => run_first_run_wizard(),
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start the async runtime".red(), e);
            std::process::exit(1);
        }
    };
    let _runtime_guard = runtime.enter();

    // ── Robot ─────────────────────────────────────────────────────────────
    let robot = SimRobot::with_behavior(SimBehavior {
        speech_latency: Some(Duration::from_millis(cfg.sim.speech_latency_ms)),
        navigation_latency: Some(Duration::from_millis(cfg.sim.navigation_latency_ms)),
        ..SimBehavior::default()
    });
    robot.set_locations(cfg.sim.locations.iter().cloned());
    for location in &cfg.sim.unreachable {
        robot.set_unreachable(location);
    }
    let controller = Arc::new(RobotController::new(
        Arc::new(robot.clone()),
        cfg.controller_config(),
    ));

    // ── Shared shutdown flag + Ctrl-C handler ─────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        let controller = controller.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            println!();
            println!("{}", "⚠  Ctrl-C received – stopping the robot …".yellow().bold());
            controller.dispose();
            println!("{}", "  ✓ Patrol stopped, robot released.".green());
            println!("{}", "  ✓ Exiting VoteBot.".green());
            shutdown.store(true, Ordering::SeqCst);
            std::process::exit(0);
        }) {
            warn!(error = %e, "Failed to install Ctrl-C handler; the robot will not be stopped on Ctrl-C");
        }
    }

    // ── Map permission ────────────────────────────────────────────────────
    print!("\n  Checking map permission … ");
    if runtime.block_on(controller.ensure_map_permission()) {
        println!("{}", "granted".green());
    } else {
        println!("{}", "not granted".yellow());
        println!("  {}", "Navigation may be refused by the robot.".dimmed());
    }

    // ── Kiosk ─────────────────────────────────────────────────────────────
    let kiosk = Arc::new(Kiosk::new(controller.clone(), cfg.kiosk_settings()));
    if let Err(e) = kiosk.enter_attract() {
        println!("{}: {}", "Could not start the patrol".red(), e);
    }
    let token = CancellationToken::new();
    let background = match kiosk.spawn_background(token.clone()) {
        Ok(handle) => Some(handle),
        Err(e) => {
            println!("{}: {}", "Kiosk listener not started".red(), e);
            None
        }
    };
    info!(
        candidate = %cfg.candidate_name,
        winning_number = cfg.winning_number,
        "kiosk ready"
    );

    println!();
    println!(
        "  Type {} for a list of commands.\n",
        "/help".bold().cyan()
    );

    // ── Interactive REPL ──────────────────────────────────────────────────
    let session = repl::Session {
        runtime: runtime.handle().clone(),
        robot,
        controller: controller.clone(),
        kiosk,
    };
    repl::run(&session, shutdown);

    token.cancel();
    if let Some(handle) = background
        && let Err(e) = runtime.block_on(handle)
    {
        warn!(error = %e, "kiosk background task failed");
    }
    controller.dispose();
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║      VoteBot First-Run Wizard        ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up the kiosk.\n");

    let mut cfg = config::Config::default();

    cfg.candidate_name = repl::prompt_str(
        &format!("  Candidate name [{}]: ", cfg.candidate_name),
        &cfg.candidate_name,
    );

    let number = repl::prompt_str(
        &format!("  Winning ballot number [{}]: ", cfg.winning_number),
        &cfg.winning_number.to_string(),
    );
    if let Ok(n) = number.trim().parse::<u32>() {
        cfg.winning_number = n;
    }

    let locations = repl::prompt_str(
        &format!(
            "  Saved robot locations, comma-separated [{}]: ",
            cfg.sim.locations.join(",")
        ),
        &cfg.sim.locations.join(","),
    );
    cfg.sim.locations = config::parse_locations(&locations);

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#" _    __      __       ____        __ "#.bold().cyan());
    println!("{}", r#"| |  / /___  / /____  / __ )____  / /_"#.bold().cyan());
    println!("{}", r#"| | / / __ \/ __/ _ \/ __  / __ \/ __/"#.bold().cyan());
    println!("{}", r#"| |/ / /_/ / /_/  __/ /_/ / /_/ / /_  "#.bold().cyan());
    println!("{}", r#"|___/\____/\__/\___/_____/\____/\__/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "VoteBot".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Robot voting kiosk");
    println!();
}
