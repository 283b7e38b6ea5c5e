//! autotty - host an interactive program and answer its prompts
//!
//! autotty runs a shell or any other interactive program behind a
//! pseudo-terminal (ConPTY on Windows), shows its screen in the current
//! terminal, and answers prompts that match configured rules.
//!
//! # Quick Start
//!
//! ```text
//! autotty                      # Configured shell, or $SHELL / cmd.exe
//! autotty -s bash              # Another shell
//! autotty -- ssh example.org   # Any program with arguments
//! ```
//!
//! # Keybindings
//!
//! | Key | Action |
//! |-----|--------|
//! | Alt+1..9 | Send preset command |
//! | Ctrl+Shift+C | Copy screen text |
//! | Ctrl+Shift+V | Paste clipboard text |
//! | r (after exit) | Restart the program |
//! | q / Esc (after exit) | Quit |

use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use autotty::config::Config;
use autotty::core::session::{RenderUpdate, Session, SessionOptions, SessionStatus};
use autotty::core::term::ScreenSnapshot;
use autotty::ui::{Clipboard, InputAction, KeyMapper, Renderer, StatusLine};

/// Command line options
#[derive(Debug, Default)]
struct Args {
    /// Configuration file instead of ~/.autotty/config.toml
    config: Option<PathBuf>,
    /// Program and arguments replacing the configured shell
    command: Option<Vec<String>>,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Longest wait for input when nothing is scheduled
const IDLE_POLL: Duration = Duration::from_millis(50);

fn print_version() {
    eprintln!("autotty {}", VERSION);
}

fn print_help() {
    eprintln!("autotty {} - answer terminal prompts automatically", VERSION);
    eprintln!();
    eprintln!("Usage: autotty [OPTIONS] [-- PROGRAM [ARGS...]]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <PATH>   Configuration file (default: ~/.autotty/config.toml)");
    eprintln!("  -s, --shell <CMD>     Program to run instead of the configured shell");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Keybindings:");
    eprintln!("  Alt+1..9              Send preset command");
    eprintln!("  Ctrl+Shift+C          Copy screen text");
    eprintln!("  Ctrl+Shift+V          Paste clipboard text");
    eprintln!("  r                     Restart (after the program exited)");
    eprintln!("  q, Esc                Quit (after the program exited)");
    eprintln!();
    eprintln!("Log file: ~/.autotty/autotty.log (filter with AUTOTTY_LOG, e.g. AUTOTTY_LOG=debug)");
}

fn parse_args() -> Result<Args, String> {
    let argv: Vec<String> = env::args().collect();
    let mut args = Args::default();
    let mut i = 1;

    while i < argv.len() {
        match argv[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-c" | "--config" => {
                i += 1;
                let path = argv.get(i).ok_or("Missing config path")?;
                args.config = Some(PathBuf::from(path));
            }
            "-s" | "--shell" => {
                i += 1;
                let shell = argv.get(i).ok_or("Missing shell argument")?;
                args.command = Some(vec![shell.clone()]);
            }
            "--" => {
                let rest = argv[i + 1..].to_vec();
                if rest.is_empty() {
                    return Err("Missing program after --".to_string());
                }
                args.command = Some(rest);
                break;
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(args)
}

/// Log to ~/.autotty/autotty.log; never to the hosting terminal
fn init_logging() {
    let log_path = Config::data_dir()
        .map(|dir| dir.join("autotty.log"))
        .unwrap_or_else(|| PathBuf::from("autotty.log"));

    let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) else {
        return;
    };
    let filter = EnvFilter::try_from_env("AUTOTTY_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("autotty {} starting", VERSION);

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    let rules = config.compile_rules()?;
    let spawn = config
        .spawn_spec(args.command.as_deref())
        .env("AUTOTTY", "1");

    // The last host row is the status bar
    let (cols, rows) = Renderer::size().context("Failed to query terminal size")?;
    let options = SessionOptions {
        render_interval: config.render_interval(),
        match_window_bytes: config.match_window_bytes,
        ..SessionOptions::new(spawn, cols, grid_rows(rows))
    };

    let (tx, rx) = mpsc::channel();
    let mut session = Session::start(options, rules, tx).context("Failed to start session")?;

    let mut renderer = Renderer::new();
    renderer.init().context("Failed to set up the terminal")?;

    let result = run_main_loop(&mut session, &rx, &mut renderer, &config);

    session.stop();
    renderer.cleanup()?;
    if let Err(e) = &result {
        error!("Main loop failed: {:#}", e);
    }
    info!("autotty exiting");
    result
}

fn grid_rows(host_rows: u16) -> u16 {
    host_rows.saturating_sub(1).max(1)
}

fn status_line(session: &Session<mpsc::Sender<RenderUpdate>>, status: &SessionStatus) -> StatusLine {
    let automation = session.automation();
    StatusLine {
        command: session.spawn_spec().display(),
        status: status.clone(),
        armed: automation.armed_count(),
        rules: automation.rules().len(),
        fired: automation.fired_count(),
    }
}

fn run_main_loop(
    session: &mut Session<mpsc::Sender<RenderUpdate>>,
    updates: &Receiver<RenderUpdate>,
    renderer: &mut Renderer,
    config: &Config,
) -> anyhow::Result<()> {
    let mut clipboard = Clipboard::new();
    let mut snapshot: Arc<ScreenSnapshot> = session.screen().snapshot();
    let mut status = session.status().clone();
    let mut needs_redraw = true;

    loop {
        let now = Instant::now();
        session.tick(now);

        for update in updates.try_iter() {
            match update {
                RenderUpdate::Snapshot(s) => snapshot = s,
                RenderUpdate::Status(s) => status = s,
            }
            needs_redraw = true;
        }
        if needs_redraw {
            renderer.render(&snapshot, &status_line(session, &status))?;
            needs_redraw = false;
        }

        let timeout = session
            .next_deadline(now)
            .map_or(IDLE_POLL, |deadline| {
                deadline.saturating_duration_since(Instant::now()).min(IDLE_POLL)
            });
        if !event::poll(timeout)? {
            continue;
        }

        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                // Input is disabled once the program has ended
                if !status.is_running() {
                    match key.code {
                        KeyCode::Char('r') => {
                            if let Err(e) = session.restart() {
                                error!("Restart failed: {}", e);
                            }
                            renderer.invalidate();
                            needs_redraw = true;
                        }
                        KeyCode::Char('q') | KeyCode::Esc => break,
                        _ => {}
                    }
                    continue;
                }

                match KeyMapper::action(&key, &snapshot.modes) {
                    Some(InputAction::Send(bytes)) => {
                        session.send_input(&bytes);
                    }
                    Some(InputAction::Preset(index)) => match config.presets.get(index) {
                        Some(preset) => {
                            session.send_preset(preset);
                        }
                        None => debug!("No preset bound to Alt+{}", index + 1),
                    },
                    Some(InputAction::Copy) => {
                        clipboard.copy(&snapshot.text());
                    }
                    Some(InputAction::Paste) => {
                        if let Some(text) = clipboard.paste() {
                            session.send_input(&KeyMapper::paste(&text, &snapshot.modes));
                        }
                    }
                    None => {}
                }
            }
            Event::Resize(cols, rows) => {
                session.resize(cols, grid_rows(rows));
                renderer.invalidate();
                needs_redraw = true;
            }
            _ => {}
        }
    }

    Ok(())
}
