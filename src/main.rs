mod cli;

use clap::Parser;
use cli::{Cli, Command};
use palm_reject::daemon::{self, DaemonConfig};
use palm_reject::discovery::Enumerator;
use std::sync::mpsc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the default log filter.
const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

fn init_logging(cli_level: Option<&str>) {
    let directive = cli_level
        .map(str::to_string)
        .or_else(|| std::env::var(LOG_LEVEL_ENV).ok())
        .unwrap_or_else(|| "info".to_string());

    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("palm-reject-daemon: invalid log filter {directive:?} ({e}), using info");
        EnvFilter::new("info")
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match cli.command {
        Command::Run {
            cooldown_ms,
            timeout,
            pipe,
            touchpads,
            keyboard,
        } => {
            let config = DaemonConfig {
                cooldown: Duration::from_millis(cooldown_ms),
                timeout: timeout.map(Duration::from_secs),
                pipe_path: pipe,
                touchpads,
                keyboard,
                ..DaemonConfig::default()
            };

            let (tx, rx) = mpsc::channel();
            if let Err(e) = ctrlc::set_handler(move || {
                let _ = tx.send(());
            }) {
                log::error!("failed to install signal handler: {e}");
                eprintln!("palm-reject-daemon run: {e}");
                std::process::exit(1);
            }

            if let Err(e) = daemon::run(&config, &rx) {
                log::error!("daemon failed: {e}");
                eprintln!("palm-reject-daemon run: {e}");
                std::process::exit(1);
            }
        }
        Command::ListDevices => match daemon::list_devices(&Enumerator::default()) {
            Ok(report) => {
                if report.touchpads.is_empty() {
                    println!("touchpads: none found");
                } else {
                    println!("touchpads:");
                    for (i, pad) in report.touchpads.iter().enumerate() {
                        println!("  {}. {pad}", i + 1);
                    }
                }
                match report.keyboard {
                    Some(keyboard) => println!("keyboard: {keyboard}"),
                    None => println!("keyboard: none found"),
                }
            }
            Err(e) => {
                log::error!("device listing failed: {e}");
                eprintln!("palm-reject-daemon list-devices: {e}");
                std::process::exit(1);
            }
        },
        Command::Send { command, pipe } => {
            if let Err(e) = daemon::send_command(&pipe, command) {
                log::error!("send failed: {e}");
                eprintln!("palm-reject-daemon send: {e}");
                std::process::exit(1);
            }
        }
    }
}
