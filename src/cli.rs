use clap::{Parser, Subcommand};
use palm_reject::OverrideCommand;
use palm_reject::daemon::DEFAULT_PIPE_PATH;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "palm-reject-daemon",
    version,
    about = "Daemon that disables the touchpad while typing"
)]
pub struct Cli {
    /// Log filter, e.g. `debug` or `palm_reject=trace`. Overrides LOG_LEVEL
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the daemon
    Run {
        /// Quiet period after the last keypress, in milliseconds
        #[arg(long, default_value_t = 300)]
        cooldown_ms: u64,

        /// Auto-stop after this many seconds, for safe testing
        #[arg(long)]
        timeout: Option<u64>,

        /// Command pipe path
        #[arg(long, default_value = DEFAULT_PIPE_PATH)]
        pipe: PathBuf,

        /// Touchpad device path; repeat for several. Skips discovery
        #[arg(long = "touchpad")]
        touchpads: Vec<String>,

        /// Keyboard device path. Skips discovery
        #[arg(long)]
        keyboard: Option<String>,
    },

    /// Print the touchpads and keyboard the daemon would use
    ListDevices,

    /// Send an override command to a running daemon
    Send {
        /// touchpad_disable, touchpad_enable or touchpad_toggle
        command: OverrideCommand,

        /// Command pipe path
        #[arg(long, default_value = DEFAULT_PIPE_PATH)]
        pipe: PathBuf,
    },
}
