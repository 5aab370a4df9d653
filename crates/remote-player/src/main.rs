//! remote-player: a command-line audio player with a line-oriented remote-control mode.
//!
//! ## Modes
//! - interactive: play the files given on the command line in order.
//! - `-R`: read commands (`LOAD`, `JUMP`, `STOP`, `VOLUME`, `PAUSE`, `QUIT`) from stdin and
//!   report `@`-prefixed status events, for frontends driving the player programmatically.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use remote_player::cli::Args;
use remote_player::config::RunConfig;
use remote_player::runtime;

fn main() -> Result<()> {
    let args = Args::parse();
    // Logs share stderr with the default event stream; keep them quiet in remote mode.
    let default_filter = if args.remote {
        "warn"
    } else if args.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match RunConfig::from_args(args)? {
        RunConfig::ListDevices => runtime::list_devices(),
        RunConfig::Remote(config) => runtime::run_remote(config),
        RunConfig::Local(config) => runtime::run_local(config),
    }
}
