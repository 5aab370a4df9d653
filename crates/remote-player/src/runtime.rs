//! Runtime wiring: builds the player from resolved config and runs a mode.

use std::io;

use anyhow::Result;

use crate::cli::EventStream;
use crate::config::{LocalConfig, OutputTarget, PlaybackConfig, RemoteConfig};
use audio_player::decode::SymphoniaEngine;
use audio_player::local::{self, Interrupts};
use audio_player::output::device;
use audio_player::output::live::LiveBackend;
use audio_player::output::wav::WavBackend;
use audio_player::output::{NullBackend, OutputBackend};
use audio_player::player::Player;
use audio_player::protocol::ChannelInput;
use audio_player::remote::RemoteController;
use audio_player::tags::LoftyTagReader;

/// List output devices and print them to stdout.
pub fn list_devices() -> Result<()> {
    let host = cpal::default_host();
    device::list_devices(&host)
}

/// Serve the remote-control protocol on stdin until QUIT or end of input.
pub fn run_remote(config: RemoteConfig) -> Result<()> {
    let player = build_player(&config.output, config.playback);
    let input = ChannelInput::stdin()?;
    tracing::debug!(events = ?config.events, "remote control ready");
    match config.events {
        EventStream::Stderr => {
            RemoteController::new(player, input, io::stderr()).run(&config.ready_name)
        }
        EventStream::Stdout => {
            RemoteController::new(player, input, io::stdout()).run(&config.ready_name)
        }
    }
}

/// Play the configured files, with Ctrl-C skipping tracks.
pub fn run_local(config: LocalConfig) -> Result<()> {
    let mut interrupts = Interrupts::install()?;
    let mut player = build_player(&config.output, config.playback);
    local::play_files(
        &mut player,
        &config.files,
        &mut interrupts,
        config.quiet,
        &mut io::stdout().lock(),
    )
}

fn build_player(output: &OutputTarget, playback: PlaybackConfig) -> Player {
    Player::new(
        Box::new(SymphoniaEngine),
        build_backend(output, playback),
        Box::new(LoftyTagReader),
    )
}

fn build_backend(output: &OutputTarget, playback: PlaybackConfig) -> Box<dyn OutputBackend> {
    match output {
        OutputTarget::Device => Box::new(LiveBackend::new(playback)),
        OutputTarget::Wav(path) => Box::new(WavBackend::new(path.clone())),
        OutputTarget::Null => Box::new(NullBackend),
    }
}
