use std::path::PathBuf;

use anyhow::{Result, anyhow};

pub use audio_player::config::PlaybackConfig;

use crate::cli::{Args, EventStream};

/// Where rendered audio goes.
#[derive(Clone, Debug, PartialEq)]
pub enum OutputTarget {
    /// Live output device (`PlaybackConfig::device`, or the host default).
    Device,
    Wav(PathBuf),
    Null,
}

#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub ready_name: String,
    pub events: EventStream,
    pub output: OutputTarget,
    pub playback: PlaybackConfig,
}

#[derive(Clone, Debug)]
pub struct LocalConfig {
    pub files: Vec<PathBuf>,
    pub quiet: bool,
    pub output: OutputTarget,
    pub playback: PlaybackConfig,
}

/// What the process was asked to do.
#[derive(Clone, Debug)]
pub enum RunConfig {
    ListDevices,
    Remote(RemoteConfig),
    Local(LocalConfig),
}

impl RunConfig {
    pub fn from_args(args: Args) -> Result<Self> {
        if args.list_devices {
            return Ok(Self::ListDevices);
        }

        let output = match (args.wav, args.null_output) {
            (Some(path), _) => OutputTarget::Wav(path),
            (None, true) => OutputTarget::Null,
            (None, false) => OutputTarget::Device,
        };
        let playback = PlaybackConfig {
            device: normalize_device_name(args.device),
            refill_max_frames: args.refill_max_frames.max(1),
            buffer_seconds: args.buffer_seconds,
        };

        if args.remote {
            if !args.files.is_empty() {
                tracing::warn!(count = args.files.len(), "files ignored in remote mode");
            }
            return Ok(Self::Remote(RemoteConfig {
                ready_name: args.ready_name,
                events: args.events,
                output,
                playback,
            }));
        }

        if args.files.is_empty() {
            return Err(anyhow!("no files to play (use -R for remote-control mode)"));
        }
        Ok(Self::Local(LocalConfig {
            files: args.files,
            quiet: args.quiet,
            output,
            playback,
        }))
    }
}

fn normalize_device_name(device: Option<String>) -> Option<String> {
    device.and_then(|name| {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
