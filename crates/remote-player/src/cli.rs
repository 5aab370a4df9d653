use std::path::PathBuf;

use clap::{Parser, ValueEnum};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

/// Where protocol events are written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum EventStream {
    #[default]
    Stderr,
    Stdout,
}

#[derive(Parser, Debug)]
#[command(name = "remote-player", version = VERSION)]
pub struct Args {
    /// Files to play in order (interactive mode)
    pub files: Vec<PathBuf>,

    /// Remote-control mode: read commands from stdin, write `@` events
    #[arg(short = 'R', long)]
    pub remote: bool,

    /// Don't print track summaries (interactive mode)
    #[arg(short, long)]
    pub quiet: bool,

    /// Write audio to a WAV file instead of an output device
    #[arg(long, value_name = "FILE", conflicts_with = "null_output")]
    pub wav: Option<PathBuf>,

    /// Decode and discard audio
    #[arg(long)]
    pub null_output: bool,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Queue buffer target in seconds ahead of the output device
    #[arg(long, default_value_t = 0.5)]
    pub buffer_seconds: f32,

    /// Playback callback refill cap (frames). Larger reduces lock churn but can add latency.
    #[arg(long, default_value_t = 4096)]
    pub refill_max_frames: usize,

    /// Stream that receives protocol events in remote mode
    #[arg(long, value_enum, default_value_t = EventStream::Stderr)]
    pub events: EventStream,

    /// Name announced in the `@R` event
    #[arg(long, default_value = audio_player::remote::DEFAULT_READY_NAME)]
    pub ready_name: String,
}
