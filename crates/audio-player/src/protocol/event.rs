//! Status events written to the control output stream.

use std::fmt;
use std::io::Write;

use anyhow::{Context, Result};

use crate::player::TrackInfo;
use crate::session::Progress;

/// `@P` payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackStatus {
    Stopped = 0,
    Paused = 1,
    Resumed = 2,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// `@R <name>`
    Ready(String),
    /// `@I <tags-or-filename>`
    Info(String),
    /// `@F <current> <remaining> <elapsed> <remaining-time>`
    Frame(Progress),
    /// `@P 0|1|2`
    Status(PlaybackStatus),
    /// `@V <value>`
    Volume(f32),
    /// `@E <message>`
    Error(String),
}

impl Event {
    /// The `@I` event for a freshly loaded track: the tag record when tags exist, otherwise
    /// the path without its `.flac` extension.
    pub fn track_info(info: &TrackInfo) -> Self {
        let payload = match &info.tags {
            Some(tags) => tags.id3_line(),
            None => {
                let path = info.path.to_string_lossy();
                trim_flac_extension(&path).to_string()
            }
        };
        Self::Info(payload)
    }
}

/// Cut at the last `.` when that dot is also where the first `.flac` starts.
///
/// `x.flacx` becomes `x` and `dir.flac/song` becomes `dir`; `a.flac.flac` is left alone.
fn trim_flac_extension(path: &str) -> &str {
    match (path.rfind('.'), path.find(".flac")) {
        (Some(dot), Some(flac)) if dot == flac => &path[..dot],
        _ => path,
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(name) => write!(f, "@R {name}"),
            Self::Info(payload) => write!(f, "@I {payload}"),
            Self::Frame(p) => write!(
                f,
                "@F {} {} {:.2} {:.2}",
                p.current_sample, p.remaining_samples, p.elapsed_secs, p.remaining_secs
            ),
            Self::Status(status) => write!(f, "@P {}", *status as u8),
            Self::Volume(v) => write!(f, "@V {v:.6}"),
            Self::Error(msg) => write!(f, "@E {msg}"),
        }
    }
}

/// Writes one event per line and flushes after each.
pub struct EventWriter<W: Write> {
    out: W,
}

impl<W: Write> EventWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn emit(&mut self, event: &Event) -> Result<()> {
        writeln!(self.out, "{event}").context("write event")?;
        self.out.flush().context("flush events")
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
