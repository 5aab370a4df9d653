//! Playback session: the one loaded track, the open output device, and the volume.
//!
//! The decoder handle is owned by [`LoadedTrack`] and only ever replaced through
//! [`Session::replace_track`], so every teardown path (stop, quit, re-load, end-of-stream,
//! failure) releases it exactly once.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::decode::{DecodeStep, FrameDecoder, StreamInfo};
use crate::output::{OutputBackend, OutputDevice};
use crate::pipeline::{FramePipeline, OutputFormat};

/// Coarse player state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayState {
    Unloaded,
    Playing,
    Paused,
}

/// Seek request in whole seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekTarget {
    /// `+N` / `-N` from the current position.
    Relative(i64),
    /// `N` from the start of the track.
    Absolute(i64),
}

/// Sample and time counters reported after each frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Progress {
    pub current_sample: u64,
    /// Samples left when the length is known; otherwise the current sample.
    pub remaining_samples: u64,
    pub elapsed_secs: f64,
    pub remaining_secs: f64,
}

/// Outcome of one decode step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Step {
    /// Nothing loaded, or paused.
    Idle,
    Progress(Progress),
    /// End of stream reached; the track has been unloaded.
    Finished,
}

/// A loaded track and its per-track counters.
pub struct LoadedTrack {
    pub(crate) path: PathBuf,
    pub(crate) decoder: Box<dyn FrameDecoder>,
    pub(crate) info: StreamInfo,
    pub(crate) output: OutputFormat,
    pub(crate) current_sample: u64,
    pub(crate) total_time: f64,
    pub(crate) elapsed_time: f64,
    pub(crate) playing: bool,
}

impl LoadedTrack {
    pub(crate) fn new(path: PathBuf, decoder: Box<dyn FrameDecoder>, output: OutputFormat) -> Self {
        let info = decoder.info().clone();
        let total_time = info.total_samples as f64 / f64::from(output.rate);
        Self {
            path,
            decoder,
            info,
            output,
            current_sample: 0,
            total_time,
            elapsed_time: 0.0,
            playing: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    pub fn output_format(&self) -> &OutputFormat {
        &self.output
    }

    pub fn current_sample(&self) -> u64 {
        self.current_sample
    }

    pub fn elapsed_time(&self) -> f64 {
        self.elapsed_time
    }

    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    /// Account for `samples` rendered at `rate` and derive the remaining counters.
    fn advance(&mut self, samples: usize, rate: u32) -> Progress {
        self.current_sample += samples as u64;
        self.elapsed_time += samples as f64 / f64::from(rate.max(1));

        let total = self.info.total_samples;
        Progress {
            current_sample: self.current_sample,
            remaining_samples: if total > 0 {
                total.saturating_sub(self.current_sample)
            } else {
                self.current_sample
            },
            elapsed_secs: self.elapsed_time,
            remaining_secs: (self.total_time - self.elapsed_time).max(0.0),
        }
    }

    /// Apply a seek to the counters (constant-rate assumption) and reposition the decoder.
    ///
    /// Returns `false` when a relative forward seek past the end is ignored.
    /// Absolute targets are not range checked.
    fn seek(&mut self, target: SeekTarget) -> bool {
        let rate = i64::from(self.output.rate);
        match target {
            SeekTarget::Relative(delta) => {
                if delta < 0 && delta.unsigned_abs() as f64 > self.elapsed_time {
                    self.elapsed_time = 0.0;
                    self.current_sample = 0;
                } else if delta > 0 && delta as f64 > self.total_time - self.elapsed_time {
                    return false;
                } else {
                    self.elapsed_time += delta as f64;
                    self.current_sample = self
                        .current_sample
                        .saturating_add_signed(delta.saturating_mul(rate));
                }
            }
            SeekTarget::Absolute(secs) => {
                let sample = secs.saturating_mul(rate);
                self.elapsed_time = secs as f64;
                // Negative targets wrap, as the unsigned sample counter always has.
                self.current_sample = sample as u64;
                if sample < 0 || (self.info.total_samples > 0 && sample as u64 > self.info.total_samples) {
                    tracing::warn!(
                        secs,
                        total_samples = self.info.total_samples,
                        "absolute seek outside the track"
                    );
                }
            }
        }

        if let Err(e) = self.decoder.seek_absolute(self.current_sample) {
            tracing::warn!(sample = self.current_sample, "seek failed: {e:#}");
        }
        true
    }
}

/// Output device kept open across tracks while the format is unchanged.
struct OpenOutput {
    format: OutputFormat,
    device: Box<dyn OutputDevice>,
}

/// The single playback context.
pub struct Session {
    track: Option<LoadedTrack>,
    output: Option<OpenOutput>,
    pipeline: FramePipeline,
    volume: f32,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            track: None,
            output: None,
            pipeline: FramePipeline::new(),
            volume: 1.0,
        }
    }

    pub fn state(&self) -> PlayState {
        match &self.track {
            None => PlayState::Unloaded,
            Some(t) if t.playing => PlayState::Playing,
            Some(_) => PlayState::Paused,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.track.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlayState::Playing
    }

    pub fn track(&self) -> Option<&LoadedTrack> {
        self.track.as_ref()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Volume persists across loads.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    /// Swap the loaded track. The previous decoder (if any) is dropped here and nowhere else.
    ///
    /// Returns the path of the track that was replaced.
    pub fn replace_track(&mut self, next: Option<LoadedTrack>) -> Option<PathBuf> {
        if next.is_some() {
            if let Some(out) = self.output.as_mut() {
                out.device.set_paused(false);
            }
        }
        let previous = std::mem::replace(&mut self.track, next);
        previous.map(|t| {
            tracing::debug!(path = ?t.path, "track released");
            t.path
        })
    }

    /// Tear down the loaded track, if any, and drop audio still queued for it.
    /// Returns whether a track was loaded.
    pub fn unload(&mut self) -> bool {
        let released = self.replace_track(None).is_some();
        if released {
            if let Some(out) = self.output.as_mut() {
                out.device.discard();
            }
        }
        released
    }

    /// Make sure an output device for `format` is open, reusing the current one if it matches.
    pub fn ensure_output(&mut self, format: OutputFormat, backend: &mut dyn OutputBackend) -> Result<()> {
        if self.output.as_ref().is_some_and(|o| o.format == format) {
            return Ok(());
        }
        // Close before reopening; some backends hold exclusive resources.
        self.output = None;
        let device = backend.open(&format).context("open output device")?;
        self.output = Some(OpenOutput { format, device });
        Ok(())
    }

    /// Toggle pause. Returns the new state, or `None` when nothing is loaded.
    pub fn toggle_pause(&mut self) -> Option<PlayState> {
        let track = self.track.as_mut()?;
        track.playing = !track.playing;
        let paused = !track.playing;
        if let Some(out) = self.output.as_mut() {
            out.device.set_paused(paused);
        }
        Some(self.state())
    }

    /// Seek the loaded track. Returns `false` when unloaded or the seek was ignored.
    pub fn seek(&mut self, target: SeekTarget) -> bool {
        let Some(track) = self.track.as_mut() else {
            return false;
        };
        let applied = track.seek(target);
        if applied {
            if let Some(out) = self.output.as_mut() {
                out.device.discard();
            }
        }
        applied
    }

    /// Decode and render one frame while playing.
    ///
    /// On end-of-stream the track is unloaded and [`Step::Finished`] returned. Errors leave
    /// the track loaded; the caller decides whether to tear it down.
    pub fn step(&mut self) -> Result<Step> {
        let Some(track) = self.track.as_mut().filter(|t| t.playing) else {
            return Ok(Step::Idle);
        };

        let frame = match track.decoder.decode_frame()? {
            DecodeStep::Frame(frame) => frame,
            DecodeStep::EndOfStream => {
                // Queued audio still plays out.
                self.replace_track(None);
                return Ok(Step::Finished);
            }
        };

        if let Some(bytes) = self.pipeline.render(&frame, track.output.layout, self.volume) {
            if let Some(out) = self.output.as_mut() {
                out.device.play(bytes).context("play frame")?;
            }
        }
        Ok(Step::Progress(track.advance(frame.len(), frame.sample_rate)))
    }

    /// Block until queued output has played out.
    pub fn drain_output(&mut self) {
        if let Some(out) = self.output.as_mut() {
            out.device.drain();
        }
    }
}
