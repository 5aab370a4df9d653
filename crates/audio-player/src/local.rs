//! Interactive playback of a list of files.
//!
//! Ctrl-C stops the current track after the in-flight frame and moves on to the next one;
//! a second Ctrl-C within a second quits.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::player::{Player, StepOutcome, TrackInfo};

/// Two interrupts closer than this quit instead of skipping.
const QUIT_WINDOW: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interrupt {
    SkipTrack,
    Quit,
}

/// Interrupt requests raised asynchronously and consumed once per frame.
#[derive(Debug, Default)]
pub struct Interrupts {
    pending: Arc<AtomicUsize>,
    last_skip: Option<Instant>,
}

impl Interrupts {
    /// Route Ctrl-C into a new set of interrupt requests.
    pub fn install() -> Result<Self> {
        let interrupts = Self::default();
        let pending = interrupts.pending.clone();
        ctrlc::set_handler(move || {
            pending.fetch_add(1, Ordering::SeqCst);
        })
        .context("install interrupt handler")?;
        Ok(interrupts)
    }

    /// Counter the handler increments; exposed for callers raising interrupts themselves.
    pub fn handle(&self) -> Arc<AtomicUsize> {
        self.pending.clone()
    }

    /// Consume pending interrupts observed at `now`.
    pub fn take(&mut self, now: Instant) -> Option<Interrupt> {
        let count = self.pending.swap(0, Ordering::SeqCst);
        if count == 0 {
            return None;
        }
        let recent = self
            .last_skip
            .is_some_and(|t| now.saturating_duration_since(t) < QUIT_WINDOW);
        if count > 1 || recent {
            return Some(Interrupt::Quit);
        }
        self.last_skip = Some(now);
        Some(Interrupt::SkipTrack)
    }
}

/// Play `files` in order, printing a summary per track unless `quiet`.
///
/// Files that fail to open are logged and skipped. Queued output is drained before returning.
pub fn play_files<W: Write>(
    player: &mut Player,
    files: &[PathBuf],
    interrupts: &mut Interrupts,
    quiet: bool,
    out: &mut W,
) -> Result<()> {
    'files: for path in files {
        let info = match player.load(path) {
            Ok(info) => info,
            Err(e) => {
                tracing::error!(path = ?path, "cannot play: {e:#}");
                continue;
            }
        };
        if !quiet {
            writeln!(out, "{}", track_summary(&info))?;
        }

        loop {
            match interrupts.take(Instant::now()) {
                Some(Interrupt::SkipTrack) => {
                    tracing::info!(path = ?path, "skipped");
                    player.stop();
                    continue 'files;
                }
                Some(Interrupt::Quit) => {
                    player.quit();
                    break 'files;
                }
                None => {}
            }
            match player.step() {
                StepOutcome::Progress(_) => {}
                StepOutcome::Idle | StepOutcome::Finished | StepOutcome::Failed { .. } => break,
            }
        }
    }
    player.drain_output();
    Ok(())
}

/// Human-readable description of a loaded track.
pub fn track_summary(info: &TrackInfo) -> String {
    let mut lines = vec![format!("Playing: {}", info.path.display())];
    if let Some(tags) = &info.tags {
        for (label, value) in [
            ("Title", &tags.title),
            ("Artist", &tags.artist),
            ("Album", &tags.album),
            ("Year", &tags.year),
            ("Comment", &tags.comment),
            ("Genre", &tags.genre),
        ] {
            if let Some(value) = value {
                lines.push(format!("{label:<8} {value}"));
            }
        }
    }
    let format = info.stream.format;
    let total_secs = info.stream.total_samples as f64 / f64::from(format.rate);
    lines.push(format!(
        "{} bit, {} Hz, {} channels, {} total samples, {:.2} total seconds",
        format.bits, format.rate, format.channels, info.stream.total_samples, total_secs
    ));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::PlayState;
    use crate::tags::TrackTags;
    use crate::testing::{CaptureBackend, FakeEngine, FakeTrack, FixedTags, stream_info};

    #[test]
    fn single_interrupt_skips_and_quick_second_quits() {
        let mut i = Interrupts::default();
        let t0 = Instant::now();
        assert_eq!(i.take(t0), None);

        i.handle().fetch_add(1, Ordering::SeqCst);
        assert_eq!(i.take(t0), Some(Interrupt::SkipTrack));

        i.handle().fetch_add(1, Ordering::SeqCst);
        assert_eq!(i.take(t0 + Duration::from_millis(500)), Some(Interrupt::Quit));
    }

    #[test]
    fn interrupts_far_apart_each_skip() {
        let mut i = Interrupts::default();
        let t0 = Instant::now();
        i.handle().fetch_add(1, Ordering::SeqCst);
        assert_eq!(i.take(t0), Some(Interrupt::SkipTrack));
        i.handle().fetch_add(1, Ordering::SeqCst);
        assert_eq!(i.take(t0 + Duration::from_secs(2)), Some(Interrupt::SkipTrack));
    }

    #[test]
    fn burst_of_interrupts_quits() {
        let mut i = Interrupts::default();
        i.handle().fetch_add(2, Ordering::SeqCst);
        assert_eq!(i.take(Instant::now()), Some(Interrupt::Quit));
    }

    fn player(engine: FakeEngine, backend: CaptureBackend) -> Player {
        Player::new(Box::new(engine), Box::new(backend), Box::new(FixedTags(None)))
    }

    #[test]
    fn plays_every_file_and_skips_unopenable_ones() {
        let mut engine = FakeEngine::default();
        engine.add("a.flac", FakeTrack::new(stream_info(16, 100, 1, 200)).frames(2, 100));
        engine.add("b.flac", FakeTrack::new(stream_info(16, 100, 1, 100)).frames(1, 100));
        let probe = engine.probe();
        let backend = CaptureBackend::default();
        let log = backend.log();
        let mut p = player(engine, backend);

        let files: Vec<PathBuf> = ["a.flac", "missing.flac", "b.flac"].iter().map(PathBuf::from).collect();
        let mut out = Vec::new();
        play_files(&mut p, &files, &mut Interrupts::default(), false, &mut out).unwrap();

        assert_eq!(log.borrow().played.len(), 3);
        assert_eq!(probe.dropped(), 2);
        assert_eq!(p.state(), PlayState::Unloaded);
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Playing: a.flac"));
        assert!(out.contains("Playing: b.flac"));
        assert!(!out.contains("missing"));
    }

    #[test]
    fn pending_interrupt_skips_current_track() {
        let mut engine = FakeEngine::default();
        engine.add("a.flac", FakeTrack::new(stream_info(16, 100, 1, 1_000)).frames(10, 100));
        engine.add("b.flac", FakeTrack::new(stream_info(16, 100, 1, 100)).frames(1, 100));
        let backend = CaptureBackend::default();
        let log = backend.log();
        let mut p = player(engine, backend);

        let mut interrupts = Interrupts::default();
        interrupts.handle().fetch_add(1, Ordering::SeqCst);
        let files = vec![PathBuf::from("a.flac"), PathBuf::from("b.flac")];
        play_files(&mut p, &files, &mut interrupts, true, &mut std::io::sink()).unwrap();

        assert_eq!(log.borrow().played.len(), 1);
        assert_eq!(log.borrow().discards, 1);
    }

    #[test]
    fn summary_lists_tags_and_format() {
        let info = TrackInfo {
            path: "a.flac".into(),
            tags: Some(TrackTags {
                title: Some("Song".into()),
                year: Some("2001".into()),
                ..Default::default()
            }),
            stream: stream_info(24, 96_000, 2, 192_000),
        };
        let summary = track_summary(&info);
        assert!(summary.contains("Title    Song"));
        assert!(summary.contains("Year     2001"));
        assert!(summary.ends_with("24 bit, 96000 Hz, 2 channels, 192000 total samples, 2.00 total seconds"));
    }
}
