//! Playback state machine over the session and its collaborators.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::decode::{DecodeEngine, StreamInfo};
use crate::output::OutputBackend;
use crate::pipeline::OutputFormat;
use crate::session::{LoadedTrack, PlayState, Progress, SeekTarget, Session, Step};
use crate::tags::{TagReader, TrackTags};

/// What a successful load produced.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackInfo {
    pub path: PathBuf,
    pub tags: Option<TrackTags>,
    pub stream: StreamInfo,
}

/// Result of advancing playback by one frame.
#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome {
    Idle,
    Progress(Progress),
    /// End of stream; the track was unloaded.
    Finished,
    /// Hard decode failure; the track was unloaded.
    Failed { path: PathBuf },
}

/// Drives the [`Session`] through its load/play/pause lifecycle.
pub struct Player {
    engine: Box<dyn DecodeEngine>,
    backend: Box<dyn OutputBackend>,
    tags: Box<dyn TagReader>,
    session: Session,
}

impl Player {
    pub fn new(
        engine: Box<dyn DecodeEngine>,
        backend: Box<dyn OutputBackend>,
        tags: Box<dyn TagReader>,
    ) -> Self {
        Self {
            engine,
            backend,
            tags,
            session: Session::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> PlayState {
        self.session.state()
    }

    /// Tear down any loaded track, then open `path` and start playing it.
    ///
    /// On failure the player is left unloaded.
    pub fn load(&mut self, path: &Path) -> Result<TrackInfo> {
        self.session.unload();

        let decoder = self.engine.open(path)?;
        let stream = decoder.info().clone();
        let output = OutputFormat::for_stream(&stream.format, self.backend.eight_bit_policy());
        if output.layout.is_none() {
            tracing::warn!(bits = stream.format.bits, "unsupported bit depth; frames will not be rendered");
        }
        self.session.ensure_output(output, self.backend.as_mut())?;

        let tags = self.tags.read_tags(path);
        self.session
            .replace_track(Some(LoadedTrack::new(path.to_path_buf(), decoder, output)));
        tracing::info!(
            path = ?path,
            bits = stream.format.bits,
            rate_hz = stream.format.rate,
            channels = stream.format.channels,
            total_samples = stream.total_samples,
            "track loaded"
        );

        Ok(TrackInfo {
            path: path.to_path_buf(),
            tags,
            stream,
        })
    }

    /// Stop and unload. Returns `false` when nothing was loaded.
    pub fn stop(&mut self) -> bool {
        self.session.unload()
    }

    /// Toggle pause; `None` when unloaded.
    pub fn toggle_pause(&mut self) -> Option<PlayState> {
        self.session.toggle_pause()
    }

    /// Seek while playing or paused. Returns whether the position changed.
    pub fn jump(&mut self, target: SeekTarget) -> bool {
        self.session.seek(target)
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.session.set_volume(volume);
    }

    /// Unload before exit.
    pub fn quit(&mut self) {
        if self.session.unload() {
            tracing::debug!("unloaded on quit");
        }
    }

    /// Decode and render one frame if playing.
    pub fn step(&mut self) -> StepOutcome {
        match self.session.step() {
            Ok(Step::Idle) => StepOutcome::Idle,
            Ok(Step::Progress(p)) => StepOutcome::Progress(p),
            Ok(Step::Finished) => StepOutcome::Finished,
            Err(e) => {
                let path = self
                    .session
                    .track()
                    .map(|t| t.path().to_path_buf())
                    .unwrap_or_default();
                tracing::error!(path = ?path, "playback failed: {e:#}");
                self.session.unload();
                StepOutcome::Failed { path }
            }
        }
    }

    /// Wait for queued output to finish playing.
    pub fn drain_output(&mut self) {
        self.session.drain_output();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CaptureBackend, FakeEngine, FakeTrack, FixedTags, stream_info};

    fn player(engine: FakeEngine, backend: CaptureBackend) -> Player {
        Player::new(Box::new(engine), Box::new(backend), Box::new(FixedTags(None)))
    }

    #[test]
    fn load_failure_leaves_player_unloaded() {
        let mut engine = FakeEngine::default();
        engine.add("a.flac", FakeTrack::new(stream_info(16, 100, 1, 200)).frames(2, 100));
        let probe = engine.probe();
        let mut p = player(engine, CaptureBackend::default());

        p.load(Path::new("a.flac")).unwrap();
        assert!(p.load(Path::new("missing.flac")).is_err());
        assert_eq!(p.state(), PlayState::Unloaded);
        assert_eq!(probe.dropped(), 1);
    }

    #[test]
    fn output_open_failure_releases_decoder() {
        let mut engine = FakeEngine::default();
        engine.add("a.flac", FakeTrack::new(stream_info(16, 100, 1, 200)));
        let probe = engine.probe();
        let backend = CaptureBackend::default();
        backend.log().borrow_mut().fail_open = true;
        let mut p = player(engine, backend);

        assert!(p.load(Path::new("a.flac")).is_err());
        assert_eq!(p.state(), PlayState::Unloaded);
        assert_eq!(probe.opened(), 1);
        assert_eq!(probe.dropped(), 1);
    }

    #[test]
    fn output_device_is_reused_for_same_format() {
        let mut engine = FakeEngine::default();
        engine.add("a.flac", FakeTrack::new(stream_info(16, 44_100, 2, 0)));
        engine.add("b.flac", FakeTrack::new(stream_info(16, 44_100, 2, 0)));
        engine.add("c.flac", FakeTrack::new(stream_info(24, 96_000, 2, 0)));
        let backend = CaptureBackend::default();
        let log = backend.log();
        let mut p = player(engine, backend);

        p.load(Path::new("a.flac")).unwrap();
        p.load(Path::new("b.flac")).unwrap();
        assert_eq!(log.borrow().opened.len(), 1);
        p.load(Path::new("c.flac")).unwrap();
        assert_eq!(log.borrow().opened.len(), 2);
        assert_eq!(log.borrow().opened[1].rate, 96_000);
    }

    #[test]
    fn stop_discards_queued_audio_but_end_of_stream_does_not() {
        let mut engine = FakeEngine::default();
        engine.add("a.flac", FakeTrack::new(stream_info(16, 100, 1, 100)).frames(1, 100));
        let backend = CaptureBackend::default();
        let log = backend.log();
        let mut p = player(engine, backend);

        p.load(Path::new("a.flac")).unwrap();
        assert!(matches!(p.step(), StepOutcome::Progress(_)));
        assert_eq!(p.step(), StepOutcome::Finished);
        assert_eq!(log.borrow().discards, 0);

        p.load(Path::new("a.flac")).unwrap();
        assert!(p.stop());
        assert!(!p.stop());
        assert_eq!(log.borrow().discards, 1);
    }

    #[test]
    fn pause_holds_the_device_until_resumed_or_reloaded() {
        let mut engine = FakeEngine::default();
        engine.add("a.flac", FakeTrack::new(stream_info(16, 100, 1, 300)).frames(3, 100));
        let backend = CaptureBackend::default();
        let log = backend.log();
        let mut p = player(engine, backend);

        p.load(Path::new("a.flac")).unwrap();
        assert!(matches!(p.step(), StepOutcome::Progress(_)));
        assert_eq!(p.toggle_pause(), Some(PlayState::Paused));
        assert_eq!(log.borrow().pauses, [false, true]);
        assert_eq!(p.step(), StepOutcome::Idle);
        assert_eq!(log.borrow().played.len(), 1);

        assert_eq!(p.toggle_pause(), Some(PlayState::Playing));
        assert_eq!(log.borrow().pauses, [false, true, false]);

        // Stopping while paused must not leave the next track silent.
        p.toggle_pause();
        assert!(p.stop());
        p.load(Path::new("a.flac")).unwrap();
        assert_eq!(log.borrow().pauses.last(), Some(&false));
    }

    #[test]
    fn decode_failure_unloads_and_reports_path() {
        let mut engine = FakeEngine::default();
        engine.add("bad.flac", FakeTrack::new(stream_info(16, 100, 1, 0)).frames(1, 10).fail_at_end());
        let probe = engine.probe();
        let mut p = player(engine, CaptureBackend::default());

        p.load(Path::new("bad.flac")).unwrap();
        assert!(matches!(p.step(), StepOutcome::Progress(_)));
        assert_eq!(
            p.step(),
            StepOutcome::Failed {
                path: PathBuf::from("bad.flac")
            }
        );
        assert_eq!(p.state(), PlayState::Unloaded);
        assert_eq!(probe.dropped(), 1);
    }

    #[test]
    fn volume_persists_across_loads() {
        let mut engine = FakeEngine::default();
        engine.add("a.flac", FakeTrack::new(stream_info(16, 100, 1, 0)));
        let mut p = player(engine, CaptureBackend::default());
        p.set_volume(0.25);
        p.load(Path::new("a.flac")).unwrap();
        assert_eq!(p.session().volume(), 0.25);
    }
}
