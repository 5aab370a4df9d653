//! Fakes for the decoding engine, output backend, tag reader and control input.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Result, anyhow};

use crate::decode::{DecodeEngine, DecodeStep, Frame, FrameDecoder, StreamFormat, StreamInfo};
use crate::output::{OutputBackend, OutputDevice};
use crate::pipeline::{EightBitPolicy, OutputFormat};
use crate::protocol::input::{Chunk, ControlInput, ReadMode};
use crate::tags::{TagReader, TrackTags};

pub(crate) type SeekLog = Rc<RefCell<Vec<u64>>>;

pub(crate) fn stream_info(bits: u16, rate: u32, channels: u16, total_samples: u64) -> StreamInfo {
    StreamInfo {
        format: StreamFormat {
            bits,
            rate,
            channels,
        },
        total_samples,
        codec: None,
    }
}

/// Counters shared by every decoder an engine hands out.
#[derive(Clone, Default)]
pub(crate) struct Probe {
    opened: Rc<Cell<usize>>,
    dropped: Rc<Cell<usize>>,
    seeks: SeekLog,
}

impl Probe {
    pub(crate) fn opened(&self) -> usize {
        self.opened.get()
    }

    pub(crate) fn dropped(&self) -> usize {
        self.dropped.get()
    }

    pub(crate) fn seeks(&self) -> Vec<u64> {
        self.seeks.borrow().clone()
    }
}

/// Script for one fake file.
#[derive(Clone)]
pub(crate) struct FakeTrack {
    info: StreamInfo,
    frames: Vec<Frame>,
    fail_at_end: bool,
}

impl FakeTrack {
    pub(crate) fn new(info: StreamInfo) -> Self {
        Self {
            info,
            frames: Vec::new(),
            fail_at_end: false,
        }
    }

    /// Append `count` frames of `len` samples per channel; sample values are the index.
    pub(crate) fn frames(mut self, count: usize, len: usize) -> Self {
        let channels = usize::from(self.info.format.channels);
        for _ in 0..count {
            self.frames.push(Frame {
                sample_rate: self.info.format.rate,
                planes: vec![(0..len as i32).collect(); channels],
            });
        }
        self
    }

    pub(crate) fn frame(mut self, frame: Frame) -> Self {
        self.frames.push(frame);
        self
    }

    /// Report a decode error instead of end-of-stream.
    pub(crate) fn fail_at_end(mut self) -> Self {
        self.fail_at_end = true;
        self
    }
}

pub(crate) struct FakeDecoder {
    info: StreamInfo,
    frames: VecDeque<Frame>,
    fail_at_end: bool,
    seeks: SeekLog,
    dropped: Option<Rc<Cell<usize>>>,
}

impl FakeDecoder {
    pub(crate) fn new(info: StreamInfo, frames: Vec<Frame>) -> (Self, SeekLog) {
        let seeks = SeekLog::default();
        let decoder = Self {
            info,
            frames: frames.into(),
            fail_at_end: false,
            seeks: seeks.clone(),
            dropped: None,
        };
        (decoder, seeks)
    }
}

impl FrameDecoder for FakeDecoder {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn decode_frame(&mut self) -> Result<DecodeStep> {
        match self.frames.pop_front() {
            Some(frame) => Ok(DecodeStep::Frame(frame)),
            None if self.fail_at_end => Err(anyhow!("corrupt stream")),
            None => Ok(DecodeStep::EndOfStream),
        }
    }

    fn seek_absolute(&mut self, sample: u64) -> Result<()> {
        self.seeks.borrow_mut().push(sample);
        Ok(())
    }
}

impl Drop for FakeDecoder {
    fn drop(&mut self) {
        if let Some(dropped) = &self.dropped {
            dropped.set(dropped.get() + 1);
        }
    }
}

/// Engine serving scripted tracks by path; unknown paths fail to open.
#[derive(Default)]
pub(crate) struct FakeEngine {
    tracks: HashMap<PathBuf, FakeTrack>,
    probe: Probe,
}

impl FakeEngine {
    pub(crate) fn add(&mut self, path: &str, track: FakeTrack) {
        self.tracks.insert(PathBuf::from(path), track);
    }

    pub(crate) fn probe(&self) -> Probe {
        self.probe.clone()
    }
}

impl DecodeEngine for FakeEngine {
    fn open(&mut self, path: &Path) -> Result<Box<dyn FrameDecoder>> {
        let track = self
            .tracks
            .get(path)
            .ok_or_else(|| anyhow!("no such file: {}", path.display()))?
            .clone();
        self.probe.opened.set(self.probe.opened.get() + 1);
        Ok(Box::new(FakeDecoder {
            info: track.info,
            frames: track.frames.into(),
            fail_at_end: track.fail_at_end,
            seeks: self.probe.seeks.clone(),
            dropped: Some(self.probe.dropped.clone()),
        }))
    }
}

#[derive(Default)]
pub(crate) struct CaptureLog {
    pub(crate) opened: Vec<OutputFormat>,
    pub(crate) played: Vec<Vec<u8>>,
    pub(crate) discards: usize,
    /// Every `set_paused` call, in order.
    pub(crate) pauses: Vec<bool>,
    pub(crate) fail_open: bool,
}

/// Backend recording every device open and every buffer played.
pub(crate) struct CaptureBackend {
    policy: EightBitPolicy,
    log: Rc<RefCell<CaptureLog>>,
}

impl Default for CaptureBackend {
    fn default() -> Self {
        Self {
            policy: EightBitPolicy::Signed,
            log: Rc::default(),
        }
    }
}

impl CaptureBackend {
    pub(crate) fn log(&self) -> Rc<RefCell<CaptureLog>> {
        self.log.clone()
    }
}

impl OutputBackend for CaptureBackend {
    fn eight_bit_policy(&self) -> EightBitPolicy {
        self.policy
    }

    fn open(&mut self, format: &OutputFormat) -> Result<Box<dyn OutputDevice>> {
        let mut log = self.log.borrow_mut();
        if log.fail_open {
            return Err(anyhow!("device busy"));
        }
        log.opened.push(*format);
        Ok(Box::new(CaptureDevice {
            log: self.log.clone(),
        }))
    }
}

struct CaptureDevice {
    log: Rc<RefCell<CaptureLog>>,
}

impl OutputDevice for CaptureDevice {
    fn play(&mut self, bytes: &[u8]) -> Result<()> {
        self.log.borrow_mut().played.push(bytes.to_vec());
        Ok(())
    }

    fn discard(&mut self) {
        self.log.borrow_mut().discards += 1;
    }

    fn set_paused(&mut self, paused: bool) {
        self.log.borrow_mut().pauses.push(paused);
    }
}

pub(crate) struct FixedTags(pub(crate) Option<TrackTags>);

impl TagReader for FixedTags {
    fn read_tags(&self, _path: &Path) -> Option<TrackTags> {
        self.0.clone()
    }
}

/// Control input replaying a fixed script.
///
/// `Chunk::NotReady` entries are only observed by polls; a blocking read skips them.
/// Once the script runs out, polls report `NotReady` and blocking reads report `Closed`.
#[derive(Default)]
pub(crate) struct ScriptedInput {
    script: VecDeque<Chunk>,
}

impl ScriptedInput {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn data(mut self, bytes: &str) -> Self {
        self.script.push_back(Chunk::Data(bytes.as_bytes().to_vec()));
        self
    }

    /// `n` polls that find nothing pending.
    pub(crate) fn idle(mut self, n: usize) -> Self {
        self.script.extend(std::iter::repeat_n(Chunk::NotReady, n));
        self
    }

    pub(crate) fn close(mut self) -> Self {
        self.script.push_back(Chunk::Closed);
        self
    }
}

impl ControlInput for ScriptedInput {
    fn read_chunk(&mut self, mode: ReadMode) -> Result<Chunk> {
        loop {
            match (self.script.pop_front(), mode) {
                (Some(Chunk::NotReady), ReadMode::Block) => continue,
                (Some(chunk), _) => return Ok(chunk),
                (None, ReadMode::Poll) => return Ok(Chunk::NotReady),
                (None, ReadMode::Block) => return Ok(Chunk::Closed),
            }
        }
    }
}
