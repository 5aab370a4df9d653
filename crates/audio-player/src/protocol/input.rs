//! Control input: a byte source read either blocking or as a zero-timeout poll.

use std::io::Read;
use std::thread;

use anyhow::Result;
use crossbeam_channel::{Receiver, TryRecvError};

use super::reassembler::{Extracted, LineReassembler};

/// How the driving loop wants to wait for input this turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadMode {
    /// Idle: wait until bytes arrive or the stream closes.
    Block,
    /// Playing: return immediately if nothing is pending.
    Poll,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Chunk {
    Data(Vec<u8>),
    NotReady,
    Closed,
}

/// Source of raw control bytes.
pub trait ControlInput {
    fn read_chunk(&mut self, mode: ReadMode) -> Result<Chunk>;
}

/// Bytes forwarded from a reader thread over a channel.
pub struct ChannelInput {
    rx: Receiver<Vec<u8>>,
}

impl ChannelInput {
    /// Spawn a thread that forwards everything read from `reader` until EOF or error.
    pub fn spawn<R>(mut reader: R) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::unbounded();
        thread::Builder::new()
            .name("control-input".into())
            .spawn(move || {
                let mut buf = vec![0u8; 4096];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            if tx.send(buf[..n].to_vec()).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            tracing::warn!("control input read failed: {e}");
                            break;
                        }
                    }
                }
                tracing::debug!("control input closed");
            })?;
        Ok(Self { rx })
    }

    pub fn stdin() -> Result<Self> {
        Self::spawn(std::io::stdin())
    }
}

impl ControlInput for ChannelInput {
    fn read_chunk(&mut self, mode: ReadMode) -> Result<Chunk> {
        Ok(match mode {
            ReadMode::Block => match self.rx.recv() {
                Ok(bytes) => Chunk::Data(bytes),
                Err(_) => Chunk::Closed,
            },
            ReadMode::Poll => match self.rx.try_recv() {
                Ok(bytes) => Chunk::Data(bytes),
                Err(TryRecvError::Empty) => Chunk::NotReady,
                Err(TryRecvError::Disconnected) => Chunk::Closed,
            },
        })
    }
}

/// What the driving loop receives each turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Incoming {
    Line(String),
    TooLong,
    /// Poll found no complete command.
    Pending,
    EndOfInput,
}

/// Pairs a [`ControlInput`] with a [`LineReassembler`].
pub struct CommandReader<I> {
    input: I,
    lines: LineReassembler,
    closed: bool,
}

impl<I: ControlInput> CommandReader<I> {
    pub fn new(input: I) -> Self {
        Self {
            input,
            lines: LineReassembler::default(),
            closed: false,
        }
    }

    /// Return at most one command line. In [`ReadMode::Block`] this waits for a complete
    /// line (or end of input); in [`ReadMode::Poll`] it returns [`Incoming::Pending`] as
    /// soon as the source has nothing more.
    pub fn next(&mut self, mode: ReadMode) -> Result<Incoming> {
        loop {
            if let Some(extracted) = self.lines.next_line() {
                return Ok(extracted.into());
            }
            if self.closed {
                return Ok(Incoming::EndOfInput);
            }
            match self.input.read_chunk(mode)? {
                Chunk::Data(bytes) => self.lines.push(&bytes),
                Chunk::NotReady => return Ok(Incoming::Pending),
                Chunk::Closed => {
                    self.closed = true;
                    if let Some(extracted) = self.lines.finish() {
                        return Ok(extracted.into());
                    }
                }
            }
        }
    }
}

impl From<Extracted> for Incoming {
    fn from(e: Extracted) -> Self {
        match e {
            Extracted::Line(line) => Self::Line(line),
            Extracted::TooLong => Self::TooLong,
        }
    }
}
