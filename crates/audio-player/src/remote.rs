//! Remote-control driving loop.
//!
//! While a track is playing each turn polls the control input and, if no command consumed
//! the turn, decodes one frame. Otherwise the loop blocks until a command arrives.

use std::io::Write;
use std::path::Path;

use anyhow::Result;

use crate::player::{Player, StepOutcome};
use crate::protocol::{
    Command, CommandReader, ControlInput, Event, EventWriter, Incoming, PlaybackStatus, ReadMode,
};
use crate::session::PlayState;

/// Default `@R` payload.
pub const DEFAULT_READY_NAME: &str = "REMOTE-PLAYER";

enum Flow {
    Continue,
    Quit,
}

pub struct RemoteController<I, W: Write> {
    player: Player,
    reader: CommandReader<I>,
    events: EventWriter<W>,
}

impl<I: ControlInput, W: Write> RemoteController<I, W> {
    pub fn new(player: Player, input: I, events: W) -> Self {
        Self {
            player,
            reader: CommandReader::new(input),
            events: EventWriter::new(events),
        }
    }

    /// Announce readiness and serve commands until QUIT or end of input.
    ///
    /// Only event-stream write failures are returned.
    pub fn run(&mut self, ready_name: &str) -> Result<()> {
        self.events.emit(&Event::Ready(ready_name.to_string()))?;
        loop {
            let mode = match self.player.state() {
                PlayState::Playing => ReadMode::Poll,
                PlayState::Paused | PlayState::Unloaded => ReadMode::Block,
            };
            let flow = match self.reader.next(mode)? {
                Incoming::Line(line) => self.handle_line(&line)?,
                Incoming::TooLong => {
                    self.events.emit(&Event::Error("Command too long".into()))?;
                    Flow::Continue
                }
                Incoming::Pending => {
                    self.advance()?;
                    Flow::Continue
                }
                Incoming::EndOfInput => {
                    tracing::debug!("control input ended; quitting");
                    self.player.quit();
                    Flow::Quit
                }
            };
            if let Flow::Quit = flow {
                return Ok(());
            }
        }
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn into_events(self) -> W {
        self.events.into_inner()
    }

    fn handle_line(&mut self, line: &str) -> Result<Flow> {
        match Command::parse(line) {
            Ok(Some(cmd)) => self.dispatch(cmd),
            Ok(None) => Ok(Flow::Continue),
            Err(e) => {
                tracing::debug!(line, "rejected command: {e}");
                self.events.emit(&Event::Error(e.to_string()))?;
                Ok(Flow::Continue)
            }
        }
    }

    fn dispatch(&mut self, cmd: Command) -> Result<Flow> {
        match cmd {
            Command::Load(path) => match self.player.load(Path::new(&path)) {
                Ok(info) => self.events.emit(&Event::track_info(&info))?,
                Err(e) => {
                    tracing::warn!(path = %path, "load failed: {e:#}");
                    self.events.emit(&Event::Error(format!("Error opening {path}")))?;
                }
            },
            Command::Jump(Some(target)) => {
                if !self.player.jump(target) {
                    tracing::debug!(?target, "jump ignored");
                }
            }
            Command::Jump(None) | Command::Volume(None) => {}
            Command::Stop => {
                if self.player.session().is_loaded() {
                    self.events.emit(&Event::Status(PlaybackStatus::Stopped))?;
                    self.player.stop();
                }
            }
            Command::Volume(Some(v)) => {
                self.player.set_volume(v);
                self.events.emit(&Event::Volume(v))?;
            }
            Command::Pause => match self.player.toggle_pause() {
                Some(PlayState::Paused) => self.events.emit(&Event::Status(PlaybackStatus::Paused))?,
                Some(_) => self.events.emit(&Event::Status(PlaybackStatus::Resumed))?,
                None => {}
            },
            Command::Quit => {
                self.player.quit();
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }

    /// Decode one frame and report what happened.
    fn advance(&mut self) -> Result<()> {
        match self.player.step() {
            StepOutcome::Idle => {}
            StepOutcome::Progress(p) => self.events.emit(&Event::Frame(p))?,
            StepOutcome::Finished => self.events.emit(&Event::Status(PlaybackStatus::Stopped))?,
            StepOutcome::Failed { path } => {
                self.events
                    .emit(&Event::Error(format!("Error decoding {}", path.display())))?;
                self.events.emit(&Event::Status(PlaybackStatus::Stopped))?;
            }
        }
        Ok(())
    }
}
