//! Line-oriented remote-control protocol.
//!
//! Commands arrive as newline-terminated text on the control input; status comes back as
//! `@`-prefixed event lines.

pub mod command;
pub mod event;
pub mod input;
pub mod reassembler;

pub use command::{Command, CommandError};
pub use event::{Event, EventWriter, PlaybackStatus};
pub use input::{ChannelInput, CommandReader, ControlInput, Incoming, ReadMode};
