//! Playback library behind `remote-player`.
//!
//! ## Layers
//! - [`decode`]: decoding engine boundary (Symphonia in production).
//! - [`pipeline`]: per-frame conversion to the output layout, with volume.
//! - [`output`]: output backends (CPAL device, WAV file, null).
//! - [`session`] / [`player`]: the load/play/pause state machine.
//! - [`protocol`] / [`remote`]: the line-oriented remote-control protocol and its loop.
//! - [`local`]: interactive playback of a file list.

pub mod config;
pub mod decode;
pub mod local;
pub mod output;
pub mod pipeline;
pub mod player;
pub mod protocol;
pub mod remote;
pub mod session;
pub mod tags;

#[cfg(test)]
mod testing;
