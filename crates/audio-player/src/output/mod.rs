//! Output device boundary.
//!
//! A backend opens devices for a given [`OutputFormat`]; the session keeps the opened device
//! across tracks while the format stays the same.

pub mod device;
pub mod live;
mod queue;
pub mod wav;

use anyhow::Result;

use crate::pipeline::{EightBitPolicy, OutputFormat};

/// An opened output device. Dropping it closes the device.
pub trait OutputDevice {
    /// Hand packed samples to the device. May block to pace playback.
    fn play(&mut self, bytes: &[u8]) -> Result<()>;

    /// Drop audio queued but not yet audible (stop/seek).
    fn discard(&mut self) {}

    /// Block until queued audio has been played out.
    fn drain(&mut self) {}

    /// Hold (or release) queued audio without dropping it.
    fn set_paused(&mut self, _paused: bool) {}
}

/// Factory for output devices.
pub trait OutputBackend {
    /// How this backend wants 8-bit streams delivered.
    fn eight_bit_policy(&self) -> EightBitPolicy;

    fn open(&mut self, format: &OutputFormat) -> Result<Box<dyn OutputDevice>>;
}

/// Backend that accepts and discards audio.
#[derive(Debug, Default)]
pub struct NullBackend;

struct NullDevice;

impl OutputDevice for NullDevice {
    fn play(&mut self, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }
}

impl OutputBackend for NullBackend {
    fn eight_bit_policy(&self) -> EightBitPolicy {
        EightBitPolicy::Signed
    }

    fn open(&mut self, format: &OutputFormat) -> Result<Box<dyn OutputDevice>> {
        tracing::debug!(
            bits = format.bits,
            rate_hz = format.rate,
            channels = format.channels,
            "null output opened"
        );
        Ok(Box::new(NullDevice))
    }
}
