//! WAV file output (`--wav FILE`).

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};

use super::{OutputBackend, OutputDevice};
use crate::pipeline::{EightBitPolicy, OutputFormat, SampleLayout};

/// Writes every opened device to the same path, truncating it on each open.
pub struct WavBackend {
    path: PathBuf,
}

impl WavBackend {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl OutputBackend for WavBackend {
    /// 8-bit WAV data is unsigned.
    fn eight_bit_policy(&self) -> EightBitPolicy {
        EightBitPolicy::Unsigned
    }

    fn open(&mut self, format: &OutputFormat) -> Result<Box<dyn OutputDevice>> {
        let spec = WavSpec {
            channels: format.channels,
            sample_rate: format.rate,
            bits_per_sample: format.layout.map(SampleLayout::output_bits).unwrap_or(16),
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(&self.path, spec)
            .with_context(|| format!("create wav file {:?}", self.path))?;
        tracing::info!(path = ?self.path, bits = spec.bits_per_sample, rate_hz = spec.sample_rate, "wav output opened");
        Ok(Box::new(WavDevice {
            writer: Some(writer),
            layout: format.layout,
        }))
    }
}

struct WavDevice {
    writer: Option<WavWriter<BufWriter<File>>>,
    layout: Option<SampleLayout>,
}

impl OutputDevice for WavDevice {
    fn play(&mut self, bytes: &[u8]) -> Result<()> {
        let (Some(writer), Some(layout)) = (self.writer.as_mut(), self.layout) else {
            return Ok(());
        };
        write_packed(writer, layout, bytes).context("write wav samples")
    }
}

impl Drop for WavDevice {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                tracing::warn!("wav finalize failed: {e}");
            }
        }
    }
}

/// Re-read packed samples and hand them to hound, which owns the on-disk encoding.
fn write_packed<W>(writer: &mut WavWriter<W>, layout: SampleLayout, bytes: &[u8]) -> hound::Result<()>
where
    W: std::io::Write + std::io::Seek,
{
    match layout {
        SampleLayout::U8 => {
            for &b in bytes {
                writer.write_sample((i16::from(b) - 128) as i8)?;
            }
        }
        SampleLayout::S8 => {
            for &b in bytes {
                writer.write_sample(b as i8)?;
            }
        }
        SampleLayout::S8As16 | SampleLayout::S16 => {
            for b in bytes.chunks_exact(2) {
                writer.write_sample(i16::from_le_bytes([b[0], b[1]]))?;
            }
        }
        SampleLayout::S24 => {
            for b in bytes.chunks_exact(3) {
                writer.write_sample(i32::from_le_bytes([0, b[0], b[1], b[2]]) >> 8)?;
            }
        }
    }
    Ok(())
}
