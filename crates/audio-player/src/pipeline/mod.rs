//! Per-frame audio pipeline.
//!
//! Converts a decoded [`Frame`] into the packed byte layout the output device expects and
//! applies the runtime volume scale on the way. The layout is chosen once, when the output
//! device is opened (see [`SampleLayout::negotiate`]), so the per-frame path only matches on
//! a single enum.

use crate::decode::{Frame, StreamFormat};

/// How a backend wants 8-bit input delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EightBitPolicy {
    /// Unsigned-offset bytes (WAV files).
    Unsigned,
    /// Signed bytes, passed through.
    Signed,
    /// Promote to signed 16-bit (`sample << 8`).
    PromoteTo16,
}

/// Packed sample layout written to the output device. Multi-byte layouts are little-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleLayout {
    U8,
    S8,
    S8As16,
    S16,
    S24,
}

impl SampleLayout {
    /// Pick the layout for a decoded bit depth, or `None` when the depth is not rendered.
    pub fn negotiate(bits: u16, policy: EightBitPolicy) -> Option<Self> {
        match bits {
            8 => Some(match policy {
                EightBitPolicy::Unsigned => Self::U8,
                EightBitPolicy::Signed => Self::S8,
                EightBitPolicy::PromoteTo16 => Self::S8As16,
            }),
            16 => Some(Self::S16),
            24 => Some(Self::S24),
            _ => None,
        }
    }

    /// Bit depth of the packed samples.
    pub fn output_bits(self) -> u16 {
        match self {
            Self::U8 | Self::S8 => 8,
            Self::S8As16 | Self::S16 => 16,
            Self::S24 => 24,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        usize::from(self.output_bits() / 8)
    }

    /// Unpack bytes written in this layout into normalized `f32` samples.
    ///
    /// Used by backends that do not consume integer PCM directly.
    pub fn unpack_f32(self, bytes: &[u8], out: &mut Vec<f32>) {
        out.clear();
        match self {
            Self::U8 => out.extend(bytes.iter().map(|&b| (f32::from(b) - 128.0) / 128.0)),
            Self::S8 => out.extend(bytes.iter().map(|&b| f32::from(b as i8) / 128.0)),
            Self::S8As16 | Self::S16 => out.extend(
                bytes
                    .chunks_exact(2)
                    .map(|b| f32::from(i16::from_le_bytes([b[0], b[1]])) / 32_768.0),
            ),
            Self::S24 => out.extend(
                bytes
                    .chunks_exact(3)
                    .map(|b| unpack_s24([b[0], b[1], b[2]]) as f32 / 8_388_608.0),
            ),
        }
    }
}

/// Format the output device is opened with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputFormat {
    pub bits: u16,
    pub rate: u32,
    pub channels: u16,
    /// `None` when the stream's bit depth is not rendered; frames are then dropped.
    pub layout: Option<SampleLayout>,
}

impl OutputFormat {
    /// Derive the device format for a decoded stream under a backend's 8-bit policy.
    pub fn for_stream(stream: &StreamFormat, policy: EightBitPolicy) -> Self {
        let layout = SampleLayout::negotiate(stream.bits, policy);
        Self {
            bits: layout.map(SampleLayout::output_bits).unwrap_or(stream.bits),
            rate: stream.rate,
            channels: stream.channels,
            layout,
        }
    }
}

/// Scale a sample by `volume` and truncate toward zero.
///
/// Narrowing to the output width is done by the caller with `as`, which wraps; extreme
/// volume multipliers therefore wrap rather than saturate.
fn scale(sample: i32, volume: f32) -> i64 {
    (sample as f32 * volume) as i64
}

fn unpack_s24(b: [u8; 3]) -> i32 {
    i32::from_le_bytes([0, b[0], b[1], b[2]]) >> 8
}

/// Reusable packing buffer for the per-frame pipeline.
#[derive(Debug, Default)]
pub struct FramePipeline {
    buf: Vec<u8>,
}

impl FramePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interleave and pack `frame`, returning the bytes to hand to the device.
    ///
    /// Returns `None` when `layout` is `None` (unsupported depth).
    /// 8-bit layouts are not volume scaled.
    pub fn render(
        &mut self,
        frame: &Frame,
        layout: Option<SampleLayout>,
        volume: f32,
    ) -> Option<&[u8]> {
        let layout = layout?;
        let samples = frame.len();
        let channels = frame.channels();
        self.buf.clear();
        self.buf
            .reserve(samples * channels * layout.bytes_per_sample());

        for i in 0..samples {
            for plane in &frame.planes {
                let s = plane.get(i).copied().unwrap_or(0);
                match layout {
                    SampleLayout::U8 => self.buf.push(s.wrapping_add(0x80) as u8),
                    SampleLayout::S8 => self.buf.push(s as u8),
                    SampleLayout::S8As16 => {
                        self.buf.extend_from_slice(&((s << 8) as i16).to_le_bytes())
                    }
                    SampleLayout::S16 => {
                        self.buf
                            .extend_from_slice(&(scale(s, volume) as i16).to_le_bytes());
                    }
                    SampleLayout::S24 => {
                        let v = scale(s, volume) as i32;
                        self.buf.extend_from_slice(&v.to_le_bytes()[..3]);
                    }
                }
            }
        }
        Some(&self.buf)
    }
}
