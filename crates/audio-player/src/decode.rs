//! Decoding engine boundary.
//!
//! The player only sees [`DecodeEngine`] / [`FrameDecoder`]; the production engine is
//! [`SymphoniaEngine`], which:
//! - probes the input container/codec
//! - decodes one packet per call into planar `i32` samples at the stream's bit depth
//! - seeks by absolute sample index

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, CodecParameters, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Bit depth assumed when the codec does not declare one (lossy codecs).
const DEFAULT_BITS: u16 = 16;

/// Bit depth, sample rate and channel count of a stream or device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamFormat {
    pub bits: u16,
    pub rate: u32,
    pub channels: u16,
}

/// Stream properties captured when the decoder is opened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamInfo {
    pub format: StreamFormat,
    /// Total samples per channel; `0` when the length is unknown.
    pub total_samples: u64,
    /// Codec name (best-effort).
    pub codec: Option<String>,
}

/// One decoded block of samples, one `Vec` per channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub sample_rate: u32,
    pub planes: Vec<Vec<i32>>,
}

impl Frame {
    /// Samples per channel in this block.
    pub fn len(&self) -> usize {
        self.planes.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channels(&self) -> usize {
        self.planes.len()
    }
}

/// Result of a single decode step.
#[derive(Debug)]
pub enum DecodeStep {
    Frame(Frame),
    EndOfStream,
}

/// An open decoder instance. Dropping it closes the stream.
pub trait FrameDecoder {
    fn info(&self) -> &StreamInfo;

    /// Decode the next frame, or report end-of-stream.
    fn decode_frame(&mut self) -> Result<DecodeStep>;

    /// Reposition the stream so the next frame starts at `sample`.
    fn seek_absolute(&mut self, sample: u64) -> Result<()>;
}

/// Factory for decoder instances.
pub trait DecodeEngine {
    fn open(&mut self, path: &Path) -> Result<Box<dyn FrameDecoder>>;
}

/// Symphonia-backed engine for local files.
#[derive(Debug, Default)]
pub struct SymphoniaEngine;

impl DecodeEngine for SymphoniaEngine {
    fn open(&mut self, path: &Path) -> Result<Box<dyn FrameDecoder>> {
        Ok(Box::new(SymphoniaDecoder::open(path)?))
    }
}

/// Decoder state for a single probed file.
pub struct SymphoniaDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    info: StreamInfo,
    /// Samples still to drop after a seek landed before its target.
    skip: u64,
}

impl SymphoniaDecoder {
    /// Probe `path` and prepare a decoder for its default audio track.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open {:?}", path))?;

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .with_context(|| format!("probe {:?}", path))?;

        let format = probed.format;
        let track = format
            .default_track()
            .filter(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .or_else(|| {
                format
                    .tracks()
                    .iter()
                    .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            })
            .ok_or_else(|| anyhow!("No audio track"))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let info = stream_info_from_params(&codec_params)?;
        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .context("create decoder")?;

        tracing::debug!(
            path = ?path,
            codec = info.codec.as_deref().unwrap_or("unknown"),
            bits = info.format.bits,
            rate_hz = info.format.rate,
            channels = info.format.channels,
            total_samples = info.total_samples,
            "decoder opened"
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            info,
            skip: 0,
        })
    }
}

impl FrameDecoder for SymphoniaDecoder {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn decode_frame(&mut self) -> Result<DecodeStep> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(DecodeStep::EndOfStream);
                }
                Err(SymphoniaError::ResetRequired) => {
                    tracing::warn!("stream parameters changed mid-stream; treating as end of stream");
                    return Ok(DecodeStep::EndOfStream);
                }
                Err(e) => return Err(e).context("read packet"),
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(msg)) => {
                    tracing::warn!(%msg, ts = packet.ts(), "skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(e).context("decode packet"),
            };
            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let frames = decoded.frames();
            let skip = usize::try_from(self.skip).unwrap_or(usize::MAX).min(frames);
            self.skip -= skip as u64;
            if skip == frames {
                continue;
            }

            let mut buf = SampleBuffer::<i32>::new(frames as u64, spec);
            buf.copy_planar_ref(decoded);

            let shift = 32 - u32::from(self.info.format.bits.clamp(1, 32));
            let planes = buf
                .samples()
                .chunks(frames)
                .map(|plane| plane[skip..].iter().map(|s| s >> shift).collect())
                .collect();

            return Ok(DecodeStep::Frame(Frame {
                sample_rate: spec.rate,
                planes,
            }));
        }
    }

    /// Symphonia lands on the packet containing `sample`; the samples before it are dropped
    /// from the next decoded frames.
    fn seek_absolute(&mut self, sample: u64) -> Result<()> {
        let seeked = self
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: sample,
                    track_id: self.track_id,
                },
            )
            .with_context(|| format!("seek to sample {sample}"))?;
        self.decoder.reset();
        self.skip = seeked.required_ts.saturating_sub(seeked.actual_ts);
        tracing::trace!(
            required = seeked.required_ts,
            actual = seeked.actual_ts,
            "seeked"
        );
        Ok(())
    }
}

/// Read the stream format and length from codec metadata.
fn stream_info_from_params(params: &CodecParameters) -> Result<StreamInfo> {
    let channels = params
        .channels
        .ok_or_else(|| anyhow!("Unknown channels"))?
        .count();
    let rate = params
        .sample_rate
        .ok_or_else(|| anyhow!("Unknown sample rate"))?;
    if rate == 0 {
        return Err(anyhow!("Invalid sample rate 0"));
    }
    let bits = params
        .bits_per_sample
        .or(params.bits_per_coded_sample)
        .and_then(|v| u16::try_from(v).ok())
        .filter(|b| (1..=32).contains(b))
        .unwrap_or(DEFAULT_BITS);

    Ok(StreamInfo {
        format: StreamFormat {
            bits,
            rate,
            channels: u16::try_from(channels).context("channel count")?,
        },
        total_samples: params.n_frames.unwrap_or(0),
        codec: codec_name_from_params(params),
    })
}

/// Best-effort codec label used in logs and the local track summary.
fn codec_name_from_params(params: &CodecParameters) -> Option<String> {
    use symphonia::core::codecs::*;
    let name = match params.codec {
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_AAC => "AAC",
        CODEC_TYPE_ALAC => "ALAC",
        CODEC_TYPE_VORBIS => "VORBIS",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM_S16",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM_S24",
        CODEC_TYPE_PCM_U8 | CODEC_TYPE_PCM_S8 => "PCM_8",
        _ => return None,
    };
    Some(name.to_string())
}
