//! Live output through CPAL.
//!
//! `play` unpacks the pipeline's bytes to `f32` and pushes them into a bounded
//! [`SampleQueue`]; the CPAL callback drains it, maps channels, and converts to the device
//! sample format. A full queue blocks `play`, which keeps decoding in step with the device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, StreamTrait};

use super::queue::{SampleQueue, calc_max_buffered_samples};
use super::{OutputBackend, OutputDevice, device};
use crate::config::PlaybackConfig;
use crate::pipeline::{EightBitPolicy, OutputFormat, SampleLayout};

/// Upper bound on waiting for queued audio to play out.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens CPAL output streams on the configured (or default) device.
pub struct LiveBackend {
    host: cpal::Host,
    config: PlaybackConfig,
}

impl LiveBackend {
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            host: cpal::default_host(),
            config,
        }
    }
}

impl OutputBackend for LiveBackend {
    /// CPAL hosts rarely expose signed 8-bit streams.
    fn eight_bit_policy(&self) -> EightBitPolicy {
        EightBitPolicy::PromoteTo16
    }

    fn open(&mut self, format: &OutputFormat) -> Result<Box<dyn OutputDevice>> {
        let device = device::pick_device(&self.host, self.config.device.as_deref())?;
        let supported = device::pick_output_config(&device, format.rate, format.channels)?;
        let mut stream_config: cpal::StreamConfig = supported.clone().into();
        if let Some(buf) = device::pick_buffer_size(&supported) {
            stream_config.buffer_size = buf;
        }
        tracing::info!(
            device = %device.description()?,
            rate_hz = stream_config.sample_rate,
            channels = stream_config.channels,
            sample_format = ?supported.sample_format(),
            buffer_size = ?stream_config.buffer_size,
            "output device opened"
        );

        let channels = usize::from(format.channels);
        let queue = Arc::new(SampleQueue::new(
            channels,
            calc_max_buffered_samples(format.rate, channels, self.config.buffer_seconds),
        ));
        let paused = Arc::new(AtomicBool::new(false));
        let stream = build_output_stream(
            &device,
            &stream_config,
            supported.sample_format(),
            &queue,
            &paused,
            self.config.refill_max_frames,
        )?;
        stream.play()?;

        Ok(Box::new(LiveDevice {
            _stream: stream,
            queue,
            paused,
            layout: format.layout,
            scratch: Vec::new(),
        }))
    }
}

struct LiveDevice {
    _stream: cpal::Stream,
    queue: Arc<SampleQueue>,
    /// While set the callback writes silence and leaves the queue untouched.
    paused: Arc<AtomicBool>,
    layout: Option<SampleLayout>,
    scratch: Vec<f32>,
}

impl OutputDevice for LiveDevice {
    fn play(&mut self, bytes: &[u8]) -> Result<()> {
        let Some(layout) = self.layout else {
            return Ok(());
        };
        layout.unpack_f32(bytes, &mut self.scratch);
        self.queue.push_blocking(&self.scratch);
        Ok(())
    }

    fn discard(&mut self) {
        self.queue.clear();
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    fn drain(&mut self) {
        if !self.queue.wait_drained(DRAIN_TIMEOUT) {
            tracing::warn!("timed out waiting for output to drain");
        }
    }
}

impl Drop for LiveDevice {
    fn drop(&mut self) {
        self.queue.close();
    }
}

fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: &Arc<SampleQueue>,
    paused: &Arc<AtomicBool>,
    refill_max_frames: usize,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, queue, paused, refill_max_frames),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, queue, paused, refill_max_frames),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, queue, paused, refill_max_frames),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, queue, paused, refill_max_frames),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

/// Type-specialized stream builder. Underruns and pauses are filled with silence.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &Arc<SampleQueue>,
    paused: &Arc<AtomicBool>,
    refill_max_frames: usize,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = usize::from(config.channels);
    let state = Arc::new(Mutex::new(CallbackState {
        pos: 0,
        src_channels: queue.channels(),
        src: Vec::new(),
    }));

    let refill_max_frames = refill_max_frames.max(1);
    let queue_cb = queue.clone();
    let paused_cb = paused.clone();
    let err_fn = |err| tracing::warn!("stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            if paused_cb.load(Ordering::Relaxed) {
                data.fill(<T as cpal::Sample>::from_sample::<f32>(0.0));
                return;
            }

            let mut st = state.lock().unwrap();
            let frames = data.len() / channels_out;

            for frame in 0..frames {
                if st.pos >= st.src.len() {
                    st.pos = 0;
                    match queue_cb.pop_nonblocking(refill_max_frames) {
                        Some(v) => st.src = v,
                        None => {
                            st.src.clear();
                            data[frame * channels_out..].fill(<T as cpal::Sample>::from_sample::<f32>(0.0));
                            break;
                        }
                    }
                }
                for ch in 0..channels_out {
                    let sample = next_sample_mapped(&mut st, channels_out, ch);
                    data[frame * channels_out + ch] = <T as cpal::Sample>::from_sample::<f32>(sample);
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Interleaved samples fetched from the queue, consumed across callbacks.
struct CallbackState {
    pos: usize,
    src_channels: usize,
    src: Vec<f32>,
}

/// Read one output sample for `dst_ch`, mapping source channels onto the device layout.
///
/// - mono → stereo: duplicate channel 0
/// - stereo → mono: average L/R
/// - other layouts: clamp to the available channels
///
/// `st.pos` advances once per destination frame (after the last channel).
fn next_sample_mapped(st: &mut CallbackState, dst_channels: usize, dst_ch: usize) -> f32 {
    let frame_start = st.pos;
    let get_src = |ch: usize, st: &CallbackState| -> f32 {
        st.src.get(frame_start + ch).copied().filter(|_| ch < st.src_channels).unwrap_or(0.0)
    };

    let out = match (st.src_channels, dst_channels) {
        (2, 1) => 0.5 * (get_src(0, st) + get_src(1, st)),
        (src, _) => get_src(dst_ch.min(src.saturating_sub(1)), st),
    };

    if dst_ch + 1 == dst_channels {
        st.pos += st.src_channels;
    }
    out
}
