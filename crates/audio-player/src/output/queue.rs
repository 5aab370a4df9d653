//! Bounded sample queue between the player thread and the CPAL callback.
//!
//! The player pushes interleaved `f32` with [`SampleQueue::push_blocking`], which waits while
//! the queue is full; this is what paces decoding to real time. The callback drains with
//! [`SampleQueue::pop_nonblocking`] and never waits.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

pub(crate) struct SampleQueue {
    channels: usize,
    inner: Mutex<QueueInner>,
    cv: Condvar,
    max_buffered_samples: usize,
}

struct QueueInner {
    samples: VecDeque<f32>,
    closed: bool,
}

/// Queue capacity in samples for `buffer_seconds` of audio.
///
/// Non-finite or non-positive durations fall back to half a second.
pub(crate) fn calc_max_buffered_samples(rate_hz: u32, channels: usize, buffer_seconds: f32) -> usize {
    let secs = if buffer_seconds.is_finite() && buffer_seconds > 0.0 {
        buffer_seconds
    } else {
        0.5
    };

    let frames = (rate_hz as f32 * secs).ceil() as usize;
    frames.max(1).saturating_mul(channels.max(1))
}

impl SampleQueue {
    pub(crate) fn new(channels: usize, max_buffered_samples: usize) -> Self {
        let channels = channels.max(1);
        Self {
            channels,
            inner: Mutex::new(QueueInner {
                samples: VecDeque::new(),
                closed: false,
            }),
            cv: Condvar::new(),
            max_buffered_samples: max_buffered_samples.max(channels),
        }
    }

    pub(crate) fn channels(&self) -> usize {
        self.channels
    }

    /// Mark the queue closed and wake all waiters. Idempotent.
    pub(crate) fn close(&self) {
        let mut g = self.inner.lock().unwrap();
        g.closed = true;
        drop(g);
        self.cv.notify_all();
    }

    /// Drop everything queued.
    pub(crate) fn clear(&self) {
        let mut g = self.inner.lock().unwrap();
        g.samples.clear();
        drop(g);
        self.cv.notify_all();
    }

    /// Push interleaved samples, blocking while the queue is full.
    ///
    /// Returns early (dropping the rest) if the queue is closed while waiting.
    pub(crate) fn push_blocking(&self, samples: &[f32]) {
        let mut offset = 0;

        while offset < samples.len() {
            let mut g = self.inner.lock().unwrap();

            while g.samples.len() >= self.max_buffered_samples && !g.closed {
                g = self.cv.wait(g).unwrap();
            }
            if g.closed {
                return;
            }

            let room = self.max_buffered_samples - g.samples.len();
            let take = room.min(samples.len() - offset);
            g.samples.extend(&samples[offset..offset + take]);
            offset += take;

            drop(g);
            self.cv.notify_all();
        }
    }

    /// Take up to `max_frames` whole frames without waiting; `None` if none are queued.
    pub(crate) fn pop_nonblocking(&self, max_frames: usize) -> Option<Vec<f32>> {
        let mut g = self.inner.lock().unwrap();
        let take_frames = (g.samples.len() / self.channels).min(max_frames);
        let take_samples = take_frames * self.channels;
        if take_samples == 0 {
            return None;
        }

        let out: Vec<f32> = g.samples.drain(..take_samples).collect();
        drop(g);
        self.cv.notify_all();
        Some(out)
    }

    /// Wait until the queue is empty or `timeout` elapses. Returns `true` if drained.
    pub(crate) fn wait_drained(&self, timeout: Duration) -> bool {
        let g = self.inner.lock().unwrap();
        let (g, _timeout) = self
            .cv
            .wait_timeout_while(g, timeout, |inner| !inner.samples.is_empty() && !inner.closed)
            .unwrap();
        g.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn calc_max_buffered_samples_fallbacks() {
        assert_eq!(calc_max_buffered_samples(48_000, 2, 1.0), 96_000);
        assert_eq!(calc_max_buffered_samples(48_000, 2, -1.0), 48_000);
        assert_eq!(calc_max_buffered_samples(48_000, 2, f32::NAN), 48_000);
    }

    #[test]
    fn pop_nonblocking_empty() {
        let q = SampleQueue::new(2, 16);
        assert!(q.pop_nonblocking(4).is_none());
    }

    #[test]
    fn pop_nonblocking_returns_whole_frames() {
        let q = SampleQueue::new(2, 64);
        q.push_blocking(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        let out = q.pop_nonblocking(8).unwrap();
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);
        assert!(q.pop_nonblocking(8).is_none());
    }

    #[test]
    fn push_blocking_waits_for_room() {
        let q = Arc::new(SampleQueue::new(1, 2));
        let q_push = q.clone();

        let handle = thread::spawn(move || {
            q_push.push_blocking(&[1.0, 2.0, 3.0, 4.0]);
        });

        let mut seen = Vec::new();
        while seen.len() < 4 {
            if let Some(v) = q.pop_nonblocking(1) {
                seen.extend(v);
            } else {
                thread::yield_now();
            }
        }
        handle.join().unwrap();
        assert_eq!(seen, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn close_releases_blocked_pusher() {
        let q = Arc::new(SampleQueue::new(1, 1));
        let q_push = q.clone();

        let handle = thread::spawn(move || {
            q_push.push_blocking(&[1.0, 2.0, 3.0]);
        });
        thread::sleep(Duration::from_millis(20));
        q.close();
        handle.join().unwrap();
    }

    #[test]
    fn clear_drops_queued_samples() {
        let q = SampleQueue::new(2, 64);
        q.push_blocking(&[1.0, 2.0]);
        q.clear();
        assert!(q.pop_nonblocking(1).is_none());
        assert!(q.wait_drained(Duration::from_millis(1)));
    }

    #[test]
    fn wait_drained_times_out_with_data() {
        let q = SampleQueue::new(2, 64);
        q.push_blocking(&[1.0, 2.0]);
        assert!(!q.wait_drained(Duration::from_millis(10)));
    }
}
