/// Output tuning parameters shared by the live output backend.
#[derive(Clone, Debug)]
pub struct PlaybackConfig {
    /// Output device substring match (`None` = host default).
    pub device: Option<String>,
    /// Max frames pulled per output callback refill.
    pub refill_max_frames: usize,
    /// Target duration of audio queued ahead of the device.
    ///
    /// Bounds how long STOP/PAUSE take to become audible.
    pub buffer_seconds: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            device: None,
            refill_max_frames: 4096,
            buffer_seconds: 0.5,
        }
    }
}
