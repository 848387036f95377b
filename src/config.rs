use std::time::Duration;

pub const DEFAULT_THUMB_WIDTH: f64 = 96.0;
pub const DEFAULT_THUMB_HEIGHT: f64 = DEFAULT_THUMB_WIDTH * 3.0 / 4.0;
pub const DEFAULT_SAMPLING_INTERVAL_SECS: u32 = 5;
pub const DEFAULT_MIN_SEEK_INTERVAL_SECS: f64 = 0.3;
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_CORNER_RADIUS: f64 = 12.0;
pub const DEFAULT_TILE_FADE_IN: Duration = Duration::from_millis(300);

/// Tunables for a single timeline instance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimelineConfig {
    pub thumb_width: f64,
    pub thumb_height: f64,
    sampling_interval_secs: u32,
    /// Playback-time distance two drag seeks must be apart, in seconds.
    pub min_seek_interval: f64,
    /// Pause between `finished` and the rewind to the start.
    pub settle_delay: Duration,
    pub corner_radius: f64,
    pub tile_fade_in: Duration,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            thumb_width: DEFAULT_THUMB_WIDTH,
            thumb_height: DEFAULT_THUMB_HEIGHT,
            sampling_interval_secs: DEFAULT_SAMPLING_INTERVAL_SECS,
            min_seek_interval: DEFAULT_MIN_SEEK_INTERVAL_SECS,
            settle_delay: DEFAULT_SETTLE_DELAY,
            corner_radius: DEFAULT_CORNER_RADIUS,
            tile_fade_in: DEFAULT_TILE_FADE_IN,
        }
    }
}

impl TimelineConfig {
    pub fn with_thumb_size(mut self, width: f64, height: f64) -> Self {
        self.thumb_width = width;
        self.thumb_height = height;
        self
    }

    pub fn with_sampling_interval(mut self, seconds: u32) -> Self {
        self.sampling_interval_secs = seconds;
        self
    }

    pub fn with_min_seek_interval(mut self, seconds: f64) -> Self {
        self.min_seek_interval = seconds;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Sampling interval in whole seconds, never below 1.
    pub fn sampling_interval(&self) -> u32 {
        self.sampling_interval_secs.max(1)
    }
}
