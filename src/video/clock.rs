use tokio::sync::watch;
use tracing::trace;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlayerStatus {
    #[default]
    Initial,
    Loading,
    Failed,
    ReadyToPlay,
    Playing,
    Paused,
    Finished,
}

impl PlayerStatus {
    /// Duration and seeking are only meaningful once the source has prerolled.
    pub fn is_ready(self) -> bool {
        matches!(
            self,
            PlayerStatus::ReadyToPlay
                | PlayerStatus::Playing
                | PlayerStatus::Paused
                | PlayerStatus::Finished
        )
    }
}

/// A fixed-length media source the timeline samples thumbnails from.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaSource {
    pub uri: String,
    /// Length in seconds.
    pub duration: f64,
}

impl MediaSource {
    pub fn new(uri: impl Into<String>, duration: f64) -> Self {
        Self {
            uri: uri.into(),
            duration,
        }
    }
}

/// Called once with whether the seek landed.
pub type SeekCompletion = Box<dyn FnOnce(bool) + Send + 'static>;

/// The playback engine as seen by the timeline.
///
/// Status and time are observable through `watch` receivers, so a new
/// subscriber always starts from the latest value. `play` and `pause` are
/// no-ops when already in that state. A `seek` issued while another is
/// pending supersedes it; the superseded completion may still be called.
pub trait PlaybackClock: Send + Sync {
    fn subscribe_status(&self) -> watch::Receiver<PlayerStatus>;

    /// Playback time in seconds, updated at least 10 times a second while playing.
    fn subscribe_time(&self) -> watch::Receiver<f64>;

    /// Length in seconds. `None` until the status is at least `ReadyToPlay`.
    fn duration(&self) -> Option<f64>;

    fn uri(&self) -> Option<String>;

    fn play(&self);

    fn pause(&self);

    fn seek(&self, time: f64, on_complete: Option<SeekCompletion>);

    fn status(&self) -> PlayerStatus {
        *self.subscribe_status().borrow()
    }

    fn current_time(&self) -> f64 {
        *self.subscribe_time().borrow()
    }

    fn source(&self) -> Option<MediaSource> {
        Some(MediaSource::new(self.uri()?, self.duration()?))
    }
}

/// The writing half of a clock's observables.
///
/// Clock implementations own one of these and publish through it; readers
/// subscribe for receivers.
#[derive(Debug)]
pub struct ClockChannels {
    status: watch::Sender<PlayerStatus>,
    time: watch::Sender<f64>,
}

impl Default for ClockChannels {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockChannels {
    pub fn new() -> Self {
        let (status, _) = watch::channel(PlayerStatus::Initial);
        let (time, _) = watch::channel(0.0);
        Self { status, time }
    }

    pub fn status(&self) -> PlayerStatus {
        *self.status.borrow()
    }

    pub fn time(&self) -> f64 {
        *self.time.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<PlayerStatus> {
        self.status.subscribe()
    }

    pub fn subscribe_time(&self) -> watch::Receiver<f64> {
        self.time.subscribe()
    }

    /// Returns false when the status was already current.
    pub fn publish_status(&self, status: PlayerStatus) -> bool {
        self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            trace!(from = ?*current, to = ?status, "player status");
            *current = status;
            true
        })
    }

    /// A failed clock stops reporting time.
    pub fn publish_time(&self, seconds: f64) {
        if self.status() == PlayerStatus::Failed {
            return;
        }
        self.time.send_replace(seconds.max(0.0));
    }
}
