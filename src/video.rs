pub mod clock;
#[cfg(feature = "gstreamer")]
mod grabber;
#[cfg(feature = "gstreamer")]
mod player;
pub mod thumbnail;

pub use clock::{ClockChannels, MediaSource, PlaybackClock, PlayerStatus, SeekCompletion};
#[cfg(feature = "gstreamer")]
pub use grabber::GstFrameGenerator;
#[cfg(feature = "gstreamer")]
pub use player::GstPlayer;
pub use thumbnail::{FrameGenerator, GeneratedFrame, ThumbnailImage, ThumbnailRequest};
