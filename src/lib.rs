//! Scrubbable video timeline: a thumbnail strip kept in two-way sync with a
//! playback clock.
//!
//! A host spawns a [`TimelineHandle`] over a [`PlaybackClock`] and a
//! [`FrameGenerator`], feeds it scroll gestures and renders the
//! [`TimelineEvent`]s it gets back.

pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod timeline;
pub mod video;

#[cfg(test)]
mod testing;

pub use config::TimelineConfig;
pub use error::TimelineError;
pub use timeline::{
    TimelineEvent, TimelineGeometry, TimelineHandle, TimelineInput, TimelinePhase, TilePlacement,
};
pub use video::{FrameGenerator, MediaSource, PlaybackClock, PlayerStatus};
