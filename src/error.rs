use thiserror::Error;

/// Reasons a timeline degrades to a static, non-interactive strip.
///
/// None of these are fatal to the host; they are reported once through
/// [`TimelineEvent::Unusable`](crate::TimelineEvent::Unusable).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TimelineError {
    #[error("media source could not be opened")]
    SourceUnavailable,

    #[error("player is ready but exposes no source uri or duration")]
    MissingSource,

    #[error("media source is too short to sample any thumbnails")]
    EmptySource,

    #[error("thumbnail generator failed: {0}")]
    Generator(String),
}
