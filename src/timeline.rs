mod controller;
mod drag;
mod handle;
pub mod layout;
mod pipeline;
mod seek;
mod strip;

pub use controller::{TimelineController, TimelineEvent, TimelineInput, TimelinePhase};
pub use drag::{DragArbiter, DragEffect, DragState};
pub use handle::TimelineHandle;
pub use layout::{TimelineGeometry, TimelineLayout};
pub use pipeline::{BatchToken, ThumbnailPipeline, ThumbnailResult};
pub use seek::{SeekThrottle, SeekTicket};
pub use strip::{RoundedEdges, ThumbnailStrip, TilePlacement};
