use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::video::clock::MediaSource;

pub type ThumbnailImage = image::RgbImage;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThumbnailRequest {
    pub index: usize,
    /// Seconds into the source.
    pub requested_time: f64,
}

/// A frame as produced by a generator, in whatever order it finished.
#[derive(Clone, Debug)]
pub struct GeneratedFrame {
    pub index: usize,
    pub image: Option<ThumbnailImage>,
}

/// Decodes still frames for a batch of requests.
///
/// `generate` blocks the calling thread. It sends one frame per request on
/// `frames`, in any order, and returns early once `cancel` fires or the
/// receiver is gone. A frame that cannot be decoded is sent with no image.
pub trait FrameGenerator: Send + Sync + 'static {
    fn generate(
        &self,
        source: &MediaSource,
        requests: &[ThumbnailRequest],
        frames: &mpsc::UnboundedSender<GeneratedFrame>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()>;
}

/// One request every `interval_secs` from 0, `ceil(duration / interval)` in total.
pub fn plan_requests(duration: f64, interval_secs: u32) -> Vec<ThumbnailRequest> {
    let interval = interval_secs.max(1);
    if !duration.is_finite() || duration <= 0.0 {
        return Vec::new();
    }

    let count = (duration / interval as f64).ceil() as usize;
    (0..count)
        .map(|index| ThumbnailRequest {
            index,
            requested_time: (index as u64 * interval as u64) as f64,
        })
        .collect()
}
