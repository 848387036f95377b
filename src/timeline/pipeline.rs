use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::TimelineError;
use crate::video::clock::MediaSource;
use crate::video::thumbnail::{plan_requests, FrameGenerator, GeneratedFrame, ThumbnailImage};

/// One slot of the strip, delivered in increasing `index` order.
#[derive(Clone, Debug)]
pub struct ThumbnailResult {
    pub index: usize,
    pub count: usize,
    pub image: Option<Arc<ThumbnailImage>>,
}

/// Identifies a started batch. Cancelling it stops generation; results of a
/// cancelled batch are never delivered.
#[derive(Clone, Debug)]
pub struct BatchToken {
    id: u64,
    count: usize,
    cancel: CancellationToken,
}

impl BatchToken {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

struct ActiveBatch {
    token: BatchToken,
    results: mpsc::UnboundedReceiver<ThumbnailResult>,
}

/// Runs at most one thumbnail batch at a time.
///
/// The generator works on the blocking pool and may finish frames in any
/// order; a reorder task turns its output into a gap-free, strictly
/// increasing stream that [`ThumbnailPipeline::next_result`] hands out.
pub struct ThumbnailPipeline {
    generator: Arc<dyn FrameGenerator>,
    active: Option<ActiveBatch>,
    next_id: u64,
}

impl ThumbnailPipeline {
    pub fn new(generator: Arc<dyn FrameGenerator>) -> Self {
        Self {
            generator,
            active: None,
            next_id: 0,
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn start_batch(&mut self, source: MediaSource, interval_secs: u32) -> BatchToken {
        self.cancel();

        self.next_id += 1;
        let requests = plan_requests(source.duration, interval_secs);
        let token = BatchToken {
            id: self.next_id,
            count: requests.len(),
            cancel: CancellationToken::new(),
        };
        let (result_tx, results) = mpsc::unbounded_channel();

        debug!(
            batch = token.id,
            count = token.count,
            uri = %source.uri,
            "starting thumbnail batch"
        );

        if !requests.is_empty() {
            let (frame_tx, frame_rx) = mpsc::unbounded_channel();

            let generator = Arc::clone(&self.generator);
            let cancel = token.cancel.clone();
            let batch = token.id;
            tokio::task::spawn_blocking(move || {
                if let Err(err) = generator.generate(&source, &requests, &frame_tx, &cancel) {
                    let err = TimelineError::Generator(format!("{err:#}"));
                    warn!(batch, %err, "thumbnail batch ended early");
                }
            });

            tokio::spawn(reorder(
                ReorderBuffer::new(token.count),
                frame_rx,
                result_tx,
                token.cancel.clone(),
            ));
        }

        self.active = Some(ActiveBatch {
            token: token.clone(),
            results,
        });
        token
    }

    /// Next in-order result of the current batch. `None` once the batch is
    /// complete, cancelled, or when no batch was started.
    pub async fn next_result(&mut self) -> Option<ThumbnailResult> {
        let active = self.active.as_mut()?;
        let result = active.results.recv().await;
        if result.is_none() {
            self.active = None;
        }
        result
    }

    pub fn cancel(&mut self) {
        if let Some(active) = self.active.take() {
            if !active.token.is_cancelled() {
                debug!(batch = active.token.id, "cancelling thumbnail batch");
                active.token.cancel();
            }
        }
    }
}

impl Drop for ThumbnailPipeline {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn reorder(
    mut buffer: ReorderBuffer,
    mut frames: mpsc::UnboundedReceiver<GeneratedFrame>,
    results: mpsc::UnboundedSender<ThumbnailResult>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            frame = frames.recv() => frame,
        };

        let ready = match frame {
            Some(frame) => buffer.push(frame),
            None => break,
        };
        for result in ready {
            if cancel.is_cancelled() || results.send(result).is_err() {
                return;
            }
        }
        if buffer.is_complete() {
            return;
        }
    }

    for result in buffer.finish() {
        if cancel.is_cancelled() || results.send(result).is_err() {
            return;
        }
    }
}

/// Holds frames that arrived ahead of the next expected index.
struct ReorderBuffer {
    count: usize,
    next: usize,
    pending: BTreeMap<usize, Option<Arc<ThumbnailImage>>>,
}

impl ReorderBuffer {
    fn new(count: usize) -> Self {
        Self {
            count,
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    fn push(&mut self, frame: GeneratedFrame) -> Vec<ThumbnailResult> {
        let index = frame.index;
        if index >= self.count {
            warn!(index, count = self.count, "frame index out of range");
            return Vec::new();
        }
        if index < self.next || self.pending.contains_key(&index) {
            warn!(index, "duplicate frame rejected");
            return Vec::new();
        }
        if frame.image.is_none() {
            warn!(index, "thumbnail generation failed");
        }
        trace!(index, "frame generated");

        self.pending.insert(index, frame.image.map(Arc::new));

        let mut ready = Vec::new();
        while let Some(image) = self.pending.remove(&self.next) {
            ready.push(self.result(self.next, image));
            self.next += 1;
        }
        ready
    }

    /// Fills every slot the generator never produced with an empty result.
    fn finish(&mut self) -> Vec<ThumbnailResult> {
        let mut rest = Vec::new();
        while self.next < self.count {
            let image = self.pending.remove(&self.next).flatten();
            if image.is_none() {
                trace!(index = self.next, "frame missing from batch");
            }
            rest.push(self.result(self.next, image));
            self.next += 1;
        }
        rest
    }

    fn is_complete(&self) -> bool {
        self.next == self.count
    }

    fn result(&self, index: usize, image: Option<Arc<ThumbnailImage>>) -> ThumbnailResult {
        ThumbnailResult {
            index,
            count: self.count,
            image,
        }
    }
}
