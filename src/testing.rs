use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::video::clock::{
    ClockChannels, MediaSource, PlaybackClock, PlayerStatus, SeekCompletion,
};
use crate::video::thumbnail::{FrameGenerator, GeneratedFrame, ThumbnailImage, ThumbnailRequest};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum ClockCall {
    Play,
    Pause,
    Seek(f64),
}

/// In-memory clock driven by the test.
pub(crate) struct FakeClock {
    channels: ClockChannels,
    uri: Option<String>,
    duration: f64,
    calls: Mutex<Vec<ClockCall>>,
    completions: Mutex<Vec<SeekCompletion>>,
}

impl FakeClock {
    pub(crate) fn new(uri: &str, duration: f64) -> Self {
        Self {
            channels: ClockChannels::new(),
            uri: Some(uri.to_owned()),
            duration,
            calls: Mutex::new(Vec::new()),
            completions: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn without_uri(duration: f64) -> Self {
        Self {
            uri: None,
            ..Self::new("", duration)
        }
    }

    pub(crate) fn set_status(&self, status: PlayerStatus) {
        self.channels.publish_status(status);
    }

    pub(crate) fn set_time(&self, seconds: f64) {
        self.channels.publish_time(seconds);
    }

    pub(crate) fn calls(&self) -> Vec<ClockCall> {
        lock(&self.calls).clone()
    }

    pub(crate) fn seeks(&self) -> Vec<f64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ClockCall::Seek(time) => Some(time),
                _ => None,
            })
            .collect()
    }

    /// Completes every pending seek, oldest first.
    pub(crate) fn complete_seeks(&self, landed: bool) -> usize {
        let pending: Vec<_> = lock(&self.completions).drain(..).collect();
        let completed = pending.len();
        for done in pending {
            done(landed);
        }
        completed
    }

    fn record(&self, call: ClockCall) {
        lock(&self.calls).push(call);
    }
}

impl PlaybackClock for FakeClock {
    fn subscribe_status(&self) -> watch::Receiver<PlayerStatus> {
        self.channels.subscribe_status()
    }

    fn subscribe_time(&self) -> watch::Receiver<f64> {
        self.channels.subscribe_time()
    }

    fn duration(&self) -> Option<f64> {
        self.channels.status().is_ready().then_some(self.duration)
    }

    fn uri(&self) -> Option<String> {
        self.uri.clone()
    }

    fn play(&self) {
        self.record(ClockCall::Play);
        if self.channels.status().is_ready() {
            self.channels.publish_status(PlayerStatus::Playing);
        }
    }

    fn pause(&self) {
        self.record(ClockCall::Pause);
        if self.channels.status() == PlayerStatus::Playing {
            self.channels.publish_status(PlayerStatus::Paused);
        }
    }

    fn seek(&self, time: f64, on_complete: Option<SeekCompletion>) {
        self.record(ClockCall::Seek(time));
        if let Some(done) = on_complete {
            lock(&self.completions).push(done);
        }
    }
}

/// Generator that replays a fixed script instead of decoding anything.
#[derive(Default)]
pub(crate) struct ScriptedGenerator {
    order: Option<Vec<usize>>,
    failing: HashSet<usize>,
    batch_error: Option<String>,
    hold_first_after: Option<usize>,
    batches: AtomicUsize,
    sent: AtomicUsize,
    saw_cancel: AtomicBool,
    requested: Mutex<Vec<Vec<f64>>>,
}

impl ScriptedGenerator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Delivery order by index; may repeat or exceed the request range.
    pub(crate) fn with_order(mut self, order: Vec<usize>) -> Self {
        self.order = Some(order);
        self
    }

    pub(crate) fn with_failing(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.failing = indices.into_iter().collect();
        self
    }

    pub(crate) fn with_batch_error(mut self, message: &str) -> Self {
        self.batch_error = Some(message.to_owned());
        self
    }

    /// The first batch sends `frames` frames, then blocks until cancelled.
    pub(crate) fn hold_first_batch_after(mut self, frames: usize) -> Self {
        self.hold_first_after = Some(frames);
        self
    }

    pub(crate) fn saw_cancel(&self) -> bool {
        self.saw_cancel.load(Ordering::Acquire)
    }

    /// Frames handed to the pipeline so far, across all batches.
    pub(crate) fn sent_frames(&self) -> usize {
        self.sent.load(Ordering::Acquire)
    }

    pub(crate) fn requested_times(&self) -> Vec<Vec<f64>> {
        lock(&self.requested).clone()
    }

    fn wait_for_cancel(&self, cancel: &CancellationToken) {
        while !cancel.is_cancelled() {
            std::thread::sleep(Duration::from_millis(1));
        }
        self.saw_cancel.store(true, Ordering::Release);
    }
}

impl FrameGenerator for ScriptedGenerator {
    fn generate(
        &self,
        _source: &MediaSource,
        requests: &[ThumbnailRequest],
        frames: &mpsc::UnboundedSender<GeneratedFrame>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        lock(&self.requested).push(requests.iter().map(|r| r.requested_time).collect());
        let batch = self.batches.fetch_add(1, Ordering::AcqRel);

        let order = self
            .order
            .clone()
            .unwrap_or_else(|| requests.iter().map(|r| r.index).collect());

        for (sent, index) in order.into_iter().enumerate() {
            if batch == 0 && self.hold_first_after == Some(sent) {
                self.wait_for_cancel(cancel);
                return Ok(());
            }
            if cancel.is_cancelled() {
                self.saw_cancel.store(true, Ordering::Release);
                return Ok(());
            }

            let image = (!self.failing.contains(&index)).then(|| ThumbnailImage::new(4, 3));
            if frames.send(GeneratedFrame { index, image }).is_err() {
                return Ok(());
            }
            self.sent.fetch_add(1, Ordering::AcqRel);
        }

        if batch == 0 && self.hold_first_after.is_some() {
            self.wait_for_cancel(cancel);
        }

        match &self.batch_error {
            Some(message) => Err(anyhow::anyhow!(message.clone())),
            None => Ok(()),
        }
    }
}
