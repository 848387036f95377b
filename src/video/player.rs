use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use gst::prelude::{ElementExt, ElementExtManual, GstObjectExt};
use gst::{ClockTime, MessageView, SeekFlags, State};
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::video::clock::{ClockChannels, PlaybackClock, PlayerStatus, SeekCompletion};

const BUS_POLL: Duration = Duration::from_millis(100);
const POSITION_POLL: Duration = Duration::from_millis(50);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn to_seconds(time: ClockTime) -> f64 {
    time.nseconds() as f64 / 1_000_000_000.0
}

/// A `playbin` exposed as a [`PlaybackClock`].
///
/// Bus messages and position polling run on two helper threads that hold
/// only weak references, so dropping the player tears the pipeline down.
#[derive(Clone)]
pub struct GstPlayer {
    inner: Arc<Inner>,
}

struct Inner {
    pipeline: gst::Element,
    uri: String,
    channels: ClockChannels,
    duration: Mutex<Option<f64>>,
    pending_seek: Mutex<Option<SeekCompletion>>,
    prerolled: AtomicBool,
}

impl GstPlayer {
    /// Opens `uri` and starts prerolling it, paused.
    pub fn new(uri: &str) -> anyhow::Result<Self> {
        gst::init()?;

        let pipeline = gst::ElementFactory::make("playbin")
            .property("uri", uri)
            .build()
            .context("could not create playbin")?;
        let bus = pipeline.bus().context("playbin without a bus")?;

        let inner = Arc::new(Inner {
            pipeline,
            uri: uri.to_owned(),
            channels: ClockChannels::new(),
            duration: Mutex::new(None),
            pending_seek: Mutex::new(None),
            prerolled: AtomicBool::new(false),
        });

        inner.channels.publish_status(PlayerStatus::Loading);
        if let Err(err) = inner.pipeline.set_state(State::Paused) {
            error!(uri, %err, "could not open media source");
            inner.channels.publish_status(PlayerStatus::Failed);
        }

        let weak = Arc::downgrade(&inner);
        thread::spawn(move || watch_bus(bus, weak));
        let weak = Arc::downgrade(&inner);
        thread::spawn(move || poll_position(weak));

        Ok(Self { inner })
    }
}

fn watch_bus(bus: gst::Bus, inner: Weak<Inner>) {
    loop {
        let message = bus.timed_pop(ClockTime::from_nseconds(BUS_POLL.as_nanos() as u64));
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if let Some(message) = message {
            inner.handle_message(&message);
        }
        if inner.channels.status() == PlayerStatus::Failed {
            break;
        }
    }
    debug!("player bus watch stopped");
}

fn poll_position(inner: Weak<Inner>) {
    loop {
        thread::sleep(POSITION_POLL);
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match inner.channels.status() {
            PlayerStatus::Playing => inner.publish_position(),
            PlayerStatus::Failed => break,
            _ => {}
        }
    }
}

impl Inner {
    fn handle_message(&self, message: &gst::Message) {
        match message.view() {
            MessageView::AsyncDone(..) => {
                if !self.prerolled.swap(true, Ordering::AcqRel) {
                    let duration = self.pipeline.query_duration::<ClockTime>().map(to_seconds);
                    debug!(uri = %self.uri, ?duration, "media prerolled");
                    *lock(&self.duration) = duration;
                    self.channels.publish_status(PlayerStatus::ReadyToPlay);
                } else {
                    self.complete_pending_seek(true);
                    if self.channels.status() == PlayerStatus::Finished {
                        self.channels.publish_status(PlayerStatus::Paused);
                    }
                }
                self.publish_position();
            }
            MessageView::StateChanged(changed) => {
                let from_pipeline = changed
                    .src()
                    .is_some_and(|src| src.name() == self.pipeline.name());
                if !from_pipeline || !self.prerolled.load(Ordering::Acquire) {
                    return;
                }
                match changed.current() {
                    State::Playing => {
                        self.channels.publish_status(PlayerStatus::Playing);
                    }
                    State::Paused if self.channels.status() != PlayerStatus::Finished => {
                        self.channels.publish_status(PlayerStatus::Paused);
                    }
                    _ => {}
                }
            }
            MessageView::Eos(..) => {
                self.publish_position();
                self.channels.publish_status(PlayerStatus::Finished);
                if let Err(err) = self.pipeline.set_state(State::Paused) {
                    warn!(%err, "could not park pipeline after end of stream");
                }
            }
            MessageView::Error(err) => {
                error!(
                    uri = %self.uri,
                    error = %err.error(),
                    debug = ?err.debug(),
                    "playback failed"
                );
                self.channels.publish_status(PlayerStatus::Failed);
                self.complete_pending_seek(false);
            }
            _ => {}
        }
    }

    /// The guard is released before the callback runs, so it may seek again.
    fn complete_pending_seek(&self, landed: bool) {
        let done = lock(&self.pending_seek).take();
        if let Some(done) = done {
            done(landed);
        }
    }

    fn publish_position(&self) {
        if let Some(position) = self.pipeline.query_position::<ClockTime>() {
            self.channels.publish_time(to_seconds(position));
        }
    }
}

impl GstPlayer {
    fn request_state(&self, target: State) {
        let inner = &self.inner;
        if !inner.prerolled.load(Ordering::Acquire)
            || inner.channels.status() == PlayerStatus::Failed
        {
            return;
        }

        let (_, current, pending) = inner.pipeline.state(ClockTime::ZERO);
        if !needs_transition(current, pending, target) {
            return;
        }
        if let Err(err) = inner.pipeline.set_state(target) {
            warn!(?target, %err, "could not change playback state");
        }
    }
}

/// A transition already under way counts as done; the published status
/// lags behind the pipeline until the bus reports it.
fn needs_transition(current: State, pending: State, target: State) -> bool {
    let heading_to = if pending == State::VoidPending {
        current
    } else {
        pending
    };
    heading_to != target
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Err(err) = self.pipeline.set_state(State::Null) {
            warn!(%err, "could not stop player pipeline");
        }
    }
}

impl PlaybackClock for GstPlayer {
    fn subscribe_status(&self) -> watch::Receiver<PlayerStatus> {
        self.inner.channels.subscribe_status()
    }

    fn subscribe_time(&self) -> watch::Receiver<f64> {
        self.inner.channels.subscribe_time()
    }

    fn duration(&self) -> Option<f64> {
        if !self.inner.channels.status().is_ready() {
            return None;
        }
        *lock(&self.inner.duration)
    }

    fn uri(&self) -> Option<String> {
        Some(self.inner.uri.clone())
    }

    fn play(&self) {
        self.request_state(State::Playing);
    }

    fn pause(&self) {
        self.request_state(State::Paused);
    }

    fn seek(&self, time: f64, on_complete: Option<SeekCompletion>) {
        if !self.inner.prerolled.load(Ordering::Acquire)
            || self.inner.channels.status() == PlayerStatus::Failed
        {
            if let Some(done) = on_complete {
                done(false);
            }
            return;
        }

        let superseded = std::mem::replace(&mut *lock(&self.inner.pending_seek), on_complete);
        if let Some(done) = superseded {
            done(false);
        }

        let target = ClockTime::from_nseconds((time.max(0.0) * 1_000_000_000.0) as u64);
        if let Err(err) = self
            .inner
            .pipeline
            .seek_simple(SeekFlags::FLUSH | SeekFlags::ACCURATE, target)
        {
            warn!(time, %err, "seek rejected");
            self.inner.complete_pending_seek(false);
        }
    }
}
