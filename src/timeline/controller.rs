use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::Sleep;
use tracing::{debug, error, trace, warn};

use crate::config::TimelineConfig;
use crate::error::TimelineError;
use crate::format::{playback_label, ZERO_LABEL};
use crate::timeline::drag::{DragArbiter, DragEffect};
use crate::timeline::layout::{TimelineGeometry, TimelineLayout};
use crate::timeline::pipeline::{ThumbnailPipeline, ThumbnailResult};
use crate::timeline::seek::{SeekThrottle, SeekTicket};
use crate::timeline::strip::{ThumbnailStrip, TilePlacement};
use crate::video::clock::{PlaybackClock, PlayerStatus};
use crate::video::thumbnail::{FrameGenerator, ThumbnailImage};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimelinePhase {
    #[default]
    Uninitialized,
    ThumbnailsLoading,
    Ready,
    /// Terminal; the strip stays static.
    Unusable,
}

/// Host UI events.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimelineInput {
    DragBegan,
    /// The scroll surface's horizontal content offset changed.
    Scrolled(f64),
    DragEnded,
    ViewportResized(f64),
    Play,
    Pause,
    Shutdown,
}

/// Notifications for the host UI.
#[derive(Clone, Debug)]
pub enum TimelineEvent {
    GeometryChanged(TimelineGeometry),
    FrameReady {
        index: usize,
        total: usize,
        image: Option<Arc<ThumbnailImage>>,
        tile: TilePlacement,
    },
    /// Fired once, after the last thumbnail was placed.
    Ready,
    ScrollTo {
        offset: f64,
        animated: bool,
    },
    TimeLabel(String),
    /// Fired once; the timeline goes quiet afterwards.
    Unusable(TimelineError),
}

async fn settle_elapsed(settle: &mut Option<Pin<Box<Sleep>>>) {
    match settle {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

/// Owns all timeline state and is its only writer.
///
/// Host input, clock updates, thumbnail results and the settle timer are
/// all handled on the task running [`TimelineController::run`], one at a
/// time.
pub struct TimelineController {
    config: TimelineConfig,
    clock: Arc<dyn PlaybackClock>,
    pipeline: ThumbnailPipeline,
    layout: TimelineLayout,
    strip: ThumbnailStrip,
    arbiter: DragArbiter,
    throttle: SeekThrottle,
    phase: TimelinePhase,
    status_rx: watch::Receiver<PlayerStatus>,
    time_rx: watch::Receiver<f64>,
    inputs: mpsc::UnboundedReceiver<TimelineInput>,
    events: mpsc::UnboundedSender<TimelineEvent>,
    settle: Option<Pin<Box<Sleep>>>,
    last_label: String,
}

impl TimelineController {
    pub fn new(
        clock: Arc<dyn PlaybackClock>,
        generator: Arc<dyn FrameGenerator>,
        config: TimelineConfig,
        viewport_width: f64,
        inputs: mpsc::UnboundedReceiver<TimelineInput>,
        events: mpsc::UnboundedSender<TimelineEvent>,
    ) -> Self {
        Self {
            status_rx: clock.subscribe_status(),
            time_rx: clock.subscribe_time(),
            clock,
            pipeline: ThumbnailPipeline::new(generator),
            layout: TimelineLayout::new(viewport_width, config.thumb_width, config.thumb_height),
            strip: ThumbnailStrip::new(&config),
            arbiter: DragArbiter::new(),
            throttle: SeekThrottle::new(config.min_seek_interval),
            phase: TimelinePhase::Uninitialized,
            inputs,
            events,
            settle: None,
            last_label: ZERO_LABEL.to_owned(),
            config,
        }
    }

    pub async fn run(mut self) {
        let status = *self.status_rx.borrow_and_update();
        self.on_status(status);

        loop {
            let ready = self.phase == TimelinePhase::Ready;

            tokio::select! {
                input = self.inputs.recv() => match input {
                    Some(TimelineInput::Shutdown) | None => break,
                    Some(input) => self.on_input(input),
                },
                Ok(()) = self.status_rx.changed() => {
                    let status = *self.status_rx.borrow_and_update();
                    self.on_status(status);
                }
                Ok(()) = self.time_rx.changed(), if ready => {
                    let time = *self.time_rx.borrow_and_update();
                    self.on_time(time);
                }
                Some(result) = self.pipeline.next_result() => self.on_thumbnail(result),
                _ = settle_elapsed(&mut self.settle) => {
                    self.settle = None;
                    self.rewind_to_start();
                }
            }
        }

        self.pipeline.cancel();
        debug!(phase = ?self.phase, "timeline stopped");
    }

    fn on_input(&mut self, input: TimelineInput) {
        match input {
            TimelineInput::DragBegan => {
                self.throttle.reset();
                if self.arbiter.drag_began() == DragEffect::PausePlayback {
                    self.clock.pause();
                }
            }
            TimelineInput::Scrolled(offset) => self.on_scrolled(offset),
            TimelineInput::DragEnded => self.arbiter.drag_ended(),
            TimelineInput::ViewportResized(width) => self.on_resized(width),
            TimelineInput::Play => self.clock.play(),
            TimelineInput::Pause => self.clock.pause(),
            TimelineInput::Shutdown => {}
        }
    }

    fn on_scrolled(&mut self, offset: f64) {
        if self.phase != TimelinePhase::Ready || !self.arbiter.forwards_scroll() {
            return;
        }

        let time = self.layout.offset_to_time(offset);
        if let Some(ticket) = self.throttle.offer(time) {
            self.seek(ticket);
        }
    }

    fn on_resized(&mut self, width: f64) {
        self.layout = self.layout.with_viewport_width(width);

        match self.phase {
            TimelinePhase::ThumbnailsLoading => {
                self.emit(TimelineEvent::GeometryChanged(self.layout.geometry()));
            }
            TimelinePhase::Ready => {
                self.emit(TimelineEvent::GeometryChanged(self.layout.geometry()));
                if !self.arbiter.forwards_scroll() {
                    let offset = self.layout.time_to_offset(*self.time_rx.borrow());
                    self.emit(TimelineEvent::ScrollTo {
                        offset,
                        animated: false,
                    });
                }
            }
            TimelinePhase::Uninitialized | TimelinePhase::Unusable => {}
        }
    }

    fn on_status(&mut self, status: PlayerStatus) {
        self.arbiter.status_changed(status);

        match (self.phase, status) {
            (TimelinePhase::Unusable, _) => {}
            (_, PlayerStatus::Failed) => self.make_unusable(TimelineError::SourceUnavailable),
            (TimelinePhase::Uninitialized, status) if status.is_ready() => self.start_loading(),
            (TimelinePhase::Ready, PlayerStatus::Finished) => self.arm_settle(),
            _ => {}
        }
    }

    fn on_time(&mut self, time: f64) {
        let label = playback_label(time);
        if label != self.last_label {
            self.last_label = label.clone();
            self.emit(TimelineEvent::TimeLabel(label));
        }

        if *self.status_rx.borrow() == PlayerStatus::Playing && !self.arbiter.forwards_scroll() {
            self.emit(TimelineEvent::ScrollTo {
                offset: self.layout.time_to_offset(time),
                animated: true,
            });
        }
    }

    fn on_thumbnail(&mut self, result: ThumbnailResult) {
        if self.phase != TimelinePhase::ThumbnailsLoading {
            trace!(index = result.index, "thumbnail outside loading phase dropped");
            return;
        }

        let ThumbnailResult {
            index,
            count,
            image,
        } = result;
        let tile = self.strip.tile(index, count, image.is_some());
        self.emit(TimelineEvent::FrameReady {
            index,
            total: count,
            image,
            tile,
        });

        if index + 1 == count {
            self.mark_ready();
        }
    }

    fn start_loading(&mut self) {
        let Some(source) = self.clock.source() else {
            self.make_unusable(TimelineError::MissingSource);
            return;
        };

        let duration = source.duration;
        let token = self
            .pipeline
            .start_batch(source, self.config.sampling_interval());
        if token.count() == 0 {
            self.make_unusable(TimelineError::EmptySource);
            return;
        }

        self.layout = self.layout.with_thumbs(token.count(), duration);
        self.set_phase(TimelinePhase::ThumbnailsLoading);
        self.emit(TimelineEvent::GeometryChanged(self.layout.geometry()));
    }

    fn mark_ready(&mut self) {
        self.set_phase(TimelinePhase::Ready);
        self.emit(TimelineEvent::Ready);

        let time = *self.time_rx.borrow_and_update();
        self.on_time(time);

        if *self.status_rx.borrow() == PlayerStatus::Finished {
            self.arm_settle();
        }
    }

    fn make_unusable(&mut self, err: TimelineError) {
        match err {
            TimelineError::SourceUnavailable => error!(%err, "timeline unusable"),
            _ => warn!(%err, "timeline unusable"),
        }

        self.pipeline.cancel();
        self.settle = None;
        self.set_phase(TimelinePhase::Unusable);
        self.emit(TimelineEvent::Unusable(err));
    }

    fn arm_settle(&mut self) {
        if self.settle.is_none() {
            trace!(delay = ?self.config.settle_delay, "playback finished");
            self.settle = Some(Box::pin(tokio::time::sleep(self.config.settle_delay)));
        }
    }

    fn rewind_to_start(&mut self) {
        let ticket = self.throttle.force(0.0);
        self.seek(ticket);
        self.emit(TimelineEvent::ScrollTo {
            offset: self.layout.start_offset(),
            animated: true,
        });
    }

    fn seek(&self, ticket: SeekTicket) {
        trace!(time = ticket.time, serial = ticket.serial, "seek");
        self.clock
            .seek(ticket.time, Some(self.throttle.completion(ticket)));
    }

    fn set_phase(&mut self, phase: TimelinePhase) {
        if self.phase != phase {
            debug!(from = ?self.phase, to = ?phase, "timeline phase");
            self.phase = phase;
        }
    }

    fn emit(&self, event: TimelineEvent) {
        if self.events.send(event).is_err() {
            trace!("timeline event dropped, host is gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use approx::assert_relative_eq;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::testing::{ClockCall, FakeClock, ScriptedGenerator};
    use crate::timeline::handle::TimelineHandle;
    use crate::timeline::strip::RoundedEdges;

    struct Harness {
        clock: Arc<FakeClock>,
        generator: Arc<ScriptedGenerator>,
        handle: TimelineHandle,
        events: mpsc::UnboundedReceiver<TimelineEvent>,
        task: JoinHandle<()>,
    }

    impl Harness {
        fn start(clock: FakeClock, generator: ScriptedGenerator) -> Self {
            let clock = Arc::new(clock);
            let generator = Arc::new(generator);
            let (handle, events, task) = TimelineHandle::spawn(
                clock.clone(),
                generator.clone(),
                TimelineConfig::default(),
                300.0,
            );
            Self {
                clock,
                generator,
                handle,
                events,
                task,
            }
        }

        async fn next(&mut self) -> TimelineEvent {
            tokio::time::timeout(Duration::from_secs(5), self.events.recv())
                .await
                .expect("timed out waiting for a timeline event")
                .expect("timeline event channel closed")
        }

        async fn wait_for(&mut self, matches: impl Fn(&TimelineEvent) -> bool) -> TimelineEvent {
            loop {
                let event = self.next().await;
                if matches(&event) {
                    return event;
                }
            }
        }

        async fn ready(&mut self) {
            self.wait_for(|e| matches!(e, TimelineEvent::Ready)).await;
        }

        /// Round trip through the controller so every earlier input is handled.
        async fn sync(&mut self) {
            self.handle.viewport_resized(300.0);
            self.wait_for(|e| matches!(e, TimelineEvent::GeometryChanged(_)))
                .await;
        }
    }

    fn hundred_seconds() -> FakeClock {
        let clock = FakeClock::new("file:///clip.mp4", 100.0);
        clock.set_status(PlayerStatus::ReadyToPlay);
        clock
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition never became true");
    }

    #[tokio::test]
    async fn loads_thumbnails_in_order_then_ready() {
        let generator = ScriptedGenerator::new().with_order((0..20).rev().collect());
        let mut h = Harness::start(hundred_seconds(), generator);

        let TimelineEvent::GeometryChanged(geometry) = h.next().await else {
            panic!("geometry must be announced first");
        };
        assert_eq!(geometry.scroll_padding, 150.0);
        assert_eq!(geometry.right_padding, 150.0);
        assert_eq!(geometry.total_scroll_width, 1920.0);
        assert_eq!(geometry.start_offset, -150.0);
        assert_eq!(geometry.content_height, 72.0);

        for expected in 0..20 {
            match h.next().await {
                TimelineEvent::FrameReady {
                    index,
                    total,
                    image,
                    tile,
                } => {
                    assert_eq!(index, expected);
                    assert_eq!(total, 20);
                    assert!(image.is_some());
                    assert_eq!(tile.x, expected as f64 * 96.0);
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert!(matches!(h.next().await, TimelineEvent::Ready));

        let requested = h.generator.requested_times();
        assert_eq!(requested.len(), 1);
        assert_eq!(requested[0].first(), Some(&0.0));
        assert_eq!(requested[0].last(), Some(&95.0));
    }

    #[tokio::test]
    async fn failed_frame_is_placed_without_image() {
        let clock = FakeClock::new("file:///clip.mp4", 10.0);
        clock.set_status(PlayerStatus::Paused);
        let mut h = Harness::start(clock, ScriptedGenerator::new().with_failing([0]));

        let first = h
            .wait_for(|e| matches!(e, TimelineEvent::FrameReady { .. }))
            .await;
        let TimelineEvent::FrameReady {
            index, image, tile, ..
        } = first
        else {
            unreachable!();
        };
        assert_eq!(index, 0);
        assert!(image.is_none());
        assert_eq!(tile.rounded, RoundedEdges::Leading);
        assert_eq!(tile.fade_in, None);

        h.ready().await;
    }

    #[tokio::test]
    async fn drag_seeks_are_throttled() {
        let mut h = Harness::start(hundred_seconds(), ScriptedGenerator::new());
        h.ready().await;

        h.handle.drag_began();
        h.handle.scrolled(810.0);
        h.handle.scrolled(811.0);
        h.handle.scrolled(900.0);
        h.handle.drag_ended();
        h.handle.scrolled(100.0);
        h.sync().await;

        let calls = h.clock.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], ClockCall::Pause);

        let seeks = h.clock.seeks();
        assert_relative_eq!(seeks[0], 50.0);
        assert_relative_eq!(seeks[1], 1050.0 / 1920.0 * 100.0);

        // both completions arrive late and out of date for the first one
        assert_eq!(h.clock.complete_seeks(true), 2);
    }

    #[tokio::test]
    async fn new_drag_resets_the_throttle() {
        let mut h = Harness::start(hundred_seconds(), ScriptedGenerator::new());
        h.ready().await;

        h.handle.drag_began();
        h.handle.scrolled(810.0);
        h.handle.drag_ended();
        h.handle.drag_began();
        h.handle.scrolled(811.0);
        h.sync().await;

        assert_eq!(h.clock.seeks().len(), 2);
    }

    #[tokio::test]
    async fn scrolling_is_ignored_while_loading() {
        let generator = ScriptedGenerator::new().hold_first_batch_after(3);
        let mut h = Harness::start(hundred_seconds(), generator);

        h.wait_for(|e| matches!(e, TimelineEvent::FrameReady { index: 2, .. }))
            .await;
        h.handle.drag_began();
        h.handle.scrolled(810.0);
        h.handle.drag_ended();
        h.sync().await;

        assert_eq!(h.clock.calls(), vec![ClockCall::Pause]);

        h.handle.shutdown();
        h.task.await.unwrap();
        let generator = h.generator.clone();
        wait_until(|| generator.saw_cancel()).await;
    }

    #[tokio::test]
    async fn playback_drives_the_scroll_offset() {
        let mut h = Harness::start(hundred_seconds(), ScriptedGenerator::new());
        h.ready().await;

        h.handle.play();
        h.sync().await;
        h.clock.set_time(50.0);

        let label = h
            .wait_for(|e| matches!(e, TimelineEvent::TimeLabel(_)))
            .await;
        assert!(matches!(label, TimelineEvent::TimeLabel(ref text) if text == "00:50"));
        match h.next().await {
            TimelineEvent::ScrollTo { offset, animated } => {
                assert_relative_eq!(offset, 810.0);
                assert!(animated);
            }
            other => panic!("unexpected event {other:?}"),
        }

        // offsets echoed back by the host while autoscrolling never seek
        h.handle.scrolled(810.0);
        h.sync().await;
        assert!(h.clock.seeks().is_empty());

        h.handle.drag_began();
        h.sync().await;
        assert_eq!(h.clock.calls(), vec![ClockCall::Play, ClockCall::Pause]);
        assert_eq!(h.clock.status(), PlayerStatus::Paused);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_playback_rewinds_after_settle_delay() {
        let mut h = Harness::start(hundred_seconds(), ScriptedGenerator::new());
        h.ready().await;

        h.clock.set_time(100.0);
        let finished_at = tokio::time::Instant::now();
        h.clock.set_status(PlayerStatus::Finished);

        let rewind = h
            .wait_for(|e| matches!(e, TimelineEvent::ScrollTo { animated: true, .. }))
            .await;
        assert!(finished_at.elapsed() >= Duration::from_millis(500));
        let TimelineEvent::ScrollTo { offset, .. } = rewind else {
            unreachable!();
        };
        assert_eq!(offset, -150.0);
        assert_eq!(h.clock.seeks(), vec![0.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn clock_finished_before_ready_rewinds_after_settle_delay() {
        let clock = FakeClock::new("file:///clip.mp4", 100.0);
        clock.set_time(100.0);
        clock.set_status(PlayerStatus::Finished);
        let started = tokio::time::Instant::now();
        let mut h = Harness::start(clock, ScriptedGenerator::new());
        h.ready().await;
        assert!(h.clock.seeks().is_empty());

        let rewind = h
            .wait_for(|e| matches!(e, TimelineEvent::ScrollTo { .. }))
            .await;
        assert!(started.elapsed() >= Duration::from_millis(500));
        let TimelineEvent::ScrollTo { offset, animated } = rewind else {
            unreachable!();
        };
        assert_eq!(offset, -150.0);
        assert!(animated);
        assert_eq!(h.clock.seeks(), vec![0.0]);
    }

    #[tokio::test]
    async fn time_label_changes_once_per_whole_second() {
        let clock = Arc::new(hundred_seconds());
        let (_inputs, input_rx) = mpsc::unbounded_channel();
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let mut controller = TimelineController::new(
            clock,
            Arc::new(ScriptedGenerator::new()),
            TimelineConfig::default(),
            300.0,
            input_rx,
            events_tx,
        );

        for time in [10.1, 10.5, 10.9, 11.0] {
            controller.on_time(time);
        }
        drop(controller);

        let mut labels = Vec::new();
        while let Some(event) = events.recv().await {
            if let TimelineEvent::TimeLabel(label) = event {
                labels.push(label);
            }
        }
        assert_eq!(labels, ["00:10", "00:11"]);
    }

    #[tokio::test]
    async fn resize_reanchors_the_playhead() {
        let mut h = Harness::start(hundred_seconds(), ScriptedGenerator::new());
        h.ready().await;

        h.clock.set_time(25.0);
        h.wait_for(|e| matches!(e, TimelineEvent::TimeLabel(_))).await;
        h.handle.viewport_resized(400.0);

        let TimelineEvent::GeometryChanged(geometry) = h.next().await else {
            panic!("resize must announce geometry");
        };
        assert_eq!(geometry.scroll_padding, 200.0);
        match h.next().await {
            TimelineEvent::ScrollTo { offset, animated } => {
                assert_relative_eq!(offset, 280.0);
                assert!(!animated);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn loading_waits_for_a_ready_clock() {
        let clock = FakeClock::new("file:///clip.mp4", 12.0);
        clock.set_status(PlayerStatus::Loading);
        let mut h = Harness::start(clock, ScriptedGenerator::new());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.events.try_recv().is_err());

        h.clock.set_status(PlayerStatus::ReadyToPlay);
        let TimelineEvent::GeometryChanged(geometry) = h.next().await else {
            panic!("expected geometry once the clock is ready");
        };
        assert_eq!(geometry.total_scroll_width, 288.0);
        h.ready().await;
    }

    #[tokio::test]
    async fn failed_source_is_unusable() {
        let clock = FakeClock::new("file:///missing.mp4", 100.0);
        clock.set_status(PlayerStatus::Failed);
        let mut h = Harness::start(clock, ScriptedGenerator::new());

        assert!(matches!(
            h.next().await,
            TimelineEvent::Unusable(TimelineError::SourceUnavailable)
        ));
        assert!(h.generator.requested_times().is_empty());
    }

    #[tokio::test]
    async fn source_without_uri_is_unusable() {
        let clock = FakeClock::without_uri(100.0);
        clock.set_status(PlayerStatus::ReadyToPlay);
        let mut h = Harness::start(clock, ScriptedGenerator::new());

        assert!(matches!(
            h.next().await,
            TimelineEvent::Unusable(TimelineError::MissingSource)
        ));
    }

    #[tokio::test]
    async fn zero_length_source_is_unusable() {
        let clock = FakeClock::new("file:///empty.mp4", 0.0);
        clock.set_status(PlayerStatus::ReadyToPlay);
        let mut h = Harness::start(clock, ScriptedGenerator::new());

        assert!(matches!(
            h.next().await,
            TimelineEvent::Unusable(TimelineError::EmptySource)
        ));
    }

    #[tokio::test]
    async fn failure_after_ready_is_reported_once() {
        let mut h = Harness::start(hundred_seconds(), ScriptedGenerator::new());
        h.ready().await;

        h.clock.set_status(PlayerStatus::Failed);
        h.wait_for(|e| matches!(e, TimelineEvent::Unusable(_))).await;

        h.handle.drag_began();
        h.handle.scrolled(810.0);
        h.handle.shutdown();
        h.task.await.unwrap();

        assert!(h.clock.seeks().is_empty());
        assert!(h.events.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropping_every_handle_stops_the_controller() {
        let mut h = Harness::start(hundred_seconds(), ScriptedGenerator::new());
        h.ready().await;

        let Harness { handle, task, .. } = h;
        assert!(handle.is_running());
        drop(handle);

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("controller kept running")
            .unwrap();
    }
}
