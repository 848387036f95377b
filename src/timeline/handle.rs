use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::TimelineConfig;
use crate::timeline::controller::{TimelineController, TimelineEvent, TimelineInput};
use crate::video::clock::PlaybackClock;
use crate::video::thumbnail::FrameGenerator;

/// Cheap, cloneable front for a running timeline.
///
/// The controller stops once [`TimelineHandle::shutdown`] is called or the
/// last handle is dropped.
#[derive(Clone, Debug)]
pub struct TimelineHandle {
    inputs: mpsc::UnboundedSender<TimelineInput>,
}

impl TimelineHandle {
    /// Spawns a controller on the current tokio runtime.
    pub fn spawn(
        clock: Arc<dyn PlaybackClock>,
        generator: Arc<dyn FrameGenerator>,
        config: TimelineConfig,
        viewport_width: f64,
    ) -> (Self, mpsc::UnboundedReceiver<TimelineEvent>, JoinHandle<()>) {
        let (inputs, input_rx) = mpsc::unbounded_channel();
        let (event_tx, events) = mpsc::unbounded_channel();

        let controller =
            TimelineController::new(clock, generator, config, viewport_width, input_rx, event_tx);
        let task = tokio::spawn(controller.run());

        (Self { inputs }, events, task)
    }

    pub fn drag_began(&self) -> bool {
        self.send(TimelineInput::DragBegan)
    }

    pub fn scrolled(&self, offset: f64) -> bool {
        self.send(TimelineInput::Scrolled(offset))
    }

    pub fn drag_ended(&self) -> bool {
        self.send(TimelineInput::DragEnded)
    }

    pub fn viewport_resized(&self, width: f64) -> bool {
        self.send(TimelineInput::ViewportResized(width))
    }

    pub fn play(&self) -> bool {
        self.send(TimelineInput::Play)
    }

    pub fn pause(&self) -> bool {
        self.send(TimelineInput::Pause)
    }

    pub fn shutdown(&self) -> bool {
        self.send(TimelineInput::Shutdown)
    }

    /// Returns false once the controller has stopped.
    pub fn send(&self, input: TimelineInput) -> bool {
        self.inputs.send(input).is_ok()
    }

    pub fn is_running(&self) -> bool {
        !self.inputs.is_closed()
    }
}
