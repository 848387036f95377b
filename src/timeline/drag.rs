use tracing::debug;

use crate::video::clock::PlayerStatus;

/// Who is moving the scroll offset right now.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    UserDragging,
    AutoScrolling,
}

/// Side effect the owner must carry out after a transition.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragEffect {
    PausePlayback,
}

/// Decides whether scroll offset changes should drive seeks.
///
/// Only offsets seen while the user is dragging are fed back into seeking.
/// While autoscrolling the offsets are the result of clock updates, and
/// seeking on them would oscillate.
#[derive(Debug, Default)]
pub struct DragArbiter {
    state: DragState,
}

impl DragArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    /// A drag gesture started. Preempts autoscroll; playback must pause.
    pub fn drag_began(&mut self) -> DragEffect {
        if self.state == DragState::AutoScrolling {
            self.transition(DragState::Idle);
        }
        self.transition(DragState::UserDragging);
        DragEffect::PausePlayback
    }

    pub fn drag_ended(&mut self) {
        if self.state == DragState::UserDragging {
            self.transition(DragState::Idle);
        }
    }

    /// Playback starting hands the scroll offset to the clock. Nothing else is issued.
    pub fn status_changed(&mut self, status: PlayerStatus) {
        if status == PlayerStatus::Playing && self.state != DragState::AutoScrolling {
            self.transition(DragState::AutoScrolling);
        }
    }

    pub fn forwards_scroll(&self) -> bool {
        self.state == DragState::UserDragging
    }

    fn transition(&mut self, next: DragState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "drag state");
            self.state = next;
        }
    }
}
