use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::video::clock::SeekCompletion;

/// A seek the throttle decided to issue.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeekTicket {
    pub time: f64,
    pub serial: u64,
}

/// Drops drag seeks that land too close, in playback time, to the last one.
///
/// The threshold is measured in content seconds rather than wall-clock time.
/// Issued seeks are fire-and-forget; each carries a serial so completions of
/// superseded seeks can be recognised and ignored.
#[derive(Debug)]
pub struct SeekThrottle {
    min_interval: f64,
    last_seek_time: Option<f64>,
    serial: u64,
    latest: Arc<AtomicU64>,
}

impl SeekThrottle {
    pub fn new(min_interval: f64) -> Self {
        Self {
            min_interval: min_interval.max(0.0),
            last_seek_time: None,
            serial: 0,
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn last_seek_time(&self) -> Option<f64> {
        self.last_seek_time
    }

    /// Called when a new drag gesture begins.
    pub fn reset(&mut self) {
        self.last_seek_time = None;
    }

    pub fn offer(&mut self, time: f64) -> Option<SeekTicket> {
        if let Some(last) = self.last_seek_time {
            if (time - last).abs() < self.min_interval {
                trace!(time, last, "seek throttled");
                return None;
            }
        }
        self.last_seek_time = Some(time);
        Some(self.next_ticket(time))
    }

    /// Issues a seek regardless of the threshold, without touching drag state.
    pub fn force(&mut self, time: f64) -> SeekTicket {
        self.next_ticket(time)
    }

    pub fn completion(&self, ticket: SeekTicket) -> SeekCompletion {
        let latest = Arc::clone(&self.latest);
        Box::new(move |landed| {
            if latest.load(Ordering::Acquire) != ticket.serial {
                trace!(serial = ticket.serial, landed, "stale seek completion ignored");
                return;
            }
            trace!(serial = ticket.serial, time = ticket.time, landed, "seek completed");
        })
    }

    pub fn is_latest(&self, ticket: SeekTicket) -> bool {
        self.latest.load(Ordering::Acquire) == ticket.serial
    }

    fn next_ticket(&mut self, time: f64) -> SeekTicket {
        self.serial += 1;
        self.latest.store(self.serial, Ordering::Release);
        SeekTicket {
            time,
            serial: self.serial,
        }
    }
}
