use std::time::Duration;

use crate::config::TimelineConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundedEdges {
    None,
    Leading,
    Trailing,
    Both,
}

/// Where and how a host should draw one thumbnail tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TilePlacement {
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rounded: RoundedEdges,
    pub corner_radius: f64,
    /// `None` for empty tiles, which appear without animation.
    pub fade_in: Option<Duration>,
}

/// Placement policy for the strip; knows nothing about how images are drawn.
#[derive(Clone, Copy, Debug)]
pub struct ThumbnailStrip {
    thumb_width: f64,
    thumb_height: f64,
    corner_radius: f64,
    fade_in: Duration,
}

impl ThumbnailStrip {
    pub fn new(config: &TimelineConfig) -> Self {
        Self {
            thumb_width: config.thumb_width,
            thumb_height: config.thumb_height,
            corner_radius: config.corner_radius,
            fade_in: config.tile_fade_in,
        }
    }

    pub fn tile(&self, index: usize, count: usize, has_image: bool) -> TilePlacement {
        let is_first = index == 0;
        let is_last = index + 1 == count;

        let rounded = match (is_first, is_last) {
            (true, true) => RoundedEdges::Both,
            (true, false) => RoundedEdges::Leading,
            (false, true) => RoundedEdges::Trailing,
            (false, false) => RoundedEdges::None,
        };

        TilePlacement {
            index,
            x: index as f64 * self.thumb_width,
            y: 0.0,
            width: self.thumb_width,
            height: self.thumb_height,
            rounded,
            corner_radius: if rounded == RoundedEdges::None {
                0.0
            } else {
                self.corner_radius
            },
            fade_in: has_image.then_some(self.fade_in),
        }
    }
}
