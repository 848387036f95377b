/// Scroll geometry of the thumbnail strip and the offset <-> time mapping.
///
/// The playhead sits in the middle of the viewport, so the strip is inset by
/// half the viewport on the left; an offset of `-scroll_padding` puts time 0
/// under the playhead.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimelineLayout {
    viewport_width: f64,
    thumb_count: usize,
    thumb_width: f64,
    thumb_height: f64,
    duration: f64,
}

/// What a host scroll surface needs to size its content.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimelineGeometry {
    pub scroll_padding: f64,
    pub right_padding: f64,
    pub total_scroll_width: f64,
    pub content_height: f64,
    pub start_offset: f64,
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

impl TimelineLayout {
    pub fn new(viewport_width: f64, thumb_width: f64, thumb_height: f64) -> Self {
        Self {
            viewport_width: sanitize(viewport_width),
            thumb_count: 0,
            thumb_width: sanitize(thumb_width),
            thumb_height: sanitize(thumb_height),
            duration: 0.0,
        }
    }

    pub fn with_viewport_width(mut self, width: f64) -> Self {
        self.viewport_width = sanitize(width);
        self
    }

    pub fn with_thumbs(mut self, count: usize, duration: f64) -> Self {
        self.thumb_count = count;
        self.duration = sanitize(duration);
        self
    }

    pub fn viewport_width(&self) -> f64 {
        self.viewport_width
    }

    pub fn thumb_count(&self) -> usize {
        self.thumb_count
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn scroll_padding(&self) -> f64 {
        self.viewport_width / 2.0
    }

    pub fn total_scroll_width(&self) -> f64 {
        self.thumb_count as f64 * self.thumb_width
    }

    pub fn right_padding(&self) -> f64 {
        if self.total_scroll_width() <= self.scroll_padding() {
            0.0
        } else {
            self.scroll_padding()
        }
    }

    /// Offset that puts time 0 under the playhead.
    pub fn start_offset(&self) -> f64 {
        -self.scroll_padding()
    }

    pub fn time_to_offset(&self, time: f64) -> f64 {
        let width = self.total_scroll_width();
        if self.duration <= 0.0 || width <= 0.0 || !time.is_finite() {
            return self.start_offset();
        }
        self.start_offset() + time * (width / self.duration)
    }

    pub fn offset_to_time(&self, offset: f64) -> f64 {
        let width = self.total_scroll_width();
        if self.duration <= 0.0 || width <= 0.0 || !offset.is_finite() {
            return 0.0;
        }
        let playhead = (offset + self.scroll_padding()).clamp(0.0, width);
        playhead / width * self.duration
    }

    pub fn geometry(&self) -> TimelineGeometry {
        TimelineGeometry {
            scroll_padding: self.scroll_padding(),
            right_padding: self.right_padding(),
            total_scroll_width: self.total_scroll_width(),
            content_height: self.thumb_height,
            start_offset: self.start_offset(),
        }
    }
}
