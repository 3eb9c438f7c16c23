/// One sample of the simulated wind.
///
/// `direction_deg` follows the meteorological convention: the direction the
/// wind blows *from*, clockwise from north.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FlowFrame {
    pub direction_deg: f64,
    pub speed_ms: f64,
    pub index: usize,
}

impl FlowFrame {
    pub fn new(index: usize, direction_deg: f64, speed_ms: f64) -> Self {
        Self {
            direction_deg,
            speed_ms,
            index,
        }
    }

    /// Heading the air moves *toward*, radians clockwise from north.
    pub fn heading_rad(&self) -> f64 {
        (self.direction_deg + 180.0).rem_euclid(360.0).to_radians()
    }
}

/// Time-ordered wind frames plus the playback cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowSeries {
    frames: Vec<FlowFrame>,
    cursor: usize,
}

impl FlowSeries {
    pub fn new(frames: Vec<FlowFrame>) -> Self {
        Self { frames, cursor: 0 }
    }

    /// Builds frames from `(direction_deg, speed_ms)` pairs, indexing in order.
    pub fn from_samples(samples: impl IntoIterator<Item = (f64, f64)>) -> Self {
        Self::new(
            samples
                .into_iter()
                .enumerate()
                .map(|(i, (dir, speed))| FlowFrame::new(i, dir, speed))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[FlowFrame] {
        &self.frames
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&FlowFrame> {
        self.frames.get(self.cursor)
    }

    /// Moves the cursor one frame forward, wrapping at the end.
    pub fn advance(&mut self) {
        if !self.frames.is_empty() {
            self.cursor = (self.cursor + 1) % self.frames.len();
        }
    }

    /// Replaces the frames in place and rewinds the cursor.
    pub fn replace(&mut self, other: FlowSeries) {
        self.frames = other.frames;
        self.cursor = 0;
    }
}
