use foundation::time::Time;

/// Longest frame delta handed to jobs; larger gaps (background tabs) are clamped.
pub const MAX_FRAME_DT_S: f64 = 0.1;

/// Per-display-frame metadata.
///
/// Frames are stamped with the host's frame timestamp. The index is 0-based and
/// increments by one per display frame, independent of how much time elapsed.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Seconds since the previous frame, clamped to [`MAX_FRAME_DT_S`].
    pub dt_s: f64,
    /// Host time at the start of the frame.
    pub time: Time,
}

impl Frame {
    pub fn first(time: Time) -> Self {
        Self {
            index: 0,
            dt_s: 0.0,
            time,
        }
    }

    pub fn next(self, time: Time) -> Self {
        Self {
            index: self.index + 1,
            dt_s: time.since(self.time).min(MAX_FRAME_DT_S),
            time,
        }
    }
}
