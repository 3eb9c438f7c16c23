use crate::frame::Frame;

/// A unit of per-frame work executed by the [`Scheduler`](crate::Scheduler).
///
/// Jobs are run in a stable order based on their `(priority, id)`.
pub struct Job<C> {
    pub id: &'static str,
    /// Smaller values run earlier.
    pub priority: i32,
    pub run: fn(ctx: &mut C, frame: Frame),
}

impl<C> Job<C> {
    pub fn new(id: &'static str, run: fn(ctx: &mut C, frame: Frame)) -> Self {
        Self {
            id,
            priority: 0,
            run,
        }
    }

    pub fn with_priority(id: &'static str, priority: i32, run: fn(ctx: &mut C, frame: Frame)) -> Self {
        Self { id, priority, run }
    }
}
