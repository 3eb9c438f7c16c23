use foundation::time::Time;
use tracing::debug;

use crate::frame::Frame;
use crate::job::Job;

/// Single per-display-frame driver.
///
/// Every registered job runs exactly once per frame in `(priority, id,
/// insertion_order)` order. Once stopped, the scheduler never runs again; the
/// host must stop requesting frames when [`Scheduler::is_running`] is false.
pub struct Scheduler<C> {
    next_order: u64,
    jobs: Vec<(u64, Job<C>)>,
    sorted: bool,
    running: bool,
    last_frame: Option<Frame>,
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Scheduler<C> {
    pub fn new() -> Self {
        Self {
            next_order: 0,
            jobs: Vec::new(),
            sorted: true,
            running: true,
            last_frame: None,
        }
    }

    pub fn add_job(&mut self, job: Job<C>) {
        let order = self.next_order;
        self.next_order = self.next_order.wrapping_add(1);
        self.jobs.push((order, job));
        self.sorted = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.last_frame
    }

    /// Stops the loop. Pending work is not run.
    pub fn stop(&mut self) {
        if self.running {
            let frames = self.last_frame.map_or(0, |f| f.index + 1);
            debug!("scheduler stopped after {frames} frames");
        }
        self.running = false;
    }

    /// Runs every job for the display frame starting at `now`.
    ///
    /// Returns the frame that was run, or `None` when the scheduler is stopped.
    pub fn run_frame(&mut self, ctx: &mut C, now: Time) -> Option<Frame> {
        if !self.running {
            return None;
        }

        if !self.sorted {
            // Total ordering: (priority, id, insertion_order). This stays deterministic even if
            // callers accidentally register duplicate job ids.
            self.jobs.sort_by(|(oa, a), (ob, b)| {
                a.priority
                    .cmp(&b.priority)
                    .then_with(|| a.id.cmp(b.id))
                    .then_with(|| oa.cmp(ob))
            });
            self.sorted = true;
        }

        let frame = match self.last_frame {
            Some(prev) => prev.next(now),
            None => Frame::first(now),
        };
        self.last_frame = Some(frame);

        for (_order, job) in &self.jobs {
            (job.run)(ctx, frame);
        }
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::Scheduler;
    use crate::frame::Frame;
    use crate::job::Job;
    use foundation::time::Time;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Trace {
        log: Vec<(&'static str, u64)>,
    }

    fn job_a(ctx: &mut Trace, frame: Frame) {
        ctx.log.push(("a", frame.index));
    }

    fn job_b(ctx: &mut Trace, frame: Frame) {
        ctx.log.push(("b", frame.index));
    }

    #[test]
    fn runs_jobs_in_stable_id_order() {
        let mut sched = Scheduler::new();
        sched.add_job(Job::new("b", job_b));
        sched.add_job(Job::new("a", job_a));

        let mut trace = Trace::default();
        sched.run_frame(&mut trace, Time(0.0));
        sched.run_frame(&mut trace, Time(0.016));
        assert_eq!(trace.log, vec![("a", 0), ("b", 0), ("a", 1), ("b", 1)]);
    }

    #[test]
    fn runs_higher_priority_first() {
        let mut sched = Scheduler::new();
        sched.add_job(Job::with_priority("a", 10, job_a));
        sched.add_job(Job::with_priority("b", -1, job_b));

        let mut trace = Trace::default();
        sched.run_frame(&mut trace, Time(0.0));
        assert_eq!(trace.log, vec![("b", 0), ("a", 0)]);
    }

    #[test]
    fn stopped_scheduler_runs_nothing() {
        let mut sched = Scheduler::new();
        sched.add_job(Job::new("a", job_a));
        let mut trace = Trace::default();
        assert!(sched.run_frame(&mut trace, Time(0.0)).is_some());
        sched.stop();
        assert!(sched.run_frame(&mut trace, Time(1.0)).is_none());
        assert!(!sched.is_running());
        assert_eq!(trace.log.len(), 1);
    }
}
