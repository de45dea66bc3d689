//! Cooperative task scheduler.
//!
//! One thread, one loop. Every unit of work in the process is a [`Task`]:
//! the listener is one, every live connection is one. Each tick the
//! scheduler walks the live tasks once, in insertion order, and gives each
//! a bounded `run` slot. Tasks suspend only by returning; a task that
//! cannot make progress (a read or write came back `WouldBlock`) simply
//! returns unchanged and is revisited on the next tick.
//!
//! There are no priorities, no preemption, and no cross-thread handoffs.
//! A task leaves the loop by calling [`Scheduler::remove_current`] from
//! inside its own `run`.

use crate::{errors::SchedulerError, limits::SchedLimits};
use std::panic::{self, AssertUnwindSafe};
use std::thread;

/// A cooperatively scheduled unit of work.
///
/// `run` is invoked at most once per tick and must be bounded and
/// non-blocking; anything that might stall goes through non-blocking I/O
/// and yields by returning. The task's state is exclusively owned by its
/// box; the scheduler only ever touches it through these hooks.
pub trait Task {
    /// One bounded step of work.
    ///
    /// The scheduler handle allows registering new tasks and
    /// self-removal. A panic escaping `run` removes the task (cleanup
    /// still runs) but leaves the scheduler alive.
    fn run(&mut self, sched: &mut Scheduler);

    /// Invoked exactly once when the task is added, before it becomes
    /// runnable.
    fn attached(&mut self, _sched: &mut Scheduler) {}

    /// Invoked exactly once when the task is removed, before it is
    /// dropped. Also runs for tasks still live when the scheduler itself
    /// is dropped.
    fn cleanup(&mut self, _sched: &mut Scheduler) {}
}

/// Single-threaded cooperative scheduler over a bounded task set.
///
/// # Examples
/// ```
/// use weathervane::{Scheduler, Task};
/// use weathervane::limits::SchedLimits;
///
/// struct Countdown(u32);
///
/// impl Task for Countdown {
///     fn run(&mut self, sched: &mut Scheduler) {
///         self.0 -= 1;
///         if self.0 == 0 {
///             sched.remove_current().unwrap();
///         }
///     }
/// }
///
/// let mut sched = Scheduler::new(&SchedLimits::default());
/// sched.add(Box::new(Countdown(3))).unwrap();
/// sched.run(); // returns once the task set drains
/// ```
pub struct Scheduler {
    slots: Vec<Option<Box<dyn Task>>>,
    live: usize,
    max_tasks: usize,
    tick_backoff: Option<std::time::Duration>,

    // Index of the task currently inside `run`, and whether it asked to go.
    current: Option<usize>,
    unseat_current: bool,
}

impl Scheduler {
    pub fn new(limits: &SchedLimits) -> Self {
        Self {
            slots: Vec::with_capacity(limits.max_tasks.min(1024)),
            live: 0,
            max_tasks: limits.max_tasks,
            tick_backoff: limits.tick_backoff,
            current: None,
            unseat_current: false,
        }
    }

    /// Number of live tasks.
    #[inline(always)]
    pub fn task_count(&self) -> usize {
        self.live
    }

    /// Registers a task.
    ///
    /// Invokes the task's `attached` hook immediately; the first `run`
    /// happens on the next tick boundary (a task added from inside a tick
    /// does not run within that tick). Fails with
    /// [`SchedulerError::CapacityExceeded`] at the configured limit, in
    /// which case no hook is invoked and the task is handed back through
    /// the error path by being dropped by the caller.
    pub fn add(&mut self, mut task: Box<dyn Task>) -> Result<(), SchedulerError> {
        if self.live >= self.max_tasks {
            return Err(SchedulerError::CapacityExceeded);
        }

        task.attached(self);
        self.slots.push(Some(task));
        self.live += 1;
        Ok(())
    }

    /// Marks the currently running task for removal.
    ///
    /// Only callable from inside a task's `run`; after that `run` returns,
    /// the scheduler invokes the task's `cleanup` and drops it. The
    /// removal leaves every other task's position in the current tick
    /// untouched.
    pub fn remove_current(&mut self) -> Result<(), SchedulerError> {
        match self.current {
            Some(_) => {
                self.unseat_current = true;
                Ok(())
            }
            None => Err(SchedulerError::InvalidOperation),
        }
    }

    /// One pass over the live task set, in insertion order.
    ///
    /// Returns the live count afterwards. Exposed separately from
    /// [`run`](Scheduler::run) so callers (and tests) can drive the loop
    /// themselves.
    pub fn tick(&mut self) -> usize {
        // Snapshot: slots pushed during this pass start on the next one.
        let end = self.slots.len();

        for index in 0..end {
            let Some(mut task) = self.slots[index].take() else {
                continue;
            };

            self.current = Some(index);
            self.unseat_current = false;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.run(self)));
            self.current = None;

            if outcome.is_err() {
                log::error!("task #{} panicked; removing it", index);
                self.unseat_current = true;
            }

            if self.unseat_current {
                task.cleanup(self);
                self.live -= 1;
            } else {
                self.slots[index] = Some(task);
            }
        }

        // Compact vacated slots only between ticks, never mid-pass.
        self.slots.retain(Option::is_some);
        self.live
    }

    /// Runs ticks until the task set drains, pausing `tick_backoff`
    /// between passes.
    pub fn run(&mut self) {
        while self.tick() != 0 {
            if let Some(pause) = self.tick_backoff {
                thread::sleep(pause);
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let slots = std::mem::take(&mut self.slots);
        for slot in slots {
            if let Some(mut task) = slot {
                task.cleanup(self);
            }
        }
        self.live = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Journal = Rc<RefCell<Vec<String>>>;

    /// Runs `ticks_left` times, then removes itself.
    struct Recorder {
        name: &'static str,
        ticks_left: u32,
        journal: Journal,
    }

    impl Recorder {
        fn boxed(name: &'static str, ticks_left: u32, journal: &Journal) -> Box<dyn Task> {
            Box::new(Recorder {
                name,
                ticks_left,
                journal: journal.clone(),
            })
        }

        fn log(&self, event: &str) {
            self.journal.borrow_mut().push(format!("{}:{}", self.name, event));
        }
    }

    impl Task for Recorder {
        fn run(&mut self, sched: &mut Scheduler) {
            self.log("run");
            self.ticks_left -= 1;
            if self.ticks_left == 0 {
                sched.remove_current().unwrap();
            }
        }

        fn attached(&mut self, _: &mut Scheduler) {
            self.log("attached");
        }

        fn cleanup(&mut self, _: &mut Scheduler) {
            self.log("cleanup");
        }
    }

    fn limits(max_tasks: usize) -> SchedLimits {
        SchedLimits {
            max_tasks,
            tick_backoff: None,
            ..SchedLimits::default()
        }
    }

    #[test]
    fn insertion_order_per_tick() {
        let journal: Journal = Default::default();
        let mut sched = Scheduler::new(&limits(8));

        sched.add(Recorder::boxed("a", 2, &journal)).unwrap();
        sched.add(Recorder::boxed("b", 2, &journal)).unwrap();
        sched.add(Recorder::boxed("c", 2, &journal)).unwrap();
        sched.run();

        assert_eq!(
            *journal.borrow(),
            [
                "a:attached", "b:attached", "c:attached",
                "a:run", "b:run", "c:run",
                "a:run", "a:cleanup", "b:run", "b:cleanup", "c:run", "c:cleanup",
            ]
        );
    }

    #[test]
    fn self_removal_cleans_up_exactly_once() {
        let journal: Journal = Default::default();
        let mut sched = Scheduler::new(&limits(8));

        sched.add(Recorder::boxed("solo", 1, &journal)).unwrap();
        assert_eq!(sched.tick(), 0);
        assert_eq!(sched.tick(), 0);

        let events = journal.borrow();
        assert_eq!(events.iter().filter(|e| e.ends_with(":cleanup")).count(), 1);
        assert_eq!(events.iter().filter(|e| e.ends_with(":run")).count(), 1);
    }

    #[test]
    fn removal_does_not_shift_later_tasks_in_tick() {
        let journal: Journal = Default::default();
        let mut sched = Scheduler::new(&limits(8));

        sched.add(Recorder::boxed("first", 1, &journal)).unwrap();
        sched.add(Recorder::boxed("second", 1, &journal)).unwrap();
        sched.add(Recorder::boxed("third", 1, &journal)).unwrap();
        sched.tick();

        // All three ran in the tick where the first removed itself.
        let runs: Vec<_> = journal
            .borrow()
            .iter()
            .filter(|e| e.ends_with(":run"))
            .cloned()
            .collect();
        assert_eq!(runs, ["first:run", "second:run", "third:run"]);
    }

    #[test]
    fn capacity_rejects_without_hooks() {
        let journal: Journal = Default::default();
        let mut sched = Scheduler::new(&limits(2));

        sched.add(Recorder::boxed("a", 1, &journal)).unwrap();
        sched.add(Recorder::boxed("b", 1, &journal)).unwrap();
        assert_eq!(
            sched.add(Recorder::boxed("c", 1, &journal)).unwrap_err(),
            SchedulerError::CapacityExceeded
        );

        // The rejected task saw no hook at all.
        assert!(!journal.borrow().iter().any(|e| e.starts_with("c:")));
    }

    #[test]
    fn capacity_frees_up_after_removal() {
        let journal: Journal = Default::default();
        let mut sched = Scheduler::new(&limits(1));

        sched.add(Recorder::boxed("a", 1, &journal)).unwrap();
        sched.tick();
        sched.add(Recorder::boxed("b", 1, &journal)).unwrap();
        sched.run();

        assert_eq!(
            journal.borrow().iter().filter(|e| e.ends_with(":run")).count(),
            2
        );
    }

    /// Adds a child task on its first run, then removes itself.
    struct Spawner {
        journal: Journal,
    }

    impl Task for Spawner {
        fn run(&mut self, sched: &mut Scheduler) {
            self.journal.borrow_mut().push("spawner:run".into());
            sched
                .add(Recorder::boxed("child", 1, &self.journal))
                .unwrap();
            sched.remove_current().unwrap();
        }
    }

    #[test]
    fn task_added_mid_tick_runs_next_tick() {
        let journal: Journal = Default::default();
        let mut sched = Scheduler::new(&limits(8));

        sched.add(Box::new(Spawner {
            journal: journal.clone(),
        })).unwrap();

        assert_eq!(sched.tick(), 1);
        assert!(!journal.borrow().iter().any(|e| e == &"child:run"));

        assert_eq!(sched.tick(), 0);
        assert!(journal.borrow().iter().any(|e| e == &"child:run"));
    }

    #[test]
    fn remove_current_outside_run_is_invalid() {
        let mut sched = Scheduler::new(&limits(2));
        assert_eq!(
            sched.remove_current().unwrap_err(),
            SchedulerError::InvalidOperation
        );
    }

    struct Panicker {
        journal: Journal,
    }

    impl Task for Panicker {
        fn run(&mut self, _: &mut Scheduler) {
            panic!("boom");
        }

        fn cleanup(&mut self, _: &mut Scheduler) {
            self.journal.borrow_mut().push("panicker:cleanup".into());
        }
    }

    #[test]
    fn panicking_task_is_removed_not_fatal() {
        let journal: Journal = Default::default();
        let mut sched = Scheduler::new(&limits(8));

        sched.add(Box::new(Panicker {
            journal: journal.clone(),
        })).unwrap();
        sched.add(Recorder::boxed("survivor", 2, &journal)).unwrap();

        sched.run();

        let events = journal.borrow();
        assert!(events.iter().any(|e| e == "panicker:cleanup"));
        assert_eq!(events.iter().filter(|e| *e == "survivor:run").count(), 2);
    }

    #[test]
    fn drop_cleans_live_tasks() {
        let journal: Journal = Default::default();
        {
            let mut sched = Scheduler::new(&limits(8));
            sched.add(Recorder::boxed("a", 100, &journal)).unwrap();
            sched.add(Recorder::boxed("b", 100, &journal)).unwrap();
            sched.tick();
        }

        let cleanups = journal
            .borrow()
            .iter()
            .filter(|e| e.ends_with(":cleanup"))
            .count();
        assert_eq!(cleanups, 2);
    }
}
