//! Pull scheduling: tasks, their per-run accounting, and the scheduler.

use std::fmt;
use std::ops::{Add, AddAssign};
use std::sync::Arc;

use tracing::debug;

use crate::error::StageError;

/// Fixed per-packet framing charge, in bytes, added to throughput
/// accounting so `bits` approximates wire bits rather than payload bits.
pub const PKT_OVERHEAD: u64 = 24;

/// Default size of the scheduler's task table.
pub const DEFAULT_MAX_TASKS: usize = 1024;

/// Work done by one task run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskResult {
    /// Packets moved.
    pub packets: u64,
    /// Bits moved, including [`PKT_OVERHEAD`] per packet.
    pub bits: u64,
}

impl TaskResult {
    /// A run that did nothing.
    pub const fn idle() -> Self {
        Self {
            packets: 0,
            bits: 0,
        }
    }

    /// Accounting for `packets` packets carrying `total_bytes` of payload.
    ///
    /// ```
    /// use nexus_stage::TaskResult;
    ///
    /// let r = TaskResult::from_burst(3, 300);
    /// assert_eq!(r.bits, (300 + 3 * 24) * 8);
    /// ```
    pub const fn from_burst(packets: u64, total_bytes: u64) -> Self {
        Self {
            packets,
            bits: (total_bytes + packets * PKT_OVERHEAD) * 8,
        }
    }

    /// Returns `true` if no packets were moved.
    pub const fn is_idle(&self) -> bool {
        self.packets == 0
    }
}

impl Add for TaskResult {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            packets: self.packets + rhs.packets,
            bits: self.bits + rhs.bits,
        }
    }
}

impl AddAssign for TaskResult {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// A unit of work the scheduler runs on every round.
///
/// `run_task` must never block and must finish in bounded time.
pub trait Task: Send + Sync {
    /// Runs once and reports what was moved.
    fn run_task(&self) -> TaskResult;
}

/// Handle to a registered task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(usize);

impl TaskId {
    /// Returns the slot index of the task.
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Cooperative round-robin scheduler over a bounded task table.
pub struct Scheduler {
    tasks: Vec<Option<Arc<dyn Task>>>,
    max_tasks: usize,
    live: usize,
    rounds: u64,
    totals: TaskResult,
}

impl Scheduler {
    /// Creates a scheduler with room for [`DEFAULT_MAX_TASKS`] tasks.
    pub fn new() -> Self {
        Self::with_max_tasks(DEFAULT_MAX_TASKS)
    }

    /// Creates a scheduler with room for `max_tasks` tasks.
    pub const fn with_max_tasks(max_tasks: usize) -> Self {
        Self {
            tasks: Vec::new(),
            max_tasks,
            live: 0,
            rounds: 0,
            totals: TaskResult::idle(),
        }
    }

    /// Adds a task to the run list.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::ResourceExhausted`] if the task table is full.
    pub fn register(&mut self, task: Arc<dyn Task>) -> Result<TaskId, StageError> {
        let index = if let Some(free) = self.tasks.iter().position(Option::is_none) {
            self.tasks[free] = Some(task);
            free
        } else if self.tasks.len() < self.max_tasks {
            self.tasks.push(Some(task));
            self.tasks.len() - 1
        } else {
            return Err(StageError::ResourceExhausted(format!(
                "task creation failed: all {} task slots in use",
                self.max_tasks
            )));
        };

        self.live += 1;
        debug!(task = index, live = self.live, "task registered");
        Ok(TaskId(index))
    }

    /// Removes a task, returning it if it was registered.
    pub fn deregister(&mut self, id: TaskId) -> Option<Arc<dyn Task>> {
        let task = self.tasks.get_mut(id.0)?.take()?;
        self.live -= 1;
        debug!(task = id.0, live = self.live, "task deregistered");
        Some(task)
    }

    /// Returns the number of registered tasks.
    pub const fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if no task is registered.
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Runs every registered task once, in slot order.
    ///
    /// Returns the sum of this round's results, which is also added to
    /// [`totals`](Self::totals).
    pub fn run_once(&mut self) -> TaskResult {
        let round = self
            .tasks
            .iter()
            .flatten()
            .fold(TaskResult::idle(), |acc, task| acc + task.run_task());

        self.rounds += 1;
        self.totals += round;
        round
    }

    /// Returns the accumulated results of every round so far.
    pub const fn totals(&self) -> TaskResult {
        self.totals
    }

    /// Returns the number of rounds run.
    pub const fn rounds(&self) -> u64 {
        self.rounds
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.live)
            .field("max_tasks", &self.max_tasks)
            .field("rounds", &self.rounds)
            .field("totals", &self.totals)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(TaskResult);

    impl Task for Fixed {
        fn run_task(&self) -> TaskResult {
            self.0
        }
    }

    #[test]
    fn overhead_accounting() {
        assert_eq!(TaskResult::from_burst(0, 0), TaskResult::idle());
        assert_eq!(TaskResult::from_burst(3, 300).bits, 2976);
        assert!(TaskResult::idle().is_idle());
    }

    #[test]
    fn run_once_sums_tasks() {
        let mut sched = Scheduler::new();
        sched.register(Arc::new(Fixed(TaskResult::from_burst(1, 100)))).unwrap();
        sched.register(Arc::new(Fixed(TaskResult::from_burst(2, 0)))).unwrap();

        let round = sched.run_once();
        assert_eq!(round.packets, 3);
        assert_eq!(round.bits, (100 + 24) * 8 + (2 * 24) * 8);

        sched.run_once();
        assert_eq!(sched.totals().packets, 6);
        assert_eq!(sched.rounds(), 2);
    }

    #[test]
    fn full_table_is_resource_exhausted() {
        let mut sched = Scheduler::with_max_tasks(1);
        sched.register(Arc::new(Fixed(TaskResult::idle()))).unwrap();

        let err = sched
            .register(Arc::new(Fixed(TaskResult::idle())))
            .unwrap_err();
        assert!(err.is_resource_exhausted());
    }

    #[test]
    fn deregistered_slot_is_reused() {
        let mut sched = Scheduler::with_max_tasks(2);
        let a = sched.register(Arc::new(Fixed(TaskResult::idle()))).unwrap();
        sched.register(Arc::new(Fixed(TaskResult::idle()))).unwrap();

        assert!(sched.deregister(a).is_some());
        assert!(sched.deregister(a).is_none());
        assert_eq!(sched.len(), 1);

        let c = sched.register(Arc::new(Fixed(TaskResult::idle()))).unwrap();
        assert_eq!(c.index(), a.index());
        assert_eq!(sched.len(), 2);
    }
}
