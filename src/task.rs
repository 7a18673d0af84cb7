//! # Task Control Block
//!
//! The central per-task data structure (spec.md §3). TCBs live in a fixed
//! array owned by `Scheduler` — no heap allocation for the table itself,
//! only for each task's stack (see `pstack`).

use core::alloc::Layout;

use crate::config::NAME_LEN;
use crate::context::Context;

/// Sentinel id meaning "no task" / "free slot".
pub const NONE_ID: usize = usize::MAX;

/// Execution state of a task (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Unused slot.
    Idle,
    /// Runnable, sitting in a class queue.
    Ready,
    /// Currently executing on the CPU.
    Running,
    /// Awaiting an external event (not used by the core itself; reserved
    /// for external collaborators such as messaging primitives).
    Blocked,
    /// Sleeping a known number of ticks (`delay > 0`), in the delay queue.
    Delayed,
}

/// Task entry point. Never returns — returning from `ptask` is treated by
/// the dispatcher as task termination (spec.md §4.2's contract).
pub type TaskEntry = extern "C" fn() -> !;

/// Aperiodic job body. Aperiodic jobs are never context-switched (spec.md
/// §9's Open Question is resolved as "the server remains the scheduling
/// entity" — see `server.rs`), so a job is a plain function the server
/// calls in-line, once per poll, and is handed exactly the number of ticks
/// of budget it has been granted this call. Completion is tracked by the
/// server itself via `TaskControlBlock::capacity_rem` (how much of the
/// job's declared capacity is still outstanding), not by the job's return
/// value — a job cannot know how much of the *server's* fuel it was
/// charged, only the server does. This is this crate's resolution of
/// spec.md §9's under-specified "partial run" semantics — see DESIGN.md.
pub type AperiodicJob = extern "C" fn(budget_ticks: u32);

/// Task Control Block (one per slot in the fixed-size TCB table).
pub struct TaskControlBlock {
    /// Slot index in the TCB table, or `NONE_ID` when unused.
    pub id: usize,
    name: [u8; NAME_LEN],
    name_len: u8,
    pub state: TaskState,

    pub priority: u8,
    pub priority_rem: u8,

    pub delay: u32,

    /// Real-time parameters, in ticks. `period == 0` means best-effort.
    pub period: u32,
    pub capacity: u32,
    pub deadline: u32,

    pub capacity_rem: u32,
    pub deadline_rem: u32,
    /// Countdown to the next job release; wraps to `period` on release.
    pub period_rem: u32,

    pub rtjobs: u32,
    pub bgjobs: u32,
    pub deadline_misses: u32,

    pub ptask: Option<TaskEntry>,
    /// Set instead of `ptask` for aperiodic jobs spawned via
    /// `kernel::spawn_aperiodic`.
    pub ajob: Option<AperiodicJob>,

    /// Owned stack allocation. `null` for an `Idle` slot.
    pub pstack: *mut u8,
    pub stack_size: usize,

    pub context: Context,

    /// Policy-specific scratch. The polling server stores its remaining
    /// aperiodic-execution fuel here for the current release.
    pub other_data: u32,
}

unsafe impl Send for TaskControlBlock {}
unsafe impl Sync for TaskControlBlock {}

impl TaskControlBlock {
    /// An empty, `Idle` TCB used to populate the fixed-size table.
    pub const EMPTY: TaskControlBlock = TaskControlBlock {
        id: NONE_ID,
        name: [0; NAME_LEN],
        name_len: 0,
        state: TaskState::Idle,
        priority: 0,
        priority_rem: 0,
        delay: 0,
        period: 0,
        capacity: 0,
        deadline: 0,
        capacity_rem: 0,
        deadline_rem: 0,
        period_rem: 0,
        rtjobs: 0,
        bgjobs: 0,
        deadline_misses: 0,
        ptask: None,
        ajob: None,
        pstack: core::ptr::null_mut(),
        stack_size: 0,
        context: Context::new(),
        other_data: 0,
    };

    /// Whether this slot represents a real-time task.
    #[inline]
    pub fn is_realtime(&self) -> bool {
        self.period > 0
    }

    /// Human-readable name, truncated to `NAME_LEN` bytes at spawn time.
    pub fn name(&self) -> &str {
        core::str::from_utf8(&self.name[..self.name_len as usize]).unwrap_or("")
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        let bytes = name.as_bytes();
        let n = bytes.len().min(NAME_LEN);
        self.name[..n].copy_from_slice(&bytes[..n]);
        self.name_len = n as u8;
    }

    /// Reset a slot for reuse by a freshly spawned task. Does not touch
    /// `pstack`/`stack_size`/`context` — the caller installs those after
    /// allocating the stack.
    pub(crate) fn reinit(
        &mut self,
        id: usize,
        name: &str,
        priority: u8,
        period: u32,
        capacity: u32,
        deadline: u32,
        ptask: TaskEntry,
    ) {
        self.id = id;
        self.set_name(name);
        self.state = TaskState::Ready;
        self.priority = priority;
        self.priority_rem = priority;
        self.delay = 0;
        self.period = period;
        self.capacity = capacity;
        self.deadline = deadline;
        self.capacity_rem = capacity;
        self.deadline_rem = deadline;
        self.period_rem = period;
        self.rtjobs = 0;
        self.bgjobs = 0;
        self.deadline_misses = 0;
        self.ptask = Some(ptask);
        self.ajob = None;
        self.other_data = 0;
    }

    /// Like `reinit`, but for an aperiodic job (`period == 0`, no real-time
    /// parameters, body called in-line by the polling server).
    pub(crate) fn reinit_aperiodic(&mut self, id: usize, name: &str, ajob: AperiodicJob, capacity: u32) {
        self.id = id;
        self.set_name(name);
        self.state = TaskState::Ready;
        self.priority = 0;
        self.priority_rem = 0;
        self.delay = 0;
        self.period = 0;
        self.capacity = capacity;
        self.deadline = 0;
        self.capacity_rem = capacity;
        self.deadline_rem = 0;
        self.period_rem = 0;
        self.rtjobs = 0;
        self.bgjobs = 0;
        self.deadline_misses = 0;
        self.ptask = None;
        self.ajob = Some(ajob);
        self.other_data = 0;
    }

    /// Layout used to allocate/deallocate this task's stack.
    pub fn stack_layout(&self) -> Layout {
        Layout::from_size_align(self.stack_size, 8).expect("valid stack layout")
    }

    /// Tear a slot down: mark it `Idle`, forgetting its real-time and
    /// bookkeeping fields. The caller is responsible for freeing `pstack`
    /// before or after calling this (see `kernel::kill`).
    pub(crate) fn clear(&mut self) {
        *self = TaskControlBlock::EMPTY;
    }
}

/// Read-only counters snapshot exposed to applications (spec.md §6's
/// "Inspection" bullet, shape left to this crate).
#[derive(Debug, Clone, Copy)]
pub struct TaskSnapshot {
    pub id: usize,
    pub state: TaskState,
    pub priority: u8,
    pub rtjobs: u32,
    pub bgjobs: u32,
    pub deadline_misses: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn dummy() -> ! {
        loop {}
    }

    #[test]
    fn reinit_sets_realtime_fields() {
        let mut tcb = TaskControlBlock::EMPTY;
        tcb.reinit(3, "worker", 5, 10, 2, 8, dummy);
        assert_eq!(tcb.name(), "worker");
        assert_eq!(tcb.state, TaskState::Ready);
        assert!(tcb.is_realtime());
        assert_eq!(tcb.capacity_rem, 2);
        assert_eq!(tcb.deadline_rem, 8);
        assert_eq!(tcb.period_rem, 10);
    }

    #[test]
    fn best_effort_task_has_zero_period() {
        let mut tcb = TaskControlBlock::EMPTY;
        tcb.reinit(1, "bg", 3, 0, 0, 0, dummy);
        assert!(!tcb.is_realtime());
    }

    #[test]
    fn clear_resets_to_idle() {
        let mut tcb = TaskControlBlock::EMPTY;
        tcb.reinit(2, "x", 1, 0, 0, 0, dummy);
        tcb.clear();
        assert_eq!(tcb.state, TaskState::Idle);
        assert_eq!(tcb.id, NONE_ID);
    }

    #[test]
    fn name_truncates_to_capacity() {
        let mut tcb = TaskControlBlock::EMPTY;
        tcb.reinit(0, "a_name_that_is_definitely_too_long", 0, 0, 0, 0, dummy);
        assert_eq!(tcb.name().len(), NAME_LEN);
    }
}
