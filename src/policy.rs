//! # Scheduling policies
//!
//! Real-time task selection (RMA, EDF) and admission control (spec.md
//! §4.3), plus the best-effort weighted round-robin picker (spec.md §4.4).
//! Both RT policies share the same shape: scan the RT queue, keep the
//! entry with the smallest key, tie-break on ascending slot id (the queue
//! is already FIFO-ordered by id for same-tick releases, so a strict `<`
//! comparison naturally keeps the first-seen, lower-id entry on a tie).

use crate::config::{MAX_TASKS, UTIL_SCALE};
use crate::pcb::RtPolicy;
use crate::queue::Fifo;
use crate::task::{TaskControlBlock, TaskState};

/// Precomputed RMA utilization bound `n * (2^(1/n) - 1)`, scaled by
/// `UTIL_SCALE`, for `n = 1..=MAX_TASKS`. `n(2^(1/n)-1)` has no exact
/// integer form, so — per spec.md §4.3's "integer arithmetic scaled by
/// 10000" instruction — these are computed once at crate-authoring time
/// and baked in as scaled integers rather than computed at runtime with
/// floats. The sequence decreases monotonically toward `ln(2) * SCALE
/// ≈ 6931` as `n` grows.
const RMA_BOUND_SCALED: [u32; MAX_TASKS] = [
    10000, 8284, 7798, 7568, 7435, 7348, 7286, 7241, 7205, 7177, 7155, 7136, 7120, 7106, 7094,
    7084,
];

/// Select the next real-time task to run from the RT queue, or `None` if
/// there is no candidate. The queue holds only `Ready` real-time tasks;
/// `running_candidate` additionally admits the currently `Running` real-time
/// task (absent from `rt_queue` by construction) into the comparison, so a
/// solo real-time task that is still the best runnable one is kept running
/// instead of being evicted to idle for a tick while nothing else is ready
/// (spec.md §4.7 step 6: the task stays selected as long as it is the
/// highest-priority runnable real-time task).
pub fn pick_rt(
    policy: RtPolicy,
    tasks: &[TaskControlBlock; MAX_TASKS],
    rt_queue: &Fifo<MAX_TASKS>,
    running_candidate: Option<usize>,
) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None; // (id, key)
    for id in rt_queue.iter().chain(running_candidate) {
        let key = match policy {
            RtPolicy::RateMonotonic => tasks[id].period,
            RtPolicy::EarliestDeadlineFirst => tasks[id].deadline_rem,
        };
        match best {
            None => best = Some((id, key)),
            Some((best_id, best_key)) => {
                if key < best_key || (key == best_key && id < best_id) {
                    best = Some((id, key));
                }
            }
        }
    }
    best.map(|(id, _)| id)
}

/// Admission check for a candidate real-time task with the given
/// `capacity`/`period`, given the utilization already committed by
/// `admitted_count` previously-admitted real-time tasks
/// (`admitted_util_scaled`, already scaled by `UTIL_SCALE`).
pub fn admit(
    policy: RtPolicy,
    admitted_util_scaled: u64,
    admitted_count: usize,
    capacity: u32,
    period: u32,
) -> bool {
    let candidate_util = (capacity as u64) * (UTIL_SCALE as u64) / (period as u64);
    let total_util = admitted_util_scaled + candidate_util;
    let n = admitted_count + 1;

    let bound = match policy {
        RtPolicy::RateMonotonic => {
            let idx = n.min(MAX_TASKS) - 1;
            RMA_BOUND_SCALED[idx] as u64
        }
        RtPolicy::EarliestDeadlineFirst => UTIL_SCALE as u64,
    };

    total_util <= bound
}

/// Weighted round-robin selection over the best-effort run queue
/// (spec.md §4.4). Peeks the head; if it still has quantum (`priority_rem
/// > 0`), dispatches it in place (decrementing the quantum). Otherwise
/// resets its quantum, rotates it to the tail, and tries the next head —
/// repeating until a task is dispatched or the queue drains, in which case
/// `idle_id` is returned.
pub fn pick_best_effort(
    tasks: &mut [TaskControlBlock; MAX_TASKS],
    run_queue: &mut Fifo<MAX_TASKS>,
    idle_id: usize,
) -> usize {
    let rounds = run_queue.count();
    for _ in 0..rounds {
        let head = match run_queue.peek() {
            Some(id) => id,
            None => break,
        };
        if tasks[head].priority_rem > 0 {
            tasks[head].priority_rem -= 1;
            return head;
        }
        let id = run_queue.remove().expect("head was just peeked");
        tasks[id].priority_rem = tasks[id].priority;
        run_queue.add_tail(id).expect("queue has capacity for its own entries");
    }
    idle_id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_rt(id: usize, period: u32, deadline_rem: u32) -> TaskControlBlock {
        let mut tcb = TaskControlBlock::EMPTY;
        tcb.id = id;
        tcb.state = TaskState::Ready;
        tcb.period = period;
        tcb.deadline_rem = deadline_rem;
        tcb
    }

    #[test]
    fn rma_picks_shortest_period_tie_break_lower_id() {
        let mut tasks: [TaskControlBlock; MAX_TASKS] =
            core::array::from_fn(|_| TaskControlBlock::EMPTY);
        tasks[1] = make_rt(1, 10, 0);
        tasks[2] = make_rt(2, 10, 0);
        tasks[3] = make_rt(3, 5, 0);
        let mut q: Fifo<MAX_TASKS> = Fifo::new();
        q.add_tail(1).unwrap();
        q.add_tail(2).unwrap();
        q.add_tail(3).unwrap();
        assert_eq!(pick_rt(RtPolicy::RateMonotonic, &tasks, &q, None), Some(3));
    }

    #[test]
    fn rma_tie_break_prefers_lower_id() {
        let mut tasks: [TaskControlBlock; MAX_TASKS] =
            core::array::from_fn(|_| TaskControlBlock::EMPTY);
        tasks[4] = make_rt(4, 10, 0);
        tasks[2] = make_rt(2, 10, 0);
        let mut q: Fifo<MAX_TASKS> = Fifo::new();
        q.add_tail(4).unwrap();
        q.add_tail(2).unwrap();
        assert_eq!(pick_rt(RtPolicy::RateMonotonic, &tasks, &q, None), Some(2));
    }

    #[test]
    fn edf_picks_earliest_deadline_rem() {
        let mut tasks: [TaskControlBlock; MAX_TASKS] =
            core::array::from_fn(|_| TaskControlBlock::EMPTY);
        tasks[1] = make_rt(1, 100, 50);
        tasks[2] = make_rt(2, 100, 3);
        let mut q: Fifo<MAX_TASKS> = Fifo::new();
        q.add_tail(1).unwrap();
        q.add_tail(2).unwrap();
        assert_eq!(
            pick_rt(RtPolicy::EarliestDeadlineFirst, &tasks, &q, None),
            Some(2)
        );
    }

    #[test]
    fn empty_queue_picks_none() {
        let tasks: [TaskControlBlock; MAX_TASKS] = core::array::from_fn(|_| TaskControlBlock::EMPTY);
        let q: Fifo<MAX_TASKS> = Fifo::new();
        assert_eq!(pick_rt(RtPolicy::RateMonotonic, &tasks, &q, None), None);
    }

    #[test]
    fn running_candidate_wins_with_empty_queue() {
        // A solo running real-time task, absent from rt_queue, must still be
        // picked over nothing: the queue alone would return None.
        let mut tasks: [TaskControlBlock; MAX_TASKS] =
            core::array::from_fn(|_| TaskControlBlock::EMPTY);
        tasks[5] = make_rt(5, 10, 7);
        let q: Fifo<MAX_TASKS> = Fifo::new();
        assert_eq!(
            pick_rt(RtPolicy::RateMonotonic, &tasks, &q, Some(5)),
            Some(5)
        );
    }

    #[test]
    fn running_candidate_loses_to_a_better_queued_task() {
        let mut tasks: [TaskControlBlock; MAX_TASKS] =
            core::array::from_fn(|_| TaskControlBlock::EMPTY);
        tasks[1] = make_rt(1, 20, 0); // running, lower key than nobody else
        tasks[2] = make_rt(2, 5, 0); // queued, shorter period wins under RMA
        let mut q: Fifo<MAX_TASKS> = Fifo::new();
        q.add_tail(2).unwrap();
        assert_eq!(
            pick_rt(RtPolicy::RateMonotonic, &tasks, &q, Some(1)),
            Some(2)
        );
    }

    #[test]
    fn admission_accepts_under_rma_bound() {
        // Two tasks: (C=2,T=10), (C=3,T=15) => util = 2000 + 2000 = 4000 (scaled).
        assert!(admit(RtPolicy::RateMonotonic, 0, 0, 2, 10));
        assert!(admit(RtPolicy::RateMonotonic, 2000, 1, 3, 15));
    }

    #[test]
    fn admission_refuses_over_rma_bound() {
        // 4 tasks already at util 8200 (scaled); a 5th at (C=2,T=5) adds 4000 => 12200 > bound.
        assert!(!admit(RtPolicy::RateMonotonic, 8200, 4, 2, 5));
    }

    #[test]
    fn admission_edf_accepts_up_to_full_utilization() {
        // (1,4) + (2,6) + (3,8) => 2500 + 3333 + 3750 = 9583 <= 10000
        assert!(admit(RtPolicy::EarliestDeadlineFirst, 0, 0, 1, 4));
        assert!(admit(RtPolicy::EarliestDeadlineFirst, 2500, 1, 2, 6));
        assert!(admit(RtPolicy::EarliestDeadlineFirst, 5833, 2, 3, 8));
    }

    #[test]
    fn best_effort_weighted_round_robin_quanta() {
        let mut tasks: [TaskControlBlock; MAX_TASKS] =
            core::array::from_fn(|_| TaskControlBlock::EMPTY);
        tasks[1].id = 1;
        tasks[1].priority = 2;
        tasks[1].priority_rem = 2;
        tasks[2].id = 2;
        tasks[2].priority = 1;
        tasks[2].priority_rem = 1;
        let mut q: Fifo<MAX_TASKS> = Fifo::new();
        q.add_tail(1).unwrap();
        q.add_tail(2).unwrap();

        // Task 1 gets two consecutive quanta before rotating.
        assert_eq!(pick_best_effort(&mut tasks, &mut q, 0), 1);
        assert_eq!(tasks[1].priority_rem, 1);
        assert_eq!(pick_best_effort(&mut tasks, &mut q, 0), 1);
        assert_eq!(tasks[1].priority_rem, 0);
        // Quantum exhausted: rotate to tail, task 2 now at head.
        assert_eq!(pick_best_effort(&mut tasks, &mut q, 0), 2);
        assert_eq!(tasks[1].priority_rem, tasks[1].priority);
    }

    #[test]
    fn best_effort_falls_back_to_idle_when_empty() {
        let mut tasks: [TaskControlBlock; MAX_TASKS] =
            core::array::from_fn(|_| TaskControlBlock::EMPTY);
        let mut q: Fifo<MAX_TASKS> = Fifo::new();
        assert_eq!(pick_best_effort(&mut tasks, &mut q, 0), 0);
    }
}
