//! # Process Control Block
//!
//! Singleton kernel-wide state that is not per-task (spec.md §3's PCB).

/// Real-time scheduling policy in effect (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtPolicy {
    RateMonotonic,
    EarliestDeadlineFirst,
}

/// Best-effort scheduling policy in effect (spec.md §4.4). Kept as an enum
/// of one variant so a second policy can be added later without breaking
/// callers that match on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BePolicy {
    PriorityRoundRobin,
}

/// Kernel-wide counters and policy selectors, one instance per core.
pub struct Pcb {
    pub rt_policy: RtPolicy,
    pub be_policy: BePolicy,
    pub cooperative_switches: u32,
    pub preemptive_switches: u32,
    pub interrupts: u64,
    pub tick_time_us: u64,
    pub sched_lock: bool,
}

impl Pcb {
    pub const fn new() -> Self {
        Self {
            rt_policy: RtPolicy::RateMonotonic,
            be_policy: BePolicy::PriorityRoundRobin,
            cooperative_switches: 0,
            preemptive_switches: 0,
            interrupts: 0,
            tick_time_us: 0,
            sched_lock: false,
        }
    }
}
