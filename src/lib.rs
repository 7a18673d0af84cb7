//! # Cadence — a real-time task scheduler for ARM Cortex-M4
//!
//! A fixed-priority real-time scheduler with a best-effort fallback class
//! and a polling server for aperiodic admission, running on bare-metal
//! Cortex-M4 hardware.
//!
//! ## Overview
//!
//! Every task belongs to one of two classes:
//!
//! - **Real-time** tasks declare a period, a worst-case execution budget
//!   (capacity) and a deadline. They are admitted only if doing so keeps
//!   total CPU utilization under the active policy's bound (Rate Monotonic
//!   or Earliest Deadline First), and are then scheduled strictly by that
//!   policy's priority order.
//! - **Best-effort** tasks carry only a priority and share the CPU by
//!   weighted round robin once all real-time work for the tick is served.
//!
//! A standing **polling server** is itself a real-time task; its body
//! drains a queue of aperiodic jobs under its own periodic budget, giving
//! sporadic work bounded latency without threatening the real-time
//! admission bound.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                    Application Tasks                    │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                  │
//! │      init() · spawn() · start() · yield_task() · ...    │
//! ├──────────────┬────────────────────┬───────────────────┤
//! │  Scheduler   │   Policy           │  Sync Primitives  │
//! │  scheduler.rs│   policy.rs        │  sync.rs          │
//! │  ─ tick()    │   ─ pick_rt()      │  ─ critical_section│
//! │  ─ dispatch()│   ─ admit()        │                   │
//! │  ─ yield()   │   ─ pick_best_effort│                  │
//! ├──────────────┴────────────────────┴───────────────────┤
//! │     Task Model (task.rs) · Queues (queue.rs)            │
//! │    TCB · TaskState · Fifo                                │
//! ├────────────────────────────────────────────────────────┤
//! │            Arch Port (arch/cortex_m4.rs)                │
//! │    PendSV · SysTick · Context Switch · Stack Init      │
//! ├────────────────────────────────────────────────────────┤
//! │         ARM Cortex-M4 Hardware (Thumb-2)                │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Memory model
//!
//! - Fixed-size TCB table: `[TaskControlBlock; MAX_TASKS]`, no heap use for
//!   the table itself.
//! - Per-task stacks come from a small `linked_list_allocator` heap
//!   (`heap.rs`) — the only thing this crate ever allocates.
//! - Shared state is protected by `sync::critical_section`, a thin wrapper
//!   over `cortex_m::interrupt::free`.

#![no_std]

pub mod arch;
pub mod config;
pub mod context;
pub mod error;
pub mod heap;
pub mod kernel;
pub mod log_sink;
pub mod pcb;
pub mod policy;
pub mod queue;
pub mod scheduler;
pub mod server;
pub mod sync;
pub mod task;
