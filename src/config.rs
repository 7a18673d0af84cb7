//! # Cadence Configuration
//!
//! Compile-time constants governing the scheduler and system behavior.
//! All limits are fixed at compile time — no dynamic TCB growth.

/// Maximum number of tasks the system can manage simultaneously, including
/// the idle task (id 0) and the polling server.
pub const MAX_TASKS: usize = 16;

/// SysTick frequency in Hz. Determines scheduler tick granularity
/// (the spec's `TIME_SLICE`, expressed here as a frequency).
pub const TICK_HZ: u32 = 1000;

/// Microseconds per tick, derived from `TICK_HZ`. Matches spec.md §6's
/// `TIME_SLICE` configuration constant (renamed to carry units).
pub const TIME_SLICE_US: u32 = 1_000_000 / TICK_HZ;

/// System clock frequency in Hz (default for STM32F4 at 16 MHz HSI).
pub const SYSTEM_CLOCK_HZ: u32 = 16_000_000;

/// Fixed-point scale used for utilization-bound arithmetic
/// (spec.md §4.3: "integer arithmetic scaled by 10000").
pub const UTIL_SCALE: u32 = 10_000;

/// Polling server period, in ticks (spec.md §4.5).
pub const SERVER_PERIOD_TICKS: u32 = 10;

/// Polling server per-release aperiodic execution budget, in ticks.
pub const SERVER_CAPACITY_TICKS: u32 = 3;

/// Capacity of the fixed-size task name buffer, in bytes.
pub const NAME_LEN: usize = 16;

/// Per-task stack size requested by the demo firmware when no explicit
/// size is given at `spawn`. Real callers choose their own `stack_size`.
pub const DEFAULT_STACK_SIZE: usize = 1024;

/// Total bytes reserved for the kernel heap backing task stacks.
pub const HEAP_SIZE: usize = 24 * 1024;

/// Number of processor cores. Set to 1 for Cortex-M4 (single-core); the
/// spec's multi-core model runs one independent instance per core, so this
/// crate never coordinates scheduling across a value > 1.
pub const MAX_CORES: usize = 1;
