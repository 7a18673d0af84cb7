//! # Kernel
//!
//! Top-level init and the public task-lifecycle API (spec.md §4.8, §6).
//! Owns the single global `Scheduler` instance and serializes every access
//! to it through `sync::critical_section`, matching spec.md §5's
//! concurrency model: the scheduler's internal state is never touched
//! without interrupts disabled, whether the caller is a task or the
//! `SysTick`/`PendSV` handlers in `arch::cortex_m4`.
//!
//! ## Startup sequence (spec.md §4.8)
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::init()     ← hardware_init, sched_lock on, clear
//!         │                         TCB/PCB, queues, idle task, polling
//!         │                         server
//!         ├─► kernel::spawn(...) ← register application tasks (×N)
//!         └─► kernel::start()    ← configure SysTick/PendSV, release
//!                                   sched_lock, launch the idle task
//! ```

use crate::arch::cortex_m4;
use crate::config::DEFAULT_STACK_SIZE;
use crate::error::KernelError;
use crate::heap;
use crate::log_sink;
use crate::scheduler::Scheduler;
use crate::server;
use crate::sync;
use crate::task::{AperiodicJob, TaskEntry, NONE_ID};

/// Global scheduler instance.
///
/// # Safety
/// Accessed only via `SCHEDULER_PTR`, set once by `init()`. Every read/write
/// after that happens either inside `sync::critical_section` or from ISR
/// context, where the Cortex-M4's interrupt priority scheme already
/// serializes access (spec.md §5).
static mut SCHEDULER: Scheduler = Scheduler::new();

/// Raw pointer to the global scheduler, for the arch layer's naked-asm
/// handlers which cannot hold a borrow across the `PendSV` trampoline.
///
/// # Safety
/// Set once during `init()`, read from ISR context thereafter.
#[no_mangle]
pub static mut SCHEDULER_PTR: *mut Scheduler = core::ptr::null_mut();

extern "C" fn polling_server_body() -> ! {
    loop {
        sync::critical_section(|_cs| unsafe {
            let scheduler = &mut *SCHEDULER_PTR;
            if let Some(id) = scheduler.server_id {
                server::poll(scheduler, id);
            }
        });
        yield_task();
    }
}

extern "C" fn idle_body() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

/// Bring the kernel up to the point where application tasks can be spawned
/// (spec.md §4.8, steps "hardware_init" through "spawn polling server").
/// Must be called exactly once, before any `spawn`/`start` call.
pub fn init() {
    unsafe {
        SCHEDULER = Scheduler::new();
        SCHEDULER_PTR = core::ptr::addr_of_mut!(SCHEDULER);
    }
    log_sink::init();
    heap::init();

    sync::critical_section(|_cs| unsafe {
        let scheduler = &mut *SCHEDULER_PTR;
        scheduler.set_sched_lock(true);
        scheduler
            .spawn_idle(idle_body, DEFAULT_STACK_SIZE)
            .expect("idle task is the first spawn into a fresh table");
        server::spawn_server(scheduler, polling_server_body)
            .expect("polling server fits under the RMA bound by construction");
    });

    log::info!("kernel init complete");
}

/// Spawn an application task (spec.md §4.6). `period == 0` spawns a
/// best-effort task scheduled by priority round-robin; `period > 0` spawns
/// a real-time task subject to admission control, and is rejected with
/// `KernelError::AdmissionRefused` if it would push total utilization past
/// the active policy's bound.
pub fn spawn(
    entry: TaskEntry,
    period: u32,
    capacity: u32,
    priority: u8,
    deadline: u32,
    name: &str,
) -> Result<usize, KernelError> {
    sync::critical_section(|_cs| unsafe {
        (*SCHEDULER_PTR).spawn(entry, period, capacity, priority, deadline, name, DEFAULT_STACK_SIZE)
    })
}

/// Queue an aperiodic job for the polling server (spec.md §4.5). Never
/// context-switched directly; the server drains it during its own release.
pub fn spawn_aperiodic(job: AperiodicJob, estimated_ticks: u32, name: &str) -> Result<usize, KernelError> {
    sync::critical_section(|_cs| unsafe { server::submit(&mut *SCHEDULER_PTR, job, estimated_ticks, name) })
}

/// Tear a task down and free its stack (spec.md §4.6). Idempotent: killing
/// an already-dead or never-spawned id returns `KernelError::InvalidId`.
pub fn kill(id: usize) -> Result<(), KernelError> {
    sync::critical_section(|_cs| unsafe { (*SCHEDULER_PTR).kill(id) })
}

/// The id of the currently running task.
pub fn self_id() -> usize {
    sync::critical_section(|_cs| unsafe { (*SCHEDULER_PTR).current })
}

/// Snapshot of a task's counters, for monitoring (spec.md §6's inspection
/// bullet). Returns `None` for an unused or invalid slot.
pub fn inspect(id: usize) -> Option<crate::task::TaskSnapshot> {
    sync::critical_section(|_cs| unsafe {
        let scheduler = &*SCHEDULER_PTR;
        if id >= crate::config::MAX_TASKS || scheduler.tasks[id].id == NONE_ID {
            return None;
        }
        let t = &scheduler.tasks[id];
        Some(crate::task::TaskSnapshot {
            id: t.id,
            state: t.state,
            priority: t.priority,
            rtjobs: t.rtjobs,
            bgjobs: t.bgjobs,
            deadline_misses: t.deadline_misses,
        })
    })
}

/// Enable or disable the scheduling lock (spec.md §4.6's `sched_lock`).
/// While locked, `tick()` still accounts real-time budgets but never
/// dispatches — used by the kernel during init, and available to
/// applications guarding a short non-preemptible section.
pub fn sched_lock(locked: bool) {
    sync::critical_section(|_cs| unsafe { (*SCHEDULER_PTR).set_sched_lock(locked) });
}

/// This build targets a single Cortex-M4 core (spec.md §5's Non-goal:
/// multicore is out of scope). Exposed so application code can write
/// core-aware logging without hardcoding the assumption.
pub fn cpu_id() -> usize {
    0
}

/// Voluntarily give up the CPU (spec.md §4.6's `yield`). Returns the caller
/// to the tail of its class queue without charging it any capacity, then
/// immediately triggers a context switch if a different task was chosen.
pub fn yield_task() {
    let switched = sync::critical_section(|_cs| unsafe {
        let scheduler = &mut *SCHEDULER_PTR;
        let before = scheduler.current;
        scheduler.yield_current();
        scheduler.current != before
    });
    if switched {
        cortex_m4::trigger_pendsv();
    }
}

/// Sleep the caller for approximately `ms` milliseconds (spec.md §4.6's
/// `delay_ms`), rounded up to the nearest tick.
pub fn delay_ms(ms: u32) {
    let ticks = (ms * crate::config::TICK_HZ + 999) / 1000;
    if ticks == 0 {
        return;
    }
    sync::critical_section(|_cs| unsafe {
        (*SCHEDULER_PTR).delay_current(ticks);
    });
    cortex_m4::trigger_pendsv();
}

/// Launch the scheduler. **Does not return.** Configures SysTick and
/// interrupt priorities, releases the scheduling lock set by `init()`, and
/// starts the idle task (spec.md §4.8's final steps).
///
/// # Safety
/// `init()` must have run, and the caller must be the reset handler's
/// `main`, never an ISR.
pub fn start(mut core_peripherals: cortex_m::Peripherals) -> ! {
    cortex_m4::configure_systick(&mut core_peripherals.SYST);
    cortex_m4::set_interrupt_priorities();

    let first_psp = sync::critical_section(|_cs| unsafe {
        let scheduler = &mut *SCHEDULER_PTR;
        scheduler.set_sched_lock(false);
        scheduler.tasks[scheduler.current].context.psp as *const u32
    });

    log::info!("kernel start: launching idle task");
    unsafe {
        cortex_m4::start_first_task(first_psp);
    }
}
