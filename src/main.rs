//! # Example firmware
//!
//! Demonstrates the scheduler with a mix of real-time, best-effort and
//! aperiodic work:
//!
//! | Task | Class | Period/Priority | Capacity | Deadline |
//! |------|-------|------------------|----------|----------|
//! | `sensor_sample`  | RT  | T=10 | C=2 | D=10 |
//! | `control_loop`   | RT  | T=15 | C=3 | D=15 |
//! | `logger_task`    | BE  | prio 10 | — | — |
//! | `housekeeping`   | BE  | prio 5  | — | — |
//! | `idle_work`      | BE  | prio 1  | — | — |
//!
//! `sensor_sample`/`control_loop` together use 20% + 20% = 40% utilization,
//! comfortably under the two-task RMA bound (~82.8%). Three aperiodic jobs
//! of capacity 5, 1 and 2 ticks are queued for the polling server to drain.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use panic_halt as _;

use cadence::kernel;

extern "C" fn sensor_sample() -> ! {
    loop {
        let mut acc: u32 = 0;
        for _ in 0..200 {
            acc = acc.wrapping_add(1);
        }
        kernel::yield_task();
    }
}

extern "C" fn control_loop() -> ! {
    loop {
        let mut acc: u32 = 0;
        for _ in 0..300 {
            acc = acc.wrapping_add(1);
        }
        kernel::yield_task();
    }
}

extern "C" fn logger_task() -> ! {
    loop {
        log::info!("logger heartbeat");
        kernel::delay_ms(50);
    }
}

extern "C" fn housekeeping_task() -> ! {
    loop {
        kernel::yield_task();
    }
}

extern "C" fn idle_work_task() -> ! {
    loop {
        kernel::delay_ms(500);
    }
}

/// An aperiodic job that simulates a burst of work lasting `budget_ticks`
/// units. The server tracks how much of the job's declared capacity is
/// still outstanding, so the job body itself only has to do the work it is
/// handed — it reports nothing back.
extern "C" fn job_a(_budget: u32) {}

extern "C" fn job_b(_budget: u32) {}

extern "C" fn job_c(_budget: u32) {}

#[entry]
fn main() -> ! {
    let cp = cortex_m::Peripherals::take().unwrap();

    kernel::init();

    kernel::spawn(sensor_sample, 10, 2, 4, 10, "sensor-sample").expect("sensor-sample admitted");
    kernel::spawn(control_loop, 15, 3, 3, 15, "control-loop").expect("control-loop admitted");

    kernel::spawn(logger_task, 0, 0, 10, 0, "logger").expect("logger spawned");
    kernel::spawn(housekeeping_task, 0, 0, 5, 0, "housekeeping").expect("housekeeping spawned");
    kernel::spawn(idle_work_task, 0, 0, 1, 0, "idle-work").expect("idle-work spawned");

    kernel::spawn_aperiodic(job_a, 5, "job-a").expect("job-a queued");
    kernel::spawn_aperiodic(job_b, 1, "job-b").expect("job-b queued");
    kernel::spawn_aperiodic(job_c, 2, "job-c").expect("job-c queued");

    kernel::start(cp)
}
