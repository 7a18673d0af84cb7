//! # Polling server
//!
//! Admits aperiodic work under a periodic capacity budget so sporadic jobs
//! get bounded-latency service without threatening the real-time admission
//! bound (spec.md §4.5). The server itself is spawned as an ordinary
//! real-time task (`period = SERVER_PERIOD_TICKS`, `capacity =
//! SERVER_CAPACITY_TICKS`) — it competes for the CPU through the same RMA/
//! EDF admission and dispatch path as any other periodic task; what makes
//! it a "server" is only what its body does once it is running: drain the
//! aperiodic queue instead of doing fixed work.
//!
//! Fuel for the current release lives in `TaskControlBlock::other_data`,
//! reset to `capacity` by `Scheduler::release_job` for every real-time task
//! uniformly (spec.md §4.5: "no special-cased refill path") — this module
//! just happens to be the only consumer that looks at it.

use crate::config::{SERVER_CAPACITY_TICKS, SERVER_PERIOD_TICKS};
use crate::error::KernelError;
use crate::scheduler::Scheduler;
use crate::task::{AperiodicJob, TaskEntry};

/// Spawn the standing polling server task (spec.md §4.8 init order: right
/// after the idle task). `body` loops calling `poll` then yielding; see
/// `kernel::polling_server_body` for the default implementation wired up
/// by `kernel::start`.
pub fn spawn_server(scheduler: &mut Scheduler, body: TaskEntry) -> Result<usize, KernelError> {
    let id = scheduler.spawn(
        body,
        SERVER_PERIOD_TICKS,
        SERVER_CAPACITY_TICKS,
        1,
        SERVER_PERIOD_TICKS,
        "polling-server",
        512,
    )?;
    scheduler.server_id = Some(id);
    Ok(id)
}

/// Queue an aperiodic job for the server to service, admitted unconditionally
/// (aperiodic work carries no utilization bound — it is throttled by the
/// server's own periodic budget instead).
pub fn submit(
    scheduler: &mut Scheduler,
    job: AperiodicJob,
    estimated_ticks: u32,
    name: &str,
) -> Result<usize, KernelError> {
    scheduler.spawn_aperiodic(job, estimated_ticks, name)
}

/// One service pass: called from inside the server task's own body, with
/// `server_id` the server's own slot id. Drains the front of the aperiodic
/// queue while fuel remains in `other_data`, charging each job exactly
/// `min(fuel, job.capacity_rem)` — never more than it has left to do, never
/// more than the server can afford — and decrementing both counters by that
/// amount. A job whose `capacity_rem` reaches zero is complete and its slot
/// is freed; otherwise it is pushed back to the tail to wait for a future
/// release's fuel (at which point fuel is necessarily exhausted, so the
/// loop's next iteration returns). Returns once fuel is exhausted or the
/// queue drains, having served as many jobs as this release's fuel allows
/// rather than stopping after the first.
pub fn poll(scheduler: &mut Scheduler, server_id: usize) {
    loop {
        let fuel = scheduler.tasks[server_id].other_data;
        if fuel == 0 {
            return;
        }

        let job_id = match scheduler.aperiodic_queue_mut().peek() {
            Some(id) => id,
            None => return,
        };

        let ajob = match scheduler.tasks[job_id].ajob {
            Some(f) => f,
            None => {
                // stale entry, already freed elsewhere; drop it and keep draining
                let _ = scheduler.aperiodic_queue_mut().remove();
                continue;
            }
        };

        let charge = fuel.min(scheduler.tasks[job_id].capacity_rem);
        ajob(charge);
        scheduler.tasks[server_id].other_data -= charge;
        scheduler.tasks[job_id].capacity_rem -= charge;

        let _ = scheduler.aperiodic_queue_mut().remove(); // pop the head we peeked

        if scheduler.tasks[job_id].capacity_rem == 0 {
            scheduler.tasks[job_id].bgjobs += 1;
            scheduler.free_task(job_id);
        } else {
            let _ = scheduler.aperiodic_queue_mut().add_tail(job_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskState;

    extern "C" fn dummy_task() -> ! {
        loop {}
    }

    extern "C" fn idle_body() -> ! {
        loop {}
    }

    extern "C" fn noop_job(_budget: u32) {}

    fn fresh_scheduler() -> Scheduler {
        let mut s = Scheduler::new();
        s.spawn_idle(idle_body, 256).unwrap();
        s
    }

    #[test]
    fn server_spawns_as_admitted_realtime_task() {
        let mut s = fresh_scheduler();
        let id = spawn_server(&mut s, dummy_task).unwrap();
        assert!(s.tasks[id].is_realtime());
        assert_eq!(s.server_id, Some(id));
    }

    #[test]
    fn poll_completes_job_and_frees_its_slot() {
        let mut s = fresh_scheduler();
        let server = spawn_server(&mut s, dummy_task).unwrap();
        s.tasks[server].other_data = SERVER_CAPACITY_TICKS;
        let job = submit(&mut s, noop_job, 1, "job").unwrap();

        poll(&mut s, server);

        assert_eq!(s.tasks[job].state, TaskState::Idle);
    }

    #[test]
    fn poll_requeues_unfinished_job_and_resumes_next_release() {
        let mut s = fresh_scheduler();
        let server = spawn_server(&mut s, dummy_task).unwrap();
        s.tasks[server].other_data = 1;
        let job = submit(&mut s, noop_job, 2, "job").unwrap();

        poll(&mut s, server);
        assert_eq!(s.tasks[job].state, TaskState::Ready);
        assert_eq!(s.tasks[job].capacity_rem, 1);
        assert_eq!(s.tasks[server].other_data, 0);

        s.tasks[server].other_data = SERVER_CAPACITY_TICKS;
        poll(&mut s, server);
        assert_eq!(s.tasks[job].state, TaskState::Idle);
        // SERVER_CAPACITY_TICKS (3) > the 1 tick still owed, so only 1 is spent.
        assert_eq!(s.tasks[server].other_data, SERVER_CAPACITY_TICKS - 1);
    }

    #[test]
    fn poll_is_noop_with_empty_queue() {
        let mut s = fresh_scheduler();
        let server = spawn_server(&mut s, dummy_task).unwrap();
        s.tasks[server].other_data = SERVER_CAPACITY_TICKS;
        poll(&mut s, server); // must not panic
    }

    #[test]
    fn poll_drains_multiple_small_jobs_within_one_release() {
        // spec.md §8 scenario 4: jobs of capacity {5, 1, 2} against a
        // server of capacity 3. After job A's first partial run (3 of 5)
        // exhausts the first release, its second release should still be
        // able to finish off jobs B and C in the same pass once A's own
        // remainder is served elsewhere — here we exercise the simpler
        // claim the fix is about: a release with fuel to spare after one
        // job finishes keeps draining instead of stopping dead.
        let mut s = fresh_scheduler();
        let server = spawn_server(&mut s, dummy_task).unwrap();
        let b = submit(&mut s, noop_job, 1, "b").unwrap();
        let c = submit(&mut s, noop_job, 2, "c").unwrap();

        s.tasks[server].other_data = SERVER_CAPACITY_TICKS; // 3
        poll(&mut s, server);

        // 1 (b) + 2 (c) == 3 == the whole release's fuel: both finish.
        assert_eq!(s.tasks[b].state, TaskState::Idle);
        assert_eq!(s.tasks[c].state, TaskState::Idle);
        assert_eq!(s.tasks[server].other_data, 0);
    }

    #[test]
    fn poll_charges_exactly_capacity_rem_not_full_fuel() {
        let mut s = fresh_scheduler();
        let server = spawn_server(&mut s, dummy_task).unwrap();
        s.tasks[server].other_data = SERVER_CAPACITY_TICKS; // 3
        let job = submit(&mut s, noop_job, 1, "job").unwrap();

        poll(&mut s, server);

        assert_eq!(s.tasks[job].state, TaskState::Idle);
        // Only the 1 tick the job needed is charged; the rest of this
        // release's fuel remains (the empty-queue check, not a full
        // zeroing, is what ends the loop).
        assert_eq!(s.tasks[server].other_data, SERVER_CAPACITY_TICKS - 1);
    }
}
