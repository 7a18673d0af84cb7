//! # Context primitive
//!
//! Per spec.md §9's re-architecture directive, this is **not** a
//! setjmp/longjmp pair. A `Context` holds only the saved process stack
//! pointer; the actual save/restore sequence is a `PendSV` routine in
//! `arch::cortex_m4` that saves/restores the callee-saved registers around
//! a call into `Scheduler::select_next`. From the caller's perspective a
//! switch "returns" only once the task is dispatched again — the compiler
//! never sees control flow re-entering mid-function.

/// Opaque saved execution context: the task's process stack pointer at the
/// moment it was last switched away from.
#[derive(Clone, Copy)]
pub struct Context {
    pub(crate) psp: *mut u32,
}

unsafe impl Send for Context {}
unsafe impl Sync for Context {}

impl Context {
    pub const fn new() -> Self {
        Self {
            psp: core::ptr::null_mut(),
        }
    }
}

/// Build the initial fake exception frame on a freshly allocated stack so
/// the first `PendSV` return starts the task at `entry` (spec.md §4.2's
/// `prepare_stack`). `stack_top` must point one-past-the-end of the stack
/// allocation; it is rounded down to 8-byte alignment per AAPCS before the
/// frame is laid out, exactly as the teacher's `init_task_stack` does.
pub fn stack_prepare(stack_top: *mut u8, entry: crate::task::TaskEntry) -> Context {
    let aligned_top = (stack_top as usize) & !0x07;

    // 16 words: 8 software-saved (R4-R11) + 8 hardware-stacked
    // (R0-R3, R12, LR, PC, xPSR).
    let frame_ptr = (aligned_top - 16 * 4) as *mut u32;

    unsafe {
        for i in 0..8 {
            *frame_ptr.add(i) = 0; // R4..R11
        }
        *frame_ptr.add(8) = 0; // R0
        *frame_ptr.add(9) = 0; // R1
        *frame_ptr.add(10) = 0; // R2
        *frame_ptr.add(11) = 0; // R3
        *frame_ptr.add(12) = 0; // R12
        *frame_ptr.add(13) = task_exit as u32; // LR: if entry ever returns
        *frame_ptr.add(14) = entry as usize as u32; // PC: task entry point
        *frame_ptr.add(15) = 0x0100_0000; // xPSR: Thumb bit set
    }

    Context { psp: frame_ptr }
}

/// Entry functions are `-> !` and must never return; this catches the
/// contract violation instead of running off into undefined memory.
extern "C" fn task_exit() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}
