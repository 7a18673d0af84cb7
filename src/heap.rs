//! # Kernel heap
//!
//! Ambient-stack substitute for the spec's external allocator collaborator
//! (spec.md §1, §6: consumed as `alloc(size) -> ptr | null` / `free(ptr)`).
//! Rust has no bundled allocator, so this crate brings its own: a
//! `linked_list_allocator::Heap` over a static byte array, grounded on the
//! kernel heap-bringup pattern shared by `doublegate-VeridianOS` and
//! `NON-OS-N0N-OS` in the reference pack.
//!
//! Unlike those two (which install a `#[global_allocator]` so `Box`/`Vec`
//! work crate-wide), this kernel never uses `alloc::boxed`/`alloc::vec` —
//! the only consumer is task-stack allocation in `scheduler.rs`, which
//! already knows its `Layout` up front. Exposing `alloc`/`dealloc` as
//! plain functions returning `Option`/`()` instead, rather than
//! implementing `GlobalAlloc`, avoids committing to the nightly-only
//! `#[alloc_error_handler]` the `GlobalAlloc` route requires. Spec.md §5
//! notes "the allocator is responsible for its own internal exclusion";
//! here that exclusion is the same `sync::critical_section` used for every
//! other piece of shared kernel state.

use core::alloc::Layout;
use core::ptr::NonNull;

use linked_list_allocator::Heap;

use crate::config::HEAP_SIZE;
use crate::sync::critical_section;

#[repr(align(8))]
struct HeapArena([u8; HEAP_SIZE]);

static mut HEAP_ARENA: HeapArena = HeapArena([0; HEAP_SIZE]);
static mut HEAP: Heap = Heap::empty();

/// Bring the heap online. Must be called exactly once, before the first
/// `alloc` call (spec.md §4.8's init order: right after `clear PCB`).
pub fn init() {
    critical_section(|_| unsafe {
        #[allow(static_mut_refs)]
        HEAP.init(HEAP_ARENA.0.as_mut_ptr(), HEAP_SIZE);
    });
}

/// Allocate `layout` from the kernel heap, or `None` on exhaustion
/// (`KernelError::OutOfMemory` at the call site).
pub fn alloc(layout: Layout) -> Option<NonNull<u8>> {
    critical_section(|_| unsafe {
        #[allow(static_mut_refs)]
        HEAP.allocate_first_fit(layout).ok()
    })
}

/// Return a previous `alloc` allocation to the heap.
///
/// # Safety
/// `ptr`/`layout` must match a prior successful `alloc` call exactly.
pub unsafe fn dealloc(ptr: NonNull<u8>, layout: Layout) {
    critical_section(|_| {
        #[allow(static_mut_refs)]
        HEAP.deallocate(ptr, layout)
    });
}
