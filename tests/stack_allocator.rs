//! Integration tests for the stack allocator.

use memarena::allocator::{Allocator, Resettable, StackAllocator, StackConfig, StackFrame};
use std::alloc::Layout;

#[test]
fn basic_write_read() {
    let allocator = StackAllocator::new(4096).expect("failed to create allocator");

    unsafe {
        let layout = Layout::from_size_align(128, 8).unwrap();
        let ptr = allocator.allocate(layout).expect("allocation failed");

        std::ptr::write_bytes(ptr.cast::<u8>().as_ptr(), 0x55, 128);
        assert_eq!(*ptr.cast::<u8>().as_ptr(), 0x55);

        allocator.deallocate(ptr.cast(), layout);
    }
    assert_eq!(allocator.used(), 0);
}

#[test]
fn slot_accounting_includes_header_and_padding() {
    // The arena base is 16-aligned, so this sequence is deterministic:
    // a 16-byte slot at alignment 4 carries 4 bytes of padding (the
    // strictly-positive convention leaves room for the header byte), and a
    // 32-byte slot at alignment 8 carries another 4.
    let allocator = StackAllocator::new(1024).expect("failed to create allocator");
    let layout_a = Layout::from_size_align(16, 4).unwrap();
    let layout_b = Layout::from_size_align(32, 8).unwrap();

    unsafe {
        let a = allocator.allocate(layout_a).unwrap();
        assert_eq!(allocator.used(), 20);
        assert_eq!(allocator.peak(), 20);

        let b = allocator.allocate(layout_b).unwrap();
        assert_eq!(allocator.used(), 56);
        assert_eq!(allocator.peak(), 56);

        allocator.deallocate(b.cast(), layout_b);
        assert_eq!(allocator.used(), 20);
        assert_eq!(allocator.peak(), 56);

        allocator.deallocate(a.cast(), layout_a);
        assert_eq!(allocator.used(), 0);
        assert_eq!(allocator.peak(), 56);
    }
}

#[test]
fn lifo_release_restores_the_cursor() {
    let allocator = StackAllocator::new(4096).expect("failed to create allocator");
    let layout = Layout::from_size_align(64, 8).unwrap();

    unsafe {
        let a = allocator.allocate(layout).unwrap();
        let b = allocator.allocate(layout).unwrap();
        let c = allocator.allocate(layout).unwrap();

        std::ptr::write_bytes(a.cast::<u8>().as_ptr(), 0xAA, 64);
        std::ptr::write_bytes(b.cast::<u8>().as_ptr(), 0xBB, 64);
        std::ptr::write_bytes(c.cast::<u8>().as_ptr(), 0xCC, 64);

        // Free in LIFO order: c, b, a.
        allocator.deallocate(c.cast(), layout);
        allocator.deallocate(b.cast(), layout);
        allocator.deallocate(a.cast(), layout);
    }
    assert_eq!(allocator.used(), 0);

    unsafe {
        // The next allocation reuses the bottom of the arena.
        let again = allocator.allocate(layout).unwrap();
        assert_eq!(allocator.used(), 72);
        allocator.deallocate(again.cast(), layout);
    }
}

#[test]
fn exhaustion_is_a_checkable_failure() {
    let allocator = StackAllocator::new(64).expect("failed to create allocator");

    unsafe {
        allocator
            .allocate(Layout::from_size_align(32, 4).unwrap())
            .expect("first allocation should fit");

        let err = allocator
            .allocate(Layout::from_size_align(64, 8).unwrap())
            .unwrap_err();
        assert!(err.is_exhaustion());
    }
}

#[test]
fn returned_addresses_honor_alignment() {
    let allocator = StackAllocator::new(4096).expect("failed to create allocator");

    unsafe {
        for align in [4usize, 8, 16, 32, 64, 128] {
            let layout = Layout::from_size_align(24, align).unwrap();
            let addr = allocator.allocate(layout).unwrap().cast::<u8>().as_ptr() as usize;
            assert_eq!(addr % align, 0, "misaligned for alignment {align}");
        }
    }
}

#[test]
fn marker_releases_everything_allocated_after_it() {
    let allocator = StackAllocator::new(4096).expect("failed to create allocator");
    let layout = Layout::from_size_align(64, 8).unwrap();

    unsafe {
        let marker = allocator.mark();

        allocator.allocate(layout).unwrap();
        allocator.allocate(layout).unwrap();
        assert!(allocator.used() > 0);

        allocator.release(marker);
        assert_eq!(allocator.used(), 0);

        // Space is reusable after the release.
        let ptr = allocator.allocate(layout).unwrap();
        std::ptr::write_bytes(ptr.cast::<u8>().as_ptr(), 0x33, 64);
        allocator.deallocate(ptr.cast(), layout);
    }
}

#[test]
fn nested_frames_release_in_order() {
    let allocator = StackAllocator::new(4096).expect("failed to create allocator");
    let layout = Layout::from_size_align(32, 8).unwrap();

    unsafe {
        let _outer = StackFrame::new(&allocator);
        allocator.allocate(layout).unwrap();
        let after_outer = allocator.used();

        {
            let _inner = StackFrame::new(&allocator);
            allocator.allocate(layout).unwrap();
            allocator.allocate(layout).unwrap();
            assert!(allocator.used() > after_outer);
        }

        // Inner frame released its two slots, the outer one is intact.
        assert_eq!(allocator.used(), after_outer);
    }
}

#[test]
fn reset_clears_usage_and_peak() {
    let allocator = StackAllocator::with_config(4096, StackConfig::debug())
        .expect("failed to create allocator");
    let layout = Layout::from_size_align(128, 8).unwrap();

    unsafe {
        let first = allocator.allocate(layout).unwrap().cast::<u8>().as_ptr() as usize;
        allocator.allocate(layout).unwrap();

        allocator.reset();
        assert_eq!(allocator.used(), 0);
        assert_eq!(allocator.peak(), 0);

        let again = allocator.allocate(layout).unwrap().cast::<u8>().as_ptr() as usize;
        assert_eq!(first, again);
    }
}
