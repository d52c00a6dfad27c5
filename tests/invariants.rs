//! End-to-end scenarios and fuzz coverage over the public API (spec.md §8).
//!
//! Each `#[test]` runs on its own libtest thread, so each gets its own
//! independent [`recordalloc::init`]-ed allocator for free (see
//! `src/lib.rs`'s `thread_local!` design note) — no serialization needed
//! between tests despite the crate's process-wide-looking API.

use recordalloc::{init, init_with_config, register, xcalloc, xfree, AllocError, ManagerConfig, RegisterError};

#[repr(C)]
struct Employee {
    id: u32,
    salary: f64,
}

fn setup() {
    init();
    register("employee", std::mem::size_of::<Employee>()).unwrap();
}

#[test]
fn register_then_alloc_and_free_one_element() {
    setup();
    let p = xcalloc("employee", 1).unwrap();
    assert!(!p.is_null());
    // a fresh page's payload is zeroed by the OS / by xcalloc's explicit
    // zero-fill on reuse.
    unsafe {
        assert_eq!(*(p as *const u64), 0);
    }
    unsafe { xfree(p) };
}

#[test]
fn duplicate_registration_is_rejected() {
    setup();
    let err = register("employee", 16).unwrap_err();
    assert_eq!(err, RegisterError::Duplicate("employee".to_string()));
}

#[test]
fn alloc_without_registering_is_rejected() {
    init();
    let err = xcalloc("ghost", 1).unwrap_err();
    assert_eq!(err, AllocError::NotRegistered("ghost".to_string()));
}

#[test]
fn element_larger_than_a_page_is_rejected_at_registration() {
    init();
    let err = register("huge", 10 * 1024 * 1024).unwrap_err();
    assert!(matches!(err, RegisterError::ElementTooLarge { .. }));
}

#[test]
fn freeing_every_block_reclaims_the_page() {
    setup();
    let a = xcalloc("employee", 1).unwrap();
    let b = xcalloc("employee", 1).unwrap();
    let c = xcalloc("employee", 1).unwrap();
    unsafe {
        xfree(a);
        xfree(b);
        xfree(c);
    }
    // The allocator does not expose page counts directly; re-allocating
    // after a full reclaim must still succeed and start from a clean page.
    let d = xcalloc("employee", 1).unwrap();
    unsafe {
        assert_eq!(*(d as *const u64), 0);
        xfree(d);
    }
}

#[test]
fn many_small_allocations_round_trip_through_the_free_chain() {
    setup();
    let mut live: Vec<*mut u8> = Vec::new();
    for _ in 0..64 {
        live.push(xcalloc("employee", 1).unwrap());
    }
    // free every other block, then the rest, exercising both coalesce
    // directions without ever double-freeing.
    let mut i = 0;
    while i < live.len() {
        unsafe { xfree(live[i]) };
        i += 2;
    }
    let mut i = 1;
    while i < live.len() {
        unsafe { xfree(live[i]) };
        i += 2;
    }
}

#[test]
fn truncated_names_still_round_trip_through_a_shorter_cap() {
    init_with_config(ManagerConfig::new(4));
    register("employeeXYZ", 8).unwrap();
    // lookups use the same truncated cap, so the full name still resolves.
    let p = xcalloc("employeeXYZ", 1).unwrap();
    unsafe { xfree(p) };
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Alloc(u32),
        FreeOldest,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u32..4).prop_map(Op::Alloc),
            Just(Op::FreeOldest),
        ]
    }

    proptest! {
        /// Any interleaving of bounded allocs and oldest-first frees must
        /// never crash, and the allocator must end up with nothing live
        /// once every outstanding block is freed (I1/I4/I6 taken together:
        /// the arena is fully accounted for at every point).
        #[test]
        fn random_alloc_free_sequences_never_crash(ops in prop::collection::vec(op_strategy(), 0..64)) {
            init();
            register("rec", 24).unwrap();
            let mut live: std::collections::VecDeque<*mut u8> = std::collections::VecDeque::new();
            for op in ops {
                match op {
                    Op::Alloc(units) => {
                        if let Ok(p) = xcalloc("rec", units) {
                            live.push_back(p);
                        }
                    }
                    Op::FreeOldest => {
                        if let Some(p) = live.pop_front() {
                            unsafe { xfree(p) };
                        }
                    }
                }
            }
            while let Some(p) = live.pop_front() {
                unsafe { xfree(p) };
            }
        }
    }
}
