//! Free Engine (spec.md §4.6): slack absorption, forward/backward
//! coalescing, and empty-page reclamation.

use crate::page::{free_chain_order, BlockHeader, DataPageHeader};
use crate::registry::RecordDescriptor;
use crate::Manager;
use core::mem::size_of;
use core::ptr::NonNull;

/// `xfree(payload)` (spec.md §4.6).
///
/// # Safety
/// `payload` must be exactly a pointer previously returned by
/// [`crate::alloc::xcalloc`] on this same [`Manager`], not yet freed.
pub unsafe fn xfree(m: &mut Manager, payload: *mut u8) {
    let payload = NonNull::new(payload).expect("recordalloc: xfree called with a null pointer");
    let mut block = BlockHeader::from_payload(payload);

    // The design's sole double-free/foreign-pointer guard (spec.md §7):
    // undefined behaviour beyond this point in release builds is accepted
    // per the spec's own non-goal.
    debug_assert!(
        !block.as_ref().is_free,
        "recordalloc: double free or foreign pointer detected"
    );

    // Captured before slack absorption/coalescing touch `data_block_size`:
    // this is exactly the `req` recorded by `xcalloc`'s split (spec.md
    // §4.5.1 step 1 always sets `data_block_size = req`, regardless of
    // split case), so it is what `on_block_allocated` credited.
    let requested_size = block.as_ref().data_block_size;
    block.as_mut().is_free = true;

    let page = BlockHeader::page_of(block);
    let page_size = m.page_size;

    absorb_hard_fragmentation_slack(block, page, page_size);
    block = forward_coalesce(block);
    block = backward_coalesce(block);

    let mut record = page.as_ref().record;
    if DataPageHeader::is_empty(page) {
        detach_page(record, page);
        crate::os::release_pages(DataPageHeader::base(page), 1, page_size);
        m.stats.on_data_page_released(page_size);
    } else {
        record
            .as_mut()
            .free_chain
            .priority_insert(BlockHeader::link_ptr(block), free_chain_order);
    }

    m.stats.on_block_freed(requested_size);
}

/// Re-absorbs the hard-fragmentation slack a case-3 split left invisible
/// between this block and its physical next neighbour (spec.md §4.6 step 2,
/// "Offset-absorption of hard IF" in spec.md §9): computed from physical
/// addresses, not sibling metadata.
unsafe fn absorb_hard_fragmentation_slack(
    mut block: NonNull<BlockHeader>,
    page: NonNull<DataPageHeader>,
    page_size: usize,
) {
    let boundary = match block.as_ref().next {
        Some(next) => next.as_ptr() as usize,
        None => DataPageHeader::base(page).as_ptr() as usize + page_size,
    };
    let physical_next = BlockHeader::next_by_size(block).as_ptr() as usize;
    block.as_mut().data_block_size += boundary - physical_next;
}

/// Merges `block` with its intra-page next neighbour if it is free (I3: no
/// two adjacent free blocks may remain).
unsafe fn forward_coalesce(mut block: NonNull<BlockHeader>) -> NonNull<BlockHeader> {
    let Some(next) = block.as_ref().next else {
        return block;
    };
    if !next.as_ref().is_free {
        return block;
    }

    let mut record = BlockHeader::page_of(block).as_ref().record;
    record
        .as_mut()
        .free_chain
        .remove(BlockHeader::link_ptr(next));

    let merged = block.as_ref().data_block_size + size_of::<BlockHeader>() + next.as_ref().data_block_size;
    block.as_mut().data_block_size = merged;

    let new_next = next.as_ref().next;
    block.as_mut().next = new_next;
    if let Some(mut n) = new_next {
        n.as_mut().prev = Some(block);
    }
    block
}

/// Merges `block` with its intra-page previous neighbour if it is free,
/// returning the (possibly different) surviving block pointer.
///
/// **Open-question resolution** (spec.md §9, "Backward-coalesce invariant
/// refresh"): `prev` is removed from the free chain *before* its size is
/// mutated, and the merged block is inserted into the free chain exactly
/// once, by the caller, after both coalesce passes complete — never
/// reinserted here with a stale key.
unsafe fn backward_coalesce(block: NonNull<BlockHeader>) -> NonNull<BlockHeader> {
    let Some(mut prev) = block.as_ref().prev else {
        return block;
    };
    if !prev.as_ref().is_free {
        return block;
    }

    let mut record = BlockHeader::page_of(block).as_ref().record;
    record
        .as_mut()
        .free_chain
        .remove(BlockHeader::link_ptr(prev));

    let merged = prev.as_ref().data_block_size + size_of::<BlockHeader>() + block.as_ref().data_block_size;
    prev.as_mut().data_block_size = merged;

    let new_next = block.as_ref().next;
    prev.as_mut().next = new_next;
    if let Some(mut n) = new_next {
        n.as_mut().prev = Some(prev);
    }
    prev
}

unsafe fn detach_page(mut record: NonNull<RecordDescriptor>, page: NonNull<DataPageHeader>) {
    let prev = page.as_ref().prev;
    let next = page.as_ref().next;
    match prev {
        Some(mut p) => p.as_mut().next = next,
        None => record.as_mut().data_pages = next,
    }
    if let Some(mut n) = next {
        n.as_mut().prev = prev;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::xcalloc;
    use crate::config::ManagerConfig;

    fn fresh_manager(name: &str, size: usize) -> Manager {
        let mut m = Manager::new(ManagerConfig::default());
        m.registry
            .register(name, size, m.page_size, m.config.max_struct_name_size, &mut m.stats)
            .unwrap();
        m
    }

    #[test]
    fn free_then_alloc_reuses_the_page() {
        let mut m = fresh_manager("emp", 100);
        let p = xcalloc(&mut m, "emp", 1).unwrap();
        assert_eq!(m.stats.data_pages_mapped, 1);
        unsafe { xfree(&mut m, p) };
        assert_eq!(m.stats.data_pages_mapped, 0);
        assert_eq!(m.stats.live_blocks, 0);
    }

    #[test]
    fn coalesces_a_hole_between_two_live_neighbours() {
        let mut m = fresh_manager("emp", 100);
        let p1 = xcalloc(&mut m, "emp", 1).unwrap();
        let p2 = xcalloc(&mut m, "emp", 1).unwrap();
        let p3 = xcalloc(&mut m, "emp", 1).unwrap();
        unsafe {
            xfree(&mut m, p2);
            xfree(&mut m, p1);
            xfree(&mut m, p3);
        }
        // every block freed on one page -> page released entirely.
        assert_eq!(m.stats.data_pages_mapped, 0);
        let _ = p2;
    }
}
