//! Allocation Engine (spec.md §4.5): largest-free-block-first selection,
//! fresh-page extension, and the four-case split protocol (§4.5.1).

use crate::error::AllocError;
use crate::page::{payload_capacity, BlockHeader, DataPageHeader};
use crate::registry::RecordDescriptor;
use crate::Manager;
use core::mem::size_of;
use core::ptr::NonNull;

/// `xcalloc(name, units)` (spec.md §4.5).
pub fn xcalloc(m: &mut Manager, name: &str, units: u32) -> Result<*mut u8, AllocError> {
    let page_size = m.page_size;
    let capacity = payload_capacity(page_size);

    let descriptor = m
        .registry
        .lookup(name, m.config.max_struct_name_size)
        .ok_or_else(|| AllocError::NotRegistered(name.to_string()))?;
    let element_size = unsafe { descriptor.as_ref().element_size };

    let requested = (units as usize).saturating_mul(element_size);
    let req = (units as usize)
        .checked_mul(element_size)
        .filter(|&r| r <= capacity)
        .ok_or(AllocError::RequestTooLarge {
            requested,
            capacity,
        })?;

    let block = unsafe { acquire_candidate(m, descriptor, req, capacity)? };
    let block = unsafe { split_block(block, req) };
    let payload = unsafe { BlockHeader::payload_ptr(block) };

    // Block size is the bookkeeping unit for zeroing (spec.md §9, "Zeroing
    // cost"): a case-3 split may leave `data_block_size` slightly larger
    // than `req`, and those extra bytes are zeroed too, preserving I1/I6's
    // view of the block as the unit of account.
    unsafe { core::ptr::write_bytes(payload.as_ptr(), 0u8, block.as_ref().data_block_size) };

    m.stats.on_block_allocated(req);
    Ok(payload.as_ptr())
}

/// Picks the largest free block for `descriptor` (the free chain's head),
/// or maps a fresh data page and uses its full-capacity first block, per
/// spec.md §4.5 step 3.
unsafe fn acquire_candidate(
    m: &mut Manager,
    mut descriptor: NonNull<RecordDescriptor>,
    req: usize,
    capacity: usize,
) -> Result<NonNull<BlockHeader>, AllocError> {
    if let Some(link) = descriptor.as_ref().free_chain.head() {
        let block = BlockHeader::from_link(link);
        if block.as_ref().data_block_size >= req {
            descriptor.as_mut().free_chain.remove(link);
            return Ok(block);
        }
    }

    let base = crate::os::request_pages(1, m.page_size).ok_or(AllocError::OutOfMemory)?;
    let page = base.cast::<DataPageHeader>();
    let old_head = descriptor.as_ref().data_pages;
    page.as_ptr().write(DataPageHeader {
        record: descriptor,
        prev: None,
        next: old_head,
        first_block: BlockHeader::new(DataPageHeader::header_offset(), capacity),
    });
    if let Some(mut old) = old_head {
        old.as_mut().prev = Some(page);
    }
    descriptor.as_mut().data_pages = Some(page);
    m.stats.on_data_page_mapped(m.page_size);

    Ok(DataPageHeader::first_block_ptr(page))
}

/// The four-case split protocol (spec.md §4.5.1). `block` is already
/// removed from the free chain; on return it is marked allocated with
/// `data_block_size == req`, and any soft/full-split remainder has been
/// spliced into the intra-page chain and the free chain.
unsafe fn split_block(mut block: NonNull<BlockHeader>, req: usize) -> NonNull<BlockHeader> {
    let s = size_of::<BlockHeader>();
    let old_size = block.as_ref().data_block_size;
    debug_assert!(req <= old_size);

    block.as_mut().is_free = false;
    block.as_mut().data_block_size = req;

    let rem = old_size - req;
    // Case 1 (`rem == 0`) and case 3 (`rem <= S`, hard internal
    // fragmentation) create nothing: case 3's slack bytes are invisible
    // until the free engine re-absorbs them (spec.md §4.6 step 2). Cases 2
    // and 4 (`rem > S`) are behaviourally identical — the split below
    // covers both.
    if rem > s {
        let new_size = rem - s;
        let offset = block.as_ref().offset + s + req;
        let mut new_block = BlockHeader::next_by_size(block).cast::<BlockHeader>();
        let old_next = block.as_ref().next;

        new_block.as_ptr().write(BlockHeader::new(offset, new_size));
        new_block.as_mut().prev = Some(block);
        new_block.as_mut().next = old_next;
        if let Some(mut n) = old_next {
            n.as_mut().prev = Some(new_block);
        }
        block.as_mut().next = Some(new_block);

        let mut record = BlockHeader::page_of(block).as_ref().record;
        record
            .as_mut()
            .free_chain
            .priority_insert(BlockHeader::link_ptr(new_block), crate::page::free_chain_order);
    }

    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;

    #[test]
    fn split_full_split_creates_remainder_block() {
        let mut m = Manager::new(ManagerConfig::default());
        m.registry
            .register("emp", 100, m.page_size, m.config.max_struct_name_size, &mut m.stats)
            .unwrap();
        let p = xcalloc(&mut m, "emp", 1).unwrap();
        assert!(!p.is_null());
        let descriptor = m.registry.lookup("emp", m.config.max_struct_name_size).unwrap();
        unsafe {
            let head = descriptor.as_ref().free_chain.head().unwrap();
            let block = BlockHeader::from_link(head);
            let capacity = payload_capacity(m.page_size);
            assert_eq!(block.as_ref().data_block_size, capacity - 100 - size_of::<BlockHeader>());
        }
    }

    #[test]
    fn not_registered_is_rejected() {
        let mut m = Manager::new(ManagerConfig::default());
        let err = xcalloc(&mut m, "ghost", 1).unwrap_err();
        assert_eq!(err, AllocError::NotRegistered("ghost".to_string()));
    }

    #[test]
    fn oversized_request_is_rejected() {
        let mut m = Manager::new(ManagerConfig::default());
        m.registry
            .register("big", 2000, m.page_size, m.config.max_struct_name_size, &mut m.stats)
            .unwrap();
        let capacity = payload_capacity(m.page_size);
        let units = (capacity / 2000 + 2) as u32;
        let err = xcalloc(&mut m, "big", units).unwrap_err();
        assert!(matches!(err, AllocError::RequestTooLarge { .. }));
    }
}
