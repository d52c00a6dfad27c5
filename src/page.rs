//! Data Page & Block Layout (spec.md §4.4): the in-page layout shared by
//! every data page a record owns, and the address arithmetic the
//! allocation/free engines use to walk it.
//!
//! ```text
//! [record-back-pointer | prev-page | next-page | FIRST BLOCK HEADER ...... payload ...... END]
//! ```
//!
//! The first block header is physically embedded in the page header, so a
//! fresh page's arena (header bytes + payload) runs exactly from that
//! field to the page's end (I1). `PAGE_PAYLOAD_CAPACITY` (see
//! [`payload_capacity`]) is defined as `page_size - header_offset -
//! size_of::<BlockHeader>()` — subtracting the first block's own header
//! bytes, not just its offset — which is the reading of spec.md §4.4/§4.5
//! that keeps invariant I1 (exact arena coverage) satisfiable; see
//! DESIGN.md for why the literal `page_size - offset` phrasing in the spec
//! text is ambiguous on this point.

use crate::intrusive_list::Link;
use crate::registry::RecordDescriptor;
use core::mem::size_of;
use core::ptr::NonNull;

/// A block header, inline with its payload (spec.md §3 "Block header").
#[repr(C)]
pub struct BlockHeader {
    pub is_free: bool,
    pub data_block_size: usize,
    /// Byte offset from the page base to this header (diagnostic, and used
    /// by [`page_of`] to recover the owning page from a freed pointer).
    pub offset: usize,
    /// Intra-page neighbours, in address order (I2).
    pub prev: Option<NonNull<BlockHeader>>,
    pub next: Option<NonNull<BlockHeader>>,
    /// Glue node threading this block into its record's free chain while
    /// `is_free` is set (I4).
    pub glue: Link,
}

impl BlockHeader {
    pub const fn new(offset: usize, data_block_size: usize) -> Self {
        Self {
            is_free: true,
            data_block_size,
            offset,
            prev: None,
            next: None,
            glue: Link::new(),
        }
    }

    /// The physical next byte after this block's header+payload span:
    /// `next_by_size` of spec.md §4.4.
    ///
    /// # Safety
    /// `this` must point at a live `BlockHeader`.
    pub unsafe fn next_by_size(this: NonNull<BlockHeader>) -> NonNull<u8> {
        let base = this.as_ptr() as *mut u8;
        NonNull::new_unchecked(base.add(size_of::<BlockHeader>() + this.as_ref().data_block_size))
    }

    /// The owning page, recovered from `offset` (spec.md §4.4 `page_of`).
    ///
    /// # Safety
    /// `this` must point at a live `BlockHeader` with a correctly
    /// maintained `offset` field.
    pub unsafe fn page_of(this: NonNull<BlockHeader>) -> NonNull<DataPageHeader> {
        let base = this.as_ptr() as *mut u8;
        NonNull::new_unchecked(base.sub(this.as_ref().offset) as *mut DataPageHeader)
    }

    /// Pointer to the payload byte immediately after this header.
    ///
    /// # Safety
    /// `this` must point at a live `BlockHeader`.
    pub unsafe fn payload_ptr(this: NonNull<BlockHeader>) -> NonNull<u8> {
        NonNull::new_unchecked((this.as_ptr() as *mut u8).add(size_of::<BlockHeader>()))
    }

    /// Recovers the block header from a payload pointer previously handed
    /// out by `xcalloc`.
    ///
    /// # Safety
    /// `payload` must be exactly a pointer previously returned as the
    /// payload of some live `BlockHeader`.
    pub unsafe fn from_payload(payload: NonNull<u8>) -> NonNull<BlockHeader> {
        NonNull::new_unchecked(payload.as_ptr().sub(size_of::<BlockHeader>()) as *mut BlockHeader)
    }

    /// Pointer to this block's embedded glue node.
    ///
    /// # Safety
    /// `this` must point at a live `BlockHeader`.
    pub unsafe fn link_ptr(this: NonNull<BlockHeader>) -> NonNull<Link> {
        let base = this.as_ptr() as *mut u8;
        let offset = core::mem::offset_of!(BlockHeader, glue);
        NonNull::new_unchecked(base.add(offset) as *mut Link)
    }

    /// Recovers the hosting block header from one of its glue node.
    ///
    /// # Safety
    /// `link` must point at the `glue` field of a live `BlockHeader`.
    pub unsafe fn from_link(link: NonNull<Link>) -> NonNull<BlockHeader> {
        crate::container_of!(link.as_ptr(), BlockHeader, glue)
    }
}

/// A data page's header (spec.md §3 "Data page"), embedded at the base of
/// an OS page owned by exactly one record.
#[repr(C)]
pub struct DataPageHeader {
    pub record: NonNull<RecordDescriptor>,
    pub prev: Option<NonNull<DataPageHeader>>,
    pub next: Option<NonNull<DataPageHeader>>,
    pub first_block: BlockHeader,
}

impl DataPageHeader {
    /// Byte offset of the embedded first block header within the page
    /// header struct.
    pub fn header_offset() -> usize {
        core::mem::offset_of!(DataPageHeader, first_block)
    }

    /// Pointer to this page's base (== pointer to the header itself).
    pub fn base(this: NonNull<DataPageHeader>) -> NonNull<u8> {
        this.cast()
    }

    /// Pointer to the embedded first block header.
    ///
    /// # Safety
    /// `this` must point at a live `DataPageHeader`.
    pub unsafe fn first_block_ptr(this: NonNull<DataPageHeader>) -> NonNull<BlockHeader> {
        NonNull::new_unchecked(&mut (*this.as_ptr()).first_block as *mut BlockHeader)
    }

    /// A page is empty (I6) when its only block is the first block, free,
    /// with no intra-page neighbours — i.e. it spans the full payload
    /// capacity untouched.
    ///
    /// # Safety
    /// `this` must point at a live `DataPageHeader`.
    pub unsafe fn is_empty(this: NonNull<DataPageHeader>) -> bool {
        let first = Self::first_block_ptr(this);
        let first = first.as_ref();
        first.is_free && first.prev.is_none() && first.next.is_none()
    }
}

/// The payload capacity of a fresh page: `page_size` minus the header
/// region (back-pointers, prev/next links, and the first block's own
/// header bytes). A fresh page's first block's `data_block_size` is
/// exactly this value (spec.md §4.4), and `register`/`xcalloc` reject any
/// request that would not fit within it (I5, spec.md §4.5 step 2).
pub fn payload_capacity(page_size: usize) -> usize {
    page_size - DataPageHeader::header_offset() - size_of::<BlockHeader>()
}

/// The free-chain comparator (spec.md §4.2): ranks larger
/// `data_block_size` higher, so the chain's head is always the largest
/// free block (I4). Ties keep insertion order via [`List::priority_insert`].
pub fn free_chain_order(
    cur: NonNull<Link>,
    new: NonNull<Link>,
) -> core::cmp::Ordering {
    use core::cmp::Ordering;
    unsafe {
        let cur_size = BlockHeader::from_link(cur).as_ref().data_block_size;
        let new_size = BlockHeader::from_link(new).as_ref().data_block_size;
        if cur_size < new_size {
            Ordering::Greater
        } else {
            Ordering::Less
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_capacity_plus_header_bytes_fills_the_page() {
        let page_size = 4096;
        let cap = payload_capacity(page_size);
        assert_eq!(
            DataPageHeader::header_offset() + size_of::<BlockHeader>() + cap,
            page_size
        );
    }
}
