//! Record Registry (spec.md §4.3): maps a record name to its descriptor.
//! Descriptors live inside OS pages chained into a registry spine, so
//! registration bookkeeping never depends on this allocator itself or on
//! a generic one (spec.md §4.3 rationale).

use crate::error::RegisterError;
use crate::intrusive_list::List;
use crate::page::{payload_capacity, DataPageHeader};
use crate::stats::Stats;
use core::mem::size_of;
use core::ptr::NonNull;

/// Bounded length of a registered record's name (spec.md §6).
pub const MAX_STRUCT_NAME_SIZE: usize = 32;

/// A registered record type (spec.md §3 "Record descriptor").
#[repr(C)]
pub struct RecordDescriptor {
    name: [u8; MAX_STRUCT_NAME_SIZE],
    name_len: u8,
    pub element_size: usize,
    /// Head of this record's data-page list.
    pub data_pages: Option<NonNull<DataPageHeader>>,
    /// Head of this record's free-block priority chain (I4).
    pub free_chain: List,
}

impl RecordDescriptor {
    fn write_name(&mut self, name: &str, cap: usize) {
        let bytes = name.as_bytes();
        let n = bytes.len().min(cap).min(MAX_STRUCT_NAME_SIZE);
        self.name[..n].copy_from_slice(&bytes[..n]);
        self.name[n..].fill(0);
        self.name_len = n as u8;
    }

    pub fn name(&self) -> &str {
        core::str::from_utf8(&self.name[..self.name_len as usize]).unwrap_or("")
    }

    fn matches(&self, other: &str, cap: usize) -> bool {
        let limit = cap.min(MAX_STRUCT_NAME_SIZE);
        let other_bytes = other.as_bytes();
        let other_n = other_bytes.len().min(limit);
        &self.name[..self.name_len as usize] == &other_bytes[..other_n]
    }
}

/// Header of one OS page in the registry spine: a next-pointer followed by
/// a fixed-capacity array of [`RecordDescriptor`]s (spec.md §3 "Registry
/// page").
#[repr(C)]
struct RegistryPageHeader {
    next: Option<NonNull<RegistryPageHeader>>,
    len: usize,
}

fn capacity_per_page(page_size: usize) -> usize {
    (page_size - size_of::<RegistryPageHeader>()) / size_of::<RecordDescriptor>()
}

unsafe fn descriptor_ptr(page: NonNull<RegistryPageHeader>, index: usize) -> NonNull<RecordDescriptor> {
    let base = page.as_ptr() as *mut u8;
    let start = base.add(size_of::<RegistryPageHeader>());
    NonNull::new_unchecked(start.add(index * size_of::<RecordDescriptor>()) as *mut RecordDescriptor)
}

/// The registry spine plus its per-page descriptor capacity (derived from
/// the OS page size, spec.md §6).
pub struct Registry {
    head: Option<NonNull<RegistryPageHeader>>,
    capacity_per_page: usize,
}

impl Registry {
    pub const fn new() -> Self {
        Self {
            head: None,
            capacity_per_page: 0,
        }
    }

    pub fn init(&mut self, page_size: usize) {
        self.capacity_per_page = capacity_per_page(page_size);
        debug_assert!(self.capacity_per_page > 0, "page too small to hold a single record descriptor");
    }

    /// Linear scan of the spine, bounded-name comparison (spec.md §4.3).
    pub fn lookup(&self, name: &str, max_struct_name_size: usize) -> Option<NonNull<RecordDescriptor>> {
        let mut cursor = self.head;
        while let Some(page) = cursor {
            let len = unsafe { page.as_ref().len };
            for i in 0..len {
                let d = unsafe { descriptor_ptr(page, i) };
                if unsafe { d.as_ref().matches(name, max_struct_name_size) } {
                    return Some(d);
                }
            }
            cursor = unsafe { page.as_ref().next };
        }
        None
    }

    pub fn register(
        &mut self,
        name: &str,
        size: usize,
        page_size: usize,
        max_struct_name_size: usize,
        stats: &mut Stats,
    ) -> Result<NonNull<RecordDescriptor>, RegisterError> {
        if self.lookup(name, max_struct_name_size).is_some() {
            return Err(RegisterError::Duplicate(name.to_string()));
        }
        let capacity = payload_capacity(page_size);
        if size > capacity {
            return Err(RegisterError::ElementTooLarge { size, capacity });
        }

        let needs_new_page = match self.head {
            Some(page) => unsafe { page.as_ref().len } >= self.capacity_per_page,
            None => true,
        };
        if needs_new_page {
            let base = crate::os::request_pages(1, page_size)
                .expect("out of memory while growing the record registry");
            let page = base.cast::<RegistryPageHeader>();
            unsafe {
                page.as_ptr().write(RegistryPageHeader {
                    next: self.head,
                    len: 0,
                });
            }
            self.head = Some(page);
            stats.on_registry_page_mapped();
        }

        let page = self.head.unwrap();
        let idx = unsafe { page.as_ref().len };
        let slot = unsafe { descriptor_ptr(page, idx) };
        unsafe {
            slot.as_ptr().write(RecordDescriptor {
                name: [0; MAX_STRUCT_NAME_SIZE],
                name_len: 0,
                element_size: size,
                data_pages: None,
                free_chain: List::new(),
            });
            (*slot.as_ptr()).write_name(name, max_struct_name_size);
            (*page.as_ptr()).len += 1;
        }
        stats.on_record_registered();
        Ok(slot)
    }

    /// Iterates every registered descriptor across the whole spine, in
    /// registration order within a page (diagnostics only).
    pub fn iter(&self) -> impl Iterator<Item = NonNull<RecordDescriptor>> + '_ {
        RegistryIter {
            cursor: self.head,
            index: 0,
        }
    }
}

struct RegistryIter {
    cursor: Option<NonNull<RegistryPageHeader>>,
    index: usize,
}

impl Iterator for RegistryIter {
    type Item = NonNull<RecordDescriptor>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let page = self.cursor?;
            let len = unsafe { page.as_ref().len };
            if self.index < len {
                let d = unsafe { descriptor_ptr(page, self.index) };
                self.index += 1;
                return Some(d);
            }
            self.cursor = unsafe { page.as_ref().next };
            self.index = 0;
        }
    }
}
