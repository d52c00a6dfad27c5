//! Diagnostics (spec.md §6): observational dumps over the live registry and
//! page state. Nothing here mutates a [`Manager`]; it only walks the same
//! structures [`crate::alloc`]/[`crate::free`] maintain.

use crate::page::{payload_capacity, BlockHeader, DataPageHeader};
use crate::Manager;

pub(crate) fn print_registered_records(m: &mut Manager) {
    println!("registered records:");
    for d in m.registry.iter() {
        let d = unsafe { d.as_ref() };
        println!("  {:<32} element_size={}", d.name(), d.element_size);
    }
}

pub(crate) fn print_memory_usage(m: &mut Manager, name: Option<&str>) {
    let capacity = payload_capacity(m.page_size);
    for d in m.registry.iter() {
        let descriptor = unsafe { d.as_ref() };
        if let Some(name) = name {
            if descriptor.name() != name {
                continue;
            }
        }

        let mut pages = 0usize;
        let mut free_bytes = 0usize;
        let mut cursor = descriptor.data_pages;
        while let Some(page) = cursor {
            pages += 1;
            let mut block = Some(unsafe { DataPageHeader::first_block_ptr(page) });
            while let Some(b) = block {
                let b = unsafe { b.as_ref() };
                if b.is_free {
                    free_bytes += b.data_block_size;
                }
                block = b.next;
            }
            cursor = unsafe { page.as_ref().next };
        }
        let used_bytes = pages * capacity - free_bytes;
        println!(
            "  {:<32} pages={} used_bytes={} free_bytes={}",
            descriptor.name(),
            pages,
            used_bytes,
            free_bytes
        );
    }
}

pub(crate) fn print_block_usage(m: &mut Manager) {
    for d in m.registry.iter() {
        let descriptor = unsafe { d.as_ref() };
        let mut cursor = descriptor.data_pages;
        let mut page_no = 0usize;
        while let Some(page) = cursor {
            println!("  {} page #{}:", descriptor.name(), page_no);
            let mut block = Some(unsafe { DataPageHeader::first_block_ptr(page) });
            while let Some(b) = block {
                print_block(b);
                block = unsafe { b.as_ref().next };
            }
            page_no += 1;
            cursor = unsafe { page.as_ref().next };
        }
    }
}

fn print_block(b: core::ptr::NonNull<BlockHeader>) {
    let b = unsafe { b.as_ref() };
    println!(
        "      offset={:<8} size={:<8} {}",
        b.offset,
        b.data_block_size,
        if b.is_free { "free" } else { "used" }
    );
}
