//! The Page Gateway (spec.md §4.1): the only place this crate talks to the
//! OS's virtual-memory mapping primitive. Everything above this module
//! deals in whole, zero-filled, read-write pages; nothing below it knows
//! about records, blocks, or free chains.
//!
//! Grounded on the teacher's `src/os.rs` (`os_mem_alloc`/`os_mem_free`,
//! `os_page_size`, the `cfg(windows)` / `cfg(not(windows))` split), trimmed
//! to exactly the map-whole/unmap-whole contract spec.md §4.1 needs: no
//! aligned overallocation, no reset/commit/decommit/protect, no large
//! pages, and no executable permission (design notes, spec.md §9, flag the
//! latter as unnecessary for a data allocator).

use core::ptr::NonNull;
use log::warn;

#[cfg(unix)]
mod imp {
    use super::*;
    use libc::{c_void, mmap, munmap, MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE};

    pub fn page_size() -> usize {
        let n = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if n > 0 {
            n as usize
        } else {
            4096
        }
    }

    /// # Safety
    /// `size` must be a positive multiple of the OS page size.
    pub unsafe fn map(size: usize) -> Option<NonNull<u8>> {
        let p = mmap(
            core::ptr::null_mut(),
            size,
            PROT_READ | PROT_WRITE,
            MAP_PRIVATE | MAP_ANONYMOUS,
            -1,
            0,
        );
        if p == MAP_FAILED {
            warn!(
                "mmap failed: {}, size {}",
                std::io::Error::last_os_error(),
                size
            );
            None
        } else {
            // anonymous mmap is guaranteed zero-filled by the kernel.
            Some(NonNull::new_unchecked(p as *mut u8))
        }
    }

    /// # Safety
    /// `base` must be exactly the pointer returned by a prior [`map`] call
    /// of the same `size`, not yet unmapped.
    pub unsafe fn unmap(base: NonNull<u8>, size: usize) {
        if munmap(base.as_ptr() as *mut c_void, size) != 0 {
            warn!(
                "munmap failed: {}, addr {:p}, size {}",
                std::io::Error::last_os_error(),
                base.as_ptr(),
                size
            );
        }
    }
}

#[cfg(windows)]
mod imp {
    use super::*;
    use std::mem::MaybeUninit;
    use winapi::um::memoryapi::{VirtualAlloc, VirtualFree};
    use winapi::um::sysinfoapi::{GetSystemInfo, LPSYSTEM_INFO, SYSTEM_INFO};
    use winapi::um::winnt::{MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_READWRITE};

    pub fn page_size() -> usize {
        unsafe {
            let mut si = MaybeUninit::<SYSTEM_INFO>::zeroed();
            GetSystemInfo(si.as_mut_ptr() as LPSYSTEM_INFO);
            let si = si.assume_init();
            if si.dwPageSize > 0 {
                si.dwPageSize as usize
            } else {
                4096
            }
        }
    }

    /// # Safety
    /// `size` must be a positive multiple of the OS page size.
    pub unsafe fn map(size: usize) -> Option<NonNull<u8>> {
        let p = VirtualAlloc(
            core::ptr::null_mut(),
            size,
            MEM_RESERVE | MEM_COMMIT,
            PAGE_READWRITE,
        );
        if p.is_null() {
            warn!(
                "VirtualAlloc failed: {}, size {}",
                std::io::Error::last_os_error(),
                size
            );
            None
        } else {
            // committed pages from VirtualAlloc are guaranteed zero-filled.
            Some(NonNull::new_unchecked(p as *mut u8))
        }
    }

    /// # Safety
    /// `base` must be exactly the pointer returned by a prior [`map`] call,
    /// not yet freed.
    pub unsafe fn unmap(base: NonNull<u8>, _size: usize) {
        if VirtualFree(base.as_ptr() as _, 0, MEM_RELEASE) == 0 {
            warn!(
                "VirtualFree failed: {}, addr {:p}",
                std::io::Error::last_os_error(),
                base.as_ptr()
            );
        }
    }
}

/// The OS page size, read fresh each call (cheap `sysconf`/`GetSystemInfo`
/// lookup; [`crate::Manager`] caches it once at construction).
pub fn page_size() -> usize {
    imp::page_size()
}

/// Maps `n` contiguous, zero-filled, read+write, private anonymous pages.
/// Returns `None` if the OS refuses the mapping (out-of-memory).
pub fn request_pages(n: usize, page_size: usize) -> Option<NonNull<u8>> {
    debug_assert!(n > 0);
    let size = n.checked_mul(page_size)?;
    unsafe { imp::map(size) }
}

/// Unmaps `n` pages at `base`.
///
/// # Safety
/// `base` must be exactly the pointer returned by the matching
/// [`request_pages`] call, and the region must not have been unmapped
/// already.
pub unsafe fn release_pages(base: NonNull<u8>, n: usize, page_size: usize) {
    imp::unmap(base, n * page_size);
}
