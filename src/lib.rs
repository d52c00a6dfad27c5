//! A page-backed, per-record dynamic memory manager (spec.md §1-2).
//!
//! Callers first [`register`] a named record type with a fixed element
//! size, then [`xcalloc`]/[`xfree`] arrays of that element. Storage is
//! backed by whole OS pages ([`os`]) carved into variable-sized blocks
//! ([`page`]) tracked per record in a largest-free-block-first chain
//! ([`alloc`], [`free`]); registration bookkeeping lives in its own
//! page-resident spine ([`registry`]).
//!
//! There is no internal locking (spec.md §5): a [`Manager`] is confined to
//! one [`std::thread::LocalKey`] slot, so two logical executors never touch
//! the same one.

mod alloc;
pub mod config;
mod diag;
pub mod error;
mod free;
mod intrusive_list;
mod os;
mod page;
mod registry;
mod stats;

pub use config::ManagerConfig;
pub use error::{AllocError, RegisterError};
pub use registry::MAX_STRUCT_NAME_SIZE;

use core::cell::RefCell;
use registry::Registry;
use stats::Stats;

/// Owns everything one logical executor needs: the cached OS page size, the
/// record registry spine, and usage counters. Never shared across threads
/// (spec.md §5, §9 "Global state").
pub(crate) struct Manager {
    pub(crate) page_size: usize,
    pub(crate) config: ManagerConfig,
    pub(crate) registry: Registry,
    pub(crate) stats: Stats,
}

impl Manager {
    pub(crate) fn new(config: ManagerConfig) -> Self {
        let page_size = os::page_size();
        let mut registry = Registry::new();
        registry.init(page_size);
        Self {
            page_size,
            config,
            registry,
            stats: Stats::new(),
        }
    }
}

thread_local! {
    static MANAGER: RefCell<Option<Manager>> = RefCell::new(None);
}

fn with_manager<R>(f: impl FnOnce(&mut Manager) -> R) -> R {
    MANAGER.with(|cell| {
        let mut slot = cell.borrow_mut();
        let manager = slot
            .as_mut()
            .expect("recordalloc: call init() before using this thread's allocator");
        f(manager)
    })
}

/// Initializes this thread's allocator with default tunables. Idempotent:
/// calling it again resets the thread's state to a fresh, empty [`Manager`],
/// dropping every previously registered record and mapped page reference
/// (the underlying OS pages are leaked, matching spec.md's no-reclaim-at-
/// shutdown design note, spec.md §9).
pub fn init() {
    init_with_config(ManagerConfig::default());
}

/// Like [`init`], but with caller-supplied [`ManagerConfig`] tunables.
pub fn init_with_config(config: ManagerConfig) {
    MANAGER.with(|cell| {
        *cell.borrow_mut() = Some(Manager::new(config));
    });
}

/// Registers a new record type (spec.md §4.3).
///
/// # Panics
/// If [`init`] has not been called on this thread.
pub fn register(name: &str, size: usize) -> Result<(), RegisterError> {
    with_manager(|m| {
        let page_size = m.page_size;
        let max_struct_name_size = m.config.max_struct_name_size;
        m.registry
            .register(name, size, page_size, max_struct_name_size, &mut m.stats)
            .map(|_| ())
    })
}

/// Allocates a zeroed array of `units` elements of the named record
/// (spec.md §4.5).
///
/// # Panics
/// If [`init`] has not been called on this thread.
pub fn xcalloc(name: &str, units: u32) -> Result<*mut u8, AllocError> {
    with_manager(|m| alloc::xcalloc(m, name, units))
}

/// Releases an array previously returned by [`xcalloc`] on this same
/// thread (spec.md §4.6).
///
/// # Safety
/// `payload` must be exactly a pointer previously returned by [`xcalloc`]
/// on this thread's allocator, not yet freed.
///
/// # Panics
/// If [`init`] has not been called on this thread.
pub unsafe fn xfree(payload: *mut u8) {
    with_manager(|m| free::xfree(m, payload))
}

/// Prints every registered record's name and element size (spec.md §6).
///
/// # Panics
/// If [`init`] has not been called on this thread.
pub fn print_registered_records() {
    with_manager(diag::print_registered_records);
}

/// Prints page/byte usage for one record, or every record if `name` is
/// `None` (spec.md §6).
///
/// # Panics
/// If [`init`] has not been called on this thread.
pub fn print_memory_usage(name: Option<&str>) {
    with_manager(|m| diag::print_memory_usage(m, name));
}

/// Prints every live block across every record's pages, free or allocated
/// (spec.md §6).
///
/// # Panics
/// If [`init`] has not been called on this thread.
pub fn print_block_usage() {
    with_manager(diag::print_block_usage);
}
