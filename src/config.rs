//! Tunables for a [`crate::Manager`] instance.
//!
//! The fixed constants from spec.md §6 (`MAX_STRUCT_NAME_SIZE`, the
//! per-registry-page descriptor capacity) stay fixed at the values spec.md
//! gives as examples; this config only lets a caller pick a *shorter*
//! effective name cap, the one knob that can vary without touching the
//! in-page layout.

use crate::registry::MAX_STRUCT_NAME_SIZE;

/// Construction-time tunables for a [`crate::Manager`].
#[derive(Debug, Clone, Copy)]
pub struct ManagerConfig {
    /// Names longer than this are truncated when registering a record.
    /// Must be `<= MAX_STRUCT_NAME_SIZE`.
    pub max_struct_name_size: usize,
}

impl ManagerConfig {
    pub const fn new(max_struct_name_size: usize) -> Self {
        Self {
            max_struct_name_size,
        }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_struct_name_size: MAX_STRUCT_NAME_SIZE,
        }
    }
}
