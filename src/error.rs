use thiserror::Error;

/// Failure modes of [`crate::register`].
///
/// Mirrors the `{0, -1, -2}` sentinel contract of the original design as a
/// typed enum instead of magic numbers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegisterError {
    /// `size` exceeds what a single fresh page can hold for this record
    /// (sentinel `-1`).
    #[error("element size {size} exceeds the page payload capacity ({capacity})")]
    ElementTooLarge { size: usize, capacity: usize },

    /// A descriptor with this name already exists in the registry
    /// (sentinel `-2`).
    #[error("a record named {0:?} is already registered")]
    Duplicate(String),
}

/// Failure modes of [`crate::xcalloc`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// No record with this name has been registered.
    #[error("no record named {0:?} is registered")]
    NotRegistered(String),

    /// `units * element_size` exceeds the page payload capacity, or the
    /// multiplication overflows `usize`.
    #[error("requested {requested} bytes exceeds the page payload capacity ({capacity})")]
    RequestTooLarge { requested: usize, capacity: usize },

    /// The OS refused to map a fresh data page.
    #[error("out of memory: failed to map a new data page")]
    OutOfMemory,
}
