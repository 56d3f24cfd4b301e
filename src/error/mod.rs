//! Error types for the pause/resume engine.
//!
//! - [`HilError`] — Errors raised while executing a human-input node,
//!   classifying a response, or driving a resume.
//! - [`StoreError`] — Errors raised by the durable state stores.

pub mod hil_error;
pub mod store_error;

pub use hil_error::HilError;
pub use store_error::StoreError;

/// Convenience alias for engine-level results.
pub type HilResult<T> = Result<T, HilError>;
/// Convenience alias for store-level results.
pub type StoreResult<T> = Result<T, StoreError>;
