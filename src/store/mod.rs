//! Durable state stores.
//!
//! Every store exposes conditional-update operations guarded on the row's
//! current status. Those guards are the entire correctness mechanism for the
//! exactly-once resume invariant: duplicate expiry attempts, racing
//! classifier matches, and late cancellations all serialize through them, so
//! no in-memory lock is shared across service instances.

pub mod execution;
pub mod interaction;
pub mod pause;
pub mod response;

pub use execution::{ExecutionStore, MemoryExecutionStore};
pub use interaction::{FileInteractionStore, InteractionStore, MemoryInteractionStore};
pub use pause::{FilePauseStore, MemoryPauseStore, PauseStore};
pub use response::{MemoryResponseStore, ResponseStore};
