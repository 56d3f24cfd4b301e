pub mod service;

pub use service::{HilService, HilServiceBuilder, PausedNode};
