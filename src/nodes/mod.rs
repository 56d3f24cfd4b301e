pub mod executor;
pub mod human_input;

pub use executor::{NodeExecutor, NodeExecutorRegistry};
pub use human_input::HumanInputExecutor;
