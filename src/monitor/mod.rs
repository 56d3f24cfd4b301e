pub mod timeout;

pub use timeout::{ScanReport, TimeoutMonitor, TimeoutMonitorConfig};
