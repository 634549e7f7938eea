pub mod config;
pub mod format;
pub mod monitor;
pub mod query;
pub mod scheduler;
pub mod system;

pub use monitor::{Monitor, MonitorOptions};
