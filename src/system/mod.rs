pub mod collector;
pub mod history;
pub mod kill;
pub mod platform;
pub mod process;
pub mod sampler;
pub mod session;
pub mod snapshot;
