pub mod monitor;

pub use monitor::{PowerDomain, RaplData, RaplMonitor};
