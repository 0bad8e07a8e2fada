pub mod monitor;

pub use monitor::ThermalMonitor;
