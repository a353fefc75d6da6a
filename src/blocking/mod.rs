pub mod gate;
pub mod hosts;
pub mod processes;

pub use gate::{BlockingGate, DEFAULT_SWEEP_INTERVAL};
pub use hosts::HostsFile;
