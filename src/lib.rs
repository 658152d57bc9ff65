// src/lib.rs

pub mod config;
pub mod error;
pub mod harness;
pub mod plans;
pub mod reporters;

// Export commonly used items
pub use config::HarnessConfig;
pub use error::{ProbeError, ProbeResult};
pub use harness::{Outcome, ProbeRunner, RunSummary};
