// src/plans/mod.rs
// Probe plan definitions and parsing

pub mod parser;
pub mod types;

pub use parser::PlanParser;
pub use types::{Entry, ProbePlan, Section};
