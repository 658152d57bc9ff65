// src/reporters/mod.rs
// Streaming result reporters for different output formats

pub mod console;
pub mod json;

use std::io::Write;

use crate::harness::outcome::{Outcome, RunSummary};

/// Output format for probe results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Console,
    Json,
}

/// Receives events in execution order and renders them immediately
pub trait Reporter: Send {
    /// A banner grouping the probes that follow
    fn section(&mut self, title: &str);

    /// One verdict, emitted as soon as the probe finishes
    fn outcome(&mut self, outcome: &Outcome);

    /// Closing summary plus advisory guidance for the operator
    fn finish(&mut self, summary: &RunSummary, guidance: &[String]);
}

/// Get a reporter for the given format writing to `out`
pub fn get_reporter(format: OutputFormat, out: Box<dyn Write + Send>, colors: bool) -> Box<dyn Reporter> {
    match format {
        OutputFormat::Console => Box::new(ConsoleReporter::new(out, colors)),
        OutputFormat::Json => Box::new(JsonReporter::new(out)),
    }
}

pub use console::ConsoleReporter;
pub use json::JsonReporter;
