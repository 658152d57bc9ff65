// src/harness/mod.rs
// Probe model, network executors and the runner

pub mod expectation;
pub mod http;
pub mod outcome;
pub mod probe;
pub mod runner;
pub mod ws;

pub use expectation::{Expectation, Observation};
pub use outcome::{ErrorKind, Outcome, RunSummary, Verdict};
pub use probe::{BasicAuth, HttpAction, Probe, ProbeGroup, ProbeKind, WsAction, WsStep};
pub use runner::ProbeRunner;
pub use ws::{Channel, Connector, WsConnector};
