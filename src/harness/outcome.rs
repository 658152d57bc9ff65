// src/harness/outcome.rs
// Probe outcomes and the per-run summary

use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Why a probe failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    ConnectionError,
    Timeout,
    DecodeError,
    UnexpectedStatus,
    UnexpectedSuccess,
    UnexpectedFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConnectionError => "connection-error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::DecodeError => "decode-error",
            ErrorKind::UnexpectedStatus => "unexpected-status",
            ErrorKind::UnexpectedSuccess => "unexpected-success",
            ErrorKind::UnexpectedFailure => "unexpected-failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Judgement of an observation against an expectation, before timing is attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub succeeded: bool,
    pub detail: String,
    pub error_kind: Option<ErrorKind>,
}

impl Verdict {
    pub fn pass(detail: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            detail: detail.into(),
            error_kind: None,
        }
    }

    pub fn fail(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            detail: detail.into(),
            error_kind: Some(kind),
        }
    }
}

/// Recorded result of executing one probe
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub probe_name: String,
    pub succeeded: bool,
    pub detail: String,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl Outcome {
    pub fn from_verdict(probe_name: &str, verdict: Verdict, elapsed: Duration) -> Self {
        Self {
            probe_name: probe_name.to_string(),
            succeeded: verdict.succeeded,
            detail: verdict.detail,
            elapsed,
            error_kind: verdict.error_kind,
        }
    }

    pub fn failed(probe_name: &str, kind: ErrorKind, detail: impl Into<String>, elapsed: Duration) -> Self {
        Self::from_verdict(probe_name, Verdict::fail(kind, detail), elapsed)
    }
}

fn serialize_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(elapsed.as_millis() as u64)
}

/// Aggregate of every outcome in one invocation
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: Vec<Outcome>,
    pub passed: usize,
    pub failed: usize,
    pub duration: Duration,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: Outcome) {
        if outcome.succeeded {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.outcomes.push(outcome);
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn get(&self, probe_name: &str) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.probe_name == probe_name)
    }
}

/// Shorten text for a detail line without splitting a character
pub fn snippet(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut short: String = trimmed.chars().take(max_chars).collect();
    short.push_str("...");
    short
}
