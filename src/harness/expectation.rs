// src/harness/expectation.rs
// Success predicates evaluated against observed network results

use serde::{Deserialize, Serialize};

use super::outcome::{snippet, ErrorKind, Verdict};
use crate::error::ProbeError;

const DETAIL_CHARS: usize = 200;

/// What a network action produced, before it is judged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Http { status: u16, body: String },
    Connected,
    Sent,
    Message(String),
    /// Receive window elapsed without a frame
    Silence,
}

/// Types of expectations a probe can carry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expectation {
    // HTTP expectations
    Status {
        code: u16,
    },
    StatusIn {
        codes: Vec<u16>,
    },
    Json {
        #[serde(default = "default_ok")]
        status: u16,
        /// Top-level fields that must be present
        #[serde(default)]
        fields: Vec<String>,
        /// Field whose number (or array length) is reported as "Found N"
        #[serde(default)]
        count_field: Option<String>,
        #[serde(default)]
        noun: Option<String>,
    },

    // WebSocket expectations
    Connected,
    Sent,
    Message,
    JsonMessage {
        #[serde(default)]
        fields: Vec<String>,
    },
    NoMessage,
    /// The connection attempt itself must fail
    Refused,
}

fn default_ok() -> u16 {
    200
}

impl Expectation {
    /// Judge the result of a network action.
    ///
    /// Every path yields a verdict; transport errors become failures
    /// (or a pass, for `Refused`).
    pub fn evaluate(&self, result: Result<Observation, ProbeError>) -> Verdict {
        match result {
            Ok(observation) => self.check(&observation),
            Err(err) => match self {
                Expectation::Refused if err.kind() == ErrorKind::ConnectionError => {
                    Verdict::pass(format!("Connection refused as expected: {}", err))
                }
                _ => Verdict::fail(err.kind(), err.to_string()),
            },
        }
    }

    /// Check this expectation against an observation
    pub fn check(&self, observation: &Observation) -> Verdict {
        match (self, observation) {
            (Expectation::Status { code }, Observation::Http { status, body }) => {
                check_status(&[*code], *status, body)
            }

            (Expectation::StatusIn { codes }, Observation::Http { status, body }) => {
                check_status(codes, *status, body)
            }

            (
                Expectation::Json { status: expected, fields, count_field, noun },
                Observation::Http { status, body },
            ) => {
                let verdict = check_status(&[*expected], *status, body);
                if !verdict.succeeded {
                    return verdict;
                }
                let value: serde_json::Value = match serde_json::from_str(body) {
                    Ok(v) => v,
                    Err(e) => {
                        return Verdict::fail(
                            ErrorKind::DecodeError,
                            format!("Response is not valid JSON ({}): {}", e, snippet(body, DETAIL_CHARS)),
                        );
                    }
                };
                if let Some(missing) = missing_field(&value, fields) {
                    return Verdict::fail(
                        ErrorKind::DecodeError,
                        format!("Response is missing field '{}': {}", missing, snippet(body, DETAIL_CHARS)),
                    );
                }
                match count_field {
                    Some(field) => Verdict::pass(format!(
                        "Found {} {}",
                        count_of(&value, field),
                        noun.as_deref().unwrap_or("items")
                    )),
                    None => Verdict::pass(format!("Status: {}", status)),
                }
            }

            (Expectation::Connected, Observation::Connected) => Verdict::pass("Connected successfully"),
            (Expectation::Sent, Observation::Sent) => Verdict::pass("Message sent successfully"),

            (Expectation::Message, Observation::Message(text)) => {
                Verdict::pass(format!("Received: {}", snippet(text, DETAIL_CHARS)))
            }

            (Expectation::JsonMessage { fields }, Observation::Message(text)) => {
                let value: serde_json::Value = match serde_json::from_str(text) {
                    Ok(v) => v,
                    Err(e) => {
                        return Verdict::fail(
                            ErrorKind::DecodeError,
                            format!("Message is not valid JSON ({}): {}", e, snippet(text, DETAIL_CHARS)),
                        );
                    }
                };
                match missing_field(&value, fields) {
                    Some(missing) => Verdict::fail(
                        ErrorKind::DecodeError,
                        format!("Message is missing field '{}': {}", missing, snippet(text, DETAIL_CHARS)),
                    ),
                    None => Verdict::pass(format!("Received: {}", value)),
                }
            }

            (Expectation::Message | Expectation::JsonMessage { .. }, Observation::Silence) => {
                Verdict::fail(ErrorKind::Timeout, "no response received")
            }

            (Expectation::NoMessage, Observation::Silence) => {
                Verdict::pass("No message received, as expected")
            }
            (Expectation::NoMessage, Observation::Message(text)) => Verdict::fail(
                ErrorKind::UnexpectedSuccess,
                format!("Expected silence, received: {}", snippet(text, DETAIL_CHARS)),
            ),

            (Expectation::Refused, Observation::Connected) => {
                Verdict::fail(ErrorKind::UnexpectedSuccess, "Connection was accepted but should have been refused")
            }

            (expectation, observation) => Verdict::fail(
                ErrorKind::UnexpectedFailure,
                format!("Expectation {:?} cannot judge {}", expectation, describe(observation)),
            ),
        }
    }
}

/// Compare an observed status against the accepted set.
///
/// Expecting only error statuses makes this a negative test: a success
/// there is `unexpected-success`, a different error `unexpected-failure`.
fn check_status(codes: &[u16], status: u16, body: &str) -> Verdict {
    if codes.contains(&status) {
        let negative = status >= 400;
        return if negative {
            Verdict::pass(format!("Status: {} (expected)", status))
        } else {
            Verdict::pass(format!("Status: {}", status))
        };
    }

    let expected = codes
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" or ");
    let mut detail = format!("Expected {}, got {}", expected, status);
    if !body.trim().is_empty() {
        detail.push_str(". Response: ");
        detail.push_str(&snippet(body, DETAIL_CHARS));
    }
    let negative_test = !codes.is_empty() && codes.iter().all(|c| *c >= 400);

    let kind = if !negative_test {
        ErrorKind::UnexpectedStatus
    } else if status < 400 {
        ErrorKind::UnexpectedSuccess
    } else {
        ErrorKind::UnexpectedFailure
    };
    Verdict::fail(kind, detail)
}

fn missing_field<'a>(value: &serde_json::Value, fields: &'a [String]) -> Option<&'a str> {
    fields
        .iter()
        .find(|f| value.get(f.as_str()).is_none())
        .map(|f| f.as_str())
}

fn count_of(value: &serde_json::Value, field: &str) -> u64 {
    match value.get(field) {
        Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(serde_json::Value::Array(items)) => items.len() as u64,
        _ => 0,
    }
}

fn describe(observation: &Observation) -> String {
    match observation {
        Observation::Http { status, .. } => format!("HTTP status {}", status),
        Observation::Connected => "an open connection".to_string(),
        Observation::Sent => "a sent message".to_string(),
        Observation::Message(_) => "a received message".to_string(),
        Observation::Silence => "silence".to_string(),
    }
}
