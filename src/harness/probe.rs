// src/harness/probe.rs
// Probe definitions: one named network check plus its expectation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::expectation::Expectation;
use crate::config::helpers::secs_to_duration;

/// A single configured check against the system under test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Probe {
    /// Unique name within a run, printed on the verdict line
    pub name: String,

    /// What to do on the wire
    #[serde(flatten)]
    pub kind: ProbeKind,

    /// Overrides the kind's default timeout (seconds)
    #[serde(default)]
    pub timeout_seconds: Option<f64>,

    /// Success predicate; defaults per action when omitted
    #[serde(default)]
    pub expect: Option<Expectation>,

    /// Detail shown instead of the computed one when the probe passes
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    Http(HttpAction),
    Websocket(WsAction),
}

/// HTTP request description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpAction {
    #[serde(default = "default_method")]
    pub method: String,

    /// Absolute URL, or a path appended to the configured base URL
    pub path: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Explicit basic-auth credentials
    #[serde(default)]
    pub basic_auth: Option<BasicAuth>,

    /// Use the credentials from the harness configuration
    #[serde(default)]
    pub use_credentials: bool,

    /// JSON request body
    #[serde(default)]
    pub json: Option<serde_json::Value>,

    /// Raw request body, ignored when `json` is set
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// WebSocket step description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsAction {
    /// Target for standalone probes; defaults to the configured WebSocket URL
    #[serde(default)]
    pub url: Option<String>,

    #[serde(flatten)]
    pub step: WsStep,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WsStep {
    /// Confirm the connection is open
    Connect,
    /// Send one JSON text frame
    Send { message: serde_json::Value },
    /// Wait for one incoming frame
    Receive,
}

impl Probe {
    pub fn http(name: &str, action: HttpAction) -> Self {
        Self {
            name: name.to_string(),
            kind: ProbeKind::Http(action),
            timeout_seconds: None,
            expect: None,
            note: None,
        }
    }

    pub fn websocket(name: &str, step: WsStep) -> Self {
        Self {
            name: name.to_string(),
            kind: ProbeKind::Websocket(WsAction { url: None, step }),
            timeout_seconds: None,
            expect: None,
            note: None,
        }
    }

    pub fn with_expectation(mut self, expect: Expectation) -> Self {
        self.expect = Some(expect);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_seconds = Some(timeout.as_secs_f64());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// The probe's own timeout, or the kind default
    pub fn timeout(&self, default: Duration) -> Duration {
        self.timeout_seconds.and_then(secs_to_duration).unwrap_or(default)
    }

    /// The configured expectation, or the default for this action
    pub fn expectation(&self) -> Expectation {
        if let Some(ref expect) = self.expect {
            return expect.clone();
        }
        match &self.kind {
            ProbeKind::Http(_) => Expectation::Status { code: 200 },
            ProbeKind::Websocket(ws) => match ws.step {
                WsStep::Connect => Expectation::Connected,
                WsStep::Send { .. } => Expectation::Sent,
                WsStep::Receive => Expectation::Message,
            },
        }
    }

    pub fn is_websocket(&self) -> bool {
        matches!(self.kind, ProbeKind::Websocket(_))
    }
}

impl HttpAction {
    pub fn get(path: &str) -> Self {
        Self {
            method: default_method(),
            path: path.to_string(),
            headers: BTreeMap::new(),
            basic_auth: None,
            use_credentials: false,
            json: None,
            body: None,
        }
    }

    pub fn post_json(path: &str, json: serde_json::Value) -> Self {
        Self {
            method: "POST".to_string(),
            json: Some(json),
            ..Self::get(path)
        }
    }
}

/// Probes sharing one WebSocket connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeGroup {
    /// Label used in logs
    pub name: String,

    /// Defaults to the configured WebSocket URL
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub connect_timeout_seconds: Option<f64>,

    /// Executed in order on the shared connection
    pub probes: Vec<Probe>,
}

impl ProbeGroup {
    pub fn connect_timeout(&self, default: Duration) -> Duration {
        self.connect_timeout_seconds.and_then(secs_to_duration).unwrap_or(default)
    }
}
