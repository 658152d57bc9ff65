// src/config/mod.rs
// Harness configuration: target URLs, timeouts, credentials

pub mod helpers;

use std::time::Duration;
use url::Url;

use crate::error::{ProbeError, ProbeResult};
use crate::harness::probe::BasicAuth;
use helpers::{env_bool, env_opt, env_or, env_secs, env_usize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_WS_URL: &str = "ws://localhost:8000/ws/auction-updates/";

/// Fixed for the lifetime of a run and handed to the runner at construction
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Base for relative HTTP probe paths
    pub base_url: String,

    /// Default WebSocket target
    pub ws_url: String,

    /// Network-layer connect timeout (HTTP and WebSocket handshakes)
    pub connect_timeout: Duration,

    /// Default response timeout for HTTP probes
    pub http_timeout: Duration,

    /// Default wait for WebSocket steps
    pub ws_timeout: Duration,

    /// Used by probes with `use_credentials`
    pub credentials: Option<BasicAuth>,

    /// Dispatch consecutive standalone probes concurrently
    pub parallel: bool,

    /// Maximum in-flight probes when parallel (0 = unlimited)
    pub max_parallel: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            connect_timeout: Duration::from_secs(5),
            http_timeout: Duration::from_secs(10),
            ws_timeout: Duration::from_secs(5),
            credentials: None,
            parallel: false,
            max_parallel: 4,
        }
    }
}

impl HarnessConfig {
    /// Load from the environment (and `.env` if present)
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let credentials = env_opt("PROBE_USERNAME").map(|username| BasicAuth {
            username,
            password: env_opt("PROBE_PASSWORD"),
        });

        Self {
            base_url: env_or("PROBE_BASE_URL", DEFAULT_BASE_URL),
            ws_url: env_or("PROBE_WS_URL", DEFAULT_WS_URL),
            connect_timeout: env_secs("PROBE_CONNECT_TIMEOUT_SECS", defaults.connect_timeout),
            http_timeout: env_secs("PROBE_HTTP_TIMEOUT_SECS", defaults.http_timeout),
            ws_timeout: env_secs("PROBE_WS_TIMEOUT_SECS", defaults.ws_timeout),
            credentials,
            parallel: env_bool("PROBE_PARALLEL", defaults.parallel),
            max_parallel: env_usize("PROBE_MAX_PARALLEL", defaults.max_parallel),
        }
    }

    /// Resolve an HTTP probe target. Relative paths are appended to the
    /// base URL so a base such as `http://host/api` keeps its prefix.
    pub fn resolve_http(&self, target: &str) -> ProbeResult<Url> {
        let joined = if is_absolute(target, &["http://", "https://"]) {
            target.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                target.trim_start_matches('/')
            )
        };
        Url::parse(&joined).map_err(|e| ProbeError::invalid_target(format!("{}: {}", joined, e)))
    }

    /// Resolve a WebSocket target, falling back to the configured URL
    pub fn resolve_ws(&self, target: Option<&str>) -> ProbeResult<String> {
        let url = target.unwrap_or(&self.ws_url);
        if !is_absolute(url, &["ws://", "wss://"]) {
            return Err(ProbeError::invalid_target(format!(
                "{}: WebSocket targets must start with ws:// or wss://",
                url
            )));
        }
        Url::parse(url).map_err(|e| ProbeError::invalid_target(format!("{}: {}", url, e)))?;
        Ok(url.to_string())
    }

    /// Upper bound on concurrently running standalone probes
    pub fn concurrency(&self) -> usize {
        if !self.parallel {
            1
        } else if self.max_parallel == 0 {
            usize::MAX
        } else {
            self.max_parallel
        }
    }
}

fn is_absolute(target: &str, schemes: &[&str]) -> bool {
    let lower = target.to_ascii_lowercase();
    schemes.iter().any(|s| lower.starts_with(s))
}
