// src/harness/http.rs
// HTTP probe execution over reqwest

use reqwest::{Client, Method};
use std::time::Duration;
use tracing::debug;

use super::expectation::Observation;
use super::probe::HttpAction;
use crate::config::HarnessConfig;
use crate::error::{ProbeError, ProbeResult};

/// Build the shared client. The connect timeout is network-layer and
/// independent of each probe's response timeout.
pub fn build_client(config: &HarnessConfig) -> ProbeResult<Client> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .user_agent(concat!("endpoint-check/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ProbeError::from)
}

/// Issue one request and capture its status and body. Never retried.
pub async fn execute(
    client: &Client,
    config: &HarnessConfig,
    action: &HttpAction,
    timeout: Duration,
) -> ProbeResult<Observation> {
    let url = config.resolve_http(&action.path)?;
    let method = Method::from_bytes(action.method.to_uppercase().as_bytes())
        .map_err(|_| ProbeError::invalid_target(format!("unknown HTTP method '{}'", action.method)))?;

    debug!("[http] {} {}", method, url);

    let mut request = client.request(method, url).timeout(timeout);

    for (name, value) in &action.headers {
        request = request.header(name.as_str(), value.as_str());
    }

    if let Some(ref auth) = action.basic_auth {
        request = request.basic_auth(&auth.username, auth.password.as_deref());
    } else if action.use_credentials {
        match config.credentials {
            Some(ref creds) => {
                request = request.basic_auth(&creds.username, creds.password.as_deref());
            }
            None => debug!("[http] use_credentials set but no credentials configured"),
        }
    }

    if let Some(ref json) = action.json {
        request = request.json(json);
    } else if let Some(ref body) = action.body {
        request = request.body(body.clone());
    }

    let response = request.send().await.map_err(|e| map_send_error(e, timeout))?;
    let status = response.status().as_u16();
    let body = response.text().await.map_err(|e| map_send_error(e, timeout))?;

    debug!("[http] status {} ({} bytes)", status, body.len());

    Ok(Observation::Http { status, body })
}

fn map_send_error(err: reqwest::Error, timeout: Duration) -> ProbeError {
    if err.is_timeout() {
        ProbeError::Timeout(timeout)
    } else {
        ProbeError::from(err)
    }
}
