// src/harness/runner.rs
// Probe execution engine

use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::expectation::Observation;
use super::outcome::{ErrorKind, Outcome, RunSummary, Verdict};
use super::probe::{Probe, ProbeGroup, ProbeKind, WsAction, WsStep};
use super::ws::{self, Channel, Connector, WsConnector};
use super::http;
use crate::config::HarnessConfig;
use crate::error::{ProbeError, ProbeResult};
use crate::plans::types::{Entry, ProbePlan, Section};
use crate::reporters::Reporter;

/// Executes probe plans against the system under test
pub struct ProbeRunner {
    config: HarnessConfig,
    http: Client,
    connector: Arc<dyn Connector>,
}

impl ProbeRunner {
    pub fn new(config: HarnessConfig) -> ProbeResult<Self> {
        let http = http::build_client(&config)?;
        Ok(Self {
            config,
            http,
            connector: Arc::new(WsConnector),
        })
    }

    /// Replace the WebSocket connector
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run every plan in order, streaming each outcome to the reporter.
    ///
    /// A failing probe never stops the run; the summary is always rendered.
    pub async fn run(&self, plans: &[ProbePlan], reporter: &mut dyn Reporter) -> RunSummary {
        let start = Instant::now();
        let mut summary = RunSummary::new();
        let mut guidance = Vec::new();

        for plan in plans {
            info!("Running plan: {} ({} probes)", plan.name, plan.probe_count());
            for section in &plan.sections {
                reporter.section(&section.title);
                self.run_section(section, reporter, &mut summary).await;
            }
            guidance.extend(plan.guidance.iter().cloned());
        }

        summary.duration = start.elapsed();
        info!(
            "Run completed: {} passed, {} failed ({}ms)",
            summary.passed,
            summary.failed,
            summary.duration.as_millis()
        );
        reporter.finish(&summary, &guidance);
        summary
    }

    async fn run_section(&self, section: &Section, reporter: &mut dyn Reporter, summary: &mut RunSummary) {
        let mut batch: Vec<&Probe> = Vec::new();

        for entry in &section.entries {
            match entry {
                Entry::Probe(probe) => batch.push(probe),
                Entry::Group(group) => {
                    self.run_batch(&batch, reporter, summary).await;
                    batch.clear();
                    self.run_group(group, reporter, summary).await;
                }
            }
        }

        self.run_batch(&batch, reporter, summary).await;
    }

    /// Standalone probes. With parallelism enabled they overlap, but
    /// `buffered` yields outcomes in the configured order.
    async fn run_batch(&self, probes: &[&Probe], reporter: &mut dyn Reporter, summary: &mut RunSummary) {
        if probes.is_empty() {
            return;
        }

        let concurrency = self.config.concurrency();
        if concurrency > 1 {
            debug!("Dispatching {} probes (max concurrency: {})", probes.len(), concurrency);
        }

        let pending: Vec<_> = probes.iter().map(|probe| self.run_probe(probe)).collect();
        let mut outcomes = stream::iter(pending).buffered(concurrency);

        while let Some(outcome) = outcomes.next().await {
            reporter.outcome(&outcome);
            summary.record(outcome);
        }
    }

    /// Run one self-contained probe. WebSocket probes get a private
    /// connection that is closed before returning.
    pub async fn run_probe(&self, probe: &Probe) -> Outcome {
        info!("Running probe: {}", probe.name);
        let start = Instant::now();

        let result = match probe.kind {
            ProbeKind::Http(ref action) => {
                let timeout = probe.timeout(self.config.http_timeout);
                http::execute(&self.http, &self.config, action, timeout).await
            }
            ProbeKind::Websocket(ref action) => {
                let timeout = probe.timeout(self.config.ws_timeout);
                self.run_standalone_ws(action, timeout).await
            }
        };

        let verdict = probe.expectation().evaluate(result);
        finish(probe, verdict, start.elapsed())
    }

    async fn run_standalone_ws(&self, action: &WsAction, timeout: Duration) -> ProbeResult<Observation> {
        let url = self.config.resolve_ws(action.url.as_deref())?;
        let connect_timeout = match action.step {
            WsStep::Connect => timeout,
            _ => self.config.connect_timeout,
        };

        let mut channel = self.connector.connect(&url, connect_timeout).await?;
        let result = perform_step(channel.as_mut(), &action.step, timeout).await;
        close_channel(channel.as_mut(), &url).await;
        result
    }

    /// Run a connection-scoped group: open once, run every step in order
    /// on that connection, close exactly once afterwards.
    async fn run_group(&self, group: &ProbeGroup, reporter: &mut dyn Reporter, summary: &mut RunSummary) {
        info!("Running group: {} ({} probes)", group.name, group.probes.len());

        let connect_timeout = group.connect_timeout(self.config.connect_timeout);
        let start = Instant::now();
        let mut connection = match self.config.resolve_ws(group.url.as_deref()) {
            Ok(url) => self.connector.connect(&url, connect_timeout).await,
            Err(e) => Err(e),
        };
        let connect_elapsed = start.elapsed();

        if let Err(ref e) = connection {
            warn!("Group '{}' could not connect: {}", group.name, e);
        }

        for probe in &group.probes {
            let outcome = match connection {
                Ok(ref mut channel) => group_step(probe, channel.as_mut(), self.config.ws_timeout, connect_elapsed).await,
                Err(ref err) => unavailable(probe, err, connect_elapsed),
            };
            reporter.outcome(&outcome);
            summary.record(outcome);
        }

        if let Ok(mut channel) = connection {
            close_channel(channel.as_mut(), &group.name).await;
        }
    }
}

/// One step on a group's shared connection
async fn group_step(probe: &Probe, channel: &mut dyn Channel, default_timeout: Duration, connect_elapsed: Duration) -> Outcome {
    info!("Running probe: {}", probe.name);
    let expectation = probe.expectation();

    let step = match probe.kind {
        ProbeKind::Websocket(ref action) => &action.step,
        ProbeKind::Http(_) => {
            return Outcome::failed(
                &probe.name,
                ErrorKind::UnexpectedFailure,
                "HTTP probes cannot run on a WebSocket connection",
                Duration::ZERO,
            );
        }
    };

    // The connection already exists; report how long opening it took
    if let WsStep::Connect = step {
        return finish(probe, expectation.evaluate(Ok(Observation::Connected)), connect_elapsed);
    }

    let start = Instant::now();
    let result = perform_step(channel, step, probe.timeout(default_timeout)).await;
    finish(probe, expectation.evaluate(result), start.elapsed())
}

/// Outcome for a group step whose connection never opened
fn unavailable(probe: &Probe, err: &ProbeError, connect_elapsed: Duration) -> Outcome {
    let verdict = match probe.kind {
        ProbeKind::Websocket(WsAction { step: WsStep::Connect, .. }) => {
            probe.expectation().evaluate(Err(err.clone()))
        }
        _ => Verdict::fail(ErrorKind::ConnectionError, format!("Connection unavailable: {}", err)),
    };
    finish(probe, verdict, connect_elapsed)
}

async fn perform_step(channel: &mut dyn Channel, step: &WsStep, timeout: Duration) -> ProbeResult<Observation> {
    match step {
        WsStep::Connect => Ok(Observation::Connected),
        WsStep::Send { message } => tokio::time::timeout(timeout, ws::send_json(channel, message))
            .await
            .map_err(|_| ProbeError::Timeout(timeout))?,
        WsStep::Receive => ws::receive(channel, timeout).await,
    }
}

async fn close_channel(channel: &mut dyn Channel, label: &str) {
    match channel.close().await {
        Ok(()) => debug!("Closed connection for {}", label),
        Err(e) => warn!("Closing connection for {} failed: {}", label, e),
    }
}

/// Attach timing and the probe's pass note
fn finish(probe: &Probe, mut verdict: Verdict, elapsed: Duration) -> Outcome {
    if verdict.succeeded {
        if let Some(ref note) = probe.note {
            verdict.detail = note.clone();
        }
    }

    info!(
        "Probe '{}' completed: {} ({}ms)",
        probe.name,
        if verdict.succeeded { "PASS" } else { "FAIL" },
        elapsed.as_millis()
    );

    Outcome::from_verdict(&probe.name, verdict, elapsed)
}
