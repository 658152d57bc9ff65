// src/plans/parser.rs
// YAML plan parser and validation

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

use super::types::{Entry, ProbePlan, Section};
use crate::config::helpers::secs_to_duration;
use crate::harness::expectation::Expectation;
use crate::harness::probe::{Probe, ProbeKind, WsStep};

/// Plan run when no path is given
const BUILTIN_AUCTION_PLAN: &str = include_str!("../../plans/auction.yaml");

/// Parser for probe plan files
pub struct PlanParser;

impl PlanParser {
    /// Load plans from a file, a directory of YAML files, or the built-in plan
    pub fn load(path: Option<&Path>) -> Result<Vec<ProbePlan>> {
        let plans = match path {
            None => vec![Self::builtin()?],
            Some(p) if p.is_dir() => Self::parse_directory(p)?,
            Some(p) => vec![Self::parse_file(p)?],
        };
        Self::ensure_unique_names(&plans)?;
        Ok(plans)
    }

    /// The bundled auction integration plan
    pub fn builtin() -> Result<ProbePlan> {
        Self::parse_yaml(BUILTIN_AUCTION_PLAN).context("Built-in plan is invalid")
    }

    /// Parse a single plan file
    pub fn parse_file(path: &Path) -> Result<ProbePlan> {
        info!("Parsing plan file: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan file: {}", path.display()))?;

        Self::parse_yaml(&content)
            .with_context(|| format!("Failed to parse plan file: {}", path.display()))
    }

    /// Parse YAML content into a plan
    pub fn parse_yaml(content: &str) -> Result<ProbePlan> {
        let processed = Self::process_templates(content);

        let plan: ProbePlan = serde_yaml::from_str(&processed).context("Failed to parse YAML")?;

        Self::validate_plan(&plan)?;

        Ok(plan)
    }

    /// Substitute `{{uuid}}` and `{{timestamp}}` placeholders
    fn process_templates(content: &str) -> String {
        let mut result = content.to_string();

        while result.contains("{{uuid}}") {
            let uuid = uuid::Uuid::new_v4().to_string();
            result = result.replacen("{{uuid}}", &uuid, 1);
        }

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string();
        result.replace("{{timestamp}}", &timestamp)
    }

    /// Parse all plan files in a directory, sorted by plan name.
    /// Any file that fails to load fails the whole directory.
    pub fn parse_directory(dir: &Path) -> Result<Vec<ProbePlan>> {
        info!("Parsing plans from directory: {}", dir.display());

        let mut plans = Vec::new();
        let mut failures = Vec::new();

        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        {
            let path = entry?.path();
            let is_yaml = path
                .extension()
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false);
            if !is_yaml {
                continue;
            }
            match Self::parse_file(&path) {
                Ok(plan) => {
                    info!("Loaded plan: {}", plan.name);
                    plans.push(plan);
                }
                Err(e) => {
                    warn!("Failed to parse {}: {:#}", path.display(), e);
                    failures.push(format!("{:#}", e));
                }
            }
        }

        if !failures.is_empty() {
            failures.sort();
            anyhow::bail!(
                "{} plan file(s) in {} failed to load:\n  {}",
                failures.len(),
                dir.display(),
                failures.join("\n  ")
            );
        }

        plans.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(plans)
    }

    /// Probe names must be unique across everything in one run
    pub fn ensure_unique_names(plans: &[ProbePlan]) -> Result<()> {
        let mut seen = HashSet::new();
        for probe in plans.iter().flat_map(|p| p.probes()) {
            if !seen.insert(probe.name.as_str()) {
                anyhow::bail!("Duplicate probe name '{}'", probe.name);
            }
        }
        Ok(())
    }

    /// Keep only sections whose title contains `pattern` (case-insensitive).
    /// Plans left without sections are dropped.
    pub fn filter_by_section(plans: Vec<ProbePlan>, pattern: &str) -> Vec<ProbePlan> {
        if pattern.is_empty() || pattern == "*" {
            return plans;
        }

        let pattern_lower = pattern.to_lowercase();
        plans
            .into_iter()
            .filter_map(|mut plan| {
                plan.sections
                    .retain(|s| s.title.to_lowercase().contains(&pattern_lower));
                (!plan.sections.is_empty()).then_some(plan)
            })
            .collect()
    }

    /// Validate a parsed plan
    fn validate_plan(plan: &ProbePlan) -> Result<()> {
        if plan.name.trim().is_empty() {
            anyhow::bail!("Plan name cannot be empty");
        }

        if plan.sections.is_empty() {
            anyhow::bail!("Plan must have at least one section");
        }

        for section in &plan.sections {
            Self::validate_section(section)?;
        }

        Self::ensure_unique_names(std::slice::from_ref(plan))
    }

    fn validate_section(section: &Section) -> Result<()> {
        if section.title.trim().is_empty() {
            anyhow::bail!("Section title cannot be empty");
        }
        if section.entries.is_empty() {
            anyhow::bail!("Section '{}' has no entries", section.title);
        }

        for entry in &section.entries {
            match entry {
                Entry::Probe(probe) => Self::validate_probe(probe)?,
                Entry::Group(group) => {
                    if group.probes.is_empty() {
                        anyhow::bail!("Group '{}' has no probes", group.name);
                    }
                    if let Some(secs) = group.connect_timeout_seconds {
                        if secs_to_duration(secs).is_none() {
                            anyhow::bail!("Group '{}' has invalid connect timeout {}", group.name, secs);
                        }
                    }
                    if let Some(ref url) = group.url {
                        Self::validate_ws_url(url)
                            .with_context(|| format!("Group '{}'", group.name))?;
                    }
                    for probe in &group.probes {
                        match probe.kind {
                            ProbeKind::Websocket(ref ws) if ws.url.is_some() => anyhow::bail!(
                                "Probe '{}' sets its own url inside group '{}'; the group owns the connection",
                                probe.name,
                                group.name
                            ),
                            ProbeKind::Websocket(_) => {}
                            ProbeKind::Http(_) => anyhow::bail!(
                                "Probe '{}' in group '{}' must be a websocket probe",
                                probe.name,
                                group.name
                            ),
                        }
                        Self::validate_probe(probe)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_probe(probe: &Probe) -> Result<()> {
        if probe.name.trim().is_empty() {
            anyhow::bail!("Probe has empty name");
        }

        if let Some(secs) = probe.timeout_seconds {
            if secs_to_duration(secs).is_none() {
                anyhow::bail!("Probe '{}' has invalid timeout {}", probe.name, secs);
            }
        }

        let expectation = probe.expectation();
        match probe.kind {
            ProbeKind::Http(ref http) => {
                if reqwest::Method::from_bytes(http.method.to_uppercase().as_bytes()).is_err() {
                    anyhow::bail!("Probe '{}' has invalid method '{}'", probe.name, http.method);
                }
                if http.path.trim().is_empty() {
                    anyhow::bail!("Probe '{}' has empty path", probe.name);
                }
                if let Expectation::StatusIn { ref codes } = expectation {
                    if codes.is_empty() {
                        anyhow::bail!("Probe '{}' expects an empty status list", probe.name);
                    }
                }
                if !is_http_expectation(&expectation) {
                    anyhow::bail!("Probe '{}' uses a websocket expectation on an HTTP request", probe.name);
                }
            }
            ProbeKind::Websocket(ref ws) => {
                if let Some(ref url) = ws.url {
                    Self::validate_ws_url(url).with_context(|| format!("Probe '{}'", probe.name))?;
                }
                if !ws_expectation_fits(&ws.step, &expectation) {
                    anyhow::bail!(
                        "Probe '{}' expectation {:?} does not fit its websocket action",
                        probe.name,
                        expectation
                    );
                }
            }
        }
        Ok(())
    }

    fn validate_ws_url(url: &str) -> Result<()> {
        let lower = url.to_ascii_lowercase();
        if !(lower.starts_with("ws://") || lower.starts_with("wss://")) {
            anyhow::bail!("WebSocket url '{}' must start with ws:// or wss://", url);
        }
        url::Url::parse(url).with_context(|| format!("Invalid url '{}'", url))?;
        Ok(())
    }
}

fn is_http_expectation(expectation: &Expectation) -> bool {
    matches!(
        expectation,
        Expectation::Status { .. } | Expectation::StatusIn { .. } | Expectation::Json { .. }
    )
}

fn ws_expectation_fits(step: &WsStep, expectation: &Expectation) -> bool {
    match step {
        WsStep::Connect => matches!(expectation, Expectation::Connected | Expectation::Refused),
        WsStep::Send { .. } => matches!(expectation, Expectation::Sent),
        WsStep::Receive => matches!(
            expectation,
            Expectation::Message | Expectation::JsonMessage { .. } | Expectation::NoMessage
        ),
    }
}
