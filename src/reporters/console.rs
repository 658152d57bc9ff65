// src/reporters/console.rs
// Human-readable terminal reporter

use console::style;
use std::io::Write;
use tracing::warn;

use super::Reporter;
use crate::harness::outcome::{Outcome, RunSummary};

const RULE_WIDTH: usize = 60;
const DETAIL_INDENT: &str = "     ";

/// Renders one verdict line per outcome, plus an indented detail line
pub struct ConsoleReporter<W: Write + Send> {
    out: W,
    colors: bool,
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W, colors: bool) -> Self {
        Self { out, colors }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text).and_then(|_| self.out.flush()) {
            warn!("failed to write report: {}", e);
        }
    }
}

/// Section banner
pub fn format_banner(title: &str) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    format!("\n{}\n {}\n{}", rule, title, rule)
}

/// Verdict plus optional detail line. Identical for every probe kind.
pub fn format_outcome(outcome: &Outcome, colors: bool) -> String {
    let status = if outcome.succeeded { "PASS" } else { "FAIL" };
    let status = if !colors {
        status.to_string()
    } else if outcome.succeeded {
        style(status).green().bold().to_string()
    } else {
        style(status).red().bold().to_string()
    };

    let mut text = format!("{} {}", status, outcome.probe_name);

    let detail = match outcome.error_kind {
        Some(kind) if !outcome.succeeded => format!("[{}] {}", kind, outcome.detail),
        _ => outcome.detail.clone(),
    };
    if !detail.trim().is_empty() {
        text.push('\n');
        text.push_str(DETAIL_INDENT);
        text.push_str(&detail);
    }
    text
}

pub fn format_summary(summary: &RunSummary, guidance: &[String]) -> String {
    let mut lines = vec![format_banner("SUMMARY")];
    let total = summary.total();
    let pct = if total > 0 { summary.passed * 100 / total } else { 0 };

    lines.push(format!("Total:    {}", total));
    lines.push(format!("Passed:   {} ({}%)", summary.passed, pct));
    lines.push(format!("Failed:   {}", summary.failed));
    lines.push(format!("Duration: {}ms", summary.duration.as_millis()));

    if summary.failed > 0 {
        lines.push("RESULT: FAILED".to_string());
        let failed: Vec<&str> = summary
            .outcomes
            .iter()
            .filter(|o| !o.succeeded)
            .map(|o| o.probe_name.as_str())
            .collect();
        lines.push(format!("Failed probes: {}", failed.join(", ")));
    } else {
        lines.push("RESULT: PASSED".to_string());
    }

    if !guidance.is_empty() {
        lines.push(String::new());
        lines.push("Next steps:".to_string());
        for (i, step) in guidance.iter().enumerate() {
            lines.push(format!("  {}. {}", i + 1, step));
        }
    }

    lines.join("\n")
}

impl<W: Write + Send> Reporter for ConsoleReporter<W> {
    fn section(&mut self, title: &str) {
        let banner = format_banner(title);
        self.emit(&banner);
    }

    fn outcome(&mut self, outcome: &Outcome) {
        let line = format_outcome(outcome, self.colors);
        self.emit(&line);
    }

    fn finish(&mut self, summary: &RunSummary, guidance: &[String]) {
        let text = format_summary(summary, guidance);
        self.emit(&text);
    }
}
