// src/reporters/json.rs
// JSON-lines reporter for machine consumption

use serde_json::json;
use std::io::Write;
use tracing::warn;

use super::Reporter;
use crate::harness::outcome::{Outcome, RunSummary};

/// One JSON object per line: `section`, `outcome`, then `summary`
pub struct JsonReporter<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, value: serde_json::Value) {
        if let Err(e) = writeln!(self.out, "{}", value).and_then(|_| self.out.flush()) {
            warn!("failed to write report: {}", e);
        }
    }
}

impl<W: Write + Send> Reporter for JsonReporter<W> {
    fn section(&mut self, title: &str) {
        self.emit(json!({ "event": "section", "title": title }));
    }

    fn outcome(&mut self, outcome: &Outcome) {
        let mut value = json!({ "event": "outcome" });
        if let (Some(obj), Ok(serde_json::Value::Object(fields))) =
            (value.as_object_mut(), serde_json::to_value(outcome))
        {
            obj.extend(fields);
        }
        self.emit(value);
    }

    fn finish(&mut self, summary: &RunSummary, guidance: &[String]) {
        self.emit(json!({
            "event": "summary",
            "total": summary.total(),
            "passed": summary.passed,
            "failed": summary.failed,
            "duration_ms": summary.duration.as_millis() as u64,
            "guidance": guidance,
        }));
    }
}
