// src/plans/types.rs
// Probe plan definitions

use serde::{Deserialize, Serialize};

use crate::harness::probe::{Probe, ProbeGroup};

/// A complete probe plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbePlan {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Executed in order, each under its own banner
    pub sections: Vec<Section>,

    /// Advisory next steps printed after the summary
    #[serde(default)]
    pub guidance: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub entries: Vec<Entry>,
}

/// Written in plans as a single-key map: `probe: {...}` or `group: {...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "EntryRepr", into = "EntryRepr")]
pub enum Entry {
    /// Self-contained check
    Probe(Probe),
    /// Several WebSocket steps on one connection
    Group(ProbeGroup),
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntryRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    probe: Option<Probe>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    group: Option<ProbeGroup>,
}

impl TryFrom<EntryRepr> for Entry {
    type Error = String;

    fn try_from(repr: EntryRepr) -> Result<Self, Self::Error> {
        match (repr.probe, repr.group) {
            (Some(probe), None) => Ok(Entry::Probe(probe)),
            (None, Some(group)) => Ok(Entry::Group(group)),
            (Some(probe), Some(_)) => Err(format!(
                "entry for '{}' sets both `probe` and `group`",
                probe.name
            )),
            (None, None) => Err("entry needs a `probe` or `group` key".to_string()),
        }
    }
}

impl From<Entry> for EntryRepr {
    fn from(entry: Entry) -> Self {
        match entry {
            Entry::Probe(probe) => Self { probe: Some(probe), group: None },
            Entry::Group(group) => Self { probe: None, group: Some(group) },
        }
    }
}

impl Entry {
    pub fn probes(&self) -> Vec<&Probe> {
        match self {
            Entry::Probe(p) => vec![p],
            Entry::Group(g) => g.probes.iter().collect(),
        }
    }
}

impl ProbePlan {
    /// Every probe in execution order
    pub fn probes(&self) -> impl Iterator<Item = &Probe> {
        self.sections
            .iter()
            .flat_map(|s| s.entries.iter())
            .flat_map(|e| e.probes())
    }

    pub fn probe_count(&self) -> usize {
        self.probes().count()
    }
}
