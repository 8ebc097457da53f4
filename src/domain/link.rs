use crate::domain::flow::{L4Protocol, Verdict};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Service-to-service edge, aggregated over the flows that used it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub source_id: String,

    #[serde(default)]
    pub destination_id: String,

    #[serde(default)]
    pub destination_port: u16,

    #[serde(default = "default_protocol")]
    pub protocol: L4Protocol,

    /// Every verdict observed on this edge.
    #[serde(default)]
    pub verdicts: BTreeSet<Verdict>,
}

fn default_protocol() -> L4Protocol {
    L4Protocol::Tcp
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkKey {
    pub source_id: String,
    pub destination_id: String,
    pub destination_port: u16,
    pub protocol: L4Protocol,
}

impl Link {
    pub fn new(
        source_id: impl Into<String>,
        destination_id: impl Into<String>,
        destination_port: u16,
        protocol: L4Protocol,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            destination_id: destination_id.into(),
            destination_port,
            protocol,
            verdicts: BTreeSet::new(),
        }
    }

    pub fn with_verdicts(mut self, verdicts: impl IntoIterator<Item = Verdict>) -> Self {
        self.verdicts = verdicts.into_iter().collect();
        self
    }

    pub fn key(&self) -> LinkKey {
        LinkKey {
            source_id: self.source_id.clone(),
            destination_id: self.destination_id.clone(),
            destination_port: self.destination_port,
            protocol: self.protocol,
        }
    }

    pub fn touches(&self, service_id: &str) -> bool {
        self.source_id == service_id || self.destination_id == service_id
    }
}
