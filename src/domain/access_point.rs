//! Access points: where traffic enters a service card.
//!
//! They are never ingested directly; a frame derives them from its links.

use crate::domain::flow::L4Protocol;

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AccessPoint {
    pub service_id: String,
    pub port: u16,
    pub protocol: L4Protocol,
}

impl AccessPoint {
    pub fn id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AccessPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.service_id, self.port, self.protocol)
    }
}

/// Access points grouped by owning service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AccessPoints(BTreeMap<String, BTreeSet<AccessPoint>>);

impl AccessPoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ap: AccessPoint) -> bool {
        self.0.entry(ap.service_id.clone()).or_default().insert(ap)
    }

    pub fn for_service(&self, service_id: &str) -> impl Iterator<Item = &AccessPoint> {
        self.0.get(service_id).into_iter().flatten()
    }

    pub fn contains(&self, ap: &AccessPoint) -> bool {
        self.0
            .get(&ap.service_id)
            .map(|set| set.contains(ap))
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccessPoint> {
        self.0.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.0.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}
