//! Immutable views handed to readers.

use crate::domain::{AccessPoints, Flow, Link, Service};
use crate::filter::Filters;

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FrameSnapshot {
    pub services: Vec<Arc<Service>>,

    /// Only links with both endpoints present.
    pub links: Vec<Arc<Link>>,

    /// Links held back until their endpoints show up.
    pub pending_links: usize,

    pub flows: Vec<Arc<Flow>>,
    pub access_points: AccessPoints,
    pub active_services: Vec<String>,

    /// Card caption per service id.
    pub captions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TotalsView {
    pub services: usize,
    pub links: usize,
    pub flows: usize,
}

/// What readers of the engine see after each applied command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreSnapshot {
    /// Bumped by every reset of the current frame.
    pub generation: u64,
    pub namespaces: Vec<String>,
    pub filters: Filters,
    pub current: FrameSnapshot,
    /// Flows of the current frame that the flow log shows.
    pub visible_flows: usize,
    pub global: TotalsView,
}
