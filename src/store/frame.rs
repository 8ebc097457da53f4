//! One consistent view of the graph: services, links, flows and what is
//! derived from them.
//!
//! Every mutating call finishes its own bookkeeping (registries, access
//! points) before publishing its notification.

use crate::domain::{AccessPoints, ChangeKind, Flow, FlowKey, Link, Service};
use crate::filter::Filters;
use crate::store::bus::{Notification, NotificationBus, NotificationReceiver};
use crate::store::flows::FlowRegistry;
use crate::store::registry::Registry;
use crate::store::snapshot::FrameSnapshot;

use std::sync::Arc;

#[derive(Debug)]
pub struct Frame {
    services: Registry<Service>,
    links: Registry<Link>,
    flows: FlowRegistry,
    access_points: AccessPoints,
    bus: NotificationBus,
}

impl Frame {
    pub fn new(flow_capacity: usize) -> Self {
        Self {
            services: Registry::new(),
            links: Registry::new(),
            flows: FlowRegistry::new(flow_capacity),
            access_points: AccessPoints::new(),
            bus: NotificationBus::new(),
        }
    }

    pub fn subscribe(&mut self) -> NotificationReceiver {
        self.bus.subscribe()
    }

    pub fn services(&self) -> &Registry<Service> {
        &self.services
    }

    pub fn links(&self) -> &Registry<Link> {
        &self.links
    }

    pub fn flows(&self) -> &FlowRegistry {
        &self.flows
    }

    pub fn access_points(&self) -> &AccessPoints {
        &self.access_points
    }

    pub fn service_by_id(&self, id: &str) -> Option<&Arc<Service>> {
        self.services.by_id(id)
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.links.is_empty() && self.flows.is_empty()
    }

    /// Links whose two endpoints are known. The rest wait, unrendered.
    pub fn rendered_links(&self) -> impl Iterator<Item = &Arc<Link>> {
        self.links.iter().filter(|l| self.is_rendered(l))
    }

    pub fn is_rendered(&self, link: &Link) -> bool {
        self.services.contains(link.source_id.as_str())
            && self.services.contains(link.destination_id.as_str())
    }

    pub fn set_services(&mut self, services: Vec<Arc<Service>>) {
        self.services.set(services.iter().cloned());
        self.refresh_access_points();
        self.bus.publish(Notification::ServicesSet(services));
    }

    pub fn set_links(&mut self, links: Vec<Arc<Link>>) {
        self.links.set(links.iter().cloned());
        self.refresh_access_points();
        for link in links {
            self.bus
                .publish(Notification::LinkChanged(link, ChangeKind::Added));
        }
    }

    pub fn set_flows(&mut self, flows: Vec<Arc<Flow>>, sort: bool) {
        self.flows.set_flows(flows, sort);
        let held: Vec<Arc<Flow>> = self.flows.iter().cloned().collect();
        self.bus.publish(Notification::FlowsAdded(held));
    }

    pub fn apply_service_change(&mut self, svc: Arc<Service>, change: ChangeKind) {
        self.services.apply(svc.clone(), change);
        self.refresh_access_points();
        self.bus.publish(Notification::ServiceChange(svc, change));
    }

    pub fn apply_service_link_change(&mut self, link: Arc<Link>, change: ChangeKind) {
        self.links.apply(link.clone(), change);
        self.refresh_access_points();
        self.bus.publish(Notification::LinkChanged(link, change));
    }

    /// Returns how many flows were genuinely new.
    pub fn add_flows(&mut self, flows: Vec<Arc<Flow>>) -> usize {
        let added = self.flows.add_flows(flows);
        let count = added.len();
        if count > 0 {
            self.bus.publish(Notification::FlowsAdded(added));
        }
        count
    }

    /// Forget flows older than `key`, as eviction does. Nothing is published.
    pub fn trim_flows_before(&mut self, key: &FlowKey) -> usize {
        self.flows.evict_before(key)
    }

    /// Back to empty. Subscribers stay subscribed.
    pub fn flush(&mut self) {
        self.services.clear();
        self.links.clear();
        self.flows.clear();
        self.access_points.clear();
    }

    pub fn toggle_active_service(&mut self, id: &str) -> bool {
        self.services.toggle_active(&id.to_string())
    }

    pub fn set_active_state(&mut self, id: &str, active: bool) -> bool {
        self.services.set_active_state(&id.to_string(), active)
    }

    pub fn clear_active(&mut self) {
        self.services.clear_active();
    }

    /// Rebuild this frame from `source` under `filters`.
    ///
    /// - services: admitted one by one (everything when nothing filters)
    /// - links: admitted when both endpoints were admitted and the link
    ///   itself passes
    /// - flows: admitted on their own predicates, regardless of services
    ///
    /// Expects a flushed frame; anything already here is replaced.
    pub fn apply_frame(&mut self, source: &Frame, filters: &Filters) {
        let all = filters.admits_all();

        let services: Vec<Arc<Service>> = source
            .services
            .iter()
            .filter(|s| all || filters.admits_service(s))
            .cloned()
            .collect();
        self.services.set(services.iter().cloned());

        let links: Vec<Arc<Link>> = source
            .links
            .iter()
            .filter(|l| self.is_rendered(l) && (all || filters.admits_link(l)))
            .cloned()
            .collect();
        self.links.set(links.iter().cloned());

        // The source log is already ordered.
        let flows: Vec<Arc<Flow>> = source
            .flows
            .iter()
            .filter(|f| all || filters.admits_flow(f))
            .cloned()
            .collect();
        self.flows.set_flows(flows.iter().cloned(), false);

        self.refresh_access_points();

        self.bus.publish(Notification::ServicesSet(services));
        for link in links {
            self.bus
                .publish(Notification::LinkChanged(link, ChangeKind::Added));
        }
        if !flows.is_empty() {
            self.bus.publish(Notification::FlowsAdded(flows));
        }
    }

    /// Flows for the flow log: admitted flows narrowed by `tcp-flag` entries.
    pub fn visible_flows<'a>(&'a self, filters: &'a Filters) -> impl Iterator<Item = &'a Arc<Flow>> {
        self.flows.iter().filter(move |f| filters.shows_in_log(f))
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        FrameSnapshot {
            services: self.services.iter().cloned().collect(),
            links: self.rendered_links().cloned().collect(),
            pending_links: self.links.len() - self.rendered_links().count(),
            flows: self.flows.iter().cloned().collect(),
            access_points: self.access_points.clone(),
            active_services: self.services.active_keys().cloned().collect(),
            captions: self
                .services
                .iter()
                .map(|s| (s.id.clone(), s.caption()))
                .collect(),
        }
    }

    fn refresh_access_points(&mut self) {
        self.access_points = self
            .services
            .extract_access_points(self.links.iter().map(|l| l.as_ref()));
    }
}
