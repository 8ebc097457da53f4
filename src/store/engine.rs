//! The frame engine: a global frame that only accumulates and a current
//! frame replayed from it through the active filters.
//!
//! Events hit the global frame unconditionally and reach the current frame
//! only if the filters admit them. A filter change rebuilds the current frame
//! from the global one; data never flows the other way.

use crate::controls::Controls;
use crate::domain::{ChangeEvent, ChangeKind, Flow, Link, Service, Verdict};
use crate::filter::{FilterEntry, FilterKind, Filters, HttpStatusFilter, VisualToggle};
use crate::prefs::Preferences;
use crate::store::bus::NotificationReceiver;
use crate::store::frame::Frame;
use crate::store::layout::Layout;
use crate::store::snapshot::{StoreSnapshot, TotalsView};

use std::sync::Arc;
use tracing::{debug, info, warn};

/// One-shot work to run after the next reset of the current frame.
pub type AfterReset = Box<dyn FnOnce(&mut FrameEngine) + Send>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOptions {
    pub namespaces: bool,
    pub global_frame: bool,
}

pub struct FrameEngine {
    global: Frame,
    current: Frame,
    controls: Controls,
    prefs: Box<dyn Preferences>,
    layouts: Vec<Box<dyn Layout>>,
    after_reset: Vec<AfterReset>,
    generation: u64,
}

impl FrameEngine {
    /// Visual toggles and the last namespace are restored from `prefs` here,
    /// and only here.
    pub fn new(flow_capacity: usize, prefs: Box<dyn Preferences>) -> Self {
        let mut controls = Controls::new();
        for toggle in VisualToggle::ALL {
            if let Some(shown) = prefs.flag(toggle) {
                controls.set_shown(toggle, shown);
            }
        }
        if let Some(ns) = prefs.last_namespace() {
            controls.set_current_namespace(Some(ns));
        }

        Self {
            global: Frame::new(flow_capacity),
            current: Frame::new(flow_capacity),
            controls,
            prefs,
            layouts: Vec::new(),
            after_reset: Vec::new(),
            generation: 0,
        }
    }

    pub fn global(&self) -> &Frame {
        &self.global
    }

    pub fn current(&self) -> &Frame {
        &self.current
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn filters(&self) -> &Filters {
        self.controls.filters()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Notifications of the current frame.
    pub fn subscribe(&mut self) -> NotificationReceiver {
        self.current.subscribe()
    }

    pub fn add_layout(&mut self, layout: Box<dyn Layout>) {
        self.layouts.push(layout);
    }

    /// Load a full snapshot into the global frame and replay it.
    pub fn setup(&mut self, services: Vec<Service>, links: Vec<Link>, flows: Vec<Flow>) {
        self.global
            .set_services(services.into_iter().map(Arc::new).collect());
        self.global
            .set_links(links.into_iter().map(Arc::new).collect());
        self.global
            .set_flows(flows.into_iter().map(Arc::new).collect(), true);
        self.reset_current_frame();
    }

    /// Apply one validated change. Returns the flow diff count of the current
    /// frame (0 for anything but flow batches).
    pub fn apply(&mut self, event: ChangeEvent) -> usize {
        match event {
            ChangeEvent::Namespace { name, change } => {
                self.apply_namespace_change(&name, change);
                0
            }
            ChangeEvent::Service { service, change } => {
                self.apply_service_change(service, change);
                0
            }
            ChangeEvent::ServiceLink { link, change } => {
                self.apply_service_link_change(link, change);
                0
            }
            ChangeEvent::Flows { flows } => self.add_flows(flows),
        }
    }

    pub fn apply_namespace_change(&mut self, ns: &str, change: ChangeKind) {
        if change == ChangeKind::Deleted {
            self.controls.remove_namespace(ns);
            return;
        }

        self.controls.add_namespace(ns);
        if self.controls.current_namespace().is_none() {
            self.set_current_namespace(ns);
        }
    }

    pub fn apply_service_change(&mut self, svc: Service, change: ChangeKind) {
        let svc = Arc::new(svc);
        self.global.apply_service_change(svc.clone(), change);

        let present = self.current.services().contains(svc.id.as_str());
        let admitted =
            change != ChangeKind::Deleted && self.controls.filters().admits_service(&svc);
        if admitted {
            let id = svc.id.clone();
            self.current.apply_service_change(svc, change);
            if !present {
                self.adopt_links(&id);
            }
        } else if present {
            // Deleted, or an update moved it out of the filter.
            let id = svc.id.clone();
            self.current.apply_service_change(svc, ChangeKind::Deleted);
            self.drop_links(&id);
        }

        self.resolve_active_card_filter();
    }

    pub fn apply_service_link_change(&mut self, link: Link, change: ChangeKind) {
        let link = Arc::new(link);
        self.global.apply_service_link_change(link.clone(), change);

        let present = self.current.links().contains(&link.key());
        let admitted = change != ChangeKind::Deleted
            && self.current.is_rendered(&link)
            && self.controls.filters().admits_link(&link);

        if admitted {
            self.current.apply_service_link_change(link, change);
        } else if present {
            self.current.apply_service_link_change(link, ChangeKind::Deleted);
        }
    }

    /// Returns how many flows are new to the current frame.
    pub fn add_flows(&mut self, flows: Vec<Flow>) -> usize {
        let flows: Vec<Arc<Flow>> = flows.into_iter().map(Arc::new).collect();
        self.global.add_flows(flows.clone());

        // The current log holds nothing the global one has evicted.
        if let Some(oldest) = self.global.flows().first_key().cloned() {
            self.current.trim_flows_before(&oldest);
        }

        let held = self.global.flows();
        let filters = self.controls.filters();
        let admitted: Vec<Arc<Flow>> = flows
            .into_iter()
            .filter(|f| held.contains(&f.key()) && filters.admits_flow(f))
            .collect();
        if admitted.is_empty() {
            return 0;
        }
        self.current.add_flows(admitted)
    }

    /// Rebuild the current frame from the global one under the active filters.
    pub fn reset_current_frame(&mut self) {
        let active: Vec<String> = self.current.services().active_keys().cloned().collect();

        // 1) Empty the current frame and everything laid out on top of it.
        self.current.flush();
        for layout in &mut self.layouts {
            layout.reset();
        }

        // 2) Replay.
        self.current.apply_frame(&self.global, self.controls.filters());
        for id in &active {
            self.current.set_active_state(id, true);
        }
        self.resolve_active_card_filter();
        self.generation += 1;

        debug!(
            generation = self.generation,
            services = self.current.services().len(),
            links = self.current.links().len(),
            flows = self.current.flows().len(),
            "current frame replayed"
        );

        // 3) One-shot callbacks. Anything registered while they run waits for
        //    the next reset.
        self.run_after_reset_callbacks();
    }

    pub fn run_after_frame_reset(&mut self, cb: impl FnOnce(&mut FrameEngine) + Send + 'static) {
        self.after_reset.push(Box::new(cb));
    }

    fn run_after_reset_callbacks(&mut self) {
        let callbacks = std::mem::take(&mut self.after_reset);
        for cb in callbacks {
            cb(self);
        }
    }

    pub fn flush(&mut self, opts: FlushOptions) {
        if opts.namespaces {
            self.controls.clear_namespaces();
        }
        if opts.global_frame {
            self.global.flush();
        }

        self.current.flush();
        for layout in &mut self.layouts {
            layout.reset();
        }
    }

    pub fn set_filters(&mut self, filters: Filters) {
        let Filters {
            namespace,
            verdict,
            http_status,
            entries,
            visual,
        } = filters;

        if let Some(ns) = namespace.as_deref() {
            self.remember_namespace(ns);
        }
        for toggle in VisualToggle::ALL {
            if visual.get(toggle) != self.controls.is_shown(toggle) {
                self.remember_toggle(toggle, visual.get(toggle));
            }
        }

        let entries = self.resolve_entries(entries);
        self.controls.set_filters(Filters {
            namespace,
            verdict,
            http_status,
            entries,
            visual,
        });
        self.reset_current_frame();
        self.sync_active_card();
    }

    pub fn set_current_namespace(&mut self, ns: &str) {
        if self.controls.current_namespace() == Some(ns) {
            return;
        }
        info!(namespace = ns, "switching namespace");
        self.controls.set_current_namespace(Some(ns.to_string()));
        self.remember_namespace(ns);
        self.reset_current_frame();
    }

    pub fn set_verdict(&mut self, verdict: Option<Verdict>) {
        self.controls.set_verdict(verdict);
        self.reset_current_frame();
    }

    pub fn set_http_status(&mut self, status: Option<HttpStatusFilter>) {
        self.controls.set_http_status(status);
        self.reset_current_frame();
    }

    /// Identity and DNS entries get their card caption here when the card is
    /// already loaded; otherwise they stay caption-less until it shows up.
    pub fn set_flow_filters(&mut self, entries: Vec<FilterEntry>) {
        let entries = self.resolve_entries(entries);
        self.controls.set_flow_filters(entries);
        self.reset_current_frame();
        self.sync_active_card();
    }

    pub fn set_flow_filters_for_active_card(&mut self, service_id: &str, is_active: bool) {
        if !is_active {
            self.set_flow_filters(Vec::new());
            return;
        }

        let Some(card) = self.current.service_by_id(service_id) else {
            return;
        };
        let entry = card.filter_entry();
        self.set_flow_filters(vec![entry]);
    }

    pub fn toggle_active_service(&mut self, id: &str) -> bool {
        self.current.toggle_active_service(id)
    }

    pub fn set_active_service_state(&mut self, id: &str, active: bool) -> bool {
        self.current.set_active_state(id, active)
    }

    /// Flip a visual toggle, persist it and replay. Returns the new state.
    pub fn toggle_visual(&mut self, toggle: VisualToggle) -> bool {
        let shown = self.controls.toggle(toggle);
        self.remember_toggle(toggle, shown);
        self.reset_current_frame();
        shown
    }

    /// The flow log: current flows narrowed by `tcp-flag` entries.
    pub fn visible_flows(&self) -> impl Iterator<Item = &Arc<Flow>> {
        self.current.visible_flows(self.controls.filters())
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            generation: self.generation,
            namespaces: self.controls.namespaces().iter().cloned().collect(),
            filters: self.controls.filters().clone(),
            current: self.current.snapshot(),
            visible_flows: self.visible_flows().count(),
            global: TotalsView {
                services: self.global.services().len(),
                links: self.global.links().len(),
                flows: self.global.flows().len(),
            },
        }
    }

    // Pull links from the global frame that a newly admitted service completes.
    fn adopt_links(&mut self, service_id: &str) {
        let filters = self.controls.filters();
        let adopted: Vec<Arc<Link>> = self
            .global
            .links()
            .iter()
            .filter(|l| l.touches(service_id))
            .filter(|l| !self.current.links().contains(&l.key()))
            .filter(|l| self.current.is_rendered(l) && filters.admits_link(l))
            .cloned()
            .collect();

        for link in adopted {
            self.current.apply_service_link_change(link, ChangeKind::Added);
        }
    }

    // Links of a service that left the current frame; `adopt_links` brings
    // them back from the global frame if it returns.
    fn drop_links(&mut self, service_id: &str) {
        let dropped: Vec<Arc<Link>> = self
            .current
            .links()
            .iter()
            .filter(|l| l.touches(service_id))
            .cloned()
            .collect();

        for link in dropped {
            self.current
                .apply_service_link_change(link, ChangeKind::Deleted);
        }
    }

    fn find_card(&self, entry: &FilterEntry) -> Option<&Arc<Service>> {
        match entry.kind {
            FilterKind::Identity => self.current.service_by_id(&entry.query),
            FilterKind::Dns => self
                .current
                .services()
                .iter()
                .find(|s| s.dns_names.iter().any(|d| d.eq_ignore_ascii_case(&entry.query))),
            _ => None,
        }
    }

    fn resolve_entries(&self, entries: Vec<FilterEntry>) -> Vec<FilterEntry> {
        entries
            .into_iter()
            .map(|entry| {
                if !entry.requires_meta() || entry.meta.is_some() {
                    return entry;
                }
                match self.find_card(&entry).map(|card| card.caption()) {
                    Some(caption) => entry.with_meta(caption),
                    None => entry,
                }
            })
            .collect()
    }

    // After a filter change: a resolved card filter selects its card, no card
    // filter clears the selection.
    fn sync_active_card(&mut self) {
        let Some(entry) = self.controls.active_card_filter() else {
            self.current.clear_active();
            return;
        };
        if let Some(id) = self.find_card(entry).map(|card| card.id.clone()) {
            self.current.set_active_state(&id, true);
        }
    }

    // After a service change or a replay: a card filter still waiting for its
    // caption gets it once the card is loaded, and the card becomes active.
    fn resolve_active_card_filter(&mut self) {
        let Some(entry) = self.controls.active_card_filter() else {
            return;
        };
        if entry.meta.is_some() {
            return;
        }
        let Some((id, caption)) = self
            .find_card(entry)
            .map(|card| (card.id.clone(), card.caption()))
        else {
            return;
        };

        if let Some(entry) = self.controls.active_card_filter_mut() {
            entry.meta = Some(caption);
        }
        self.current.set_active_state(&id, true);
        debug!(service = %id, "resolved active card filter");
    }

    fn remember_toggle(&mut self, toggle: VisualToggle, shown: bool) {
        if let Err(err) = self.prefs.set_flag(toggle, shown) {
            warn!(%toggle, error = %err, "failed to persist visual toggle");
        }
    }

    fn remember_namespace(&mut self, ns: &str) {
        if let Err(err) = self.prefs.set_last_namespace(ns) {
            warn!(namespace = ns, error = %err, "failed to persist namespace");
        }
    }
}
