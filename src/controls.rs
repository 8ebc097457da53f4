//! User-facing controls: known namespaces, the selected one and the filter set.

use crate::domain::Verdict;
use crate::filter::{FilterEntry, Filters, HttpStatusFilter, VisualToggle};

use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct Controls {
    namespaces: BTreeSet<String>,
    filters: Filters,
}

impl Controls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespaces(&self) -> &BTreeSet<String> {
        &self.namespaces
    }

    /// Returns false if the namespace was already known.
    pub fn add_namespace(&mut self, ns: impl Into<String>) -> bool {
        self.namespaces.insert(ns.into())
    }

    pub fn remove_namespace(&mut self, ns: &str) -> bool {
        self.namespaces.remove(ns)
    }

    pub fn clear_namespaces(&mut self) {
        self.namespaces.clear();
    }

    pub fn current_namespace(&self) -> Option<&str> {
        self.filters.namespace.as_deref()
    }

    pub fn set_current_namespace(&mut self, ns: Option<String>) {
        self.filters.namespace = ns;
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn set_filters(&mut self, filters: Filters) {
        self.filters = filters;
    }

    pub fn set_verdict(&mut self, verdict: Option<Verdict>) {
        self.filters.verdict = verdict;
    }

    pub fn set_http_status(&mut self, status: Option<HttpStatusFilter>) {
        self.filters.http_status = status;
    }

    pub fn flow_filters(&self) -> &[FilterEntry] {
        &self.filters.entries
    }

    pub fn set_flow_filters(&mut self, entries: Vec<FilterEntry>) {
        self.filters.entries = entries;
    }

    /// The filter of a selected card: a lone identity/DNS entry in both
    /// directions.
    pub fn active_card_filter(&self) -> Option<&FilterEntry> {
        match self.filters.entries.as_slice() {
            [entry] if entry.is_card_filter() => Some(entry),
            _ => None,
        }
    }

    pub fn active_card_filter_mut(&mut self) -> Option<&mut FilterEntry> {
        match self.filters.entries.as_mut_slice() {
            [entry] if entry.is_card_filter() => Some(entry),
            _ => None,
        }
    }

    pub fn is_shown(&self, toggle: VisualToggle) -> bool {
        self.filters.visual.get(toggle)
    }

    pub fn set_shown(&mut self, toggle: VisualToggle, shown: bool) {
        self.filters.visual.set(toggle, shown);
    }

    /// Flip visibility and return the new state.
    pub fn toggle(&mut self, toggle: VisualToggle) -> bool {
        let shown = !self.is_shown(toggle);
        self.set_shown(toggle, shown);
        shown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterDirection, FilterKind};

    #[test]
    fn active_card_filter_needs_single_card_entry() {
        let mut c = Controls::new();
        assert!(c.active_card_filter().is_none());

        c.set_flow_filters(vec![FilterEntry::identity("42")]);
        assert_eq!(c.active_card_filter().map(|e| e.query.as_str()), Some("42"));

        c.set_flow_filters(vec![FilterEntry::new(
            FilterKind::Identity,
            FilterDirection::From,
            "42",
        )]);
        assert!(c.active_card_filter().is_none());

        c.set_flow_filters(vec![FilterEntry::identity("1"), FilterEntry::identity("2")]);
        assert!(c.active_card_filter().is_none());
    }

    #[test]
    fn toggle_flips_and_reports() {
        let mut c = Controls::new();
        assert!(!c.toggle(VisualToggle::Host));
        assert!(!c.is_shown(VisualToggle::Host));
        assert!(c.toggle(VisualToggle::Host));
    }
}
