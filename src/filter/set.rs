//! The active filter set and how it decides frame membership.
//!
//! Membership (what ends up in the current frame) and display (what the flow
//! log shows) differ in one place: `tcp-flag` entries only restrict display.

use crate::domain::labels::Labeled;
use crate::domain::{Flow, Link, Service, Verdict};
use crate::error::FilterParseError;
use crate::filter::{FilterEntry, HttpStatusFilter};

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

const DNS_PORT: u16 = 53;

/// Hideable classes of services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VisualToggle {
    Host,
    KubeDns,
    RemoteNode,
    PrometheusApp,
    KubeApiServer,
}

impl VisualToggle {
    pub const ALL: [VisualToggle; 5] = [
        VisualToggle::Host,
        VisualToggle::KubeDns,
        VisualToggle::RemoteNode,
        VisualToggle::PrometheusApp,
        VisualToggle::KubeApiServer,
    ];

    /// Persistence key.
    pub fn key(&self) -> &'static str {
        match self {
            VisualToggle::Host => "show_host",
            VisualToggle::KubeDns => "show_kube_dns",
            VisualToggle::RemoteNode => "show_remote_node",
            VisualToggle::PrometheusApp => "show_prometheus_app",
            VisualToggle::KubeApiServer => "show_kube_api_server",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            VisualToggle::Host => "host",
            VisualToggle::KubeDns => "kube-dns",
            VisualToggle::RemoteNode => "remote-node",
            VisualToggle::PrometheusApp => "prometheus-app",
            VisualToggle::KubeApiServer => "kube-apiserver",
        }
    }
}

impl fmt::Display for VisualToggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VisualToggle {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        VisualToggle::ALL
            .into_iter()
            .find(|t| t.name() == s || t.key() == s)
            .ok_or(FilterParseError::Toggle(s))
    }
}

/// Which classes are visible. Everything is shown by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VisualFilters {
    pub show_host: bool,
    pub show_kube_dns: bool,
    pub show_remote_node: bool,
    pub show_prometheus_app: bool,
    pub show_kube_api_server: bool,
}

impl Default for VisualFilters {
    fn default() -> Self {
        Self {
            show_host: true,
            show_kube_dns: true,
            show_remote_node: true,
            show_prometheus_app: true,
            show_kube_api_server: true,
        }
    }
}

impl VisualFilters {
    pub fn get(&self, toggle: VisualToggle) -> bool {
        match toggle {
            VisualToggle::Host => self.show_host,
            VisualToggle::KubeDns => self.show_kube_dns,
            VisualToggle::RemoteNode => self.show_remote_node,
            VisualToggle::PrometheusApp => self.show_prometheus_app,
            VisualToggle::KubeApiServer => self.show_kube_api_server,
        }
    }

    pub fn set(&mut self, toggle: VisualToggle, shown: bool) {
        let slot = match toggle {
            VisualToggle::Host => &mut self.show_host,
            VisualToggle::KubeDns => &mut self.show_kube_dns,
            VisualToggle::RemoteNode => &mut self.show_remote_node,
            VisualToggle::PrometheusApp => &mut self.show_prometheus_app,
            VisualToggle::KubeApiServer => &mut self.show_kube_api_server,
        };
        *slot = shown;
    }

    pub fn shows_all(&self) -> bool {
        VisualToggle::ALL.into_iter().all(|t| self.get(t))
    }

    /// `dns_port` is the port the entity serves on, when known; kube-dns is
    /// only hidden on port 53.
    fn hides(&self, entity: &impl Labeled, dns_port: Option<u16>) -> bool {
        (!self.show_host && entity.is_host())
            || (!self.show_remote_node && entity.is_remote_node())
            || (!self.show_prometheus_app && entity.is_prometheus_app())
            || (!self.show_kube_api_server && entity.is_kube_apiserver())
            || (!self.show_kube_dns
                && entity.is_kube_dns()
                && dns_port.is_none_or(|p| p == DNS_PORT))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Filters {
    pub namespace: Option<String>,
    pub verdict: Option<Verdict>,
    pub http_status: Option<HttpStatusFilter>,
    pub entries: Vec<FilterEntry>,
    pub visual: VisualFilters,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no predicate can exclude anything from a frame.
    pub fn admits_all(&self) -> bool {
        self.namespace.is_none()
            && self.verdict.is_none()
            && self.http_status.is_none()
            && self.entries.iter().all(FilterEntry::is_tcp_flag)
            && self.visual.shows_all()
    }

    fn membership_entries(&self) -> impl Iterator<Item = &FilterEntry> {
        self.entries.iter().filter(|e| !e.is_tcp_flag())
    }

    pub fn admits_service(&self, svc: &Service) -> bool {
        if self.visual.hides(svc, None) {
            return false;
        }

        // Reserved identities (world, host, ...) have no namespace and stay.
        if let (Some(ns), Some(svc_ns)) = (&self.namespace, &svc.namespace) {
            if ns != svc_ns {
                return false;
            }
        }

        // Entries combine with OR; kinds that say nothing about services
        // (ip, pod) leave the decision to the others.
        let mut applicable = false;
        for entry in self.membership_entries() {
            match entry.matches_service(svc) {
                Some(true) => return true,
                Some(false) => applicable = true,
                None => {}
            }
        }
        !applicable
    }

    /// Links are additionally gated on both endpoints by the frame.
    pub fn admits_link(&self, link: &Link) -> bool {
        match self.verdict {
            Some(v) => link.verdicts.is_empty() || link.verdicts.contains(&v),
            None => true,
        }
    }

    pub fn admits_flow(&self, flow: &Flow) -> bool {
        if let Some(v) = self.verdict {
            if flow.verdict != v {
                return false;
            }
        }
        if let Some(status) = &self.http_status {
            if !status.matches(flow.http_status) {
                return false;
            }
        }
        if let Some(ns) = &self.namespace {
            if !flow.touches_namespace(ns) {
                return false;
            }
        }
        if self.visual.hides(&flow.source, flow.source.port)
            || self.visual.hides(&flow.destination, flow.destination.port)
        {
            return false;
        }

        let mut entries = self.membership_entries().peekable();
        entries.peek().is_none() || entries.any(|e| e.matches_flow(flow))
    }

    /// Membership plus `tcp-flag` entries, for the flow log.
    pub fn shows_in_log(&self, flow: &Flow) -> bool {
        if !self.admits_flow(flow) {
            return false;
        }
        let mut flags = self.entries.iter().filter(|e| e.is_tcp_flag()).peekable();
        flags.peek().is_none() || flags.any(|e| e.matches_flow(flow))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Endpoint, L4Protocol};

    fn flow(src: &str, dst: &str, verdict: Verdict) -> Flow {
        Flow::new(1, Endpoint::service(src), Endpoint::service(dst), verdict)
    }

    #[test]
    fn default_admits_everything() {
        let f = Filters::new();
        assert!(f.admits_all());
        assert!(f.admits_service(&Service::new("a", "a")));
        assert!(f.admits_flow(&flow("a", "b", Verdict::Dropped)));
        assert!(f.admits_link(&Link::new("a", "b", 80, L4Protocol::Tcp)));
    }

    #[test]
    fn tcp_flag_entries_do_not_affect_membership() {
        let f = Filters {
            entries: vec!["tcp-flag=SYN".parse().unwrap()],
            ..Filters::default()
        };
        assert!(f.admits_all());

        let plain = flow("a", "b", Verdict::Forwarded);
        let mut syn = plain.clone();
        syn.tcp_flags = vec!["SYN".to_string()];

        assert!(f.admits_flow(&plain));
        assert!(!f.shows_in_log(&plain));
        assert!(f.shows_in_log(&syn));
    }

    #[test]
    fn verdict_and_http_status_gate_flows() {
        let f = Filters {
            verdict: Some(Verdict::Forwarded),
            http_status: Some(HttpStatusFilter::Class(5)),
            ..Filters::default()
        };
        let mut ok = flow("a", "b", Verdict::Forwarded);
        ok.http_status = Some(503);
        let mut wrong_status = ok.clone();
        wrong_status.http_status = Some(200);

        assert!(f.admits_flow(&ok));
        assert!(!f.admits_flow(&wrong_status));
        assert!(!f.admits_flow(&flow("a", "b", Verdict::Dropped)));
    }

    #[test]
    fn identity_entry_excludes_other_services() {
        let f = Filters {
            entries: vec![FilterEntry::identity("a"), "ip=10.0.0.1".parse().unwrap()],
            ..Filters::default()
        };
        assert!(f.admits_service(&Service::new("a", "")));
        assert!(!f.admits_service(&Service::new("b", "")));
    }

    #[test]
    fn flow_only_entries_leave_services_alone() {
        let f = Filters {
            entries: vec!["pod=web".parse().unwrap()],
            ..Filters::default()
        };
        assert!(f.admits_service(&Service::new("b", "")));
    }

    #[test]
    fn hidden_host_removes_host_service_and_flows() {
        let mut f = Filters::default();
        f.visual.set(VisualToggle::Host, false);

        let host = Service::new("1", "").with_labels(["reserved:host"]);
        assert!(!f.admits_service(&host));

        let mut via_host = flow("1", "b", Verdict::Forwarded);
        via_host.source.labels = vec!["reserved:host".to_string()];
        assert!(!f.admits_flow(&via_host));
        assert!(f.admits_flow(&flow("a", "b", Verdict::Forwarded)));
    }

    #[test]
    fn kube_dns_hidden_only_on_dns_port() {
        let mut f = Filters::default();
        f.visual.set(VisualToggle::KubeDns, false);

        let mut dns = flow("a", "dns", Verdict::Forwarded);
        dns.destination.labels = vec!["k8s:k8s-app=kube-dns".to_string()];
        dns.destination.port = Some(53);
        assert!(!f.admits_flow(&dns));

        dns.destination.port = Some(9153);
        assert!(f.admits_flow(&dns));
    }

    #[test]
    fn namespace_keeps_reserved_services() {
        let f = Filters {
            namespace: Some("shop".to_string()),
            ..Filters::default()
        };
        assert!(f.admits_service(&Service::new("a", "").with_namespace("shop")));
        assert!(!f.admits_service(&Service::new("b", "").with_namespace("kube-system")));
        assert!(f.admits_service(&Service::new("world", "").with_labels(["reserved:world"])));
    }

    #[test]
    fn toggle_names_parse() {
        assert_eq!("kube-dns".parse(), Ok(VisualToggle::KubeDns));
        assert_eq!("show_host".parse(), Ok(VisualToggle::Host));
        assert!("nope".parse::<VisualToggle>().is_err());
    }
}
