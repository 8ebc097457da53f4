//! A single filter entry and its string syntax.
//!
//! Syntax: `[from:|to:|both:]kind=query`, kinds `label`, `identity`, `dns`,
//! `ip`, `pod`, `tcp-flag`. Anything else is a free-text query.
//!
//! Examples:
//!   from:label=k8s:app=frontend
//!   to:dns=api.github.com
//!   identity=42
//!   tcp-flag=SYN
//!   checkout

use crate::domain::labels::Labeled;
use crate::domain::{Endpoint, Flow, Service};
use crate::error::FilterParseError;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

// 1) optional direction, 2) kind, 3) query (may itself contain ':' and '=')
const KIND_ENTRY_RE: &str =
    r"(?i)^\s*(?:(from|to|both):)?(label|identity|ident|dns|ip|pod|tcp-flag)=(.*?)\s*$";
// 1) optional direction, 2) free text
const TEXT_ENTRY_RE: &str = r"(?i)^\s*(?:(from|to|both):)?(.*?)\s*$";

static KIND_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(KIND_ENTRY_RE).expect("kind entry regex"));
static TEXT_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(TEXT_ENTRY_RE).expect("text entry regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterKind {
    Label,
    Identity,
    Dns,
    Ip,
    Pod,
    TcpFlag,
    Text,
}

impl FilterKind {
    fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Label => "label",
            FilterKind::Identity => "identity",
            FilterKind::Dns => "dns",
            FilterKind::Ip => "ip",
            FilterKind::Pod => "pod",
            FilterKind::TcpFlag => "tcp-flag",
            FilterKind::Text => "text",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "label" => Some(FilterKind::Label),
            "identity" | "ident" => Some(FilterKind::Identity),
            "dns" => Some(FilterKind::Dns),
            "ip" => Some(FilterKind::Ip),
            "pod" => Some(FilterKind::Pod),
            "tcp-flag" => Some(FilterKind::TcpFlag),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterDirection {
    From,
    To,
    #[default]
    Both,
}

impl FilterDirection {
    fn as_str(&self) -> &'static str {
        match self {
            FilterDirection::From => "from",
            FilterDirection::To => "to",
            FilterDirection::Both => "both",
        }
    }

    fn parse(s: Option<&str>) -> Self {
        match s.map(str::to_ascii_lowercase).as_deref() {
            Some("from") => FilterDirection::From,
            Some("to") => FilterDirection::To,
            _ => FilterDirection::Both,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterEntry {
    pub kind: FilterKind,
    pub direction: FilterDirection,
    pub query: String,

    /// Caption of the referenced card, for identity and DNS entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
}

impl FilterEntry {
    pub fn new(kind: FilterKind, direction: FilterDirection, query: impl Into<String>) -> Self {
        Self {
            kind,
            direction,
            query: query.into(),
            meta: None,
        }
    }

    pub fn identity(id: impl Into<String>) -> Self {
        Self::new(FilterKind::Identity, FilterDirection::Both, id)
    }

    pub fn dns(name: impl Into<String>) -> Self {
        Self::new(FilterKind::Dns, FilterDirection::Both, name)
    }

    pub fn with_meta(mut self, meta: impl Into<String>) -> Self {
        self.meta = Some(meta.into());
        self
    }

    pub fn is_identity(&self) -> bool {
        self.kind == FilterKind::Identity
    }

    pub fn is_dns(&self) -> bool {
        self.kind == FilterKind::Dns
    }

    pub fn is_tcp_flag(&self) -> bool {
        self.kind == FilterKind::TcpFlag
    }

    /// Identity and DNS entries show a card caption and must resolve it.
    pub fn requires_meta(&self) -> bool {
        self.is_identity() || self.is_dns()
    }

    /// Could this entry be the filter of a selected card?
    pub fn is_card_filter(&self) -> bool {
        self.requires_meta() && self.direction == FilterDirection::Both
    }

    pub fn matches_flow(&self, flow: &Flow) -> bool {
        if self.is_tcp_flag() {
            return flow.has_tcp_flag(&self.query);
        }

        match self.direction {
            FilterDirection::From => self.matches_endpoint(&flow.source),
            FilterDirection::To => self.matches_endpoint(&flow.destination),
            FilterDirection::Both => {
                self.matches_endpoint(&flow.source) || self.matches_endpoint(&flow.destination)
            }
        }
    }

    pub fn matches_endpoint(&self, ep: &Endpoint) -> bool {
        let q = self.query.as_str();
        match self.kind {
            FilterKind::Label => ep.has_label(q),
            FilterKind::Identity => ep.service_id == q || ep.identity.to_string() == q,
            FilterKind::Dns => ep.dns_names.iter().any(|d| d.eq_ignore_ascii_case(q)),
            FilterKind::Ip => ep.ip.as_deref() == Some(q),
            FilterKind::Pod => matches_pod(ep, q),
            FilterKind::TcpFlag => true,
            FilterKind::Text => {
                let needle = q.to_lowercase();
                contains_text(&ep.service_id, &needle)
                    || ep.pod_name.as_deref().is_some_and(|p| contains_text(p, &needle))
                    || ep.ip.as_deref().is_some_and(|ip| contains_text(ip, &needle))
                    || ep.labels.iter().any(|l| contains_text(l, &needle))
                    || ep.dns_names.iter().any(|d| contains_text(d, &needle))
            }
        }
    }

    /// `None` when this kind says nothing about services (ip, pod, tcp-flag).
    pub fn matches_service(&self, svc: &Service) -> Option<bool> {
        let q = self.query.as_str();
        match self.kind {
            FilterKind::Label => Some(svc.has_label(q)),
            FilterKind::Identity => Some(svc.id == q),
            FilterKind::Dns => Some(svc.dns_names.iter().any(|d| d.eq_ignore_ascii_case(q))),
            FilterKind::Text => {
                let needle = q.to_lowercase();
                Some(
                    contains_text(&svc.id, &needle)
                        || contains_text(&svc.caption(), &needle)
                        || svc.labels.iter().any(|l| contains_text(l, &needle))
                        || svc.dns_names.iter().any(|d| contains_text(d, &needle)),
                )
            }
            FilterKind::Ip | FilterKind::Pod | FilterKind::TcpFlag => None,
        }
    }
}

fn contains_text(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

// `pod=name-prefix` or `pod=namespace/name-prefix`
fn matches_pod(ep: &Endpoint, query: &str) -> bool {
    let Some(pod) = ep.pod_name.as_deref() else {
        return false;
    };
    match query.split_once('/') {
        Some((ns, prefix)) => ep.namespace.as_deref() == Some(ns) && pod.starts_with(prefix),
        None => pod.starts_with(query),
    }
}

impl FromStr for FilterEntry {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(caps) = KIND_ENTRY.captures(s) {
            let direction = FilterDirection::parse(caps.get(1).map(|m| m.as_str()));
            let kind = caps
                .get(2)
                .and_then(|m| FilterKind::parse(m.as_str()))
                .unwrap_or(FilterKind::Text);
            let query = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
            if query.is_empty() {
                return Err(FilterParseError::EmptyQuery(s.to_string()));
            }
            return Ok(FilterEntry::new(kind, direction, query));
        }

        let caps = TEXT_ENTRY
            .captures(s)
            .ok_or_else(|| FilterParseError::EmptyQuery(s.to_string()))?;
        let direction = FilterDirection::parse(caps.get(1).map(|m| m.as_str()));
        let query = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        if query.is_empty() {
            return Err(FilterParseError::EmptyQuery(s.to_string()));
        }
        Ok(FilterEntry::new(FilterKind::Text, direction, query))
    }
}

impl fmt::Display for FilterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FilterKind::Text => write!(f, "{}:{}", self.direction.as_str(), self.query),
            kind => write!(
                f,
                "{}:{}={}",
                self.direction.as_str(),
                kind.as_str(),
                self.query
            ),
        }
    }
}
