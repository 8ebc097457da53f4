//! Observed traffic events.

use crate::domain::labels::Labeled;
use crate::error::FilterParseError;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    #[default]
    Unknown,
    Forwarded,
    Dropped,
    Error,
    Audit,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Unknown => "UNKNOWN",
            Verdict::Forwarded => "FORWARDED",
            Verdict::Dropped => "DROPPED",
            Verdict::Error => "ERROR",
            Verdict::Audit => "AUDIT",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UNKNOWN" => Ok(Verdict::Unknown),
            "FORWARDED" => Ok(Verdict::Forwarded),
            "DROPPED" => Ok(Verdict::Dropped),
            "ERROR" => Ok(Verdict::Error),
            "AUDIT" => Ok(Verdict::Audit),
            _ => Err(FilterParseError::Verdict(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum L4Protocol {
    Tcp,
    Udp,
    Sctp,
    IcmpV4,
    IcmpV6,
}

impl fmt::Display for L4Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            L4Protocol::Tcp => "tcp",
            L4Protocol::Udp => "udp",
            L4Protocol::Sctp => "sctp",
            L4Protocol::IcmpV4 => "icmpv4",
            L4Protocol::IcmpV6 => "icmpv6",
        };
        f.write_str(s)
    }
}

/// One side of a flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Id of the service card this endpoint belongs to.
    #[serde(default)]
    pub service_id: String,

    #[serde(default)]
    pub identity: u64,

    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub pod_name: Option<String>,

    #[serde(default)]
    pub ip: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub labels: Vec<String>,

    #[serde(default)]
    pub dns_names: Vec<String>,
}

impl Endpoint {
    pub fn service(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            ..Self::default()
        }
    }

    pub fn key(&self) -> EndpointKey {
        EndpointKey {
            service_id: self.service_id.clone(),
            ip: self.ip.clone(),
            port: self.port,
        }
    }
}

impl Labeled for Endpoint {
    fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// The part of an endpoint that takes part in flow identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointKey {
    pub service_id: String,
    pub ip: Option<String>,
    pub port: Option<u16>,
}

/// Identity of a flow for de-duplication and ordering. Field order matters:
/// deriving `Ord` sorts by timestamp first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlowKey {
    pub timestamp: i64,
    pub source: EndpointKey,
    pub destination: EndpointKey,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    /// Milliseconds since the unix epoch.
    pub timestamp: i64,

    #[serde(default)]
    pub source: Endpoint,

    #[serde(default)]
    pub destination: Endpoint,

    #[serde(default)]
    pub verdict: Verdict,

    #[serde(default)]
    pub http_status: Option<u16>,

    #[serde(default)]
    pub protocol: Option<L4Protocol>,

    /// Uppercase flag names, e.g. `SYN`, `ACK`.
    #[serde(default)]
    pub tcp_flags: Vec<String>,

    #[serde(default)]
    pub summary: String,
}

impl Flow {
    pub fn new(timestamp: i64, source: Endpoint, destination: Endpoint, verdict: Verdict) -> Self {
        Self {
            timestamp,
            source,
            destination,
            verdict,
            http_status: None,
            protocol: None,
            tcp_flags: Vec::new(),
            summary: String::new(),
        }
    }

    pub fn key(&self) -> FlowKey {
        FlowKey {
            timestamp: self.timestamp,
            source: self.source.key(),
            destination: self.destination.key(),
            verdict: self.verdict,
        }
    }

    pub fn has_tcp_flag(&self, flag: &str) -> bool {
        self.tcp_flags.iter().any(|f| f.eq_ignore_ascii_case(flag))
    }

    /// True if either side belongs to `namespace`.
    pub fn touches_namespace(&self, namespace: &str) -> bool {
        self.source.namespace.as_deref() == Some(namespace)
            || self.destination.namespace.as_deref() == Some(namespace)
    }
}
