//! Change records delivered by the event stream.
//!
//! Wire shape (one JSON object per line):
//! {"kind": "namespace",    "change": "added",   "name": "default"}
//! {"kind": "service",      "change": "updated", "service": {...}}
//! {"kind": "service_link", "change": "deleted", "link": {...}}
//! {"kind": "flows",        "flows": [{...}, ...]}

use crate::domain::flow::Flow;
use crate::domain::link::Link;
use crate::domain::service::Service;
use crate::error::IngestError;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    #[serde(alias = "exists")]
    Added,
    #[serde(alias = "modified")]
    Updated,
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Added => "added",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    Namespace {
        #[serde(default)]
        name: String,
        change: ChangeKind,
    },
    Service {
        service: Service,
        change: ChangeKind,
    },
    ServiceLink {
        link: Link,
        change: ChangeKind,
    },
    Flows {
        #[serde(default)]
        flows: Vec<Flow>,
    },
}

impl ChangeEvent {
    /// Reject records that lack the identity their registry is keyed on.
    ///
    /// Flow batches are filtered instead of rejected: flows without both
    /// endpoint ids are dropped with a warning and the rest goes through.
    pub fn validate(self) -> Result<Self, IngestError> {
        match self {
            ChangeEvent::Namespace { ref name, .. } if name.trim().is_empty() => {
                Err(IngestError::MissingNamespaceName)
            }
            ChangeEvent::Service { ref service, .. } if service.id.trim().is_empty() => {
                Err(IngestError::MissingServiceId {
                    name: service.name.clone(),
                })
            }
            ChangeEvent::ServiceLink { ref link, .. }
                if link.source_id.trim().is_empty() || link.destination_id.trim().is_empty() =>
            {
                Err(IngestError::MissingLinkEndpoint {
                    source_id: link.source_id.clone(),
                    destination_id: link.destination_id.clone(),
                })
            }
            ChangeEvent::Flows { flows } => {
                let total = flows.len();
                let flows: Vec<Flow> = flows
                    .into_iter()
                    .filter(|f| {
                        !f.source.service_id.is_empty() && !f.destination.service_id.is_empty()
                    })
                    .collect();

                let dropped = total - flows.len();
                if dropped > 0 {
                    if flows.is_empty() {
                        return Err(IngestError::NoValidFlows { dropped });
                    }
                    warn!(dropped, total, "dropping flows without endpoint ids");
                }
                Ok(ChangeEvent::Flows { flows })
            }
            other => Ok(other),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ChangeEvent::Namespace { .. } => "namespace",
            ChangeEvent::Service { .. } => "service",
            ChangeEvent::ServiceLink { .. } => "service_link",
            ChangeEvent::Flows { .. } => "flows",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::flow::{Endpoint, Verdict};
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_wire_records() {
        let ev: ChangeEvent = serde_json::from_str(
            r#"{"kind":"service","change":"exists","service":{"id":"1","name":"a"}}"#,
        )
        .unwrap();
        assert_eq!(
            ev,
            ChangeEvent::Service {
                service: Service::new("1", "a"),
                change: ChangeKind::Added,
            }
        );

        let ev: ChangeEvent =
            serde_json::from_str(r#"{"kind":"namespace","change":"deleted","name":"kube-system"}"#)
                .unwrap();
        assert_eq!(ev.kind_name(), "namespace");
    }

    #[test]
    fn rejects_service_without_id() {
        let ev = ChangeEvent::Service {
            service: Service::new("", "orphan"),
            change: ChangeKind::Updated,
        };
        assert!(matches!(
            ev.validate(),
            Err(IngestError::MissingServiceId { .. })
        ));
    }

    #[test]
    fn rejects_link_without_endpoint() {
        let ev = ChangeEvent::ServiceLink {
            link: Link::new("a", "", 80, crate::domain::L4Protocol::Tcp),
            change: ChangeKind::Added,
        };
        assert!(matches!(
            ev.validate(),
            Err(IngestError::MissingLinkEndpoint { .. })
        ));
    }

    #[test]
    fn filters_flows_without_endpoints() {
        let good = Flow::new(1, Endpoint::service("a"), Endpoint::service("b"), Verdict::Forwarded);
        let bad = Flow::new(2, Endpoint::service("a"), Endpoint::default(), Verdict::Forwarded);

        let ev = ChangeEvent::Flows {
            flows: vec![good.clone(), bad.clone()],
        };
        assert_eq!(
            ev.validate().unwrap(),
            ChangeEvent::Flows { flows: vec![good] }
        );

        let only_bad = ChangeEvent::Flows { flows: vec![bad] };
        assert!(matches!(
            only_bad.validate(),
            Err(IngestError::NoValidFlows { dropped: 1 })
        ));
    }
}
