use crate::domain::labels::{self, Labeled};
use crate::filter::FilterEntry;

use serde::{Deserialize, Serialize};

/// A service card: one identity on the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Identity of the service. Empty ids are rejected at ingestion.
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub labels: Vec<String>,

    #[serde(default)]
    pub dns_names: Vec<String>,
}

impl Service {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            namespace: None,
            labels: Vec::new(),
            dns_names: Vec::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dns_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dns_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// A world identity we know by name.
    pub fn is_dns(&self) -> bool {
        self.is_world() && !self.dns_names.is_empty()
    }

    /// Human readable title for the card.
    pub fn caption(&self) -> String {
        if self.is_dns() {
            return self.dns_names[0].clone();
        }
        if self.is_world() {
            return "World".to_string();
        }
        if self.is_host() {
            return "Host".to_string();
        }
        if self.is_remote_node() {
            return "Remote Node".to_string();
        }
        if self.is_kube_apiserver() {
            return "Kubernetes API Server".to_string();
        }
        if let Some(app) = labels::app_name(&self.labels) {
            return app.to_string();
        }
        if !self.name.is_empty() {
            return self.name.clone();
        }
        self.id.clone()
    }

    /// The flow filter that selects traffic of this card.
    pub fn filter_entry(&self) -> FilterEntry {
        let entry = if self.is_dns() {
            FilterEntry::dns(self.dns_names[0].clone())
        } else {
            FilterEntry::identity(self.id.clone())
        };
        entry.with_meta(self.caption())
    }
}

impl Labeled for Service {
    fn labels(&self) -> &[String] {
        &self.labels
    }
}
