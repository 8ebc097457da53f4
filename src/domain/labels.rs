//! Label conventions used to classify services and flow endpoints.
//!
//! Labels arrive as `source:key=value` (e.g. `k8s:app=frontend`) or as bare
//! reserved markers (`reserved:host`).

pub const HOST: &str = "reserved:host";
pub const WORLD: &str = "reserved:world";
pub const REMOTE_NODE: &str = "reserved:remote-node";
pub const KUBE_APISERVER: &str = "reserved:kube-apiserver";
pub const KUBE_DNS: &str = "k8s-app=kube-dns";
pub const PROMETHEUS_APP: &str = "app=prometheus";

const APP_KEYS: [&str; 3] = ["app", "k8s-app", "app.kubernetes.io/name"];

/// Strip the `source:` prefix, if any. A `:` inside the value is kept.
pub fn normalize(label: &str) -> &str {
    match label.split_once(':') {
        Some((source, rest)) if !source.contains('=') && !rest.is_empty() => rest,
        _ => label,
    }
}

/// True if any label equals `query` either verbatim or once its source prefix
/// is stripped.
pub fn matches(labels: &[String], query: &str) -> bool {
    let query = query.trim();
    labels
        .iter()
        .any(|l| l == query || normalize(l) == normalize(query))
}

/// Value of the first app-like label (`app`, `k8s-app`, ...).
pub fn app_name(labels: &[String]) -> Option<&str> {
    for key in APP_KEYS {
        for label in labels {
            if let Some((k, v)) = normalize(label).split_once('=') {
                if k == key && !v.is_empty() {
                    return Some(v);
                }
            }
        }
    }
    None
}

/// Classification shared by services and flow endpoints.
pub trait Labeled {
    fn labels(&self) -> &[String];

    fn has_label(&self, query: &str) -> bool {
        matches(self.labels(), query)
    }

    fn is_host(&self) -> bool {
        self.has_label(HOST)
    }

    fn is_world(&self) -> bool {
        self.has_label(WORLD)
    }

    fn is_remote_node(&self) -> bool {
        self.has_label(REMOTE_NODE)
    }

    fn is_kube_apiserver(&self) -> bool {
        self.has_label(KUBE_APISERVER)
    }

    fn is_kube_dns(&self) -> bool {
        self.has_label(KUBE_DNS)
    }

    fn is_prometheus_app(&self) -> bool {
        self.has_label(PROMETHEUS_APP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(ls: &[&str]) -> Vec<String> {
        ls.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn matches_with_and_without_source_prefix() {
        let ls = labels(&["k8s:app=frontend", "reserved:host"]);
        assert!(matches(&ls, "app=frontend"));
        assert!(matches(&ls, "k8s:app=frontend"));
        assert!(matches(&ls, "reserved:host"));
        assert!(!matches(&ls, "app=backend"));
    }

    #[test]
    fn app_name_prefers_app_key() {
        let ls = labels(&["k8s:k8s-app=kube-dns", "k8s:app=coredns"]);
        assert_eq!(app_name(&ls), Some("coredns"));
        assert_eq!(app_name(&labels(&["k8s:k8s-app=kube-dns"])), Some("kube-dns"));
        assert_eq!(app_name(&labels(&["reserved:world"])), None);
    }
}
