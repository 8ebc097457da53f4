use crate::store::StoreSnapshot;

use std::fmt::Write as _;

pub fn render_json(snapshot: &StoreSnapshot) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

/// Plain-text overview: counts, filters, then one line per service.
pub fn render_summary(snapshot: &StoreSnapshot) -> anyhow::Result<String> {
    let frame = &snapshot.current;
    let mut out = String::new();

    writeln!(out, "generation {}", snapshot.generation)?;
    writeln!(
        out,
        "services {}/{}  links {}/{} ({} pending)  flows {}/{}  flow log {}",
        frame.services.len(),
        snapshot.global.services,
        frame.links.len(),
        snapshot.global.links,
        frame.pending_links,
        frame.flows.len(),
        snapshot.global.flows,
        snapshot.visible_flows,
    )?;

    let filters = &snapshot.filters;
    if let Some(ns) = &filters.namespace {
        writeln!(out, "namespace {ns}")?;
    }
    if let Some(v) = filters.verdict {
        writeln!(out, "verdict {v}")?;
    }
    if let Some(s) = &filters.http_status {
        writeln!(out, "http status {s}")?;
    }
    for entry in &filters.entries {
        writeln!(out, "filter {entry}")?;
    }

    for svc in &frame.services {
        let marker = if frame.active_services.contains(&svc.id) {
            '*'
        } else {
            ' '
        };
        let ports: Vec<String> = frame
            .access_points
            .for_service(&svc.id)
            .map(|ap| format!("{}/{}", ap.port, ap.protocol))
            .collect();
        writeln!(
            out,
            "{marker} {:<24} {:<16} {}",
            svc.caption(),
            svc.namespace.as_deref().unwrap_or("-"),
            ports.join(",")
        )?;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccessPoint, L4Protocol, Service, Verdict};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn summary_lists_services_with_ports() {
        let mut snap = StoreSnapshot::default();
        snap.filters.verdict = Some(Verdict::Dropped);
        snap.current
            .services
            .push(Arc::new(Service::new("1", "cart").with_namespace("shop")));
        snap.current.active_services.push("1".to_string());
        snap.current.access_points.insert(AccessPoint {
            service_id: "1".to_string(),
            port: 8080,
            protocol: L4Protocol::Tcp,
        });

        let text = render_summary(&snap).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[2], "verdict DROPPED");
        assert!(lines[3].starts_with("* cart"), "{}", lines[3]);
        assert!(lines[3].ends_with("8080/tcp"), "{}", lines[3]);
    }

    #[test]
    fn json_has_frame_and_totals() {
        let snap = StoreSnapshot::default();
        let value: serde_json::Value = serde_json::from_str(&render_json(&snap).unwrap()).unwrap();
        assert_eq!(value["generation"], 0);
        assert_eq!(value["global"]["flows"], 0);
        assert!(value["current"]["services"].as_array().unwrap().is_empty());
    }
}
