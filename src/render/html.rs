use crate::store::StoreSnapshot;

/// Render a self-contained HTML page of the current frame (snapshot embedded
/// as JSON).
///
/// No `format!()` here: the page is full of `{}` from CSS and JS template
/// literals.
pub fn render_html_page(snapshot: &StoreSnapshot) -> anyhow::Result<String> {
    // Embedded as a JS object literal; `</` must not close the script tag.
    let json = serde_json::to_string(snapshot)?.replace("</", "<\\/");

    const TEMPLATE: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Service map</title>
<style>
  body { font-family: system-ui, -apple-system, Segoe UI, Roboto, Arial, sans-serif; margin: 0; }
  header { padding: 12px 16px; border-bottom: 1px solid #ddd; }
  .container { display: flex; height: calc(100vh - 86px); }
  .sidebar { width: 360px; border-right: 1px solid #ddd; padding: 12px; overflow: auto; }
  .main { flex: 1; padding: 12px; overflow: auto; }

  .summary { display: flex; gap: 16px; flex-wrap: wrap; font-size: 14px; color: #333; }
  .pill { padding: 4px 8px; border: 1px solid #ddd; border-radius: 999px; background: #fafafa; }
  .filters { margin-top: 6px; font-size: 12px; color: #555; }

  .card { cursor: pointer; user-select: none; padding: 4px 6px; border-radius: 4px; }
  .card:hover { background: #f3f3f3; }
  .card.selected { background: #e9f2ff; border: 1px solid #cfe3ff; }
  .card.active::before { content: "● "; color: #2b7cff; }
  .muted { color: #777; font-size: 12px; }

  table { border-collapse: collapse; width: 100%; margin-top: 8px; }
  th, td { border-bottom: 1px solid #eee; padding: 6px 8px; text-align: left; font-size: 14px; }
  th { position: sticky; top: 0; background: white; border-bottom: 1px solid #ddd; }
  .num { text-align: right; font-variant-numeric: tabular-nums; }
  .FORWARDED { color: #1a7f37; }
  .DROPPED, .ERROR { color: #cf222e; }
  code { font-family: ui-monospace, SFMono-Regular, Menlo, Consolas, monospace; font-size: 13px; }
</style>
</head>
<body>
<header>
  <div class="summary" id="summary"></div>
  <div class="filters" id="filters"></div>
</header>

<div class="container">
  <div class="sidebar">
    <input id="search" placeholder="Search service..." style="width: 100%; box-sizing: border-box; padding: 6px 8px; border: 1px solid #ddd; border-radius: 6px; margin-bottom: 8px;">
    <div id="cards"></div>
  </div>

  <div class="main">
    <h2 id="title">All flows</h2>
    <div id="meta" class="muted"></div>

    <table id="linksTable" style="display:none;">
      <thead>
        <tr><th>from</th><th>to</th><th class="num">port</th><th>protocol</th><th>verdicts</th></tr>
      </thead>
      <tbody id="linksBody"></tbody>
    </table>

    <table>
      <thead>
        <tr><th class="num">time</th><th>source</th><th>destination</th><th>verdict</th><th>summary</th></tr>
      </thead>
      <tbody id="flowsBody"></tbody>
    </table>
  </div>
</div>

<script>
// Embedded snapshot (JSON object literal)
const DATA = __DATA__;
const FRAME = DATA.current;

const state = {
  selected: null,
  search: ""
};

const byId = new Map(FRAME.services.map(s => [s.id, s]));
const active = new Set(FRAME.active_services);

function escapeHtml(s) {
  return String(s)
    .replaceAll("&", "&amp;")
    .replaceAll("<", "&lt;")
    .replaceAll(">", "&gt;")
    .replaceAll('"', "&quot;")
    .replaceAll("'", "&#39;");
}

function caption(id) {
  return FRAME.captions[id] || id;
}

function fmtTime(ms) {
  return new Date(ms).toISOString().replace("T", " ").replace("Z", "");
}

function renderSummary() {
  const g = DATA.global;
  document.getElementById("summary").innerHTML = `
    <span class="pill">generation: <b>${DATA.generation}</b></span>
    <span class="pill">services: <b>${FRAME.services.length}</b> / ${g.services}</span>
    <span class="pill">links: <b>${FRAME.links.length}</b> (+${FRAME.pending_links} pending) / ${g.links}</span>
    <span class="pill">flows: <b>${FRAME.flows.length}</b> / ${g.flows}</span>
    <span class="pill">flow log: <b>${DATA.visible_flows}</b></span>
  `;

  const f = DATA.filters;
  const parts = [];
  if (f.namespace) parts.push("namespace=" + f.namespace);
  if (f.verdict) parts.push("verdict=" + f.verdict);
  if (f.http_status) parts.push("http=" + f.http_status);
  for (const e of f.entries) parts.push(e.direction + ":" + e.kind + "=" + e.query);
  for (const [k, v] of Object.entries(f.visual)) if (!v) parts.push(k + "=false");
  document.getElementById("filters").textContent =
    parts.length ? "filters: " + parts.join(", ") : "no filters";
}

function cardMatches(s) {
  if (!state.search) return true;
  const q = state.search.toLowerCase();
  return caption(s.id).toLowerCase().includes(q)
    || s.id.toLowerCase().includes(q)
    || (s.labels || []).some(l => l.toLowerCase().includes(q));
}

function renderCards() {
  const root = document.getElementById("cards");
  root.innerHTML = "";

  for (const s of FRAME.services) {
    if (!cardMatches(s)) continue;

    const row = document.createElement("div");
    row.className = "card"
      + (state.selected === s.id ? " selected" : "")
      + (active.has(s.id) ? " active" : "");
    row.onclick = () => selectService(state.selected === s.id ? null : s.id);

    const aps = FRAME.access_points[s.id] || [];
    const ports = aps.map(ap => ap.port + "/" + ap.protocol).join(", ");
    row.innerHTML = `${escapeHtml(caption(s.id))} <span class="muted">${escapeHtml(s.namespace || "")} ${escapeHtml(ports)}</span>`;
    root.appendChild(row);
  }
}

function renderLinks(id) {
  const tbl = document.getElementById("linksTable");
  const body = document.getElementById("linksBody");
  body.innerHTML = "";

  const links = id ? FRAME.links.filter(l => l.source_id === id || l.destination_id === id) : [];
  if (!links.length) {
    tbl.style.display = "none";
    return;
  }
  tbl.style.display = "table";
  for (const l of links) {
    const tr = document.createElement("tr");
    tr.innerHTML = `
      <td>${escapeHtml(caption(l.source_id))}</td>
      <td>${escapeHtml(caption(l.destination_id))}</td>
      <td class="num">${l.destination_port}</td>
      <td>${l.protocol}</td>
      <td>${l.verdicts.join(", ")}</td>
    `;
    body.appendChild(tr);
  }
}

function renderFlows(id) {
  const body = document.getElementById("flowsBody");
  body.innerHTML = "";

  const flows = id
    ? FRAME.flows.filter(f => f.source.service_id === id || f.destination.service_id === id)
    : FRAME.flows;
  for (const f of flows.slice().reverse()) {
    const tr = document.createElement("tr");
    tr.innerHTML = `
      <td class="num"><code>${fmtTime(f.timestamp)}</code></td>
      <td>${escapeHtml(caption(f.source.service_id))}</td>
      <td>${escapeHtml(caption(f.destination.service_id))}</td>
      <td class="${f.verdict}">${f.verdict}</td>
      <td>${escapeHtml(f.summary || "")}</td>
    `;
    body.appendChild(tr);
  }
}

function selectService(id) {
  state.selected = id;
  const s = id ? byId.get(id) : null;

  document.getElementById("title").textContent = s ? caption(id) : "All flows";
  document.getElementById("meta").textContent = s
    ? `id: ${s.id} | labels: ${(s.labels || []).join(", ") || "-"}`
    : "";

  renderLinks(id);
  renderFlows(id);
  renderCards();
}

document.getElementById("search").addEventListener("input", (e) => {
  state.search = e.target.value || "";
  renderCards();
});

renderSummary();
selectService(FRAME.active_services.length ? FRAME.active_services[0] : null);
</script>
</body>
</html>
"#;

    Ok(TEMPLATE.replace("__DATA__", &json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChangeKind, Service};
    use crate::store::Frame;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn snapshot_is_embedded() {
        let mut snap = StoreSnapshot::default();
        snap.current.services.push(Arc::new(Service::new("svc-1", "cart")));

        let html = render_html_page(&snap).unwrap();
        assert!(!html.contains("__DATA__"));
        assert!(html.contains(r#""id":"svc-1""#));
    }

    #[test]
    fn script_close_in_data_stays_inside_the_script() {
        let mut snap = StoreSnapshot::default();
        snap.current
            .services
            .push(Arc::new(Service::new("x", "</script><b>boom</b>")));

        let html = render_html_page(&snap).unwrap();
        assert_eq!(html.matches("</script>").count(), 1);
        assert!(html.contains(r#"<\/script><b>boom<\/b>"#));
    }

    #[test]
    fn captions_come_from_the_frame() {
        let mut frame = Frame::new(10);
        frame.apply_service_change(
            Arc::new(Service::new("42", "cart-7d9").with_labels(["k8s:app=cart"])),
            ChangeKind::Added,
        );
        frame.apply_service_change(
            Arc::new(
                Service::new("7", "world")
                    .with_labels(["reserved:world"])
                    .with_dns_names(["api.github.com"]),
            ),
            ChangeKind::Added,
        );
        let snap = StoreSnapshot {
            current: frame.snapshot(),
            ..StoreSnapshot::default()
        };

        let html = render_html_page(&snap).unwrap();
        assert!(html.contains(r#""captions":{"42":"cart","7":"api.github.com"}"#));
        assert!(html.contains("return FRAME.captions[id] || id;"));
    }
}
