use super::{FrameRecorder, Replay};

/// Render a self-contained HTML replay player (frames embedded as JSON).
///
/// Important: we avoid `format!()` because the HTML contains many `{}` from JS
/// template literals (e.g., `${x}`), which would conflict with Rust formatting.
pub fn render_replay_html(recorder: &FrameRecorder) -> anyhow::Result<String> {
    let json = serde_json::to_string(&Replay::new(recorder, false))?; // embedded as JS object literal

    const TEMPLATE: &str = r##"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>graphanim replay</title>
<style>
  body { font-family: system-ui, -apple-system, Segoe UI, Roboto, Arial, sans-serif; margin: 0; }
  header { padding: 12px 16px; border-bottom: 1px solid #ddd; display: flex; gap: 12px; align-items: center; }
  .container { display: flex; height: calc(100vh - 58px); }
  .stage { flex: 1; }
  .sidebar { width: 360px; border-left: 1px solid #ddd; padding: 12px; overflow: auto; font-size: 13px; }
  .pill { padding: 4px 8px; border: 1px solid #ddd; border-radius: 999px; background: #fafafa; }
  .event.error { color: #b00020; }
  pre { white-space: pre-wrap; font-family: ui-monospace, SFMono-Regular, Menlo, Consolas, monospace; }
</style>
</head>
<body>
<header>
  <button id="prev">&larr;</button>
  <input id="slider" type="range" min="0" value="0" style="flex:1">
  <button id="next">&rarr;</button>
  <span class="pill" id="status"></span>
</header>

<div class="container">
  <svg class="stage" id="stage"></svg>
  <div class="sidebar">
    <h3>Changed</h3>
    <pre id="changed"></pre>
    <h3>Events</h3>
    <div id="events"></div>
  </div>
</div>

<script>
// Embedded replay data (JSON object literal)
const DATA = __DATA__;

const COLORS = {
  "dark-gray": "#555", "gray": "#888", "light-gray": "#ccc",
  "red": "#d33", "green": "#3a3", "blue": "#36c", "yellow": "#db3", "orange": "#e83", "purple": "#84c",
};
const color = (c) => COLORS[c] || c;
const svg = document.getElementById("stage");
const slider = document.getElementById("slider");
slider.max = Math.max(0, DATA.frames.length - 1);

function el(name, attrs) {
  const e = document.createElementNS("http://www.w3.org/2000/svg", name);
  for (const [k, v] of Object.entries(attrs)) e.setAttribute(k, v);
  return e;
}

function draw(i) {
  svg.innerHTML = "";
  const frame = DATA.frames[i];
  if (!frame) return;
  const a = frame.attributes;
  const [w, h] = a.size;
  const zoom = a.zoom || 1;
  const [px, py] = a.pan || [0, 0];
  svg.setAttribute("viewBox", `${-w / 2 / zoom + px} ${-h / 2 / zoom - py} ${w / zoom} ${h / zoom}`);
  const nodes = a.nodes || {};
  const pos = (id) => (nodes[id] ? nodes[id].pos : [0, 0]);

  for (const edge of Object.values(a.edges || {})) {
    if (!edge || !edge.visible) continue;
    const [sx, sy] = pos(edge.source);
    const [tx, ty] = pos(edge.target);
    let d = `M ${sx} ${-sy}`;
    for (const [x, y] of edge.path || []) d += ` L ${(sx + tx) / 2 + x} ${-((sy + ty) / 2 + y)}`;
    d += ` L ${tx} ${-ty}`;
    svg.appendChild(el("path", { d, fill: "none", stroke: color(edge.color), "stroke-width": edge.thickness }));
  }

  for (const [id, node] of Object.entries(nodes)) {
    if (!node || !node.visible) continue;
    const [x, y] = node.pos;
    const [sw, sh] = node.size;
    const shape = node.shape === "rect"
      ? el("rect", { x: x - sw, y: -y - sh, width: 2 * sw, height: 2 * sh })
      : el("ellipse", { cx: x, cy: -y, rx: sw, ry: node.shape === "circle" ? sw : sh });
    shape.setAttribute("fill", color(node.color));
    svg.appendChild(shape);
    for (const label of Object.values(node.labels || {})) {
      if (!label || !label.visible) continue;
      const rad = (label.angle * Math.PI) / 180;
      const lx = x + label.pos[0] + label.radius * Math.cos(rad);
      const ly = y + label.pos[1] + label.radius * Math.sin(rad);
      const text = el("text", { x: lx, y: -ly, "font-size": label.size, fill: color(label.color), "text-anchor": "middle", "dominant-baseline": "central" });
      text.textContent = label.text;
      svg.appendChild(text);
    }
  }

  document.getElementById("status").textContent =
    `frame ${i + 1}/${DATA.frames.length} · ${frame.queue} · t=${frame.time.toFixed(3)}s`;
  document.getElementById("changed").textContent = JSON.stringify(frame.changed, null, 2);
}

function renderEvents() {
  const box = document.getElementById("events");
  for (const e of DATA.events) {
    const div = document.createElement("div");
    div.className = `event ${e.type}`;
    div.textContent = e.type === "error" ? e.message : JSON.stringify(e.message);
    box.appendChild(div);
  }
}

slider.addEventListener("input", () => draw(Number(slider.value)));
document.getElementById("prev").onclick = () => { slider.value = Math.max(0, Number(slider.value) - 1); draw(Number(slider.value)); };
document.getElementById("next").onclick = () => { slider.value = Math.min(Number(slider.max), Number(slider.value) + 1); draw(Number(slider.value)); };

renderEvents();
draw(0);
</script>
</body>
</html>
"##;

    Ok(TEMPLATE.replace("__DATA__", &json))
}
