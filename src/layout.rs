//! The slice of the evaluated canvas a force layout consumes.
//!
//! JSON shape:
//! {
//!   "nodes": { "A": { "pos": [0, 0], "size": [12, 12], "fixed": false } },
//!   "edges": { "A-B": { "source": "A", "target": "B", "length": 70 } }
//! }
//!
//! Edges whose endpoints are missing from `nodes` are left out.

use crate::attr::AttrValue;
use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutNode {
    pub pos: [f64; 2],
    pub size: [f64; 2],
    pub fixed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutEdge {
    pub source: String,
    pub target: String,
    pub length: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayoutGraph {
    pub nodes: IndexMap<String, LayoutNode>,
    pub edges: IndexMap<String, LayoutEdge>,
}

pub fn layout_view(evaluated: &AttrValue) -> LayoutGraph {
    let mut graph = LayoutGraph::default();

    if let Some(nodes) = evaluated.get("nodes").and_then(AttrValue::as_dict) {
        for (id, node) in nodes.values() {
            graph.nodes.insert(
                id.to_string(),
                LayoutNode {
                    pos: node.get("pos").and_then(AttrValue::as_pair).unwrap_or([0.0, 0.0]),
                    size: node.get("size").and_then(AttrValue::as_pair).unwrap_or([0.0, 0.0]),
                    fixed: node.get("fixed").and_then(AttrValue::as_bool).unwrap_or(false),
                },
            );
        }
    }

    if let Some(edges) = evaluated.get("edges").and_then(AttrValue::as_dict) {
        for (id, edge) in edges.values() {
            let end = |key| edge.get(key).and_then(AttrValue::as_str).unwrap_or_default();
            let (source, target) = (end("source"), end("target"));
            if !graph.nodes.contains_key(source) || !graph.nodes.contains_key(target) {
                continue;
            }
            graph.edges.insert(
                id.to_string(),
                LayoutEdge {
                    source: source.to_string(),
                    target: target.to_string(),
                    length: edge.get("length").and_then(AttrValue::as_num).unwrap_or(0.0),
                },
            );
        }
    }

    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::decode_attr;
    use crate::model::CanvasModel;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn extracts_nodes_and_connected_edges() {
        let mut model = CanvasModel::default();
        let changes = decode_attr(
            model.spec(),
            &json!({
                "nodes": { "A": { "fixed": true }, "B": { "pos": [30, 0] } },
                "edges": { "A-B": { "length": 90 }, "A-C": {} }
            }),
        )
        .unwrap();
        let applied = model.apply(&changes, None).unwrap();
        let graph = layout_view(&applied.attributes);

        assert_eq!(
            graph.nodes.get("A"),
            Some(&LayoutNode {
                pos: [0.0, 0.0],
                size: [12.0, 12.0],
                fixed: true
            })
        );
        assert_eq!(graph.nodes.get("B").map(|n| n.pos), Some([30.0, 0.0]));
        assert_eq!(
            graph.edges.get("A-B"),
            Some(&LayoutEdge {
                source: "A".into(),
                target: "B".into(),
                length: 90.0
            })
        );
        assert!(!graph.edges.contains_key("A-C"));
    }
}
