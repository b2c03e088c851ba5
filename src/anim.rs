//! Animation metadata for changed endpoints.
//!
//! Settings come from three layers, highest priority first: the animation
//! attached to the event, overrides stored by earlier `anim_defaults` events,
//! and the global defaults from `Settings`. Within a layer, settings given
//! deeper in the tree fill every endpoint below them, and an exact dict key
//! beats the `"*"` entry.
//!
//! JSON shape of a layer:
//! {
//!   "duration": 1.0,                     // applies to everything below
//!   "nodes": {
//!     "*": { "ease": "linear" },         // every node
//!     "A": { "pos": { "duration": 2 } }  // only A's position
//!   }
//! }
//! `"**"` may be used as an explicit key for the settings of a level.

use crate::attr::{AttrValue, DictEntry};
use crate::spec::AttrSpec;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key of the per-entry dict wildcard.
pub const ANY_ENTRY: &str = "*";
/// Explicit key for the settings that fill a whole subtree.
pub const FILL: &str = "**";

const SETTING_KEYS: [&str; 4] = ["duration", "ease", "highlight", "linger"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnimSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ease: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linger: Option<f64>,
}

impl AnimSettings {
    /// Fill fields missing here from `fallback`.
    pub fn or(&self, fallback: &AnimSettings) -> AnimSettings {
        AnimSettings {
            duration: self.duration.or(fallback.duration),
            ease: self.ease.clone().or_else(|| fallback.ease.clone()),
            highlight: self.highlight.or(fallback.highlight),
            linger: self.linger.or(fallback.linger),
        }
    }

    pub fn resolve(&self, defaults: &AnimMeta) -> AnimMeta {
        AnimMeta {
            duration: self.duration.unwrap_or(defaults.duration),
            ease: self.ease.clone().unwrap_or_else(|| defaults.ease.clone()),
            highlight: self.highlight.unwrap_or(defaults.highlight),
            linger: self.linger.unwrap_or(defaults.linger),
        }
    }
}

/// Fully resolved animation of one endpoint. Durations are seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimMeta {
    pub duration: f64,
    pub ease: String,
    pub highlight: bool,
    pub linger: f64,
}

impl Default for AnimMeta {
    fn default() -> Self {
        Self {
            duration: 0.5,
            ease: "poly".to_string(),
            highlight: false,
            linger: 0.5,
        }
    }
}

/// One layer of animation settings, shaped like the attribute tree.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct AnimTree {
    pub settings: AnimSettings,
    pub children: IndexMap<String, AnimTree>,
}

impl TryFrom<Map<String, Value>> for AnimTree {
    type Error = serde_json::Error;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut own = Map::new();
        let mut tree = AnimTree::default();
        for (k, v) in map {
            if SETTING_KEYS.contains(&k.as_str()) {
                own.insert(k, v);
            } else if k == FILL {
                let fill: AnimSettings = serde_json::from_value(v)?;
                tree.settings = tree.settings.or(&fill);
            } else {
                tree.children.insert(k, serde_json::from_value(v)?);
            }
        }
        let own: AnimSettings = serde_json::from_value(Value::Object(own))?;
        tree.settings = own.or(&tree.settings);
        Ok(tree)
    }
}

impl AnimTree {
    /// Layer `other` over this tree; fields set in `other` win.
    pub fn merge(&mut self, other: &AnimTree) {
        self.settings = other.settings.or(&self.settings);
        for (k, child) in &other.children {
            self.children.entry(k.clone()).or_default().merge(child);
        }
    }
}

/// Animation output, parallel to the changed subset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnimNode {
    Endpoint(AnimMeta),
    Branch(IndexMap<String, AnimNode>),
}

impl AnimNode {
    pub fn get(&self, key: &str) -> Option<&AnimNode> {
        match self {
            AnimNode::Branch(children) => children.get(key),
            AnimNode::Endpoint(_) => None,
        }
    }

    pub fn get_path(&self, path: &[&str]) -> Option<&AnimNode> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }

    pub fn meta(&self) -> Option<&AnimMeta> {
        match self {
            AnimNode::Endpoint(meta) => Some(meta),
            AnimNode::Branch(_) => None,
        }
    }
}

/// Position inside one layer: the matching subtrees (exact keys before
/// wildcards) and the settings inherited from above.
#[derive(Clone)]
struct Cursor<'a> {
    nodes: Vec<&'a AnimTree>,
    inherited: AnimSettings,
}

impl<'a> Cursor<'a> {
    fn root(tree: &'a AnimTree) -> Self {
        Self {
            inherited: tree.settings.clone(),
            nodes: vec![tree],
        }
    }

    fn descend(&self, key: &str, in_dict: bool) -> Self {
        let mut nodes: Vec<&'a AnimTree> =
            self.nodes.iter().filter_map(|n| n.children.get(key)).collect();
        if in_dict {
            nodes.extend(self.nodes.iter().filter_map(|n| n.children.get(ANY_ENTRY)));
        }
        let here = nodes
            .iter()
            .fold(AnimSettings::default(), |acc, n| acc.or(&n.settings));
        Self {
            inherited: here.or(&self.inherited),
            nodes,
        }
    }
}

/// Annotate every endpoint present in `changed` (and every deleted dict
/// entry) with its resolved animation.
///
/// `layers` are in priority order, highest first.
pub fn annotate(
    spec: &AttrSpec,
    changed: &AttrValue,
    layers: &[&AnimTree],
    defaults: &AnimMeta,
) -> Option<AnimNode> {
    let cursors: Vec<Cursor> = layers.iter().map(|t| Cursor::root(t)).collect();
    annotate_at(spec, changed, &cursors, defaults)
}

fn resolve(cursors: &[Cursor], defaults: &AnimMeta) -> AnimMeta {
    cursors
        .iter()
        .fold(AnimSettings::default(), |acc, c| acc.or(&c.inherited))
        .resolve(defaults)
}

fn annotate_at(
    spec: &AttrSpec,
    changed: &AttrValue,
    cursors: &[Cursor],
    defaults: &AnimMeta,
) -> Option<AnimNode> {
    if spec.is_endpoint() {
        return Some(AnimNode::Endpoint(resolve(cursors, defaults)));
    }

    let descend = |key: &str, in_dict: bool| {
        cursors
            .iter()
            .map(|c| c.descend(key, in_dict))
            .collect::<Vec<_>>()
    };

    let mut out = IndexMap::new();
    match (spec, changed) {
        (AttrSpec::Record(r), AttrValue::Record(fields)) => {
            for (k, v) in fields {
                let Some(child) = r.entries.get(k.as_str()) else {
                    continue;
                };
                if let Some(node) = annotate_at(child, v, &descend(k, false), defaults) {
                    out.insert(k.clone(), node);
                }
            }
        }
        (AttrSpec::Dict(d), AttrValue::Dict(dict)) => {
            for (k, e) in &dict.entries {
                let next = descend(k, true);
                let node = match e {
                    DictEntry::Value(v) => annotate_at(&d.entry, v, &next, defaults),
                    DictEntry::Delete => Some(AnimNode::Endpoint(resolve(&next, defaults))),
                };
                if let Some(node) = node {
                    out.insert(k.clone(), node);
                }
            }
        }
        (AttrSpec::Tuple(t), AttrValue::List(items)) => {
            for (i, (child, item)) in t.entries.iter().zip(items).enumerate() {
                let key = i.to_string();
                if let Some(v) = item {
                    if let Some(node) = annotate_at(child, v, &descend(&key, false), defaults) {
                        out.insert(key, node);
                    }
                }
            }
        }
        (AttrSpec::Array(a), AttrValue::List(items)) => {
            for (i, item) in items.iter().enumerate() {
                let key = i.to_string();
                if let Some(v) = item {
                    if let Some(node) = annotate_at(&a.entry, v, &descend(&key, false), defaults) {
                        out.insert(key, node);
                    }
                }
            }
        }
        _ => {}
    }

    (!out.is_empty()).then_some(AnimNode::Branch(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::DictValue;
    use crate::spec::canvas_spec;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn tree(value: Value) -> AnimTree {
        serde_json::from_value(value).unwrap()
    }

    fn changed_nodes() -> AttrValue {
        let mut nodes = DictValue::new();
        nodes.insert(
            "A",
            AttrValue::record([
                ("pos", AttrValue::pair(1.0, 2.0)),
                ("color", AttrValue::string("red")),
                ("fixed", AttrValue::Bool(true)),
            ]),
        );
        nodes.insert("B", AttrValue::record([("pos", AttrValue::pair(3.0, 4.0))]));
        nodes.delete("C");
        AttrValue::record([("nodes", AttrValue::Dict(nodes))])
    }

    #[test]
    fn parses_settings_and_children() {
        let t = tree(json!({
            "duration": 1.0,
            "**": { "ease": "linear", "duration": 9.0 },
            "nodes": { "*": { "highlight": true } }
        }));
        assert_eq!(t.settings.duration, Some(1.0));
        assert_eq!(t.settings.ease.as_deref(), Some("linear"));
        assert_eq!(
            t.children["nodes"].children["*"].settings.highlight,
            Some(true)
        );
    }

    #[test]
    fn only_changed_endpoints_are_annotated() {
        let spec = canvas_spec();
        let defaults = AnimMeta::default();
        let out = annotate(&spec, &changed_nodes(), &[], &defaults).unwrap();

        assert_eq!(
            out.get_path(&["nodes", "A", "pos"]).and_then(AnimNode::meta),
            Some(&defaults)
        );
        assert!(out.get_path(&["nodes", "A", "color"]).is_some());
        // `fixed` is not an endpoint.
        assert_eq!(out.get_path(&["nodes", "A", "fixed"]), None);
        assert_eq!(out.get_path(&["nodes", "A", "size"]), None);
        assert_eq!(
            out.get_path(&["nodes", "C"]).and_then(AnimNode::meta),
            Some(&defaults)
        );
    }

    #[test]
    fn exact_key_beats_wildcard_and_deeper_beats_shallower() {
        let spec = canvas_spec();
        let layer = tree(json!({
            "duration": 1.0,
            "nodes": {
                "*": { "duration": 2.0, "ease": "linear" },
                "A": { "duration": 3.0, "pos": { "duration": 4.0 } }
            }
        }));
        let out = annotate(&spec, &changed_nodes(), &[&layer], &AnimMeta::default()).unwrap();

        let meta = |path: &[&str]| out.get_path(path).and_then(AnimNode::meta).cloned().unwrap();
        assert_eq!(meta(&["nodes", "A", "pos"]).duration, 4.0);
        assert_eq!(meta(&["nodes", "A", "color"]).duration, 3.0);
        // A still inherits the wildcard's ease.
        assert_eq!(meta(&["nodes", "A", "color"]).ease, "linear");
        assert_eq!(meta(&["nodes", "B", "pos"]).duration, 2.0);
    }

    #[test]
    fn explicit_layer_beats_stored_overrides() {
        let spec = canvas_spec();
        let explicit = tree(json!({ "duration": 0.1 }));
        let stored = tree(json!({ "nodes": { "*": { "duration": 5.0, "highlight": true } } }));
        let out = annotate(
            &spec,
            &changed_nodes(),
            &[&explicit, &stored],
            &AnimMeta::default(),
        )
        .unwrap();

        let meta = out
            .get_path(&["nodes", "B", "pos"])
            .and_then(AnimNode::meta)
            .unwrap();
        assert_eq!(meta.duration, 0.1);
        assert!(meta.highlight);
        assert_eq!(meta.linger, 0.5);
    }

    #[test]
    fn stored_overrides_merge() {
        let mut stored = tree(json!({ "duration": 1.0, "nodes": { "*": { "ease": "linear" } } }));
        stored.merge(&tree(json!({ "nodes": { "*": { "duration": 2.0 } } })));
        assert_eq!(stored.settings.duration, Some(1.0));
        let any = &stored.children["nodes"].children["*"].settings;
        assert_eq!(any.ease.as_deref(), Some("linear"));
        assert_eq!(any.duration, Some(2.0));
    }
}
