//! Dynamic defaults for newly created dict entries.
//!
//! Each rule is a deterministic function of how many entities of the same
//! kind already exist, so replaying the same updates places everything
//! identically:
//! - nodes are seeded on a golden-angle spiral and get a `value` label
//!   showing their id;
//! - edges take source/target from their id, and parallel edges (or
//!   repeated self-loops) get alternating curve offsets;
//! - labels default their text to their id, and extra node labels are
//!   spread around the node.
//!
//! The result is a partial tree meant to sit *under* the caller's changes.

use crate::attr::{AttrError, AttrErrorKind, AttrValue, DictEntry, DictValue};
use crate::config::Settings;
use crate::diagnostics;
use crate::spec::{AttrSpec, EntityKind, VALUE_LABEL};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::PI;
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeId {
    pub source: String,
    pub target: String,
    pub directed: bool,
}

static EDGE_ID_RE: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"^(?P<source>[^-]+)(?P<arrow>->|-)(?P<target>[^->][^-]*)(?:-.+)?$")
});

/// Parse `A-B`, `A-B-key`, `A->B` or `A->B-key`.
pub fn parse_edge_id(id: &str) -> Option<EdgeId> {
    let re = EDGE_ID_RE.as_ref().ok()?;
    let caps = re.captures(id)?;
    Some(EdgeId {
        source: caps["source"].to_string(),
        target: caps["target"].to_string(),
        directed: &caps["arrow"] == "->",
    })
}

/// Symmetric count of edges between each pair of nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Adjacency {
    counts: BTreeMap<(String, String), usize>,
}

impl Adjacency {
    fn key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    pub fn count(&self, a: &str, b: &str) -> usize {
        self.counts.get(&Self::key(a, b)).copied().unwrap_or(0)
    }

    /// Register one more edge and return how many existed before it.
    pub fn add(&mut self, a: &str, b: &str) -> usize {
        let n = self.counts.entry(Self::key(a, b)).or_insert(0);
        let before = *n;
        *n += 1;
        before
    }

    pub fn remove(&mut self, a: &str, b: &str) {
        let key = Self::key(a, b);
        if let Some(n) = self.counts.get_mut(&key) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                self.counts.remove(&key);
            }
        }
    }
}

/// Seed position of the `index`-th node on a golden-angle spiral.
pub fn init_pos(index: usize, offset: f64) -> [f64; 2] {
    if index == 0 {
        return [0.0, 0.0];
    }
    let radius = offset * (index as f64).sqrt();
    let angle = index as f64 * PI * (3.0 - 5f64.sqrt());
    [radius * angle.cos(), radius * angle.sin()]
}

/// Angle (degrees) of the `i`-th extra label around a node.
pub fn label_angle(i: usize) -> f64 {
    let rad = 3.0 * PI / 4.0 - (PI / 2.0) * (i % 4) as f64 - (i / 4) as f64 * (PI / 4.0);
    rad.to_degrees()
}

/// Curve control points of the `n`-th edge between `source` and `target`.
pub fn edge_path(source: &str, target: &str, n: usize, settings: &Settings) -> Vec<[f64; 2]> {
    if source == target {
        let height = settings.loop_size + (n / 2) as f64 * settings.edge_spacing;
        let h = if n % 2 == 0 { height } else { -height };
        return vec![[-height / 2.0, h], [height / 2.0, h]];
    }
    if n == 0 {
        return Vec::new();
    }
    let side = if n % 2 == 1 { 1.0 } else { -1.0 };
    let mut offset = side * n.div_ceil(2) as f64 * settings.edge_spacing;
    // Keep the curve on the same side whichever way the edge was named.
    if source > target {
        offset = -offset;
    }
    vec![[0.0, offset]]
}

fn path_value(points: &[[f64; 2]]) -> AttrValue {
    AttrValue::list(points.iter().map(|[x, y]| AttrValue::pair(*x, *y)))
}

fn text_label(text: &str) -> AttrValue {
    AttrValue::record([("text", AttrValue::string(text))])
}

fn value_label(node_id: &str) -> AttrValue {
    AttrValue::record([
        ("text", AttrValue::string(node_id)),
        ("radius", AttrValue::number(0.0)),
        ("align", AttrValue::string("middle")),
    ])
}

/// Keys of `change` whose entries are new relative to `existing`.
fn new_keys<'a>(
    existing: Option<&'a DictValue>,
    change: Option<&'a DictValue>,
) -> impl Iterator<Item = &'a str> {
    change
        .into_iter()
        .flat_map(|c| c.values())
        .filter(move |(k, _)| existing.and_then(|e| e.get(k)).is_none())
        .map(|(k, _)| k)
}

fn str_field<'a>(value: &'a AttrValue, key: &str) -> Option<&'a str> {
    value.get(key).and_then(AttrValue::as_str)
}

fn endpoints(edge: &AttrValue) -> (String, String) {
    (
        str_field(edge, "source").unwrap_or("").to_string(),
        str_field(edge, "target").unwrap_or("").to_string(),
    )
}

fn dict_at<'a>(value: Option<&'a AttrValue>, key: &str) -> Option<&'a DictValue> {
    value.and_then(|v| v.get(key)).and_then(AttrValue::as_dict)
}

/// Generated defaults for the entities `changes` creates or deletes, and the
/// adjacency counts after applying them. Which policy runs for a dict is
/// chosen by its `DictSpec::entity` kind.
pub fn generate(
    spec: &AttrSpec,
    settings: &Settings,
    current: &AttrValue,
    changes: &AttrValue,
    adjacency: &Adjacency,
) -> Result<(AttrValue, Adjacency), AttrError> {
    let mut generator = Generator {
        settings,
        adjacency: adjacency.clone(),
        nodes: BTreeSet::new(),
        removed_nodes: BTreeSet::new(),
    };
    let mut out = AttrValue::record::<&str>([]);

    for (key, kind) in spec.entity_dicts() {
        let Some(entry) = entry_spec(spec, key) else {
            continue;
        };
        let existing = dict_at(Some(current), key);
        let change = dict_at(Some(changes), key);
        let generated = match kind {
            EntityKind::Node => Some(generator.nodes(entry, existing, change)),
            EntityKind::Edge => Some(generator.edges(key, entry, existing, change)?),
            EntityKind::NodeLabel | EntityKind::EdgeLabel | EntityKind::CanvasLabel => {
                label_policy(kind, "", false, existing, change)
            }
        };
        if let Some(dict) = generated.filter(|d| !d.entries.is_empty()) {
            out.set(key, AttrValue::Dict(dict));
        }
    }
    Ok((out, generator.adjacency))
}

struct Generator<'a> {
    settings: &'a Settings,
    adjacency: Adjacency,
    /// Node ids present after the update.
    nodes: BTreeSet<String>,
    removed_nodes: BTreeSet<String>,
}

impl Generator<'_> {
    fn nodes(
        &mut self,
        entry: &AttrSpec,
        existing: Option<&DictValue>,
        change: Option<&DictValue>,
    ) -> DictValue {
        let mut out = DictValue::new();
        let mut count = existing.map_or(0, DictValue::len);
        self.nodes
            .extend(existing.into_iter().flat_map(|d| d.keys()).map(str::to_string));

        for (id, entry_change) in change.map(|d| &d.entries).into_iter().flatten() {
            let prior = existing.and_then(|d| d.get(id));
            match entry_change {
                DictEntry::Delete => {
                    if prior.is_some() {
                        self.nodes.remove(id);
                        self.removed_nodes.insert(id.clone());
                    }
                }
                DictEntry::Value(node_change) => {
                    self.nodes.insert(id.clone());
                    let mut node = AttrValue::record::<&str>([]);
                    if prior.is_none() {
                        let [x, y] = init_pos(count, self.settings.node_spacing);
                        node.set("pos", AttrValue::pair(x, y));
                        count += 1;
                    }
                    nested_entities(entry, id, prior, node_change, &mut node);
                    if node.as_record().is_some_and(|r| !r.is_empty()) {
                        out.insert(id.clone(), node);
                    }
                }
            }
        }
        out
    }

    fn edges(
        &mut self,
        key: &str,
        entry: &AttrSpec,
        existing: Option<&DictValue>,
        change: Option<&DictValue>,
    ) -> Result<DictValue, AttrError> {
        let mut out = DictValue::new();

        for (edge_id, edge) in existing.into_iter().flat_map(|d| d.values()) {
            let (source, target) = endpoints(edge);
            if self.removed_nodes.contains(&source) || self.removed_nodes.contains(&target) {
                out.delete(edge_id);
                self.adjacency.remove(&source, &target);
            }
        }

        for (edge_id, entry_change) in change.map(|d| &d.entries).into_iter().flatten() {
            let prior = existing.and_then(|d| d.get(edge_id));
            let path = || vec![key.to_string(), edge_id.clone()];
            match (entry_change, prior) {
                (DictEntry::Delete, Some(edge)) => {
                    if !out.is_deleted(edge_id) {
                        let (source, target) = endpoints(edge);
                        self.adjacency.remove(&source, &target);
                    }
                }
                (DictEntry::Delete, None) => {}
                (DictEntry::Value(edge_change), None) => {
                    let parsed = parse_edge_id(edge_id);
                    let given = (str_field(edge_change, "source"), str_field(edge_change, "target"));
                    let (source, target) = match (given.0, given.1, &parsed) {
                        (Some(s), Some(t), _) => (s.to_string(), t.to_string()),
                        (s, t, Some(p)) => (
                            s.unwrap_or(p.source.as_str()).to_string(),
                            t.unwrap_or(p.target.as_str()).to_string(),
                        ),
                        _ => {
                            return Err(AttrError::new(
                                &path(),
                                AttrErrorKind::EdgeId(edge_id.clone()),
                            ));
                        }
                    };
                    for end in [&source, &target] {
                        if self.removed_nodes.contains(end) {
                            return Err(AttrError::new(
                                &path(),
                                AttrErrorKind::DeletedNode(end.clone()),
                            ));
                        }
                        if !self.nodes.contains(end) {
                            diagnostics::warn(format!(
                                "edge {:?} refers to unknown node {:?}",
                                edge_id, end
                            ));
                        }
                    }

                    let n = self.adjacency.add(&source, &target);
                    let mut edge = AttrValue::record([
                        ("source", AttrValue::string(source.as_str())),
                        ("target", AttrValue::string(target.as_str())),
                    ]);
                    if parsed.as_ref().is_some_and(|p| p.directed) {
                        edge.set("directed", AttrValue::Bool(true));
                    }
                    if edge_change.get("path").is_none() {
                        edge.set(
                            "path",
                            path_value(&edge_path(&source, &target, n, self.settings)),
                        );
                    }
                    nested_entities(entry, edge_id, None, edge_change, &mut edge);
                    out.insert(edge_id.clone(), edge);
                }
                (DictEntry::Value(edge_change), Some(edge)) => {
                    let mut generated = AttrValue::record::<&str>([]);
                    nested_entities(entry, edge_id, Some(edge), edge_change, &mut generated);
                    if generated.as_record().is_some_and(|r| !r.is_empty()) {
                        out.insert(edge_id.clone(), generated);
                    }
                }
            }
        }
        Ok(out)
    }
}

fn entry_spec<'a>(spec: &'a AttrSpec, key: &str) -> Option<&'a AttrSpec> {
    match spec.child(key)? {
        AttrSpec::Dict(d) => Some(d.entry.as_ref()),
        _ => None,
    }
}

/// Label dicts inside one node or edge.
fn nested_entities(
    entry: &AttrSpec,
    owner: &str,
    existing: Option<&AttrValue>,
    change: &AttrValue,
    into: &mut AttrValue,
) {
    for (key, kind) in entry.entity_dicts() {
        let generated = label_policy(
            kind,
            owner,
            existing.is_none(),
            dict_at(existing, key),
            dict_at(Some(change), key),
        );
        if let Some(dict) = generated.filter(|d| !d.entries.is_empty()) {
            into.set(key, AttrValue::Dict(dict));
        }
    }
}

/// Nodes and edges only live at the canvas root; nested they get nothing.
fn label_policy(
    kind: EntityKind,
    owner: &str,
    owner_is_new: bool,
    existing: Option<&DictValue>,
    change: Option<&DictValue>,
) -> Option<DictValue> {
    match kind {
        EntityKind::NodeLabel => Some(node_labels(owner, owner_is_new, existing, change)),
        EntityKind::EdgeLabel | EntityKind::CanvasLabel => Some(text_labels(existing, change)),
        EntityKind::Node | EntityKind::Edge => None,
    }
}

/// New labels of a node: the `value` slot for a new node, radial placement
/// for the rest.
fn node_labels(
    node_id: &str,
    node_is_new: bool,
    existing: Option<&DictValue>,
    change: Option<&DictValue>,
) -> DictValue {
    let mut out = DictValue::new();
    if node_is_new {
        out.insert(VALUE_LABEL, value_label(node_id));
    }
    let mut i = existing.map_or(0, |d| d.keys().filter(|k| *k != VALUE_LABEL).count());
    for key in new_keys(existing, change) {
        if key == VALUE_LABEL {
            out.insert(VALUE_LABEL, value_label(node_id));
            continue;
        }
        let mut label = text_label(key);
        label.set("angle", AttrValue::number(label_angle(i)));
        out.insert(key, label);
        i += 1;
    }
    out
}

fn text_labels(existing: Option<&DictValue>, change: Option<&DictValue>) -> DictValue {
    let mut out = DictValue::new();
    for key in new_keys(existing, change) {
        out.insert(key, text_label(key));
    }
    out
}
