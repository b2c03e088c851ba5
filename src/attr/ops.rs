//! Generic recursive operations over spec-shaped trees.
//!
//! All operations dispatch on the spec tag and are total on well-typed input.
//! Absence always means "unchanged"; `DictEntry::Delete` means "remove this
//! key" and is only meaningful inside a dict.

use crate::attr::value::{AttrValue, DictEntry, DictValue};
use crate::spec::{AttrSpec, PrimitiveSpec};
use indexmap::IndexMap;
use std::borrow::Cow;

/// Walk matching positions of two optional trees, calling `leaf` at every
/// primitive position and rebuilding containers elsewhere.
///
/// Dicts iterate the union of keys (`prev` order first, then keys only in
/// `next`). A `Delete` in `next` wins; a `Delete` only in `prev` is kept.
/// Empty containers collapse to `None`.
pub fn combine<F>(
    spec: &AttrSpec,
    prev: Option<&AttrValue>,
    next: Option<&AttrValue>,
    leaf: &mut F,
) -> Option<AttrValue>
where
    F: FnMut(Option<&AttrValue>, Option<&AttrValue>, &str, &PrimitiveSpec) -> Option<AttrValue>,
{
    combine_at(spec, prev, next, "", leaf)
}

fn combine_at<F>(
    spec: &AttrSpec,
    prev: Option<&AttrValue>,
    next: Option<&AttrValue>,
    key: &str,
    leaf: &mut F,
) -> Option<AttrValue>
where
    F: FnMut(Option<&AttrValue>, Option<&AttrValue>, &str, &PrimitiveSpec) -> Option<AttrValue>,
{
    if prev.is_none() && next.is_none() {
        return None;
    }

    match spec {
        AttrSpec::Primitive(p) => leaf(prev, next, key, p),
        AttrSpec::Record(r) => {
            let mut out = IndexMap::new();
            for (k, child) in &r.entries {
                let p = prev.and_then(|v| v.get(k));
                let n = next.and_then(|v| v.get(k));
                if let Some(v) = combine_at(child, p, n, k, leaf) {
                    out.insert(k.to_string(), v);
                }
            }
            (!out.is_empty()).then_some(AttrValue::Record(out))
        }
        AttrSpec::Dict(d) => {
            let prev_dict = prev.and_then(AttrValue::as_dict);
            let next_dict = next.and_then(AttrValue::as_dict);

            let mut keys: Vec<&str> = Vec::new();
            for dict in [prev_dict, next_dict].into_iter().flatten() {
                for k in dict.entries.keys() {
                    if !keys.contains(&k.as_str()) {
                        keys.push(k.as_str());
                    }
                }
            }

            let mut out = DictValue::new();
            for k in keys {
                let p = prev_dict.and_then(|dv| dv.entries.get(k));
                let n = next_dict.and_then(|dv| dv.entries.get(k));
                match (p, n) {
                    (_, Some(DictEntry::Delete)) | (Some(DictEntry::Delete), None) => {
                        out.delete(k);
                    }
                    (p, n) => {
                        let pv = match p {
                            Some(DictEntry::Value(v)) => Some(v),
                            _ => None,
                        };
                        let nv = match n {
                            Some(DictEntry::Value(v)) => Some(v),
                            _ => None,
                        };
                        if let Some(v) = combine_at(&d.entry, pv, nv, k, leaf) {
                            out.insert(k, v);
                        }
                    }
                }
            }
            (!out.entries.is_empty()).then_some(AttrValue::Dict(out))
        }
        AttrSpec::Tuple(t) => {
            let items: Vec<Option<AttrValue>> = t
                .entries
                .iter()
                .enumerate()
                .map(|(i, child)| {
                    combine_at(child, list_item(prev, i), list_item(next, i), &i.to_string(), leaf)
                })
                .collect();
            items.iter().any(Option::is_some).then_some(AttrValue::List(items))
        }
        AttrSpec::Array(a) => {
            let len = list_len(prev).max(list_len(next));
            let items: Vec<Option<AttrValue>> = (0..len)
                .map(|i| {
                    combine_at(&a.entry, list_item(prev, i), list_item(next, i), &i.to_string(), leaf)
                })
                .collect();
            items.iter().any(Option::is_some).then_some(AttrValue::List(items))
        }
    }
}

/// Overlay two partial trees; leaves of `top` win.
pub fn overlay(spec: &AttrSpec, base: Option<&AttrValue>, top: Option<&AttrValue>) -> Option<AttrValue> {
    combine(spec, base, top, &mut |b, t, _, _| t.or(b).cloned())
}

/// Deep-overlay `changes` onto `prev`. A `Delete` dict entry removes the key.
pub fn merge(prev: &AttrValue, changes: &AttrValue, spec: &AttrSpec) -> AttrValue {
    match (spec, prev, changes) {
        (AttrSpec::Record(r), AttrValue::Record(p), AttrValue::Record(c)) => {
            let mut out = p.clone();
            for (k, change) in c {
                let Some(child) = r.entries.get(k.as_str()) else {
                    continue;
                };
                let merged = match p.get(k) {
                    Some(existing) => merge(existing, change, child),
                    None => change.clone(),
                };
                out.insert(k.clone(), merged);
            }
            AttrValue::Record(out)
        }
        (AttrSpec::Dict(d), AttrValue::Dict(p), AttrValue::Dict(c)) => {
            let mut out = DictValue {
                entries: p
                    .entries
                    .iter()
                    .filter(|(_, e)| matches!(e, DictEntry::Value(_)))
                    .map(|(k, e)| (k.clone(), e.clone()))
                    .collect(),
                template: p.template.clone(),
            };
            for (k, entry) in &c.entries {
                match entry {
                    DictEntry::Delete => {
                        out.entries.shift_remove(k);
                    }
                    DictEntry::Value(change) => {
                        let merged = match p.get(k) {
                            Some(existing) => merge(existing, change, &d.entry),
                            None => change.clone(),
                        };
                        out.insert(k.clone(), merged);
                    }
                }
            }
            AttrValue::Dict(out)
        }
        (AttrSpec::Tuple(t), AttrValue::List(p), AttrValue::List(c)) => AttrValue::List(
            t.entries
                .iter()
                .enumerate()
                .map(|(i, child)| merge_item(child, p.get(i), c.get(i)))
                .collect(),
        ),
        // Arrays take the length of the change.
        (AttrSpec::Array(a), AttrValue::List(p), AttrValue::List(c)) => AttrValue::List(
            (0..c.len())
                .map(|i| merge_item(&a.entry, p.get(i), c.get(i)))
                .collect(),
        ),
        _ => changes.clone(),
    }
}

fn merge_item(
    spec: &AttrSpec,
    prev: Option<&Option<AttrValue>>,
    change: Option<&Option<AttrValue>>,
) -> Option<AttrValue> {
    match (prev.and_then(Option::as_ref), change.and_then(Option::as_ref)) {
        (Some(p), Some(c)) => Some(merge(p, c, spec)),
        (p, c) => c.or(p).cloned(),
    }
}

/// Map every primitive leaf, preserving structure. Dict templates and
/// `Delete` entries pass through untouched.
pub fn map_attr<F>(spec: &AttrSpec, value: &AttrValue, f: &mut F) -> AttrValue
where
    F: FnMut(&AttrValue, &PrimitiveSpec) -> AttrValue,
{
    match (spec, value) {
        (AttrSpec::Primitive(p), v) => f(v, p),
        (AttrSpec::Record(r), AttrValue::Record(entries)) => AttrValue::Record(
            entries
                .iter()
                .map(|(k, v)| {
                    let mapped = match r.entries.get(k.as_str()) {
                        Some(child) => map_attr(child, v, f),
                        None => v.clone(),
                    };
                    (k.clone(), mapped)
                })
                .collect(),
        ),
        (AttrSpec::Dict(d), AttrValue::Dict(dict)) => AttrValue::Dict(DictValue {
            entries: dict
                .entries
                .iter()
                .map(|(k, e)| {
                    let mapped = match e {
                        DictEntry::Value(v) => DictEntry::Value(map_attr(&d.entry, v, f)),
                        DictEntry::Delete => DictEntry::Delete,
                    };
                    (k.clone(), mapped)
                })
                .collect(),
            template: dict.template.clone(),
        }),
        (AttrSpec::Tuple(t), AttrValue::List(items)) => AttrValue::List(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| match (t.entries.get(i), item) {
                    (Some(child), Some(v)) => Some(map_attr(child, v, f)),
                    (_, item) => item.clone(),
                })
                .collect(),
        ),
        (AttrSpec::Array(a), AttrValue::List(items)) => AttrValue::List(
            items
                .iter()
                .map(|item| item.as_ref().map(|v| map_attr(&a.entry, v, f)))
                .collect(),
        ),
        (_, v) => v.clone(),
    }
}

/// Fold over every primitive leaf in tree order.
pub fn reduce_attr<T, F>(spec: &AttrSpec, value: &AttrValue, init: T, f: &mut F) -> T
where
    F: FnMut(T, &AttrValue, &PrimitiveSpec) -> T,
{
    match (spec, value) {
        (AttrSpec::Primitive(p), v) => f(init, v, p),
        (AttrSpec::Record(r), AttrValue::Record(entries)) => {
            entries.iter().fold(init, |acc, (k, v)| match r.entries.get(k.as_str()) {
                Some(child) => reduce_attr(child, v, acc, f),
                None => acc,
            })
        }
        (AttrSpec::Dict(d), AttrValue::Dict(dict)) => dict
            .values()
            .fold(init, |acc, (_, v)| reduce_attr(&d.entry, v, acc, f)),
        (AttrSpec::Tuple(t), AttrValue::List(items)) => {
            items
                .iter()
                .enumerate()
                .fold(init, |acc, (i, item)| match (t.entries.get(i), item) {
                    (Some(child), Some(v)) => reduce_attr(child, v, acc, f),
                    _ => acc,
                })
        }
        (AttrSpec::Array(a), AttrValue::List(items)) => items
            .iter()
            .flatten()
            .fold(init, |acc, v| reduce_attr(&a.entry, v, acc, f)),
        (_, _) => init,
    }
}

/// Number of primitive leaves present in a (partial) tree.
pub fn leaf_count(spec: &AttrSpec, value: &AttrValue) -> usize {
    reduce_attr(spec, value, 0usize, &mut |n, _, _| n + 1)
}

/// Fill unspecified subtrees from `defaults`.
///
/// With no `prev` (a brand-new entity) the result is a full tree. With a
/// `prev`, only dict keys that do not exist yet are defaulted; everything
/// else passes through `changes` unmodified.
pub fn apply_defaults(
    spec: &AttrSpec,
    prev: Option<&AttrValue>,
    changes: Option<&AttrValue>,
    defaults: &AttrValue,
) -> Option<AttrValue> {
    if prev.is_some() && changes.is_none() {
        return None;
    }

    match spec {
        AttrSpec::Primitive(_) => match changes {
            Some(c) => Some(c.clone()),
            None => Some(defaults.clone()),
        },
        AttrSpec::Record(r) => {
            let mut out = IndexMap::new();
            for (k, child) in &r.entries {
                let c = changes.and_then(|v| v.get(k));
                let p = prev.and_then(|v| v.get(k));
                let d = default_child(defaults, k, child);
                if let Some(v) = apply_defaults(child, p, c, &d) {
                    out.insert(k.to_string(), v);
                }
            }
            Some(AttrValue::Record(out))
        }
        AttrSpec::Dict(d) => {
            let template = match defaults.as_dict().and_then(|dv| dv.template.as_deref()) {
                Some(t) => Cow::Borrowed(t),
                None => Cow::Owned(d.entry.defaults()),
            };
            let prev_dict = prev.and_then(AttrValue::as_dict);

            let mut out = DictValue::new();
            if let Some(change_dict) = changes.and_then(AttrValue::as_dict) {
                for (k, entry) in &change_dict.entries {
                    let existing = prev_dict.and_then(|dv| dv.get(k));
                    match entry {
                        DictEntry::Delete => {
                            if existing.is_some() {
                                out.delete(k.clone());
                            }
                        }
                        DictEntry::Value(c) => {
                            if let Some(v) = apply_defaults(&d.entry, existing, Some(c), &template)
                            {
                                out.insert(k.clone(), v);
                            }
                        }
                    }
                }
            }
            Some(AttrValue::Dict(out))
        }
        AttrSpec::Tuple(t) => Some(AttrValue::List(
            t.entries
                .iter()
                .enumerate()
                .map(|(i, child)| {
                    let c = list_item(changes, i);
                    let p = list_item(prev, i);
                    if prev.is_some() && c.is_none() {
                        return None;
                    }
                    let d = default_item(defaults, i, child);
                    apply_defaults(child, p, c, &d)
                })
                .collect(),
        )),
        AttrSpec::Array(_) => match changes {
            Some(c) => Some(c.clone()),
            None => Some(defaults.clone()),
        },
    }
}

fn default_child<'a>(defaults: &'a AttrValue, key: &str, spec: &AttrSpec) -> Cow<'a, AttrValue> {
    match defaults.get(key) {
        Some(d) => Cow::Borrowed(d),
        None => Cow::Owned(spec.defaults()),
    }
}

fn default_item<'a>(defaults: &'a AttrValue, index: usize, spec: &AttrSpec) -> Cow<'a, AttrValue> {
    match list_item(Some(defaults), index) {
        Some(d) => Cow::Borrowed(d),
        None => Cow::Owned(spec.defaults()),
    }
}

pub(crate) fn list_item(value: Option<&AttrValue>, index: usize) -> Option<&AttrValue> {
    value
        .and_then(AttrValue::as_list)
        .and_then(|items| items.get(index))
        .and_then(Option::as_ref)
}

fn list_len(value: Option<&AttrValue>) -> usize {
    value.and_then(AttrValue::as_list).map(<[_]>::len).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn node_spec() -> AttrSpec {
        AttrSpec::record([
            ("color", AttrSpec::string("gray")),
            (
                "pos",
                AttrSpec::tuple(vec![AttrSpec::number(0.0), AttrSpec::number(0.0)]),
            ),
            (
                "labels",
                AttrSpec::dict(AttrSpec::record([
                    ("text", AttrSpec::string("")),
                    ("size", AttrSpec::number(12.0)),
                ])),
            ),
        ])
    }

    fn canvas_spec() -> AttrSpec {
        AttrSpec::record([
            ("zoom", AttrSpec::number(1.0)),
            ("nodes", AttrSpec::dict(node_spec())),
        ])
    }

    fn full_canvas() -> AttrValue {
        let spec = canvas_spec();
        let changes = AttrValue::record([(
            "nodes",
            AttrValue::dict([
                ("A", AttrValue::record([("color", AttrValue::string("red"))])),
                ("B", AttrValue::record::<&str>([])),
            ]),
        )]);
        let base = apply_defaults(&spec, None, None, &spec.defaults()).unwrap();
        let with_defaults =
            apply_defaults(&spec, Some(&base), Some(&changes), &spec.defaults()).unwrap();
        merge(&base, &with_defaults, &spec)
    }

    #[test]
    fn new_entity_defaults_fill_everything() {
        let canvas = full_canvas();
        assert_eq!(
            canvas.get_path(&["nodes", "A"]),
            Some(&AttrValue::record([
                ("color", AttrValue::string("red")),
                ("pos", AttrValue::pair(0.0, 0.0)),
                ("labels", AttrValue::Dict(DictValue::new())),
            ]))
        );
        assert_eq!(
            canvas.get_path(&["nodes", "B", "color"]),
            Some(&AttrValue::string("gray"))
        );
        assert_eq!(canvas.get("zoom"), Some(&AttrValue::number(1.0)));
    }

    #[test]
    fn existing_entity_only_defaults_new_dict_keys() {
        let spec = canvas_spec();
        let canvas = full_canvas();
        let changes = AttrValue::record([(
            "nodes",
            AttrValue::dict([(
                "A",
                AttrValue::record([
                    ("pos", AttrValue::List(vec![None, Some(AttrValue::number(5.0))])),
                    (
                        "labels",
                        AttrValue::dict([("L", AttrValue::record([("text", AttrValue::string("hi"))]))]),
                    ),
                ]),
            )]),
        )]);

        let defaulted =
            apply_defaults(&spec, Some(&canvas), Some(&changes), &spec.defaults()).unwrap();

        // The existing node keeps a sparse change; the new label is complete.
        assert_eq!(defaulted.get_path(&["nodes", "A", "color"]), None);
        assert_eq!(
            defaulted.get_path(&["nodes", "A", "pos"]),
            Some(&AttrValue::List(vec![None, Some(AttrValue::number(5.0))]))
        );
        assert_eq!(
            defaulted.get_path(&["nodes", "A", "labels", "L"]),
            Some(&AttrValue::record([
                ("text", AttrValue::string("hi")),
                ("size", AttrValue::number(12.0)),
            ]))
        );
        assert_eq!(defaulted.get("zoom"), None);

        let merged = merge(&canvas, &defaulted, &spec);
        assert_eq!(
            merged.get_path(&["nodes", "A", "pos"]).and_then(AttrValue::as_pair),
            Some([0.0, 5.0])
        );
        assert_eq!(
            merged.get_path(&["nodes", "A", "color"]),
            Some(&AttrValue::string("red"))
        );
    }

    #[test]
    fn merge_is_idempotent() {
        let spec = canvas_spec();
        let canvas = full_canvas();
        let mut nodes = DictValue::new();
        nodes.insert("A", AttrValue::record([("color", AttrValue::string("blue"))]));
        nodes.delete("B");
        let changes = AttrValue::record([
            ("zoom", AttrValue::number(2.0)),
            ("nodes", AttrValue::Dict(nodes)),
        ]);

        let once = merge(&canvas, &changes, &spec);
        let twice = merge(&once, &changes, &spec);
        assert_eq!(once, twice);
        assert_eq!(once.get_path(&["nodes", "B"]), None);
    }

    #[test]
    fn dict_delete_then_recreate_is_a_new_entity() {
        let spec = canvas_spec();
        let canvas = full_canvas();

        let mut nodes = DictValue::new();
        nodes.delete("A");
        let deleted = merge(&canvas, &AttrValue::record([("nodes", AttrValue::Dict(nodes))]), &spec);
        assert_eq!(deleted.get_path(&["nodes", "A"]), None);
        assert_eq!(
            deleted.get("nodes").and_then(AttrValue::as_dict).map(|d| d.keys().collect::<Vec<_>>()),
            Some(vec!["B"])
        );

        let recreate = AttrValue::record([(
            "nodes",
            AttrValue::dict([("A", AttrValue::record([("pos", AttrValue::pair(1.0, 2.0))]))]),
        )]);
        let defaulted =
            apply_defaults(&spec, Some(&deleted), Some(&recreate), &spec.defaults()).unwrap();
        let merged = merge(&deleted, &defaulted, &spec);

        // The old color is gone: the entry was rebuilt from the template.
        assert_eq!(
            merged.get_path(&["nodes", "A", "color"]),
            Some(&AttrValue::string("gray"))
        );
        assert_eq!(
            merged.get_path(&["nodes", "A", "pos"]).and_then(AttrValue::as_pair),
            Some([1.0, 2.0])
        );
    }

    #[test]
    fn delete_of_missing_key_is_dropped_by_defaults() {
        let spec = canvas_spec();
        let canvas = full_canvas();
        let mut nodes = DictValue::new();
        nodes.delete("Z");
        let changes = AttrValue::record([("nodes", AttrValue::Dict(nodes))]);
        let defaulted =
            apply_defaults(&spec, Some(&canvas), Some(&changes), &spec.defaults()).unwrap();
        assert_eq!(
            defaulted.get("nodes"),
            Some(&AttrValue::Dict(DictValue::new()))
        );
    }

    #[test]
    fn combine_walks_key_union_and_keeps_deletes() {
        let spec = AttrSpec::dict(AttrSpec::number(0.0));
        let mut prev = DictValue::new();
        prev.insert("a", AttrValue::number(1.0));
        prev.insert("b", AttrValue::number(2.0));
        let mut next = DictValue::new();
        next.delete("b");
        next.insert("c", AttrValue::number(3.0));

        let mut seen = Vec::new();
        let out = combine(
            &spec,
            Some(&AttrValue::Dict(prev)),
            Some(&AttrValue::Dict(next)),
            &mut |p, n, key, _| {
                seen.push(key.to_string());
                n.or(p).cloned()
            },
        )
        .unwrap();

        assert_eq!(seen, vec!["a", "c"]);
        let dict = out.as_dict().unwrap();
        assert_eq!(dict.entries.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert!(dict.is_deleted("b"));
        assert_eq!(dict.get("c"), Some(&AttrValue::number(3.0)));
    }

    #[test]
    fn overlay_prefers_top_and_collapses_empty() {
        let spec = node_spec();
        let base = AttrValue::record([
            ("color", AttrValue::string("gray")),
            ("pos", AttrValue::pair(1.0, 1.0)),
        ]);
        let top = AttrValue::record([("pos", AttrValue::List(vec![Some(AttrValue::number(9.0)), None]))]);

        let out = overlay(&spec, Some(&base), Some(&top)).unwrap();
        assert_eq!(out.get("color"), Some(&AttrValue::string("gray")));
        assert_eq!(out.get("pos").and_then(AttrValue::as_pair), Some([9.0, 1.0]));

        assert_eq!(overlay(&spec, None, Some(&AttrValue::record::<&str>([]))), None);
    }

    #[test]
    fn arrays_take_the_change_length() {
        let spec = AttrSpec::array(AttrSpec::number(0.0));
        let prev = AttrValue::list([AttrValue::number(1.0), AttrValue::number(2.0)]);
        let merged = merge(&prev, &AttrValue::list([]), &spec);
        assert_eq!(merged, AttrValue::List(vec![]));
    }

    #[test]
    fn map_and_reduce_visit_leaves() {
        let spec = canvas_spec();
        let canvas = full_canvas();

        assert_eq!(leaf_count(&spec, &canvas), 1 + 2 * 3);

        let shouty = map_attr(&spec, &canvas, &mut |v, _| match v {
            AttrValue::Str(s) => AttrValue::string(s.to_uppercase()),
            other => other.clone(),
        });
        assert_eq!(
            shouty.get_path(&["nodes", "A", "color"]),
            Some(&AttrValue::string("RED"))
        );

        let colors = reduce_attr(&spec, &canvas, Vec::new(), &mut |mut acc, v, _| {
            if let Some(s) = v.as_str() {
                acc.push(s.to_string());
            }
            acc
        });
        assert_eq!(colors, vec!["red", "gray"]);
    }
}
