//! Second pass: derive variables top-down and evaluate the tree.
//!
//! Each scoped record first evaluates the fields that define its variables
//! against the inherited variables only, then pushes a frame and evaluates
//! its remaining fields. Subtrees with no change and no moved variable are
//! reused from the prior evaluation.

use crate::attr::ops::list_item;
use crate::attr::{AttrValue, DictEntry, DictValue};
use crate::expr::eval::eval_attr;
use crate::expr::scope::symbol_leaves;
use crate::expr::vars::{Boundary, Shape, VarDict, VarEntry};
use crate::expr::Var;
use crate::spec::{AttrSpec, RecordSpec, Scope};
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Field of a node label whose value picks the direction of `r`.
const LABEL_ANGLE: &str = "angle";
const NODE_SHAPE: &str = "shape";

#[derive(Debug, Clone, PartialEq)]
pub struct DeepEval {
    /// Full tree with every expression resolved to a number.
    pub evaluated: AttrValue,
    /// Partial tree of the leaves whose evaluated value changed, with
    /// `Delete` at removed dict keys. Endpoint tuples and arrays appear whole.
    pub changed: Option<AttrValue>,
}

/// Evaluate `stored` (the merged state, permanent expressions included).
///
/// `changes` is this update's change tree after the self-reference pass and
/// defaulting; `prior` the previous evaluated tree.
pub fn eval_deep(
    spec: &AttrSpec,
    stored: &AttrValue,
    changes: Option<&AttrValue>,
    prior: Option<&AttrValue>,
) -> DeepEval {
    let (evaluated, changed) = walk(spec, stored, changes, prior, &VarDict::new());
    DeepEval { evaluated, changed }
}

fn walk(
    spec: &AttrSpec,
    stored: &AttrValue,
    change: Option<&AttrValue>,
    prior: Option<&AttrValue>,
    vars: &VarDict,
) -> (AttrValue, Option<AttrValue>) {
    if change.is_none() && !vars.any_changed() {
        if let Some(prior) = prior {
            return (prior.clone(), None);
        }
    }

    match spec {
        AttrSpec::Primitive(_) => {
            let out = eval_attr(stored, prior, change, vars);
            let delta = out.changed.then(|| out.value.clone());
            (out.value, delta)
        }
        AttrSpec::Record(r) => walk_record(r, stored, change, prior, vars),
        AttrSpec::Dict(d) => {
            let change_dict = change.and_then(AttrValue::as_dict);
            let prior_dict = prior.and_then(AttrValue::as_dict);

            let mut out = DictValue::new();
            let mut delta = DictValue::new();
            if let Some(stored_dict) = stored.as_dict() {
                for (k, v) in stored_dict.values() {
                    let (value, d) = walk(
                        &d.entry,
                        v,
                        change_dict.and_then(|c| c.get(k)),
                        prior_dict.and_then(|p| p.get(k)),
                        vars,
                    );
                    out.insert(k, value);
                    if let Some(d) = d {
                        delta.insert(k, d);
                    }
                }
            }
            if let Some(change_dict) = change_dict {
                for (k, e) in &change_dict.entries {
                    let existed = prior_dict.is_some_and(|p| p.get(k).is_some());
                    if matches!(e, DictEntry::Delete) && existed {
                        delta.delete(k.clone());
                    }
                }
            }
            let delta = (!delta.entries.is_empty()).then_some(AttrValue::Dict(delta));
            (AttrValue::Dict(out), delta)
        }
        AttrSpec::Tuple(t) => {
            let mut items = Vec::with_capacity(t.entries.len());
            let mut deltas = Vec::with_capacity(t.entries.len());
            for (i, child) in t.entries.iter().enumerate() {
                match list_item(Some(stored), i) {
                    Some(s) => {
                        let (v, d) = walk(child, s, list_item(change, i), list_item(prior, i), vars);
                        items.push(Some(v));
                        deltas.push(d);
                    }
                    None => {
                        items.push(None);
                        deltas.push(None);
                    }
                }
            }
            let value = AttrValue::List(items);
            let delta = if deltas.iter().all(Option::is_none) {
                None
            } else if t.endpoint {
                Some(value.clone())
            } else {
                Some(AttrValue::List(deltas))
            };
            (value, delta)
        }
        AttrSpec::Array(a) => {
            let stored_items = stored.as_list().unwrap_or(&[]);
            let mut any = change.is_some();
            let items: Vec<Option<AttrValue>> = stored_items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    item.as_ref().map(|s| {
                        let (v, d) = walk(&a.entry, s, list_item(change, i), list_item(prior, i), vars);
                        any |= d.is_some();
                        v
                    })
                })
                .collect();
            let value = AttrValue::List(items);
            // Arrays are replaced atomically.
            let delta = any.then(|| value.clone());
            (value, delta)
        }
    }
}

fn walk_record(
    r: &RecordSpec,
    stored: &AttrValue,
    change: Option<&AttrValue>,
    prior: Option<&AttrValue>,
    vars: &VarDict,
) -> (AttrValue, Option<AttrValue>) {
    // Fields defining the scope's variables see only the inherited scope.
    let mut early: IndexMap<&str, (AttrValue, Option<AttrValue>)> = IndexMap::new();
    let scoped = r.scope.map(|scope| {
        for field in defining_fields(scope, r) {
            if let (Some(child), Some(s)) = (r.entries.get(field), stored.get(field)) {
                let out = walk(
                    child,
                    s,
                    change.and_then(|c| c.get(field)),
                    prior.and_then(|p| p.get(field)),
                    vars,
                );
                early.insert(field, out);
            }
        }
        let evaluated_early = AttrValue::Record(
            early
                .iter()
                .map(|(k, (v, _))| (k.to_string(), v.clone()))
                .collect(),
        );
        scope_vars(scope, r, &evaluated_early, stored, prior, vars)
    });
    let vars = scoped.as_ref().unwrap_or(vars);

    let mut out = IndexMap::new();
    let mut delta = IndexMap::new();
    for (k, child) in &r.entries {
        let (value, d) = match early.shift_remove(k) {
            Some(done) => done,
            None => {
                let Some(s) = stored.get(k) else {
                    continue;
                };
                walk(
                    child,
                    s,
                    change.and_then(|c| c.get(k)),
                    prior.and_then(|p| p.get(k)),
                    vars,
                )
            }
        };
        out.insert(k.to_string(), value);
        if let Some(d) = d {
            delta.insert(k.to_string(), d);
        }
    }

    let delta = (!delta.is_empty()).then_some(AttrValue::Record(delta));
    (AttrValue::Record(out), delta)
}

fn defining_fields(scope: Scope, r: &RecordSpec) -> Vec<&'static str> {
    let mut fields: Vec<&'static str> = Vec::new();
    for leaf in symbol_leaves(r) {
        if !fields.contains(&leaf.field) {
            fields.push(leaf.field);
        }
    }
    if scope == Scope::NodeLabel {
        fields.push(LABEL_ANGLE);
    }
    fields
}

/// Push the frame for a scoped record. `early` holds the evaluated defining
/// fields.
fn scope_vars(
    scope: Scope,
    r: &RecordSpec,
    early: &AttrValue,
    stored: &AttrValue,
    prior: Option<&AttrValue>,
    vars: &VarDict,
) -> VarDict {
    let mut frame: BTreeMap<Var, VarEntry> = BTreeMap::new();
    match scope {
        Scope::Canvas | Scope::Node => {
            for leaf in symbol_leaves(r) {
                let value = leaf.value_in(early).unwrap_or(leaf.default * leaf.var.scale());
                let before = prior.and_then(|p| leaf.value_in(p));
                frame.insert(leaf.var, VarEntry::new(value, before != Some(value)));
            }
        }
        Scope::NodeLabel => {
            let angle = early.get(LABEL_ANGLE).and_then(AttrValue::as_num).unwrap_or(0.0);
            let before = prior.and_then(|p| p.get(LABEL_ANGLE)).and_then(AttrValue::as_num);
            let (r_value, boundary_moved) = match vars.boundary() {
                Some(b) => (b.radius_at(angle), b.changed),
                None => (0.0, false),
            };
            let changed = boundary_moved || before != Some(angle);
            frame.insert(Var::R, VarEntry::new(r_value, changed));
        }
    }

    let next = vars.with_frame(frame);
    if scope != Scope::Node {
        return next;
    }

    let shape = |v: &AttrValue| {
        v.get(NODE_SHAPE)
            .and_then(AttrValue::as_str)
            .and_then(|s| s.parse::<Shape>().ok())
    };
    let own = next.own().cloned().unwrap_or_default();
    let x = own.get(&Var::X).copied().unwrap_or(VarEntry::new(0.0, false));
    let y = own.get(&Var::Y).copied().unwrap_or(VarEntry::new(0.0, false));
    let current_shape = shape(stored).unwrap_or(Shape::Circle);
    let boundary = Boundary {
        shape: current_shape,
        x: x.value,
        y: y.value,
        changed: x.changed || y.changed || prior.and_then(shape) != Some(current_shape),
    };
    next.with_boundary(boundary)
}
