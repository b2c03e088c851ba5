//! First pass: self-referential expressions.
//!
//! An expression is self-referential when it names a variable of its
//! innermost scope and that variable is being redefined by the same update
//! (or when the expression sits on the defining leaf itself, `size: ["2x", ..]`).
//! Those are evaluated against the variable's prior value and stored as plain
//! numbers. Everything else passes through unchanged for the deep pass.

use crate::attr::ops::list_item;
use crate::attr::{AttrValue, DictEntry, DictValue};
use crate::expr::scope::symbol_leaves;
use crate::expr::vars::Var;
use crate::spec::{AttrSpec, RecordSpec};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy)]
struct OwnVar {
    prior: f64,
    redefined: bool,
}

type OwnVars = BTreeMap<Var, OwnVar>;

/// Resolve self-referential expressions in `changes` against `prior`, the
/// previously evaluated tree (absent for brand-new entities, whose prior is
/// the schema default).
pub fn resolve_self_refs(spec: &AttrSpec, changes: &AttrValue, prior: Option<&AttrValue>) -> AttrValue {
    resolve_at(spec, changes, prior, &OwnVars::new())
}

fn resolve_at(spec: &AttrSpec, change: &AttrValue, prior: Option<&AttrValue>, own: &OwnVars) -> AttrValue {
    match (spec, change) {
        (AttrSpec::Primitive(p), AttrValue::Num(expr)) => {
            let Some(var) = expr.var() else {
                return change.clone();
            };
            match own.get(&var) {
                Some(o) if o.redefined || p.symbol.is_some() => {
                    AttrValue::number(expr.eval_with(o.prior))
                }
                _ => change.clone(),
            }
        }
        (AttrSpec::Record(r), AttrValue::Record(fields)) => {
            let scoped;
            let own = match r.scope {
                Some(_) => {
                    scoped = own_vars(r, change, prior);
                    &scoped
                }
                None => own,
            };
            AttrValue::Record(
                fields
                    .iter()
                    .map(|(k, v)| {
                        let resolved = match r.entries.get(k.as_str()) {
                            Some(child) => resolve_at(child, v, prior.and_then(|p| p.get(k)), own),
                            None => v.clone(),
                        };
                        (k.clone(), resolved)
                    })
                    .collect(),
            )
        }
        (AttrSpec::Dict(d), AttrValue::Dict(dict)) => AttrValue::Dict(DictValue {
            entries: dict
                .entries
                .iter()
                .map(|(k, e)| {
                    let resolved = match e {
                        DictEntry::Value(v) => DictEntry::Value(resolve_at(
                            &d.entry,
                            v,
                            prior.and_then(|p| p.get(k)),
                            own,
                        )),
                        DictEntry::Delete => DictEntry::Delete,
                    };
                    (k.clone(), resolved)
                })
                .collect(),
            template: dict.template.clone(),
        }),
        (AttrSpec::Tuple(t), AttrValue::List(items)) => AttrValue::List(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| match (t.entries.get(i), item) {
                    (Some(child), Some(v)) => Some(resolve_at(child, v, list_item(prior, i), own)),
                    (_, item) => item.clone(),
                })
                .collect(),
        ),
        (AttrSpec::Array(a), AttrValue::List(items)) => AttrValue::List(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    item.as_ref()
                        .map(|v| resolve_at(&a.entry, v, list_item(prior, i), own))
                })
                .collect(),
        ),
        _ => change.clone(),
    }
}

/// Variables a scoped record defines, with their prior values and whether
/// `change` touches their defining leaf.
fn own_vars(record: &RecordSpec, change: &AttrValue, prior: Option<&AttrValue>) -> OwnVars {
    symbol_leaves(record)
        .into_iter()
        .map(|leaf| {
            let prior_value = prior
                .and_then(|p| leaf.value_in(p))
                .unwrap_or(leaf.default * leaf.var.scale());
            let own = OwnVar {
                prior: prior_value,
                redefined: leaf.read(change).is_some(),
            };
            (leaf.var, own)
        })
        .collect()
}
