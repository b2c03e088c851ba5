//! Scope bookkeeping shared by both evaluation passes.

use crate::attr::ops::list_item;
use crate::attr::{AttrError, AttrValue};
use crate::expr::vars::Var;
use crate::spec::{AttrSpec, RecordSpec};

/// A primitive leaf of a scoped record that defines one of its variables,
/// e.g. `size[0]` of a node defines `x`.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolLeaf {
    pub var: Var,
    pub field: &'static str,
    pub index: Option<usize>,
    pub default: f64,
}

impl SymbolLeaf {
    /// The leaf inside a value of the owning record.
    pub fn read<'a>(&self, record: &'a AttrValue) -> Option<&'a AttrValue> {
        let field = record.get(self.field)?;
        match self.index {
            Some(i) => list_item(Some(field), i),
            None => Some(field),
        }
    }

    /// The variable value derived from a value of the owning record.
    pub fn value_in(&self, record: &AttrValue) -> Option<f64> {
        self.read(record)
            .and_then(AttrValue::as_num)
            .map(|v| v * self.var.scale())
    }
}

/// Symbol leaves directly under `record` (fields and tuple slots).
pub fn symbol_leaves(record: &RecordSpec) -> Vec<SymbolLeaf> {
    let mut out = Vec::new();
    for (field, spec) in &record.entries {
        match spec {
            AttrSpec::Primitive(p) => {
                if let Some(var) = p.symbol {
                    out.push(SymbolLeaf {
                        var,
                        field: *field,
                        index: None,
                        default: p.default.as_num().unwrap_or(0.0),
                    });
                }
            }
            AttrSpec::Tuple(t) => {
                for (i, entry) in t.entries.iter().enumerate() {
                    if let AttrSpec::Primitive(p) = entry {
                        if let Some(var) = p.symbol {
                            out.push(SymbolLeaf {
                                var,
                                field: *field,
                                index: Some(i),
                                default: p.default.as_num().unwrap_or(0.0),
                            });
                        }
                    }
                }
            }
            _ => {}
        }
    }
    out
}

/// Reject expressions referring to variables not visible at their leaf.
pub fn check_expressions(spec: &AttrSpec, value: &AttrValue) -> Result<(), AttrError> {
    let mut path = Vec::new();
    let mut vars = Vec::new();
    check_at(spec, value, &mut path, &mut vars)
}

fn check_at(
    spec: &AttrSpec,
    value: &AttrValue,
    path: &mut Vec<String>,
    vars: &mut Vec<Var>,
) -> Result<(), AttrError> {
    match (spec, value) {
        (AttrSpec::Primitive(_), AttrValue::Num(expr)) => expr
            .check_scope(vars)
            .map_err(|e| AttrError::new(path, e)),
        (AttrSpec::Record(r), AttrValue::Record(fields)) => {
            let pushed = spec.scope_vars();
            vars.extend_from_slice(pushed);
            let mut result = Ok(());
            for (k, v) in fields {
                if let Some(child) = r.entries.get(k.as_str()) {
                    path.push(k.clone());
                    result = check_at(child, v, path, vars);
                    path.pop();
                    if result.is_err() {
                        break;
                    }
                }
            }
            vars.truncate(vars.len() - pushed.len());
            result
        }
        (AttrSpec::Dict(d), AttrValue::Dict(dict)) => {
            for (k, v) in dict.values() {
                path.push(k.to_string());
                check_at(&d.entry, v, path, vars)?;
                path.pop();
            }
            Ok(())
        }
        (AttrSpec::Tuple(t), AttrValue::List(items)) => {
            for (i, (child, item)) in t.entries.iter().zip(items).enumerate() {
                if let Some(v) = item {
                    path.push(i.to_string());
                    check_at(child, v, path, vars)?;
                    path.pop();
                }
            }
            Ok(())
        }
        (AttrSpec::Array(a), AttrValue::List(items)) => {
            for (i, item) in items.iter().enumerate() {
                if let Some(v) = item {
                    path.push(i.to_string());
                    check_at(&a.entry, v, path, vars)?;
                    path.pop();
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
