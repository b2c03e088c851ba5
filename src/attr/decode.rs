//! JSON → typed partial attribute trees.
//!
//! JSON shape follows the `AttrSpec` tree directly:
//! {
//!   "size": [200, 300],
//!   "nodes": {
//!     "A": { "pos": ["-0.5cx", "0.5cy + 7"], "color": "red" },
//!     "B": null                                    // delete node B
//!   },
//!   "edges": { "A-B": {} }
//! }
//!
//! Numbers may be given as JSON numbers, numeric strings, expression strings
//! or `{ "m": .., "x": .., "c": .. }` objects. Expressions are checked against
//! the variables in scope at their position.

use crate::attr::error::{AttrError, AttrErrorKind};
use crate::attr::value::{AttrValue, DictValue};
use crate::expr::{Expression, Var};
use crate::spec::{AttrSpec, PrimitiveKind, PrimitiveSpec};
use indexmap::IndexMap;
use serde_json::Value;

pub fn decode_attr(spec: &AttrSpec, json: &Value) -> Result<AttrValue, AttrError> {
    let mut path = Vec::new();
    let mut vars = Vec::new();
    decode_at(spec, json, &mut path, &mut vars)
}

fn decode_at(
    spec: &AttrSpec,
    json: &Value,
    path: &mut Vec<String>,
    vars: &mut Vec<Var>,
) -> Result<AttrValue, AttrError> {
    match spec {
        AttrSpec::Primitive(p) => decode_primitive(p, json, path, vars),
        AttrSpec::Record(r) => {
            let Value::Object(obj) = json else {
                return Err(type_error(path, "object", json));
            };
            let pushed = spec.scope_vars();
            vars.extend_from_slice(pushed);

            let mut out = IndexMap::new();
            let mut result = Ok(());
            for (k, v) in obj {
                path.push(k.clone());
                let decoded = match r.entries.get(k.as_str()) {
                    Some(child) => decode_at(child, v, path, vars),
                    None => Err(AttrError::new(path, AttrErrorKind::UnknownKey)),
                };
                path.pop();
                match decoded {
                    Ok(value) => {
                        out.insert(k.clone(), value);
                    }
                    Err(e) => {
                        result = Err(e);
                        break;
                    }
                }
            }

            vars.truncate(vars.len() - pushed.len());
            result.map(|_| AttrValue::Record(out))
        }
        AttrSpec::Dict(d) => {
            let Value::Object(obj) = json else {
                return Err(type_error(path, "object", json));
            };
            let mut out = DictValue::new();
            for (k, v) in obj {
                path.push(k.clone());
                if k == "*" {
                    return Err(AttrError::new(path, AttrErrorKind::Wildcard));
                }
                if v.is_null() {
                    out.delete(k.clone());
                } else {
                    let value = decode_at(&d.entry, v, path, vars)?;
                    out.insert(k.clone(), value);
                }
                path.pop();
            }
            Ok(AttrValue::Dict(out))
        }
        AttrSpec::Tuple(t) => {
            let Value::Array(items) = json else {
                return Err(type_error(path, "array", json));
            };
            if items.len() > t.entries.len() {
                return Err(AttrError::new(
                    path,
                    AttrErrorKind::Length {
                        max: t.entries.len(),
                        found: items.len(),
                    },
                ));
            }
            let mut out = Vec::with_capacity(items.len());
            for (i, (child, item)) in t.entries.iter().zip(items).enumerate() {
                path.push(i.to_string());
                let value = if item.is_null() {
                    None
                } else {
                    Some(decode_at(child, item, path, vars)?)
                };
                path.pop();
                out.push(value);
            }
            Ok(AttrValue::List(out))
        }
        AttrSpec::Array(a) => {
            let Value::Array(items) = json else {
                return Err(type_error(path, "array", json));
            };
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                path.push(i.to_string());
                out.push(Some(decode_at(&a.entry, item, path, vars)?));
                path.pop();
            }
            Ok(AttrValue::List(out))
        }
    }
}

fn decode_primitive(
    spec: &PrimitiveSpec,
    json: &Value,
    path: &[String],
    vars: &[Var],
) -> Result<AttrValue, AttrError> {
    match spec.kind {
        PrimitiveKind::Number => {
            let expr = decode_number(json, path)?;
            expr.check_scope(vars)
                .map_err(|e| AttrError::new(path, e))?;
            Ok(AttrValue::Num(expr))
        }
        PrimitiveKind::String => {
            let Value::String(s) = json else {
                return Err(type_error(path, "string", json));
            };
            if let Some(options) = &spec.options {
                if !options.contains(&s.as_str()) {
                    return Err(AttrError::new(
                        path,
                        AttrErrorKind::Option {
                            value: s.clone(),
                            options: options.join(", "),
                        },
                    ));
                }
            }
            Ok(AttrValue::Str(s.clone()))
        }
        PrimitiveKind::Boolean => match json {
            Value::Bool(b) => Ok(AttrValue::Bool(*b)),
            other => Err(type_error(path, "boolean", other)),
        },
    }
}

fn decode_number(json: &Value, path: &[String]) -> Result<Expression, AttrError> {
    match json {
        Value::Number(n) => n
            .as_f64()
            .map(Expression::number)
            .ok_or_else(|| type_error(path, "number", json)),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(n) => Ok(Expression::number(n)),
            Err(_) => Expression::parse(s).map_err(|e| AttrError::new(path, e)),
        },
        Value::Object(obj) => {
            let field = |name: &str, default: f64| -> Result<f64, AttrError> {
                match obj.get(name) {
                    None => Ok(default),
                    Some(v) => v.as_f64().ok_or_else(|| type_error(path, "number", v)),
                }
            };
            let m = field("m", 1.0)?;
            let c = field("c", 0.0)?;
            let x = match obj.get("x") {
                None | Some(Value::Null) => None,
                Some(Value::String(name)) => {
                    Some(name.parse::<Var>().map_err(|e| AttrError::new(path, e))?)
                }
                Some(other) => return Err(type_error(path, "variable name", other)),
            };
            Ok(match x {
                Some(x) => Expression::linear(m, x, c),
                None => Expression::number(c),
            })
        }
        other => Err(type_error(path, "number or expression", other)),
    }
}

fn type_error(path: &[String], expected: &'static str, found: &Value) -> AttrError {
    let found = match found {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    AttrError::new(
        path,
        AttrErrorKind::Type {
            expected,
            found: found.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::DictEntry;
    use crate::expr::ExprError;
    use crate::spec::canvas_spec;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn decodes_partial_canvas_with_expressions() {
        let spec = canvas_spec();
        let value = decode_attr(
            &spec,
            &json!({
                "size": [200, "300"],
                "nodes": {
                    "A": { "pos": ["-0.5cx", "0.5cy + 7"], "color": "red" },
                    "B": null
                }
            }),
        )
        .unwrap();

        assert_eq!(value.get("size").and_then(AttrValue::as_pair), Some([200.0, 300.0]));
        assert_eq!(
            value.get_path(&["nodes", "A", "pos", "0"]),
            Some(&AttrValue::Num(Expression::linear(-0.5, Var::Cx, 0.0)))
        );
        let nodes = value.get("nodes").and_then(AttrValue::as_dict).unwrap();
        assert_eq!(nodes.entries.get("B"), Some(&DictEntry::Delete));
    }

    #[test]
    fn object_form_expressions() {
        let spec = canvas_spec();
        let value = decode_attr(
            &spec,
            &json!({ "nodes": { "A": { "size": [{ "m": 2, "x": "x" }, { "c": 4 }] } } }),
        )
        .unwrap();
        assert_eq!(
            value.get_path(&["nodes", "A", "size", "0"]),
            Some(&AttrValue::Num(Expression::linear(2.0, Var::X, 0.0)))
        );
        assert_eq!(
            value.get_path(&["nodes", "A", "size", "1"]),
            Some(&AttrValue::number(4.0))
        );
    }

    #[test]
    fn variables_outside_scope_are_rejected() {
        let spec = canvas_spec();
        let err = decode_attr(&spec, &json!({ "nodes": { "A": { "pos": ["r", 0] } } })).unwrap_err();
        assert_eq!(err.path, "nodes.A.pos.0");
        assert_eq!(
            err.kind,
            AttrErrorKind::Expression(ExprError::OutOfScope {
                var: Var::R,
                valid: "cx, cy, x, y".into()
            })
        );

        // `r` is fine on a node label.
        assert!(
            decode_attr(
                &spec,
                &json!({ "nodes": { "A": { "labels": { "L": { "radius": "2r" } } } } })
            )
            .is_ok()
        );
    }

    #[test]
    fn rejects_unknown_keys_options_and_wildcards() {
        let spec = canvas_spec();
        let err = decode_attr(&spec, &json!({ "nodes": { "A": { "colour": "red" } } })).unwrap_err();
        assert_eq!(err.path, "nodes.A.colour");
        assert_eq!(err.kind, AttrErrorKind::UnknownKey);

        let err = decode_attr(&spec, &json!({ "nodes": { "A": { "shape": "hexagon" } } })).unwrap_err();
        assert!(matches!(err.kind, AttrErrorKind::Option { .. }));

        let err = decode_attr(&spec, &json!({ "nodes": { "*": {} } })).unwrap_err();
        assert_eq!(err.kind, AttrErrorKind::Wildcard);

        let err = decode_attr(&spec, &json!({ "size": [1, 2, 3] })).unwrap_err();
        assert_eq!(err.kind, AttrErrorKind::Length { max: 2, found: 3 });
    }

    #[test]
    fn malformed_expression_reports_path() {
        let spec = canvas_spec();
        let err = decode_attr(&spec, &json!({ "zoom": "2cx + cy" })).unwrap_err();
        assert_eq!(err.path, "zoom");
        assert!(matches!(
            err.kind,
            AttrErrorKind::Expression(ExprError::Arity { found: 2, .. })
        ));
        assert_eq!(
            err.to_string(),
            "attribute 'zoom': expression \"2cx + cy\" must reference exactly one variable (found 2)"
        );
    }
}
