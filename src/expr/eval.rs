use crate::attr::AttrValue;
use crate::expr::vars::VarDict;

/// A leaf after evaluation, and whether it should be reported as changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluated {
    pub value: AttrValue,
    pub changed: bool,
}

impl Evaluated {
    fn changed(value: AttrValue) -> Self {
        Self { value, changed: true }
    }

    fn unchanged(value: AttrValue) -> Self {
        Self {
            value,
            changed: false,
        }
    }
}

/// Evaluate one leaf.
///
/// `stored` is the leaf as kept in state (it may hold a permanent expression),
/// `prior` the previously evaluated value and `change` the leaf from this
/// update, if any.
///
/// - a changed number wins outright;
/// - a changed expression whose variable is in `vars` evaluates against it;
/// - a changed expression whose variable is not visible yet keeps the prior;
/// - with no change, a stored expression is re-evaluated when its variable
///   is flagged changed.
pub fn eval_attr(
    stored: &AttrValue,
    prior: Option<&AttrValue>,
    change: Option<&AttrValue>,
    vars: &VarDict,
) -> Evaluated {
    if let Some(change) = change {
        let AttrValue::Num(expr) = change else {
            return Evaluated::changed(change.clone());
        };
        let Some(var) = expr.var() else {
            return Evaluated::changed(change.clone());
        };
        return match vars.get(var) {
            Some(entry) => Evaluated::changed(AttrValue::number(expr.eval_with(entry.value))),
            None => Evaluated::unchanged(
                prior
                    .cloned()
                    .unwrap_or_else(|| AttrValue::number(expr.c)),
            ),
        };
    }

    if let AttrValue::Num(expr) = stored {
        if let Some(var) = expr.var() {
            return match (vars.get(var), prior) {
                (Some(entry), Some(p)) if !entry.changed => Evaluated::unchanged(p.clone()),
                (Some(entry), _) => {
                    let value = AttrValue::number(expr.eval_with(entry.value));
                    let changed = prior != Some(&value);
                    Evaluated { value, changed }
                }
                (None, Some(p)) => Evaluated::unchanged(p.clone()),
                (None, None) => Evaluated::unchanged(AttrValue::number(expr.c)),
            };
        }
    }

    Evaluated::unchanged(prior.unwrap_or(stored).clone())
}
