//! Linear expressions `m·x + c` and their string form.
//!
//! Accepted text: one symbol term plus any number of constant terms, e.g.
//! `"4.7r - 9"`, `"-0.5cx"`, `"0.5cy + 7"`, `"2*x"`. Whitespace is ignored.

use crate::expr::vars::Var;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

// Capture:
// 1) sign
// 2) coefficient (optional)
// 3) '*' (optional)
// 4) symbol (optional)
static TERM_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^([+-])?(\d+(?:\.\d*)?|\.\d+)?(\*)?([A-Za-z]+)?$"));
static SPLIT_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"[+-]?[^+-]+"));

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Expression {
    pub m: f64,
    pub x: Option<Var>,
    pub c: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("malformed expression {0:?}")]
    Malformed(String),

    #[error("expression {text:?} must reference exactly one variable (found {found})")]
    Arity { text: String, found: usize },

    #[error("unknown variable {0:?}")]
    UnknownVariable(String),

    #[error("variable '{var}' is not in scope here (valid: {valid})")]
    OutOfScope { var: Var, valid: String },
}

impl Expression {
    /// A raw number: the degenerate expression with no variable.
    pub fn number(value: f64) -> Self {
        Self {
            m: 1.0,
            x: None,
            c: value,
        }
    }

    pub fn linear(m: f64, x: Var, c: f64) -> Self {
        Self { m, x: Some(x), c }
    }

    pub fn var(&self) -> Option<Var> {
        self.x
    }

    pub fn as_number(&self) -> Option<f64> {
        self.x.is_none().then_some(self.c)
    }

    /// Evaluate with `value` substituted for the variable.
    pub fn eval_with(&self, value: f64) -> f64 {
        match self.x {
            Some(_) => self.m * value + self.c,
            None => self.c,
        }
    }

    pub fn check_scope(&self, valid: &[Var]) -> Result<(), ExprError> {
        match self.x {
            Some(var) if !valid.contains(&var) => Err(ExprError::OutOfScope {
                var,
                valid: if valid.is_empty() {
                    "none".to_string()
                } else {
                    valid
                        .iter()
                        .map(|v| v.name())
                        .collect::<Vec<_>>()
                        .join(", ")
                },
            }),
            _ => Ok(()),
        }
    }

    pub fn parse(text: &str) -> Result<Self, ExprError> {
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(ExprError::Malformed(text.to_string()));
        }

        let malformed = || ExprError::Malformed(text.to_string());
        let term_re = TERM_RE.as_ref().map_err(|_| malformed())?;
        let split_re = SPLIT_RE.as_ref().map_err(|_| malformed())?;

        let mut covered = 0usize;
        let mut symbols: Vec<(f64, &str)> = Vec::new();
        let mut c = 0.0f64;

        for term in split_re.find_iter(&compact) {
            covered += term.as_str().len();
            let caps = term_re
                .captures(term.as_str())
                .ok_or_else(|| ExprError::Malformed(text.to_string()))?;

            let sign = match caps.get(1).map(|m| m.as_str()) {
                Some("-") => -1.0,
                _ => 1.0,
            };
            let coef = match caps.get(2) {
                Some(m) => Some(
                    m.as_str()
                        .parse::<f64>()
                        .map_err(|_| ExprError::Malformed(text.to_string()))?,
                ),
                None => None,
            };
            let star = caps.get(3).is_some();
            let symbol = caps.get(4).map(|m| m.as_str());

            match (coef, symbol) {
                (None, None) => return Err(ExprError::Malformed(text.to_string())),
                (Some(_), None) if star => return Err(ExprError::Malformed(text.to_string())),
                (None, Some(_)) if star => return Err(ExprError::Malformed(text.to_string())),
                (Some(k), None) => c += sign * k,
                (k, Some(name)) => symbols.push((sign * k.unwrap_or(1.0), name)),
            }
        }

        if covered != compact.len() {
            return Err(ExprError::Malformed(text.to_string()));
        }

        if symbols.len() != 1 {
            return Err(ExprError::Arity {
                text: text.to_string(),
                found: symbols.len(),
            });
        }

        let (m, name) = symbols[0];
        let x: Var = name.parse()?;
        Ok(Expression::linear(m, x, c))
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Expression::number(value)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(x) = self.x else {
            return write!(f, "{}", self.c);
        };
        if self.m == 1.0 {
            write!(f, "{}", x)?;
        } else if self.m == -1.0 {
            write!(f, "-{}", x)?;
        } else {
            write!(f, "{}{}", self.m, x)?;
        }
        if self.c > 0.0 {
            write!(f, " + {}", self.c)?;
        } else if self.c < 0.0 {
            write!(f, " - {}", -self.c)?;
        }
        Ok(())
    }
}
