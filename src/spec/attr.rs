//! Attribute specifications: the shape of an attribute tree.
//!
//! Every operation in the attribute engine dispatches on the spec tag and
//! carries child specs explicitly; values never describe their own shape.

use crate::attr::AttrValue;
use crate::expr::{Expression, Var};
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Number,
    String,
    Boolean,
}

/// A variable-introducing record. The variables are visible to every
/// number expression at or below the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Canvas,
    Node,
    NodeLabel,
}

impl Scope {
    pub fn vars(self) -> &'static [Var] {
        match self {
            Scope::Canvas => &[Var::Cx, Var::Cy],
            Scope::Node => &[Var::X, Var::Y],
            Scope::NodeLabel => &[Var::R],
        }
    }
}

/// Which dynamic default policy applies to new entries of a dict. Ordered
/// so that nodes are generated before the edges that refer to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntityKind {
    Node,
    Edge,
    NodeLabel,
    EdgeLabel,
    CanvasLabel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveSpec {
    pub kind: PrimitiveKind,
    /// Restricts string values to a fixed set.
    pub options: Option<Vec<&'static str>>,
    /// Binds this leaf as the source of a scope variable.
    pub symbol: Option<Var>,
    pub endpoint: bool,
    pub default: AttrValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordSpec {
    pub entries: IndexMap<&'static str, AttrSpec>,
    pub scope: Option<Scope>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DictSpec {
    pub entry: Box<AttrSpec>,
    pub entity: Option<EntityKind>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TupleSpec {
    pub entries: Vec<AttrSpec>,
    pub endpoint: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArraySpec {
    pub entry: Box<AttrSpec>,
    pub endpoint: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrSpec {
    Primitive(PrimitiveSpec),
    Record(RecordSpec),
    Dict(DictSpec),
    Tuple(TupleSpec),
    Array(ArraySpec),
}

impl AttrSpec {
    pub fn number(default: f64) -> Self {
        Self::primitive(PrimitiveKind::Number, AttrValue::Num(Expression::number(default)))
    }

    /// A number leaf whose default is an expression (stored as permanent).
    pub fn number_expr(default: Expression) -> Self {
        Self::primitive(PrimitiveKind::Number, AttrValue::Num(default))
    }

    pub fn string(default: &str) -> Self {
        Self::primitive(PrimitiveKind::String, AttrValue::Str(default.to_string()))
    }

    pub fn boolean(default: bool) -> Self {
        Self::primitive(PrimitiveKind::Boolean, AttrValue::Bool(default))
    }

    fn primitive(kind: PrimitiveKind, default: AttrValue) -> Self {
        AttrSpec::Primitive(PrimitiveSpec {
            kind,
            options: None,
            symbol: None,
            endpoint: false,
            default,
        })
    }

    pub fn record(entries: impl IntoIterator<Item = (&'static str, AttrSpec)>) -> Self {
        AttrSpec::Record(RecordSpec {
            entries: entries.into_iter().collect(),
            scope: None,
        })
    }

    pub fn dict(entry: AttrSpec) -> Self {
        AttrSpec::Dict(DictSpec {
            entry: Box::new(entry),
            entity: None,
        })
    }

    pub fn tuple(entries: Vec<AttrSpec>) -> Self {
        AttrSpec::Tuple(TupleSpec {
            entries,
            endpoint: false,
        })
    }

    pub fn array(entry: AttrSpec) -> Self {
        AttrSpec::Array(ArraySpec {
            entry: Box::new(entry),
            endpoint: false,
        })
    }

    /// Restrict a string primitive to a fixed set of values.
    pub fn options(mut self, options: &[&'static str]) -> Self {
        if let AttrSpec::Primitive(p) = &mut self {
            p.options = Some(options.to_vec());
        }
        self
    }

    pub fn symbol(mut self, var: Var) -> Self {
        if let AttrSpec::Primitive(p) = &mut self {
            p.symbol = Some(var);
        }
        self
    }

    /// Mark this node as an animation endpoint.
    pub fn endpoint(mut self) -> Self {
        match &mut self {
            AttrSpec::Primitive(p) => p.endpoint = true,
            AttrSpec::Tuple(t) => t.endpoint = true,
            AttrSpec::Array(a) => a.endpoint = true,
            AttrSpec::Record(_) | AttrSpec::Dict(_) => {}
        }
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        if let AttrSpec::Record(r) = &mut self {
            r.scope = Some(scope);
        }
        self
    }

    pub fn entity(mut self, entity: EntityKind) -> Self {
        if let AttrSpec::Dict(d) = &mut self {
            d.entity = Some(entity);
        }
        self
    }

    pub fn is_endpoint(&self) -> bool {
        match self {
            AttrSpec::Primitive(p) => p.endpoint,
            AttrSpec::Tuple(t) => t.endpoint,
            AttrSpec::Array(a) => a.endpoint,
            AttrSpec::Record(_) | AttrSpec::Dict(_) => false,
        }
    }

    /// Child spec at a record field, dict key or list index.
    pub fn child(&self, key: &str) -> Option<&AttrSpec> {
        match self {
            AttrSpec::Record(r) => r.entries.get(key),
            AttrSpec::Dict(d) => Some(&d.entry),
            AttrSpec::Tuple(t) => key.parse::<usize>().ok().and_then(|i| t.entries.get(i)),
            AttrSpec::Array(a) => key.parse::<usize>().ok().map(|_| a.entry.as_ref()),
            AttrSpec::Primitive(_) => None,
        }
    }

    /// Record fields that are dicts with an entity policy, in policy order.
    pub fn entity_dicts(&self) -> Vec<(&'static str, EntityKind)> {
        let AttrSpec::Record(r) = self else {
            return Vec::new();
        };
        let mut out: Vec<_> = r
            .entries
            .iter()
            .filter_map(|(key, spec)| match spec {
                AttrSpec::Dict(DictSpec {
                    entity: Some(kind), ..
                }) => Some((*key, *kind)),
                _ => None,
            })
            .collect();
        out.sort_by_key(|(_, kind)| *kind);
        out
    }

    pub fn scope_vars(&self) -> &'static [Var] {
        match self {
            AttrSpec::Record(RecordSpec {
                scope: Some(scope), ..
            }) => scope.vars(),
            _ => &[],
        }
    }

    /// The full default tree for this spec. Dicts have no entries and carry
    /// their entry defaults as the wildcard template.
    pub fn defaults(&self) -> AttrValue {
        match self {
            AttrSpec::Primitive(p) => p.default.clone(),
            AttrSpec::Record(r) => AttrValue::Record(
                r.entries
                    .iter()
                    .map(|(k, s)| (k.to_string(), s.defaults()))
                    .collect(),
            ),
            AttrSpec::Dict(d) => AttrValue::Dict(crate::attr::DictValue::with_template(
                d.entry.defaults(),
            )),
            AttrSpec::Tuple(t) => {
                AttrValue::List(t.entries.iter().map(|s| Some(s.defaults())).collect())
            }
            AttrSpec::Array(_) => AttrValue::List(Vec::new()),
        }
    }
}
