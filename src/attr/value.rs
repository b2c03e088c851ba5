//! Attribute values: full and partial trees conforming to an `AttrSpec`.
//!
//! The same type represents both. A partial tree may omit record fields, dict
//! keys and list slots, and may carry `DictEntry::Delete` at a dict key. A full
//! tree has every record field, every live dict key, no list holes and no
//! `Delete` entries.

use crate::expr::Expression;
use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Num(Expression),
    Str(String),
    Bool(bool),
    Record(IndexMap<String, AttrValue>),
    Dict(DictValue),
    List(Vec<Option<AttrValue>>),
}

/// Entry at a dict key. `Delete` is distinct from an absent key, which
/// means "untouched".
#[derive(Debug, Clone, PartialEq)]
pub enum DictEntry {
    Value(AttrValue),
    Delete,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DictValue {
    pub entries: IndexMap<String, DictEntry>,
    /// Default entry used when a new key is created. Never an entry itself.
    pub template: Option<Box<AttrValue>>,
}

impl DictValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(template: AttrValue) -> Self {
        Self {
            entries: IndexMap::new(),
            template: Some(Box::new(template)),
        }
    }

    pub fn from_entries<K: Into<String>>(entries: impl IntoIterator<Item = (K, DictEntry)>) -> Self {
        Self {
            entries: entries.into_iter().map(|(k, e)| (k.into(), e)).collect(),
            template: None,
        }
    }

    /// Live value at `key`; `None` when absent or deleted.
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        match self.entries.get(key) {
            Some(DictEntry::Value(v)) => Some(v),
            _ => None,
        }
    }

    pub fn is_deleted(&self, key: &str) -> bool {
        matches!(self.entries.get(key), Some(DictEntry::Delete))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: AttrValue) {
        self.entries.insert(key.into(), DictEntry::Value(value));
    }

    pub fn delete(&mut self, key: impl Into<String>) {
        self.entries.insert(key.into(), DictEntry::Delete);
    }

    /// Keys with live values, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|(k, e)| match e {
            DictEntry::Value(_) => Some(k.as_str()),
            DictEntry::Delete => None,
        })
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries.iter().filter_map(|(k, e)| match e {
            DictEntry::Value(v) => Some((k.as_str(), v)),
            DictEntry::Delete => None,
        })
    }

    pub fn len(&self) -> usize {
        self.keys().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AttrValue {
    pub fn number(value: f64) -> Self {
        AttrValue::Num(Expression::number(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        AttrValue::Str(value.into())
    }

    pub fn record<K: Into<String>>(entries: impl IntoIterator<Item = (K, AttrValue)>) -> Self {
        AttrValue::Record(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn dict<K: Into<String>>(entries: impl IntoIterator<Item = (K, AttrValue)>) -> Self {
        AttrValue::Dict(DictValue::from_entries(
            entries.into_iter().map(|(k, v)| (k, DictEntry::Value(v))),
        ))
    }

    pub fn pair(a: f64, b: f64) -> Self {
        AttrValue::List(vec![Some(AttrValue::number(a)), Some(AttrValue::number(b))])
    }

    pub fn list(items: impl IntoIterator<Item = AttrValue>) -> Self {
        AttrValue::List(items.into_iter().map(Some).collect())
    }

    pub fn as_expr(&self) -> Option<&Expression> {
        match self {
            AttrValue::Num(e) => Some(e),
            _ => None,
        }
    }

    /// The plain number at this leaf; `None` for unevaluated expressions.
    pub fn as_num(&self) -> Option<f64> {
        self.as_expr().and_then(Expression::as_number)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&IndexMap<String, AttrValue>> {
        match self {
            AttrValue::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&DictValue> {
        match self {
            AttrValue::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Option<AttrValue>]> {
        match self {
            AttrValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Child at a record field, live dict key or list index.
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        match self {
            AttrValue::Record(r) => r.get(key),
            AttrValue::Dict(d) => d.get(key),
            AttrValue::List(items) => key
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .and_then(Option::as_ref),
            _ => None,
        }
    }

    pub fn get_path(&self, path: &[&str]) -> Option<&AttrValue> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }

    /// Two numbers from a list leaf, e.g. a position or size.
    pub fn as_pair(&self) -> Option<[f64; 2]> {
        let items = self.as_list()?;
        let a = items.first()?.as_ref()?.as_num()?;
        let b = items.get(1)?.as_ref()?.as_num()?;
        Some([a, b])
    }

    /// Set a record field, creating the record if this is not one.
    pub fn set(&mut self, key: impl Into<String>, value: AttrValue) {
        if !matches!(self, AttrValue::Record(_)) {
            *self = AttrValue::Record(IndexMap::new());
        }
        if let AttrValue::Record(r) = self {
            r.insert(key.into(), value);
        }
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::number(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::string(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<Expression> for AttrValue {
    fn from(value: Expression) -> Self {
        AttrValue::Num(value)
    }
}

/// Numbers serialize as JSON numbers, stored expressions as their string
/// form, deleted dict entries as `null`.
impl Serialize for AttrValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AttrValue::Num(e) => match e.as_number() {
                Some(n) => serializer.serialize_f64(n),
                None => serializer.serialize_str(&e.to_string()),
            },
            AttrValue::Str(s) => serializer.serialize_str(s),
            AttrValue::Bool(b) => serializer.serialize_bool(*b),
            AttrValue::Record(r) => {
                let mut map = serializer.serialize_map(Some(r.len()))?;
                for (k, v) in r {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            AttrValue::Dict(d) => {
                let mut map = serializer.serialize_map(Some(d.entries.len()))?;
                for (k, e) in &d.entries {
                    match e {
                        DictEntry::Value(v) => map.serialize_entry(k, v)?,
                        DictEntry::Delete => map.serialize_entry(k, &())?,
                    }
                }
                map.end()
            }
            AttrValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}
