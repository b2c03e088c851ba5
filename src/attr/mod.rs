//! Attribute trees: values, the generic tree operations over them, and JSON
//! decoding into typed partial trees.

pub mod decode;
pub mod error;
pub mod ops;
pub mod value;

pub use decode::decode_attr;
pub use error::{AttrError, AttrErrorKind};
pub use value::{AttrValue, DictEntry, DictValue};
