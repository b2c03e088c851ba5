//! Spec layer: attribute schemas.
//!
//! This module is intentionally separate from values and evaluation.
//! It owns:
//! - AttrSpec (the tagged shape description)
//! - the canvas schema (canvas, nodes, edges, labels) with defaults

pub mod attr;
pub mod canvas;

pub use attr::{
    ArraySpec, AttrSpec, DictSpec, EntityKind, PrimitiveKind, PrimitiveSpec, RecordSpec, Scope,
    TupleSpec,
};
pub use canvas::{LabelOwner, VALUE_LABEL, canvas_spec, edge_spec, label_spec, node_spec};
