//! The canvas schema: canvas, nodes, edges and labels with their defaults.
//!
//! Sizes of nodes are half-sizes (a circle's `size[0]` is its radius), the
//! canvas size is a full width/height. Angles are degrees.

use crate::expr::{Expression, Var};
use crate::spec::attr::{AttrSpec, EntityKind, Scope};

/// Reserved node label slot that displays the node id.
pub const VALUE_LABEL: &str = "value";

pub const NODE_SHAPES: &[&str] = &["circle", "rect", "ellipse"];

pub const CURVES: &[&str] = &[
    "linear",
    "natural",
    "basis",
    "cardinal",
    "catmull-rom",
    "monotone-x",
    "monotone-y",
    "step",
];

pub const ALIGNS: &[&str] = &[
    "top-left",
    "top-middle",
    "top-right",
    "middle-left",
    "middle",
    "middle-right",
    "bottom-left",
    "bottom-middle",
    "bottom-right",
    "radial",
];

pub const EDGE_LAYOUTS: &[&str] = &["individual", "symmetric", "jaccard"];

fn pair(a: f64, b: f64) -> AttrSpec {
    AttrSpec::tuple(vec![AttrSpec::number(a), AttrSpec::number(b)])
}

pub fn canvas_spec() -> AttrSpec {
    AttrSpec::record([
        (
            "size",
            AttrSpec::tuple(vec![
                AttrSpec::number(100.0).symbol(Var::Cx),
                AttrSpec::number(100.0).symbol(Var::Cy),
            ])
            .endpoint(),
        ),
        ("nodes", AttrSpec::dict(node_spec()).entity(EntityKind::Node)),
        ("edges", AttrSpec::dict(edge_spec()).entity(EntityKind::Edge)),
        (
            "labels",
            AttrSpec::dict(label_spec(LabelOwner::Canvas)).entity(EntityKind::CanvasLabel),
        ),
        ("pan", pair(0.0, 0.0).endpoint()),
        ("zoom", AttrSpec::number(1.0).endpoint()),
        ("zoomlimit", pair(0.1, 10.0)),
        ("zoomtoggle", AttrSpec::boolean(false)),
        (
            "edgelayout",
            AttrSpec::string("jaccard").options(EDGE_LAYOUTS),
        ),
        ("edgelength", AttrSpec::number(70.0)),
    ])
    .scope(Scope::Canvas)
}

pub fn node_spec() -> AttrSpec {
    AttrSpec::record([
        (
            "shape",
            AttrSpec::string("circle").options(NODE_SHAPES).endpoint(),
        ),
        ("color", AttrSpec::string("dark-gray").endpoint()),
        (
            "size",
            AttrSpec::tuple(vec![
                AttrSpec::number(12.0).symbol(Var::X),
                AttrSpec::number(12.0).symbol(Var::Y),
            ])
            .endpoint(),
        ),
        ("pos", pair(0.0, 0.0).endpoint()),
        ("fixed", AttrSpec::boolean(false)),
        ("draggable", AttrSpec::boolean(true)),
        ("visible", AttrSpec::boolean(true).endpoint()),
        ("hover", AttrSpec::boolean(false)),
        ("click", AttrSpec::boolean(false)),
        (
            "labels",
            AttrSpec::dict(label_spec(LabelOwner::Node)).entity(EntityKind::NodeLabel),
        ),
    ])
    .scope(Scope::Node)
}

pub fn edge_spec() -> AttrSpec {
    AttrSpec::record([
        ("source", AttrSpec::string("")),
        ("target", AttrSpec::string("")),
        ("directed", AttrSpec::boolean(false).endpoint()),
        ("length", AttrSpec::number(70.0)),
        ("thickness", AttrSpec::number(2.5).endpoint()),
        ("color", AttrSpec::string("light-gray").endpoint()),
        ("flip", AttrSpec::boolean(true)),
        (
            "curve",
            AttrSpec::string("natural").options(CURVES).endpoint(),
        ),
        ("path", AttrSpec::array(pair(0.0, 0.0)).endpoint()),
        ("visible", AttrSpec::boolean(true).endpoint()),
        (
            "labels",
            AttrSpec::dict(label_spec(LabelOwner::Edge)).entity(EntityKind::EdgeLabel),
        ),
    ])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelOwner {
    Canvas,
    Node,
    Edge,
}

pub fn label_spec(owner: LabelOwner) -> AttrSpec {
    // Node labels sit just outside the node outline by default.
    let radius = match owner {
        LabelOwner::Node => AttrSpec::number_expr(Expression::linear(1.0, Var::R, 3.0)),
        LabelOwner::Canvas | LabelOwner::Edge => AttrSpec::number(0.0),
    };
    let align = match owner {
        LabelOwner::Node => "radial",
        LabelOwner::Canvas | LabelOwner::Edge => "middle",
    };

    let spec = AttrSpec::record([
        ("text", AttrSpec::string("").endpoint()),
        ("align", AttrSpec::string(align).options(ALIGNS).endpoint()),
        ("pos", pair(0.0, 0.0).endpoint()),
        ("radius", radius.endpoint()),
        ("angle", AttrSpec::number(90.0).endpoint()),
        ("rotate", AttrSpec::boolean(false).endpoint()),
        ("color", AttrSpec::string("gray").endpoint()),
        ("font", AttrSpec::string("arial").endpoint()),
        ("size", AttrSpec::number(12.0).endpoint()),
        ("visible", AttrSpec::boolean(true).endpoint()),
    ]);

    match owner {
        LabelOwner::Node => spec.scope(Scope::NodeLabel),
        LabelOwner::Canvas | LabelOwner::Edge => spec,
    }
}
