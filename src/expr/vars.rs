//! Scope variables and the variable dictionary threaded through evaluation.
//!
//! Scopes nest: the canvas exposes `cx, cy` (half of the canvas size), nodes
//! add `x, y` (their half-size) and node labels add `r`, the radius of the
//! parent node's boundary at the label's angle.

use crate::expr::ExprError;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Var {
    Cx,
    Cy,
    X,
    Y,
    R,
}

impl Var {
    pub const ALL: [Var; 5] = [Var::Cx, Var::Cy, Var::X, Var::Y, Var::R];

    pub fn name(self) -> &'static str {
        match self {
            Var::Cx => "cx",
            Var::Cy => "cy",
            Var::X => "x",
            Var::Y => "y",
            Var::R => "r",
        }
    }

    /// Factor applied to a symbol leaf to obtain the variable value.
    ///
    /// The canvas size is a full width/height, while node sizes are already
    /// half-sizes.
    pub fn scale(self) -> f64 {
        match self {
            Var::Cx | Var::Cy => 0.5,
            Var::X | Var::Y | Var::R => 1.0,
        }
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Var {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Var::ALL
            .into_iter()
            .find(|v| v.name() == s)
            .ok_or_else(|| ExprError::UnknownVariable(s.to_string()))
    }
}

/// Current value of a variable, and whether it changed in this update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarEntry {
    pub value: f64,
    pub changed: bool,
}

impl VarEntry {
    pub fn new(value: f64, changed: bool) -> Self {
        Self { value, changed }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Circle,
    Rect,
    Ellipse,
}

impl FromStr for Shape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "circle" => Ok(Shape::Circle),
            "rect" => Ok(Shape::Rect),
            "ellipse" => Ok(Shape::Ellipse),
            other => Err(format!("unknown node shape {:?}", other)),
        }
    }
}

/// Outline of the node enclosing a label scope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary {
    pub shape: Shape,
    pub x: f64,
    pub y: f64,
    pub changed: bool,
}

impl Boundary {
    /// Distance from the node centre to its outline along `angle_deg`
    /// (degrees, counter-clockwise from the positive x axis).
    pub fn radius_at(&self, angle_deg: f64) -> f64 {
        let theta = angle_deg.to_radians();
        let (c, s) = (theta.cos().abs(), theta.sin().abs());
        match self.shape {
            Shape::Circle => self.x,
            Shape::Rect => {
                if c * self.y > s * self.x {
                    self.x / c
                } else if s > 0.0 {
                    self.y / s
                } else {
                    self.x
                }
            }
            Shape::Ellipse => {
                let denom = ((self.y * c).powi(2) + (self.x * s).powi(2)).sqrt();
                if denom == 0.0 {
                    0.0
                } else {
                    self.x * self.y / denom
                }
            }
        }
    }
}

/// Variables visible at an evaluation point.
///
/// Each scope pushes one frame; lookups search from the innermost frame out.
#[derive(Debug, Clone, Default)]
pub struct VarDict {
    frames: Vec<BTreeMap<Var, VarEntry>>,
    boundary: Option<Boundary>,
}

impl VarDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, var: Var) -> Option<VarEntry> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(&var).copied())
    }

    /// A copy of this dictionary with `frame` pushed as the innermost scope.
    pub fn with_frame(&self, frame: BTreeMap<Var, VarEntry>) -> VarDict {
        let mut next = self.clone();
        next.frames.push(frame);
        next
    }

    pub fn with_boundary(mut self, boundary: Boundary) -> VarDict {
        self.boundary = Some(boundary);
        self
    }

    /// Everything except the innermost frame.
    pub fn inherited(&self) -> VarDict {
        let mut outer = self.clone();
        outer.frames.pop();
        outer
    }

    /// Variables introduced by the innermost scope.
    pub fn own(&self) -> Option<&BTreeMap<Var, VarEntry>> {
        self.frames.last()
    }

    pub fn boundary(&self) -> Option<&Boundary> {
        self.boundary.as_ref()
    }

    pub fn any_changed(&self) -> bool {
        self.frames
            .iter()
            .any(|frame| frame.values().any(|e| e.changed))
            || self.boundary.map(|b| b.changed).unwrap_or(false)
    }
}
