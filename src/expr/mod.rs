//! Linear expressions and their evaluation against scope variables.
//!
//! One update is evaluated in two passes over the change tree. `selfref`
//! resolves expressions that refer to a variable the same update redefines,
//! then `deep` derives the new variables top-down and evaluates everything
//! else, including stored expressions whose variable moved.

pub mod deep;
pub mod eval;
pub mod parse;
pub mod scope;
pub mod selfref;
pub mod vars;

pub use deep::{DeepEval, eval_deep};
pub use eval::{Evaluated, eval_attr};
pub use parse::{ExprError, Expression};
pub use scope::{SymbolLeaf, check_expressions, symbol_leaves};
pub use selfref::resolve_self_refs;
pub use vars::{Boundary, Shape, Var, VarDict, VarEntry};
