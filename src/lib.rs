//! Declarative graph attributes with linear expressions, animation
//! metadata and a cooperative multi-queue scheduler.

pub mod anim;
pub mod attr;
pub mod config;
pub mod diagnostics;
pub mod expr;
pub mod layout;
pub mod model;
pub mod render;
pub mod scheduler;
pub mod script;
pub mod spec;

pub type Result<T> = anyhow::Result<T>;
