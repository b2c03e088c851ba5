//! Runtime settings (settings.json). Every field is optional.
//!
//! JSON shape:
//! {
//!   "animation": { "duration": 0.5, "ease": "poly", "highlight": false, "linger": 0.5 },
//!   "node_spacing": 30,     // spiral step for new nodes
//!   "edge_spacing": 12,     // curve offset step between parallel edges
//!   "loop_size": 24         // height of the first self-loop
//! }

use crate::anim::AnimMeta;
use crate::diagnostics;
use crate::Result;
use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Animation applied to endpoints with no explicit or stored settings.
    pub animation: AnimMeta,
    pub node_spacing: f64,
    pub edge_spacing: f64,
    pub loop_size: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            animation: AnimMeta::default(),
            node_spacing: 30.0,
            edge_spacing: 12.0,
            loop_size: 24.0,
        }
    }
}

impl Settings {
    pub fn from_json(text: &str) -> Result<Settings> {
        let settings: Settings = serde_json::from_str(text)
            .with_context(|| diagnostics::error_message("parse settings JSON"))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Settings> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| {
            diagnostics::error_message(format!("read settings file {}", path.display()))
        })?;
        Self::from_json(&text)
            .with_context(|| diagnostics::error_message(format!("in {}", path.display())))
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("animation.duration", self.animation.duration),
            ("animation.linger", self.animation.linger),
            ("node_spacing", self.node_spacing),
            ("edge_spacing", self.edge_spacing),
            ("loop_size", self.loop_size),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!(diagnostics::error_message(format!(
                    "setting {} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}
