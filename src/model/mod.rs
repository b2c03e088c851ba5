//! Attribute pipeline: one canvas, updated one change set at a time.
//!
//! An update runs, in order:
//! 1) scope checks on every expression in the change set,
//! 2) entity defaults for created or deleted dict entries (`entity`),
//! 3) the self-reference pass against the last evaluated tree,
//! 4) schema defaults for new entries,
//! 5) merge into the stored state (permanent expressions stay expressions),
//! 6) the deep evaluation pass, producing the evaluated tree and changes,
//! 7) animation metadata for the changed endpoints.
//!
//! Any error returns before step 5 is committed; the model is unchanged.

pub mod entity;

use crate::anim::{AnimNode, AnimTree, annotate};
use crate::attr::ops::{apply_defaults, leaf_count, merge, overlay};
use crate::attr::{AttrError, AttrValue};
use crate::config::Settings;
use crate::expr::{DeepEval, check_expressions, eval_deep, resolve_self_refs};
use crate::spec::{AttrSpec, canvas_spec};
use entity::Adjacency;
use serde::Serialize;

/// Result of one applied change set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Applied {
    /// Full evaluated canvas after the update.
    pub attributes: AttrValue,
    /// Evaluated values that changed, `null` at deleted entries.
    pub changed: Option<AttrValue>,
    pub animation: Option<AnimNode>,
}

#[derive(Debug, Clone)]
pub struct CanvasModel {
    spec: AttrSpec,
    defaults: AttrValue,
    settings: Settings,
    /// Merged state; permanent expressions are kept unevaluated.
    stored: AttrValue,
    evaluated: AttrValue,
    adjacency: Adjacency,
    anim_overrides: AnimTree,
}

impl CanvasModel {
    pub fn new(settings: Settings) -> Self {
        let spec = canvas_spec();
        let defaults = spec.defaults();
        let stored = apply_defaults(&spec, None, None, &defaults).unwrap_or_else(|| defaults.clone());
        let evaluated = eval_deep(&spec, &stored, Some(&stored), None).evaluated;
        Self {
            spec,
            defaults,
            settings,
            stored,
            evaluated,
            adjacency: Adjacency::default(),
            anim_overrides: AnimTree::default(),
        }
    }

    pub fn spec(&self) -> &AttrSpec {
        &self.spec
    }

    pub fn evaluated(&self) -> &AttrValue {
        &self.evaluated
    }

    /// Persist animation overrides for later updates.
    pub fn set_anim_defaults(&mut self, overrides: &AnimTree) {
        self.anim_overrides.merge(overrides);
    }

    /// Apply one change set. `animation` takes priority over stored
    /// overrides for this update only.
    pub fn apply(
        &mut self,
        changes: &AttrValue,
        animation: Option<&AnimTree>,
    ) -> Result<Applied, AttrError> {
        check_expressions(&self.spec, changes)?;

        let (generated, adjacency) =
            entity::generate(
            &self.spec,
            &self.settings,
            &self.stored,
            changes,
            &self.adjacency,
        )?;
        let changes = overlay(&self.spec, Some(&generated), Some(changes))
            .unwrap_or_else(|| changes.clone());

        let resolved = resolve_self_refs(&self.spec, &changes, Some(&self.evaluated));
        let full = apply_defaults(&self.spec, Some(&self.stored), Some(&resolved), &self.defaults)
            .unwrap_or(resolved);
        let stored = merge(&self.stored, &full, &self.spec);

        let DeepEval { evaluated, changed } =
            eval_deep(&self.spec, &stored, Some(&full), Some(&self.evaluated));

        let animation = changed.as_ref().and_then(|changed| {
            let mut layers: Vec<&AnimTree> = animation.into_iter().collect();
            layers.push(&self.anim_overrides);
            annotate(&self.spec, changed, &layers, &self.settings.animation)
        });

        tracing::debug!(
            changed_leaves = changed.as_ref().map_or(0, |c| leaf_count(&self.spec, c)),
            "update applied"
        );

        self.stored = stored;
        self.evaluated = evaluated;
        self.adjacency = adjacency;

        Ok(Applied {
            attributes: self.evaluated.clone(),
            changed,
            animation,
        })
    }
}

impl Default for CanvasModel {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::decode_attr;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn apply(model: &mut CanvasModel, changes: serde_json::Value) -> Result<Applied, AttrError> {
        let changes = decode_attr(model.spec(), &changes)?;
        model.apply(&changes, None)
    }

    #[test]
    fn fresh_model_has_full_defaults() {
        let model = CanvasModel::default();
        assert_eq!(
            model.evaluated().get("size").and_then(AttrValue::as_pair),
            Some([100.0, 100.0])
        );
        assert_eq!(
            model.evaluated().get("nodes").and_then(AttrValue::as_dict).map(|d| d.len()),
            Some(0)
        );
    }

    #[test]
    fn new_node_is_fully_defaulted_and_labelled() {
        let mut model = CanvasModel::default();
        let applied = apply(&mut model, json!({ "nodes": { "A": {} } })).unwrap();

        let node = applied.attributes.get_path(&["nodes", "A"]).unwrap();
        assert_eq!(node.get("shape"), Some(&AttrValue::string("circle")));
        assert_eq!(node.get("pos").and_then(AttrValue::as_pair), Some([0.0, 0.0]));
        assert_eq!(
            node.get_path(&["labels", "value", "text"]),
            Some(&AttrValue::string("A"))
        );
        assert_eq!(
            node.get_path(&["labels", "value", "radius"]),
            Some(&AttrValue::number(0.0))
        );
        // The whole node is new, so its endpoints are animated.
        let anim = applied.animation.unwrap();
        assert!(anim.get_path(&["nodes", "A", "pos"]).is_some());
    }

    #[test]
    fn parallel_edges_get_opposite_offsets() {
        let mut model = CanvasModel::default();
        apply(&mut model, json!({ "nodes": { "A": {}, "B": {} } })).unwrap();
        let applied = apply(&mut model, json!({ "edges": { "A-B-1": {}, "A-B-2": {} } })).unwrap();

        let path = |id: &str| {
            applied
                .attributes
                .get_path(&["edges", id, "path"])
                .cloned()
                .unwrap()
        };
        assert_eq!(path("A-B-1"), AttrValue::List(vec![]));
        assert_eq!(path("A-B-2"), AttrValue::list([AttrValue::pair(0.0, 12.0)]));

        let applied = apply(&mut model, json!({ "edges": { "B-A": {} } })).unwrap();
        assert_eq!(
            applied.attributes.get_path(&["edges", "B-A", "path"]),
            Some(&AttrValue::list([AttrValue::pair(0.0, 12.0)]))
        );
    }

    #[test]
    fn deleting_then_recreating_a_node_starts_fresh() {
        let mut model = CanvasModel::default();
        apply(&mut model, json!({ "nodes": { "A": { "color": "red" } } })).unwrap();
        apply(&mut model, json!({ "nodes": { "A": null } })).unwrap();
        assert_eq!(model.evaluated().get_path(&["nodes", "A"]), None);

        let applied = apply(&mut model, json!({ "nodes": { "A": {} } })).unwrap();
        assert_eq!(
            applied.attributes.get_path(&["nodes", "A", "color"]),
            Some(&AttrValue::string("dark-gray"))
        );
    }

    #[test]
    fn errors_leave_state_untouched() {
        let mut model = CanvasModel::default();
        apply(&mut model, json!({ "nodes": { "A": {} } })).unwrap();
        let before = model.evaluated().clone();

        let err = apply(&mut model, json!({ "edges": { "bogus": {} } })).unwrap_err();
        assert_eq!(err.path, "edges.bogus");
        assert_eq!(model.evaluated(), &before);
    }

    #[test]
    fn stored_animation_overrides_apply_to_later_updates() {
        let mut model = CanvasModel::default();
        let overrides: AnimTree =
            serde_json::from_value(json!({ "nodes": { "*": { "duration": 2.0 } } })).unwrap();
        model.set_anim_defaults(&overrides);

        let applied = apply(&mut model, json!({ "nodes": { "A": {} } })).unwrap();
        let meta = applied
            .animation
            .as_ref()
            .and_then(|a| a.get_path(&["nodes", "A", "color"]))
            .and_then(AnimNode::meta)
            .unwrap();
        assert_eq!(meta.duration, 2.0);
        assert_eq!(meta.ease, "poly");
    }
}
