//! Replay script (script.json): timed dispatches into one canvas.
//!
//! JSON shape:
//! {
//!   "steps": [
//!     {
//!       "at": 0.0,              // seconds on the controller clock, default 0
//!       "queue": "a",           // default "immediate"
//!       "event": {
//!         "attrs": { "nodes": { "A": { "color": "red" } } },
//!         "animation": { "nodes": { "*": { "duration": 1 } } },   // this event only
//!         "anim_defaults": { "**": { "ease": "linear" } },        // kept for later events
//!         "queues": { "a": { "pause": 0.5 }, "b": { "stopped": true, "clear": true } },
//!         "broadcast": "anything"
//!       }
//!     },
//!     ...
//!   ]
//! }
//!
//! Steps are dispatched in `at` order (ties keep file order); after the last
//! step the clock runs until no pause is pending.

use crate::anim::AnimTree;
use crate::attr::decode_attr;
use crate::config::Settings;
use crate::diagnostics;
use crate::render::FrameRecorder;
use crate::scheduler::{Controller, Event, QueueControl, QueueId};
use crate::spec::canvas_spec;
use crate::Result;
use anyhow::{Context, bail};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptSpec {
    #[serde(default)]
    pub steps: Vec<RawStep>,
}

/// Raw step shape as it appears in script.json.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawStep {
    #[serde(default)]
    pub at: f64,

    #[serde(default = "immediate")]
    pub queue: QueueId,

    #[serde(default)]
    pub event: RawEvent,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawEvent {
    #[serde(default)]
    pub attrs: Option<serde_json::Value>,

    #[serde(default)]
    pub animation: Option<AnimTree>,

    #[serde(default)]
    pub anim_defaults: Option<AnimTree>,

    #[serde(default)]
    pub queues: IndexMap<String, QueueControl>,

    #[serde(default)]
    pub broadcast: Option<serde_json::Value>,
}

fn immediate() -> QueueId {
    QueueId::Immediate
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub at: Duration,
    pub queue: QueueId,
    pub event: Event,
}

/// Steps in dispatch order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    pub steps: Vec<Step>,
}

impl ScriptSpec {
    /// Decode every attribute tree and order steps by time.
    pub fn validate_and_build(&self) -> Result<Script> {
        let spec = canvas_spec();
        let mut steps = Vec::with_capacity(self.steps.len());

        for (i, raw) in self.steps.iter().enumerate() {
            let Ok(at) = Duration::try_from_secs_f64(raw.at) else {
                bail!(diagnostics::error_message(format!(
                    "step {}: 'at' must be a non-negative number of seconds that fits the clock, got {}",
                    i, raw.at
                )));
            };

            let attr_changes = raw
                .event
                .attrs
                .as_ref()
                .map(|attrs| decode_attr(&spec, attrs))
                .transpose()
                .with_context(|| diagnostics::error_message(format!("step {}", i)))?;

            let event = Event {
                attr_changes,
                animation: raw.event.animation.clone(),
                anim_defaults: raw.event.anim_defaults.clone(),
                queue_controls: raw.event.queues.clone(),
                broadcast: raw.event.broadcast.clone(),
            };
            if event == Event::default() {
                diagnostics::warn(format!("step {} has an empty event", i));
            }

            steps.push(Step {
                at,
                queue: raw.queue.clone(),
                event,
            });
        }

        steps.sort_by_key(|s| s.at);
        Ok(Script { steps })
    }
}

impl Script {
    pub fn from_json(text: &str) -> Result<Script> {
        let spec: ScriptSpec = serde_json::from_str(text)
            .with_context(|| diagnostics::error_message("parse script JSON"))?;
        spec.validate_and_build()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Script> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| {
            diagnostics::error_message(format!("read script file {}", path.display()))
        })?;
        Self::from_json(&text)
            .with_context(|| diagnostics::error_message(format!("in {}", path.display())))
    }
}

/// Play `script` against a fresh canvas and collect everything it emits.
pub fn run_script(script: &Script, settings: Settings) -> FrameRecorder {
    let mut controller = Controller::new(settings, FrameRecorder::default());
    for step in &script.steps {
        controller.advance_to(step.at);
        controller.dispatch(step.queue.clone(), step.event.clone());
    }
    controller.run_until_idle();

    tracing::debug!(
        frames = controller.sink().frames.len(),
        events = controller.sink().events.len(),
        time = controller.now().as_secs_f64(),
        "script finished"
    );
    controller.into_sink()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn steps_are_sorted_and_default_to_immediate() {
        let script = Script::from_json(
            r#"{ "steps": [
                { "at": 1, "queue": "a", "event": { "broadcast": 2 } },
                { "event": { "attrs": { "zoom": 2 } } },
                { "at": 1, "event": { "broadcast": 3 } }
            ] }"#,
        )
        .unwrap();

        let order: Vec<(f64, &str)> = script
            .steps
            .iter()
            .map(|s| (s.at.as_secs_f64(), s.queue.name()))
            .collect();
        assert_eq!(order, vec![(0.0, "immediate"), (1.0, "a"), (1.0, "immediate")]);
        assert!(script.steps[0].event.attr_changes.is_some());
    }

    #[test]
    fn bad_attributes_name_the_step() {
        let err = Script::from_json(r#"{ "steps": [ {}, { "event": { "attrs": { "zom": 2 } } } ] }"#)
            .unwrap_err();
        let chain = format!("{:#}", err);
        assert!(chain.contains("step 1"), "{}", chain);
        assert!(chain.contains("zom"), "{}", chain);
    }

    #[test]
    fn rejects_negative_times_and_unknown_fields() {
        assert!(Script::from_json(r#"{ "steps": [ { "at": -1 } ] }"#).is_err());
        let err = Script::from_json(r#"{ "steps": [ { "at": 1e20 } ] }"#).unwrap_err();
        assert!(format!("{:#}", err).contains("step 0"), "{:#}", err);
        assert!(Script::from_json(r#"{ "steps": [ { "when": 1 } ] }"#).is_err());
    }

    #[test]
    fn run_replays_pauses_on_the_clock() {
        let script = Script::from_json(
            r#"{ "steps": [
                { "queue": "a", "event": { "queues": { "a": { "pause": 0.2 } } } },
                { "queue": "a", "event": { "attrs": { "zoom": 2 } } },
                { "at": 0.1, "event": { "attrs": { "zoom": 3 } } }
            ] }"#,
        )
        .unwrap();
        let recorder = run_script(&script, Settings::default());
        assert_eq!(recorder.times(), vec![0.1, 0.2]);
    }
}
