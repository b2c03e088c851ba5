//! Queue state machine.
//!
//! Every transition takes the current `SchedulerState` and returns the next
//! one plus the effects to run, so a nested dispatch triggered by an effect
//! never observes a half-updated state.

use crate::anim::AnimTree;
use crate::attr::AttrValue;
use crate::diagnostics;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::time::Duration;

/// Name of the queue that bypasses queueing.
pub const IMMEDIATE: &str = "immediate";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueueId {
    Immediate,
    Named(String),
}

impl QueueId {
    pub fn name(&self) -> &str {
        match self {
            QueueId::Immediate => IMMEDIATE,
            QueueId::Named(name) => name,
        }
    }
}

impl From<&str> for QueueId {
    fn from(name: &str) -> Self {
        if name == IMMEDIATE {
            QueueId::Immediate
        } else {
            QueueId::Named(name.to_string())
        }
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for QueueId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for QueueId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(QueueId::from(name.as_str()))
    }
}

/// `pause` control: a number of seconds, or `false` to resume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pause {
    For(f64),
    Resume,
}

impl<'de> Deserialize<'de> for Pause {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Seconds(f64),
            Flag(bool),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) if secs.is_finite() && secs >= 0.0 => Ok(Pause::For(secs)),
            Raw::Seconds(secs) => Err(D::Error::custom(diagnostics::error_message(format!(
                "pause must be a non-negative number of seconds, got {}",
                secs
            )))),
            Raw::Flag(false) => Ok(Pause::Resume),
            Raw::Flag(true) => Err(D::Error::custom(diagnostics::error_message(
                "pause: true is not valid; give a duration in seconds or false",
            ))),
        }
    }
}

/// Control applied to one queue.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueControl {
    #[serde(default)]
    pub pause: Option<Pause>,

    #[serde(default)]
    pub stopped: Option<bool>,

    #[serde(default)]
    pub clear: Option<bool>,
}

impl QueueControl {
    pub fn pause(secs: f64) -> Self {
        Self {
            pause: Some(Pause::For(secs)),
            ..Self::default()
        }
    }

    pub fn resume() -> Self {
        Self {
            pause: Some(Pause::Resume),
            ..Self::default()
        }
    }

    pub fn stop() -> Self {
        Self {
            stopped: Some(true),
            ..Self::default()
        }
    }

    pub fn start() -> Self {
        Self {
            stopped: Some(false),
            ..Self::default()
        }
    }

    pub fn clear() -> Self {
        Self {
            clear: Some(true),
            ..Self::default()
        }
    }
}

/// A unit of work for a queue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    pub attr_changes: Option<AttrValue>,
    /// Animation for this event's changes only.
    pub animation: Option<AnimTree>,
    /// Animation overrides persisted for later events.
    pub anim_defaults: Option<AnimTree>,
    pub queue_controls: IndexMap<String, QueueControl>,
    /// Message echoed back to the caller when the event executes.
    pub broadcast: Option<serde_json::Value>,
}

impl Event {
    pub fn changes(changes: AttrValue) -> Self {
        Self {
            attr_changes: Some(changes),
            ..Self::default()
        }
    }

    pub fn control(queue: impl Into<String>, control: QueueControl) -> Self {
        Self::default().with_control(queue, control)
    }

    pub fn with_control(mut self, queue: impl Into<String>, control: QueueControl) -> Self {
        self.queue_controls.insert(queue.into(), control);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueState {
    pub events: VecDeque<Event>,
    /// An event of this queue is driving it; others wait their turn.
    pub busy: bool,
    pub stopped: bool,
    pub paused: bool,
}

/// All named queues. Queues are created on first use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulerState {
    pub queues: BTreeMap<String, QueueState>,
}

impl SchedulerState {
    pub fn queue(&self, name: &str) -> Option<&QueueState> {
        self.queues.get(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Execute { queue: QueueId, event: Event },
    /// Resume `queue` after `delay`.
    StartTimer { queue: String, delay: Duration },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: SchedulerState,
    pub effects: Vec<Effect>,
}

/// Immediate events execute right away. Otherwise the event is queued, and
/// the queue is started if it was empty.
pub fn dispatch(state: &SchedulerState, queue: &QueueId, event: Event) -> Transition {
    let mut next = state.clone();
    let mut effects = Vec::new();
    match queue {
        QueueId::Immediate => effects.push(Effect::Execute {
            queue: QueueId::Immediate,
            event,
        }),
        QueueId::Named(name) => {
            let q = next.queues.entry(name.clone()).or_default();
            let was_empty = q.events.is_empty();
            q.events.push_back(event);
            if was_empty {
                step(&mut next, queue, false, &mut effects);
            }
        }
    }
    Transition {
        state: next,
        effects,
    }
}

pub fn execute_next(state: &SchedulerState, queue: &QueueId, force: bool) -> Transition {
    let mut next = state.clone();
    let mut effects = Vec::new();
    step(&mut next, queue, force, &mut effects);
    Transition {
        state: next,
        effects,
    }
}

/// Apply the controls of an executed event, then force-progress `current`,
/// the queue the event ran on.
pub fn process_controls(
    state: &SchedulerState,
    controls: &IndexMap<String, QueueControl>,
    current: &QueueId,
) -> Transition {
    let mut next = state.clone();
    let mut effects = Vec::new();

    for (name, control) in controls {
        let id = QueueId::from(name.as_str());
        if id == QueueId::Immediate {
            diagnostics::warn(format!("ignoring controls for the {} queue", IMMEDIATE));
            continue;
        }

        match control.pause {
            Some(Pause::For(secs)) => {
                next.queues.entry(name.clone()).or_default().paused = true;
                effects.push(Effect::StartTimer {
                    queue: name.clone(),
                    delay: Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX),
                });
            }
            Some(Pause::Resume) => {
                next.queues.entry(name.clone()).or_default().paused = false;
                step(&mut next, &id, true, &mut effects);
            }
            None => {}
        }

        match control.stopped {
            Some(true) => next.queues.entry(name.clone()).or_default().stopped = true,
            Some(false) => {
                next.queues.entry(name.clone()).or_default().stopped = false;
                step(&mut next, &id, true, &mut effects);
            }
            None => {}
        }

        if control.clear == Some(true) {
            let q = next.queues.entry(name.clone()).or_default();
            q.events.clear();
            q.busy = false;
        }
    }

    step(&mut next, current, true, &mut effects);
    Transition {
        state: next,
        effects,
    }
}

fn step(state: &mut SchedulerState, queue: &QueueId, force: bool, effects: &mut Vec<Effect>) {
    let QueueId::Named(name) = queue else {
        return;
    };
    let q = state.queues.entry(name.clone()).or_default();
    if q.busy && !force {
        return;
    }
    if q.stopped || q.paused {
        q.busy = false;
        return;
    }
    match q.events.pop_front() {
        Some(event) => {
            q.busy = true;
            effects.push(Effect::Execute {
                queue: queue.clone(),
                event,
            });
        }
        None => q.busy = false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn named(name: &str) -> QueueId {
        QueueId::from(name)
    }

    fn tagged(tag: &str) -> Event {
        Event {
            broadcast: Some(json!(tag)),
            ..Event::default()
        }
    }

    fn executed(effects: &[Effect]) -> Vec<String> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Execute { event, .. } => {
                    event.broadcast.as_ref().and_then(|b| b.as_str()).map(str::to_string)
                }
                Effect::StartTimer { .. } => None,
            })
            .collect()
    }

    #[test]
    fn immediate_executes_without_state_change() {
        let state = SchedulerState::default();
        let t = dispatch(&state, &QueueId::Immediate, tagged("now"));
        assert_eq!(t.state, state);
        assert_eq!(executed(&t.effects), vec!["now"]);
    }

    #[test]
    fn first_event_starts_the_queue_and_later_ones_wait() {
        let t = dispatch(&SchedulerState::default(), &named("a"), tagged("1"));
        assert_eq!(executed(&t.effects), vec!["1"]);
        assert!(t.state.queue("a").unwrap().busy);

        let t = dispatch(&t.state, &named("a"), tagged("2"));
        assert!(t.effects.is_empty());
        assert_eq!(t.state.queue("a").unwrap().events.len(), 1);

        // Finishing "1" progresses the queue.
        let t = process_controls(&t.state, &IndexMap::new(), &named("a"));
        assert_eq!(executed(&t.effects), vec!["2"]);

        let t = process_controls(&t.state, &IndexMap::new(), &named("a"));
        assert!(t.effects.is_empty());
        assert!(!t.state.queue("a").unwrap().busy);
    }

    #[test]
    fn busy_queue_ignores_unforced_steps() {
        let t = dispatch(&SchedulerState::default(), &named("a"), tagged("1"));
        let mut state = t.state;
        state.queues.get_mut("a").unwrap().events.push_back(tagged("2"));

        assert!(execute_next(&state, &named("a"), false).effects.is_empty());
        assert_eq!(executed(&execute_next(&state, &named("a"), true).effects), vec!["2"]);
        assert!(execute_next(&state, &QueueId::Immediate, true).effects.is_empty());
    }

    #[test]
    fn pause_starts_a_timer_and_idles_the_queue() {
        let controls = IndexMap::from([("a".to_string(), QueueControl::pause(0.05))]);
        let t = process_controls(&SchedulerState::default(), &controls, &named("a"));

        assert_eq!(
            t.effects,
            vec![Effect::StartTimer {
                queue: "a".into(),
                delay: Duration::from_millis(50)
            }]
        );
        let q = t.state.queue("a").unwrap();
        assert!(q.paused);
        assert!(!q.busy);

        // Longer than the clock can hold: waits forever rather than not at all.
        let huge = IndexMap::from([("b".to_string(), QueueControl::pause(1e20))]);
        let t2 = process_controls(&SchedulerState::default(), &huge, &named("b"));
        assert_eq!(
            t2.effects,
            vec![Effect::StartTimer {
                queue: "b".into(),
                delay: Duration::MAX
            }]
        );

        let t = dispatch(&t.state, &named("a"), tagged("later"));
        assert!(t.effects.is_empty());

        let resume = IndexMap::from([("a".to_string(), QueueControl::resume())]);
        let t = process_controls(&t.state, &resume, &QueueId::Immediate);
        assert_eq!(executed(&t.effects), vec!["later"]);
    }

    #[test]
    fn stop_survives_a_resume() {
        let mut state = SchedulerState::default();
        state.queues.insert(
            "a".into(),
            QueueState {
                events: VecDeque::from([tagged("x")]),
                busy: false,
                stopped: true,
                paused: true,
            },
        );
        let resume = IndexMap::from([("a".to_string(), QueueControl::resume())]);
        let t = process_controls(&state, &resume, &QueueId::Immediate);
        assert!(t.effects.is_empty());

        let start = IndexMap::from([("a".to_string(), QueueControl::start())]);
        let t = process_controls(&t.state, &start, &QueueId::Immediate);
        assert_eq!(executed(&t.effects), vec!["x"]);
    }

    #[test]
    fn clear_drops_queued_events_only() {
        let t = dispatch(&SchedulerState::default(), &named("a"), tagged("running"));
        let t = dispatch(&t.state, &named("a"), tagged("queued"));
        assert_eq!(executed(&t.effects), Vec::<String>::new());

        let clear = IndexMap::from([("a".to_string(), QueueControl::clear())]);
        let t = process_controls(&t.state, &clear, &QueueId::Immediate);
        assert!(t.effects.is_empty());
        let q = t.state.queue("a").unwrap();
        assert!(q.events.is_empty());
        assert!(!q.busy);
    }

    #[test]
    fn controls_deserialize_from_json() {
        let c: QueueControl = serde_json::from_value(json!({ "pause": 0.5 })).unwrap();
        assert_eq!(c, QueueControl::pause(0.5));
        let c: QueueControl = serde_json::from_value(json!({ "pause": false, "stopped": true })).unwrap();
        assert_eq!(c.pause, Some(Pause::Resume));
        assert_eq!(c.stopped, Some(true));
        assert!(serde_json::from_value::<QueueControl>(json!({ "pause": true })).is_err());
        assert!(serde_json::from_value::<QueueControl>(json!({ "pause": -1 })).is_err());
        assert!(serde_json::from_value::<QueueControl>(json!({ "halt": true })).is_err());
    }

    #[test]
    fn immediate_name_is_reserved() {
        assert_eq!(QueueId::from("immediate"), QueueId::Immediate);
        assert_eq!(QueueId::from("a").to_string(), "a");
    }
}
