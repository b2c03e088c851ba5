use super::state::{self, Effect, Event, QueueControl, QueueId, SchedulerState, Transition};
use crate::config::Settings;
use crate::diagnostics;
use crate::model::CanvasModel;
use crate::render::{ErrorKind, ReceiveEvent, RenderFrame, Sink};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Timer {
    due: Duration,
    seq: u64,
    queue: String,
}

/// Drives one canvas: owns the queues, the attribute model and a virtual
/// clock. Time only moves through `advance`, `advance_to` and
/// `run_until_idle`.
pub struct Controller<S: Sink> {
    state: SchedulerState,
    model: CanvasModel,
    sink: S,
    now: Duration,
    seq: u64,
    timers: BinaryHeap<Reverse<Timer>>,
    pending: VecDeque<Effect>,
}

impl<S: Sink> Controller<S> {
    pub fn new(settings: Settings, sink: S) -> Self {
        Self {
            state: SchedulerState::default(),
            model: CanvasModel::new(settings),
            sink,
            now: Duration::ZERO,
            seq: 0,
            timers: BinaryHeap::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn dispatch(&mut self, queue: impl Into<QueueId>, event: Event) {
        let queue = queue.into();
        let transition = state::dispatch(&self.state, &queue, event);
        self.install(transition);
        self.run();
    }

    /// Move the clock forward by `dt`, firing every timer due on the way.
    pub fn advance(&mut self, dt: Duration) {
        self.advance_to(self.now.saturating_add(dt));
    }

    pub fn advance_to(&mut self, t: Duration) {
        while let Some(Reverse(timer)) = self.timers.peek() {
            if timer.due > t {
                break;
            }
            self.fire_next();
        }
        self.now = self.now.max(t);
    }

    /// Fire timers until none are left.
    pub fn run_until_idle(&mut self) {
        while !self.timers.is_empty() {
            self.fire_next();
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn model(&self) -> &CanvasModel {
        &self.model
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    fn fire_next(&mut self) {
        let Some(Reverse(timer)) = self.timers.pop() else {
            return;
        };
        self.now = self.now.max(timer.due);
        tracing::debug!(queue = %timer.queue, time = self.now.as_secs_f64(), "pause elapsed");
        self.dispatch(
            QueueId::Immediate,
            Event::control(timer.queue, QueueControl::resume()),
        );
    }

    fn install(&mut self, transition: Transition) {
        self.state = transition.state;
        self.pending.extend(transition.effects);
    }

    fn run(&mut self) {
        while let Some(effect) = self.pending.pop_front() {
            match effect {
                Effect::Execute { queue, event } => self.execute(queue, event),
                Effect::StartTimer { queue, delay } => {
                    self.seq += 1;
                    self.timers.push(Reverse(Timer {
                        due: self.now.saturating_add(delay),
                        seq: self.seq,
                        queue,
                    }));
                }
            }
        }
    }

    fn execute(&mut self, queue: QueueId, event: Event) {
        tracing::debug!(queue = %queue, time = self.now.as_secs_f64(), "executing event");

        if let Some(overrides) = &event.anim_defaults {
            self.model.set_anim_defaults(overrides);
        }

        if let Some(changes) = &event.attr_changes {
            match self.model.apply(changes, event.animation.as_ref()) {
                Ok(applied) => self.sink.render(RenderFrame {
                    queue: queue.clone(),
                    time: self.now.as_secs_f64(),
                    attributes: applied.attributes,
                    changed: applied.changed,
                    animation: applied.animation,
                }),
                Err(err) => {
                    diagnostics::warn(err.to_string());
                    self.sink.receive(ReceiveEvent::Error {
                        kind: ErrorKind::Attribute,
                        message: err.to_string(),
                    });
                }
            }
        }

        if let Some(message) = event.broadcast {
            self.sink.receive(ReceiveEvent::Broadcast { message });
        }

        let transition = state::process_controls(&self.state, &event.queue_controls, &queue);
        self.install(transition);
    }
}
