//! Cooperative multi-queue scheduler.
//!
//! Events on the same named queue run one after another; different queues
//! interleave. The `immediate` queue runs an event as soon as it is
//! dispatched. A queue only waits when an event pauses it, so a pause is
//! the one point where other queues get to run.

mod controller;
mod state;

pub use controller::Controller;
pub use state::{
    Effect, Event, IMMEDIATE, Pause, QueueControl, QueueId, QueueState, SchedulerState,
    Transition, dispatch, execute_next, process_controls,
};
