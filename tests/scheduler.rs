use graphanim::attr::decode_attr;
use graphanim::config::Settings;
use graphanim::render::FrameRecorder;
use graphanim::scheduler::{Controller, Event, QueueControl, QueueId};
use graphanim::spec::canvas_spec;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

fn controller() -> Controller<FrameRecorder> {
    Controller::new(Settings::default(), FrameRecorder::default())
}

fn zoom(z: f64) -> Event {
    Event::changes(decode_attr(&canvas_spec(), &json!({ "zoom": z })).unwrap())
}

fn pause(queue: &str, secs: f64) -> Event {
    Event::control(queue, QueueControl::pause(secs))
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Zoom values of rendered frames, in order.
fn zooms(c: &Controller<FrameRecorder>) -> Vec<f64> {
    c.sink()
        .frames
        .iter()
        .filter_map(|f| f.attributes.get("zoom").and_then(|z| z.as_num()))
        .collect()
}

#[test]
fn one_queue_runs_in_order_with_pauses() {
    let mut c = controller();
    for z in [1.5, 2.0, 2.5] {
        c.dispatch("a", pause("a", 0.05));
        c.dispatch("a", zoom(z));
    }
    assert!(c.sink().frames.is_empty());

    c.advance(ms(50));
    c.advance(ms(50));
    c.advance(ms(50));
    assert_eq!(c.sink().times(), vec![0.05, 0.10, 0.15]);
    assert_eq!(zooms(&c), vec![1.5, 2.0, 2.5]);
}

#[test]
fn independent_queues_pause_concurrently() {
    let mut c = controller();
    for (queue, z) in [("a", 1.5), ("b", 2.0), ("c", 2.5)] {
        c.dispatch(queue, pause(queue, 0.05));
        c.dispatch(queue, zoom(z));
    }
    c.run_until_idle();

    assert_eq!(c.sink().times(), vec![0.05, 0.05, 0.05]);
    let queues: Vec<&str> = c.sink().frames.iter().map(|f| f.queue.name()).collect();
    assert_eq!(queues, vec!["a", "b", "c"]);
}

#[test]
fn immediate_events_skip_paused_queues() {
    let mut c = controller();
    c.dispatch("a", pause("a", 1.0));
    c.dispatch("a", zoom(2.0));
    c.dispatch(QueueId::Immediate, zoom(3.0));

    assert_eq!(zooms(&c), vec![3.0]);
    c.run_until_idle();
    assert_eq!(zooms(&c), vec![3.0, 2.0]);
}

#[test]
fn stopped_queue_holds_events_until_started() {
    let mut c = controller();
    c.dispatch(QueueId::Immediate, Event::control("a", QueueControl::stop()));
    c.dispatch("a", zoom(2.0));
    c.dispatch("a", zoom(3.0));
    assert!(c.sink().frames.is_empty());
    assert_eq!(c.state().queue("a").map(|q| q.events.len()), Some(2));

    c.dispatch(QueueId::Immediate, Event::control("a", QueueControl::start()));
    assert_eq!(zooms(&c), vec![2.0, 3.0]);
}

#[test]
fn stop_during_pause_outlasts_the_timer() {
    let mut c = controller();
    c.dispatch("a", pause("a", 0.05));
    c.dispatch("a", zoom(2.0));

    c.advance(ms(20));
    c.dispatch(QueueId::Immediate, Event::control("a", QueueControl::stop()));
    c.advance(ms(40));
    assert!(c.sink().frames.is_empty());

    c.advance(ms(40));
    c.dispatch(QueueId::Immediate, Event::control("a", QueueControl::start()));
    assert_eq!(c.sink().times(), vec![0.1]);
}

#[test]
fn clear_drops_waiting_events_but_not_the_running_pause() {
    let mut c = controller();
    c.dispatch("a", pause("a", 0.05));
    c.dispatch("a", zoom(2.0));
    c.dispatch("a", zoom(3.0));

    c.advance(ms(10));
    c.dispatch(QueueId::Immediate, Event::control("a", QueueControl::clear()));
    c.dispatch("a", zoom(4.0));

    // Still paused by the event that was running when the queue was cleared.
    assert!(c.sink().frames.is_empty());
    c.run_until_idle();
    assert_eq!(zooms(&c), vec![4.0]);
    assert_eq!(c.sink().times(), vec![0.05]);
}

#[test]
fn an_event_can_control_another_queue() {
    let mut c = controller();
    c.dispatch("b", Event::control("b", QueueControl::stop()));
    c.dispatch("b", zoom(2.0));
    c.dispatch("a", zoom(3.0).with_control("b", QueueControl::start()));
    assert_eq!(zooms(&c), vec![3.0, 2.0]);
}
