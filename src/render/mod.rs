//! Output side of the controller: frames to draw and events sent back to
//! the caller.

mod html;

pub use html::render_replay_html;

use crate::anim::AnimNode;
use crate::attr::AttrValue;
use crate::layout::{LayoutGraph, layout_view};
use crate::scheduler::QueueId;
use serde::Serialize;

/// What the renderer must draw after one update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderFrame {
    pub queue: QueueId,
    /// Controller clock in seconds.
    pub time: f64,
    pub attributes: AttrValue,
    pub changed: Option<AttrValue>,
    pub animation: Option<AnimNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Attribute,
}

/// Messages for the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReceiveEvent {
    Error {
        kind: ErrorKind,
        message: String,
    },
    Broadcast {
        message: serde_json::Value,
    },
}

/// Receiver of controller output.
pub trait Sink {
    fn render(&mut self, frame: RenderFrame);

    fn receive(&mut self, event: ReceiveEvent);
}

/// Sink that keeps everything, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameRecorder {
    pub frames: Vec<RenderFrame>,
    pub events: Vec<ReceiveEvent>,
}

impl Sink for FrameRecorder {
    fn render(&mut self, frame: RenderFrame) {
        self.frames.push(frame);
    }

    fn receive(&mut self, event: ReceiveEvent) {
        self.events.push(event);
    }
}

impl FrameRecorder {
    /// Frame times, for asserting on scheduling.
    pub fn times(&self) -> Vec<f64> {
        self.frames.iter().map(|f| f.time).collect()
    }

    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|e| match e {
            ReceiveEvent::Error { message, .. } => Some(message.as_str()),
            ReceiveEvent::Broadcast { .. } => None,
        })
    }
}

/// Replay document written by the CLI.
///
/// JSON shape:
/// {
///   "frames": [ { "queue": "a", "time": 0.05, "attributes": {...},
///                 "changed": {...} | null, "animation": {...} | null,
///                 "layout": { "nodes": {...}, "edges": {...} } }, ... ],
///   "events": [ { "type": "error", "kind": "attribute", "message": "..." },
///               { "type": "broadcast", "message": ... } ]
/// }
#[derive(Debug, Serialize)]
pub struct Replay<'a> {
    pub frames: Vec<ReplayFrame<'a>>,
    pub events: &'a [ReceiveEvent],
}

#[derive(Debug, Serialize)]
pub struct ReplayFrame<'a> {
    #[serde(flatten)]
    pub frame: &'a RenderFrame,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutGraph>,
}

impl<'a> Replay<'a> {
    pub fn new(recorder: &'a FrameRecorder, with_layout: bool) -> Self {
        let frames = recorder
            .frames
            .iter()
            .map(|frame| ReplayFrame {
                frame,
                layout: with_layout.then(|| layout_view(&frame.attributes)),
            })
            .collect();
        Self {
            frames,
            events: &recorder.events,
        }
    }
}

pub fn render_replay_json(recorder: &FrameRecorder, with_layout: bool) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&Replay::new(recorder, with_layout))?)
}
