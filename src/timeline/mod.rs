pub mod frames;
pub mod notes;

pub use frames::FrameTimeline;
pub use notes::{DeltaPolicy, NoteTimeline, NoteTimelineOptions};

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum EventKind {
    NoteOn,
    NoteOff,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TimelineEvent {
    pub kind: EventKind,
    pub note: u8,
    pub velocity: u8,
    /// Accumulated delta-time in source ticks.
    pub tick: u64,
    pub time_ms: u64,
}

/// What the scheduler plays back.
#[derive(Clone, Debug)]
pub enum Timeline {
    Notes(NoteTimeline),
    Frames(FrameTimeline),
}

impl Timeline {
    pub fn duration_ms(&self) -> f64 {
        match self {
            Timeline::Notes(t) => t.duration_ms as f64,
            Timeline::Frames(t) => t.duration_ms(),
        }
    }
}
