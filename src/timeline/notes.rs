use serde::Deserialize;

use super::{EventKind, TimelineEvent};
use crate::error::{Result, SpiralError};
use crate::midi::{MessageKind, RawMidiMessage};
use crate::spiral::{map_note, NoteTuning, PitchPoint, RadiusMode};

pub const NOTE_COUNT: usize = 128;

/// Which messages advance the running tick accumulator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeltaPolicy {
    /// Every message's delta counts, as the SMF format defines it.
    #[default]
    AllMessages,
    /// Only note-on/off deltas count; deltas carried by other messages are lost.
    NoteMessagesOnly,
}

#[derive(Clone, Copy, Debug)]
pub struct NoteTimelineOptions {
    pub ms_per_tick: f64,
    pub delta_policy: DeltaPolicy,
    pub tuning: NoteTuning,
    pub reference_hz: f64,
}

impl Default for NoteTimelineOptions {
    fn default() -> Self {
        Self {
            ms_per_tick: 1.0,
            delta_policy: DeltaPolicy::default(),
            tuning: NoteTuning::default(),
            reference_hz: 33.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NoteTimeline {
    pub events: Vec<TimelineEvent>,
    /// Continuous-mode point of every MIDI note, indexed by note number.
    pub note_points: Vec<PitchPoint>,
    pub duration_ms: u64,
}

impl NoteTimeline {
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn point(&self, note: u8) -> PitchPoint {
        self.note_points[note as usize]
    }
}

fn check_range(what: &str, value: u8) -> Result<()> {
    if value > 127 {
        return Err(SpiralError::decode(format!("{} {} is out of range 0..=127", what, value)));
    }
    Ok(())
}

pub fn build(messages: &[RawMidiMessage], options: &NoteTimelineOptions) -> Result<NoteTimeline> {
    if !options.ms_per_tick.is_finite() || options.ms_per_tick <= 0.0 {
        return Err(SpiralError::invalid(format!(
            "ms per tick must be finite and > 0, got {}",
            options.ms_per_tick
        )));
    }

    let mut tick: u64 = 0;
    let mut events = Vec::with_capacity(messages.len());

    for message in messages {
        let (kind, note, velocity) = match message.kind {
            MessageKind::NoteOn { note, velocity: 0 } => (EventKind::NoteOff, note, 0),
            MessageKind::NoteOn { note, velocity } => (EventKind::NoteOn, note, velocity),
            MessageKind::NoteOff { note, velocity } => (EventKind::NoteOff, note, velocity),
            MessageKind::Other => {
                if options.delta_policy == DeltaPolicy::AllMessages {
                    tick += message.delta as u64;
                }
                continue;
            }
        };
        check_range("note", note)?;
        check_range("velocity", velocity)?;

        tick += message.delta as u64;
        events.push(TimelineEvent {
            kind,
            note,
            velocity,
            tick,
            time_ms: (tick as f64 * options.ms_per_tick).round() as u64,
        });
    }

    let last = events
        .last()
        .ok_or_else(|| SpiralError::decode("message stream contains no note events"))?;
    let duration_ms = last.time_ms;

    let note_points = (0..NOTE_COUNT as u8)
        .map(|n| map_note(n, &options.tuning, options.reference_hz, RadiusMode::Continuous))
        .collect::<Result<Vec<_>>>()?;

    log::info!("Note timeline: {} events over {}ms", events.len(), duration_ms);

    Ok(NoteTimeline {
        events,
        note_points,
        duration_ms,
    })
}
