use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::path::Path;

use crate::error::{Result, SpiralError};

/// 120 BPM, the SMF default when no tempo event is present.
pub const DEFAULT_TEMPO_US: u32 = 500_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8, velocity: u8 },
    Other,
}

/// One message of a track, timed relative to its predecessor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawMidiMessage {
    pub delta: u32,
    pub kind: MessageKind,
}

impl RawMidiMessage {
    pub fn note_on(delta: u32, note: u8, velocity: u8) -> Self {
        Self {
            delta,
            kind: MessageKind::NoteOn { note, velocity },
        }
    }

    pub fn note_off(delta: u32, note: u8) -> Self {
        Self {
            delta,
            kind: MessageKind::NoteOff { note, velocity: 0 },
        }
    }

    pub fn other(delta: u32) -> Self {
        Self {
            delta,
            kind: MessageKind::Other,
        }
    }
}

/// The note track of a file plus the tick length needed to place it in time.
#[derive(Clone, Debug)]
pub struct MidiSource {
    pub messages: Vec<RawMidiMessage>,
    pub ms_per_tick: f64,
    pub track_index: usize,
    pub track_count: usize,
}

pub fn parse_file(path: &Path) -> Result<MidiSource> {
    let bytes = std::fs::read(path)
        .map_err(|e| SpiralError::decode(format!("{}: cannot read file: {}", path.display(), e)))?;
    let source = parse_bytes(&bytes)
        .map_err(|e| SpiralError::decode(format!("{}: {}", path.display(), e)))?;
    log::info!(
        "Parsed MIDI: track {}/{} with {} messages, {:.3}ms per tick",
        source.track_index + 1,
        source.track_count,
        source.messages.len(),
        source.ms_per_tick
    );
    Ok(source)
}

pub fn parse_bytes(bytes: &[u8]) -> Result<MidiSource> {
    let smf = Smf::parse(bytes).map_err(|e| SpiralError::decode(format!("malformed MIDI: {}", e)))?;

    // Only one track is visualized: the first that carries any notes.
    let track_index = smf
        .tracks
        .iter()
        .position(|track| track.iter().any(is_note_event))
        .ok_or_else(|| SpiralError::decode("no track contains note events"))?;

    let tempo = smf.tracks.iter().flatten().find_map(|event| match event.kind {
        TrackEventKind::Meta(MetaMessage::Tempo(us)) => Some(us.as_int()),
        _ => None,
    });

    Ok(MidiSource {
        messages: convert_track(&smf.tracks[track_index]),
        ms_per_tick: ms_per_tick(smf.header.timing, tempo.unwrap_or(DEFAULT_TEMPO_US))?,
        track_index,
        track_count: smf.tracks.len(),
    })
}

fn is_note_event(event: &TrackEvent) -> bool {
    matches!(
        event.kind,
        TrackEventKind::Midi {
            message: MidiMessage::NoteOn { .. } | MidiMessage::NoteOff { .. },
            ..
        }
    )
}

pub fn convert_track(track: &[TrackEvent]) -> Vec<RawMidiMessage> {
    track
        .iter()
        .map(|event| {
            let delta = event.delta.as_int();
            match event.kind {
                TrackEventKind::Midi { message, .. } => match message {
                    MidiMessage::NoteOn { key, vel } => RawMidiMessage::note_on(delta, key.as_int(), vel.as_int()),
                    MidiMessage::NoteOff { key, vel } => RawMidiMessage {
                        delta,
                        kind: MessageKind::NoteOff {
                            note: key.as_int(),
                            velocity: vel.as_int(),
                        },
                    },
                    _ => RawMidiMessage::other(delta),
                },
                _ => RawMidiMessage::other(delta),
            }
        })
        .collect()
}

pub fn ms_per_tick(timing: Timing, tempo_us: u32) -> Result<f64> {
    let ms = match timing {
        Timing::Metrical(ticks_per_beat) => {
            let tpb = ticks_per_beat.as_int();
            if tpb == 0 {
                return Err(SpiralError::decode("ticks per beat is zero"));
            }
            tempo_us as f64 / tpb as f64 / 1000.0
        }
        Timing::Timecode(fps, subframes) => {
            if subframes == 0 {
                return Err(SpiralError::decode("timecode subframe count is zero"));
            }
            1000.0 / (fps.as_f32() as f64 * subframes as f64)
        }
    };
    Ok(ms)
}
