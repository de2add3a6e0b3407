//! Static decorations of the spiral: pitch-class labels, band circles and the
//! note-range background curve.

use super::mapper::{spiral_angle, BAND_DENOMINATOR, BAND_VALUES, NoteTuning};

pub const PITCH_CLASSES: [&str; 12] = [
    "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
];

/// Concert-pitch A used to place spectrogram labels.
pub const LABEL_BASE_HZ: f64 = 55.0;

/// A1 in MIDI numbering.
const A_NOTE: f64 = 33.0;

#[derive(Clone, Debug, PartialEq)]
pub struct NoteLabel {
    pub name: &'static str,
    pub angle: f64,
}

/// Twelve labels starting with "A" at `a_hz`, one semitone apart.
pub fn note_labels(a_hz: f64, reference_hz: f64) -> Vec<NoteLabel> {
    PITCH_CLASSES
        .iter()
        .enumerate()
        .map(|(i, &name)| NoteLabel {
            name,
            angle: spiral_angle(a_hz * 2f64.powf(i as f64 / 12.0), reference_hz),
        })
        .collect()
}

/// Frequency of an A on the tuning's own note grid.
pub fn tuned_a_hz(tuning: &NoteTuning) -> f64 {
    tuning.frequency(A_NOTE)
}

pub fn band_radii() -> Vec<f64> {
    BAND_VALUES.iter().map(|v| v / BAND_DENOMINATOR).collect()
}

/// `(angle, continuous radius)` samples over notes `0..=127`.
pub fn note_curve(tuning: &NoteTuning, reference_hz: f64, samples: usize) -> Vec<(f64, f64)> {
    if samples < 2 {
        return Vec::new();
    }
    (0..samples)
        .map(|i| {
            let note = 127.0 * i as f64 / (samples - 1) as f64;
            let f = tuning.frequency(note);
            (spiral_angle(f, reference_hz), (1.0 / f).log2())
        })
        .collect()
}
