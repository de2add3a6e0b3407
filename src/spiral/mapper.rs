use serde::Serialize;
use std::f64::consts::{FRAC_PI_2, TAU};

use crate::error::{Result, SpiralError};

/// Upper edges of the octave bands used for banded radii, in Hz.
pub const BAND_THRESHOLDS: [f64; 10] = [
    55.0, 110.0, 220.0, 440.0, 880.0, 1760.0, 3520.0, 7040.0, 14080.0, 28160.0,
];

/// Band radii numerators, paired with `BAND_THRESHOLDS`, over `BAND_DENOMINATOR`.
pub const BAND_VALUES: [f64; 10] = [14.0, 13.0, 12.0, 11.0, 10.0, 9.0, 8.0, 7.0, 6.0, 5.0];
pub const BAND_DENOMINATOR: f64 = 15.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RadiusMode {
    /// Step function over the octave bands, in `[0, 14/15]`.
    Banded,
    /// `log2(1/f)`, un-normalized.
    Continuous,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PitchPoint {
    pub frequency: f64,
    /// Unbounded; consumers wrap with `wrapped_angle` when they need `[0, 2π)`.
    pub angle: f64,
    pub radius: f64,
}

impl PitchPoint {
    pub fn wrapped_angle(&self) -> f64 {
        self.angle.rem_euclid(TAU)
    }
}

pub fn polar_to_cartesian(radius: f64, angle: f64) -> (f64, f64) {
    (radius * angle.cos(), radius * angle.sin())
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(SpiralError::invalid(format!(
            "{} must be finite and > 0, got {}",
            name, value
        )));
    }
    Ok(())
}

pub fn spiral_angle(frequency: f64, reference_hz: f64) -> f64 {
    FRAC_PI_2 - TAU * (frequency / reference_hz).log2()
}

pub fn banded_radius(frequency: f64) -> f64 {
    BAND_THRESHOLDS
        .iter()
        .zip(BAND_VALUES.iter())
        .find(|&(&threshold, _)| frequency < threshold)
        .map_or(0.0, |(_, &value)| value / BAND_DENOMINATOR)
}

pub fn continuous_radius(frequency: f64) -> f64 {
    (1.0 / frequency).log2()
}

pub fn map_frequency(frequency: f64, reference_hz: f64, mode: RadiusMode) -> Result<PitchPoint> {
    check_positive("frequency", frequency)?;
    check_positive("reference frequency", reference_hz)?;

    let radius = match mode {
        RadiusMode::Banded => banded_radius(frequency),
        RadiusMode::Continuous => continuous_radius(frequency),
    };

    Ok(PitchPoint {
        frequency,
        angle: spiral_angle(frequency, reference_hz),
        radius,
    })
}

/// Equal-tempered note grid anchored at an arbitrary note/frequency pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteTuning {
    pub anchor_note: u8,
    pub anchor_hz: f64,
}

impl Default for NoteTuning {
    /// Note 33 sits at 33 Hz, so the full 0..128 range spans roughly 4.8 Hz to 5.1 kHz.
    fn default() -> Self {
        Self {
            anchor_note: 33,
            anchor_hz: 33.0,
        }
    }
}

impl NoteTuning {
    pub fn frequency(&self, note: f64) -> f64 {
        self.anchor_hz * 2f64.powf((note - self.anchor_note as f64) / 12.0)
    }
}

pub fn map_note(note: u8, tuning: &NoteTuning, reference_hz: f64, mode: RadiusMode) -> Result<PitchPoint> {
    check_positive("anchor frequency", tuning.anchor_hz)?;
    map_frequency(tuning.frequency(note as f64), reference_hz, mode)
}

/// Linear rescale of continuous radii onto `[0, 1]`. Direction is preserved:
/// higher frequencies still land closer to the centre.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContinuousScale {
    min: f64,
    max: f64,
}

impl ContinuousScale {
    pub fn from_radii<I: IntoIterator<Item = f64>>(radii: I) -> Option<Self> {
        let (min, max) = radii
            .into_iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| (lo.min(r), hi.max(r)));
        (min.is_finite() && max.is_finite()).then_some(Self { min, max })
    }

    pub fn apply(&self, radius: f64) -> f64 {
        let span = self.max - self.min;
        if span <= f64::EPSILON {
            return 1.0;
        }
        ((radius - self.min) / span).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrapped_close(a: f64, b: f64) -> bool {
        let d = (a - b).rem_euclid(TAU);
        d < 1e-9 || TAU - d < 1e-9
    }

    #[test]
    fn octaves_share_an_angle() {
        for &f in &[27.5, 33.0, 55.0, 61.7, 440.0, 1234.5] {
            let base = map_frequency(f, 55.0, RadiusMode::Banded).unwrap();
            for k in -3i32..=5 {
                let shifted = map_frequency(f * 2f64.powi(k), 55.0, RadiusMode::Banded).unwrap();
                assert!(
                    wrapped_close(base.wrapped_angle(), shifted.wrapped_angle()),
                    "{} Hz vs {} octaves away",
                    f,
                    k
                );
            }
        }
    }

    #[test]
    fn reference_frequency_points_up() {
        let p = map_frequency(55.0, 55.0, RadiusMode::Banded).unwrap();
        assert!((p.angle - FRAC_PI_2).abs() < 1e-12);
        let (x, y) = polar_to_cartesian(p.radius, p.angle);
        assert!(x.abs() < 1e-12);
        assert!((y - 13.0 / 15.0).abs() < 1e-12);
    }

    #[test]
    fn semitone_is_a_twelfth_turn() {
        let a = map_frequency(440.0, 55.0, RadiusMode::Banded).unwrap();
        let b = map_frequency(440.0 * 2f64.powf(1.0 / 12.0), 55.0, RadiusMode::Banded).unwrap();
        assert!((a.angle - b.angle - TAU / 12.0).abs() < 1e-9);
    }

    #[test]
    fn banded_radius_follows_threshold_table() {
        assert_eq!(banded_radius(20.0), 14.0 / 15.0);
        assert_eq!(banded_radius(54.99), 14.0 / 15.0);
        assert_eq!(banded_radius(55.0), 13.0 / 15.0);
        assert_eq!(banded_radius(439.0), 11.0 / 15.0);
        assert_eq!(banded_radius(20000.0), 5.0 / 15.0);
        assert_eq!(banded_radius(28160.0), 0.0);
        assert_eq!(banded_radius(40000.0), 0.0);
    }

    #[test]
    fn radius_never_grows_with_frequency() {
        for mode in [RadiusMode::Banded, RadiusMode::Continuous] {
            let mut prev = f64::INFINITY;
            let mut f = 1.0;
            while f < 40000.0 {
                let r = map_frequency(f, 55.0, mode).unwrap().radius;
                assert!(r <= prev, "{:?} radius grew at {} Hz", mode, f);
                prev = r;
                f *= 1.013;
            }
        }
    }

    #[test]
    fn rejects_non_positive_inputs() {
        for (f, r) in [(0.0, 55.0), (-1.0, 55.0), (440.0, 0.0), (f64::NAN, 55.0)] {
            assert!(matches!(
                map_frequency(f, r, RadiusMode::Continuous),
                Err(SpiralError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn default_tuning_matches_note_grid() {
        let tuning = NoteTuning::default();
        assert!((tuning.frequency(33.0) - 33.0).abs() < 1e-12);
        assert!((tuning.frequency(45.0) - 66.0).abs() < 1e-9);

        let p = map_note(45, &tuning, 33.0, RadiusMode::Continuous).unwrap();
        assert!((p.radius - (1.0f64 / 66.0).log2()).abs() < 1e-9);
    }

    #[test]
    fn continuous_scale_keeps_direction() {
        let tuning = NoteTuning::default();
        let points: Vec<PitchPoint> = (0..128)
            .map(|n| map_note(n, &tuning, 33.0, RadiusMode::Continuous).unwrap())
            .collect();
        let scale = ContinuousScale::from_radii(points.iter().map(|p| p.radius)).unwrap();
        assert!((scale.apply(points[0].radius) - 1.0).abs() < 1e-12);
        assert!(scale.apply(points[127].radius).abs() < 1e-12);
        assert!(scale.apply(points[40].radius) > scale.apply(points[41].radius));
    }
}
