use anyhow::{Context, Result};
use plotters::prelude::*;
use std::path::{Path, PathBuf};

use super::{RenderSnapshot, Renderer};
use crate::spiral::layout::{band_radii, note_curve, note_labels, tuned_a_hz, NoteLabel, LABEL_BASE_HZ};
use crate::spiral::mapper::polar_to_cartesian;
use crate::spiral::{ContinuousScale, NoteTuning, RadiusMode};

const CURVE_SAMPLES: usize = 512;
const EXTENT: f64 = 1.2;

/// Writes every `every`-th snapshot as `frame_NNNNNN.svg` into `dir`.
pub struct SvgRenderer {
    dir: PathBuf,
    every: usize,
    pixels: u32,
    /// Labels for spectrogram frames and for note timelines.
    banded_labels: Vec<NoteLabel>,
    tuned_labels: Vec<NoteLabel>,
    /// Note-timeline background, already rescaled to display radii.
    curve: Vec<(f64, f64)>,
    scale: Option<ContinuousScale>,
    seen: usize,
    written: usize,
}

impl SvgRenderer {
    pub fn new(dir: &Path, every: usize, reference_hz: f64, tuning: &NoteTuning) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create SVG output dir: {}", dir.display()))?;

        let raw_curve = note_curve(tuning, reference_hz, CURVE_SAMPLES);
        let scale = ContinuousScale::from_radii(raw_curve.iter().map(|&(_, r)| r));
        let curve = match scale {
            Some(scale) => raw_curve
                .iter()
                .map(|&(angle, r)| polar_to_cartesian(scale.apply(r), angle))
                .collect(),
            None => Vec::new(),
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            every: every.max(1),
            pixels: 600,
            banded_labels: note_labels(LABEL_BASE_HZ, reference_hz),
            tuned_labels: note_labels(tuned_a_hz(tuning), reference_hz),
            curve,
            scale,
            seen: 0,
            written: 0,
        })
    }

    fn display_radius(&self, mode: RadiusMode, radius: f64) -> f64 {
        match (mode, self.scale) {
            (RadiusMode::Continuous, Some(scale)) => scale.apply(radius),
            _ => radius,
        }
    }

    fn draw(&self, path: &Path, snapshot: &RenderSnapshot) -> Result<()> {
        let root = SVGBackend::new(path, (self.pixels, self.pixels)).into_drawing_area();
        root.fill(&WHITE)?;

        let caption = format!("{:.2}s", snapshot.clock_ms / 1000.0);
        let mut chart = ChartBuilder::on(&root)
            .caption(&caption, ("sans-serif", 16))
            .margin(10)
            .build_cartesian_2d(-EXTENT..EXTENT, -EXTENT..EXTENT)?;

        let guide = YELLOW.mix(0.5).stroke_width(1);

        match snapshot.mode {
            RadiusMode::Banded => {
                for r in band_radii() {
                    chart.draw_series(LineSeries::new(
                        (0..=100).map(|i| polar_to_cartesian(r, i as f64 / 100.0 * std::f64::consts::TAU)),
                        guide,
                    ))?;
                }
            }
            RadiusMode::Continuous => {
                chart.draw_series(LineSeries::new(self.curve.iter().copied(), BLUE.stroke_width(1)))?;
            }
        }

        let labels = match snapshot.mode {
            RadiusMode::Banded => &self.banded_labels,
            RadiusMode::Continuous => &self.tuned_labels,
        };
        for label in labels {
            chart.draw_series(LineSeries::new(
                [(0.0, 0.0), polar_to_cartesian(1.0, label.angle)],
                guide,
            ))?;
            chart.draw_series(std::iter::once(Text::new(
                label.name,
                polar_to_cartesian(1.08, label.angle),
                ("sans-serif", 14).into_font(),
            )))?;
        }

        let mode = snapshot.mode;
        match (&snapshot.dim, &snapshot.size) {
            (Some(dim), Some(size)) => {
                chart.draw_series(snapshot.points.iter().zip(dim.iter().zip(size)).map(|(p, (&d, &s))| {
                    let grey = (d.clamp(0.0, 1.0) * 255.0) as u8;
                    let xy = polar_to_cartesian(self.display_radius(mode, p.radius), p.angle);
                    Circle::new(xy, (s.sqrt() as i32).max(1), RGBColor(grey, grey, grey).filled())
                }))?;
            }
            _ => {
                chart.draw_series(snapshot.points.iter().map(|p| {
                    let xy = polar_to_cartesian(self.display_radius(mode, p.radius), p.angle);
                    Circle::new(xy, 5, RED.filled())
                }))?;
            }
        }

        root.present()
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

impl Renderer for SvgRenderer {
    fn render(&mut self, snapshot: &RenderSnapshot) -> Result<()> {
        let index = self.seen;
        self.seen += 1;
        if index % self.every != 0 {
            return Ok(());
        }
        let path = self.dir.join(format!("frame_{:06}.svg", self.written));
        self.draw(&path, snapshot)?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        log::info!("Wrote {} SVG frames to {}", self.written, self.dir.display());
        Ok(())
    }
}
