use anyhow::Result;

use super::{RenderSnapshot, Renderer};
use crate::spiral::layout::PITCH_CLASSES;

/// Reports note changes (note timelines) or frame advances (spectrograms) to the log.
#[derive(Debug, Default)]
pub struct LogRenderer {
    last_active: Vec<u8>,
    last_step: Option<usize>,
    snapshots: u64,
}

/// MIDI note name with octave, e.g. 60 -> "C4".
pub fn note_name(note: u8) -> String {
    let class = PITCH_CLASSES[(note as usize + 3) % 12];
    let octave = note as i32 / 12 - 1;
    format!("{}{}", class, octave)
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for LogRenderer {
    fn render(&mut self, snapshot: &RenderSnapshot) -> Result<()> {
        self.snapshots += 1;

        if let Some(size) = &snapshot.size {
            if self.last_step != Some(snapshot.step) {
                self.last_step = Some(snapshot.step);
                let loudest = size
                    .iter()
                    .zip(&snapshot.points)
                    .fold(None, |best: Option<(f32, f64)>, (&s, p)| match best {
                        Some((b, _)) if b >= s => best,
                        _ => Some((s, p.frequency)),
                    });
                if let Some((s, hz)) = loudest {
                    log::debug!("[{:8.1}ms] frame {} peak {:.0}Hz size {:.1}", snapshot.clock_ms, snapshot.step, hz, s);
                }
            }
            return Ok(());
        }

        if snapshot.active != self.last_active {
            let names: Vec<String> = snapshot.active.iter().map(|&n| note_name(n)).collect();
            log::info!("[{:8.1}ms] active: {}", snapshot.clock_ms, names.join(" "));
            self.last_active = snapshot.active.clone();
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        log::debug!("Log renderer saw {} snapshots", self.snapshots);
        Ok(())
    }
}
