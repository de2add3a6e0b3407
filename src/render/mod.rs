pub mod json;
pub mod logger;
pub mod svg;

use anyhow::Result;
use serde::Serialize;

use crate::spiral::{PitchPoint, RadiusMode};

/// Everything a renderer needs to draw one tick.
#[derive(Clone, Debug, Serialize)]
pub struct RenderSnapshot {
    pub clock_ms: f64,
    pub step: usize,
    pub mode: RadiusMode,
    pub points: Vec<PitchPoint>,
    /// Sounding notes, parallel to `points` for note timelines.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub active: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dim: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Vec<f32>>,
}

pub trait Renderer {
    fn render(&mut self, snapshot: &RenderSnapshot) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Renderer for Vec<Box<dyn Renderer>> {
    fn render(&mut self, snapshot: &RenderSnapshot) -> Result<()> {
        for renderer in self.iter_mut() {
            renderer.render(snapshot)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        for renderer in self.iter_mut() {
            renderer.finish()?;
        }
        Ok(())
    }
}
