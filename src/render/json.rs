use anyhow::{Context, Result};
use std::io::Write;

use super::{RenderSnapshot, Renderer};

/// Writes one JSON object per snapshot, newline separated.
pub struct JsonLinesRenderer<W: Write> {
    out: W,
    written: u64,
}

impl<W: Write> JsonLinesRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }
}

impl<W: Write> Renderer for JsonLinesRenderer<W> {
    fn render(&mut self, snapshot: &RenderSnapshot) -> Result<()> {
        serde_json::to_writer(&mut self.out, snapshot).context("Failed to serialize snapshot")?;
        self.out.write_all(b"\n").context("Failed to write snapshot")?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush().context("Failed to flush snapshot output")?;
        log::info!("Wrote {} snapshots as JSON lines", self.written);
        Ok(())
    }
}
