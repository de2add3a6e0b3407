//! Clock and transport seams between the scheduler and whatever is playing.

#[cfg(feature = "playback")]
pub mod output;

use std::cell::Cell;
use std::time::Instant;

use anyhow::Result;

/// A millisecond position that only moves forward while playing.
pub trait PlaybackClock {
    /// `None` until playback has started.
    fn position_ms(&self) -> Option<f64>;
}

impl<T: PlaybackClock + ?Sized> PlaybackClock for &T {
    fn position_ms(&self) -> Option<f64> {
        (**self).position_ms()
    }
}

impl<T: PlaybackClock + ?Sized> PlaybackClock for Box<T> {
    fn position_ms(&self) -> Option<f64> {
        (**self).position_ms()
    }
}

pub trait Transport: PlaybackClock {
    fn play(&self) -> Result<()>;
    fn stop(&self);
}

/// Wall-clock transport with no audio output.
#[derive(Debug, Default)]
pub struct SilentTransport {
    started: Cell<Option<Instant>>,
    stopped_at_ms: Cell<Option<f64>>,
}

impl SilentTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlaybackClock for SilentTransport {
    fn position_ms(&self) -> Option<f64> {
        if let Some(ms) = self.stopped_at_ms.get() {
            return Some(ms);
        }
        self.started
            .get()
            .map(|start| start.elapsed().as_secs_f64() * 1000.0)
    }
}

impl Transport for SilentTransport {
    fn play(&self) -> Result<()> {
        self.stopped_at_ms.set(None);
        self.started.set(Some(Instant::now()));
        log::debug!("Silent transport started");
        Ok(())
    }

    fn stop(&self) {
        if self.stopped_at_ms.get().is_none() {
            self.stopped_at_ms.set(self.position_ms());
        }
    }
}
