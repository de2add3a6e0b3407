use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::{Phase, Scheduler, Tick};
use crate::playback::PlaybackClock;
use crate::render::Renderer;

/// How a driven run ended.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub outcome: Phase,
    pub clock_ms: f64,
    pub regressions: u32,
}

/// Timer that repeatedly ticks a running scheduler and forwards snapshots.
///
/// Ticks are strictly sequential. The stop flag is checked before every tick,
/// so a raised flag cancels the scheduler before the next snapshot.
pub struct Driver {
    pub poll_interval: Duration,
    pub show_progress: bool,
}

impl Driver {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            show_progress: true,
        }
    }

    pub fn run<C: PlaybackClock>(
        &self,
        scheduler: &mut Scheduler<C>,
        renderer: &mut dyn Renderer,
        stop: &AtomicBool,
    ) -> Result<RunSummary> {
        let duration_ms = scheduler.timeline().map_or(0.0, |t| t.duration_ms());
        let pb = if self.show_progress {
            ProgressBar::new(duration_ms.ceil() as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ms {msg}")
                .unwrap()
                .progress_chars("=>-"),
        );

        let mut ticks = 0u64;
        while scheduler.is_running() {
            if stop.load(Ordering::SeqCst) {
                scheduler.stop();
                break;
            }

            match scheduler.tick()? {
                Tick::Frame(snapshot) => {
                    renderer.render(&snapshot)?;
                    pb.set_position(snapshot.clock_ms as u64);
                    if !snapshot.active.is_empty() {
                        pb.set_message(format!("{} active", snapshot.active.len()));
                    }
                }
                Tick::Finished => break,
            }
            ticks += 1;

            if !self.poll_interval.is_zero() {
                std::thread::sleep(self.poll_interval);
            }
        }

        renderer.finish()?;
        pb.finish_and_clear();

        let state = scheduler.state();
        let summary = RunSummary {
            ticks,
            outcome: scheduler.phase(),
            clock_ms: state.clock_ms,
            regressions: state.regressions,
        };
        log::info!(
            "Playback {:?} after {} ticks at {:.1}ms ({} clock regressions)",
            summary.outcome,
            summary.ticks,
            summary.clock_ms,
            summary.regressions
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::RawMidiMessage;
    use crate::render::RenderSnapshot;
    use crate::scheduler::tests::note_timeline;
    use crate::scheduler::NoteOffPolicy;
    use std::cell::Cell;

    /// Advances by a fixed step every time it is read.
    struct SteppingClock {
        now: Cell<f64>,
        step: f64,
    }

    impl PlaybackClock for SteppingClock {
        fn position_ms(&self) -> Option<f64> {
            let t = self.now.get();
            self.now.set(t + self.step);
            Some(t)
        }
    }

    #[derive(Default)]
    struct Recorder {
        snapshots: Vec<RenderSnapshot>,
        finished: bool,
        stop_after: Option<(usize, &'static AtomicBool)>,
    }

    impl Renderer for Recorder {
        fn render(&mut self, snapshot: &RenderSnapshot) -> Result<()> {
            self.snapshots.push(snapshot.clone());
            if let Some((n, flag)) = self.stop_after {
                if self.snapshots.len() >= n {
                    flag.store(true, Ordering::SeqCst);
                }
            }
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    fn quiet_driver() -> Driver {
        Driver {
            poll_interval: Duration::ZERO,
            show_progress: false,
        }
    }

    #[test]
    fn runs_until_the_timeline_ends() {
        let clock = SteppingClock {
            now: Cell::new(0.0),
            step: 10.0,
        };
        let mut scheduler = Scheduler::new(NoteOffPolicy::RemoveOne);
        scheduler
            .start(
                note_timeline(
                    &[RawMidiMessage::note_on(0, 40, 100), RawMidiMessage::note_off(120, 40)],
                    200,
                ),
                &clock,
            )
            .unwrap();

        let mut recorder = Recorder::default();
        let stop = AtomicBool::new(false);
        let summary = quiet_driver().run(&mut scheduler, &mut recorder, &stop).unwrap();

        assert_eq!(summary.outcome, Phase::Finished);
        assert_eq!(summary.ticks, 20);
        assert_eq!(summary.clock_ms, 200.0);
        assert!(recorder.finished);
        assert_eq!(recorder.snapshots[5].active, vec![40]);
        assert!(recorder.snapshots[12].active.is_empty());
        assert!(recorder.snapshots.windows(2).all(|w| w[0].clock_ms <= w[1].clock_ms));
    }

    #[test]
    fn stop_flag_cancels_before_the_next_tick() {
        static STOP: AtomicBool = AtomicBool::new(false);
        let clock = SteppingClock {
            now: Cell::new(0.0),
            step: 1.0,
        };
        let mut scheduler = Scheduler::new(NoteOffPolicy::RemoveOne);
        scheduler
            .start(note_timeline(&[RawMidiMessage::note_on(0, 40, 100)], 1000), &clock)
            .unwrap();

        let mut recorder = Recorder {
            stop_after: Some((3, &STOP)),
            ..Default::default()
        };
        let summary = quiet_driver().run(&mut scheduler, &mut recorder, &STOP).unwrap();

        assert_eq!(summary.outcome, Phase::Cancelled);
        assert_eq!(recorder.snapshots.len(), 3);
        assert!(recorder.finished);
        assert_eq!(scheduler.phase(), Phase::Cancelled);
    }
}
