//! Playback-synchronized scheduler.
//!
//! `Idle -> Running -> Finished`, with `Cancelled` reachable from `Idle` or
//! `Running` via `stop`. Each `tick` reads the injected clock once, catches the
//! event cursor up to that time and produces one snapshot, so the active set at
//! a given clock time does not depend on how often the scheduler is polled.

pub mod active;
pub mod driver;

pub use active::{ActiveSet, NoteOffPolicy};

use crate::error::{Result, SpiralError};
use crate::playback::PlaybackClock;
use crate::render::RenderSnapshot;
use crate::spiral::RadiusMode;
use crate::timeline::{EventKind, FrameTimeline, NoteTimeline, Timeline, TimelineEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Finished,
    Cancelled,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Finished | Phase::Cancelled)
    }
}

#[derive(Clone, Debug, Default)]
pub struct SchedulerState {
    /// Last clock value accepted; never decreases.
    pub clock_ms: f64,
    pub step: usize,
    pub event_cursor: usize,
    pub active: ActiveSet,
    pub finished: bool,
    pub regressions: u32,
}

#[derive(Clone, Debug)]
pub enum Tick {
    Frame(RenderSnapshot),
    /// End of the timeline; no further ticks are accepted.
    Finished,
}

pub struct Scheduler<C> {
    phase: Phase,
    timeline: Option<Timeline>,
    clock: Option<C>,
    state: SchedulerState,
    note_off: NoteOffPolicy,
}

impl<C: PlaybackClock> Scheduler<C> {
    pub fn new(note_off: NoteOffPolicy) -> Self {
        Self {
            phase: Phase::Idle,
            timeline: None,
            clock: None,
            state: SchedulerState::default(),
            note_off,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn timeline(&self) -> Option<&Timeline> {
        self.timeline.as_ref()
    }

    pub fn start(&mut self, timeline: Timeline, clock: C) -> Result<()> {
        self.expect_phase(Phase::Idle)?;
        log::info!(
            "Scheduler started: {:.1}s timeline",
            timeline.duration_ms() / 1000.0
        );
        self.timeline = Some(timeline);
        self.clock = Some(clock);
        self.state = SchedulerState::default();
        self.phase = Phase::Running;
        Ok(())
    }

    /// Releases the clock; later calls and calls after `Finished` do nothing.
    pub fn stop(&mut self) {
        if self.phase.is_terminal() {
            return;
        }
        log::info!("Scheduler cancelled at {:.1}ms", self.state.clock_ms);
        self.phase = Phase::Cancelled;
        self.clock = None;
    }

    pub fn tick(&mut self) -> Result<Tick> {
        self.expect_phase(Phase::Running)?;
        let now = self.read_clock();

        let snapshot = match self.timeline.as_ref() {
            Some(Timeline::Notes(notes)) => advance_notes(notes, &mut self.state, now, self.note_off),
            Some(Timeline::Frames(frames)) => advance_frames(frames, &mut self.state, now),
            None => None,
        };

        match snapshot {
            Some(snapshot) => Ok(Tick::Frame(snapshot)),
            None => {
                self.state.finished = true;
                self.phase = Phase::Finished;
                self.clock = None;
                log::info!("Scheduler finished at {:.1}ms", self.state.clock_ms);
                Ok(Tick::Finished)
            }
        }
    }

    fn expect_phase(&self, expected: Phase) -> Result<()> {
        if self.phase != expected {
            return Err(SpiralError::InvalidState {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    /// Clamps regressions to the last accepted value so the cursor never rewinds.
    fn read_clock(&mut self) -> f64 {
        let last = self.state.clock_ms;
        let Some(observed) = self.clock.as_ref().and_then(|c| c.position_ms()) else {
            return last;
        };
        if observed < last || observed.is_nan() {
            self.state.regressions += 1;
            log::warn!(
                "{}",
                SpiralError::ClockRegression {
                    last_ms: last,
                    observed_ms: observed,
                }
            );
            return last;
        }
        self.state.clock_ms = observed;
        observed
    }
}

fn apply_event(active: &mut ActiveSet, event: &TimelineEvent, policy: NoteOffPolicy) {
    match event.kind {
        EventKind::NoteOn => {
            if active.contains(event.note) {
                log::debug!("Note {} retriggered, {} instances", event.note, active.count(event.note) + 1);
            }
            active.insert(event.note);
        }
        EventKind::NoteOff => {
            let released = active.release(event.note, policy);
            if released > 1 {
                log::debug!("Note-off {} released {} instances", event.note, released);
            }
        }
    }
}

fn advance_notes(
    timeline: &NoteTimeline,
    state: &mut SchedulerState,
    now: f64,
    policy: NoteOffPolicy,
) -> Option<RenderSnapshot> {
    while let Some(event) = timeline.events.get(state.event_cursor) {
        if event.time_ms as f64 > now {
            break;
        }
        apply_event(&mut state.active, event, policy);
        state.event_cursor += 1;
    }
    state.step = now as usize;

    if now >= timeline.duration_ms as f64 {
        return None;
    }

    let active = state.active.notes();
    Some(RenderSnapshot {
        clock_ms: now,
        step: state.step,
        mode: RadiusMode::Continuous,
        points: active.iter().map(|&n| timeline.point(n)).collect(),
        active,
        dim: None,
        size: None,
    })
}

fn advance_frames(timeline: &FrameTimeline, state: &mut SchedulerState, now: f64) -> Option<RenderSnapshot> {
    state.step = timeline.step_at(now);
    let frame = timeline.frames.get(state.step)?;
    Some(RenderSnapshot {
        clock_ms: now,
        step: state.step,
        mode: RadiusMode::Banded,
        points: timeline.bin_points.clone(),
        active: Vec::new(),
        dim: Some(frame.dim.clone()),
        size: Some(frame.size.clone()),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::midi::RawMidiMessage;
    use crate::timeline::{frames, notes, NoteTimelineOptions};
    use std::cell::Cell;

    /// Clock whose position is set by the test.
    #[derive(Default)]
    pub(crate) struct ManualClock {
        now: Cell<Option<f64>>,
    }

    impl ManualClock {
        pub(crate) fn at(ms: f64) -> Self {
            let clock = Self::default();
            clock.set(ms);
            clock
        }

        pub(crate) fn set(&self, ms: f64) {
            self.now.set(Some(ms));
        }
    }

    impl PlaybackClock for ManualClock {
        fn position_ms(&self) -> Option<f64> {
            self.now.get()
        }
    }

    pub(crate) fn note_timeline(messages: &[RawMidiMessage], duration_ms: u64) -> Timeline {
        let timeline = notes::build(messages, &NoteTimelineOptions::default()).unwrap();
        Timeline::Notes(timeline.with_duration_ms(duration_ms))
    }

    fn active_at(tick: &Tick) -> Vec<u8> {
        match tick {
            Tick::Frame(snapshot) => snapshot.active.clone(),
            Tick::Finished => panic!("unexpected end of timeline"),
        }
    }

    #[test]
    fn three_event_scenario() {
        let timeline = note_timeline(
            &[
                RawMidiMessage::note_on(0, 40, 100),
                RawMidiMessage::note_on(50, 41, 100),
                RawMidiMessage::note_off(70, 40),
            ],
            200,
        );
        let clock = ManualClock::default();
        let mut scheduler = Scheduler::new(NoteOffPolicy::RemoveOne);
        scheduler.start(timeline, &clock).unwrap();

        let mut seen = Vec::new();
        let mut finished_at = None;
        for t in (10u32..=300).step_by(10) {
            clock.set(t as f64);
            match scheduler.tick().unwrap() {
                Tick::Frame(snapshot) => seen.push((t, snapshot.active)),
                Tick::Finished => {
                    finished_at = Some(t);
                    break;
                }
            }
        }

        let at = |t: u32| seen.iter().find(|(time, _)| *time == t).map(|(_, a)| a.clone());
        assert_eq!(at(10), Some(vec![40]));
        assert_eq!(at(60), Some(vec![40, 41]));
        assert_eq!(at(130), Some(vec![41]));
        assert_eq!(finished_at, Some(200));
        assert_eq!(scheduler.phase(), Phase::Finished);
        assert!(scheduler.state().finished);
    }

    #[test]
    fn note_is_active_until_its_release() {
        let timeline = note_timeline(
            &[RawMidiMessage::note_on(0, 60, 100), RawMidiMessage::note_off(100, 60)],
            1000,
        );
        let clock = ManualClock::default();
        let mut scheduler = Scheduler::new(NoteOffPolicy::RemoveOne);
        scheduler.start(timeline, &clock).unwrap();

        for t in [0.0, 1.0, 50.0, 99.0, 99.9] {
            clock.set(t);
            assert_eq!(active_at(&scheduler.tick().unwrap()), vec![60], "t={}", t);
        }
        for t in [100.0, 101.0, 500.0] {
            clock.set(t);
            assert!(active_at(&scheduler.tick().unwrap()).is_empty(), "t={}", t);
        }
    }

    fn trajectory(step_ms: usize, until: f64, timeline: Timeline) -> (ActiveSet, usize) {
        let clock = ManualClock::default();
        let mut scheduler = Scheduler::new(NoteOffPolicy::RemoveOne);
        scheduler.start(timeline, &clock).unwrap();
        let mut t: f64 = 0.0;
        loop {
            let now = t.min(until);
            clock.set(now);
            scheduler.tick().unwrap();
            if now >= until {
                break;
            }
            t += step_ms as f64;
        }
        (scheduler.state().active.clone(), scheduler.state().event_cursor)
    }

    #[test]
    fn polling_rate_does_not_change_the_result() {
        let messages: Vec<RawMidiMessage> = (0..40)
            .flat_map(|i| {
                let note = 40 + (i * 7 % 24) as u8;
                [RawMidiMessage::note_on(13, note, 90), RawMidiMessage::note_off(29, note)]
            })
            .collect();
        let timeline = note_timeline(&messages, 10_000);

        for until in [0.0, 13.0, 500.0, 777.0, 1680.0] {
            let fine = trajectory(1, until, timeline.clone());
            let coarse = trajectory(37, until, timeline.clone());
            assert_eq!(fine, coarse, "diverged at {}ms", until);
        }
    }

    #[test]
    fn never_applies_future_events() {
        let timeline = note_timeline(
            &[RawMidiMessage::note_on(10, 60, 100), RawMidiMessage::note_on(10, 62, 100)],
            100,
        );
        let clock = ManualClock::at(19.9);
        let mut scheduler = Scheduler::new(NoteOffPolicy::RemoveOne);
        scheduler.start(timeline, &clock).unwrap();
        assert_eq!(active_at(&scheduler.tick().unwrap()), vec![60]);
        assert_eq!(scheduler.state().event_cursor, 1);
    }

    #[test]
    fn note_off_policy_governs_retriggers() {
        let messages = [
            RawMidiMessage::note_on(0, 60, 100),
            RawMidiMessage::note_on(10, 60, 100),
            RawMidiMessage::note_off(10, 60),
        ];

        let clock = ManualClock::at(25.0);
        let mut counted = Scheduler::new(NoteOffPolicy::RemoveOne);
        counted.start(note_timeline(&messages, 100), &clock).unwrap();
        assert_eq!(active_at(&counted.tick().unwrap()), vec![60]);

        let mut clearing = Scheduler::new(NoteOffPolicy::RemoveAll);
        clearing.start(note_timeline(&messages, 100), &clock).unwrap();
        assert!(active_at(&clearing.tick().unwrap()).is_empty());
    }

    #[test]
    fn regressed_clock_is_clamped() {
        let timeline = note_timeline(
            &[RawMidiMessage::note_on(0, 60, 100), RawMidiMessage::note_off(100, 60)],
            1000,
        );
        let clock = ManualClock::at(150.0);
        let mut scheduler = Scheduler::new(NoteOffPolicy::RemoveOne);
        scheduler.start(timeline, &clock).unwrap();
        scheduler.tick().unwrap();

        clock.set(40.0);
        match scheduler.tick().unwrap() {
            Tick::Frame(snapshot) => {
                assert_eq!(snapshot.clock_ms, 150.0);
                assert!(snapshot.active.is_empty());
            }
            Tick::Finished => panic!("unexpected end of timeline"),
        }
        assert_eq!(scheduler.state().regressions, 1);
        assert_eq!(scheduler.state().event_cursor, 2);
    }

    #[test]
    fn clock_before_play_reads_as_zero() {
        let timeline = note_timeline(&[RawMidiMessage::note_on(0, 60, 100)], 50);
        let clock = ManualClock::default();
        let mut scheduler = Scheduler::new(NoteOffPolicy::RemoveOne);
        scheduler.start(timeline, &clock).unwrap();
        match scheduler.tick().unwrap() {
            Tick::Frame(snapshot) => {
                assert_eq!(snapshot.clock_ms, 0.0);
                assert_eq!(snapshot.active, vec![60]);
                assert_eq!(snapshot.points.len(), 1);
            }
            Tick::Finished => panic!("unexpected end of timeline"),
        }
    }

    #[test]
    fn lifecycle_errors_and_idempotent_stop() {
        let clock = ManualClock::at(0.0);
        let mut scheduler: Scheduler<&ManualClock> = Scheduler::new(NoteOffPolicy::RemoveOne);
        assert!(matches!(
            scheduler.tick(),
            Err(SpiralError::InvalidState {
                expected: Phase::Running,
                actual: Phase::Idle
            })
        ));

        let timeline = note_timeline(&[RawMidiMessage::note_on(0, 60, 100)], 50);
        scheduler.start(timeline.clone(), &clock).unwrap();
        assert!(matches!(
            scheduler.start(timeline, &clock),
            Err(SpiralError::InvalidState { .. })
        ));

        scheduler.stop();
        assert_eq!(scheduler.phase(), Phase::Cancelled);
        scheduler.stop();
        assert_eq!(scheduler.phase(), Phase::Cancelled);
        assert!(matches!(
            scheduler.tick(),
            Err(SpiralError::InvalidState {
                actual: Phase::Cancelled,
                ..
            })
        ));
    }

    #[test]
    fn stop_after_finish_is_a_no_op() {
        let clock = ManualClock::at(60.0);
        let mut scheduler = Scheduler::new(NoteOffPolicy::RemoveOne);
        scheduler
            .start(note_timeline(&[RawMidiMessage::note_on(0, 60, 100)], 50), &clock)
            .unwrap();
        assert!(matches!(scheduler.tick().unwrap(), Tick::Finished));
        scheduler.stop();
        assert_eq!(scheduler.phase(), Phase::Finished);
        assert!(matches!(scheduler.tick(), Err(SpiralError::InvalidState { .. })));
    }

    #[test]
    fn frame_timeline_steps_by_hop() {
        let magnitudes = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]];
        let timeline = frames::build(&magnitudes, 40.0, &[110.0, 220.0], 55.0).unwrap();
        let clock = ManualClock::default();
        let mut scheduler = Scheduler::new(NoteOffPolicy::RemoveOne);
        scheduler.start(Timeline::Frames(timeline), &clock).unwrap();

        let expect = [(0.0, 0usize), (39.9, 0), (40.0, 1), (95.0, 2)];
        for (t, step) in expect {
            clock.set(t);
            match scheduler.tick().unwrap() {
                Tick::Frame(snapshot) => {
                    assert_eq!(snapshot.step, step);
                    assert_eq!(snapshot.points.len(), 2);
                    assert_eq!(snapshot.dim.as_deref(), Some(&magnitudes_dim(&magnitudes[step])[..]));
                }
                Tick::Finished => panic!("finished early at {}", t),
            }
        }

        clock.set(120.0);
        assert!(matches!(scheduler.tick().unwrap(), Tick::Finished));
    }

    fn magnitudes_dim(frame: &[f32]) -> Vec<f32> {
        frame.iter().map(|m| 1.0 - m).collect()
    }
}
