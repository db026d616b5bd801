//! # Match Engine Module
//!
//! Game-mode state machine. Holds the current target note, judges each
//! inbound detection result against it and keeps score.
//!
//! States: `Idle` → `Active` on [`MatchEngine::start`], `Active` → `Active`
//! on every judged result, `Active` → `Idle` on [`MatchEngine::stop`].
//! Results arriving while idle are dropped, never queued.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace};

use crate::channel::DetectionResult;
use crate::error::{ConfigError, Result};
use crate::fretboard::{Fretboard, Target};

/// Default half-width of the tolerance window, as a ratio of the target.
pub const DEFAULT_TOLERANCE: f32 = 0.03;

/// Hit or miss for one judged result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Hit,
    Miss,
}

/// Everything the UI needs to react to one judged result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Judgment {
    /// The target that was judged against.
    pub target: Target,
    pub detected: DetectionResult,
    pub outcome: Outcome,
    /// The freshly chosen target for the next round.
    pub next_target: Target,
    pub score: u32,
    pub attempts: u32,
}

/// Final counters of a stopped session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSummary {
    pub score: u32,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy)]
struct ActiveSession {
    target: Target,
    score: u32,
    attempts: u32,
}

#[derive(Debug, Clone, Copy)]
enum SessionState {
    Idle,
    Active(ActiveSession),
}

/// Judges detection results against a randomly chosen target.
#[derive(Debug)]
pub struct MatchEngine<R: Rng = StdRng> {
    fretboard: Fretboard,
    tolerance: f32,
    rng: R,
    state: SessionState,
}

impl MatchEngine<StdRng> {
    /// Engine with an OS-seeded RNG.
    pub fn new(fretboard: Fretboard, tolerance: f32) -> Result<Self> {
        Self::with_rng(fretboard, tolerance, StdRng::from_entropy())
    }

    /// Engine with a reproducible target sequence.
    pub fn seeded(fretboard: Fretboard, tolerance: f32, seed: u64) -> Result<Self> {
        Self::with_rng(fretboard, tolerance, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> MatchEngine<R> {
    /// # Errors
    /// * [`ConfigError::InvalidTolerance`] unless `0 < tolerance < 1`
    pub fn with_rng(fretboard: Fretboard, tolerance: f32, rng: R) -> Result<Self> {
        if !(tolerance > 0.0 && tolerance < 1.0) {
            return Err(ConfigError::InvalidTolerance(tolerance));
        }
        Ok(Self {
            fretboard,
            tolerance,
            rng,
            state: SessionState::Idle,
        })
    }

    pub fn fretboard(&self) -> &Fretboard {
        &self.fretboard
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Active(_))
    }

    /// The target being played for, `None` while idle.
    pub fn current_target(&self) -> Option<Target> {
        match self.state {
            SessionState::Active(session) => Some(session.target),
            SessionState::Idle => None,
        }
    }

    pub fn score(&self) -> u32 {
        match self.state {
            SessionState::Active(session) => session.score,
            SessionState::Idle => 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self.state {
            SessionState::Active(session) => session.attempts,
            SessionState::Idle => 0,
        }
    }

    /// Tolerance window around `target`, both ends included.
    pub fn window(&self, target: &Target) -> (f32, f32) {
        (
            target.frequency * (1.0 - self.tolerance),
            target.frequency * (1.0 + self.tolerance),
        )
    }

    /// Begins a new session with fresh counters and a new target.
    ///
    /// Starting while already active discards the running session.
    pub fn start(&mut self) -> Target {
        let target = self.fretboard.random_target(&mut self.rng);
        self.state = SessionState::Active(ActiveSession {
            target,
            score: 0,
            attempts: 0,
        });
        info!(
            "[GAME] Session started, first target string {} fret {} ({:.2} Hz)",
            target.string_index, target.fret_index, target.frequency
        );
        target
    }

    /// Judges one result and moves on to a new target.
    ///
    /// Returns `None` (and changes nothing) while idle. `NoSignal` is a miss.
    pub fn judge(&mut self, detected: DetectionResult) -> Option<Judgment> {
        let SessionState::Active(session) = self.state else {
            trace!("[GAME] Dropping result while idle: {:?}", detected);
            return None;
        };

        let outcome = match detected {
            DetectionResult::Confident(freq) => {
                let (low, high) = self.window(&session.target);
                if low <= freq && freq <= high {
                    Outcome::Hit
                } else {
                    Outcome::Miss
                }
            }
            DetectionResult::NoSignal => Outcome::Miss,
        };

        let score = session.score + u32::from(outcome == Outcome::Hit);
        let attempts = session.attempts + 1;
        let next_target = self.fretboard.random_target(&mut self.rng);
        self.state = SessionState::Active(ActiveSession {
            target: next_target,
            score,
            attempts,
        });

        debug!(
            "[GAME] {:?} for {:.2} Hz target with {:?}, score {}/{}",
            outcome, session.target.frequency, detected, score, attempts
        );

        Some(Judgment {
            target: session.target,
            detected,
            outcome,
            next_target,
            score,
            attempts,
        })
    }

    /// Ends the session and returns its final counters.
    ///
    /// Returns `None` if no session was running.
    pub fn stop(&mut self) -> Option<SessionSummary> {
        let SessionState::Active(session) = self.state else {
            return None;
        };
        self.state = SessionState::Idle;
        let summary = SessionSummary {
            score: session.score,
            attempts: session.attempts,
        };
        info!(
            "[GAME] Session stopped with score {}/{}",
            summary.score, summary.attempts
        );
        Some(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn engine() -> MatchEngine {
        MatchEngine::seeded(Fretboard::standard(), DEFAULT_TOLERANCE, 42).unwrap()
    }

    fn judge_ratio(engine: &mut MatchEngine, ratio: f32) -> Outcome {
        let target = engine.current_target().unwrap();
        engine
            .judge(DetectionResult::Confident(target.frequency * ratio))
            .unwrap()
            .outcome
    }

    #[test]
    fn tolerance_must_be_a_proper_ratio() {
        for bad in [0.0, -0.1, 1.0, f32::NAN] {
            assert!(matches!(
                MatchEngine::new(Fretboard::standard(), bad),
                Err(ConfigError::InvalidTolerance(_))
            ));
        }
    }

    #[test]
    fn three_percent_window() {
        let mut engine = engine();
        engine.start();
        assert_eq!(judge_ratio(&mut engine, 1.02), Outcome::Hit);
        assert_eq!(judge_ratio(&mut engine, 1.04), Outcome::Miss);
        assert_eq!(judge_ratio(&mut engine, 0.98), Outcome::Hit);
        assert_eq!(judge_ratio(&mut engine, 0.96), Outcome::Miss);
        assert_eq!((engine.score(), engine.attempts()), (2, 4));
    }

    #[test]
    fn a440_example() {
        let mut engine = engine();
        let a4 = Target {
            string_index: 5,
            fret_index: 5,
            frequency: 440.0,
        };
        let (low, high) = engine.window(&a4);
        assert_relative_eq!(low, 426.8, max_relative = 1e-5);
        assert_relative_eq!(high, 453.2, max_relative = 1e-5);

        engine.start();
        engine.state = SessionState::Active(ActiveSession {
            target: a4,
            score: 0,
            attempts: 0,
        });
        let hit = engine.judge(DetectionResult::Confident(449.6)).unwrap();
        assert_eq!((hit.target, hit.outcome), (a4, Outcome::Hit));

        engine.state = SessionState::Active(ActiveSession {
            target: a4,
            score: 1,
            attempts: 1,
        });
        let miss = engine.judge(DetectionResult::Confident(457.6)).unwrap();
        assert_eq!(miss.outcome, Outcome::Miss);
        assert_eq!((miss.score, miss.attempts), (1, 2));
    }

    #[test]
    fn no_signal_is_a_miss() {
        let mut engine = engine();
        engine.start();
        let judgment = engine.judge(DetectionResult::NoSignal).unwrap();
        assert_eq!(judgment.outcome, Outcome::Miss);
        assert_eq!((engine.score(), engine.attempts()), (0, 1));
    }

    #[test]
    fn idle_results_are_dropped() {
        let mut engine = engine();
        assert!(engine.judge(DetectionResult::Confident(110.0)).is_none());
        assert_eq!((engine.score(), engine.attempts()), (0, 0));
        assert!(engine.current_target().is_none());

        engine.start();
        judge_ratio(&mut engine, 1.0);
        assert!(engine.stop().is_some());
        assert!(engine.judge(DetectionResult::Confident(110.0)).is_none());
        assert_eq!((engine.score(), engine.attempts()), (0, 0));
        assert!(engine.stop().is_none());
    }

    #[test]
    fn ten_judgments_count_every_attempt() {
        let mut engine = engine();
        engine.start();
        let ratios = [1.0, 1.1, 0.99, 0.5, 1.01, 2.0, 1.029, 0.9, 1.0, 0.971];
        let mut expected_hits = 0;
        for ratio in ratios {
            let before = engine.current_target().unwrap();
            let target_freq = before.frequency;
            let judgment = engine
                .judge(DetectionResult::Confident(target_freq * ratio))
                .unwrap();
            assert_eq!(judgment.target, before);
            assert_eq!(engine.current_target(), Some(judgment.next_target));
            if judgment.outcome == Outcome::Hit {
                expected_hits += 1;
            }
        }
        assert_eq!(expected_hits, 6);
        assert_eq!(engine.attempts(), 10);
        assert_eq!(engine.score(), expected_hits);
    }

    #[test]
    fn restart_resets_counters() {
        let mut engine = engine();
        engine.start();
        judge_ratio(&mut engine, 1.0);
        judge_ratio(&mut engine, 1.0);
        let summary = engine.stop().unwrap();
        assert_eq!(summary, SessionSummary { score: 2, attempts: 2 });

        engine.start();
        assert_eq!((engine.score(), engine.attempts()), (0, 0));
        assert!(engine.current_target().is_some());
    }
}
