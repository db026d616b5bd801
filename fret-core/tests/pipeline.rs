//! End-to-end path without audio hardware: synthesized microphone chunks go
//! through the frame emitter, the local detection service and the match engine.

use std::time::Duration;

use approx::assert_relative_eq;
use fret_core::channel::QueueSink;
use fret_core::config::DetectorConfig;
use fret_core::detector::{LocalDetectionService, PitchDetector};
use fret_core::frame::EmptyFramePolicy;
use fret_core::{
    DetectionChannel, DetectionResult, FrameBuffer, FrameEmitter, Fretboard, MatchEngine, Outcome,
};

const RATE: u32 = 48000;
const WINDOW: usize = 2048;
const CHUNK: usize = 128;
/// Enough quiet frames for the previous onset to leave the threshold window.
const GAP_FRAMES: usize = 12;

struct Rig {
    service: LocalDetectionService,
    emitter: FrameEmitter<QueueSink>,
    clock: usize,
}

impl Rig {
    fn new() -> Self {
        let detector = PitchDetector::new(WINDOW, RATE, DetectorConfig::default()).unwrap();
        let service = LocalDetectionService::spawn(detector, 256).unwrap();
        let buffer = FrameBuffer::new(WINDOW, EmptyFramePolicy::Suppress).unwrap();
        let emitter = FrameEmitter::new(buffer, service.sink());
        Self {
            service,
            emitter,
            clock: 0,
        }
    }

    /// Feeds samples the way the audio callback would, in small chunks.
    fn feed(&mut self, samples: &[f32]) {
        for chunk in samples.chunks(CHUNK) {
            self.emitter.process(chunk);
        }
        self.clock += samples.len();
    }

    fn silence(&mut self, frames: usize) {
        self.feed(&vec![0.0; frames * WINDOW]);
    }

    /// One frame of a harmonic-rich note, then a quiet frame whose first
    /// chunk pushes the note out to the detector and keeps frames aligned.
    fn pluck(&mut self, freq: f32) {
        let start = self.clock;
        let note: Vec<f32> = (start..start + WINDOW)
            .map(|i| {
                let t = i as f32 / RATE as f32;
                (1..=8)
                    .map(|k| {
                        0.5 / k as f32 * (2.0 * std::f32::consts::PI * freq * k as f32 * t).sin()
                    })
                    .sum::<f32>()
            })
            .collect();
        self.feed(&note);
        self.silence(1);
    }

    fn next_event(&self) -> DetectionResult {
        self.service
            .events()
            .recv_timeout(Duration::from_secs(10))
            .expect("detector should report an onset")
    }

    /// Plays a note after a quiet gap and waits for its detection result.
    fn play(&mut self, freq: f32) -> DetectionResult {
        self.silence(GAP_FRAMES);
        self.pluck(freq);
        self.next_event()
    }
}

#[test]
fn played_notes_are_detected_and_scored() {
    let mut rig = Rig::new();
    // Priming frame.
    rig.silence(1);

    let mut engine = MatchEngine::seeded(Fretboard::standard(), 0.03, 11).unwrap();
    let first = engine.start();

    let detected = rig.play(first.frequency);
    assert_relative_eq!(detected.frequency().unwrap(), first.frequency, max_relative = 0.015);
    let hit = engine.judge(detected).unwrap();
    assert_eq!(hit.target, first);
    assert_eq!(hit.outcome, Outcome::Hit);

    // A whole tone sharp is well outside the window.
    let second = hit.next_target;
    let miss = engine.judge(rig.play(second.frequency * 1.12)).unwrap();
    assert_eq!(miss.target, second);
    assert_eq!(miss.outcome, Outcome::Miss);

    let third = miss.next_target;
    let judgment = engine.judge(rig.play(third.frequency)).unwrap();
    assert_eq!(judgment.outcome, Outcome::Hit);
    assert_eq!((engine.score(), engine.attempts()), (2, 3));

    let summary = engine.stop().unwrap();
    assert_eq!((summary.score, summary.attempts), (2, 3));

    // A result that lands after stop is dropped, not judged.
    let late = rig.play(220.0);
    assert!(engine.judge(late).is_none());
    assert_eq!((engine.score(), engine.attempts()), (0, 0));

    assert!(rig.service.events().try_recv().is_err());
}

#[test]
fn trailing_partial_frame_reaches_the_channel() {
    let mut rig = Rig::new();
    rig.feed(&vec![0.1; WINDOW * 3 + 640]);
    assert_eq!(rig.emitter.buffer().len(), 640);

    assert!(rig.emitter.finish());
    assert!(rig.emitter.buffer().is_empty());
    assert_eq!(rig.emitter.sink().sent(), 4);
    assert_eq!(rig.emitter.sink().dropped(), 0);

    // Short frames are skipped by the detector and steady input has no onset.
    drop(rig.emitter);
    let stats = rig.service.shutdown();
    assert_eq!(stats.results, 0);
}

#[test]
fn no_signal_results_count_as_misses() {
    let mut engine = MatchEngine::seeded(Fretboard::standard(), 0.03, 3).unwrap();
    engine.start();
    let payloads = ["null", "0", "329.63"];
    let outcomes: Vec<Outcome> = payloads
        .iter()
        .map(|p| DetectionResult::from_json(p).unwrap())
        .map(|result| engine.judge(result).unwrap().outcome)
        .collect();
    assert_eq!(outcomes[..2], [Outcome::Miss, Outcome::Miss]);
    assert_eq!(engine.attempts(), 3);
}
