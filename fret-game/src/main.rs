//! # Fret Game - Terminal Fretboard Ear Trainer
//!
//! Asks the player for a random string and fret, listens through the
//! microphone, and scores every detected note against the target.
//!
//! ## Architecture
//! - **Audio callback**: frames microphone samples for the detector
//! - **Detector thread**: onset-gated pitch detection per frame
//! - **Stdin thread**: forwards player commands
//! - **Main thread**: handles commands and detection results one at a time,
//!   in arrival order, via crossbeam `select!`

mod commands;

use std::fs::File;

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use fret_core::fretboard::{calculate_cents_deviation, note_name};
use fret_core::session::AudioSession;
use fret_core::{DetectionResult, GameConfig, MatchEngine, Outcome, Target};
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use commands::{Command, HELP};

const LOG_FILE: &str = "fret-game.log";

fn main() -> Result<()> {
    init_logging()?;

    let config = match std::env::args().nth(1) {
        Some(path) => GameConfig::load(&path).with_context(|| format!("loading {}", path))?,
        None => GameConfig::default(),
    };
    info!("[MAIN] Starting with {:?}", config);

    let mut app = GameApp::new(config)?;
    app.run()?;
    info!("[MAIN] Finished");
    Ok(())
}

/// Console on stderr for the log, plain-text copy in a file.
fn init_logging() -> Result<()> {
    let file = File::create(LOG_FILE).with_context(|| format!("creating {}", LOG_FILE))?;
    let file_layer = fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_thread_names(true)
        .with_level(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .with_thread_names(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(LevelFilter::INFO)
        .with(console_layer)
        .with(file_layer)
        .init();
    Ok(())
}

/// Control context: owns the engine and the session of the moment.
struct GameApp {
    config: GameConfig,
    engine: MatchEngine,
    session: Option<AudioSession>,
}

impl GameApp {
    fn new(config: GameConfig) -> Result<Self> {
        config.validate()?;
        let fretboard = config.build_fretboard()?;
        let engine = match config.seed {
            Some(seed) => MatchEngine::seeded(fretboard, config.tolerance, seed)?,
            None => MatchEngine::new(fretboard, config.tolerance)?,
        };
        Ok(Self {
            config,
            engine,
            session: None,
        })
    }

    fn run(&mut self) -> Result<()> {
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        commands::spawn_reader(command_tx)?;
        println!("{}", HELP);

        loop {
            // Idle sessions select on a channel that never fires.
            let events: Receiver<DetectionResult> = match &self.session {
                Some(session) => session.events().clone(),
                None => crossbeam_channel::never(),
            };

            crossbeam_channel::select! {
                recv(command_rx) -> msg => match msg {
                    Ok(Command::Quit) | Err(_) => {
                        self.stop();
                        break;
                    }
                    Ok(command) => self.handle(command),
                },
                recv(events) -> msg => {
                    if let Ok(result) = msg {
                        self.on_detection(result);
                    }
                },
            }
        }
        Ok(())
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Start => self.start(),
            Command::Stop => self.stop(),
            Command::Status => self.print_status(),
            Command::Help => println!("{}", HELP),
            Command::Quit => self.stop(),
        }
    }

    fn start(&mut self) {
        // A start during a running session begins a fresh one.
        self.stop();

        match AudioSession::start(&self.config) {
            Ok(session) => {
                self.session = Some(session);
                let target = self.engine.start();
                println!("Go! Play {}", self.describe(&target));
            }
            Err(e) => {
                error!("[MAIN] Could not start audio session: {:#}", e);
                println!("Could not open the microphone: {:#}", e);
            }
        }
    }

    fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let report = session.stop();
        info!("[MAIN] Session report: {:?}", report);

        if let Some(summary) = self.engine.stop() {
            println!(
                "Stopped. Final score: {} of {} notes",
                summary.score, summary.attempts
            );
        }
    }

    fn on_detection(&mut self, result: DetectionResult) {
        let Some(judgment) = self.engine.judge(result) else {
            return;
        };

        match (judgment.outcome, judgment.detected) {
            (Outcome::Hit, _) => println!("Hit!"),
            (Outcome::Miss, DetectionResult::Confident(freq)) => {
                let heard = self.engine.fretboard().nearest(freq);
                println!(
                    "Miss: heard {:.2} Hz, {:+.0} cents from target (closest: {})",
                    freq,
                    calculate_cents_deviation(freq, judgment.target.frequency),
                    self.describe(&heard)
                );
            }
            (Outcome::Miss, DetectionResult::NoSignal) => println!("Miss: no clear pitch"),
        }
        println!(
            "Score {}/{}. Next: {}",
            judgment.score,
            judgment.attempts,
            self.describe(&judgment.next_target)
        );
    }

    fn print_status(&self) {
        match self.engine.current_target() {
            Some(target) => println!(
                "Playing {}; score {}/{}",
                self.describe(&target),
                self.engine.score(),
                self.engine.attempts()
            ),
            None => println!("Idle. Type 'start' to play."),
        }
    }

    fn describe(&self, target: &Target) -> String {
        let string = self
            .engine
            .fretboard()
            .string_name(target.string_index)
            .unwrap_or("?");
        format!(
            "string {}, fret {} ({}, {:.2} Hz)",
            string,
            target.fret_index,
            note_name(target.frequency).unwrap_or_else(|| "?".into()),
            target.frequency
        )
    }
}
