//! # Fretboard Module
//!
//! The target table for the game: 6 strings by 12 frets, each cell holding the
//! frequency the player is asked to produce. Also provides note naming and
//! cent deviation for feedback on misses.
//!
//! ## Features
//! - Standard tuning (E2 A2 D3 G3 B3 E4) in equal temperament, A4 = 440 Hz
//! - Custom tables from config, validated at construction
//! - Uniform random target selection over the whole grid

use once_cell::sync::Lazy;
use rand::Rng;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Number of strings on the board.
pub const STRINGS: usize = 6;
/// Number of frets per string, open string included as fret 0.
pub const FRETS: usize = 12;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// MIDI numbers of the open strings in standard tuning, low to high.
const STANDARD_OPEN_STRINGS: [(&str, i32); STRINGS] =
    [("E", 40), ("A", 45), ("D", 50), ("G", 55), ("B", 59), ("e", 64)];

fn midi_to_frequency(midi: i32) -> f32 {
    440.0 * 2.0_f32.powf((midi - 69) as f32 / 12.0)
}

/// Standard tuning, computed once.
static STANDARD: Lazy<Fretboard> = Lazy::new(|| {
    let mut frequencies = [[0.0; FRETS]; STRINGS];
    for (row, (_, open)) in frequencies.iter_mut().zip(STANDARD_OPEN_STRINGS) {
        for (fret, cell) in row.iter_mut().enumerate() {
            *cell = midi_to_frequency(open + fret as i32);
        }
    }
    Fretboard {
        names: STANDARD_OPEN_STRINGS.map(|(name, _)| name.to_string()),
        frequencies,
    }
});

/// The note the player is currently asked to produce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub string_index: usize,
    pub fret_index: usize,
    /// Frequency in Hz
    pub frequency: f32,
}

/// One string of a custom table.
#[derive(Debug, Clone, Deserialize)]
pub struct StringConfig {
    pub name: String,
    /// One frequency per fret, starting with the open string.
    pub frets: Vec<f32>,
}

/// A custom fretboard as written in a config file.
#[derive(Debug, Clone, Deserialize)]
pub struct FretboardConfig {
    pub strings: Vec<StringConfig>,
}

/// Validated string × fret → frequency table.
#[derive(Debug, Clone, PartialEq)]
pub struct Fretboard {
    names: [String; STRINGS],
    frequencies: [[f32; FRETS]; STRINGS],
}

impl Default for Fretboard {
    fn default() -> Self {
        Self::standard()
    }
}

impl Fretboard {
    /// Six-string standard tuning, frets 0 to 11.
    pub fn standard() -> Self {
        STANDARD.clone()
    }

    /// Builds a table from config, refusing anything that is not a full
    /// 6 × 12 grid of positive, finite frequencies.
    pub fn from_config(config: &FretboardConfig) -> Result<Self> {
        if config.strings.len() != STRINGS {
            return Err(ConfigError::StringCount {
                expected: STRINGS,
                found: config.strings.len(),
            });
        }

        let mut names: [String; STRINGS] = Default::default();
        let mut frequencies = [[0.0; FRETS]; STRINGS];
        for (string, source) in config.strings.iter().enumerate() {
            if source.frets.len() != FRETS {
                return Err(ConfigError::FretCount {
                    name: source.name.clone(),
                    expected: FRETS,
                    found: source.frets.len(),
                });
            }
            for (fret, &frequency) in source.frets.iter().enumerate() {
                if !frequency.is_finite() || frequency <= 0.0 {
                    return Err(ConfigError::InvalidFrequency {
                        string,
                        fret,
                        frequency,
                    });
                }
                frequencies[string][fret] = frequency;
            }
            names[string] = source.name.clone();
        }

        Ok(Self { names, frequencies })
    }

    pub fn string_name(&self, string_index: usize) -> Option<&str> {
        self.names.get(string_index).map(String::as_str)
    }

    /// Looks up one cell. `None` outside the grid.
    pub fn target(&self, string_index: usize, fret_index: usize) -> Option<Target> {
        let frequency = *self.frequencies.get(string_index)?.get(fret_index)?;
        Some(Target {
            string_index,
            fret_index,
            frequency,
        })
    }

    /// Draws a cell uniformly over the whole grid.
    pub fn random_target<R: Rng + ?Sized>(&self, rng: &mut R) -> Target {
        let string_index = rng.gen_range(0..STRINGS);
        let fret_index = rng.gen_range(0..FRETS);
        Target {
            string_index,
            fret_index,
            frequency: self.frequencies[string_index][fret_index],
        }
    }

    /// Finds the cell closest in pitch to `freq`.
    ///
    /// Ties go to the lowest string, since the same pitch appears on
    /// several strings.
    pub fn nearest(&self, freq: f32) -> Target {
        let mut best = Target {
            string_index: 0,
            fret_index: 0,
            frequency: self.frequencies[0][0],
        };
        let mut best_distance = f32::INFINITY;
        for (string_index, row) in self.frequencies.iter().enumerate() {
            for (fret_index, &frequency) in row.iter().enumerate() {
                let distance = calculate_cents_deviation(freq, frequency).abs();
                if distance < best_distance {
                    best_distance = distance;
                    best = Target {
                        string_index,
                        fret_index,
                        frequency,
                    };
                }
            }
        }
        best
    }
}

/// Names the equal-tempered note nearest to `freq`, e.g. "A4" or "C#3".
///
/// Returns `None` for frequencies that are not positive and finite.
pub fn note_name(freq: f32) -> Option<String> {
    if !freq.is_finite() || freq <= 0.0 {
        return None;
    }
    let midi = (69.0 + 12.0 * (freq / 440.0).log2()).round() as i32;
    let name = NOTE_NAMES[midi.rem_euclid(12) as usize];
    let octave = midi.div_euclid(12) - 1;
    Some(format!("{}{}", name, octave))
}

/// Calculates the deviation from a target frequency in cents.
///
/// 100 cents = 1 semitone. Positive values are sharp, negative flat.
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}
