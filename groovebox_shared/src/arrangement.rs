use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Sections are laid out sequentially with a fixed width of 4 bars each.
pub const BARS_PER_SECTION: u32 = 4;
/// Step sequencer resolution: 16 sixteenth-note slots per bar.
pub const STEP_SLOTS_PER_BAR: usize = 16;
/// Melodic sequence resolution: 8 eighth-note slots per bar.
pub const EIGHTH_SLOTS_PER_BAR: usize = 8;

/// A fully validated arrangement document. Immutable once loaded into the
/// engine; a new load fully replaces engine state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Arrangement {
    pub tempo: f64,
    pub tracks: Vec<Track>,
    pub sections: Vec<Section>,
}

impl Arrangement {
    pub fn track(&self, id: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn track_mut(&mut self, id: &str) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    pub fn has_solo(&self) -> bool {
        self.tracks.iter().any(|t| t.is_solo)
    }

    pub fn total_bars(&self) -> u32 {
        self.sections.len() as u32 * BARS_PER_SECTION
    }
}

impl Default for Arrangement {
    fn default() -> Self {
        Self {
            tempo: 120.0,
            tracks: Vec::new(),
            sections: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub name: String,
    /// Linear volume 0..1, mapped to a log-domain gain at fire time.
    pub volume: f32,
    pub is_muted: bool,
    pub is_solo: bool,
    pub instrument: Instrument,
}

/// Closed set of instrument kinds. The pattern expander matches
/// exhaustively, so a new kind is a compile-time-checked extension point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Instrument {
    /// A looping audio clip recorded at its own native tempo.
    Clip {
        sample_url: String,
        sample_tempo_bpm: f64,
    },
    /// One-shot sample fired from a 16-slot step grid.
    StepSequencer {
        pattern: Vec<bool>,
        sample_url: String,
    },
    /// Pitched sample fired from an 8-slot grid, cycling through `notes`.
    MelodicSequence {
        pattern: Vec<bool>,
        notes: Vec<u8>,
        sample_url: String,
    },
}

impl Instrument {
    pub fn sample_url(&self) -> &str {
        match self {
            Instrument::Clip { sample_url, .. } => sample_url,
            Instrument::StepSequencer { sample_url, .. } => sample_url,
            Instrument::MelodicSequence { sample_url, .. } => sample_url,
        }
    }

    /// Bars between re-triggers of this instrument's loop.
    ///
    /// Clips re-trigger only at their natural loop seam: a clip stretched to
    /// half speed spans two arrangement bars, so the bar count is the tempo
    /// ratio rounded up. Sequenced kinds span however many bars their
    /// pattern covers.
    pub fn loop_length_bars(&self, arrangement_tempo: f64) -> u32 {
        match self {
            Instrument::Clip {
                sample_tempo_bpm, ..
            } => {
                if *sample_tempo_bpm <= 0.0 || arrangement_tempo <= 0.0 {
                    return 1;
                }
                (arrangement_tempo / sample_tempo_bpm).ceil().max(1.0) as u32
            }
            Instrument::StepSequencer { pattern, .. } => {
                (pattern.len().div_ceil(STEP_SLOTS_PER_BAR)).max(1) as u32
            }
            Instrument::MelodicSequence { pattern, .. } => {
                (pattern.len().div_ceil(EIGHTH_SLOTS_PER_BAR)).max(1) as u32
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub name: String,
    /// Track ids enabled in this section. Dangling ids are ignored at
    /// resolution time, not rejected at load time.
    pub enabled_track_ids: HashSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(sample_tempo_bpm: f64) -> Instrument {
        Instrument::Clip {
            sample_url: "kick.wav".into(),
            sample_tempo_bpm,
        }
    }

    #[test]
    fn clip_loop_length_follows_tempo_ratio() {
        // Half-tempo clip spans two arrangement bars.
        assert_eq!(clip(62.5).loop_length_bars(125.0), 2);
        // Matched tempo is a one-bar loop.
        assert_eq!(clip(125.0).loop_length_bars(125.0), 1);
        // Slightly slow clip rounds up to avoid a mid-loop restart.
        assert_eq!(clip(122.0).loop_length_bars(125.0), 2);
        // Degenerate tempo metadata falls back to one bar.
        assert_eq!(clip(0.0).loop_length_bars(125.0), 1);
    }

    #[test]
    fn sequenced_loop_length_follows_pattern_span() {
        let one_bar = Instrument::StepSequencer {
            pattern: vec![true; 16],
            sample_url: "snare.wav".into(),
        };
        let two_bars = Instrument::StepSequencer {
            pattern: vec![false; 24],
            sample_url: "snare.wav".into(),
        };
        let melodic = Instrument::MelodicSequence {
            pattern: vec![true; 8],
            notes: vec![60],
            sample_url: "keys.wav".into(),
        };
        assert_eq!(one_bar.loop_length_bars(120.0), 1);
        assert_eq!(two_bars.loop_length_bars(120.0), 2);
        assert_eq!(melodic.loop_length_bars(120.0), 1);
    }

    #[test]
    fn instrument_serializes_with_type_tag() {
        let json = serde_json::json!({
            "type": "clip",
            "sampleUrl": "bass.wav",
            "sampleTempoBpm": 122.0,
        });
        let instrument: Instrument = serde_json::from_value(json).unwrap();
        assert!(matches!(instrument, Instrument::Clip { .. }));
        assert_eq!(instrument.sample_url(), "bass.wav");
    }
}
