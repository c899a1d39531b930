//! Expands a track's pattern definition into concrete trigger points within
//! one content bar.

use groovebox_shared::arrangement::{Instrument, Track, EIGHTH_SLOTS_PER_BAR, STEP_SLOTS_PER_BAR};
use groovebox_shared::position::{SIXTEENTHS_PER_BAR, SIXTEENTHS_PER_BEAT};

/// One trigger point inside a bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    /// Slot index within the bar; part of the dedupe id.
    pub sub_index: u32,
    pub beat: u32,
    pub sixteenth: u32,
    /// MIDI note for melodic triggers.
    pub note: Option<u8>,
}

impl Trigger {
    pub fn offset_sixteenths(&self) -> u32 {
        self.beat * SIXTEENTHS_PER_BEAT + self.sixteenth
    }
}

/// Deterministic registry id for a trigger: `"{trackId}-{bar}-{subIndex}"`.
/// The bar here is the scheduling bar, so a looped content bar still gets a
/// fresh id each pass of the loop.
pub fn event_id(track_id: &str, bar: u32, sub_index: u32) -> String {
    format!("{track_id}-{bar}-{sub_index}")
}

/// Expand one track for one content bar.
pub fn expand_bar(track: &Track, content_bar: u32, arrangement_tempo: f64) -> Vec<Trigger> {
    match &track.instrument {
        Instrument::Clip { .. } => {
            let loop_len = track.instrument.loop_length_bars(arrangement_tempo);
            // Re-trigger only at the clip's natural loop seam; restarting
            // mid-loop is audible.
            if content_bar % loop_len == 0 {
                vec![Trigger {
                    sub_index: 0,
                    beat: 0,
                    sixteenth: 0,
                    note: None,
                }]
            } else {
                Vec::new()
            }
        }
        Instrument::StepSequencer { pattern, .. } => {
            if pattern.is_empty() {
                return Vec::new();
            }
            (0..SIXTEENTHS_PER_BAR)
                .filter(|i| {
                    let slot = (content_bar as usize * STEP_SLOTS_PER_BAR + *i as usize)
                        % pattern.len();
                    pattern[slot]
                })
                .map(|i| Trigger {
                    sub_index: i,
                    beat: i / SIXTEENTHS_PER_BEAT,
                    sixteenth: i % SIXTEENTHS_PER_BEAT,
                    note: None,
                })
                .collect()
        }
        Instrument::MelodicSequence { pattern, notes, .. } => {
            if pattern.is_empty() || notes.is_empty() {
                return Vec::new();
            }
            (0..EIGHTH_SLOTS_PER_BAR as u32)
                .filter(|i| {
                    let slot = (content_bar as usize * EIGHTH_SLOTS_PER_BAR + *i as usize)
                        % pattern.len();
                    pattern[slot]
                })
                .map(|i| Trigger {
                    sub_index: i,
                    beat: i / 2,
                    sixteenth: (i % 2) * 2,
                    note: Some(notes[i as usize % notes.len()]),
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_with(instrument: Instrument) -> Track {
        Track {
            id: "track-1".to_string(),
            name: "Test".to_string(),
            volume: 1.0,
            is_muted: false,
            is_solo: false,
            instrument,
        }
    }

    fn bits(s: &str) -> Vec<bool> {
        s.chars().map(|c| c == '1').collect()
    }

    #[test]
    fn clip_triggers_only_on_loop_seams() {
        // 62.5 BPM clip against 125 BPM: two-bar loop.
        let track = track_with(Instrument::Clip {
            sample_url: "kick.wav".into(),
            sample_tempo_bpm: 62.5,
        });
        for bar in 0..12u32 {
            let triggers = expand_bar(&track, bar, 125.0);
            if bar % 2 == 0 {
                assert_eq!(triggers.len(), 1, "bar {bar}");
                assert_eq!(triggers[0].offset_sixteenths(), 0);
            } else {
                assert!(triggers.is_empty(), "bar {bar}");
            }
        }
    }

    #[test]
    fn four_on_the_floor_lands_on_every_beat() {
        let track = track_with(Instrument::StepSequencer {
            pattern: bits("1000100010001000"),
            sample_url: "kick.wav".into(),
        });
        let triggers = expand_bar(&track, 0, 125.0);
        let positions: Vec<_> = triggers.iter().map(|t| (t.beat, t.sixteenth)).collect();
        assert_eq!(positions, [(0, 0), (1, 0), (2, 0), (3, 0)]);
    }

    #[test]
    fn short_step_patterns_tile_across_the_bar() {
        let track = track_with(Instrument::StepSequencer {
            pattern: bits("1000"),
            sample_url: "kick.wav".into(),
        });
        let triggers = expand_bar(&track, 7, 125.0);
        let subs: Vec<_> = triggers.iter().map(|t| t.sub_index).collect();
        assert_eq!(subs, [0, 4, 8, 12]);
    }

    #[test]
    fn long_step_patterns_continue_on_the_next_bar() {
        // 32 steps: bar 0 plays the first half, bar 1 the second.
        let mut pattern = vec![false; 32];
        pattern[0] = true;
        pattern[16] = true;
        pattern[20] = true;
        let track = track_with(Instrument::StepSequencer {
            pattern,
            sample_url: "snare.wav".into(),
        });
        let bar0: Vec<_> = expand_bar(&track, 0, 125.0)
            .iter()
            .map(|t| t.sub_index)
            .collect();
        let bar1: Vec<_> = expand_bar(&track, 1, 125.0)
            .iter()
            .map(|t| t.sub_index)
            .collect();
        assert_eq!(bar0, [0]);
        assert_eq!(bar1, [0, 4]);
    }

    #[test]
    fn melodic_slots_land_on_eighths_and_cycle_notes() {
        let track = track_with(Instrument::MelodicSequence {
            pattern: bits("10101010"),
            notes: vec![60, 64, 67],
            sample_url: "keys.wav".into(),
        });
        let triggers = expand_bar(&track, 0, 125.0);
        let laid_out: Vec<_> = triggers
            .iter()
            .map(|t| (t.beat, t.sixteenth, t.note))
            .collect();
        assert_eq!(
            laid_out,
            [
                (0, 0, Some(60)),
                (1, 0, Some(67)),
                (2, 0, Some(64)),
                (3, 0, Some(60)),
            ]
        );
    }

    #[test]
    fn melodic_offbeats_land_on_the_second_sixteenth_pair() {
        let track = track_with(Instrument::MelodicSequence {
            pattern: bits("01010101"),
            notes: vec![48],
            sample_url: "bass.wav".into(),
        });
        let triggers = expand_bar(&track, 3, 125.0);
        let positions: Vec<_> = triggers.iter().map(|t| (t.beat, t.sixteenth)).collect();
        assert_eq!(positions, [(0, 2), (1, 2), (2, 2), (3, 2)]);
    }

    #[test]
    fn empty_patterns_produce_nothing() {
        let no_steps = track_with(Instrument::StepSequencer {
            pattern: Vec::new(),
            sample_url: "kick.wav".into(),
        });
        let no_notes = track_with(Instrument::MelodicSequence {
            pattern: bits("11111111"),
            notes: Vec::new(),
            sample_url: "keys.wav".into(),
        });
        assert!(expand_bar(&no_steps, 0, 125.0).is_empty());
        assert!(expand_bar(&no_notes, 0, 125.0).is_empty());
    }

    #[test]
    fn event_ids_are_deterministic() {
        assert_eq!(event_id("track-2", 9, 5), "track-2-9-5");
    }
}
