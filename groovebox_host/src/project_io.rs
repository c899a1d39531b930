use std::fs::File;
use std::io::Write;

use groovebox_shared::arrangement::{Arrangement, Instrument, Section, Track};

pub fn load_arrangement_file(path: &str) -> Result<Arrangement, anyhow::Error> {
    let content = std::fs::read_to_string(path)?;
    let arrangement: Arrangement = serde_json::from_str(&content)?;
    log::info!(
        target: "project",
        "loaded '{path}': {} tracks, {} sections at {} BPM",
        arrangement.tracks.len(),
        arrangement.sections.len(),
        arrangement.tempo
    );
    Ok(arrangement)
}

pub fn save_arrangement_file(arrangement: &Arrangement, path: &str) -> Result<(), anyhow::Error> {
    let json = serde_json::to_string_pretty(arrangement)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

fn track(id: &str, name: &str, volume: f32, instrument: Instrument) -> Track {
    Track {
        id: id.to_string(),
        name: name.to_string(),
        volume,
        is_muted: false,
        is_solo: false,
        instrument,
    }
}

fn section(id: &str, name: &str, enabled: &[&str]) -> Section {
    Section {
        id: id.to_string(),
        name: name.to_string(),
        enabled_track_ids: enabled.iter().map(|s| s.to_string()).collect(),
    }
}

/// Built-in demo groove: a house arrangement that exercises every
/// instrument kind across an intro / verse / chorus layout.
pub fn demo_arrangement() -> Arrangement {
    Arrangement {
        tempo: 125.0,
        tracks: vec![
            track(
                "track-1",
                "Kick Drum",
                0.8,
                Instrument::Clip {
                    sample_url: "samples/house/loops/kick/28x-drm01-125.wav".to_string(),
                    sample_tempo_bpm: 62.5,
                },
            ),
            track(
                "track-2",
                "Hi-Hat",
                0.6,
                Instrument::Clip {
                    sample_url: "samples/house/loops/hats/28k-drm05-125.wav".to_string(),
                    sample_tempo_bpm: 125.0,
                },
            ),
            track(
                "track-3",
                "Bassline",
                0.7,
                Instrument::Clip {
                    sample_url: "samples/house/loops/bass/FIH_122_C_Synth_Bass_D.wav".to_string(),
                    sample_tempo_bpm: 122.0,
                },
            ),
            track(
                "track-4",
                "Clap",
                0.5,
                Instrument::StepSequencer {
                    pattern: "0000100000001000".chars().map(|c| c == '1').collect(),
                    sample_url: "samples/house/oneshots/clap.wav".to_string(),
                },
            ),
            track(
                "track-5",
                "Keys",
                0.55,
                Instrument::MelodicSequence {
                    pattern: "10010010".chars().map(|c| c == '1').collect(),
                    notes: vec![60, 63, 67, 70],
                    sample_url: "samples/house/oneshots/keys_c4.wav".to_string(),
                },
            ),
        ],
        sections: vec![
            section("section-1", "Intro", &["track-1"]),
            section("section-2", "Verse", &["track-1", "track-2", "track-4"]),
            section(
                "section-3",
                "Chorus",
                &["track-1", "track-2", "track-3", "track-4", "track-5"],
            ),
        ],
    }
}
