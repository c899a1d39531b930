//! Sample store: resolves instrument references to playable handles.
//!
//! Decoded WAV data is cached by path; clips whose native tempo differs
//! from the arrangement are pre-stretched through the resampler and cached
//! by (path, ratio). Resolution failure for one track is the caller's cue
//! to skip that track, never a load-wide failure.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use crossbeam_channel::Sender;

use groovebox_shared::arrangement::{Instrument, Track};

use crate::audio::Voice;
use crate::resampler;

/// An opaque, already-loaded unit of triggerable audio.
pub trait Playable {
    /// Fire the handle. `note` pitches melodic triggers; `gain` is the
    /// track's gain at fire time.
    fn trigger(&self, note: Option<u8>, gain: f32);
}

/// Resolves a track to a playable handle, or fails for that track alone.
pub trait SampleStore {
    fn resolve(
        &mut self,
        track: &Track,
        arrangement_tempo: f64,
    ) -> anyhow::Result<Arc<dyn Playable>>;
}

#[derive(Clone)]
struct DecodedSample {
    data: Arc<Vec<f32>>,
    channels: u16,
    sample_rate: u32,
}

/// WAV-backed store feeding voices to the audio output.
pub struct WavSampleStore {
    voices: Sender<Voice>,
    output_sample_rate: u32,
    decoded: HashMap<String, DecodedSample>,
    // (path, ratio * 1000) -> pre-stretched data, to avoid re-resampling
    stretched: HashMap<(String, u32), Arc<Vec<f32>>>,
}

impl WavSampleStore {
    pub fn new(voices: Sender<Voice>, output_sample_rate: u32) -> Self {
        Self {
            voices,
            output_sample_rate,
            decoded: HashMap::new(),
            stretched: HashMap::new(),
        }
    }

    fn decode(&mut self, url: &str) -> anyhow::Result<DecodedSample> {
        if let Some(hit) = self.decoded.get(url) {
            return Ok(hit.clone());
        }

        let reader =
            hound::WavReader::open(url).with_context(|| format!("open sample '{url}'"))?;
        let spec = reader.spec();
        let raw: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => {
                reader.into_samples::<f32>().collect::<Result<_, _>>()?
            }
            hound::SampleFormat::Int => {
                let max_val = 2.0_f32.powi(spec.bits_per_sample as i32 - 1);
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|x| x as f32 / max_val))
                    .collect::<Result<_, _>>()?
            }
        };

        let sample = DecodedSample {
            data: Arc::new(raw),
            channels: spec.channels,
            sample_rate: spec.sample_rate,
        };
        log::info!(
            target: "samples",
            "loaded '{url}': {} ch, {} Hz, {} frames",
            sample.channels,
            sample.sample_rate,
            sample.data.len() / sample.channels.max(1) as usize
        );
        self.decoded.insert(url.to_string(), sample.clone());
        Ok(sample)
    }

    fn stretched(
        &mut self,
        url: &str,
        sample: &DecodedSample,
        ratio: f64,
    ) -> anyhow::Result<Arc<Vec<f32>>> {
        let key = (url.to_string(), (ratio * 1000.0) as u32);
        if let Some(hit) = self.stretched.get(&key) {
            return Ok(hit.clone());
        }
        let data = Arc::new(resampler::resample(&sample.data, sample.channels, ratio)?);
        log::debug!(target: "samples", "stretched '{url}' by {ratio:.3}");
        self.stretched.insert(key, data.clone());
        Ok(data)
    }
}

impl SampleStore for WavSampleStore {
    fn resolve(
        &mut self,
        track: &Track,
        arrangement_tempo: f64,
    ) -> anyhow::Result<Arc<dyn Playable>> {
        let url = track.instrument.sample_url().to_string();
        let mut sample = self.decode(&url)?;

        if let Instrument::Clip {
            sample_tempo_bpm, ..
        } = &track.instrument
        {
            // Match the clip to the arrangement tempo, as the playback
            // rate the original recording implies.
            if *sample_tempo_bpm > 0.0 && arrangement_tempo > 0.0 {
                let rate = sample_tempo_bpm / arrangement_tempo;
                if (rate - 1.0).abs() > 1e-3 {
                    sample.data = self.stretched(&url, &sample, rate)?;
                }
            }
        }

        Ok(Arc::new(SamplePlayer {
            data: sample.data,
            channels: sample.channels,
            base_step: sample.sample_rate as f64 / self.output_sample_rate.max(1) as f64,
            voices: self.voices.clone(),
        }))
    }
}

/// Playable handle over decoded data; each trigger spawns a fresh voice.
struct SamplePlayer {
    data: Arc<Vec<f32>>,
    channels: u16,
    base_step: f64,
    voices: Sender<Voice>,
}

/// MIDI note mapped to a playback-rate multiplier, middle C = unity.
fn note_rate(note: u8) -> f64 {
    2f64.powf((note as f64 - 60.0) / 12.0)
}

impl Playable for SamplePlayer {
    fn trigger(&self, note: Option<u8>, gain: f32) {
        let step = self.base_step * note.map_or(1.0, note_rate);
        let voice = Voice {
            data: self.data.clone(),
            channels: self.channels,
            gain,
            step,
            frame_pos: 0.0,
        };
        if self.voices.try_send(voice).is_err() {
            log::debug!(target: "samples", "voice queue full or closed; trigger dropped");
        }
    }
}

/// Store for headless runs: every track resolves to a handle that only
/// logs its triggers.
pub struct SilentSampleStore;

impl SampleStore for SilentSampleStore {
    fn resolve(
        &mut self,
        track: &Track,
        _arrangement_tempo: f64,
    ) -> anyhow::Result<Arc<dyn Playable>> {
        Ok(Arc::new(SilentPlayable {
            track_id: track.id.clone(),
        }))
    }
}

struct SilentPlayable {
    track_id: String,
}

impl Playable for SilentPlayable {
    fn trigger(&self, note: Option<u8>, gain: f32) {
        log::debug!(
            target: "samples",
            "trigger {} note {note:?} gain {gain:.3} (silent output)",
            self.track_id
        );
    }
}
