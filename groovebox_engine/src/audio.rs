//! Audio output: a cpal stream mixing one-shot voices additively.
//!
//! Fired triggers arrive as [`Voice`]s over a bounded channel; the audio
//! callback owns the active voice list exclusively, so there is no shared
//! mutable state with the engine's cooperative thread.

use std::sync::Arc;

use anyhow::anyhow;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Sender};

/// A triggered sample playing once from the top, then discarded.
pub struct Voice {
    pub data: Arc<Vec<f32>>,
    pub channels: u16,
    pub gain: f32,
    /// Source frames consumed per output frame (sample-rate and pitch
    /// correction combined).
    pub step: f64,
    pub frame_pos: f64,
}

pub struct AudioOutput {
    _stream: cpal::Stream,
    sample_rate: u32,
    voices_tx: Sender<Voice>,
}

impl AudioOutput {
    pub fn new() -> Result<Self, anyhow::Error> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(anyhow!("no output device available"))?;
        let config = device.default_output_config()?;
        let sample_rate = config.sample_rate();
        let channels = config.channels() as usize;
        let sample_format = config.sample_format();
        let stream_config: cpal::StreamConfig = config.into();

        let (voices_tx, voices_rx) = bounded::<Voice>(256);
        let mut active: Vec<Voice> = Vec::new();

        let err_fn = |err: cpal::StreamError| {
            let s = err.to_string();
            // Suppress buffer under/overrun messages to avoid log spam
            if !s.contains("underrun") && !s.contains("overrun") {
                log::error!(target: "audio", "stream error: {s}");
            }
        };

        let stream = match sample_format {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    while let Ok(voice) = voices_rx.try_recv() {
                        active.push(voice);
                    }
                    data.fill(0.0);
                    let frames = data.len() / channels;
                    active.retain_mut(|voice| mix_voice(voice, data, frames, channels));
                },
                err_fn,
                None,
            )?,
            _ => return Err(anyhow!("Unsupported sample format")),
        };

        stream.play()?;
        log::info!(target: "audio", "output stream open: {sample_rate} Hz, {channels} ch");

        Ok(Self {
            _stream: stream,
            sample_rate,
            voices_tx,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel end handed to playable handles.
    pub fn voices(&self) -> Sender<Voice> {
        self.voices_tx.clone()
    }
}

/// Mix one voice into an interleaved output buffer. Returns false once the
/// voice is exhausted.
fn mix_voice(voice: &mut Voice, data: &mut [f32], frames: usize, out_channels: usize) -> bool {
    let src_channels = voice.channels.max(1) as usize;
    let src_frames = voice.data.len() / src_channels;
    for frame in 0..frames {
        let src_frame = voice.frame_pos as usize;
        if src_frame >= src_frames {
            return false;
        }
        let base = src_frame * src_channels;
        let left = voice.data[base] * voice.gain;
        let right = if src_channels > 1 {
            voice.data[base + 1] * voice.gain
        } else {
            left
        };
        if out_channels >= 2 {
            data[frame * out_channels] += left;
            data[frame * out_channels + 1] += right;
        } else {
            data[frame] += (left + right) * 0.5;
        }
        voice.frame_pos += voice.step;
    }
    (voice.frame_pos as usize) < src_frames
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(data: Vec<f32>, channels: u16, gain: f32, step: f64) -> Voice {
        Voice {
            data: Arc::new(data),
            channels,
            gain,
            step,
            frame_pos: 0.0,
        }
    }

    #[test]
    fn mono_voice_fans_out_to_stereo() {
        let mut v = voice(vec![1.0, 1.0], 1, 0.5, 1.0);
        let mut out = vec![0.0; 4];
        let alive = mix_voice(&mut v, &mut out, 2, 2);
        assert_eq!(out, [0.5, 0.5, 0.5, 0.5]);
        assert!(!alive);
    }

    #[test]
    fn voices_mix_additively() {
        let mut a = voice(vec![0.25; 4], 1, 1.0, 1.0);
        let mut b = voice(vec![0.25; 4], 1, 1.0, 1.0);
        let mut out = vec![0.0; 8];
        mix_voice(&mut a, &mut out, 4, 2);
        mix_voice(&mut b, &mut out, 4, 2);
        assert!(out.iter().all(|s| (*s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn double_step_halves_playback_length() {
        let mut v = voice((0..8).map(|i| i as f32).collect(), 1, 1.0, 2.0);
        let mut out = vec![0.0; 8];
        let alive = mix_voice(&mut v, &mut out, 4, 2);
        // Frames 0, 2, 4, 6 consumed in four output frames.
        assert_eq!(out[0], 0.0);
        assert_eq!(out[2], 2.0);
        assert_eq!(out[4], 4.0);
        assert_eq!(out[6], 6.0);
        assert!(!alive);
    }

    #[test]
    fn exhausted_voice_reports_done_mid_buffer() {
        let mut v = voice(vec![1.0], 1, 1.0, 1.0);
        let mut out = vec![0.0; 16];
        assert!(!mix_voice(&mut v, &mut out, 8, 2));
        assert_eq!(out[0], 1.0);
        assert_eq!(out[2], 0.0);
    }

    #[test]
    fn stereo_source_keeps_its_channels() {
        let mut v = voice(vec![0.2, 0.8, 0.2, 0.8], 2, 1.0, 1.0);
        let mut out = vec![0.0; 4];
        mix_voice(&mut v, &mut out, 2, 2);
        assert!((out[0] - 0.2).abs() < 1e-6);
        assert!((out[1] - 0.8).abs() < 1e-6);
    }
}
