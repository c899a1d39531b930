//! Sinc resampling of decoded sample data.
//!
//! Used by the sample store to pre-stretch clips whose native tempo does
//! not match the arrangement, so a clip trigger is a plain playback start
//! with no per-frame rate math on the audio thread.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

const CHUNK_SIZE: usize = 1024;

/// Resample interleaved audio by `ratio`. Ratio > 1.0 speeds up (shorter
/// output), ratio < 1.0 slows down (longer output).
pub fn resample(input: &[f32], channels: u16, ratio: f64) -> Result<Vec<f32>, anyhow::Error> {
    if input.is_empty() {
        return Ok(Vec::new());
    }
    if ratio <= 0.0 {
        return Err(anyhow::anyhow!("ratio must be positive"));
    }

    let channels = channels.max(1) as usize;
    let target_ratio = 1.0 / ratio;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(target_ratio, 2.0, params, CHUNK_SIZE, channels)?;

    // Deinterleave; rubato wants planar input.
    let frames = input.len() / channels;
    let mut planar: Vec<Vec<f32>> = vec![Vec::new(); channels];
    for (i, sample) in input.iter().enumerate() {
        planar[i % channels].push(*sample);
    }

    let mut out_planar: Vec<Vec<f32>> = vec![Vec::new(); channels];
    let mut pos = 0;
    while pos < frames {
        let end = (pos + CHUNK_SIZE).min(frames);
        let waves: Vec<Vec<f32>> = planar
            .iter()
            .map(|ch| {
                let mut chunk = ch[pos..end].to_vec();
                chunk.resize(CHUNK_SIZE, 0.0);
                chunk
            })
            .collect();
        let processed = resampler.process(&waves, None)?;
        for (out, ch) in out_planar.iter_mut().zip(processed.iter()) {
            out.extend_from_slice(ch);
        }
        pos += CHUNK_SIZE;
    }

    // Reinterleave.
    let out_frames = out_planar.first().map_or(0, |ch| ch.len());
    let mut output = Vec::with_capacity(out_frames * channels);
    for frame in 0..out_frames {
        for ch in &out_planar {
            output.push(ch[frame]);
        }
    }
    Ok(output)
}
