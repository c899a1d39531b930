//! Linear volume to playback gain mapping.
//!
//! Track volumes are stored linear 0..1 and mapped through the log domain
//! so fader positions behave perceptually. Volume 0 maps to the domain's
//! negative-infinity floor, never to a numeric error.

/// Convert linear volume (0..1) to decibels. 0 maps to -inf.
pub fn db_from_linear(volume: f32) -> f32 {
    if volume <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * volume.log10()
    }
}

/// Convert decibels back to an amplitude multiplier. -inf maps to silence.
pub fn gain_from_db(db: f32) -> f32 {
    if db == f32::NEG_INFINITY {
        0.0
    } else {
        10.0_f32.powf(db / 20.0)
    }
}

/// The gain a track's fader position produces at trigger time.
pub fn playback_gain(volume: f32) -> f32 {
    gain_from_db(db_from_linear(volume))
}
