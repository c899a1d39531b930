use thiserror::Error;

/// Engine error taxonomy. Nothing here is retried automatically: each is
/// either absorbed with degraded behavior or surfaced once to the caller.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Fatal to the load call; the engine stays in its prior state.
    #[error("arrangement has no content to load: {0}")]
    Load(String),

    /// One track's playable handle is unavailable. Recovered locally: the
    /// track is omitted from scheduling for the rest of the session.
    #[error("no playable sample for track '{track}': {reason}")]
    SampleResolution { track: String, reason: String },

    /// Rejected before reaching the clock; current position is unchanged.
    #[error("invalid seek target {bars}:{beats}:{sixteenths}")]
    InvalidSeekTarget {
        bars: u32,
        beats: u32,
        sixteenths: u32,
    },

    #[error("invalid loop region [{start_bar}, {end_bar})")]
    InvalidLoopRegion { start_bar: u32, end_bar: u32 },

    #[error("tempo must be positive, got {0}")]
    InvalidTempo(f64),

    #[error("no arrangement loaded")]
    NoArrangement,
}
