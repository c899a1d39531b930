/// Transport and mixer commands a host thread sends to the engine. Drained
/// at the start of each tick, on the engine's own cooperative turn.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    Play,
    Pause,
    Stop,
    JumpTo {
        bars: u32,
        beats: u32,
        sixteenths: u32,
    },
    SetLoop {
        enabled: bool,
        start_bar: u32,
        end_bar: u32,
    },
    SetTempo(f64),
    SetTrackVolume {
        track_id: String,
        volume: f32,
    },
    SetMute {
        track_id: String,
        muted: bool,
    },
    SetSolo {
        track_id: String,
        solo: bool,
    },
}
