//! Engine facade: owns the transport clock, the lookahead scheduler, and
//! the resolved playable handles, and turns transport commands plus host
//! pump ticks into fired triggers and playhead updates.
//!
//! Everything here runs on one cooperative turn: the host pump (`tick`)
//! and direct method calls are the only entry points, and channel commands
//! are drained at the top of each tick. `stop` and `jump_to` are idempotent
//! (clear registry, cancel all pending clock triggers), which is what makes
//! command/tick interleaving safe without any locking.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::Receiver;

use groovebox_shared::arrangement::{Arrangement, Track};
use groovebox_shared::error::EngineError;
use groovebox_shared::gain::playback_gain;
use groovebox_shared::position::{LoopRegion, PlayheadPosition};

use crate::clock::{TransportClock, TriggerEvent};
use crate::commands::EngineCommand;
use crate::playhead::PlayheadSender;
use crate::samples::{Playable, SampleStore};
use crate::scheduler::LookaheadScheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No arrangement loaded.
    Idle,
    /// Arrangement loaded, transport stopped.
    Ready,
    Playing,
    Paused,
}

pub struct Engine {
    clock: Box<dyn TransportClock>,
    scheduler: LookaheadScheduler,
    arrangement: Option<Arrangement>,
    handles: HashMap<String, Arc<dyn Playable>>,
    state: EngineState,
    playhead: Option<PlayheadSender>,
    command_rx: Option<Receiver<EngineCommand>>,
}

impl Engine {
    pub fn new(clock: Box<dyn TransportClock>) -> Self {
        Self {
            clock,
            scheduler: LookaheadScheduler::new(),
            arrangement: None,
            handles: HashMap::new(),
            state: EngineState::Idle,
            playhead: None,
            command_rx: None,
        }
    }

    /// Attach the host-side command channel (drained on each tick).
    pub fn set_command_receiver(&mut self, rx: Receiver<EngineCommand>) {
        self.command_rx = Some(rx);
    }

    pub fn set_playhead_sink(&mut self, sink: PlayheadSender) {
        self.playhead = Some(sink);
    }

    /// Replace all engine state with a new arrangement. Fails without side
    /// effects when the document has no content; a track whose sample fails
    /// to resolve is logged and skipped for the rest of the session.
    pub fn load_arrangement(
        &mut self,
        arrangement: Arrangement,
        store: &mut dyn SampleStore,
    ) -> Result<(), EngineError> {
        if arrangement.tracks.is_empty() {
            return Err(EngineError::Load("no tracks".to_string()));
        }
        if arrangement.sections.is_empty() {
            return Err(EngineError::Load("no sections".to_string()));
        }
        if arrangement.tempo <= 0.0 || !arrangement.tempo.is_finite() {
            return Err(EngineError::Load(format!(
                "invalid tempo {}",
                arrangement.tempo
            )));
        }

        let mut handles: HashMap<String, Arc<dyn Playable>> = HashMap::new();
        for track in &arrangement.tracks {
            match store.resolve(track, arrangement.tempo) {
                Ok(handle) => {
                    handles.insert(track.id.clone(), handle);
                }
                Err(err) => {
                    let err = EngineError::SampleResolution {
                        track: track.name.clone(),
                        reason: format!("{err:#}"),
                    };
                    log::warn!(target: "engine", "{err}; track skipped");
                }
            }
        }

        log::info!(
            target: "engine",
            "arrangement loaded: {} bars, {} tracks ({} playable)",
            arrangement.total_bars(),
            arrangement.tracks.len(),
            handles.len()
        );

        self.clock.stop();
        self.clock.seek(PlayheadPosition::default());
        self.clock.set_tempo(arrangement.tempo);
        self.scheduler = LookaheadScheduler::new();
        self.handles = handles;
        self.arrangement = Some(arrangement);
        self.state = EngineState::Ready;
        Ok(())
    }

    /// Host pump. Drains commands, advances the clock, fires due triggers,
    /// runs the scheduling pass, and publishes the playhead.
    pub fn tick(&mut self) {
        self.drain_commands();

        let frame = self.clock.advance();
        for event in &frame.due {
            self.fire(event);
        }

        if self.state != EngineState::Playing {
            return;
        }

        if let Some(arrangement) = self.arrangement.as_ref() {
            self.scheduler.run(arrangement, self.clock.as_mut());
        }

        // A window that opens exactly on its boundary bar registers that
        // bar's downbeat at the current instant; collect it now rather than
        // a pump late.
        let due_now = self.clock.advance().due;
        for event in &due_now {
            self.fire(event);
        }

        let current_bar = frame.position.bars;
        if self.scheduler.reached_end(current_bar) {
            // Natural end of the song, not an error.
            log::info!(target: "engine", "end of arrangement at bar {current_bar}");
            self.stop();
            return;
        }

        if frame.sixteenths_crossed > 0 {
            self.publish_playhead();
        }
    }

    pub fn play(&mut self) -> Result<(), EngineError> {
        match self.state {
            EngineState::Idle => Err(EngineError::NoArrangement),
            EngineState::Playing => Ok(()),
            EngineState::Ready => {
                // Cold start: open the initial window at the current
                // position before the clock begins to move.
                self.open_window();
                self.clock.start();
                self.state = EngineState::Playing;
                self.publish_playhead();
                Ok(())
            }
            EngineState::Paused => {
                self.clock.start();
                self.state = EngineState::Playing;
                Ok(())
            }
        }
    }

    pub fn pause(&mut self) {
        if self.state == EngineState::Playing {
            self.clock.pause();
            self.state = EngineState::Paused;
        }
    }

    pub fn stop(&mut self) {
        if self.state == EngineState::Idle {
            return;
        }
        self.clock.stop();
        self.scheduler.reset();
        self.state = EngineState::Ready;
        self.publish_playhead();
    }

    /// Seek to an absolute position. Rejected before reaching the clock if
    /// the target is off the bar grid; if playing, this is stop-then-restart
    /// from the new position so stale triggers never fire.
    pub fn jump_to(&mut self, bars: u32, beats: u32, sixteenths: u32) -> Result<(), EngineError> {
        let target = PlayheadPosition::new(bars, beats, sixteenths)?;
        let was_playing = self.state == EngineState::Playing;
        self.clock.seek(target);
        self.scheduler.reset();
        if was_playing {
            self.open_window();
            self.clock.start();
        }
        self.publish_playhead();
        Ok(())
    }

    /// Takes effect on the next bar resolved; bars already pre-scheduled
    /// keep their slots until the window turns over.
    pub fn set_loop(
        &mut self,
        enabled: bool,
        start_bar: u32,
        end_bar: u32,
    ) -> Result<(), EngineError> {
        let region = LoopRegion::new(enabled, start_bar, end_bar)?;
        self.scheduler.set_loop(region);
        Ok(())
    }

    pub fn set_tempo(&mut self, bpm: f64) -> Result<(), EngineError> {
        if bpm <= 0.0 || !bpm.is_finite() {
            return Err(EngineError::InvalidTempo(bpm));
        }
        self.clock.set_tempo(bpm);
        if let Some(arrangement) = self.arrangement.as_mut() {
            arrangement.tempo = bpm;
        }
        Ok(())
    }

    pub fn set_track_volume(&mut self, track_id: &str, volume: f32) {
        self.with_track(track_id, |t| t.volume = volume.clamp(0.0, 1.0));
    }

    pub fn set_mute(&mut self, track_id: &str, muted: bool) {
        self.with_track(track_id, |t| t.is_muted = muted);
    }

    pub fn set_solo(&mut self, track_id: &str, solo: bool) {
        self.with_track(track_id, |t| t.is_solo = solo);
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == EngineState::Playing
    }

    pub fn position(&self) -> PlayheadPosition {
        self.clock.position()
    }

    pub fn loop_region(&self) -> LoopRegion {
        self.scheduler.loop_region()
    }

    fn open_window(&mut self) {
        if let Some(arrangement) = self.arrangement.as_ref() {
            self.scheduler.run(arrangement, self.clock.as_mut());
        }
    }

    /// Trigger a due event against its playable handle with the track's
    /// current gain. Mute is re-read here so a mid-window mute lands even
    /// for already-scheduled triggers.
    fn fire(&self, event: &TriggerEvent) {
        let Some(arrangement) = self.arrangement.as_ref() else {
            return;
        };
        let Some(track) = arrangement.track(&event.track_id) else {
            return;
        };
        if track.is_muted {
            return;
        }
        let Some(handle) = self.handles.get(&event.track_id) else {
            return;
        };
        let gain = playback_gain(track.volume);
        log::trace!(target: "engine", "fire {} gain {gain:.3}", event.event_id);
        handle.trigger(event.note, gain);
    }

    fn drain_commands(&mut self) {
        let Some(rx) = self.command_rx.clone() else {
            return;
        };
        while let Ok(command) = rx.try_recv() {
            self.apply_command(command);
        }
    }

    fn apply_command(&mut self, command: EngineCommand) {
        let result = match command {
            EngineCommand::Play => self.play(),
            EngineCommand::Pause => {
                self.pause();
                Ok(())
            }
            EngineCommand::Stop => {
                self.stop();
                Ok(())
            }
            EngineCommand::JumpTo {
                bars,
                beats,
                sixteenths,
            } => self.jump_to(bars, beats, sixteenths),
            EngineCommand::SetLoop {
                enabled,
                start_bar,
                end_bar,
            } => self.set_loop(enabled, start_bar, end_bar),
            EngineCommand::SetTempo(bpm) => self.set_tempo(bpm),
            EngineCommand::SetTrackVolume { track_id, volume } => {
                self.set_track_volume(&track_id, volume);
                Ok(())
            }
            EngineCommand::SetMute { track_id, muted } => {
                self.set_mute(&track_id, muted);
                Ok(())
            }
            EngineCommand::SetSolo { track_id, solo } => {
                self.set_solo(&track_id, solo);
                Ok(())
            }
        };
        if let Err(err) = result {
            log::warn!(target: "engine", "command rejected: {err}");
        }
    }

    fn with_track(&mut self, track_id: &str, apply: impl FnOnce(&mut Track)) {
        match self
            .arrangement
            .as_mut()
            .and_then(|a| a.track_mut(track_id))
        {
            Some(track) => apply(track),
            None => {
                log::debug!(target: "engine", "ignoring command for unknown track '{track_id}'")
            }
        }
    }

    fn publish_playhead(&self) {
        if let Some(sink) = &self.playhead {
            sink.publish(self.clock.position());
        }
    }
}
