//! Transport clock port.
//!
//! The engine depends only on this narrow contract, so playback logic runs
//! identically against the wall-clock implementation and the deterministic
//! fake used by tests. Scheduled triggers are data events: the clock hands
//! back whatever came due on each `advance`, and the engine dispatches them.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use groovebox_shared::position::{PlayheadPosition, SIXTEENTHS_PER_BEAT};

/// Due-event comparison tolerance, in sixteenths.
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Playing,
    Paused,
}

/// A trigger registered with the clock for future delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    /// Registry id, `"{trackId}-{bar}-{subIndex}"`.
    pub event_id: String,
    pub track_id: String,
    /// MIDI note for melodic triggers.
    pub note: Option<u8>,
}

/// What one pump of the clock produced.
#[derive(Debug, Default)]
pub struct ClockFrame {
    /// Position at pump time, floored to the sixteenth grid.
    pub position: PlayheadPosition,
    /// Whole sixteenths crossed since the previous pump. Zero while the
    /// transport is not moving.
    pub sixteenths_crossed: u32,
    /// Triggers that came due, in fire order.
    pub due: Vec<TriggerEvent>,
}

pub trait TransportClock {
    /// stopped|paused -> playing. Resuming from pause keeps the position.
    fn start(&mut self);
    /// playing -> paused. Pending triggers stay registered.
    fn pause(&mut self);
    /// any -> stopped. Resets position to the seek origin and cancels every
    /// pending trigger.
    fn stop(&mut self);
    /// Legal in any state. Cancels every pending trigger; callers must not
    /// assume anything previously scheduled still fires.
    fn seek(&mut self, position: PlayheadPosition);
    fn set_tempo(&mut self, bpm: f64);
    fn tempo(&self) -> f64;
    fn state(&self) -> TransportState;
    fn position(&self) -> PlayheadPosition;
    /// Register a trigger at an absolute sixteenth on the real timeline.
    fn schedule_at(&mut self, sixteenth: u64, event: TriggerEvent);
    fn cancel_all(&mut self);
    /// Pump the clock: advance the musical position and collect due
    /// triggers. This is the engine's only time source.
    fn advance(&mut self) -> ClockFrame;
}

#[derive(Debug)]
struct Pending {
    at: u64,
    seq: u64,
    event: TriggerEvent,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}
impl Eq for Pending {}
impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Pending {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

/// Min-heap of pending triggers shared by both clock implementations.
#[derive(Debug, Default)]
struct TriggerQueue {
    heap: BinaryHeap<Reverse<Pending>>,
    seq: u64,
}

impl TriggerQueue {
    fn push(&mut self, at: u64, event: TriggerEvent) {
        self.seq += 1;
        self.heap.push(Reverse(Pending {
            at,
            seq: self.seq,
            event,
        }));
    }

    fn drain_due(&mut self, now_sixteenths: f64, out: &mut Vec<TriggerEvent>) {
        loop {
            match self.heap.peek() {
                Some(Reverse(p)) if (p.at as f64) <= now_sixteenths + EPSILON => {
                    if let Some(Reverse(p)) = self.heap.pop() {
                        out.push(p.event);
                    }
                }
                _ => break,
            }
        }
    }

    fn clear(&mut self) {
        self.heap.clear();
    }
}

/// Production clock anchored to a monotonic instant. The host loop pumps
/// `advance` at a finer cadence than a sixteenth; between pumps the clock's
/// own queue keeps pre-registered triggers ordered.
pub struct WallClock {
    tempo: f64,
    state: TransportState,
    /// Sixteenth the transport returns to on stop(); set by seek().
    origin: f64,
    /// Sixteenth at the last anchor commit.
    position: f64,
    anchor: Option<Instant>,
    last_tick: u64,
    queue: TriggerQueue,
}

impl WallClock {
    pub fn new(tempo: f64) -> Self {
        Self {
            tempo,
            state: TransportState::Stopped,
            origin: 0.0,
            position: 0.0,
            anchor: None,
            last_tick: 0,
            queue: TriggerQueue::default(),
        }
    }

    fn sixteenths_per_second(&self) -> f64 {
        self.tempo / 60.0 * SIXTEENTHS_PER_BEAT as f64
    }

    fn current_sixteenths(&self) -> f64 {
        match self.anchor {
            Some(anchor) => {
                self.position + anchor.elapsed().as_secs_f64() * self.sixteenths_per_second()
            }
            None => self.position,
        }
    }

    /// Freeze the moving position into `self.position`.
    fn commit(&mut self) {
        self.position = self.current_sixteenths();
        if self.anchor.is_some() {
            self.anchor = Some(Instant::now());
        }
    }
}

impl TransportClock for WallClock {
    fn start(&mut self) {
        if self.state != TransportState::Playing {
            self.anchor = Some(Instant::now());
            self.state = TransportState::Playing;
        }
    }

    fn pause(&mut self) {
        if self.state == TransportState::Playing {
            self.position = self.current_sixteenths();
            self.anchor = None;
            self.state = TransportState::Paused;
        }
    }

    fn stop(&mut self) {
        self.position = self.origin;
        self.anchor = None;
        self.state = TransportState::Stopped;
        self.last_tick = self.origin as u64;
        self.queue.clear();
    }

    fn seek(&mut self, position: PlayheadPosition) {
        let target = position.total_sixteenths();
        self.queue.clear();
        self.origin = target as f64;
        self.position = target as f64;
        self.last_tick = target;
        if self.state == TransportState::Playing {
            // Stop-then-restart collapsed: stale triggers are already gone.
            self.anchor = Some(Instant::now());
        }
    }

    fn set_tempo(&mut self, bpm: f64) {
        self.commit();
        self.tempo = bpm;
    }

    fn tempo(&self) -> f64 {
        self.tempo
    }

    fn state(&self) -> TransportState {
        self.state
    }

    fn position(&self) -> PlayheadPosition {
        PlayheadPosition::from_total_sixteenths(self.current_sixteenths() as u64)
    }

    fn schedule_at(&mut self, sixteenth: u64, event: TriggerEvent) {
        self.queue.push(sixteenth, event);
    }

    fn cancel_all(&mut self) {
        self.queue.clear();
    }

    fn advance(&mut self) -> ClockFrame {
        let now = self.current_sixteenths();
        let tick = now as u64;
        let mut due = Vec::new();
        if self.state == TransportState::Playing {
            self.queue.drain_due(now, &mut due);
        }
        let crossed = tick.saturating_sub(self.last_tick) as u32;
        self.last_tick = tick;
        ClockFrame {
            position: PlayheadPosition::from_total_sixteenths(tick),
            sixteenths_crossed: crossed,
            due,
        }
    }
}

/// Deterministic clock driven by logical sixteenth steps through a shared
/// handle. Tests (and headless runs) move time explicitly; no wall-clock
/// timers are involved.
pub struct FakeClock {
    tempo: f64,
    state: TransportState,
    origin: f64,
    position: f64,
    last_tick: u64,
    queue: TriggerQueue,
    step: Arc<Mutex<f64>>,
}

#[derive(Clone)]
pub struct FakeClockHandle {
    step: Arc<Mutex<f64>>,
}

impl FakeClockHandle {
    /// Queue logical time to elapse on the clock's next `advance`.
    pub fn advance_sixteenths(&self, sixteenths: u32) {
        if let Ok(mut step) = self.step.lock() {
            *step += sixteenths as f64;
        }
    }

    pub fn advance_bars(&self, bars: u32) {
        self.advance_sixteenths(bars * 16);
    }
}

impl FakeClock {
    pub fn new(tempo: f64) -> (Self, FakeClockHandle) {
        let step = Arc::new(Mutex::new(0.0));
        let handle = FakeClockHandle { step: step.clone() };
        (
            Self {
                tempo,
                state: TransportState::Stopped,
                origin: 0.0,
                position: 0.0,
                last_tick: 0,
                queue: TriggerQueue::default(),
                step,
            },
            handle,
        )
    }

    fn take_step(&mut self) -> f64 {
        match self.step.lock() {
            Ok(mut step) => std::mem::take(&mut *step),
            Err(_) => 0.0,
        }
    }
}

impl TransportClock for FakeClock {
    fn start(&mut self) {
        if self.state != TransportState::Playing {
            self.state = TransportState::Playing;
        }
    }

    fn pause(&mut self) {
        if self.state == TransportState::Playing {
            self.state = TransportState::Paused;
        }
    }

    fn stop(&mut self) {
        self.position = self.origin;
        self.last_tick = self.origin as u64;
        self.state = TransportState::Stopped;
        self.queue.clear();
    }

    fn seek(&mut self, position: PlayheadPosition) {
        let target = position.total_sixteenths();
        self.queue.clear();
        self.origin = target as f64;
        self.position = target as f64;
        self.last_tick = target;
    }

    fn set_tempo(&mut self, bpm: f64) {
        self.tempo = bpm;
    }

    fn tempo(&self) -> f64 {
        self.tempo
    }

    fn state(&self) -> TransportState {
        self.state
    }

    fn position(&self) -> PlayheadPosition {
        PlayheadPosition::from_total_sixteenths(self.position as u64)
    }

    fn schedule_at(&mut self, sixteenth: u64, event: TriggerEvent) {
        self.queue.push(sixteenth, event);
    }

    fn cancel_all(&mut self) {
        self.queue.clear();
    }

    fn advance(&mut self) -> ClockFrame {
        // Logical time elapses whether or not the transport consumes it.
        let step = self.take_step();
        if self.state == TransportState::Playing {
            self.position += step;
        }
        let tick = self.position as u64;
        let mut due = Vec::new();
        if self.state == TransportState::Playing {
            self.queue.drain_due(self.position, &mut due);
        }
        let crossed = tick.saturating_sub(self.last_tick) as u32;
        self.last_tick = tick;
        ClockFrame {
            position: PlayheadPosition::from_total_sixteenths(tick),
            sixteenths_crossed: crossed,
            due,
        }
    }
}
