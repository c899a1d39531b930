//! Lookahead window scheduling.
//!
//! Scheduling a trigger exactly at its fire time races against pump jitter
//! near the boundary, so the scheduler pre-registers a whole window of
//! near-future bars with the clock's own queue and relies on the registry
//! to suppress the duplicates that re-entrant window computation produces.

use groovebox_shared::arrangement::Arrangement;
use groovebox_shared::position::{LoopRegion, SIXTEENTHS_PER_BAR};

use crate::clock::{TransportClock, TriggerEvent};
use crate::patterns::{event_id, expand_bar};
use crate::registry::EventRegistry;
use crate::sections::{enabled_tracks_at, section_at_bar};

/// One full section of lookahead: small enough that transport commands take
/// effect within a bar, large enough to ride out pump jitter.
pub const LOOKAHEAD_BARS: u32 = 4;

#[derive(Debug, Default)]
pub struct LookaheadScheduler {
    registry: EventRegistry,
    loop_region: LoopRegion,
    /// Bar at which the next window must be opened. `None` right after a
    /// reset, so the first pass always opens one.
    next_boundary: Option<u32>,
    /// First bar with no content; reaching it ends the arrangement.
    end_bar: Option<u32>,
}

impl LookaheadScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loop_region(&self) -> LoopRegion {
        self.loop_region
    }

    pub fn set_loop(&mut self, region: LoopRegion) {
        self.loop_region = region;
        if region.enabled {
            // Looping never runs out of content.
            self.end_bar = None;
        }
    }

    /// Forget window and dedupe state; the loop region is a user setting
    /// and survives.
    pub fn reset(&mut self) {
        self.registry.clear();
        self.next_boundary = None;
        self.end_bar = None;
    }

    pub fn reached_end(&self, current_bar: u32) -> bool {
        self.end_bar.is_some_and(|end| current_bar >= end)
    }

    pub fn pending_events(&self) -> usize {
        self.registry.len()
    }

    /// One scheduling pass. Called on every sixteenth tick while playing
    /// (and once eagerly on play); opens a new window only when the
    /// playhead has reached the recorded boundary.
    pub fn run(&mut self, arrangement: &Arrangement, clock: &mut dyn TransportClock) {
        let now = clock.position().total_sixteenths();
        let current_bar = (now / SIXTEENTHS_PER_BAR as u64) as u32;
        if let Some(boundary) = self.next_boundary {
            if current_bar < boundary {
                return;
            }
        }

        for bar in current_bar..current_bar + LOOKAHEAD_BARS {
            let content_bar = self.loop_region.content_bar(bar);
            if section_at_bar(arrangement, content_bar).is_none() {
                if !self.loop_region.enabled && self.end_bar.is_none() {
                    self.end_bar = Some(bar);
                }
                continue;
            }
            for track in enabled_tracks_at(arrangement, content_bar) {
                for trigger in expand_bar(track, content_bar, arrangement.tempo) {
                    let fire_at =
                        bar as u64 * SIXTEENTHS_PER_BAR as u64 + trigger.offset_sixteenths() as u64;
                    if fire_at < now {
                        // Windows never overlap the already-elapsed timeline.
                        continue;
                    }
                    let id = event_id(&track.id, bar, trigger.sub_index);
                    if self.registry.try_register(&id, bar) {
                        log::trace!(target: "scheduler", "register {id} at sixteenth {fire_at}");
                        clock.schedule_at(
                            fire_at,
                            TriggerEvent {
                                event_id: id,
                                track_id: track.id.clone(),
                                note: trigger.note,
                            },
                        );
                    }
                }
            }
        }

        self.next_boundary = Some(current_bar + LOOKAHEAD_BARS);
        self.registry.purge_before(current_bar);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use groovebox_shared::arrangement::{Instrument, Section, Track};
    use groovebox_shared::position::PlayheadPosition;

    fn clip_track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            name: id.to_string(),
            volume: 0.8,
            is_muted: false,
            is_solo: false,
            instrument: Instrument::Clip {
                sample_url: format!("{id}.wav"),
                sample_tempo_bpm: 125.0,
            },
        }
    }

    fn arrangement(section_count: usize) -> Arrangement {
        Arrangement {
            tempo: 125.0,
            tracks: vec![clip_track("kick")],
            sections: (0..section_count)
                .map(|i| Section {
                    id: format!("section-{i}"),
                    name: format!("Section {i}"),
                    enabled_track_ids: ["kick".to_string()].into_iter().collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn first_pass_opens_a_full_window() {
        let (mut clock, _handle) = FakeClock::new(125.0);
        let mut scheduler = LookaheadScheduler::new();
        let arr = arrangement(3);

        scheduler.run(&arr, &mut clock);

        // One clip trigger per bar over bars 0..4.
        assert_eq!(scheduler.pending_events(), 4);
    }

    #[test]
    fn reentrant_passes_do_not_duplicate() {
        let (mut clock, _handle) = FakeClock::new(125.0);
        let mut scheduler = LookaheadScheduler::new();
        let arr = arrangement(3);

        scheduler.run(&arr, &mut clock);
        let after_first = scheduler.pending_events();
        // Window boundary not reached yet: these are the re-entrant ticks.
        scheduler.run(&arr, &mut clock);
        scheduler.run(&arr, &mut clock);
        assert_eq!(scheduler.pending_events(), after_first);
    }

    #[test]
    fn end_bar_is_found_past_the_last_section() {
        let (mut clock, handle) = FakeClock::new(125.0);
        let mut scheduler = LookaheadScheduler::new();
        let arr = arrangement(3);

        clock.start();
        scheduler.run(&arr, &mut clock);
        assert!(!scheduler.reached_end(0));

        // Walk to bar 8; the window [8, 12) still has content, [12..) none.
        handle.advance_bars(8);
        clock.advance();
        scheduler.run(&arr, &mut clock);
        assert!(!scheduler.reached_end(11));

        handle.advance_bars(4);
        clock.advance();
        scheduler.run(&arr, &mut clock);
        assert!(scheduler.reached_end(12));
    }

    #[test]
    fn loop_region_suppresses_the_end() {
        let (mut clock, handle) = FakeClock::new(125.0);
        let mut scheduler = LookaheadScheduler::new();
        let arr = arrangement(2);
        scheduler.set_loop(LoopRegion::new(true, 0, 8).unwrap());

        clock.start();
        scheduler.run(&arr, &mut clock);
        for _ in 0..6 {
            handle.advance_bars(4);
            clock.advance();
            scheduler.run(&arr, &mut clock);
        }
        assert!(!scheduler.reached_end(24));
        assert!(scheduler.pending_events() > 0);
    }

    #[test]
    fn elapsed_sixteenths_are_never_scheduled() {
        let (mut clock, _handle) = FakeClock::new(125.0);
        let mut scheduler = LookaheadScheduler::new();
        let mut arr = arrangement(3);
        arr.tracks[0].instrument = Instrument::StepSequencer {
            pattern: vec![true; 16],
            sample_url: "kick.wav".into(),
        };

        // Start mid-bar: beat 2 of bar 0.
        clock.seek(PlayheadPosition::new(0, 2, 0).unwrap());
        scheduler.run(&arr, &mut clock);

        // Bar 0 contributes only its remaining 8 sixteenths.
        let bar0 = 8;
        let later_bars = 3 * 16;
        assert_eq!(scheduler.pending_events(), bar0 + later_bars);
    }

    #[test]
    fn reset_clears_dedupe_but_keeps_loop() {
        let (mut clock, _handle) = FakeClock::new(125.0);
        let mut scheduler = LookaheadScheduler::new();
        let arr = arrangement(3);
        scheduler.set_loop(LoopRegion::new(true, 4, 8).unwrap());

        scheduler.run(&arr, &mut clock);
        scheduler.reset();
        assert_eq!(scheduler.pending_events(), 0);
        assert!(scheduler.loop_region().enabled);
    }
}
