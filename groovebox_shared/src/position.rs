use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Fixed 4/4 time signature: 1 bar = 4 beats = 16 sixteenths.
pub const BEATS_PER_BAR: u32 = 4;
pub const SIXTEENTHS_PER_BEAT: u32 = 4;
pub const SIXTEENTHS_PER_BAR: u32 = BEATS_PER_BAR * SIXTEENTHS_PER_BEAT;

/// Musical position reported to observers, always non-negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayheadPosition {
    pub bars: u32,
    pub beats: u32,
    pub sixteenths: u32,
}

impl PlayheadPosition {
    /// Validated constructor: beats and sixteenths must fit the bar grid.
    pub fn new(bars: u32, beats: u32, sixteenths: u32) -> Result<Self, EngineError> {
        if beats >= BEATS_PER_BAR || sixteenths >= SIXTEENTHS_PER_BEAT {
            return Err(EngineError::InvalidSeekTarget {
                bars,
                beats,
                sixteenths,
            });
        }
        Ok(Self {
            bars,
            beats,
            sixteenths,
        })
    }

    pub fn bar_start(bar: u32) -> Self {
        Self {
            bars: bar,
            beats: 0,
            sixteenths: 0,
        }
    }

    pub fn from_total_sixteenths(total: u64) -> Self {
        let bars = (total / SIXTEENTHS_PER_BAR as u64) as u32;
        let rem = (total % SIXTEENTHS_PER_BAR as u64) as u32;
        Self {
            bars,
            beats: rem / SIXTEENTHS_PER_BEAT,
            sixteenths: rem % SIXTEENTHS_PER_BEAT,
        }
    }

    pub fn total_sixteenths(&self) -> u64 {
        self.bars as u64 * SIXTEENTHS_PER_BAR as u64
            + self.beats as u64 * SIXTEENTHS_PER_BEAT as u64
            + self.sixteenths as u64
    }
}

impl std::fmt::Display for PlayheadPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.bars, self.beats, self.sixteenths)
    }
}

/// Loop region over whole bars. When enabled, scheduling bars at or past
/// `end_bar` are remapped into `[start_bar, end_bar)` before content
/// resolution; the real timeline keeps counting up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopRegion {
    pub enabled: bool,
    pub start_bar: u32,
    pub end_bar: u32,
}

impl LoopRegion {
    pub fn new(enabled: bool, start_bar: u32, end_bar: u32) -> Result<Self, EngineError> {
        if enabled && start_bar >= end_bar {
            return Err(EngineError::InvalidLoopRegion { start_bar, end_bar });
        }
        Ok(Self {
            enabled,
            start_bar,
            end_bar,
        })
    }

    /// Map a scheduling bar to the content bar that actually plays.
    /// Bars before the region are untouched so an intro still plays through.
    pub fn content_bar(&self, bar: u32) -> u32 {
        if !self.enabled || bar < self.end_bar {
            return bar;
        }
        let span = self.end_bar - self.start_bar;
        self.start_bar + (bar - self.start_bar) % span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_round_trips_through_sixteenths() {
        let pos = PlayheadPosition::new(3, 2, 1).unwrap();
        assert_eq!(pos.total_sixteenths(), 3 * 16 + 2 * 4 + 1);
        assert_eq!(PlayheadPosition::from_total_sixteenths(57), pos);
    }

    #[test]
    fn position_rejects_off_grid_targets() {
        assert!(PlayheadPosition::new(0, 4, 0).is_err());
        assert!(PlayheadPosition::new(0, 0, 4).is_err());
        assert!(PlayheadPosition::new(100, 3, 3).is_ok());
    }

    #[test]
    fn position_displays_transport_style() {
        assert_eq!(PlayheadPosition::bar_start(7).to_string(), "7:0:0");
    }

    #[test]
    fn loop_region_remaps_past_the_end() {
        let region = LoopRegion::new(true, 4, 8).unwrap();
        // Scheduling bar 9 plays content bar 4 + (9 - 4) % 4 = 5.
        assert_eq!(region.content_bar(9), 5);
        assert_eq!(region.content_bar(8), 4);
        assert_eq!(region.content_bar(12), 4);
    }

    #[test]
    fn loop_region_leaves_earlier_bars_alone() {
        let region = LoopRegion::new(true, 4, 8).unwrap();
        assert_eq!(region.content_bar(0), 0);
        assert_eq!(region.content_bar(7), 7);
    }

    #[test]
    fn disabled_region_is_identity() {
        let region = LoopRegion::default();
        assert_eq!(region.content_bar(42), 42);
    }

    #[test]
    fn degenerate_region_is_rejected() {
        assert!(LoopRegion::new(true, 8, 8).is_err());
        assert!(LoopRegion::new(true, 9, 4).is_err());
        // Disabled regions are never validated against their bounds.
        assert!(LoopRegion::new(false, 9, 4).is_ok());
    }
}
