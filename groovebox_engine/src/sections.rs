//! Maps absolute bars to the arrangement's active section and the tracks
//! audible in it.

use groovebox_shared::arrangement::{Arrangement, Section, Track, BARS_PER_SECTION};

/// Sections are consumed in array order, 4 bars each. `None` past the last
/// section is the canonical end-of-arrangement signal.
pub fn section_at_bar(arrangement: &Arrangement, bar: u32) -> Option<&Section> {
    arrangement.sections.get((bar / BARS_PER_SECTION) as usize)
}

/// Tracks that actually sound at `bar`: listed in the section's enabled
/// set, not muted, and surviving the solo rule (soloing any track silences
/// every non-solo track, but never un-mutes an explicitly muted one).
pub fn enabled_tracks_at(arrangement: &Arrangement, bar: u32) -> Vec<&Track> {
    let Some(section) = section_at_bar(arrangement, bar) else {
        return Vec::new();
    };
    let any_solo = arrangement.has_solo();
    arrangement
        .tracks
        .iter()
        .filter(|t| section.enabled_track_ids.contains(&t.id))
        .filter(|t| !t.is_muted)
        .filter(|t| !any_solo || t.is_solo)
        .collect()
}
