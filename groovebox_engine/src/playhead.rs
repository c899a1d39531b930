//! Playhead position feed.
//!
//! A single-slot mailbox decouples the timing-critical tick from UI work:
//! the engine overwrites the slot on each sixteenth, the presentation
//! layer's own frame loop drains whatever is newest. Nothing ever blocks;
//! a slow consumer simply sees a later value.

use std::sync::{Arc, Mutex};

use groovebox_shared::position::PlayheadPosition;

pub fn playhead_channel() -> (PlayheadSender, PlayheadReceiver) {
    let slot = Arc::new(Mutex::new(None));
    (
        PlayheadSender { slot: slot.clone() },
        PlayheadReceiver { slot },
    )
}

#[derive(Clone)]
pub struct PlayheadSender {
    slot: Arc<Mutex<Option<PlayheadPosition>>>,
}

impl PlayheadSender {
    pub fn publish(&self, position: PlayheadPosition) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(position);
        }
    }
}

pub struct PlayheadReceiver {
    slot: Arc<Mutex<Option<PlayheadPosition>>>,
}

impl PlayheadReceiver {
    /// Take the newest published position, if any arrived since last drain.
    pub fn latest(&self) -> Option<PlayheadPosition> {
        match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receiver_sees_only_the_newest_value() {
        let (tx, rx) = playhead_channel();
        tx.publish(PlayheadPosition::bar_start(1));
        tx.publish(PlayheadPosition::bar_start(2));
        assert_eq!(rx.latest(), Some(PlayheadPosition::bar_start(2)));
        assert_eq!(rx.latest(), None);
    }

    #[test]
    fn empty_slot_yields_nothing() {
        let (_tx, rx) = playhead_channel();
        assert_eq!(rx.latest(), None);
    }
}
