// Types that cross layer boundaries: identities, transport state, and the
// input events the UI resolves key presses into.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TrackId(pub u64);

// atomic counter so ids stay unique no matter which thread creates a track
pub fn next_track_id() -> TrackId {
    TrackId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// What the audio engine is doing right now. Only Stopped can transition
/// into Recording or Playing; anything else goes back through Stopped first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportStatus {
    Stopped,
    Recording,
    Playing,
}

impl TransportStatus {
    pub fn as_u8(self) -> u8 {
        match self {
            TransportStatus::Stopped => 0,
            TransportStatus::Recording => 1,
            TransportStatus::Playing => 2,
        }
    }

    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => TransportStatus::Recording,
            2 => TransportStatus::Playing,
            _ => TransportStatus::Stopped,
        }
    }
}

/// Shared cell so the UI thread can read the state the audio callback last
/// published without touching the command channel.
pub struct SharedStatus(AtomicU8);

impl SharedStatus {
    pub fn new() -> Self {
        SharedStatus(AtomicU8::new(TransportStatus::Stopped.as_u8()))
    }

    pub fn set(&self, status: TransportStatus) {
        self.0.store(status.as_u8(), Ordering::Release);
    }

    pub fn get(&self) -> TransportStatus {
        TransportStatus::from_u8(self.0.load(Ordering::Acquire))
    }
}

impl Default for SharedStatus {
    fn default() -> Self {
        Self::new()
    }
}

// Semantic events the TUI emits; main.rs turns these into model calls or
// engine commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiEvent {
    TogglePlay,
    ToggleRecord,
    SelectPrevTrack,
    SelectNextTrack,
    SeekBack,
    SeekForward,
    ToggleMute,
    NewTrack,
    DeleteTrack,
    SetLoopBegin,
    SetLoopEnd,
    ClearLoop,
    ClearBar,
    CopyBar,
    PasteBar,
    ToggleMetronome,
    Save,
    Export,
    Quit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_ids_are_unique() {
        let a = next_track_id();
        let b = next_track_id();
        assert_ne!(a, b);
    }

    #[test]
    fn status_round_trips_through_u8() {
        for s in [
            TransportStatus::Stopped,
            TransportStatus::Recording,
            TransportStatus::Playing,
        ] {
            assert_eq!(TransportStatus::from_u8(s.as_u8()), s);
        }
    }
}
