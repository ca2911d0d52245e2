// Change notifications. The original design had per-object broadcast events
// wired straight into the UI; here the model pushes change records into
// channels instead, and whoever cares (the TUI, tests) subscribes. Nothing in
// the model assumes a single observer or any thread marshalling.

use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::shared::TrackId;

// Enough backlog that a busy recording pass doesn't starve a slow redraw
// loop; when it does overflow we drop events, never block the audio callback.
const SUBSCRIBER_BACKLOG: usize = 1024;

/// Whether a bar notification covers the whole bar or just a written slice,
/// so observers can redraw incrementally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateKind {
    Partial,
    Full,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelEvent {
    BarAdded { track: TrackId, bar: usize },
    BarUpdated { track: TrackId, bar: usize, kind: UpdateKind },
    BarRemoved { track: TrackId, bar: usize },
    TrackAdded { track: TrackId },
    TrackRemoved { track: TrackId },
    TrackPosition { track: TrackId, position: u64 },
    SongPosition { position: u64 },
}

pub struct EventBus {
    subscribers: Mutex<Vec<Sender<ModelEvent>>>,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(EventBus {
            subscribers: Mutex::new(Vec::new()),
        })
    }

    pub fn subscribe(&self) -> Receiver<ModelEvent> {
        let (tx, rx) = crossbeam_channel::bounded(SUBSCRIBER_BACKLOG);
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Deliver an event to every live subscriber. Full channels lose the
    /// event (redraws are advisory); dropped receivers are pruned.
    pub fn emit(&self, event: ModelEvent) {
        let mut subs = self.subscribers.lock().unwrap();
        subs.retain(|tx| !matches!(tx.try_send(event), Err(TrySendError::Disconnected(_))));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::next_track_id;

    #[test]
    fn fans_out_to_every_subscriber() {
        let bus = EventBus::new();
        let rx1 = bus.subscribe();
        let rx2 = bus.subscribe();

        let track = next_track_id();
        bus.emit(ModelEvent::TrackAdded { track });

        assert_eq!(rx1.try_recv().unwrap(), ModelEvent::TrackAdded { track });
        assert_eq!(rx2.try_recv().unwrap(), ModelEvent::TrackAdded { track });
    }

    #[test]
    fn prunes_dropped_subscribers() {
        let bus = EventBus::new();
        let rx1 = bus.subscribe();
        let rx2 = bus.subscribe();
        drop(rx1);

        let track = next_track_id();
        bus.emit(ModelEvent::TrackRemoved { track });
        bus.emit(ModelEvent::TrackRemoved { track });

        assert_eq!(rx2.iter().take(2).count(), 2);
        assert_eq!(bus.subscribers.lock().unwrap().len(), 1);
    }
}
