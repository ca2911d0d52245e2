use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::error::ModelError;
use super::events::{EventBus, ModelEvent, UpdateKind};
use crate::shared::TrackId;

/// One fixed-capacity segment of a track's timeline, sized to hold a musical
/// bar's worth of mono samples. `length` counts the samples actually written;
/// everything past it is silence, and the buffer past `length` is kept zeroed
/// so reads never have to consult `length` per sample.
pub struct Bar {
    capacity: usize,
    track: TrackId,
    // which slot this bar occupies in its track; renumbered on bar removal
    slot: AtomicUsize,
    state: Mutex<BarState>,
    events: Arc<EventBus>,
}

struct BarState {
    buffer: Vec<f32>,
    length: usize,
}

impl Bar {
    pub(crate) fn new(
        capacity: usize,
        track: TrackId,
        slot: usize,
        events: Arc<EventBus>,
    ) -> Self {
        Bar {
            capacity,
            track,
            slot: AtomicUsize::new(slot),
            state: Mutex::new(BarState {
                buffer: vec![0.0; capacity],
                length: 0,
            }),
            events,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn length(&self) -> usize {
        self.state.lock().unwrap().length
    }

    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    pub fn slot(&self) -> usize {
        self.slot.load(Ordering::Acquire)
    }

    pub(crate) fn set_slot(&self, slot: usize) {
        self.slot.store(slot, Ordering::Release);
    }

    /// Copy `len` samples from `source[source_offset..]` into the bar at
    /// `dest_offset`. Refused outright when either range doesn't fit.
    pub fn write(
        &self,
        source: &[f32],
        source_offset: usize,
        dest_offset: usize,
        len: usize,
    ) -> Result<(), ModelError> {
        if dest_offset + len > self.capacity {
            return Err(ModelError::DestRange {
                offset: dest_offset,
                len,
                capacity: self.capacity,
            });
        }
        if source_offset + len > source.len() {
            return Err(ModelError::SourceRange {
                offset: source_offset,
                len,
                available: source.len(),
            });
        }

        {
            let mut state = self.state.lock().unwrap();
            state.buffer[dest_offset..dest_offset + len]
                .copy_from_slice(&source[source_offset..source_offset + len]);
            state.length = state.length.max(dest_offset + len);
        }
        self.emit_update(UpdateKind::Partial);
        Ok(())
    }

    /// Replace the whole bar (paste). Shorter content zeroes the tail so the
    /// buffer-past-length invariant holds.
    pub fn replace(&self, buffer: &[f32]) -> Result<(), ModelError> {
        if buffer.len() > self.capacity {
            return Err(ModelError::DestRange {
                offset: 0,
                len: buffer.len(),
                capacity: self.capacity,
            });
        }

        {
            let mut state = self.state.lock().unwrap();
            state.buffer[..buffer.len()].copy_from_slice(buffer);
            state.buffer[buffer.len()..].fill(0.0);
            state.length = buffer.len();
        }
        self.emit_update(UpdateKind::Full);
        Ok(())
    }

    /// Clear back to silence (delete).
    pub fn reset(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.buffer.fill(0.0);
            state.length = 0;
        }
        self.emit_update(UpdateKind::Full);
    }

    /// Copy samples starting at `offset` into `out`. Anything past the
    /// recorded length comes out as silence.
    pub fn copy_into(&self, offset: usize, out: &mut [f32]) {
        let state = self.state.lock().unwrap();
        let end = (offset + out.len()).min(self.capacity);
        if offset < end {
            out[..end - offset].copy_from_slice(&state.buffer[offset..end]);
        }
    }

    /// Full copy of the recorded samples, for persistence and the clipboard.
    pub fn snapshot(&self) -> Vec<f32> {
        let state = self.state.lock().unwrap();
        state.buffer[..state.length].to_vec()
    }

    fn emit_update(&self, kind: UpdateKind) {
        self.events.emit(ModelEvent::BarUpdated {
            track: self.track,
            bar: self.slot(),
            kind,
        });
    }
}
