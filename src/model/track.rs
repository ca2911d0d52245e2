use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::bar::Bar;
use super::events::{EventBus, ModelEvent};
use super::shared_seq::SharedSeq;
use crate::shared::{TrackId, next_track_id};

/// An append-only-growing run of bars plus a write cursor.
///
/// The cursor is the track's *write/transport* position: it is only ever
/// advanced from the audio callback during recording, or moved wholesale by a
/// seek. Playback reads are stateless — the engine owns the playback cursor
/// and passes it in, since every track shares one transport while playing.
pub struct Track {
    id: TrackId,
    name: String,
    samples_per_bar: usize,
    bars: SharedSeq<Bar>,
    position: AtomicU64,
    muted: AtomicBool,
    events: Arc<EventBus>,
}

impl Track {
    pub(crate) fn new(
        name: impl Into<String>,
        samples_per_bar: usize,
        events: Arc<EventBus>,
    ) -> Self {
        Track {
            id: next_track_id(),
            name: name.into(),
            samples_per_bar,
            bars: SharedSeq::new(),
            position: AtomicU64::new(0),
            muted: AtomicBool::new(false),
            events,
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn samples_per_bar(&self) -> usize {
        self.samples_per_bar
    }

    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Acquire)
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Release);
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    /// Snapshot of the bar sequence, for rendering and persistence.
    pub fn bars(&self) -> Vec<Arc<Bar>> {
        self.bars.snapshot()
    }

    /// Bar index a position falls into, or None when nothing has been
    /// recorded that far out. "Not recorded yet" is distinct from "silence
    /// inside a recorded bar".
    pub fn bar_index_at(&self, position: u64) -> Option<usize> {
        let index = (position / self.samples_per_bar as u64) as usize;
        if index >= self.bars.len() {
            None
        } else {
            Some(index)
        }
    }

    pub fn bar_at(&self, position: u64) -> Option<Arc<Bar>> {
        self.bar_index_at(position).and_then(|i| self.bars.get(i))
    }

    /// Read up to `requested_len` samples at `position`, never crossing a bar
    /// boundary: one bar lookup per call keeps the work bounded, and the
    /// caller re-issues at the advanced position when it got a short buffer.
    ///
    /// None means no bar exists there; a muted track or an unwritten stretch
    /// of an existing bar comes back as zeros of the full clipped length.
    pub fn read(&self, position: u64, requested_len: usize) -> Option<Vec<f32>> {
        let bar = self.bar_at(position)?;
        let offset = (position % self.samples_per_bar as u64) as usize;
        let len = requested_len.min(self.samples_per_bar - offset);

        let mut out = vec![0.0f32; len];
        if !self.is_muted() {
            bar.copy_into(offset, &mut out);
        }
        Some(out)
    }

    /// Write one quantum at the track's own cursor, splitting across the bar
    /// boundary and appending a bar when the cursor has reached the end of
    /// the sequence. False means a second bar could not be resolved even
    /// after a creation attempt (cursor seeked past the end of the timeline);
    /// the engine treats that as fatal to the recording.
    pub fn write(&self, samples: &[f32], count: usize) -> bool {
        let count = count.min(samples.len());
        if count == 0 {
            return true;
        }

        let position = self.position();
        let offset = (position % self.samples_per_bar as u64) as usize;
        let remaining = self.samples_per_bar - offset;
        let head = count.min(remaining);

        let bar = match self.bar_at(position) {
            Some(bar) => bar,
            None => self.add_bar(),
        };
        if bar.write(samples, 0, offset, head).is_err() {
            return false;
        }

        if count > remaining {
            let tail_position = position + remaining as u64;
            if self.bar_index_at(tail_position).is_none() {
                self.add_bar();
            }
            let Some(bar) = self.bar_at(tail_position) else {
                return false;
            };
            if bar.write(samples, head, 0, count - remaining).is_err() {
                return false;
            }
        }

        self.set_position(position + count as u64);
        true
    }

    /// Append a fresh silent bar.
    pub fn add_bar(&self) -> Arc<Bar> {
        let bar = Arc::new(Bar::new(
            self.samples_per_bar,
            self.id,
            self.bars.len(),
            self.events.clone(),
        ));
        let slot = self.bars.push(bar.clone());
        bar.set_slot(slot);
        self.events.emit(ModelEvent::BarAdded {
            track: self.id,
            bar: slot,
        });
        bar
    }

    /// Remove the bar at `index`; later bars shift down and are renumbered.
    pub fn remove_bar(&self, index: usize) -> bool {
        let Some(bar) = self.bars.remove(index) else {
            return false;
        };
        bar.reset();
        for (slot, bar) in self.bars.snapshot().iter().enumerate().skip(index) {
            bar.set_slot(slot);
        }
        self.events.emit(ModelEvent::BarRemoved {
            track: self.id,
            bar: index,
        });
        true
    }

    pub fn clear(&self) {
        while self.remove_bar(0) {}
    }

    /// Move the write cursor; notifies only on an actual change so a
    /// quantum-rate caller doesn't cause a notification storm.
    pub fn set_position(&self, position: u64) {
        let previous = self.position.swap(position, Ordering::AcqRel);
        if previous != position {
            self.events.emit(ModelEvent::TrackPosition {
                track: self.id,
                position,
            });
        }
    }

    /// Highest bar index holding recorded samples, None on a blank track.
    pub fn last_non_empty_bar_index(&self) -> Option<usize> {
        self.bars
            .snapshot()
            .iter()
            .enumerate()
            .rev()
            .find(|(_, bar)| !bar.is_empty())
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::events::UpdateKind;

    fn track(samples_per_bar: usize) -> (Track, crossbeam_channel::Receiver<ModelEvent>) {
        let events = EventBus::new();
        let rx = events.subscribe();
        (Track::new("test", samples_per_bar, events), rx)
    }

    #[test]
    fn write_splits_across_the_bar_boundary() {
        let (track, _rx) = track(4);
        assert!(track.write(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 6));

        assert_eq!(track.bar_count(), 2);
        let bars = track.bars();
        assert_eq!(bars[0].length(), 4);
        assert_eq!(bars[1].length(), 2);
        assert_eq!(track.position(), 6);

        assert_eq!(track.read(0, 4).unwrap(), [1.0, 2.0, 3.0, 4.0]);
        // second bar exists (created by the split), trailing half is silence
        assert_eq!(track.read(4, 4).unwrap(), [5.0, 6.0, 0.0, 0.0]);
    }

    #[test]
    fn boundary_split_from_mid_bar() {
        let (track, _rx) = track(8);
        assert!(track.write(&[0.1; 6], 6));
        assert!(track.write(&[0.2; 6], 6));

        assert_eq!(track.bar_count(), 2);
        assert_eq!(track.bars()[0].length(), 8);
        assert_eq!(track.bars()[1].length(), 4);
        assert_eq!(track.position(), 12);
    }

    #[test]
    fn read_never_crosses_a_bar_boundary() {
        let (track, _rx) = track(4);
        track.write(&[1.0; 8], 8);
        // asked for 16 from offset 2, clipped at the boundary
        assert_eq!(track.read(2, 16).unwrap().len(), 2);
    }

    #[test]
    fn read_reports_absence_past_the_last_bar() {
        let (track, _rx) = track(4);
        assert!(track.read(0, 4).is_none());
        track.write(&[1.0; 4], 4);
        assert!(track.read(4, 4).is_none());
        assert_eq!(track.bar_index_at(3), Some(0));
        assert_eq!(track.bar_index_at(4), None);
    }

    #[test]
    fn muted_track_reads_as_silence_of_full_length() {
        let (track, _rx) = track(4);
        track.write(&[1.0, 2.0, 3.0, 4.0], 4);
        track.set_muted(true);
        assert_eq!(track.read(0, 4).unwrap(), [0.0; 4]);
        track.set_muted(false);
        assert_eq!(track.read(0, 4).unwrap(), [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn unwritten_stretch_of_an_existing_bar_is_silence() {
        let (track, _rx) = track(8);
        track.write(&[1.0, 2.0], 2);
        assert_eq!(
            track.read(2, 6).unwrap(),
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn write_fails_when_cursor_is_seeked_past_the_timeline() {
        let (track, _rx) = track(4);
        // cursor lands one sample before a boundary two bars out; the tail
        // write cannot resolve a bar there even after one append
        track.set_position(11);
        assert!(!track.write(&[1.0, 2.0], 2));
    }

    #[test]
    fn position_notifications_coalesce() {
        let (track, rx) = track(4);
        track.set_position(10);
        track.set_position(10);
        track.set_position(11);

        let positions: Vec<_> = rx
            .try_iter()
            .filter_map(|e| match e {
                ModelEvent::TrackPosition { position, .. } => Some(position),
                _ => None,
            })
            .collect();
        assert_eq!(positions, [10, 11]);
    }

    #[test]
    fn remove_bar_renumbers_the_rest() {
        let (track, rx) = track(4);
        track.add_bar();
        let second = track.add_bar();
        track.add_bar();
        drop(rx);

        assert!(track.remove_bar(0));
        assert_eq!(second.slot(), 0);
        assert_eq!(track.bar_count(), 2);

        track.clear();
        assert_eq!(track.bar_count(), 0);
        assert!(!track.remove_bar(0));
    }

    #[test]
    fn last_non_empty_skips_silent_bars() {
        let (track, _rx) = track(4);
        assert_eq!(track.last_non_empty_bar_index(), None);
        track.write(&[1.0; 4], 4);
        track.add_bar();
        track.add_bar();
        assert_eq!(track.last_non_empty_bar_index(), Some(0));
        track.bars()[2].write(&[1.0], 0, 0, 1).unwrap();
        assert_eq!(track.last_non_empty_bar_index(), Some(2));
    }

    #[test]
    fn split_write_emits_partial_updates_for_both_bars() {
        let (track, rx) = track(4);
        track.write(&[1.0; 6], 6);

        let updates: Vec<_> = rx
            .try_iter()
            .filter_map(|e| match e {
                ModelEvent::BarUpdated { bar, kind, .. } => Some((bar, kind)),
                _ => None,
            })
            .collect();
        assert_eq!(updates, [(0, UpdateKind::Partial), (1, UpdateKind::Partial)]);
    }
}
