use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::error::ModelError;
use super::events::{EventBus, ModelEvent};
use super::shared_seq::SharedSeq;
use super::track::Track;
use crate::shared::TrackId;

/// Inclusive bar-index range the playback engine should repeat. Pure data:
/// deciding *when* to wrap is the engine's job, consulted once per quantum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopRegion {
    pub begin_bar: usize,
    pub end_bar: usize,
}

/// The whole session: tempo, tracks, loop region, and the aggregated
/// transport position (minimum over track cursors, so a track that hasn't
/// started doesn't drag the reported position ahead).
pub struct Song {
    sample_rate: u32,
    beats_per_minute: u32,
    beats_per_bar: u32,
    samples_per_bar: usize,
    tracks: SharedSeq<Track>,
    loop_region: Mutex<Option<LoopRegion>>,
    position: AtomicU64,
    events: Arc<EventBus>,
    track_sequence: AtomicU64,
}

impl Song {
    /// samples-per-bar is derived once from the hardware rate and tempo and
    /// shared by every track for the life of the session.
    pub fn new(
        sample_rate: u32,
        beats_per_minute: u32,
        beats_per_bar: u32,
        events: Arc<EventBus>,
    ) -> Result<Arc<Self>, ModelError> {
        let samples_per_bar = if beats_per_minute == 0 {
            0
        } else {
            sample_rate as u64 * 60 * beats_per_bar as u64 / beats_per_minute as u64
        };
        Self::with_samples_per_bar(
            samples_per_bar as usize,
            sample_rate,
            beats_per_minute,
            beats_per_bar,
            events,
        )
    }

    /// Constructor used by the loader (and tests) when samples-per-bar is
    /// already known and must match previously recorded bars exactly.
    pub fn with_samples_per_bar(
        samples_per_bar: usize,
        sample_rate: u32,
        beats_per_minute: u32,
        beats_per_bar: u32,
        events: Arc<EventBus>,
    ) -> Result<Arc<Self>, ModelError> {
        if samples_per_bar == 0 || beats_per_minute == 0 || beats_per_bar == 0 {
            return Err(ModelError::ZeroSamplesPerBar(samples_per_bar as u64));
        }
        Ok(Arc::new(Song {
            sample_rate,
            beats_per_minute,
            beats_per_bar,
            samples_per_bar,
            tracks: SharedSeq::new(),
            loop_region: Mutex::new(None),
            position: AtomicU64::new(0),
            events,
            track_sequence: AtomicU64::new(0),
        }))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn beats_per_minute(&self) -> u32 {
        self.beats_per_minute
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.beats_per_bar
    }

    pub fn samples_per_bar(&self) -> usize {
        self.samples_per_bar
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn add_track(&self, name: impl Into<String>) -> Arc<Track> {
        let track = Arc::new(Track::new(name, self.samples_per_bar, self.events.clone()));
        self.tracks.push(track.clone());
        self.events.emit(ModelEvent::TrackAdded { track: track.id() });
        track
    }

    /// "Track 1", "Track 2", ... for tracks the user didn't name.
    pub fn next_track_name(&self) -> String {
        let n = self.track_sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("Track {n}")
    }

    pub fn remove_track(&self, id: TrackId) -> bool {
        let Some(index) = self.tracks.position(|t| t.id() == id) else {
            return false;
        };
        let Some(track) = self.tracks.remove(index) else {
            return false;
        };
        track.clear();
        self.events.emit(ModelEvent::TrackRemoved { track: id });
        self.calculate_position();
        true
    }

    pub fn track(&self, id: TrackId) -> Option<Arc<Track>> {
        self.tracks.snapshot().into_iter().find(|t| t.id() == id)
    }

    pub fn tracks(&self) -> Vec<Arc<Track>> {
        self.tracks.snapshot()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Where recorded content ends, as the highest non-empty bar index over
    /// all tracks. An entirely empty song reports 0.
    pub fn last_non_empty_bar_index(&self) -> usize {
        self.tracks
            .snapshot()
            .iter()
            .filter_map(|t| t.last_non_empty_bar_index())
            .max()
            .unwrap_or(0)
    }

    /// Recompute the aggregate position from the track cursors. Called by
    /// the engine after each quantum batch rather than by intra-model
    /// subscription; the notification coalesces.
    pub fn calculate_position(&self) -> u64 {
        let position = self
            .tracks
            .snapshot()
            .iter()
            .map(|t| t.position())
            .min()
            .unwrap_or(0);
        let previous = self.position.swap(position, Ordering::AcqRel);
        if previous != position {
            self.events.emit(ModelEvent::SongPosition { position });
        }
        position
    }

    /// Seek: broadcast one absolute position to every track cursor.
    pub fn set_position(&self, position: u64) {
        for track in self.tracks.snapshot() {
            track.set_position(position);
        }
        let previous = self.position.swap(position, Ordering::AcqRel);
        if previous != position {
            self.events.emit(ModelEvent::SongPosition { position });
        }
    }

    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Acquire)
    }

    pub fn current_bar(&self) -> usize {
        (self.position() / self.samples_per_bar as u64) as usize
    }

    /// Bar-granularity elapsed time. Deliberately not sample-accurate: the
    /// UI counts in musical bars, matching the timeline it draws.
    pub fn elapsed_time(&self) -> Duration {
        let seconds_per_bar = 60.0 * self.beats_per_bar as f64 / self.beats_per_minute as f64;
        Duration::from_secs_f64(self.current_bar() as f64 * seconds_per_bar)
    }

    pub fn set_loop(&self, begin_bar: usize, end_bar: usize) -> Result<(), ModelError> {
        if begin_bar > end_bar {
            return Err(ModelError::LoopBounds {
                begin: begin_bar,
                end: end_bar,
            });
        }
        *self.loop_region.lock().unwrap() = Some(LoopRegion { begin_bar, end_bar });
        Ok(())
    }

    pub fn clear_loop(&self) {
        *self.loop_region.lock().unwrap() = None;
    }

    pub fn loop_region(&self) -> Option<LoopRegion> {
        *self.loop_region.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(samples_per_bar: usize) -> (Arc<Song>, crossbeam_channel::Receiver<ModelEvent>) {
        let events = EventBus::new();
        let rx = events.subscribe();
        let song = Song::with_samples_per_bar(samples_per_bar, 44100, 120, 4, events).unwrap();
        (song, rx)
    }

    #[test]
    fn samples_per_bar_is_derived_from_tempo() {
        let song = Song::new(44100, 120, 4, EventBus::new()).unwrap();
        // 2 seconds per bar at 120 bpm, 4 beats
        assert_eq!(song.samples_per_bar(), 88200);
    }

    #[test]
    fn rejects_degenerate_configuration() {
        assert!(Song::new(44100, 0, 4, EventBus::new()).is_err());
        assert!(Song::new(44100, 120, 0, EventBus::new()).is_err());
        assert!(Song::new(0, 120, 4, EventBus::new()).is_err());
        assert!(Song::with_samples_per_bar(0, 44100, 120, 4, EventBus::new()).is_err());
    }

    #[test]
    fn aggregate_position_is_the_minimum_track_cursor() {
        let (song, _rx) = song(16);
        for position in [120, 300, 50] {
            let track = song.add_track(song.next_track_name());
            track.set_position(position);
        }
        assert_eq!(song.calculate_position(), 50);
        assert_eq!(song.position(), 50);
    }

    #[test]
    fn aggregate_position_notification_coalesces() {
        let (song, rx) = song(16);
        let track = song.add_track("t");
        track.set_position(32);
        while rx.try_recv().is_ok() {}

        song.calculate_position();
        song.calculate_position();

        let song_events = rx
            .try_iter()
            .filter(|e| matches!(e, ModelEvent::SongPosition { .. }))
            .count();
        assert_eq!(song_events, 1);
    }

    #[test]
    fn set_position_broadcasts_to_every_track() {
        let (song, _rx) = song(16);
        let a = song.add_track("a");
        let b = song.add_track("b");
        a.set_position(99);

        song.set_position(32);
        assert_eq!(a.position(), 32);
        assert_eq!(b.position(), 32);
        assert_eq!(song.current_bar(), 2);
    }

    #[test]
    fn last_non_empty_is_the_max_over_tracks() {
        let (song, _rx) = song(4);
        assert_eq!(song.last_non_empty_bar_index(), 0);

        for highest in [0usize, 3, 2] {
            let track = song.add_track(song.next_track_name());
            for _ in 0..=highest {
                track.add_bar();
            }
            track.bars()[highest].write(&[1.0], 0, 0, 1).unwrap();
        }
        assert_eq!(song.last_non_empty_bar_index(), 3);
    }

    #[test]
    fn remove_track_clears_its_bars_first() {
        let (song, _rx) = song(4);
        let track = song.add_track("t");
        track.write(&[1.0; 4], 4);
        let id = track.id();

        assert!(song.remove_track(id));
        assert_eq!(track.bar_count(), 0);
        assert_eq!(song.track_count(), 0);
        assert!(!song.remove_track(id));
    }

    #[test]
    fn loop_region_rejects_inverted_bounds() {
        let (song, _rx) = song(4);
        assert_eq!(
            song.set_loop(3, 1),
            Err(ModelError::LoopBounds { begin: 3, end: 1 })
        );
        song.set_loop(1, 3).unwrap();
        assert_eq!(
            song.loop_region(),
            Some(LoopRegion {
                begin_bar: 1,
                end_bar: 3
            })
        );
        song.clear_loop();
        assert_eq!(song.loop_region(), None);
    }

    #[test]
    fn elapsed_time_counts_whole_bars() {
        let (song, _rx) = song(100);
        let track = song.add_track("t");
        // 120 bpm in 4/4 is 2 seconds per bar
        track.set_position(250);
        song.calculate_position();
        assert_eq!(song.current_bar(), 2);
        assert_eq!(song.elapsed_time(), Duration::from_secs(4));
    }
}
