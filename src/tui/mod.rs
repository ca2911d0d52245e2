pub mod input;
pub mod view;

use std::sync::Arc;
use std::time::Duration;

use crate::model::{LoopRegion, Song};
use crate::shared::TransportStatus;

/// State local to the UI: which track the cursor is on, the bar clipboard,
/// a one-line status message. Everything audible lives in the model.
pub struct TuiState {
    pub selected: usize,
    pub clipboard: Option<Vec<f32>>,
    pub metronome_on: bool,
    pub message: Option<String>,
}

impl Default for TuiState {
    fn default() -> Self {
        TuiState {
            selected: 0,
            clipboard: None,
            metronome_on: true,
            message: None,
        }
    }
}

/// Snapshot of everything the renderer needs for one frame, gathered up
/// front so drawing never touches a model lock.
pub struct ViewModel {
    pub status: TransportStatus,
    pub elapsed: Duration,
    pub current_bar: usize,
    pub loop_region: Option<LoopRegion>,
    pub metronome_on: bool,
    pub selected: usize,
    pub tracks: Vec<TrackRow>,
    pub message: Option<String>,
}

pub struct TrackRow {
    pub name: String,
    pub muted: bool,
    pub bars: Vec<BarCell>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum BarCell {
    Empty,
    Partial,
    Full,
}

impl ViewModel {
    pub fn gather(song: &Arc<Song>, status: TransportStatus, ts: &TuiState) -> Self {
        let tracks = song
            .tracks()
            .iter()
            .map(|track| TrackRow {
                name: track.name().to_string(),
                muted: track.is_muted(),
                bars: track
                    .bars()
                    .iter()
                    .map(|bar| {
                        if bar.is_empty() {
                            BarCell::Empty
                        } else if bar.length() < bar.capacity() {
                            BarCell::Partial
                        } else {
                            BarCell::Full
                        }
                    })
                    .collect(),
            })
            .collect();

        ViewModel {
            status,
            elapsed: song.elapsed_time(),
            current_bar: song.current_bar(),
            loop_region: song.loop_region(),
            metronome_on: ts.metronome_on,
            selected: ts.selected,
            tracks,
            message: ts.message.clone(),
        }
    }
}
