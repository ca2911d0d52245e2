// Saves and restores a session. Settings and track shapes go to a JSON file;
// each non-empty bar's raw samples go to a flat little-endian f32 file named
// after its track and bar index, so the model only has to expose enumeration
// and raw sample access.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::model::{EventBus, Song};

const BARLINE_DIR: &str = ".barline";
const PROJECT_FILE: &str = "project.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectFile {
    pub sample_rate: u32,
    pub beats_per_minute: u32,
    pub beats_per_bar: u32,
    pub samples_per_bar: usize,
    pub loop_begin_bar: Option<usize>,
    pub loop_end_bar: Option<usize>,
    pub tracks: Vec<TrackEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackEntry {
    pub name: String,
    pub muted: bool,
    pub bar_count: usize,
}

// <project_dir>/.barline/project.json
fn project_file_path(project_dir: &Path) -> PathBuf {
    project_dir.join(BARLINE_DIR).join(PROJECT_FILE)
}

fn bar_file_path(project_dir: &Path, track_index: usize, bar_index: usize) -> PathBuf {
    project_dir
        .join(BARLINE_DIR)
        .join(format!("bar-{track_index}-{bar_index}.raw"))
}

pub fn save_project(project_dir: &Path, song: &Song) -> anyhow::Result<()> {
    let dir = project_dir.join(BARLINE_DIR);
    std::fs::create_dir_all(&dir)?;

    // stale bar files from a previous shape of the song would resurrect on load
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with("bar-") {
            let _ = std::fs::remove_file(entry.path());
        }
    }

    let tracks = song.tracks();
    let file = ProjectFile {
        sample_rate: song.sample_rate(),
        beats_per_minute: song.beats_per_minute(),
        beats_per_bar: song.beats_per_bar(),
        samples_per_bar: song.samples_per_bar(),
        loop_begin_bar: song.loop_region().map(|r| r.begin_bar),
        loop_end_bar: song.loop_region().map(|r| r.end_bar),
        tracks: tracks
            .iter()
            .map(|t| TrackEntry {
                name: t.name().to_string(),
                muted: t.is_muted(),
                bar_count: t.bar_count(),
            })
            .collect(),
    };
    let json = serde_json::to_string_pretty(&file)?;
    std::fs::write(project_file_path(project_dir), json)?;

    for (track_index, track) in tracks.iter().enumerate() {
        for (bar_index, bar) in track.bars().iter().enumerate() {
            if bar.is_empty() {
                continue;
            }
            let samples = bar.snapshot();
            let mut bytes = Vec::with_capacity(samples.len() * 4);
            for s in &samples {
                bytes.extend_from_slice(&s.to_le_bytes());
            }
            std::fs::write(bar_file_path(project_dir, track_index, bar_index), bytes)?;
        }
    }

    Ok(())
}

/// Rebuild a song from a previously saved project; None when the directory
/// holds no loadable project.
pub fn load_project(project_dir: &Path, events: Arc<EventBus>) -> Option<Arc<Song>> {
    let data = std::fs::read_to_string(project_file_path(project_dir)).ok()?;
    let file: ProjectFile = serde_json::from_str(&data).ok()?;

    let song = Song::with_samples_per_bar(
        file.samples_per_bar,
        file.sample_rate,
        file.beats_per_minute,
        file.beats_per_bar,
        events,
    )
    .ok()?;

    if let (Some(begin), Some(end)) = (file.loop_begin_bar, file.loop_end_bar) {
        let _ = song.set_loop(begin, end);
    }

    for (track_index, entry) in file.tracks.iter().enumerate() {
        let track = song.add_track(entry.name.clone());
        track.set_muted(entry.muted);
        for bar_index in 0..entry.bar_count {
            let bar = track.add_bar();
            let Ok(bytes) = std::fs::read(bar_file_path(project_dir, track_index, bar_index))
            else {
                continue; // empty bars have no file
            };
            let samples: Vec<f32> = bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            if bar.replace(&samples).is_err() {
                eprintln!(
                    "barline: bar file {track_index}-{bar_index} larger than a bar, skipping"
                );
            }
        }
    }

    Some(song)
}

/// Additive mono mixdown of everything up to the last non-empty bar,
/// written as 32-bit float WAV.
pub fn export_wav(path: &Path, song: &Song) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: song.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec).context("failed to create wav")?;

    let spb = song.samples_per_bar() as u64;
    let end = (song.last_non_empty_bar_index() as u64 + 1) * spb;
    let tracks = song.tracks();

    let mut position = 0u64;
    while position < end {
        let want = (end - position).min(spb - position % spb) as usize;
        let mut mixed = vec![0.0f32; want];
        let mut audible = 0usize;
        for track in &tracks {
            let Some(samples) = track.read(position, want) else {
                continue;
            };
            for (acc, s) in mixed.iter_mut().zip(&samples) {
                *acc += s;
            }
            audible += 1;
        }
        if audible > 1 {
            let scale = 1.0 / audible as f32;
            for s in &mut mixed {
                *s *= scale;
            }
        }
        for s in &mixed {
            writer.write_sample(*s)?;
        }
        position += want as u64;
    }

    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn scratch_dir(tag: &str) -> PathBuf {
        static N: AtomicU64 = AtomicU64::new(0);
        let dir = std::env::temp_dir().join(format!(
            "barline-{tag}-{}-{}",
            std::process::id(),
            N.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn project_round_trips_through_disk() {
        let dir = scratch_dir("roundtrip");
        let song = Song::with_samples_per_bar(4, 8000, 90, 4, EventBus::new()).unwrap();
        let a = song.add_track("guitar");
        a.write(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 6);
        let b = song.add_track("voice");
        b.add_bar(); // stays empty
        b.set_muted(true);
        song.set_loop(0, 1).unwrap();

        save_project(&dir, &song).unwrap();
        let loaded = load_project(&dir, EventBus::new()).unwrap();

        assert_eq!(loaded.samples_per_bar(), 4);
        assert_eq!(loaded.beats_per_minute(), 90);
        assert_eq!(loaded.loop_region(), song.loop_region());

        let tracks = loaded.tracks();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].name(), "guitar");
        assert_eq!(tracks[0].bar_count(), 2);
        assert_eq!(tracks[0].read(0, 4).unwrap(), [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(tracks[0].read(4, 4).unwrap(), [5.0, 6.0, 0.0, 0.0]);
        assert_eq!(tracks[0].bars()[1].length(), 2);
        assert!(tracks[1].is_muted());
        assert!(tracks[1].bars()[0].is_empty());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_project_loads_as_none() {
        let dir = scratch_dir("missing");
        assert!(load_project(&dir, EventBus::new()).is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn save_clears_stale_bar_files() {
        let dir = scratch_dir("stale");
        let song = Song::with_samples_per_bar(4, 8000, 90, 4, EventBus::new()).unwrap();
        let track = song.add_track("t");
        track.write(&[1.0; 4], 4);
        save_project(&dir, &song).unwrap();

        track.bars()[0].reset();
        save_project(&dir, &song).unwrap();

        let loaded = load_project(&dir, EventBus::new()).unwrap();
        assert!(loaded.tracks()[0].bars()[0].is_empty());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn export_mixes_down_to_mono_wav() {
        let dir = scratch_dir("export");
        let song = Song::with_samples_per_bar(4, 8000, 90, 4, EventBus::new()).unwrap();
        let a = song.add_track("a");
        a.write(&[0.5; 4], 4);
        let b = song.add_track("b");
        b.write(&[0.25; 4], 4);

        let path = dir.join("mix.wav");
        export_wav(&path, &song).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 8000);
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, [0.375; 4]);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
