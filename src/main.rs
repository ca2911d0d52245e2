mod audio;
mod model;
mod pipeline;
mod shared;
mod tui;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::terminal;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use audio::{AudioHandle, EngineCommand};
use model::{EventBus, Song};
use pipeline::persistence;
use shared::{TransportStatus, UiEvent};
use tui::{TuiState, ViewModel};

const SAMPLE_RATE: u32 = 44100;
const DEFAULT_BPM: u32 = 90;
const DEFAULT_BEATS_PER_BAR: u32 = 4;

const TICK: Duration = Duration::from_millis(16);
const HEARTBEAT: Duration = Duration::from_millis(250);

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    terminal::enable_raw_mode()?;
    let _guard = RawModeGuard; // auto drops when out of scope

    let project_dir: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    let events = EventBus::new();
    // subscribed before the song exists so no structural event is missed
    let model_rx = events.subscribe();

    let song = match persistence::load_project(&project_dir, events.clone()) {
        Some(song) => song,
        None => Song::new(SAMPLE_RATE, DEFAULT_BPM, DEFAULT_BEATS_PER_BAR, events.clone())?,
    };

    let audio = audio::start_audio(song.clone())?;

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let mut ts = TuiState::default();
    let mut dirty = true;
    let mut last_draw = Instant::now();
    let mut last_status = audio.status();

    loop {
        // model notifications drive redraws; the heartbeat catches anything
        // delivery-coalescing hid (and keeps the clock moving while playing)
        while model_rx.try_recv().is_ok() {
            dirty = true;
        }
        let status = audio.status();
        if status != last_status {
            last_status = status;
            dirty = true;
        }

        if dirty || last_draw.elapsed() >= HEARTBEAT {
            let vm = ViewModel::gather(&song, status, &ts);
            term.draw(|frame| {
                tui::view::render(frame, frame.area(), &vm);
            })?;
            dirty = false;
            last_draw = Instant::now();
        }

        for event in tui::input::poll_input(TICK)? {
            dirty = true;
            if handle_ui_event(event, &song, &audio, &mut ts, &project_dir)? {
                let _ = persistence::save_project(&project_dir, &song);
                drop(term);
                drop(audio);
                return Ok(());
            }
        }
    }
}

/// Turn a UI event into model calls or engine commands. Returns true on quit.
fn handle_ui_event(
    event: UiEvent,
    song: &Arc<Song>,
    audio: &AudioHandle,
    ts: &mut TuiState,
    project_dir: &Path,
) -> anyhow::Result<bool> {
    ts.message = None;
    match event {
        UiEvent::Quit => return Ok(true),

        UiEvent::TogglePlay => {
            if audio.status() == TransportStatus::Stopped {
                let spb = song.samples_per_bar() as u64;
                let end = (song.last_non_empty_bar_index() as u64 + 1) * spb;
                // replay from the top once the transport ran off the end
                let from = if song.position() >= end { 0 } else { song.position() };
                audio.send(EngineCommand::Play { from });
            } else {
                audio.send(EngineCommand::Stop);
            }
        }

        UiEvent::ToggleRecord => {
            if audio.status() == TransportStatus::Stopped {
                let track = song.add_track(song.next_track_name());
                ts.selected = song.track_count().saturating_sub(1);
                audio.send(EngineCommand::Record { track: track.id() });
            } else {
                audio.send(EngineCommand::Stop);
            }
        }

        UiEvent::SelectPrevTrack => ts.selected = ts.selected.saturating_sub(1),
        UiEvent::SelectNextTrack => {
            ts.selected = (ts.selected + 1).min(song.track_count().saturating_sub(1));
        }

        UiEvent::SeekBack | UiEvent::SeekForward => {
            if audio.status() == TransportStatus::Stopped {
                let spb = song.samples_per_bar() as u64;
                let bar = song.current_bar() as u64;
                let target = match event {
                    UiEvent::SeekBack => bar.saturating_sub(1),
                    _ => bar + 1,
                };
                audio.send(EngineCommand::Seek {
                    position: target * spb,
                });
            }
        }

        UiEvent::ToggleMute => {
            if let Some(track) = selected_track(song, ts) {
                track.set_muted(!track.is_muted());
            }
        }

        UiEvent::NewTrack => {
            song.add_track(song.next_track_name());
            ts.selected = song.track_count() - 1;
        }

        UiEvent::DeleteTrack => {
            if audio.status() != TransportStatus::Stopped {
                ts.message = Some("stop the transport first".into());
            } else if let Some(track) = selected_track(song, ts) {
                song.remove_track(track.id());
                ts.selected = ts.selected.min(song.track_count().saturating_sub(1));
            }
        }

        UiEvent::SetLoopBegin => {
            let bar = song.current_bar();
            let end = song.loop_region().map(|r| r.end_bar).unwrap_or(bar);
            if let Err(e) = song.set_loop(bar, end) {
                ts.message = Some(e.to_string());
            }
        }

        UiEvent::SetLoopEnd => {
            let bar = song.current_bar();
            let begin = song.loop_region().map(|r| r.begin_bar).unwrap_or(bar);
            if let Err(e) = song.set_loop(begin, bar) {
                ts.message = Some(e.to_string());
            }
        }

        UiEvent::ClearLoop => song.clear_loop(),

        UiEvent::ClearBar => {
            if let Some(bar) = selected_track(song, ts).and_then(|t| t.bar_at(song.position())) {
                bar.reset();
            }
        }

        UiEvent::CopyBar => {
            if let Some(bar) = selected_track(song, ts).and_then(|t| t.bar_at(song.position())) {
                ts.clipboard = Some(bar.snapshot());
                ts.message = Some("bar copied".into());
            }
        }

        UiEvent::PasteBar => paste_bar(song, ts),

        UiEvent::ToggleMetronome => {
            ts.metronome_on = !ts.metronome_on;
            audio.send(EngineCommand::SetMetronome(ts.metronome_on));
        }

        UiEvent::Save => {
            ts.message = Some(match persistence::save_project(project_dir, song) {
                Ok(()) => "project saved".into(),
                Err(e) => format!("save failed: {e}"),
            });
        }

        UiEvent::Export => {
            let path = project_dir.join("mixdown.wav");
            ts.message = Some(match persistence::export_wav(&path, song) {
                Ok(()) => format!("exported {}", path.display()),
                Err(e) => format!("export failed: {e}"),
            });
        }
    }
    Ok(false)
}

fn paste_bar(song: &Arc<Song>, ts: &mut TuiState) {
    let Some(clip) = ts.clipboard.clone() else {
        ts.message = Some("clipboard is empty".into());
        return;
    };
    let Some(track) = selected_track(song, ts) else {
        return;
    };
    // paste into the bar under the playhead, or append when the playhead
    // sits exactly one bar past the end of this track
    let bar = match track.bar_at(song.position()) {
        Some(bar) => Some(bar),
        None if song.current_bar() == track.bar_count() => Some(track.add_bar()),
        None => None,
    };
    ts.message = Some(match bar {
        Some(bar) => match bar.replace(&clip) {
            Ok(()) => "bar pasted".into(),
            Err(e) => e.to_string(),
        },
        None => "no bar under the playhead".into(),
    });
}

fn selected_track(song: &Arc<Song>, ts: &TuiState) -> Option<Arc<model::Track>> {
    song.tracks().get(ts.selected).cloned()
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
