use std::sync::Arc;

use crossbeam_channel::Receiver;

use super::metronome::Metronome;
use crate::model::{Song, Track};
use crate::shared::{SharedStatus, TrackId, TransportStatus};

pub enum EngineCommand {
    /// Arm a track and start recording from the top of the song.
    Record { track: TrackId },
    /// Start playback at an absolute sample position.
    Play { from: u64 },
    Stop,
    /// Move the transport while stopped.
    Seek { position: u64 },
    SetMetronome(bool),
}

/// Per-quantum state machine living inside the output callback. It drives
/// `Track::write` with captured quanta while recording and `Track::read`
/// while playing; the model never decides when to loop or stop — that
/// happens here, consulting the song's loop region and content end.
pub struct Engine {
    song: Arc<Song>,
    status: TransportStatus,
    shared_status: Arc<SharedStatus>,
    armed: Option<Arc<Track>>,
    playhead: u64,
    metronome: Metronome,
    metronome_on: bool,
    input_rx: Option<Receiver<Vec<f32>>>,
}

impl Engine {
    pub fn new(song: Arc<Song>, shared_status: Arc<SharedStatus>, sample_rate: u32) -> Self {
        let samples_per_beat =
            (song.samples_per_bar() / song.beats_per_bar().max(1) as usize) as u64;
        Engine {
            song,
            status: TransportStatus::Stopped,
            shared_status,
            armed: None,
            playhead: 0,
            metronome: Metronome::new(sample_rate, samples_per_beat),
            metronome_on: true,
            input_rx: None,
        }
    }

    pub fn set_input_rx(&mut self, rx: Receiver<Vec<f32>>) {
        self.input_rx = Some(rx);
    }

    pub fn handle_cmd(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Record { track } => self.start_recording(track),
            EngineCommand::Play { from } => self.start_playback(from),
            EngineCommand::Stop => self.stop(),
            EngineCommand::Seek { position } => {
                if self.status == TransportStatus::Stopped {
                    self.playhead = position;
                    self.song.set_position(position);
                }
            }
            EngineCommand::SetMetronome(on) => self.metronome_on = on,
        }
    }

    fn start_recording(&mut self, track: TrackId) {
        if self.status != TransportStatus::Stopped {
            eprintln!("barline: transport busy, ignoring record");
            return;
        }
        let Some(track) = self.song.track(track) else {
            eprintln!("barline: record command for unknown track");
            return;
        };
        // drop any stale quanta captured while we weren't recording
        if let Some(rx) = &self.input_rx {
            while rx.try_recv().is_ok() {}
        }
        self.song.set_position(0);
        self.metronome.reset();
        self.armed = Some(track);
        self.set_status(TransportStatus::Recording);
    }

    fn start_playback(&mut self, from: u64) {
        if self.status != TransportStatus::Stopped {
            eprintln!("barline: transport busy, ignoring play");
            return;
        }
        if self.song.track_count() == 0 {
            eprintln!("barline: song has no tracks, nothing to play");
            return;
        }
        self.playhead = from;
        self.song.set_position(from);
        self.set_status(TransportStatus::Playing);
    }

    fn stop(&mut self) {
        self.armed = None;
        self.song.calculate_position();
        self.set_status(TransportStatus::Stopped);
    }

    fn set_status(&mut self, status: TransportStatus) {
        self.status = status;
        self.shared_status.set(status);
    }

    /// Render one quantum of mono output.
    pub fn render_block(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        match self.status {
            TransportStatus::Stopped => {}
            TransportStatus::Recording => self.render_recording(out),
            TransportStatus::Playing => self.render_playback(out),
        }
    }

    /// Recording pass: consume captured quanta, append them to the armed
    /// track, and tick the metronome against the advancing write cursor.
    fn render_recording(&mut self, out: &mut [f32]) {
        let Some(track) = self.armed.clone() else {
            self.stop();
            return;
        };
        if let Some(rx) = &self.input_rx {
            while let Ok(quantum) = rx.try_recv() {
                if !track.write(&quantum, quantum.len()) {
                    eprintln!("barline: bar allocation failed, recording aborted");
                    self.stop();
                    return;
                }
            }
        }
        self.metronome.advance(track.position());
        if self.metronome_on {
            self.metronome.mix_into(out);
        }
        self.song.calculate_position();
    }

    /// Playback pass: sum every track's samples at the playhead, splitting
    /// the quantum wherever a bar boundary cuts a read short. Loop wrap and
    /// end-of-content stop are decided here once per chunk.
    fn render_playback(&mut self, out: &mut [f32]) {
        let spb = self.song.samples_per_bar() as u64;
        let tracks = self.song.tracks();
        let mut filled = 0;

        while filled < out.len() {
            if let Some(region) = self.song.loop_region() {
                let loop_end = (region.end_bar as u64 + 1) * spb;
                if self.playhead >= loop_end {
                    self.playhead = region.begin_bar as u64 * spb;
                }
            } else {
                let end = (self.song.last_non_empty_bar_index() as u64 + 1) * spb;
                if self.playhead >= end {
                    self.stop();
                    return;
                }
            }

            let want = out.len() - filled;
            // all tracks share samples_per_bar, so every Some() read at this
            // playhead comes back with the same clipped length
            let mut chunk_len = 0usize;
            let mut audible = 0usize;
            for track in &tracks {
                let Some(samples) = track.read(self.playhead, want) else {
                    continue;
                };
                chunk_len = samples.len();
                for (acc, s) in out[filled..filled + chunk_len].iter_mut().zip(&samples) {
                    *acc += s;
                }
                audible += 1;
            }

            if audible == 0 {
                // inside a loop region past every track's bars: stay silent
                // for the rest of this bar and keep the transport moving
                chunk_len = want.min((spb - self.playhead % spb) as usize);
            } else if audible > 1 {
                let scale = 1.0 / audible as f32;
                for s in &mut out[filled..filled + chunk_len] {
                    *s *= scale;
                }
            }

            filled += chunk_len;
            self.playhead += chunk_len as u64;
        }

        self.song.set_position(self.playhead);
    }
}
