use std::sync::Arc;

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

mod engine;
mod metronome;

pub use engine::{Engine, EngineCommand};

use crate::model::Song;
use crate::shared::{SharedStatus, TransportStatus};

// capacity for captured quanta waiting for the output callback to drain them
const INPUT_BACKLOG: usize = 2048;
const COMMAND_BACKLOG: usize = 256;

pub struct AudioHandle {
    tx: Sender<EngineCommand>,
    status: Arc<SharedStatus>,
    _output_stream: cpal::Stream,
    _input_stream: Option<cpal::Stream>, // None when no mic available
}

impl AudioHandle {
    pub fn send(&self, cmd: EngineCommand) {
        let _ = self.tx.try_send(cmd);
    }

    pub fn status(&self) -> TransportStatus {
        self.status.get()
    }
}

/// Wire the engine into the platform audio service. The output callback is
/// the quantum clock: it drains commands, feeds recorded input to the model,
/// and pulls playback samples out of it.
pub fn start_audio(song: Arc<Song>) -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<EngineCommand>(COMMAND_BACKLOG);

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .context("no default output device")?;
    let config = device
        .default_output_config()
        .context("no default output config")?;

    let sample_rate = config.sample_rate();
    let channels = config.channels() as usize;

    if sample_rate != song.sample_rate() {
        // resampling is out of scope; bars keep the song's notion of a bar
        eprintln!(
            "barline: device rate {} differs from song rate {}, timing will drift",
            sample_rate,
            song.sample_rate()
        );
    }

    let (input_tx, input_rx) = crossbeam_channel::bounded::<Vec<f32>>(INPUT_BACKLOG);
    let status = Arc::new(SharedStatus::new());

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let output_stream = build_output_stream_f32(
                &device,
                &config.into(),
                song,
                rx,
                input_rx,
                status.clone(),
                sample_rate,
                channels,
            )?;
            output_stream
                .play()
                .context("failed to play output stream")?;

            let input_stream = try_build_input_stream(&host, sample_rate, input_tx);

            Ok(AudioHandle {
                tx,
                status,
                _output_stream: output_stream,
                _input_stream: input_stream,
            })
        }
        _ => anyhow::bail!("unsupported sample format (only f32 supported for now)"),
    }
}

// ── Output stream ─────────────────────────────────────────────────

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    song: Arc<Song>,
    rx: Receiver<EngineCommand>,
    input_rx: Receiver<Vec<f32>>,
    status: Arc<SharedStatus>,
    sample_rate: u32,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let mut engine = Engine::new(song, status, sample_rate);
    engine.set_input_rx(input_rx);

    let err_fn = |err| eprintln!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            while let Ok(cmd) = rx.try_recv() {
                engine.handle_cmd(cmd);
            }

            let n_frames = data.len() / channels;
            let mut mono = vec![0.0f32; n_frames];
            engine.render_block(&mut mono);

            // same mono sample on every hardware channel
            for (frame, sample) in data.chunks_mut(channels).zip(&mono) {
                frame.fill(*sample);
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

// ── Input stream ──────────────────────────────────────────────────

fn try_build_input_stream(
    host: &cpal::Host,
    target_sample_rate: cpal::SampleRate,
    tx: Sender<Vec<f32>>,
) -> Option<cpal::Stream> {
    let device = match host.default_input_device() {
        Some(d) => d,
        None => {
            eprintln!("barline: no default input device — recording disabled");
            return None;
        }
    };

    let supported = device.default_input_config().ok()?;
    let mut stream_config: cpal::StreamConfig = supported.into();
    stream_config.sample_rate = target_sample_rate;

    let in_channels = stream_config.channels as usize;

    let err_fn = |err| eprintln!("audio input stream error: {err}");

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                // downmix to the mono quanta the tracks store
                let quantum: Vec<f32> = if in_channels == 1 {
                    data.to_vec()
                } else {
                    data.chunks_exact(in_channels)
                        .map(|c| c.iter().sum::<f32>() / in_channels as f32)
                        .collect()
                };

                let _ = tx.try_send(quantum);
            },
            err_fn,
            None,
        )
        .ok()?;

    if let Err(e) = stream.play() {
        eprintln!("barline: could not start input stream: {e}");
        return None;
    }

    Some(stream)
}
