// Click heard while recording, one tick per beat. The click is a pre-built
// sine burst so the callback only ever copies samples.

const CLICK_FREQUENCY: f32 = 440.0;
const CLICK_SECONDS: f32 = 0.05;
const CLICK_GAIN: f32 = 0.4;

pub struct Metronome {
    click: Vec<f32>,
    samples_per_beat: u64,
    next_beat: u64,
    // index into click while a tick is sounding
    playing: Option<usize>,
}

impl Metronome {
    pub fn new(sample_rate: u32, samples_per_beat: u64) -> Self {
        let len = (sample_rate as f32 * CLICK_SECONDS) as usize;
        let step = std::f32::consts::TAU * CLICK_FREQUENCY / sample_rate as f32;
        let click = (0..len)
            .map(|i| {
                let fade = 1.0 - i as f32 / len as f32;
                (i as f32 * step).sin() * CLICK_GAIN * fade
            })
            .collect();
        Metronome {
            click,
            samples_per_beat: samples_per_beat.max(1),
            next_beat: 0,
            playing: None,
        }
    }

    /// Rearm for a recording pass starting at sample 0.
    pub fn reset(&mut self) {
        self.next_beat = 0;
        self.playing = None;
    }

    /// Tell the metronome how far the write cursor has come; starts a tick
    /// each time it crosses a beat boundary.
    pub fn advance(&mut self, position: u64) {
        if position >= self.next_beat {
            self.playing = Some(0);
            // skip ahead past any beats a long quantum jumped over
            while self.next_beat <= position {
                self.next_beat += self.samples_per_beat;
            }
        }
    }

    /// Mix whatever remains of the current tick into `out`.
    pub fn mix_into(&mut self, out: &mut [f32]) {
        let Some(mut at) = self.playing else {
            return;
        };
        for sample in out.iter_mut() {
            if at >= self.click.len() {
                self.playing = None;
                return;
            }
            *sample += self.click[at];
            at += 1;
        }
        self.playing = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_on_each_beat_crossing() {
        let mut m = Metronome::new(8000, 100);
        m.reset();

        m.advance(0);
        let mut out = [0.0f32; 16];
        m.mix_into(&mut out);
        // click starts at phase 0, so the first sample is silent but the
        // burst itself is not
        assert!(out[1..].iter().any(|s| s.abs() > 0.0));

        // drain the rest of the burst; no new tick before the next boundary
        let mut rest = vec![0.0f32; m.click.len() + 1];
        m.mix_into(&mut rest);
        m.advance(50);
        assert!(m.playing.is_none());

        m.advance(100);
        assert!(m.playing.is_some());
    }

    #[test]
    fn long_quantum_skips_missed_beats() {
        let mut m = Metronome::new(8000, 10);
        m.reset();
        m.advance(35);
        assert_eq!(m.next_beat, 40);
    }
}
