//! Audio-thread side of [`CpalOutput`](crate::CpalOutput).
//!
//! The timeline mixes scheduled buffers by absolute frame position. It only
//! receives work through [`Command`]s and never blocks.

use crossbeam_channel::Sender;

/// Work sent from the control side to the audio thread.
#[derive(Debug)]
pub(crate) enum Command {
    /// Play `samples` (interleaved) from `start_frame`.
    Schedule { start_frame: u64, samples: Vec<f32> },
    /// Ramp master gain.
    Gain { target: f32, ramp_frames: u32 },
    /// Fade sounding buffers, drop pending ones.
    Disconnect { fade_frames: u32 },
}

#[derive(Debug)]
struct Fade {
    remaining: u32,
    total: u32,
}

#[derive(Debug)]
struct Voice {
    start: u64,
    samples: Vec<f32>,
    fade: Option<Fade>,
}

impl Voice {
    fn end(&self, channels: usize) -> u64 {
        self.start + (self.samples.len() / channels) as u64
    }
}

#[derive(Debug)]
pub(crate) struct Timeline {
    channels: usize,
    voices: Vec<Voice>,
    gain: f32,
    gain_step: f32,
    gain_remaining: u32,
    gain_target: f32,
    retired: Option<Sender<Vec<f32>>>,
}

impl Timeline {
    pub(crate) fn new(channels: u16, gain: f32, retired: Option<Sender<Vec<f32>>>) -> Self {
        Self {
            channels: usize::from(channels.max(1)),
            voices: Vec::with_capacity(64),
            gain,
            gain_step: 0.0,
            gain_remaining: 0,
            gain_target: gain,
            retired,
        }
    }

    pub(crate) fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub(crate) fn apply(&mut self, command: Command, now: u64) {
        match command {
            Command::Schedule {
                start_frame,
                samples,
            } => self.voices.push(Voice {
                start: start_frame,
                samples,
                fade: None,
            }),
            Command::Gain {
                target,
                ramp_frames,
            } => {
                self.gain_target = target;
                if ramp_frames == 0 {
                    self.gain = target;
                    self.gain_remaining = 0;
                } else {
                    self.gain_step = (target - self.gain) / ramp_frames as f32;
                    self.gain_remaining = ramp_frames;
                }
            }
            Command::Disconnect { fade_frames } => {
                let mut i = 0;
                while i < self.voices.len() {
                    if self.voices[i].start > now || fade_frames == 0 {
                        let voice = self.voices.swap_remove(i);
                        self.retire(voice);
                    } else {
                        self.voices[i].fade = Some(Fade {
                            remaining: fade_frames,
                            total: fade_frames,
                        });
                        i += 1;
                    }
                }
            }
        }
    }

    /// Mix every voice overlapping `[first_frame, first_frame + frames)` into `out`.
    pub(crate) fn render(&mut self, out: &mut [f32], first_frame: u64) {
        out.fill(0.0);
        let ch = self.channels;
        let frames = (out.len() / ch) as u64;
        let block_end = first_frame + frames;

        for voice in &mut self.voices {
            let end = voice.end(ch);
            if voice.start >= block_end || end <= first_frame {
                continue;
            }
            let from = voice.start.max(first_frame);
            let to = end.min(block_end);
            for frame in from..to {
                let level = match &mut voice.fade {
                    Some(fade) if fade.remaining == 0 => break,
                    Some(fade) => {
                        fade.remaining -= 1;
                        fade.remaining as f32 / fade.total as f32
                    }
                    None => 1.0,
                };
                let src = (frame - voice.start) as usize * ch;
                let dst = (frame - first_frame) as usize * ch;
                for c in 0..ch {
                    out[dst + c] += voice.samples[src + c] * level;
                }
            }
        }

        for frame in out.chunks_exact_mut(ch) {
            if self.gain_remaining > 0 {
                self.gain += self.gain_step;
                self.gain_remaining -= 1;
                if self.gain_remaining == 0 {
                    self.gain = self.gain_target;
                }
            }
            for s in frame {
                *s *= self.gain;
            }
        }

        let mut i = 0;
        while i < self.voices.len() {
            let voice = &self.voices[i];
            let faded = voice.fade.as_ref().is_some_and(|f| f.remaining == 0);
            if faded || voice.end(ch) <= block_end {
                let voice = self.voices.swap_remove(i);
                self.retire(voice);
            } else {
                i += 1;
            }
        }
    }

    // Hand the buffer back so it is freed off the audio thread.
    fn retire(&self, voice: Voice) {
        if let Some(tx) = &self.retired {
            let _ = tx.try_send(voice.samples);
        }
    }
}
