/*!
A simple, streaming, linear resampler for interleaved f32 audio.

- Converts from an input (source) sample rate to an output (destination) sample rate.
- Operates on interleaved frames (LRLR...) for an arbitrary number of channels.
- Keeps its phase across successive `process()` calls, so a track can be fed
  packet by packet while it is decoded.

Typical usage at import time:

```ignore
let mut rs = LinearResampler::new(44_100, 22_050, 2);
let mut output = rs.process(&decoded);
output.extend(rs.finish());
```
*/

#[derive(Debug, Clone)]
pub struct LinearResampler {
    src_rate: u32,
    dst_rate: u32,
    channels: usize,

    // source frames per output frame (src/dst)
    step: f64,

    // source position relative to the start of `prev_frame`
    pos: f64,
    prev_frame: Vec<f32>,
}

impl LinearResampler {
    /// Create a new resampler.
    /// - src_rate: source/decoded sample rate (Hz)
    /// - dst_rate: destination sample rate (Hz)
    /// - channels: number of interleaved channels
    pub fn new(src_rate: u32, dst_rate: u32, channels: usize) -> Self {
        let step = if dst_rate == 0 { 0.0 } else { src_rate as f64 / dst_rate as f64 };
        Self {
            src_rate,
            dst_rate,
            channels,
            step,
            pos: 0.0,
            prev_frame: Vec::new(),
        }
    }

    /// Reset the streaming state (phase and history).
    pub fn reset(&mut self) {
        self.pos = 0.0;
        self.prev_frame.clear();
    }

    pub fn ratio(&self) -> f64 {
        if self.src_rate == 0 {
            1.0
        } else {
            self.dst_rate as f64 / self.src_rate as f64
        }
    }

    /// Resample interleaved f32 samples from src_rate to dst_rate, preserving state across calls.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.channels == 0 || self.dst_rate == 0 || self.src_rate == 0 {
            return Vec::new();
        }

        let ch = self.channels;
        let in_frames = input.len() / ch;

        // Working buffer is [prev_frame, input frames...] so interpolation can
        // cross chunk boundaries; the first call has no history
        let mut work = Vec::with_capacity((in_frames + 1) * ch);
        if self.prev_frame.len() == ch {
            work.extend_from_slice(&self.prev_frame);
        } else if in_frames == 0 {
            return Vec::new();
        }
        work.extend_from_slice(&input[..in_frames * ch]);

        let total_frames = work.len() / ch;

        let expected_out_frames = (in_frames as f64 * self.ratio()).ceil() as usize + 4;
        let mut out = Vec::with_capacity(expected_out_frames * ch);

        while self.pos < total_frames as f64 - 1.0 {
            let i = self.pos.floor() as usize;
            let frac = (self.pos - i as f64) as f32;

            let base0 = i * ch;
            let base1 = (i + 1) * ch;

            out.extend((0..ch).map(|c| {
                let s0 = work[base0 + c];
                let s1 = work[base1 + c];
                s0 + (s1 - s0) * frac
            }));

            self.pos += self.step;
        }

        // The last frame becomes index 0 of the next call
        let last_base = (total_frames - 1) * ch;
        self.prev_frame.clear();
        self.prev_frame.extend_from_slice(&work[last_base..last_base + ch]);
        // Fractional phase carries into the next call
        self.pos -= total_frames as f64 - 1.0;

        out
    }

    /// Flush the tail after the last `process()` call by holding the final
    /// frame, then reset
    pub fn finish(&mut self) -> Vec<f32> {
        if self.prev_frame.len() != self.channels || self.channels == 0 {
            self.reset();
            return Vec::new();
        }
        let hold = self.prev_frame.clone();
        let out = self.process(&hold);
        self.reset();
        out
    }

    /// Resample a whole interleaved buffer in one go
    pub fn resample_all(input: &[f32], src_rate: u32, dst_rate: u32, channels: usize) -> Vec<f32> {
        let mut resampler = Self::new(src_rate, dst_rate, channels);
        let mut out = resampler.process(input);
        out.extend(resampler.finish());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::min;

    fn gen_sine(f_hz: f32, sr: u32, frames: usize, ch: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(frames * ch);
        for n in 0..frames {
            let t = n as f32 / sr as f32;
            let s = (2.0 * std::f32::consts::PI * f_hz * t).sin();
            for _ in 0..ch {
                out.push(s);
            }
        }
        out
    }

    #[test]
    fn resample_length_mono_44k1_to_22k05() {
        let input = gen_sine(1000.0, 44_100, 44_100, 1);

        let out = LinearResampler::resample_all(&input, 44_100, 22_050, 1);

        let actual = out.len() as isize;
        assert!((actual - 22_050).abs() <= 2, "expected ~22050, got {}", actual);
    }

    #[test]
    fn identity_rate_preserves_samples() {
        let input: Vec<f32> = (0..100).map(|i| i as f32).collect();

        let out = LinearResampler::resample_all(&input, 1000, 1000, 1);

        assert_eq!(out.len(), 100);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[99], 99.0);
    }

    #[test]
    fn upsampling_interpolates_between_frames() {
        let input = vec![0.0f32, 0.0, 1.0, 1.0];

        let out = LinearResampler::resample_all(&input, 1, 2, 2);

        // frame 0, halfway, frame 1, hold
        assert_eq!(&out[..6], &[0.0, 0.0, 0.5, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn streaming_consistency_split_buffers() {
        let src = 44_100;
        let dst = 48_000;
        let ch = 2usize;

        let in_frames = 10_000;
        let input = gen_sine(440.0, src, in_frames, ch);

        let mut one = LinearResampler::new(src, dst, ch);
        let out_one = one.process(&input);

        let mut two = LinearResampler::new(src, dst, ch);
        let mut out_streamed = Vec::new();

        let mut idx = 0usize;
        let chunk_frames = 777;
        while idx < in_frames {
            let take_frames = min(in_frames - idx, chunk_frames);
            let base = idx * ch;
            out_streamed.extend_from_slice(&two.process(&input[base..base + take_frames * ch]));
            idx += take_frames;
        }

        assert!((out_one.len() as isize - out_streamed.len() as isize).abs() <= 4);

        let common = min(out_one.len(), out_streamed.len());
        for k in (0..common).step_by((common / 10).max(1)) {
            assert!((out_one[k] - out_streamed[k]).abs() < 1e-3, "mismatch at {}", k);
        }
    }

    #[test]
    fn phase_carries_across_chunk_boundaries() {
        let input: Vec<f32> = (0..9).map(|i| i as f32).collect();

        let whole = LinearResampler::new(2, 3, 1).process(&input);

        let mut split = LinearResampler::new(2, 3, 1);
        let mut out = split.process(&input[..4]);
        out.extend(split.process(&input[4..]));

        assert_eq!(out.len(), whole.len());
        for (a, b) in out.iter().zip(&whole) {
            assert!((a - b).abs() < 1e-5, "{} vs {}", a, b);
        }
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(LinearResampler::resample_all(&[], 44_100, 48_000, 2).is_empty());
    }
}
