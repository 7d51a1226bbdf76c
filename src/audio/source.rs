use std::sync::Arc;

use crate::error::DecodeError;

/// Tag holding the loop start, in samples
pub const LOOP_START_TAG: &str = "LOOPSTART";
/// Tag holding the loop length, in samples
pub const LOOP_LENGTH_TAG: &str = "LOOPLENGTH";

/// Decoded audio as handed over by a [`TrackSource`]
#[derive(Debug, Clone)]
pub struct RawAudio {
    /// Interleaved samples (LRLR...)
    pub samples: Arc<[f32]>,
    pub channels: u16,
    /// Rate of `samples`, after any import-time conversion
    pub sample_rate: u32,
}

impl RawAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }
}

/// Decoder and tag reader boundary.
///
/// `reference` identifies the track for the source; for file-backed sources it
/// is a path.
pub trait TrackSource {
    fn raw_samples(&self, reference: &str) -> Result<RawAudio, DecodeError>;

    /// Raw value of a tag, or `None` when the file doesn't carry it
    fn read_tag(&self, reference: &str, tag: &str) -> Option<String>;

    /// Rate the file was authored at, before any import-time conversion
    fn original_sample_rate(&self, reference: &str) -> Option<u32>;
}
