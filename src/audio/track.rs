use std::sync::{Arc, OnceLock};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::audio::source::{TrackSource, LOOP_LENGTH_TAG, LOOP_START_TAG};
use crate::config::TrackConfig;
use crate::error::{MetadataError, PlayerError};

/// Loop region overrides, in samples per channel. Zero means "not set".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopPoints {
    pub loop_start: u64,
    pub loop_length: u64,
    /// Rescale tag-derived loop points when the track was converted to a
    /// different sample rate on import
    pub compensate_for_frequency: bool,
}

impl Default for LoopPoints {
    fn default() -> Self {
        Self {
            loop_start: 0,
            loop_length: 0,
            compensate_for_frequency: true,
        }
    }
}

/// Loop tag values exactly as the metadata service returned them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopTags {
    pub loop_start: Option<String>,
    pub loop_length: Option<String>,
}

/// The two playable buffers of a track plus the loop region they were cut from.
///
/// `intro_frames` is the logical intro length (the resolved loop start); the
/// intro buffer itself always holds at least one frame.
#[derive(Debug, Clone)]
pub struct TrackBuffers {
    pub intro: Arc<[f32]>,
    pub looped: Arc<[f32]>,
    pub channels: u16,
    pub sample_rate: u32,
    pub intro_frames: usize,
    pub loop_frames: usize,
}

impl TrackBuffers {
    /// Intro plus one pass of the loop
    pub fn length_frames(&self) -> usize {
        self.intro_frames + self.loop_frames
    }

    pub fn intro_seconds(&self) -> f64 {
        self.intro_frames as f64 / self.sample_rate as f64
    }

    pub fn loop_seconds(&self) -> f64 {
        self.loop_frames as f64 / self.sample_rate as f64
    }

    pub fn length_seconds(&self) -> f64 {
        self.length_frames() as f64 / self.sample_rate as f64
    }

    /// Seconds to a frame offset, clamped to the track length
    pub fn seconds_to_frames(&self, seconds: f64) -> usize {
        let frames = (seconds.max(0.0) * self.sample_rate as f64).round();
        (frames as usize).min(self.length_frames())
    }

    /// Frame offset to seconds, clamped to the track length
    pub fn frames_to_seconds(&self, frames: usize) -> f64 {
        frames.min(self.length_frames()) as f64 / self.sample_rate as f64
    }
}

/// One playable piece of music and its loop configuration
#[derive(Debug)]
pub struct Track {
    name: String,
    samples: Arc<[f32]>,
    channels: u16,
    sample_rate: u32,
    original_sample_rate: Option<u32>,
    loop_points: LoopPoints,
    tags: LoopTags,
    buffers: OnceLock<TrackBuffers>,
}

impl Track {
    /// Build a track from already-decoded interleaved samples
    pub fn from_samples(
        name: impl Into<String>,
        samples: impl Into<Arc<[f32]>>,
        channels: u16,
        sample_rate: u32,
    ) -> Self {
        Self {
            name: name.into(),
            samples: samples.into(),
            channels: channels.max(1),
            sample_rate: sample_rate.max(1),
            original_sample_rate: None,
            loop_points: LoopPoints::default(),
            tags: LoopTags::default(),
            buffers: OnceLock::new(),
        }
    }

    /// Load a playlist entry through the decoder/metadata service.
    ///
    /// Tags are read here, once; parsing them is deferred to the first
    /// buffer derivation.
    pub fn from_source(config: &TrackConfig, source: &dyn TrackSource) -> Result<Self, PlayerError> {
        let reference = config.path.to_string_lossy();
        let raw = source.raw_samples(&reference)?;

        let tags = LoopTags {
            loop_start: source.read_tag(&reference, LOOP_START_TAG),
            loop_length: source.read_tag(&reference, LOOP_LENGTH_TAG),
        };

        debug!(
            "Loaded '{}': {} frames, {} ch, {} Hz, tags {:?}",
            config.name,
            raw.frames(),
            raw.channels,
            raw.sample_rate,
            tags
        );

        let mut track = Self::from_samples(config.name.clone(), raw.samples, raw.channels, raw.sample_rate)
            .with_loop_points(config.loop_points())
            .with_tags(tags);
        track.original_sample_rate = source.original_sample_rate(&reference);
        Ok(track)
    }

    pub fn with_loop_points(mut self, loop_points: LoopPoints) -> Self {
        self.set_loop_points(loop_points);
        self
    }

    pub fn with_tags(mut self, tags: LoopTags) -> Self {
        self.tags = tags;
        self.buffers = OnceLock::new();
        self
    }

    pub fn with_original_sample_rate(mut self, rate: u32) -> Self {
        self.original_sample_rate = Some(rate);
        self.buffers = OnceLock::new();
        self
    }

    /// Replace the loop overrides. Only takes effect if the buffers have not
    /// been derived yet or the track isn't shared.
    pub fn set_loop_points(&mut self, loop_points: LoopPoints) {
        self.loop_points = loop_points;
        self.buffers = OnceLock::new();
    }

    pub fn set_loop_start(&mut self, frames: u64) {
        self.loop_points.loop_start = frames;
        self.buffers = OnceLock::new();
    }

    pub fn set_loop_length(&mut self, frames: u64) {
        self.loop_points.loop_length = frames;
        self.buffers = OnceLock::new();
    }

    pub fn set_compensate_for_frequency(&mut self, compensate: bool) {
        self.loop_points.compensate_for_frequency = compensate;
        self.buffers = OnceLock::new();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn loop_points(&self) -> LoopPoints {
        self.loop_points
    }

    /// Frames in the raw sample data
    pub fn total_frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Effective rate over original rate, or 1.0 when the original is unknown
    pub fn frequency_ratio(&self) -> f64 {
        match self.original_sample_rate {
            Some(original) if original > 0 => self.sample_rate as f64 / original as f64,
            _ => 1.0,
        }
    }

    /// True once the buffers have been derived
    pub fn is_prepared(&self) -> bool {
        self.buffers.get().is_some()
    }

    /// Intro and loop buffers, derived on first call and cached afterwards
    pub fn buffers(&self) -> Result<&TrackBuffers, MetadataError> {
        if let Some(buffers) = self.buffers.get() {
            return Ok(buffers);
        }
        let derived = self.derive_buffers()?;
        Ok(self.buffers.get_or_init(|| derived))
    }

    /// Seconds of intro plus one loop; 0.0 when the loop tags are unusable
    pub fn length_seconds(&self) -> f64 {
        self.buffers().map(TrackBuffers::length_seconds).unwrap_or(0.0)
    }

    fn tag_ratio(&self) -> f64 {
        if self.loop_points.compensate_for_frequency {
            self.frequency_ratio()
        } else {
            1.0
        }
    }

    fn resolve_loop_start(&self) -> Result<usize, MetadataError> {
        if self.loop_points.loop_start > 0 {
            return Ok(self.loop_points.loop_start as usize);
        }
        let tagged = parse_tag(LOOP_START_TAG, self.tags.loop_start.as_deref())?;
        Ok(tagged.map(|v| scale(v, self.tag_ratio())).unwrap_or(0))
    }

    /// `None` means "remainder of the track"
    fn resolve_loop_length(&self) -> Result<Option<usize>, MetadataError> {
        if self.loop_points.loop_length > 0 {
            return Ok(Some(self.loop_points.loop_length as usize));
        }
        let tagged = parse_tag(LOOP_LENGTH_TAG, self.tags.loop_length.as_deref())?;
        Ok(tagged.map(|v| scale(v, self.tag_ratio())).filter(|&v| v > 0))
    }

    fn derive_buffers(&self) -> Result<TrackBuffers, MetadataError> {
        let channels = self.channels as usize;
        let requested_start = self.resolve_loop_start()?;
        let requested_length = self.resolve_loop_length()?;

        // A track with no audio still gets one silent frame per buffer
        let silence;
        let data: &[f32] = if self.total_frames() == 0 {
            silence = vec![0.0f32; channels];
            &silence
        } else {
            &self.samples[..self.total_frames() * channels]
        };
        let total = data.len() / channels;

        let loop_start = requested_start.min(total - 1);
        let remainder = total - loop_start;
        let loop_frames = requested_length.unwrap_or(remainder).clamp(1, remainder);

        if loop_start != requested_start || requested_length.is_some_and(|l| l != loop_frames) {
            warn!(
                "Loop points for '{}' clamped: start {} -> {}, length {:?} -> {} ({} frames total)",
                self.name, requested_start, loop_start, requested_length, loop_frames, total
            );
        }

        let intro_end = loop_start.max(1) * channels;
        let loop_range = loop_start * channels..(loop_start + loop_frames) * channels;

        debug!(
            "Derived buffers for '{}': intro {} frames, loop {} frames",
            self.name, loop_start, loop_frames
        );

        Ok(TrackBuffers {
            intro: Arc::from(&data[..intro_end]),
            looped: Arc::from(&data[loop_range]),
            channels: self.channels,
            sample_rate: self.sample_rate,
            intro_frames: loop_start,
            loop_frames,
        })
    }
}

fn parse_tag(tag: &str, value: Option<&str>) -> Result<Option<i64>, MetadataError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text.parse::<i64>().map(Some).map_err(|_| MetadataError::InvalidTag {
            tag: tag.to_string(),
            value: text.to_string(),
        }),
    }
}

fn scale(value: i64, ratio: f64) -> usize {
    (value.max(0) as f64 * ratio).round() as usize
}
