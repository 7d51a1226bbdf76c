use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision};
use symphonia::core::probe::Hint;

use crate::audio::resampler::LinearResampler;
use crate::audio::source::{RawAudio, TrackSource};
use crate::error::DecodeError;
use crate::logging::OperationTimer;

/// Everything read from one file
#[derive(Debug)]
struct DecodedFile {
    audio: RawAudio,
    original_sample_rate: u32,
    /// Tag values keyed by upper-cased tag name
    tags: HashMap<String, String>,
}

/// File-backed [`TrackSource`] built on symphonia.
///
/// Each file is decoded completely on first use and kept, so the sample data,
/// tags and original rate all come from a single pass.
pub struct SymphoniaSource {
    import_sample_rate: Option<u32>,
    cache: Mutex<HashMap<String, Arc<DecodedFile>>>,
}

impl SymphoniaSource {
    pub fn new() -> Self {
        Self::with_import_rate(None)
    }

    /// Convert every imported track to `rate`
    pub fn with_import_rate(rate: Option<u32>) -> Self {
        Self {
            import_sample_rate: rate.filter(|&r| r > 0),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn import_sample_rate(&self) -> Option<u32> {
        self.import_sample_rate
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, Arc<DecodedFile>>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load(&self, reference: &str) -> Result<Arc<DecodedFile>, DecodeError> {
        if let Some(decoded) = self.cache().get(reference) {
            return Ok(Arc::clone(decoded));
        }

        let timer = OperationTimer::new(format!("decode {}", reference));
        let decoded = Arc::new(self.decode_file(Path::new(reference))?);
        timer.finish_with_threshold(Duration::from_millis(500));

        self.cache().insert(reference.to_string(), Arc::clone(&decoded));
        Ok(decoded)
    }

    fn decode_file(&self, path: &Path) -> Result<DecodedFile, DecodeError> {
        let file = File::open(path)
            .map_err(|e| DecodeError::DecodeFailed(format!("Failed to open {}: {}", path.display(), e)))?;

        let media_source = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext_str) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext_str);
        }

        let mut probed = symphonia::default::get_probe()
            .format(&hint, media_source, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| DecodeError::UnsupportedFormat {
                format: format!("{} ({})", path.display(), e),
            })?;

        let mut tags = HashMap::new();
        if let Some(revision) = probed.metadata.get().as_ref().and_then(|m| m.current()) {
            collect_tags(revision, &mut tags);
        }

        let mut format_reader = probed.format;
        if let Some(revision) = format_reader.metadata().current() {
            collect_tags(revision, &mut tags);
        }

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| DecodeError::UnsupportedFormat {
                format: format!("no audio track in {}", path.display()),
            })?;

        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(44_100);
        let mut channels = track.codec_params.channels.map(|c| c.count() as u16).unwrap_or(2);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::DecodeFailed(format!("Failed to create decoder: {}", e)))?;

        let mut samples: Vec<f32> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(SymphoniaError::ResetRequired) => break,
                Err(err) => {
                    return Err(DecodeError::DecodeFailed(format!("Failed to read packet: {}", err)));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    sample_rate = spec.rate;
                    channels = spec.channels.count() as u16;

                    let needed = decoded.capacity() * spec.channels.count();
                    if sample_buf.as_ref().map_or(true, |buf| buf.capacity() < needed) {
                        sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
                    }
                    if let Some(buf) = sample_buf.as_mut() {
                        buf.copy_interleaved_ref(decoded);
                        samples.extend_from_slice(buf.samples());
                    }
                }
                Err(SymphoniaError::DecodeError(err)) => {
                    warn!("Skipping corrupt packet in {}: {}", path.display(), err);
                }
                Err(err) => {
                    return Err(DecodeError::CorruptedFile(format!("{}: {}", path.display(), err)));
                }
            }
        }

        let channels = channels.max(1);
        let original_sample_rate = sample_rate;
        let (samples, sample_rate) = match self.import_sample_rate {
            Some(rate) if rate != original_sample_rate => {
                info!(
                    "Resampling {} from {} Hz to {} Hz on import",
                    path.display(),
                    original_sample_rate,
                    rate
                );
                let resampled = LinearResampler::resample_all(&samples, original_sample_rate, rate, channels as usize);
                (resampled, rate)
            }
            _ => (samples, original_sample_rate),
        };

        debug!(
            "Decoded {}: {} frames, {} ch, {} Hz, {} tags",
            path.display(),
            samples.len() / channels as usize,
            channels,
            sample_rate,
            tags.len()
        );

        Ok(DecodedFile {
            audio: RawAudio {
                samples: Arc::from(samples),
                channels,
                sample_rate,
            },
            original_sample_rate,
            tags,
        })
    }
}

impl Default for SymphoniaSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackSource for SymphoniaSource {
    fn raw_samples(&self, reference: &str) -> Result<RawAudio, DecodeError> {
        Ok(self.load(reference)?.audio.clone())
    }

    fn read_tag(&self, reference: &str, tag: &str) -> Option<String> {
        let decoded = self.load(reference).ok()?;
        decoded.tags.get(&tag.to_uppercase()).cloned()
    }

    fn original_sample_rate(&self, reference: &str) -> Option<u32> {
        self.load(reference).ok().map(|decoded| decoded.original_sample_rate)
    }
}

fn collect_tags(revision: &MetadataRevision, tags: &mut HashMap<String, String>) {
    for tag in revision.tags() {
        tags.insert(tag.key.to_uppercase(), tag.value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::LOOP_START_TAG;
    use std::io::Write;
    use tempfile::TempDir;

    /// Minimal 16-bit PCM WAV writer
    fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: usize) {
        let data_len = (frames * channels as usize * 2) as u32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * channels as u32 * 2).to_le_bytes());
        bytes.extend_from_slice(&(channels * 2).to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for frame in 0..frames {
            let value = ((frame % 100) as i16 - 50) * 100;
            for _ in 0..channels {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        File::create(path).unwrap().write_all(&bytes).unwrap();
    }

    #[test]
    fn test_decodes_wav_fully() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 2, 8_000, 4_000);
        let reference = path.to_string_lossy();

        let source = SymphoniaSource::new();
        let audio = source.raw_samples(&reference).unwrap();

        assert_eq!(audio.channels, 2);
        assert_eq!(audio.sample_rate, 8_000);
        assert_eq!(audio.frames(), 4_000);
        assert_eq!(source.original_sample_rate(&reference), Some(8_000));
        assert_eq!(source.read_tag(&reference, LOOP_START_TAG), None);
    }

    #[test]
    fn test_import_rate_resamples() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 1, 8_000, 8_000);
        let reference = path.to_string_lossy();

        let source = SymphoniaSource::with_import_rate(Some(4_000));
        let audio = source.raw_samples(&reference).unwrap();

        assert_eq!(audio.sample_rate, 4_000);
        assert!((audio.frames() as isize - 4_000).abs() <= 2);
        assert_eq!(source.original_sample_rate(&reference), Some(8_000));
    }

    #[test]
    fn test_decoded_file_is_cached() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 1, 8_000, 100);
        let reference = path.to_string_lossy();

        let source = SymphoniaSource::new();
        let first = source.raw_samples(&reference).unwrap();
        std::fs::remove_file(&path).unwrap();
        let second = source.raw_samples(&reference).unwrap();

        assert!(Arc::ptr_eq(&first.samples, &second.samples));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let source = SymphoniaSource::new();

        let result = source.raw_samples("/definitely/not/here.ogg");

        assert!(matches!(result, Err(DecodeError::DecodeFailed(_))));
        assert_eq!(source.original_sample_rate("/definitely/not/here.ogg"), None);
    }
}
