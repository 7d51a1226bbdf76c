use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use log::{debug, error, info};

use crate::audio::sink::{AudioSink, VoiceHandle};
use crate::error::SinkError;

#[derive(Debug, Clone, Copy, PartialEq)]
enum VoiceState {
    Stopped,
    /// Plays from `start_position` beginning at device frame `started_at`,
    /// which may lie in the future (scheduled) or the past (joined late)
    Playing { started_at: i64 },
    Paused,
}

#[derive(Debug)]
struct MixVoice {
    buffer: Arc<[f32]>,
    channels: usize,
    frames: usize,
    sample_rate: u32,
    /// Source frames advanced per device frame
    step: f64,
    looping: bool,
    volume: f32,
    start_position: usize,
    state: VoiceState,
}

impl MixVoice {
    /// Source position at absolute device frame `n`, `None` before the start
    fn source_position(&self, n: i64) -> Option<f64> {
        match self.state {
            VoiceState::Playing { started_at } if n >= started_at => {
                let pos = self.start_position as f64 + (n - started_at) as f64 * self.step;
                if self.looping {
                    Some(pos % self.frames as f64)
                } else if pos < self.frames as f64 {
                    Some(pos)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn finished_at(&self, n: i64) -> bool {
        match self.state {
            VoiceState::Playing { started_at } if !self.looping && n >= started_at => {
                self.start_position as f64 + (n - started_at) as f64 * self.step >= self.frames as f64
            }
            _ => false,
        }
    }

    /// Linearly interpolated sample of source channel `channel` at `pos`
    fn sample(&self, pos: f64, channel: usize) -> f32 {
        let i = pos.floor() as usize;
        let frac = (pos - i as f64) as f32;
        let next = if i + 1 < self.frames {
            i + 1
        } else if self.looping {
            0
        } else {
            i
        };
        let s0 = self.buffer[i * self.channels + channel];
        let s1 = self.buffer[next * self.channels + channel];
        s0 + (s1 - s0) * frac
    }
}

/// Software mixer behind [`CpalSink`]: sums every playing voice into the
/// device buffer and counts rendered frames as the clock.
#[derive(Debug)]
pub struct Mixer {
    device_rate: u32,
    device_channels: usize,
    frames_rendered: i64,
    next_id: u64,
    voices: HashMap<u64, MixVoice>,
}

impl Mixer {
    pub fn new(device_rate: u32, device_channels: u16) -> Self {
        Self {
            device_rate: device_rate.max(1),
            device_channels: device_channels.max(1) as usize,
            frames_rendered: 0,
            next_id: 0,
            voices: HashMap::new(),
        }
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    fn voice_mut(&mut self, voice: VoiceHandle) -> Result<&mut MixVoice, SinkError> {
        self.voices
            .get_mut(&voice.id())
            .ok_or(SinkError::InvalidVoice { voice: voice.id() })
    }

    fn current_position(&self, voice: &MixVoice) -> usize {
        match voice.source_position(self.frames_rendered) {
            Some(pos) => pos.floor() as usize,
            None if voice.finished_at(self.frames_rendered) => voice.frames,
            None => voice.start_position,
        }
    }

    /// Mix the next `out.len() / device_channels` frames into `out`
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let out_channels = self.device_channels;
        let frames = out.len() / out_channels;

        for voice in self.voices.values_mut() {
            if !matches!(voice.state, VoiceState::Playing { .. }) {
                continue;
            }
            for k in 0..frames {
                let Some(pos) = voice.source_position(self.frames_rendered + k as i64) else {
                    continue;
                };
                let frame = &mut out[k * out_channels..(k + 1) * out_channels];
                match (voice.channels, out_channels) {
                    (2, 1) => frame[0] += (voice.sample(pos, 0) + voice.sample(pos, 1)) * 0.5 * voice.volume,
                    (source, _) => {
                        for (c, slot) in frame.iter_mut().enumerate() {
                            *slot += voice.sample(pos, c % source) * voice.volume;
                        }
                    }
                }
            }
            if voice.finished_at(self.frames_rendered + frames as i64) {
                voice.start_position = voice.frames;
                voice.state = VoiceState::Stopped;
            }
        }

        self.frames_rendered += frames as i64;
    }
}

impl AudioSink for Mixer {
    fn create_voice(&mut self, buffer: Arc<[f32]>, channels: u16, sample_rate: u32) -> Result<VoiceHandle, SinkError> {
        let channels = channels.max(1) as usize;
        let frames = buffer.len() / channels;
        if frames == 0 {
            return Err(SinkError::StreamError("cannot create a voice for an empty buffer".to_string()));
        }
        self.next_id += 1;
        self.voices.insert(
            self.next_id,
            MixVoice {
                buffer,
                channels,
                frames,
                sample_rate: sample_rate.max(1),
                step: sample_rate.max(1) as f64 / self.device_rate as f64,
                looping: false,
                volume: 1.0,
                start_position: 0,
                state: VoiceState::Stopped,
            },
        );
        Ok(VoiceHandle(self.next_id))
    }

    fn release_voice(&mut self, voice: VoiceHandle) {
        self.voices.remove(&voice.id());
    }

    fn play_now(&mut self, voice: VoiceHandle) -> Result<(), SinkError> {
        let now = self.frames_rendered;
        self.voice_mut(voice)?.state = VoiceState::Playing { started_at: now };
        Ok(())
    }

    fn play_scheduled(&mut self, voice: VoiceHandle, clock_time: f64) -> Result<(), SinkError> {
        let started_at = (clock_time * self.device_rate as f64).round() as i64;
        self.voice_mut(voice)?.state = VoiceState::Playing { started_at };
        Ok(())
    }

    fn set_loop(&mut self, voice: VoiceHandle, looping: bool) -> Result<(), SinkError> {
        self.voice_mut(voice)?.looping = looping;
        Ok(())
    }

    fn set_position(&mut self, voice: VoiceHandle, frame: usize) -> Result<(), SinkError> {
        let now = self.frames_rendered;
        let voice = self.voice_mut(voice)?;
        voice.start_position = frame.min(voice.frames - 1);
        if let VoiceState::Playing { started_at } = voice.state {
            voice.state = VoiceState::Playing {
                started_at: started_at.max(now),
            };
        }
        Ok(())
    }

    fn set_volume(&mut self, voice: VoiceHandle, volume: f32) -> Result<(), SinkError> {
        self.voice_mut(voice)?.volume = volume.max(0.0);
        Ok(())
    }

    fn pause(&mut self, voice: VoiceHandle) -> Result<(), SinkError> {
        let position = {
            let v = self.voices.get(&voice.id()).ok_or(SinkError::InvalidVoice { voice: voice.id() })?;
            self.current_position(v)
        };
        let v = self.voice_mut(voice)?;
        if matches!(v.state, VoiceState::Playing { .. }) {
            v.start_position = position.min(v.frames - 1);
            v.state = VoiceState::Paused;
        }
        Ok(())
    }

    fn unpause(&mut self, voice: VoiceHandle) -> Result<(), SinkError> {
        let now = self.frames_rendered;
        let v = self.voice_mut(voice)?;
        if v.state == VoiceState::Paused {
            v.state = VoiceState::Playing { started_at: now };
        }
        Ok(())
    }

    fn stop(&mut self, voice: VoiceHandle) -> Result<(), SinkError> {
        let v = self.voice_mut(voice)?;
        v.state = VoiceState::Stopped;
        v.start_position = 0;
        Ok(())
    }

    fn clock_time(&self) -> f64 {
        self.frames_rendered as f64 / self.device_rate as f64
    }

    fn elapsed_time(&self, voice: VoiceHandle) -> f64 {
        self.voices
            .get(&voice.id())
            .map(|v| self.current_position(v) as f64 / v.sample_rate as f64)
            .unwrap_or(0.0)
    }

    fn position(&self, voice: VoiceHandle) -> usize {
        self.voices.get(&voice.id()).map(|v| self.current_position(v)).unwrap_or(0)
    }

    fn is_playing(&self, voice: VoiceHandle) -> bool {
        self.voices.get(&voice.id()).is_some_and(|v| {
            matches!(v.state, VoiceState::Playing { .. }) && !v.finished_at(self.frames_rendered)
        })
    }
}

/// [`AudioSink`] playing through a cpal output stream
pub struct CpalSink {
    mixer: Arc<Mutex<Mixer>>,
    device_name: String,
    sample_rate: u32,
    channels: u16,
    _stream: Stream,
}

impl CpalSink {
    /// Open `device_name`, or the default output device when `None`
    pub fn open(device_name: Option<&str>) -> Result<Self, SinkError> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(name) => host
                .output_devices()
                .map_err(|e| SinkError::InitializationFailed(format!("Failed to enumerate devices: {}", e)))?
                .find(|device| device.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| SinkError::DeviceNotFound { device: name.to_string() })?,
            None => host
                .default_output_device()
                .ok_or_else(|| SinkError::InitializationFailed("No default output device available".to_string()))?,
        };
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let default_config = device
            .default_output_config()
            .map_err(|e| SinkError::InitializationFailed(format!("Failed to get default config: {}", e)))?;
        let config: StreamConfig = default_config.config();
        let mixer = Arc::new(Mutex::new(Mixer::new(config.sample_rate.0, config.channels)));

        let stream = match default_config.sample_format() {
            SampleFormat::F32 => Self::create_stream::<f32>(&device, &config, Arc::clone(&mixer))?,
            SampleFormat::I16 => Self::create_stream::<i16>(&device, &config, Arc::clone(&mixer))?,
            SampleFormat::U16 => Self::create_stream::<u16>(&device, &config, Arc::clone(&mixer))?,
            sample_format => {
                return Err(SinkError::InitializationFailed(format!(
                    "Unsupported sample format: {:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| SinkError::StreamError(format!("Failed to start stream: {}", e)))?;

        info!(
            "Audio output on '{}': {} Hz, {} channels",
            name, config.sample_rate.0, config.channels
        );

        Ok(Self {
            mixer,
            device_name: name,
            sample_rate: config.sample_rate.0,
            channels: config.channels,
            _stream: stream,
        })
    }

    /// Names of every output device on the default host
    pub fn list_devices() -> Result<Vec<String>, SinkError> {
        let devices = cpal::default_host()
            .output_devices()
            .map_err(|e| SinkError::InitializationFailed(format!("Failed to enumerate devices: {}", e)))?;
        Ok(devices.filter_map(|device| device.name().ok()).collect())
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    fn create_stream<T>(device: &cpal::Device, config: &StreamConfig, mixer: Arc<Mutex<Mixer>>) -> Result<Stream, SinkError>
    where
        T: cpal::Sample + cpal::SizedSample + Send + 'static,
        T: cpal::FromSample<f32>,
    {
        let mut scratch: Vec<f32> = Vec::new();

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    lock(&mixer).render(&mut scratch);
                    for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                        *out = T::from_sample(*sample);
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| SinkError::StreamError(format!("Failed to build output stream: {}", e)))?;

        debug!("Built {} output stream", std::any::type_name::<T>());
        Ok(stream)
    }

    fn mixer(&self) -> MutexGuard<'_, Mixer> {
        lock(&self.mixer)
    }
}

fn lock(mixer: &Mutex<Mixer>) -> MutexGuard<'_, Mixer> {
    mixer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AudioSink for CpalSink {
    fn create_voice(&mut self, buffer: Arc<[f32]>, channels: u16, sample_rate: u32) -> Result<VoiceHandle, SinkError> {
        self.mixer().create_voice(buffer, channels, sample_rate)
    }

    fn release_voice(&mut self, voice: VoiceHandle) {
        self.mixer().release_voice(voice)
    }

    fn play_now(&mut self, voice: VoiceHandle) -> Result<(), SinkError> {
        self.mixer().play_now(voice)
    }

    fn play_scheduled(&mut self, voice: VoiceHandle, clock_time: f64) -> Result<(), SinkError> {
        self.mixer().play_scheduled(voice, clock_time)
    }

    fn set_loop(&mut self, voice: VoiceHandle, looping: bool) -> Result<(), SinkError> {
        self.mixer().set_loop(voice, looping)
    }

    fn set_position(&mut self, voice: VoiceHandle, frame: usize) -> Result<(), SinkError> {
        self.mixer().set_position(voice, frame)
    }

    fn set_volume(&mut self, voice: VoiceHandle, volume: f32) -> Result<(), SinkError> {
        self.mixer().set_volume(voice, volume)
    }

    fn pause(&mut self, voice: VoiceHandle) -> Result<(), SinkError> {
        self.mixer().pause(voice)
    }

    fn unpause(&mut self, voice: VoiceHandle) -> Result<(), SinkError> {
        self.mixer().unpause(voice)
    }

    fn stop(&mut self, voice: VoiceHandle) -> Result<(), SinkError> {
        self.mixer().stop(voice)
    }

    fn clock_time(&self) -> f64 {
        self.mixer().clock_time()
    }

    fn elapsed_time(&self, voice: VoiceHandle) -> f64 {
        self.mixer().elapsed_time(voice)
    }

    fn position(&self, voice: VoiceHandle) -> usize {
        self.mixer().position(voice)
    }

    fn is_playing(&self, voice: VoiceHandle) -> bool {
        self.mixer().is_playing(voice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize) -> Arc<[f32]> {
        (0..frames).map(|i| i as f32).collect::<Vec<_>>().into()
    }

    fn render(mixer: &mut Mixer, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * mixer.device_channels];
        mixer.render(&mut out);
        out
    }

    #[test]
    fn test_clock_counts_rendered_frames() {
        let mut mixer = Mixer::new(1000, 2);
        assert_eq!(mixer.clock_time(), 0.0);

        render(&mut mixer, 500);

        assert_eq!(mixer.clock_time(), 0.5);
    }

    #[test]
    fn test_scheduled_voice_waits_for_its_start() {
        let mut mixer = Mixer::new(10, 1);
        let voice = mixer.create_voice(ramp(4), 1, 10).unwrap();
        mixer.play_scheduled(voice, 0.2).unwrap();

        assert!(mixer.is_playing(voice));
        let out = render(&mut mixer, 5);

        assert_eq!(out, vec![0.0, 0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_late_schedule_joins_mid_buffer() {
        let mut mixer = Mixer::new(10, 1);
        render(&mut mixer, 3);
        let voice = mixer.create_voice(ramp(10), 1, 10).unwrap();

        mixer.play_scheduled(voice, 0.1).unwrap();
        let out = render(&mut mixer, 3);

        assert_eq!(out, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_back_to_back_voices_are_sample_aligned() {
        let mut mixer = Mixer::new(10, 1);
        let intro: Arc<[f32]> = vec![1.0; 3].into();
        let looped: Arc<[f32]> = vec![5.0, 6.0].into();
        let intro_voice = mixer.create_voice(intro, 1, 10).unwrap();
        let loop_voice = mixer.create_voice(looped, 1, 10).unwrap();
        mixer.set_loop(loop_voice, true).unwrap();

        mixer.play_scheduled(intro_voice, 0.0).unwrap();
        mixer.play_scheduled(loop_voice, 0.3).unwrap();
        let out = render(&mut mixer, 8);

        assert_eq!(out, vec![1.0, 1.0, 1.0, 5.0, 6.0, 5.0, 6.0, 5.0]);
        assert!(!mixer.is_playing(intro_voice));
        assert!(mixer.is_playing(loop_voice));
    }

    #[test]
    fn test_volume_and_mono_to_stereo() {
        let mut mixer = Mixer::new(10, 2);
        let voice = mixer.create_voice(vec![1.0f32, 1.0].into(), 1, 10).unwrap();
        mixer.set_volume(voice, 0.5).unwrap();
        mixer.play_now(voice).unwrap();

        let out = render(&mut mixer, 2);

        assert_eq!(out, vec![0.5, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_rate_conversion_interpolates() {
        let mut mixer = Mixer::new(20, 1);
        let voice = mixer.create_voice(ramp(4), 1, 10).unwrap();
        mixer.play_now(voice).unwrap();

        let out = render(&mut mixer, 4);

        assert_eq!(out, vec![0.0, 0.5, 1.0, 1.5]);
        assert_eq!(mixer.position(voice), 2);
        assert!((mixer.elapsed_time(voice) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_position_and_pause_resume() {
        let mut mixer = Mixer::new(10, 1);
        let voice = mixer.create_voice(ramp(10), 1, 10).unwrap();
        mixer.set_position(voice, 4).unwrap();
        mixer.play_now(voice).unwrap();
        render(&mut mixer, 2);
        assert_eq!(mixer.position(voice), 6);

        mixer.pause(voice).unwrap();
        render(&mut mixer, 3);
        assert_eq!(mixer.position(voice), 6);
        assert!(!mixer.is_playing(voice));

        mixer.unpause(voice).unwrap();
        assert_eq!(render(&mut mixer, 1), vec![6.0]);
    }

    #[test]
    fn test_unknown_voice_is_rejected() {
        let mut mixer = Mixer::new(10, 1);
        let voice = mixer.create_voice(ramp(2), 1, 10).unwrap();
        mixer.release_voice(voice);

        assert_eq!(
            mixer.play_now(voice),
            Err(SinkError::InvalidVoice { voice: voice.id() })
        );
        assert_eq!(mixer.voice_count(), 0);
    }
}
