use std::sync::Arc;

use crate::error::SinkError;

/// Opaque handle to one voice owned by an [`AudioSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceHandle(pub u64);

impl VoiceHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for VoiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "voice#{}", self.0)
    }
}

/// Audio output boundary.
///
/// A sink plays independent voices, each bound to one interleaved `f32`
/// buffer, against a monotonic clock measured in seconds. Scheduling is
/// absolute: a voice scheduled at clock time `t` renders exactly as if it had
/// started at `t`. When `t` has already passed by the time the sink renders,
/// the voice joins mid-buffer so that back-to-back schedules derived from one
/// clock read stay sample-aligned.
pub trait AudioSink {
    /// Create a stopped, non-looping voice at position 0 with volume 1.0
    fn create_voice(
        &mut self,
        buffer: Arc<[f32]>,
        channels: u16,
        sample_rate: u32,
    ) -> Result<VoiceHandle, SinkError>;

    /// Stop a voice and free it. Releasing an unknown handle is a no-op.
    fn release_voice(&mut self, voice: VoiceHandle);

    /// Start the voice at the current clock time
    fn play_now(&mut self, voice: VoiceHandle) -> Result<(), SinkError>;

    /// Start the voice at an absolute clock time
    fn play_scheduled(&mut self, voice: VoiceHandle, clock_time: f64) -> Result<(), SinkError>;

    /// Whether the voice wraps to its first frame after its last one
    fn set_loop(&mut self, voice: VoiceHandle, looping: bool) -> Result<(), SinkError>;

    /// Frame the voice will start from (or jump to, if playing)
    fn set_position(&mut self, voice: VoiceHandle, frame: usize) -> Result<(), SinkError>;

    fn set_volume(&mut self, voice: VoiceHandle, volume: f32) -> Result<(), SinkError>;

    fn pause(&mut self, voice: VoiceHandle) -> Result<(), SinkError>;

    fn unpause(&mut self, voice: VoiceHandle) -> Result<(), SinkError>;

    /// Stop the voice and rewind it to frame 0; the voice stays allocated
    fn stop(&mut self, voice: VoiceHandle) -> Result<(), SinkError>;

    /// Monotonic sink clock in seconds
    fn clock_time(&self) -> f64;

    /// Seconds into the voice's buffer (wraps for looping voices); 0 if unknown
    fn elapsed_time(&self, voice: VoiceHandle) -> f64;

    /// Frames into the voice's buffer (wraps for looping voices); 0 if unknown
    fn position(&self, voice: VoiceHandle) -> usize;

    /// True while the voice is playing or scheduled to play
    fn is_playing(&self, voice: VoiceHandle) -> bool;
}
