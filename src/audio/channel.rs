use std::sync::Arc;

use log::{debug, info};

use crate::audio::fade::FadeController;
use crate::audio::sink::{AudioSink, VoiceHandle};
use crate::audio::timer::LoopTimer;
use crate::audio::track::{Track, TrackBuffers};
use crate::error::{PlayerError, SinkError};
use crate::models::{ChannelSlot, PlaybackState, PlayerEvent, VoiceRole, PLAY_ENDLESSLY};

/// One playback slot ("speaker"): an intro voice and a loop voice.
///
/// The intro voice plays the lead-in once; the loop voice is scheduled on the
/// sink clock to start exactly where the intro ends and then repeats on its
/// own. The channel only keeps bookkeeping: which voices it holds, where it
/// paused, how many loop passes remain and its fade.
#[derive(Debug)]
pub struct Channel {
    slot: ChannelSlot,
    track: Option<Arc<Track>>,
    voices: [Option<VoiceHandle>; 2],
    state: PlaybackState,
    pause_position: Option<usize>,
    loops_remaining: u32,
    volume: f32,
    fade: FadeController,
    timer: LoopTimer,
    generation: u64,
    loop_start_clock: f64,
    /// Boundaries fired outside a tick, delivered on the next one
    pending: Vec<PlayerEvent>,
}

impl Channel {
    pub fn new(slot: ChannelSlot) -> Self {
        Self {
            slot,
            track: None,
            voices: [None, None],
            state: PlaybackState::Stopped,
            pause_position: None,
            loops_remaining: PLAY_ENDLESSLY,
            volume: 1.0,
            fade: FadeController::new(),
            timer: LoopTimer::new(),
            generation: 0,
            loop_start_clock: 0.0,
            pending: Vec::new(),
        }
    }

    pub fn slot(&self) -> ChannelSlot {
        self.slot
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    pub fn track(&self) -> Option<&Arc<Track>> {
        self.track.as_ref()
    }

    /// Frame the channel will resume from; `Some` exactly while paused
    pub fn pause_position(&self) -> Option<usize> {
        self.pause_position
    }

    /// Loop passes left before `TrackEnd`; 0 plays endlessly
    pub fn loops_remaining(&self) -> u32 {
        self.loops_remaining
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn fade(&self) -> &FadeController {
        &self.fade
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_fading()
    }

    pub fn voice(&self, role: VoiceRole) -> Option<VoiceHandle> {
        self.voices[role.index()]
    }

    /// Start `track` at `start_seconds`, cancelling whatever this channel was
    /// doing, including an in-flight fade
    pub fn play(
        &mut self,
        sink: &mut dyn AudioSink,
        track: Arc<Track>,
        start_seconds: f64,
        loop_count: u32,
    ) -> Result<(), PlayerError> {
        let frame = track.buffers()?.seconds_to_frames(start_seconds);
        self.play_from_frame(sink, track, frame, loop_count)
    }

    /// Start `track` at a frame offset into intro plus loop
    pub fn play_from_frame(
        &mut self,
        sink: &mut dyn AudioSink,
        track: Arc<Track>,
        frame: usize,
        loop_count: u32,
    ) -> Result<(), PlayerError> {
        self.fade.cancel();

        info!(
            "[{:?}] Playing '{}' from frame {} ({} loops)",
            self.slot,
            track.name(),
            frame,
            loop_count
        );
        self.restart_at(sink, track, frame, loop_count)
    }

    /// Move the playhead. Stopped: nothing happens. Paused: only the resume
    /// point moves. Playing: playback restarts at the new point with the
    /// remaining loop count preserved.
    pub fn scrub(&mut self, sink: &mut dyn AudioSink, seconds: f64) -> Result<(), PlayerError> {
        let Some(track) = self.track.clone() else {
            return Ok(());
        };
        let buffers = track.buffers()?;
        let frame = buffers.seconds_to_frames(seconds).min(buffers.length_frames() - 1);

        match self.state {
            PlaybackState::Stopped => Ok(()),
            PlaybackState::Paused => {
                debug!("[{:?}] Scrub while paused to frame {}", self.slot, frame);
                self.pause_position = Some(frame);
                Ok(())
            }
            PlaybackState::PlayingIntro | PlaybackState::PlayingLoop => {
                if self.fire_passed_boundaries(sink) {
                    return Ok(());
                }
                debug!("[{:?}] Scrub to frame {}", self.slot, frame);
                let loops = self.loops_remaining;
                self.restart_at(sink, track, frame, loops)
            }
        }
    }

    pub fn pause(&mut self, sink: &mut dyn AudioSink) {
        if !self.state.is_playing() || self.fire_passed_boundaries(sink) {
            return;
        }
        let frame = self.current_frame(sink);
        self.release_voices(sink);
        self.timer.cancel();
        self.pause_position = Some(frame);
        self.state = PlaybackState::Paused;
        info!("[{:?}] Paused at frame {}", self.slot, frame);
    }

    pub fn unpause(&mut self, sink: &mut dyn AudioSink) -> Result<(), PlayerError> {
        let (Some(frame), Some(track)) = (self.pause_position, self.track.clone()) else {
            return Ok(());
        };
        info!("[{:?}] Resuming at frame {}", self.slot, frame);
        let loops = self.loops_remaining;
        self.restart_at(sink, track, frame, loops)
    }

    /// Halt both voices and forget the track
    pub fn stop(&mut self, sink: &mut dyn AudioSink) {
        if self.track.is_some() {
            info!("[{:?}] Stopped", self.slot);
        }
        self.release_voices(sink);
        self.timer.cancel();
        self.fade.cancel();
        self.reset();
    }

    /// Seconds into the track: the intro voice's elapsed time while it plays,
    /// otherwise the intro length plus the loop voice's elapsed time
    pub fn current_time(&self, sink: &dyn AudioSink) -> f64 {
        let Some(buffers) = self.buffers() else {
            return 0.0;
        };
        if let Some(frame) = self.pause_position {
            return buffers.frames_to_seconds(frame);
        }
        match (self.voice(VoiceRole::Intro), self.voice(VoiceRole::Loop)) {
            (Some(intro), _) if sink.is_playing(intro) => sink.elapsed_time(intro),
            (_, Some(looped)) if sink.is_playing(looped) => {
                buffers.intro_seconds() + sink.elapsed_time(looped)
            }
            _ => 0.0,
        }
    }

    /// Seconds of intro plus one loop pass; 0.0 when stopped
    pub fn current_length(&self) -> f64 {
        self.buffers().map(TrackBuffers::length_seconds).unwrap_or(0.0)
    }

    /// Set the channel volume and apply it to both voices
    pub fn set_volume(&mut self, sink: &mut dyn AudioSink, volume: f32) -> Result<(), SinkError> {
        self.volume = volume;
        for voice in self.voices.iter().flatten() {
            sink.set_volume(*voice, volume)?;
        }
        Ok(())
    }

    pub fn fade_in(&mut self, sink: &mut dyn AudioSink, duration: f32, destination: f32) -> Result<(), SinkError> {
        self.fade.fade_in(duration, destination);
        debug!("[{:?}] Fading in to {:.2} over {:.2}s", self.slot, destination, duration);
        match self.fade.current_volume() {
            Some(start) => self.set_volume(sink, start),
            None => Ok(()),
        }
    }

    pub fn fade_out(&mut self, duration: f32, stop_after_fade: bool) {
        debug!(
            "[{:?}] Fading out from {:.2} over {:.2}s (stop after: {})",
            self.slot, self.volume, duration, stop_after_fade
        );
        self.fade.fade_out(duration, self.volume, stop_after_fade);
    }

    pub fn cancel_fade(&mut self) {
        self.fade.cancel();
    }

    /// Advance the fade by one frame of `delta` seconds
    pub fn tick_fade(
        &mut self,
        sink: &mut dyn AudioSink,
        delta: f32,
        events: &mut Vec<PlayerEvent>,
    ) -> Result<(), SinkError> {
        let step = self.fade.advance(delta);
        if let Some(volume) = step.volume {
            self.set_volume(sink, volume)?;
        }
        if let Some(event) = step.completed {
            debug!("[{:?}] {}", self.slot, event);
            events.push(event);
        }
        if step.stop {
            self.stop(sink);
        }
        Ok(())
    }

    /// Fire every end-or-loop boundary the sink clock has passed
    pub fn tick_timer(&mut self, sink: &mut dyn AudioSink, events: &mut Vec<PlayerEvent>) {
        events.append(&mut self.pending);
        if !self.state.is_playing() {
            return;
        }

        if self.state == PlaybackState::PlayingIntro && sink.clock_time() >= self.loop_start_clock {
            debug!("[{:?}] Intro finished, loop voice active", self.slot);
            self.state = PlaybackState::PlayingLoop;
        }

        self.fire_boundaries(sink, events);
    }

    /// Count down and report due boundaries; true when the final pass ended
    fn fire_boundaries(&mut self, sink: &mut dyn AudioSink, events: &mut Vec<PlayerEvent>) -> bool {
        let clock = sink.clock_time();
        while let Some(generation) = self.timer.poll(clock) {
            if generation != self.generation {
                break;
            }
            if self.loops_remaining == 1 {
                info!("[{:?}] Final loop pass complete", self.slot);
                self.stop(sink);
                events.push(PlayerEvent::TrackEnd);
                events.push(PlayerEvent::TrackEndOrLoop);
                return true;
            }
            if self.loops_remaining > 1 {
                self.loops_remaining -= 1;
            }
            events.push(PlayerEvent::TrackLoop);
            events.push(PlayerEvent::TrackEndOrLoop);
        }
        false
    }

    /// Settle boundaries passed since the last tick before the timer is
    /// cancelled; their events wait for the next tick
    fn fire_passed_boundaries(&mut self, sink: &mut dyn AudioSink) -> bool {
        let mut events = std::mem::take(&mut self.pending);
        let ended = self.fire_boundaries(sink, &mut events);
        self.pending = events;
        ended
    }

    /// Frame position in the whole track, read from whichever voice is active
    pub fn current_frame(&self, sink: &dyn AudioSink) -> usize {
        if let Some(frame) = self.pause_position {
            return frame;
        }
        let Some(buffers) = self.buffers() else {
            return 0;
        };
        match (self.voice(VoiceRole::Intro), self.voice(VoiceRole::Loop)) {
            (Some(intro), _) if sink.is_playing(intro) => sink.position(intro),
            (_, Some(looped)) if sink.is_playing(looped) => buffers.intro_frames + sink.position(looped),
            _ => 0,
        }
    }

    fn buffers(&self) -> Option<&TrackBuffers> {
        self.track.as_ref().and_then(|track| track.buffers().ok())
    }

    /// (Re)start playback at `frame` without touching the fade
    fn restart_at(
        &mut self,
        sink: &mut dyn AudioSink,
        track: Arc<Track>,
        frame: usize,
        loop_count: u32,
    ) -> Result<(), PlayerError> {
        let buffers = track.buffers()?.clone();
        self.release_voices(sink);
        self.timer.cancel();
        self.pause_position = None;

        if let Err(err) = self.schedule(sink, &buffers, frame) {
            self.release_voices(sink);
            self.timer.cancel();
            self.reset();
            return Err(err.into());
        }

        self.track = Some(track);
        self.loops_remaining = loop_count;
        Ok(())
    }

    fn schedule(&mut self, sink: &mut dyn AudioSink, buffers: &TrackBuffers, frame: usize) -> Result<(), SinkError> {
        let frame = frame.min(buffers.length_frames() - 1);
        let rate = buffers.sample_rate as f64;
        // Every start time below derives from this one clock read
        let now = sink.clock_time();

        let looped = self.create_voice(sink, VoiceRole::Loop, buffers.looped.clone(), buffers)?;
        sink.set_loop(looped, true)?;

        if frame < buffers.intro_frames {
            let intro = self.create_voice(sink, VoiceRole::Intro, buffers.intro.clone(), buffers)?;
            sink.set_loop(intro, false)?;
            sink.set_position(intro, frame)?;

            let handoff = now + (buffers.intro_frames - frame) as f64 / rate;
            sink.play_scheduled(intro, now)?;
            sink.set_position(looped, 0)?;
            sink.play_scheduled(looped, handoff)?;

            debug!(
                "[{:?}] Intro from frame {} at {:.6}, loop voice scheduled at {:.6}",
                self.slot, frame, now, handoff
            );
            self.loop_start_clock = handoff;
            self.state = PlaybackState::PlayingIntro;
        } else {
            let offset = frame - buffers.intro_frames;
            sink.set_position(looped, offset)?;
            sink.play_scheduled(looped, now)?;

            debug!("[{:?}] Loop voice from frame {} at {:.6}", self.slot, offset, now);
            self.loop_start_clock = now;
            self.state = PlaybackState::PlayingLoop;
        }

        let first_fire = now + (buffers.length_frames() - frame) as f64 / rate;
        self.generation = self.timer.arm(first_fire, buffers.loop_seconds());
        debug!(
            "[{:?}] End-or-loop timer at {:.6}, every {:.6}s",
            self.slot,
            first_fire,
            buffers.loop_seconds()
        );
        Ok(())
    }

    fn create_voice(
        &mut self,
        sink: &mut dyn AudioSink,
        role: VoiceRole,
        buffer: Arc<[f32]>,
        buffers: &TrackBuffers,
    ) -> Result<VoiceHandle, SinkError> {
        let voice = sink.create_voice(buffer, buffers.channels, buffers.sample_rate)?;
        self.voices[role.index()] = Some(voice);
        sink.set_volume(voice, self.volume)?;
        Ok(voice)
    }

    fn release_voices(&mut self, sink: &mut dyn AudioSink) {
        for voice in self.voices.iter_mut() {
            if let Some(handle) = voice.take() {
                sink.release_voice(handle);
            }
        }
    }

    fn reset(&mut self) {
        self.track = None;
        self.pause_position = None;
        self.loops_remaining = PLAY_ENDLESSLY;
        self.state = PlaybackState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tests::mock_sink::MockSink;
    use crate::audio::track::LoopPoints;

    fn track() -> Arc<Track> {
        let samples: Vec<f32> = (0..10_000).map(|i| i as f32).collect();
        Arc::new(Track::from_samples("Example", samples, 1, 1000).with_loop_points(LoopPoints {
            loop_start: 2000,
            loop_length: 3000,
            compensate_for_frequency: true,
        }))
    }

    #[test]
    fn test_new_channel_is_stopped() {
        let channel = Channel::new(ChannelSlot::Primary);
        assert_eq!(channel.state(), PlaybackState::Stopped);
        assert!(channel.track().is_none());
        assert!(channel.pause_position().is_none());
        assert_eq!(channel.current_length(), 0.0);
    }

    #[test]
    fn test_play_from_start_schedules_intro_then_loop() {
        let mut sink = MockSink::new();
        let mut channel = Channel::new(ChannelSlot::Primary);

        channel.play(&mut sink, track(), 0.0, PLAY_ENDLESSLY).unwrap();

        assert_eq!(channel.state(), PlaybackState::PlayingIntro);
        let intro = channel.voice(VoiceRole::Intro).unwrap();
        let looped = channel.voice(VoiceRole::Loop).unwrap();
        assert_eq!(sink.scheduled_at(intro), Some(0.0));
        assert_eq!(sink.scheduled_at(looped), Some(2.0));
        assert!(sink.is_looping(looped));
        assert!(!sink.is_looping(intro));
    }

    #[test]
    fn test_play_inside_loop_skips_intro() {
        let mut sink = MockSink::new();
        let mut channel = Channel::new(ChannelSlot::Primary);

        channel.play(&mut sink, track(), 3.5, PLAY_ENDLESSLY).unwrap();

        assert_eq!(channel.state(), PlaybackState::PlayingLoop);
        assert!(channel.voice(VoiceRole::Intro).is_none());
        let looped = channel.voice(VoiceRole::Loop).unwrap();
        assert_eq!(sink.position(looped), 1500);
        assert!((channel.current_time(&sink) - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_stop_releases_everything() {
        let mut sink = MockSink::new();
        let mut channel = Channel::new(ChannelSlot::Secondary);
        channel.play(&mut sink, track(), 0.0, 2).unwrap();

        channel.stop(&mut sink);

        assert_eq!(channel.state(), PlaybackState::Stopped);
        assert!(channel.track().is_none());
        assert_eq!(channel.loops_remaining(), PLAY_ENDLESSLY);
        assert_eq!(sink.live_voices(), 0);
    }

    #[test]
    fn test_scrub_when_stopped_is_noop() {
        let mut sink = MockSink::new();
        let mut channel = Channel::new(ChannelSlot::Primary);

        channel.scrub(&mut sink, 3.0).unwrap();

        assert_eq!(channel.state(), PlaybackState::Stopped);
        assert_eq!(sink.live_voices(), 0);
    }

    #[test]
    fn test_scheduling_failure_reverts_to_stopped() {
        let mut sink = MockSink::new();
        let mut channel = Channel::new(ChannelSlot::Primary);
        sink.fail_schedules(true);

        let err = channel.play(&mut sink, track(), 0.0, PLAY_ENDLESSLY).unwrap_err();

        assert!(matches!(err, PlayerError::Scheduling(_)));
        assert_eq!(channel.state(), PlaybackState::Stopped);
        assert!(channel.track().is_none());
        assert_eq!(sink.live_voices(), 0);
    }

    #[test]
    fn test_play_from_frame_in_intro() {
        let mut sink = MockSink::new();
        sink.set_clock(1.0);
        let mut channel = Channel::new(ChannelSlot::Primary);

        channel.play_from_frame(&mut sink, track(), 1500, 2).unwrap();

        let intro = channel.voice(VoiceRole::Intro).unwrap();
        let looped = channel.voice(VoiceRole::Loop).unwrap();
        assert_eq!(sink.position(intro), 1500);
        assert_eq!(sink.scheduled_at(looped), Some(1.5));
        assert_eq!(channel.loops_remaining(), 2);
        assert!((channel.current_time(&sink) - 1.5).abs() < 1e-9);
    }
}
