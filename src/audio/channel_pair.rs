use std::sync::Arc;

use log::info;

use crate::audio::channel::Channel;
use crate::audio::sink::AudioSink;
use crate::audio::track::Track;
use crate::error::PlayerError;
use crate::models::{ChannelSlot, PlayerEvent};

/// The two channels a player alternates between, plus which one is current
#[derive(Debug)]
pub struct ChannelPair {
    channels: [Channel; 2],
    current: ChannelSlot,
}

impl ChannelPair {
    pub fn new() -> Self {
        Self {
            channels: [Channel::new(ChannelSlot::Primary), Channel::new(ChannelSlot::Secondary)],
            current: ChannelSlot::Primary,
        }
    }

    pub fn current_slot(&self) -> ChannelSlot {
        self.current
    }

    pub fn current(&self) -> &Channel {
        &self.channels[self.current.index()]
    }

    pub fn current_mut(&mut self) -> &mut Channel {
        &mut self.channels[self.current.index()]
    }

    pub fn other(&self) -> &Channel {
        &self.channels[self.current.other().index()]
    }

    pub fn other_mut(&mut self) -> &mut Channel {
        &mut self.channels[self.current.other().index()]
    }

    pub fn channel(&self, slot: ChannelSlot) -> &Channel {
        &self.channels[slot.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Channel> {
        self.channels.iter_mut()
    }

    /// Make the other channel current
    pub fn swap(&mut self) {
        self.current = self.current.other();
    }

    pub fn is_fading(&self) -> bool {
        self.channels.iter().any(Channel::is_fading)
    }

    /// Hand playback over to the other channel.
    ///
    /// The other channel starts silent first, so a scheduling failure leaves
    /// the current channel untouched. Only then does the current channel fade
    /// out (stopping when done) while the new one fades in to `volume`.
    pub fn crossfade(
        &mut self,
        sink: &mut dyn AudioSink,
        track: Arc<Track>,
        start_seconds: f64,
        loop_count: u32,
        duration: f32,
        volume: f32,
    ) -> Result<(), PlayerError> {
        let incoming = self.other_mut();
        incoming.set_volume(sink, 0.0)?;
        incoming.play(sink, track, start_seconds, loop_count)?;

        info!(
            "Crossfading {:?} -> {:?} over {:.2}s",
            self.current,
            self.current.other(),
            duration
        );

        self.current_mut().fade_out(duration, true);
        self.swap();
        self.current_mut().fade_in(sink, duration, volume)?;
        Ok(())
    }

    /// Advance both channels' fades, in slot order
    pub fn tick_fades(
        &mut self,
        sink: &mut dyn AudioSink,
        delta: f32,
        events: &mut Vec<PlayerEvent>,
    ) -> Result<(), PlayerError> {
        for channel in self.channels.iter_mut() {
            channel.tick_fade(sink, delta, events)?;
        }
        Ok(())
    }

    /// Fire both channels' due loop boundaries, in slot order
    pub fn tick_timers(&mut self, sink: &mut dyn AudioSink, events: &mut Vec<PlayerEvent>) {
        for channel in self.channels.iter_mut() {
            channel.tick_timer(sink, events);
        }
    }
}

impl Default for ChannelPair {
    fn default() -> Self {
        Self::new()
    }
}
