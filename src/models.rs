use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Loop count meaning "repeat the loop region forever"
pub const PLAY_ENDLESSLY: u32 = 0;

/// Playback state of a single channel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    PlayingIntro,
    PlayingLoop,
    Paused,
}

impl PlaybackState {
    /// Get a human-readable string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Stopped => "Stopped",
            PlaybackState::PlayingIntro => "Playing (intro)",
            PlaybackState::PlayingLoop => "Playing (loop)",
            PlaybackState::Paused => "Paused",
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::PlayingIntro | PlaybackState::PlayingLoop)
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Notifications raised by the player while ticking or starting playback
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PlayerEvent {
    FadeInComplete,
    FadeOutComplete,
    /// Playback passed the loop boundary and keeps looping
    TrackLoop,
    /// Final pass through the loop boundary of a bounded play; playback stopped
    TrackEnd,
    /// Raised alongside every `TrackLoop` and `TrackEnd`
    TrackEndOrLoop,
}

impl PlayerEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerEvent::FadeInComplete => "FADE_IN_COMPLETE",
            PlayerEvent::FadeOutComplete => "FADE_OUT_COMPLETE",
            PlayerEvent::TrackLoop => "TRACK_LOOP",
            PlayerEvent::TrackEnd => "TRACK_END",
            PlayerEvent::TrackEndOrLoop => "TRACK_END_OR_LOOP",
        }
    }
}

impl std::fmt::Display for PlayerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which of the two channels in a pair
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChannelSlot {
    Primary,
    Secondary,
}

impl ChannelSlot {
    pub fn index(self) -> usize {
        match self {
            ChannelSlot::Primary => 0,
            ChannelSlot::Secondary => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            ChannelSlot::Primary => ChannelSlot::Secondary,
            ChannelSlot::Secondary => ChannelSlot::Primary,
        }
    }
}

/// Which of a channel's two voices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceRole {
    Intro,
    Loop,
}

impl VoiceRole {
    pub fn index(self) -> usize {
        match self {
            VoiceRole::Intro => 0,
            VoiceRole::Loop => 1,
        }
    }
}

/// Snapshot of what the player is doing, for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub state: PlaybackState,
    pub track_name: Option<String>,
    pub position: Duration,
    pub length: Duration,
    pub volume: f32,
    pub current_slot: ChannelSlot,
    pub fading: bool,
    pub loops_remaining: u32,
}

impl PlayerStatus {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Stopped,
            track_name: None,
            position: Duration::ZERO,
            length: Duration::ZERO,
            volume: 1.0,
            current_slot: ChannelSlot::Primary,
            fading: false,
            loops_remaining: PLAY_ENDLESSLY,
        }
    }

    /// Get progress as a fraction (0.0 to 1.0)
    pub fn progress(&self) -> f32 {
        if self.length.is_zero() {
            0.0
        } else {
            (self.position.as_secs_f32() / self.length.as_secs_f32()).min(1.0)
        }
    }

    /// Format position as MM:SS
    pub fn position_formatted(&self) -> String {
        format_mm_ss(self.position)
    }

    /// Format length as MM:SS
    pub fn length_formatted(&self) -> String {
        format_mm_ss(self.length)
    }
}

impl Default for PlayerStatus {
    fn default() -> Self {
        Self::new()
    }
}

fn format_mm_ss(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}
