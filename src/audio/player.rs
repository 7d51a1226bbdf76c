use std::sync::Arc;

use log::{debug, info, warn};

use crate::audio::channel_pair::ChannelPair;
use crate::audio::sink::AudioSink;
use crate::audio::source::TrackSource;
use crate::audio::track::Track;
use crate::config::{PlayerConfig, PlaylistConfig};
use crate::error::{ConfigError, PlayerError};
use crate::models::{PlayerEvent, PlayerStatus, PLAY_ENDLESSLY};

/// Named tracks available to a player, in playlist order
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    tracks: Vec<Arc<Track>>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tracks(tracks: impl IntoIterator<Item = Track>) -> Result<Self, PlayerError> {
        let mut playlist = Self::new();
        for track in tracks {
            playlist.push(track)?;
        }
        Ok(playlist)
    }

    /// Decode and tag every entry of a playlist file through `source`
    pub fn from_config(config: &PlaylistConfig, source: &dyn TrackSource) -> Result<Self, PlayerError> {
        let mut playlist = Self::new();
        for entry in &config.tracks {
            info!("Loading track '{}' from {}", entry.name, entry.path.display());
            playlist.push(Track::from_source(entry, source)?)?;
        }
        Ok(playlist)
    }

    /// Add a track; names are unique keys
    pub fn push(&mut self, track: Track) -> Result<(), PlayerError> {
        if self.get(track.name()).is_some() {
            return Err(ConfigError::DuplicateTrack {
                name: track.name().to_string(),
            }
            .into());
        }
        self.tracks.push(Arc::new(track));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Track>> {
        self.tracks.iter().find(|track| track.name() == name)
    }

    pub fn tracks(&self) -> &[Arc<Track>] {
        &self.tracks
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tracks.iter().map(|track| track.name())
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Derive every track's buffers now instead of on first play
    pub fn prepare_all(&self) -> Result<(), PlayerError> {
        for track in &self.tracks {
            let buffers = track.buffers()?;
            debug!(
                "Prepared '{}': {:.3}s intro, {:.3}s loop",
                track.name(),
                buffers.intro_seconds(),
                buffers.loop_seconds()
            );
        }
        Ok(())
    }
}

/// Anything a player can resolve to a track: a playlist name or the track itself
pub trait IntoTrack {
    fn into_track(self, playlist: &Playlist) -> Result<Arc<Track>, PlayerError>;
}

impl IntoTrack for &str {
    fn into_track(self, playlist: &Playlist) -> Result<Arc<Track>, PlayerError> {
        playlist
            .get(self)
            .cloned()
            .ok_or_else(|| PlayerError::TrackNotFound { name: self.to_string() })
    }
}

impl IntoTrack for &String {
    fn into_track(self, playlist: &Playlist) -> Result<Arc<Track>, PlayerError> {
        self.as_str().into_track(playlist)
    }
}

impl IntoTrack for String {
    fn into_track(self, playlist: &Playlist) -> Result<Arc<Track>, PlayerError> {
        self.as_str().into_track(playlist)
    }
}

impl IntoTrack for Arc<Track> {
    fn into_track(self, _playlist: &Playlist) -> Result<Arc<Track>, PlayerError> {
        Ok(self)
    }
}

impl IntoTrack for &Arc<Track> {
    fn into_track(self, _playlist: &Playlist) -> Result<Arc<Track>, PlayerError> {
        Ok(Arc::clone(self))
    }
}

type Listener = Box<dyn FnMut(PlayerEvent)>;

/// Looping music player: two channels over one audio sink.
///
/// Nothing happens on its own; the host calls [`Player::tick`] once per frame
/// to advance fades and fire loop events.
pub struct Player<S: AudioSink> {
    sink: S,
    playlist: Playlist,
    channels: ChannelPair,
    volume: f32,
    crossfade_time: f32,
    listeners: Vec<Listener>,
}

impl<S: AudioSink> Player<S> {
    pub fn new(sink: S, playlist: Playlist) -> Self {
        Self::with_config(sink, playlist, &PlayerConfig::default())
    }

    pub fn with_config(sink: S, playlist: Playlist, config: &PlayerConfig) -> Self {
        Self {
            sink,
            playlist,
            channels: ChannelPair::new(),
            volume: config.default_volume.clamp(0.0, 1.0),
            crossfade_time: config.crossfade_time.max(0.0),
            listeners: Vec::new(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn channels(&self) -> &ChannelPair {
        &self.channels
    }

    /// Master volume
    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn crossfade_time(&self) -> f32 {
        self.crossfade_time
    }

    /// Duration used by crossfades and by `fade_in`/`fade_out`
    pub fn set_crossfade_time(&mut self, seconds: f32) {
        self.crossfade_time = seconds.max(0.0);
    }

    /// Register a callback for every event raised from `tick`
    pub fn subscribe(&mut self, listener: impl FnMut(PlayerEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn prepare_all(&self) -> Result<(), PlayerError> {
        self.playlist.prepare_all()
    }

    pub fn play(&mut self, track: impl IntoTrack, loop_count: u32) -> Result<(), PlayerError> {
        self.play_at_point(track, 0.0, loop_count)
    }

    /// Play on the current channel from `seconds`.
    ///
    /// Any fade on either channel is dropped, the other channel is stopped and
    /// both channels return to the master volume.
    pub fn play_at_point(&mut self, track: impl IntoTrack, seconds: f64, loop_count: u32) -> Result<(), PlayerError> {
        let track = track.into_track(&self.playlist)?;
        let volume = self.volume;

        for channel in self.channels.iter_mut() {
            channel.cancel_fade();
        }
        self.channels.other_mut().stop(&mut self.sink);
        for channel in self.channels.iter_mut() {
            channel.set_volume(&mut self.sink, volume)?;
        }

        self.channels.current_mut().play(&mut self.sink, track, seconds, loop_count)
    }

    pub fn crossfade_to(&mut self, track: impl IntoTrack) -> Result<(), PlayerError> {
        self.crossfade_at_point(track, 0.0)
    }

    /// Fade the current track out while `track` fades in from `seconds` on the
    /// other channel
    pub fn crossfade_at_point(&mut self, track: impl IntoTrack, seconds: f64) -> Result<(), PlayerError> {
        let track = track.into_track(&self.playlist)?;
        self.channels.crossfade(
            &mut self.sink,
            track,
            seconds,
            PLAY_ENDLESSLY,
            self.crossfade_time,
            self.volume,
        )
    }

    /// Start `track` at `seconds` from silence and fade it in
    pub fn fade_in_at_point(&mut self, track: impl IntoTrack, seconds: f64) -> Result<(), PlayerError> {
        self.play_at_point(track, seconds, PLAY_ENDLESSLY)?;
        self.fade_in()
    }

    /// Fade the current channel in to the master volume
    pub fn fade_in(&mut self) -> Result<(), PlayerError> {
        let (duration, volume) = (self.crossfade_time, self.volume);
        self.channels.current_mut().fade_in(&mut self.sink, duration, volume)?;
        Ok(())
    }

    /// Fade the current channel to silence; playback keeps running
    pub fn fade_out(&mut self) {
        let duration = self.crossfade_time;
        self.channels.current_mut().fade_out(duration, false);
    }

    pub fn pause(&mut self) {
        self.channels.current_mut().pause(&mut self.sink);
    }

    pub fn unpause(&mut self) -> Result<(), PlayerError> {
        self.channels.current_mut().unpause(&mut self.sink)
    }

    pub fn scrub(&mut self, seconds: f64) -> Result<(), PlayerError> {
        self.channels.current_mut().scrub(&mut self.sink, seconds)
    }

    /// Scrub to `fraction` (0.0 to 1.0) of intro plus one loop
    pub fn scrub_as_percentage(&mut self, fraction: f64) -> Result<(), PlayerError> {
        let length = self.current_length();
        self.scrub(fraction.clamp(0.0, 1.0) * length)
    }

    /// Change the master volume. Ignored while either channel is fading;
    /// returns whether the change was applied.
    pub fn set_volume(&mut self, volume: f32) -> Result<bool, PlayerError> {
        if self.channels.is_fading() {
            warn!("Ignoring volume change to {:.2} while fading", volume);
            return Ok(false);
        }
        self.volume = volume.clamp(0.0, 1.0);
        for channel in self.channels.iter_mut() {
            channel.set_volume(&mut self.sink, self.volume)?;
        }
        debug!("Master volume set to {:.2}", self.volume);
        Ok(true)
    }

    /// Stop both channels
    pub fn stop(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.stop(&mut self.sink);
        }
    }

    pub fn current_time(&self) -> f64 {
        self.channels.current().current_time(&self.sink)
    }

    pub fn current_length(&self) -> f64 {
        self.channels.current().current_length()
    }

    /// Track assigned to the current channel, playing or paused
    pub fn playing_track(&self) -> Option<&Arc<Track>> {
        self.channels.current().track()
    }

    pub fn status(&self) -> PlayerStatus {
        let current = self.channels.current();
        PlayerStatus {
            state: current.state(),
            track_name: current.track().map(|track| track.name().to_string()),
            position: seconds(self.current_time()),
            length: seconds(self.current_length()),
            volume: self.volume,
            current_slot: self.channels.current_slot(),
            fading: self.channels.is_fading(),
            loops_remaining: current.loops_remaining(),
        }
    }

    /// Advance one frame of `delta` seconds.
    ///
    /// Fades on both channels are applied first, then due loop boundaries
    /// fire, then listeners see the resulting events in order. The events are
    /// also returned.
    pub fn tick(&mut self, delta: f32) -> Result<Vec<PlayerEvent>, PlayerError> {
        let mut events = Vec::new();
        let fades = self.channels.tick_fades(&mut self.sink, delta, &mut events);
        self.channels.tick_timers(&mut self.sink, &mut events);

        for event in &events {
            for listener in self.listeners.iter_mut() {
                listener(*event);
            }
        }
        fades.map(|()| events)
    }
}

fn seconds(value: f64) -> std::time::Duration {
    std::time::Duration::from_secs_f64(value.max(0.0))
}
