pub mod sink;
pub mod source;
pub mod track;
pub mod fade;
pub mod timer;
pub mod channel;
pub mod channel_pair;
pub mod player;
pub mod output;
pub mod decoder;
pub mod resampler;

#[cfg(test)]
pub mod tests;

// Collaborator boundaries
pub use sink::{AudioSink, VoiceHandle};
pub use source::{RawAudio, TrackSource, LOOP_LENGTH_TAG, LOOP_START_TAG};

// Looping engine
pub use track::{LoopPoints, LoopTags, Track, TrackBuffers};
pub use fade::{FadeController, FadeStatus};
pub use timer::LoopTimer;
pub use channel::Channel;
pub use channel_pair::ChannelPair;
pub use player::{IntoTrack, Player, Playlist};

// Concrete device and file backends
pub use output::{CpalSink, Mixer};
pub use decoder::SymphoniaSource;
pub use resampler::LinearResampler;
