
mod crossfade;

use std::sync::Arc;

use crate::audio::player::{Player, Playlist};
use crate::audio::track::{LoopPoints, Track};
use mock_sink::MockSink;

/// 10 000 mono frames at 1 kHz: a 2 s intro and a 3 s loop
pub fn example_track(name: &str) -> Track {
    let samples: Vec<f32> = (0..10_000).map(|i| (i % 100) as f32 / 100.0).collect();
    Track::from_samples(name, samples, 1, 1000).with_loop_points(LoopPoints {
        loop_start: 2000,
        loop_length: 3000,
        compensate_for_frequency: true,
    })
}

pub fn example_arc(name: &str) -> Arc<Track> {
    Arc::new(example_track(name))
}

/// Player over a mock sink holding "Title" and "Battle"
pub fn example_player() -> Player<MockSink> {
    let playlist = Playlist::from_tracks([example_track("Title"), example_track("Battle")])
        .expect("unique names");
    Player::new(MockSink::new(), playlist)
}
