use super::{example_arc, example_player};
use crate::audio::channel::Channel;
use crate::audio::tests::mock_sink::MockSink;
use crate::error::PlayerError;
use crate::models::{ChannelSlot, PlaybackState, PlayerEvent, VoiceRole, PLAY_ENDLESSLY};

const HALF_POWER: f32 = std::f32::consts::FRAC_1_SQRT_2;

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

#[test]
fn test_crossfade_starts_new_track_silent() {
    let mut player = example_player();
    player.play("Title", PLAY_ENDLESSLY).unwrap();

    player.crossfade_to("Battle").unwrap();

    let incoming = player.channels().current();
    assert_eq!(incoming.slot(), ChannelSlot::Secondary);
    assert_eq!(incoming.track().unwrap().name(), "Battle");
    let intro = incoming.voice(VoiceRole::Intro).unwrap();
    let looped = incoming.voice(VoiceRole::Loop).unwrap();
    assert_eq!(player.sink().voice_volume(intro), Some(0.0));
    assert_eq!(player.sink().voice_volume(looped), Some(0.0));

    let outgoing = player.channels().other();
    assert_eq!(outgoing.track().unwrap().name(), "Title");
    assert_eq!(outgoing.volume(), 1.0);
}

#[test]
fn test_crossfade_is_equal_power_midway() {
    let mut player = example_player();
    player.play("Title", PLAY_ENDLESSLY).unwrap();
    player.crossfade_to("Battle").unwrap();

    player.sink_mut().advance(1.0);
    let events = player.tick(1.0).unwrap();

    assert!(events.is_empty());
    let outgoing = player.channels().other().volume();
    let incoming = player.channels().current().volume();
    assert!(close(outgoing, HALF_POWER), "outgoing {}", outgoing);
    assert!(close(incoming, HALF_POWER), "incoming {}", incoming);
    assert!(close(outgoing * outgoing + incoming * incoming, 1.0));

    let voice = player.channels().current().voice(VoiceRole::Intro).unwrap();
    assert!(close(player.sink().voice_volume(voice).unwrap(), HALF_POWER));
}

#[test]
fn test_crossfade_completion_stops_outgoing_channel() {
    let mut player = example_player();
    player.play("Title", PLAY_ENDLESSLY).unwrap();
    player.crossfade_to("Battle").unwrap();

    player.sink_mut().advance(1.0);
    player.tick(1.0).unwrap();
    player.sink_mut().advance(1.0);
    let events = player.tick(1.0).unwrap();

    // Slot order: the outgoing Primary channel reports first
    assert_eq!(events, vec![PlayerEvent::FadeOutComplete, PlayerEvent::FadeInComplete]);
    assert_eq!(player.channels().other().state(), PlaybackState::Stopped);
    assert!(player.channels().other().track().is_none());
    assert_eq!(player.channels().current().volume(), 1.0);
    assert!(!player.channels().is_fading());
    assert_eq!(player.playing_track().unwrap().name(), "Battle");
}

#[test]
fn test_crossfade_fades_to_master_volume() {
    let mut player = example_player();
    assert!(player.set_volume(0.5).unwrap());
    player.play("Title", PLAY_ENDLESSLY).unwrap();
    player.crossfade_to("Battle").unwrap();

    player.sink_mut().advance(2.0);
    player.tick(2.0).unwrap();

    assert_eq!(player.channels().current().volume(), 0.5);
}

#[test]
fn test_crossfade_from_point() {
    let mut player = example_player();
    player.play("Title", PLAY_ENDLESSLY).unwrap();

    player.crossfade_at_point("Battle", 3.0).unwrap();

    let incoming = player.channels().current();
    assert_eq!(incoming.state(), PlaybackState::PlayingLoop);
    assert_eq!(incoming.loops_remaining(), PLAY_ENDLESSLY);
    assert!((player.current_time() - 3.0).abs() < 1e-9);
}

#[test]
fn test_crossfade_failure_changes_nothing() {
    let mut player = example_player();
    player.play("Title", PLAY_ENDLESSLY).unwrap();
    player.sink_mut().fail_schedules(true);

    let result = player.crossfade_to("Battle");

    assert!(matches!(result, Err(PlayerError::Scheduling(_))));
    assert_eq!(player.channels().current_slot(), ChannelSlot::Primary);
    assert_eq!(player.playing_track().unwrap().name(), "Title");
    assert!(!player.channels().is_fading());
    assert_eq!(player.channels().current().volume(), 1.0);
}

#[test]
fn test_crossfade_unknown_track_changes_nothing() {
    let mut player = example_player();
    player.play("Title", PLAY_ENDLESSLY).unwrap();

    let result = player.crossfade_to("Nope");

    assert!(matches!(result, Err(PlayerError::TrackNotFound { name }) if name == "Nope"));
    assert_eq!(player.channels().current_slot(), ChannelSlot::Primary);
    assert!(!player.channels().is_fading());
}

#[test]
fn test_set_volume_ignored_while_fading() {
    let mut player = example_player();
    player.play("Title", PLAY_ENDLESSLY).unwrap();
    player.crossfade_to("Battle").unwrap();

    assert!(!player.set_volume(0.3).unwrap());
    assert_eq!(player.volume(), 1.0);

    player.sink_mut().advance(2.0);
    player.tick(2.0).unwrap();

    assert!(player.set_volume(0.3).unwrap());
    assert_eq!(player.volume(), 0.3);
    assert_eq!(player.channels().current().volume(), 0.3);
}

#[test]
fn test_play_during_crossfade_cancels_both_fades() {
    let mut player = example_player();
    player.play("Title", PLAY_ENDLESSLY).unwrap();
    player.crossfade_to("Battle").unwrap();
    player.sink_mut().advance(1.0);
    player.tick(1.0).unwrap();

    player.play("Title", 2).unwrap();

    assert!(!player.channels().is_fading());
    assert_eq!(player.channels().other().state(), PlaybackState::Stopped);
    for channel in player.channels().iter() {
        assert_eq!(channel.volume(), 1.0);
    }
    let intro = player.channels().current().voice(VoiceRole::Intro).unwrap();
    assert_eq!(player.sink().voice_volume(intro), Some(1.0));

    // No fade completions arrive later
    player.sink_mut().advance(1.0);
    assert!(player.tick(1.0).unwrap().is_empty());
}

#[test]
fn test_play_after_fade_out_restores_master_volume() {
    let mut player = example_player();
    player.play("Title", PLAY_ENDLESSLY).unwrap();
    player.fade_out();
    player.sink_mut().advance(2.0);
    let events = player.tick(2.0).unwrap();

    assert_eq!(events, vec![PlayerEvent::FadeOutComplete]);
    assert!(player.channels().current().is_playing());
    assert_eq!(player.channels().current().volume(), 0.0);

    player.play("Battle", PLAY_ENDLESSLY).unwrap();

    assert_eq!(player.channels().current().volume(), 1.0);
    let looped = player.channels().current().voice(VoiceRole::Loop).unwrap();
    assert_eq!(player.sink().voice_volume(looped), Some(1.0));
}

#[test]
fn test_fade_in_at_point_starts_silent() {
    let mut player = example_player();

    player.fade_in_at_point("Title", 1.0).unwrap();

    let channel = player.channels().current();
    assert!(channel.is_fading());
    assert_eq!(channel.volume(), 0.0);
    let intro = channel.voice(VoiceRole::Intro).unwrap();
    assert_eq!(player.sink().voice_volume(intro), Some(0.0));

    player.sink_mut().advance(2.0);
    assert_eq!(player.tick(2.0).unwrap(), vec![PlayerEvent::FadeInComplete]);
    assert_eq!(player.channels().current().volume(), 1.0);
}

#[test]
fn test_fades_are_applied_before_loop_boundaries() {
    let mut player = example_player();
    player.set_crossfade_time(1.0);

    // Starting 1 s before the end of the first pass
    player.fade_in_at_point("Title", 4.0).unwrap();
    player.sink_mut().advance(1.0);
    let events = player.tick(1.0).unwrap();

    assert_eq!(
        events,
        vec![
            PlayerEvent::FadeInComplete,
            PlayerEvent::TrackLoop,
            PlayerEvent::TrackEndOrLoop,
        ]
    );
}

#[test]
fn test_fade_out_with_stop_stops_channel() {
    let mut sink = MockSink::new();
    let mut channel = Channel::new(ChannelSlot::Primary);
    channel.play(&mut sink, example_arc("Title"), 0.0, PLAY_ENDLESSLY).unwrap();
    channel.fade_out(1.0, true);

    let mut events = Vec::new();
    channel.tick_fade(&mut sink, 0.5, &mut events).unwrap();
    assert!(events.is_empty());
    assert!(channel.is_playing());

    channel.tick_fade(&mut sink, 0.5, &mut events).unwrap();

    assert_eq!(events, vec![PlayerEvent::FadeOutComplete]);
    assert_eq!(channel.state(), PlaybackState::Stopped);
    assert!(!channel.is_fading());
    assert_eq!(sink.live_voices(), 0);
}

#[test]
fn test_zero_length_fade_completes_on_next_tick() {
    let mut player = example_player();
    player.set_crossfade_time(0.0);
    player.play("Title", PLAY_ENDLESSLY).unwrap();

    player.crossfade_to("Battle").unwrap();
    let events = player.tick(0.0).unwrap();

    assert_eq!(events, vec![PlayerEvent::FadeOutComplete, PlayerEvent::FadeInComplete]);
    assert_eq!(player.channels().current().volume(), 1.0);
    assert_eq!(player.channels().other().state(), PlaybackState::Stopped);
}
