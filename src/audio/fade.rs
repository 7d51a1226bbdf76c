use std::f32::consts::PI;

use crate::models::PlayerEvent;

/// Direction of a volume ramp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeStatus {
    Static,
    FadingIn,
    FadingOut,
}

/// Equal-power gain for a fade whose remaining fraction is `remaining`
/// (1.0 = just started, 0.0 = done).
///
/// Fading in, the gain rises from 0 to 1 as `remaining` falls; fading out
/// uses the complementary phase and falls from 1 to 0.
pub fn equal_power_gain(remaining: f32, fading_in: bool) -> f32 {
    let t = remaining.clamp(0.0, 1.0);
    let phase = if fading_in { t } else { 1.0 - t };
    // cos(PI / 2) is slightly negative in f32
    (phase / 2.0 * PI).cos().max(0.0)
}

/// Outcome of advancing a fade by one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeStep {
    /// Volume to apply this frame, `None` while static
    pub volume: Option<f32>,
    /// Set on the frame the fade finishes
    pub completed: Option<PlayerEvent>,
    /// The owning channel should stop now
    pub stop: bool,
}

impl FadeStep {
    const IDLE: FadeStep = FadeStep {
        volume: None,
        completed: None,
        stop: false,
    };
}

/// Per-channel volume ramp, advanced once per frame
#[derive(Debug, Clone)]
pub struct FadeController {
    status: FadeStatus,
    origin: f32,
    destination: f32,
    duration: f32,
    remaining: f32,
    stop_after_fade: bool,
}

impl FadeController {
    pub fn new() -> Self {
        Self {
            status: FadeStatus::Static,
            origin: 0.0,
            destination: 0.0,
            duration: 0.0,
            remaining: 0.0,
            stop_after_fade: false,
        }
    }

    pub fn status(&self) -> FadeStatus {
        self.status
    }

    pub fn is_fading(&self) -> bool {
        self.status != FadeStatus::Static
    }

    /// Seconds left in the current fade
    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    /// Ramp from silence up to `destination` over `duration` seconds
    pub fn fade_in(&mut self, duration: f32, destination: f32) {
        self.begin(FadeStatus::FadingIn, 0.0, destination, duration, false);
    }

    /// Ramp from `origin` down to silence over `duration` seconds
    pub fn fade_out(&mut self, duration: f32, origin: f32, stop_after_fade: bool) {
        self.begin(FadeStatus::FadingOut, origin, 0.0, duration, stop_after_fade);
    }

    /// Drop any fade in progress without completing it
    pub fn cancel(&mut self) {
        self.status = FadeStatus::Static;
        self.remaining = 0.0;
        self.stop_after_fade = false;
    }

    /// Volume at the current point of the ramp
    pub fn current_volume(&self) -> Option<f32> {
        let t = if self.duration > 0.0 {
            self.remaining / self.duration
        } else {
            0.0
        };
        match self.status {
            FadeStatus::Static => None,
            FadeStatus::FadingIn => {
                Some(self.origin + (self.destination - self.origin) * equal_power_gain(t, true))
            }
            FadeStatus::FadingOut => {
                Some(self.destination + (self.origin - self.destination) * equal_power_gain(t, false))
            }
        }
    }

    /// Advance by `delta` seconds of frame time
    pub fn advance(&mut self, delta: f32) -> FadeStep {
        if self.status == FadeStatus::Static {
            return FadeStep::IDLE;
        }

        if self.remaining > 0.0 {
            self.remaining = (self.remaining - delta.max(0.0)).max(0.0);
        }

        if self.remaining > 0.0 {
            return FadeStep {
                volume: self.current_volume(),
                completed: None,
                stop: false,
            };
        }

        let completed = match self.status {
            FadeStatus::FadingIn => PlayerEvent::FadeInComplete,
            _ => PlayerEvent::FadeOutComplete,
        };
        let stop = self.stop_after_fade;
        self.status = FadeStatus::Static;
        self.stop_after_fade = false;

        FadeStep {
            volume: Some(self.destination),
            completed: Some(completed),
            stop,
        }
    }

    fn begin(&mut self, status: FadeStatus, origin: f32, destination: f32, duration: f32, stop: bool) {
        self.status = status;
        self.origin = origin;
        self.destination = destination;
        self.duration = duration.max(0.0);
        self.remaining = self.duration;
        self.stop_after_fade = stop;
    }
}

impl Default for FadeController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn test_gain_endpoints() {
        assert!((equal_power_gain(1.0, true) - 0.0).abs() < EPS);
        assert!((equal_power_gain(0.0, true) - 1.0).abs() < EPS);
        assert!((equal_power_gain(1.0, false) - 1.0).abs() < EPS);
        assert!((equal_power_gain(0.0, false) - 0.0).abs() < EPS);
        assert_eq!(equal_power_gain(1.0, true), 0.0);
    }

    #[test]
    fn test_gain_midpoint_is_equal_power() {
        let half = std::f32::consts::FRAC_1_SQRT_2;
        assert!((equal_power_gain(0.5, true) - half).abs() < EPS);
        assert!((equal_power_gain(0.5, false) - half).abs() < EPS);
    }

    #[test]
    fn test_static_controller_does_nothing() {
        let mut fade = FadeController::new();
        assert_eq!(fade.advance(0.5), FadeStep::IDLE);
        assert!(!fade.is_fading());
    }

    #[test]
    fn test_fade_in_ramps_to_destination() {
        let mut fade = FadeController::new();
        fade.fade_in(2.0, 0.8);
        assert_eq!(fade.status(), FadeStatus::FadingIn);

        let first = fade.advance(0.5).volume.unwrap();
        let second = fade.advance(0.5).volume.unwrap();
        assert!(first > 0.0);
        assert!(second > first);
        assert!(second < 0.8);

        fade.advance(0.5);
        let done = fade.advance(0.5);
        assert_eq!(done.volume, Some(0.8));
        assert_eq!(done.completed, Some(PlayerEvent::FadeInComplete));
        assert!(!done.stop);
        assert_eq!(fade.status(), FadeStatus::Static);
    }

    #[test]
    fn test_fade_out_ramps_to_silence_and_requests_stop() {
        let mut fade = FadeController::new();
        fade.fade_out(1.0, 0.6, true);

        let mid = fade.advance(0.5).volume.unwrap();
        assert!((mid - 0.6 * std::f32::consts::FRAC_1_SQRT_2).abs() < EPS);

        let done = fade.advance(0.75);
        assert_eq!(done.volume, Some(0.0));
        assert_eq!(done.completed, Some(PlayerEvent::FadeOutComplete));
        assert!(done.stop);
        assert!(!fade.is_fading());
    }

    #[test]
    fn test_remaining_never_negative() {
        let mut fade = FadeController::new();
        fade.fade_out(0.1, 1.0, false);
        fade.advance(10.0);
        assert_eq!(fade.remaining(), 0.0);
    }

    #[test]
    fn test_zero_duration_completes_next_tick() {
        let mut fade = FadeController::new();
        fade.fade_in(0.0, 1.0);
        assert!(fade.is_fading());

        let step = fade.advance(0.0);
        assert_eq!(step.completed, Some(PlayerEvent::FadeInComplete));
        assert_eq!(step.volume, Some(1.0));
    }

    #[test]
    fn test_cancel_drops_stop_request() {
        let mut fade = FadeController::new();
        fade.fade_out(1.0, 1.0, true);
        fade.cancel();

        assert_eq!(fade.advance(2.0), FadeStep::IDLE);
        assert_eq!(fade.current_volume(), None);
    }
}
