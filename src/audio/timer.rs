/// Repeating end-or-loop timer driven by the sink clock.
///
/// Arming or cancelling bumps the generation, so a caller holding a
/// generation from an earlier arm can tell its firings are stale.
#[derive(Debug, Clone, Default)]
pub struct LoopTimer {
    generation: u64,
    next_fire: Option<f64>,
    period: f64,
}

impl LoopTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer to fire first at `first_fire`, then every `period` seconds
    pub fn arm(&mut self, first_fire: f64, period: f64) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.next_fire = Some(first_fire);
        self.period = period;
        self.generation
    }

    pub fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.next_fire = None;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_armed(&self) -> bool {
        self.next_fire.is_some()
    }

    pub fn next_fire(&self) -> Option<f64> {
        self.next_fire
    }

    /// Consume one due firing at `clock` and schedule the following one.
    ///
    /// Returns the generation the firing belongs to. Call repeatedly to
    /// catch up on several periods elapsed within one frame.
    pub fn poll(&mut self, clock: f64) -> Option<u64> {
        let due = self.next_fire.filter(|&at| clock >= at)?;
        self.next_fire = if self.period > 0.0 {
            Some(due + self.period)
        } else {
            None
        };
        Some(self.generation)
    }
}
