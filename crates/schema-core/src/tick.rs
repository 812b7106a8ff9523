/// Per-frame input supplied by the agent host.
///
/// `time_seconds` is the host clock and must be monotonically non-decreasing
/// across ticks; time-based leaves (e.g. `Wait`) read it into their own memory
/// record instead of keeping timers of their own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    pub tick: u64,
    pub time_seconds: f64,
    pub dt_seconds: f32,
}

impl TickContext {
    pub fn new(tick: u64, time_seconds: f64, dt_seconds: f32) -> Self {
        Self {
            tick,
            time_seconds,
            dt_seconds,
        }
    }

    /// First frame of a fixed-step simulation.
    pub fn start(dt_seconds: f32) -> Self {
        Self::new(0, 0.0, dt_seconds)
    }

    /// The frame after this one, advancing the clock by `dt_seconds`.
    pub fn next(self) -> Self {
        Self {
            tick: self.tick.wrapping_add(1),
            time_seconds: self.time_seconds + self.dt_seconds as f64,
            dt_seconds: self.dt_seconds,
        }
    }
}

impl Default for TickContext {
    fn default() -> Self {
        Self::start(1.0 / 60.0)
    }
}
