use std::time::{Duration, Instant};

/// Wall-clock time since startup plus a frame counter.
#[derive(Clone, Copy, Debug)]
pub struct FrameClock {
    start: Instant,
    frame: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self { start, frame: 0 }
    }

    /// Seconds since the clock started.
    pub fn elapsed_at(&self, now: Instant) -> f32 {
        now.saturating_duration_since(self.start).as_secs_f32()
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed_at(Instant::now())
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn tick(&mut self) -> u64 {
        self.frame += 1;
        self.frame
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Advisory frame-rate cap: sleeps away whatever is left of the frame budget.
#[derive(Clone, Copy, Debug)]
pub struct FramePacer {
    budget: Option<Duration>,
}

impl FramePacer {
    /// `target_fps` of 0 disables pacing.
    pub fn new(target_fps: u32) -> Self {
        let budget = (target_fps > 0).then(|| Duration::from_secs_f64(1.0 / target_fps as f64));
        Self { budget }
    }

    pub fn budget(&self) -> Option<Duration> {
        self.budget
    }

    /// Time left in the budget for a frame that started at `frame_start`.
    /// Zero when the frame overran or pacing is off.
    pub fn remaining(&self, frame_start: Instant, now: Instant) -> Duration {
        match self.budget {
            Some(budget) => budget.saturating_sub(now.saturating_duration_since(frame_start)),
            None => Duration::ZERO,
        }
    }

    pub fn pace(&self, frame_start: Instant) {
        let remaining = self.remaining(frame_start, Instant::now());
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
    }
}
