//! Frame timing.
//!
//! Both types are plain state advanced by the caller with timestamps or time
//! deltas, so they never read a clock themselves.

use std::fmt;

use instant::Duration;

/// Frame rate measured over one reporting period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsReport {
    pub frames: u32,
    pub seconds: f64,
    pub fps: f64,
}

impl fmt::Display for FpsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames in {:.1} seconds = {:.3} FPS",
            self.frames, self.seconds, self.fps
        )
    }
}

/// Result of [`FrameTimer::tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Seconds since the previous tick, zero on the first one.
    pub dt: f64,
    pub report: Option<FpsReport>,
}

/// Counts frames and measures the time between them.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    period: f64,
    frames: u32,
    last_tick: Option<f64>,
    last_report: Option<f64>,
}

impl FrameTimer {
    /// A timer that reports the frame rate every `period`.
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.as_secs_f64(),
            frames: 0,
            last_tick: None,
            last_report: None,
        }
    }

    /// Account for one frame finished at `now` (seconds, monotonic).
    pub fn tick(&mut self, now: f64) -> Tick {
        let dt = now - self.last_tick.unwrap_or(now);
        self.last_tick = Some(now);

        self.frames += 1;
        let since = *self.last_report.get_or_insert(now);
        let elapsed = now - since;
        let report = (elapsed >= self.period && elapsed > 0.0).then(|| {
            let report = FpsReport {
                frames: self.frames,
                seconds: elapsed,
                fps: f64::from(self.frames) / elapsed,
            };
            self.last_report = Some(now);
            self.frames = 0;
            report
        });

        Tick { dt, report }
    }
}

/// Rotation of the gear train.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GearAnimation {
    /// Degrees.
    pub angle: f32,
}

impl GearAnimation {
    pub const DEGREES_PER_SECOND: f32 = 70.0;
    pub const WRAP_DEGREES: f32 = 3600.0;

    pub fn advance(&mut self, dt: f64) {
        self.angle += Self::DEGREES_PER_SECOND * dt as f32;
        if self.angle > Self::WRAP_DEGREES {
            self.angle -= Self::WRAP_DEGREES;
        }
    }
}
