use std::time::{Duration, Instant};

use crate::render::pipeline::{MAX_QUALITY_SCALE, MIN_QUALITY_SCALE};

/// Minimum wall time between two scale changes.
pub const QUALITY_HYSTERESIS: Duration = Duration::from_millis(300);

/// Smaller adjustments are ignored.
pub const MIN_SCALE_STEP: f32 = 0.05;

const MIN_FRAME_MS: f32 = 0.1;
const INITIAL_FRAME_MS: f32 = 1000.0 / 60.0;

/// Closed-loop resolution scale for offscreen filter work.
///
/// Tracks an EMA of frame time and lowers the scale as frames slow down or as more objects are
/// filtered at once, at most once per [`QUALITY_HYSTERESIS`].
#[derive(Debug, Clone)]
pub struct QualityController {
    scale: f32,
    avg_frame_ms: f32,
    last_frame: Option<Instant>,
    last_change: Option<Instant>,
}

impl Default for QualityController {
    fn default() -> Self {
        Self::new()
    }
}

impl QualityController {
    pub fn new() -> Self {
        Self {
            scale: MAX_QUALITY_SCALE,
            avg_frame_ms: INITIAL_FRAME_MS,
            last_frame: None,
            last_change: None,
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn avg_frame_ms(&self) -> f32 {
        self.avg_frame_ms
    }

    pub fn fps(&self) -> f32 {
        1000.0 / self.avg_frame_ms
    }

    /// Scale the controller steers toward for `filter_count` simultaneous filters at the current
    /// average frame rate.
    pub fn target_scale(&self, filter_count: usize) -> f32 {
        let load = (filter_count as f32 * 0.03).min(0.4);
        let mut s = (1.0 - load).max(MIN_QUALITY_SCALE);
        let fps = self.fps();
        if fps < 40.0 {
            s -= 0.2;
        } else if fps < 48.0 {
            s -= 0.1;
        } else if fps > 58.0 {
            s += 0.05;
        }
        s.clamp(MIN_QUALITY_SCALE, MAX_QUALITY_SCALE)
    }

    /// Record a frame at `now`. Returns the new scale when it changed.
    ///
    /// The first call only establishes the frame clock.
    pub fn update(&mut self, now: Instant, filter_count: usize) -> Option<f32> {
        let prev = self.last_frame.replace(now)?;
        let dt_ms = (now.saturating_duration_since(prev).as_secs_f32() * 1000.0).max(MIN_FRAME_MS);
        self.avg_frame_ms = self.avg_frame_ms * 0.9 + dt_ms * 0.1;

        let target = self.target_scale(filter_count);
        if (target - self.scale).abs() < MIN_SCALE_STEP {
            return None;
        }
        if let Some(last) = self.last_change
            && now.saturating_duration_since(last) < QUALITY_HYSTERESIS
        {
            return None;
        }
        tracing::debug!(
            from = self.scale,
            to = target,
            avg_frame_ms = self.avg_frame_ms,
            filter_count,
            "quality scale change"
        );
        self.scale = target;
        self.last_change = Some(now);
        Some(target)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/quality.rs"]
mod tests;
