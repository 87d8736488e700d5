use std::time::Duration;

pub const MIN_PLAYBACK_FPS: f64 = 0.5;
pub const MAX_PLAYBACK_FPS: f64 = 30.0;

/// Converts a playback frame rate into a whole number of outer ticks between
/// cursor advances: `max(1, floor(tick_rate / fps))`.
#[derive(Debug, Clone)]
pub struct PlaybackPacing {
    fps: f64,
    tick_rate: u32,
    interval: u32,
    counter: u32,
}

impl PlaybackPacing {
    pub fn new(fps: f64, tick_rate: u32) -> Self {
        let tick_rate = tick_rate.max(1);
        let fps = clamp_fps(fps).unwrap_or(MIN_PLAYBACK_FPS);

        Self {
            fps,
            tick_rate,
            interval: interval_ticks(fps, tick_rate),
            counter: 0,
        }
    }

    /// Update the playback rate (clamped). Returns true if the rate changed.
    pub fn update(&mut self, fps: f64) -> bool {
        let Some(fps) = clamp_fps(fps) else {
            return false;
        };
        if fps == self.fps {
            return false;
        }

        self.fps = fps;
        self.interval = interval_ticks(fps, self.tick_rate);
        true
    }

    /// Count one outer tick. True when the playback cursor is due to advance.
    pub fn tick(&mut self) -> bool {
        self.counter += 1;
        if self.counter >= self.interval {
            self.counter = 0;
            true
        } else {
            false
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn interval_ticks(&self) -> u32 {
        self.interval
    }

    /// Wall time between outer ticks.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate as f64)
    }

    /// Wall time a frame stays on screen.
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(self.interval as f64 / self.tick_rate as f64)
    }
}

fn clamp_fps(fps: f64) -> Option<f64> {
    fps.is_finite().then(|| fps.clamp(MIN_PLAYBACK_FPS, MAX_PLAYBACK_FPS))
}

fn interval_ticks(fps: f64, tick_rate: u32) -> u32 {
    ((tick_rate as f64 / fps) as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_from_fps() {
        assert_eq!(PlaybackPacing::new(2.0, 60).interval_ticks(), 30);
        assert_eq!(PlaybackPacing::new(0.5, 60).interval_ticks(), 120);
        assert_eq!(PlaybackPacing::new(30.0, 60).interval_ticks(), 2);
        assert_eq!(PlaybackPacing::new(7.0, 60).interval_ticks(), 8);
    }

    #[test]
    fn test_interval_never_below_one_tick() {
        assert_eq!(PlaybackPacing::new(30.0, 10).interval_ticks(), 1);
    }

    #[test]
    fn test_tick_fires_every_interval() {
        let mut pacing = PlaybackPacing::new(20.0, 60);
        let fired: Vec<_> = (0..9).map(|_| pacing.tick()).collect();

        assert_eq!(
            fired,
            vec![false, false, true, false, false, true, false, false, true]
        );
    }

    #[test]
    fn test_update_clamps_and_reports_change() {
        let mut pacing = PlaybackPacing::new(2.0, 60);

        assert!(pacing.update(100.0));
        assert_eq!(pacing.fps(), MAX_PLAYBACK_FPS);
        assert!(!pacing.update(31.0), "Clamped to the same rate");

        assert!(pacing.update(0.0));
        assert_eq!(pacing.fps(), MIN_PLAYBACK_FPS);

        assert!(!pacing.update(f64::NAN));
        assert_eq!(pacing.fps(), MIN_PLAYBACK_FPS);
    }

    #[test]
    fn test_frame_duration() {
        let pacing = PlaybackPacing::new(2.0, 60);
        assert_eq!(pacing.frame_duration(), Duration::from_millis(500));
    }
}
