//! Effective simulation time
//!
//! Pausing freezes time rather than suspending the host loop: the renderer
//! keeps drawing frozen orbs while every age, lifetime and animation uses
//! `now - paused duration`, so resuming neither jumps orbs nor expires them.

/// Wall-clock to effective-time mapping (all values in ms)
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    /// Completed pause spans
    paused_total: f64,
    /// Wall-clock start of the current pause
    paused_since: Option<f64>,
    /// Effective time of the previous frame
    last_frame: Option<f64>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused_since.is_some()
    }

    /// Enter or leave the paused state at wall-clock `now`
    pub fn set_paused(&mut self, paused: bool, now: f64) {
        match (paused, self.paused_since) {
            (true, None) => {
                self.paused_since = Some(now);
                log::debug!("Physics paused at {:.0} ms", now);
            }
            (false, Some(since)) => {
                self.paused_total += (now - since).max(0.0);
                self.paused_since = None;
                log::debug!("Physics resumed, {:.0} ms paused in total", self.paused_total);
            }
            _ => {}
        }
    }

    /// Wall-clock `now` with all paused time removed
    pub fn effective_now(&self, now: f64) -> f64 {
        let current = self.paused_since.map_or(0.0, |since| (now - since).max(0.0));
        now - self.paused_total - current
    }

    /// Seconds of effective time since the previous frame; 0 on the first frame
    pub fn frame_dt(&mut self, now: f64) -> f32 {
        let effective = self.effective_now(now);
        let dt = self.last_frame.map_or(0.0, |last| (effective - last) / 1000.0);
        self.last_frame = Some(effective);
        dt as f32
    }

    pub fn paused_total_ms(&self) -> f64 {
        self.paused_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_time_excludes_pause() {
        let mut clock = SimClock::new();
        assert_eq!(clock.effective_now(1000.0), 1000.0);
        clock.set_paused(true, 2000.0);
        assert!(clock.is_paused());
        assert_eq!(clock.effective_now(4000.0), 2000.0);
        assert_eq!(clock.effective_now(7000.0), 2000.0);
        clock.set_paused(false, 7000.0);
        assert_eq!(clock.paused_total_ms(), 5000.0);
        assert_eq!(clock.effective_now(8000.0), 3000.0);
    }

    #[test]
    fn test_repeated_pause_calls_are_idempotent() {
        let mut clock = SimClock::new();
        clock.set_paused(true, 100.0);
        clock.set_paused(true, 500.0);
        clock.set_paused(false, 600.0);
        clock.set_paused(false, 900.0);
        assert_eq!(clock.paused_total_ms(), 500.0);
    }

    #[test]
    fn test_frame_dt_after_resume() {
        let mut clock = SimClock::new();
        assert_eq!(clock.frame_dt(0.0), 0.0);
        assert!((clock.frame_dt(16.0) - 0.016).abs() < 1e-6);
        clock.set_paused(true, 16.0);
        assert_eq!(clock.frame_dt(3000.0), 0.0);
        clock.set_paused(false, 5016.0);
        assert!((clock.frame_dt(5032.0) - 0.016).abs() < 1e-6);
    }
}
