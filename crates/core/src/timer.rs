use std::time::Duration;

/// Cadence of the session countdown.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of a single countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Running,
    /// No time remains. Every tick after the countdown reaches zero reports
    /// this again, so the caller stops on the first one.
    Expired,
}

/// Wall-clock countdown for one session.
///
/// The timer is driven from outside (the coordinator feeds it one tick per
/// [`TICK_INTERVAL`]) and is never paused by conversational activity.
#[derive(Debug, Clone)]
pub struct SessionTimer {
    total: u32,
    remaining: u32,
}

impl SessionTimer {
    pub fn new(total_seconds: u32) -> Self {
        Self {
            total: total_seconds,
            remaining: total_seconds,
        }
    }

    pub fn tick(&mut self) -> Tick {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            Tick::Expired
        } else {
            Tick::Running
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Seconds consumed so far.
    pub fn elapsed(&self) -> u32 {
        self.total - self.remaining
    }
}

/// Formats seconds as `M:SS` for the remaining-time display.
pub fn format_clock(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_countdown_stays_expired_at_zero() {
        let mut timer = SessionTimer::new(3);
        assert_eq!(timer.tick(), Tick::Running);
        assert_eq!(timer.remaining(), 2);
        assert_eq!(timer.tick(), Tick::Running);
        assert_eq!(timer.remaining(), 1);
        assert_eq!(timer.tick(), Tick::Expired);
        assert_eq!(timer.tick(), Tick::Expired);
        assert_eq!(timer.remaining(), 0);
        assert_eq!(timer.elapsed(), 3);
    }

    #[test]
    fn test_zero_length_session_expires_on_first_tick() {
        let mut timer = SessionTimer::new(0);
        assert_eq!(timer.tick(), Tick::Expired);
        assert_eq!(timer.elapsed(), 0);
    }

    #[test]
    fn test_elapsed_tracks_ticks() {
        let mut timer = SessionTimer::new(600);
        for _ in 0..45 {
            timer.tick();
        }
        assert_eq!(timer.remaining(), 555);
        assert_eq!(timer.elapsed(), 45);
        assert_eq!(timer.total(), 600);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(1800), "30:00");
        assert_eq!(format_clock(65), "1:05");
        assert_eq!(format_clock(9), "0:09");
        assert_eq!(format_clock(0), "0:00");
    }
}
