use chrono::{DateTime, Timelike};
use chrono_tz::Tz;

use crate::config::Config;

/// The hours (in the reference timezone) during which new signals may be
/// opened and stop/target monitoring runs. Outside it, open positions are
/// force-closed.
#[derive(Debug, Clone, Copy)]
pub struct TradingWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl TradingWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.window_start_hour, cfg.window_end_hour)
    }

    pub fn contains(&self, t: DateTime<Tz>) -> bool {
        let hour = t.hour();
        if self.start_hour < self.end_hour {
            self.start_hour <= hour && hour < self.end_hour
        } else {
            // Wraps midnight (e.g. 20:00 - 04:00)
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;

    fn ny(hour: u32) -> DateTime<Tz> {
        New_York.with_ymd_and_hms(2024, 1, 15, hour, 30, 0).unwrap()
    }

    #[test]
    fn inside_window() {
        let w = TradingWindow::new(4, 17);
        assert!(w.contains(ny(4)));
        assert!(w.contains(ny(12)));
        assert!(w.contains(ny(16)));
    }

    #[test]
    fn outside_window() {
        let w = TradingWindow::new(4, 17);
        assert!(!w.contains(ny(3)));
        assert!(!w.contains(ny(17)));
        assert!(!w.contains(ny(23)));
    }

    #[test]
    fn window_wrapping_midnight() {
        let w = TradingWindow::new(20, 4);
        assert!(w.contains(ny(21)));
        assert!(w.contains(ny(2)));
        assert!(!w.contains(ny(10)));
    }
}
