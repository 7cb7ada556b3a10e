//! Maintenance window gating for disruptive runbook steps (spec §4.3,
//! invariant I6). The window is `HH:MM-HH:MM` UTC and may wrap midnight.

use chrono::NaiveTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl MaintenanceWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Right-exclusive on `end`: a timestamp exactly equal to `end` is
    /// outside the window even when the window wraps midnight.
    pub fn contains(&self, now: NaiveTime) -> bool {
        if self.start <= self.end {
            now >= self.start && now < self.end
        } else {
            now >= self.start || now < self.end
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn wraps_midnight_right_exclusive() {
        let w = MaintenanceWindow::new(hm(22, 0), hm(2, 0));
        assert!(w.contains(hm(23, 30)));
        assert!(!w.contains(hm(2, 30)));
        assert!(!w.contains(hm(2, 0)));
        assert!(w.contains(hm(22, 0)));
        assert!(w.contains(hm(0, 0)));
    }

    #[test]
    fn non_wrapping_window() {
        let w = MaintenanceWindow::new(hm(1, 0), hm(3, 0));
        assert!(w.contains(hm(2, 0)));
        assert!(!w.contains(hm(3, 0)));
        assert!(!w.contains(hm(0, 30)));
    }
}
