//! Two-step confirmation for destructive actions

use std::time::{Duration, Instant};

/// How long an armed confirmation stays valid
pub const CONFIRM_WINDOW: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Click {
    /// First click: nothing happens yet
    Armed,
    /// Second click on the same key within the window
    Confirmed,
}

/// Arms on the first click for a key and confirms on a second click for the
/// same key before the window runs out.
#[derive(Debug, Clone)]
pub struct DeleteConfirm<K> {
    armed: Option<(K, Instant)>,
    window: Duration,
}

impl<K: PartialEq> Default for DeleteConfirm<K> {
    fn default() -> Self {
        Self::new(CONFIRM_WINDOW)
    }
}

impl<K: PartialEq> DeleteConfirm<K> {
    pub fn new(window: Duration) -> Self {
        Self {
            armed: None,
            window,
        }
    }

    pub fn click(&mut self, key: K, now: Instant) -> Click {
        if let Some((armed, at)) = &self.armed
            && *armed == key
            && now.saturating_duration_since(*at) < self.window
        {
            self.armed = None;
            return Click::Confirmed;
        }
        self.armed = Some((key, now));
        Click::Armed
    }

    /// The key awaiting confirmation, if it has not expired
    pub fn pending(&self, now: Instant) -> Option<&K> {
        self.armed
            .as_ref()
            .filter(|(_, at)| now.saturating_duration_since(*at) < self.window)
            .map(|(key, _)| key)
    }

    pub fn cancel(&mut self) {
        self.armed = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn second_click_within_window_confirms() {
        let t0 = Instant::now();
        let mut confirm = DeleteConfirm::default();
        assert_eq!(confirm.click(7, t0), Click::Armed);
        assert_eq!(confirm.pending(t0 + secs(1)), Some(&7));
        assert_eq!(confirm.click(7, t0 + secs(2)), Click::Confirmed);
        assert_eq!(confirm.pending(t0 + secs(2)), None);
    }

    #[test]
    fn expired_confirmation_rearms() {
        let t0 = Instant::now();
        let mut confirm = DeleteConfirm::default();
        confirm.click(7, t0);
        assert_eq!(confirm.pending(t0 + secs(3)), None);
        assert_eq!(confirm.click(7, t0 + secs(3)), Click::Armed);
        assert_eq!(confirm.click(7, t0 + secs(4)), Click::Confirmed);
    }

    #[test]
    fn other_key_moves_the_confirmation() {
        let t0 = Instant::now();
        let mut confirm = DeleteConfirm::default();
        confirm.click("a", t0);
        assert_eq!(confirm.click("b", t0 + secs(1)), Click::Armed);
        assert_eq!(confirm.click("a", t0 + secs(1)), Click::Armed);
        assert_eq!(confirm.click("a", t0 + secs(2)), Click::Confirmed);
    }

    #[test]
    fn cancel_disarms() {
        let t0 = Instant::now();
        let mut confirm = DeleteConfirm::default();
        confirm.click(1u64, t0);
        confirm.cancel();
        assert_eq!(confirm.click(1, t0), Click::Armed);
    }
}
