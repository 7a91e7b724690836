/// Long-press detection on a single surface.
///
/// `press` and `release` mirror key-down/key-up; `poll` reports `true`
/// exactly once per hold, as soon as the hold reaches `hold_ms`.
pub struct HoldDetector {
    hold_ms: u64,
    pressed_at_ms: Option<u64>,
    fired: bool,
}

impl HoldDetector {
    pub fn new(hold_ms: u64) -> Self {
        Self {
            hold_ms,
            pressed_at_ms: None,
            fired: false,
        }
    }

    pub fn press(&mut self, now_ms: u64) {
        // Key auto-repeat sends more key-downs while held
        if self.pressed_at_ms.is_some() {
            return;
        }
        self.pressed_at_ms = Some(now_ms);
        self.fired = false;
    }

    pub fn release(&mut self) {
        self.pressed_at_ms = None;
        self.fired = false;
    }

    /// Spend the current hold without firing. Stays spent until release,
    /// so auto-repeat key-downs cannot restart it.
    pub fn cancel(&mut self) {
        if self.pressed_at_ms.is_some() {
            self.fired = true;
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pressed_at_ms.is_some() && !self.fired
    }

    pub fn held_ms(&self, now_ms: u64) -> u64 {
        self.pressed_at_ms
            .map(|start| now_ms.saturating_sub(start))
            .unwrap_or(0)
    }

    pub fn poll(&mut self, now_ms: u64) -> bool {
        if !self.is_pending() {
            return false;
        }
        if self.held_ms(now_ms) >= self.hold_ms {
            self.fired = true;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_after_hold() {
        let mut hold = HoldDetector::new(1000);
        hold.press(500);
        assert!(!hold.poll(1000));
        assert!(!hold.poll(1499));
        assert!(hold.poll(1500));
    }

    #[test]
    fn test_fires_once_per_hold() {
        let mut hold = HoldDetector::new(1000);
        hold.press(0);
        assert!(hold.poll(1000));
        assert!(!hold.poll(2000));
        assert!(!hold.poll(5000));

        hold.release();
        hold.press(6000);
        assert!(hold.poll(7000));
    }

    #[test]
    fn test_release_before_threshold() {
        let mut hold = HoldDetector::new(1000);
        hold.press(0);
        hold.release();
        assert!(!hold.poll(2000));
        assert!(!hold.is_pending());
    }

    #[test]
    fn test_repeat_press_keeps_first_start() {
        let mut hold = HoldDetector::new(1000);
        hold.press(0);
        hold.press(600);
        assert_eq!(hold.held_ms(900), 900);
        assert!(hold.poll(1000));
    }

    #[test]
    fn test_cancelled_hold_stays_spent_until_release() {
        let mut hold = HoldDetector::new(1000);
        hold.press(0);
        hold.cancel();
        assert!(!hold.is_pending());
        hold.press(700);
        assert!(!hold.poll(1500));

        hold.release();
        hold.press(2000);
        assert!(hold.poll(3000));
    }

    #[test]
    fn test_cancel_without_press_is_noop() {
        let mut hold = HoldDetector::new(1000);
        hold.cancel();
        hold.press(0);
        assert!(hold.poll(1000));
    }
}
