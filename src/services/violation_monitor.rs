use serde::Deserialize;

/// Focus and visibility changes reported by the exam client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum FocusEvent {
    /// The page became hidden (tab or app switch).
    Hidden,
    Visible,
    /// The window lost input focus.
    Blur,
    Focus,
}

impl FocusEvent {
    fn is_violation(self) -> bool {
        matches!(self, Self::Hidden | Self::Blur)
    }
}

/// Counts suspected integrity breaches for one session.
///
/// Hidden and blur are separate subscriptions, so a single tab switch that fires both
/// is counted twice. The count is informational and never ends the session.
#[derive(Debug)]
pub(crate) struct ViolationMonitor {
    count: u32,
    subscribed: bool,
}

impl ViolationMonitor {
    pub(crate) fn attach() -> Self {
        Self { count: 0, subscribed: true }
    }

    /// Returns true when the event was counted. `locked` is set once submission has begun.
    pub(crate) fn observe(&mut self, event: FocusEvent, locked: bool) -> bool {
        if !self.subscribed || locked || !event.is_violation() {
            return false;
        }

        self.count = self.count.saturating_add(1);
        true
    }

    pub(crate) fn count(&self) -> u32 {
        self.count
    }

    #[cfg(test)]
    pub(crate) fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub(crate) fn detach(&mut self) {
        self.subscribed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_and_blur_each_count() {
        let mut monitor = ViolationMonitor::attach();
        assert!(monitor.observe(FocusEvent::Hidden, false));
        assert!(monitor.observe(FocusEvent::Blur, false));
        assert!(!monitor.observe(FocusEvent::Visible, false));
        assert!(!monitor.observe(FocusEvent::Focus, false));
        assert_eq!(monitor.count(), 2);
    }

    #[test]
    fn rapid_toggling_is_not_debounced() {
        let mut monitor = ViolationMonitor::attach();
        for _ in 0..5 {
            monitor.observe(FocusEvent::Blur, false);
            monitor.observe(FocusEvent::Focus, false);
        }
        assert_eq!(monitor.count(), 5);
    }

    #[test]
    fn events_while_locked_are_ignored() {
        let mut monitor = ViolationMonitor::attach();
        monitor.observe(FocusEvent::Hidden, false);
        assert!(!monitor.observe(FocusEvent::Hidden, true));
        assert_eq!(monitor.count(), 1);
    }

    #[test]
    fn detached_monitor_stops_counting() {
        let mut monitor = ViolationMonitor::attach();
        monitor.detach();
        assert!(!monitor.is_subscribed());
        assert!(!monitor.observe(FocusEvent::Blur, false));
        assert_eq!(monitor.count(), 0);
    }
}
