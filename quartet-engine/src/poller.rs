use quartet_core::{Key, KeyPress};
use std::collections::VecDeque;

/// Key events captured since the last poll, stamped against the session clock.
///
/// The input layer pushes events as they arrive; the trial loop drains them
/// once per frame. Polling is non-blocking and never invents events.
#[derive(Debug, Clone)]
pub struct ResponsePoller {
    pending: VecDeque<KeyPress>,
    abort_key: Key,
}

impl ResponsePoller {
    pub fn new(abort_key: Key) -> Self {
        Self {
            pending: VecDeque::with_capacity(16),
            abort_key,
        }
    }

    pub fn push(&mut self, key: Key, timestamp_ns: u64) {
        self.pending.push_back(KeyPress::new(key, timestamp_ns));
    }

    /// True when the reserved abort key is pending. Other events stay queued.
    pub fn abort_requested(&self) -> bool {
        self.pending.iter().any(|p| p.key == self.abort_key)
    }

    /// Drains the queue, returning the events whose key is in `filter`
    /// in arrival order. Events outside the filter are dropped.
    pub fn poll(&mut self, filter: &[Key]) -> Vec<KeyPress> {
        self.pending
            .drain(..)
            .filter(|p| filter.contains(&p.key))
            .collect()
    }

    /// Drains the queue, keeping every event except the abort key.
    pub fn poll_any(&mut self) -> Vec<KeyPress> {
        let abort_key = self.abort_key;
        self.pending
            .drain(..)
            .filter(|p| p.key != abort_key)
            .collect()
    }

    /// Discards everything pending.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_filters_and_drains() {
        let mut poller = ResponsePoller::new(Key::Escape);
        poller.push(Key::Char('x'), 10);
        poller.push(Key::Space, 20);
        poller.push(Key::Space, 30);
        let got = poller.poll(&[Key::Space]);
        assert_eq!(
            got,
            vec![KeyPress::new(Key::Space, 20), KeyPress::new(Key::Space, 30)]
        );
        assert!(poller.poll_any().is_empty());
    }

    #[test]
    fn abort_check_leaves_queue_intact() {
        let mut poller = ResponsePoller::new(Key::Escape);
        poller.push(Key::Space, 5);
        assert!(!poller.abort_requested());
        poller.push(Key::Escape, 6);
        assert!(poller.abort_requested());
        assert_eq!(poller.poll_any(), vec![KeyPress::new(Key::Space, 5)]);
    }

    #[test]
    fn clear_discards_pending() {
        let mut poller = ResponsePoller::new(Key::Escape);
        poller.push(Key::Char('v'), 1);
        poller.clear();
        assert!(poller.poll(&[Key::Char('v')]).is_empty());
    }
}
