use std::sync::Arc;

use tokio::sync::watch;

/// Whether the hosting surface is currently in front of the user.
///
/// The host drives it with [`VisibilityMonitor::set_visible`]; pollers
/// subscribe and pause while hidden.
#[derive(Clone, Debug)]
pub struct VisibilityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl VisibilityMonitor {
    pub fn new(initially_visible: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_visible);
        Self { tx: Arc::new(tx) }
    }

    /// Subscribers are only woken when the value actually changes.
    pub fn set_visible(&self, visible: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == visible {
                false
            } else {
                *current = visible;
                true
            }
        });
        if changed {
            tracing::debug!("Visibility changed: visible={}", visible);
        }
    }

    pub fn is_visible(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for VisibilityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_see_changes_only() {
        let monitor = VisibilityMonitor::new(true);
        let mut rx = monitor.subscribe();
        assert!(*rx.borrow_and_update());

        monitor.set_visible(true);
        assert!(!rx.has_changed().unwrap());

        monitor.set_visible(false);
        assert!(rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());
        assert!(!monitor.is_visible());
    }

    #[test]
    fn test_clones_share_state() {
        let monitor = VisibilityMonitor::default();
        let other = monitor.clone();
        other.set_visible(false);
        assert!(!monitor.is_visible());
    }
}
