use std::sync::Arc;

use parking_lot::Mutex;

use crate::api::MicroblogApi;
use crate::error::{FetchError, MutationError};
use crate::models::Notification;

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationSnapshot {
    pub notifications: Vec<Notification>,
    pub unread_count: u64,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Default)]
struct NotificationState {
    notifications: Vec<Notification>,
    unread_count: u64,
    in_flight: usize,
    error: Option<String>,
}

impl NotificationState {
    fn find_mut(&mut self, notification_id: &str) -> Option<&mut Notification> {
        self.notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
    }
}

fn count_unread(notifications: &[Notification]) -> u64 {
    notifications.iter().filter(|n| !n.read).count() as u64
}

/// Notification list plus the unread badge counter.
///
/// Every change to an item's `read` flag adjusts the counter under the same
/// lock, so after each settled operation the counter equals the number of
/// unread items held.
#[derive(Clone)]
pub struct NotificationStore {
    api: Arc<dyn MicroblogApi>,
    state: Arc<Mutex<NotificationState>>,
    page_size: u32,
}

impl NotificationStore {
    pub fn new(api: Arc<dyn MicroblogApi>, page_size: u32) -> Self {
        Self {
            api,
            state: Arc::new(Mutex::new(NotificationState::default())),
            page_size,
        }
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state.lock().notifications.clone()
    }

    pub fn unread_count(&self) -> u64 {
        self.state.lock().unread_count
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().in_flight > 0
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    pub fn snapshot(&self) -> NotificationSnapshot {
        let state = self.state.lock();
        NotificationSnapshot {
            notifications: state.notifications.clone(),
            unread_count: state.unread_count,
            loading: state.in_flight > 0,
            error: state.error.clone(),
        }
    }

    /// Replace the list and recount unread items from scratch.
    pub async fn load_all(&self) -> Result<usize, FetchError> {
        {
            let mut state = self.state.lock();
            state.in_flight += 1;
            state.error = None;
        }

        let result = self.api.fetch_notifications(self.page_size).await;

        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        match result {
            Ok(notifications) => {
                state.unread_count = count_unread(&notifications);
                state.notifications = notifications;
                tracing::debug!(
                    "Loaded {} notifications, {} unread",
                    state.notifications.len(),
                    state.unread_count
                );
                Ok(state.notifications.len())
            }
            Err(err) => {
                tracing::warn!("Error fetching notifications: {}", err);
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub async fn refresh(&self) -> Result<usize, FetchError> {
        self.load_all().await
    }

    /// Replace only the counter from the lightweight endpoint. The list is
    /// not touched, so the counter may briefly disagree with it until the
    /// next full load.
    pub async fn load_unread_count(&self) -> Result<u64, FetchError> {
        match self.api.fetch_unread_count().await {
            Ok(count) => {
                self.state.lock().unread_count = count;
                Ok(count)
            }
            Err(err) => {
                tracing::warn!("Error fetching unread count: {}", err);
                Err(err)
            }
        }
    }

    /// Mark one notification read. The server is always told, even when the
    /// item is already read or not loaded.
    pub async fn mark_read(&self, notification_id: &str) -> Result<(), MutationError> {
        let was_unread = {
            let mut state = self.state.lock();
            let flipped = match state.find_mut(notification_id) {
                Some(n) if !n.read => {
                    n.read = true;
                    true
                }
                _ => false,
            };
            if flipped {
                state.unread_count = state.unread_count.saturating_sub(1);
            }
            flipped
        };

        let result = self.api.mark_notification_read(notification_id).await;

        if let Err(err) = &result {
            if was_unread {
                let mut state = self.state.lock();
                let reverted = match state.find_mut(notification_id) {
                    Some(n) if n.read => {
                        n.read = false;
                        true
                    }
                    _ => false,
                };
                if reverted {
                    state.unread_count += 1;
                }
            }
            tracing::warn!(
                "Error marking notification {} as read: {}",
                notification_id,
                err
            );
        }
        result
    }

    /// Mark everything read. On failure the whole prior list and counter are
    /// put back as they were.
    pub async fn mark_all_read(&self) -> Result<(), MutationError> {
        let (before, before_count) = {
            let mut state = self.state.lock();
            let before = state.notifications.clone();
            let before_count = state.unread_count;
            for n in state.notifications.iter_mut() {
                n.read = true;
            }
            state.unread_count = 0;
            (before, before_count)
        };

        let result = self.api.mark_all_notifications_read().await;

        if let Err(err) = &result {
            let mut state = self.state.lock();
            state.notifications = before;
            state.unread_count = before_count;
            tracing::warn!("Error marking all notifications as read: {}", err);
        }
        result
    }

    /// Insert a pushed notification at the head. Returns false if the id is
    /// already held.
    pub fn add_push(&self, notification: Notification) -> bool {
        let mut state = self.state.lock();
        if state.notifications.iter().any(|n| n.id == notification.id) {
            return false;
        }
        if !notification.read {
            state.unread_count += 1;
        }
        state.notifications.insert(0, notification);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fixtures::notification;
    use crate::api::mock::{wait_until, MockApi};

    fn assert_counter_consistent(store: &NotificationStore) {
        let snapshot = store.snapshot();
        assert_eq!(
            snapshot.unread_count,
            count_unread(&snapshot.notifications),
            "counter drifted from list: {:?}",
            snapshot
        );
    }

    async fn seeded(api: &MockApi, items: Vec<Notification>) -> NotificationStore {
        api.push_notifications(Ok(items));
        let store = NotificationStore::new(Arc::new(api.clone()), 50);
        store.load_all().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_load_all_recounts_unread() {
        let api = MockApi::new();
        let store = seeded(
            &api,
            vec![
                notification("n1", false),
                notification("n2", true),
                notification("n3", false),
            ],
        )
        .await;

        assert_eq!(store.notifications().len(), 3);
        assert_eq!(store.unread_count(), 2);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_failed_load_keeps_list_and_counter() {
        let api = MockApi::new();
        let store = seeded(&api, vec![notification("n1", false)]).await;

        api.push_notifications(Err(FetchError::Transport("connection reset".to_string())));
        assert!(store.load_all().await.is_err());
        assert_eq!(store.notifications().len(), 1);
        assert_eq!(store.unread_count(), 1);
        assert_eq!(
            store.error().as_deref(),
            Some("Request failed: connection reset")
        );
    }

    #[tokio::test]
    async fn test_load_unread_count_only_touches_counter() {
        let api = MockApi::new();
        let store = seeded(&api, vec![notification("n1", false)]).await;

        api.push_unread_count(Ok(7));
        assert_eq!(store.load_unread_count().await.unwrap(), 7);
        assert_eq!(store.unread_count(), 7);
        assert_eq!(store.notifications().len(), 1);

        api.push_unread_count(Err(FetchError::Malformed("bad body".to_string())));
        assert!(store.load_unread_count().await.is_err());
        assert_eq!(store.unread_count(), 7);
    }

    #[tokio::test]
    async fn test_mark_read_is_optimistic() {
        let api = MockApi::gated();
        api.release(1);
        let store = seeded(&api, vec![notification("n1", false), notification("n2", false)]).await;

        let task = tokio::spawn({
            let store = store.clone();
            async move { store.mark_read("n1").await }
        });
        wait_until(|| api.mutation_calls().len() == 1).await;
        assert_eq!(store.unread_count(), 1);
        assert!(store.notifications()[0].read);

        api.release(1);
        task.await.unwrap().unwrap();
        assert_eq!(store.unread_count(), 1);
        assert_counter_consistent(&store);
    }

    #[tokio::test]
    async fn test_mark_read_rolls_back_on_failure() {
        let api = MockApi::new();
        let store = seeded(&api, vec![notification("n1", false)]).await;

        api.fail_next_mutation();
        assert!(store.mark_read("n1").await.is_err());
        assert!(!store.notifications()[0].read);
        assert_eq!(store.unread_count(), 1);
        assert_counter_consistent(&store);
    }

    #[tokio::test]
    async fn test_mark_read_failure_on_read_item_does_not_increment() {
        let api = MockApi::new();
        let store = seeded(&api, vec![notification("n1", false), notification("n2", false)]).await;

        store.mark_all_read().await.unwrap();
        assert_eq!(store.unread_count(), 0);

        api.fail_next_mutation();
        assert!(store.mark_read("n1").await.is_err());
        assert_eq!(store.unread_count(), 0);
        assert!(store.notifications().iter().all(|n| n.read));
        assert_eq!(api.mutation_calls(), vec!["read-all", "read:n1"]);
    }

    #[tokio::test]
    async fn test_mark_read_calls_server_for_unknown_id() {
        let api = MockApi::new();
        let store = seeded(&api, vec![notification("n1", false)]).await;

        store.mark_read("elsewhere").await.unwrap();
        assert_eq!(api.mutation_calls(), vec!["read:elsewhere"]);
        assert_eq!(store.unread_count(), 1);
    }

    #[tokio::test]
    async fn test_interleaved_read_and_read_all_keep_counter_consistent() {
        let api = MockApi::gated();
        api.release(1);
        let store = seeded(&api, vec![notification("n1", false), notification("n2", false)]).await;

        api.fail_next_mutation();
        api.push_mutation(Ok(()));

        let single = tokio::spawn({
            let store = store.clone();
            async move { store.mark_read("n1").await }
        });
        wait_until(|| api.mutation_calls().len() == 1).await;
        let all = tokio::spawn({
            let store = store.clone();
            async move { store.mark_all_read().await }
        });
        wait_until(|| api.mutation_calls().len() == 2).await;
        assert_eq!(store.unread_count(), 0);

        api.release(1);
        assert!(single.await.unwrap().is_err());
        assert_counter_consistent(&store);

        api.release(1);
        all.await.unwrap().unwrap();
        assert_counter_consistent(&store);
        assert_eq!(store.unread_count(), 1);
    }

    #[tokio::test]
    async fn test_mark_all_read_restores_snapshot_on_failure() {
        let api = MockApi::new();
        let items = vec![
            notification("n1", false),
            notification("n2", true),
            notification("n3", false),
        ];
        let store = seeded(&api, items.clone()).await;

        api.fail_next_mutation();
        assert!(store.mark_all_read().await.is_err());
        assert_eq!(store.notifications(), items);
        assert_eq!(store.unread_count(), 2);
    }

    #[tokio::test]
    async fn test_add_push() {
        let api = MockApi::new();
        let store = seeded(&api, vec![notification("n1", true)]).await;

        assert!(store.add_push(notification("n2", false)));
        assert_eq!(store.unread_count(), 1);
        assert_eq!(store.notifications()[0].id, "n2");

        assert!(store.add_push(notification("n3", true)));
        assert_eq!(store.unread_count(), 1);

        assert!(!store.add_push(notification("n2", false)));
        assert_eq!(store.unread_count(), 1);
        assert_eq!(store.notifications().len(), 3);
        assert_counter_consistent(&store);
    }
}
