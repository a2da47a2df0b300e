//! Boundary to the remote service.
//!
//! The caches only talk to [`MicroblogApi`]; [`HttpApi`] is the production
//! implementation.

pub mod http;

use async_trait::async_trait;

use crate::error::{FetchError, MutationError};
use crate::models::{FeedScope, Notification, TimelinePage};

pub use http::HttpApi;

/// Parameters for one timeline page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineQuery {
    pub limit: u32,
    pub cursor: Option<String>,
    pub scope: FeedScope,
}

#[async_trait]
pub trait MicroblogApi: Send + Sync {
    async fn fetch_timeline(&self, query: &TimelineQuery) -> Result<TimelinePage, FetchError>;

    /// Server-side like toggle: likes when not liked, unlikes otherwise.
    async fn toggle_like(&self, post_id: &str) -> Result<(), MutationError>;

    async fn repost(&self, post_id: &str) -> Result<(), MutationError>;

    async fn unrepost(&self, post_id: &str) -> Result<(), MutationError>;

    async fn fetch_notifications(&self, limit: u32) -> Result<Vec<Notification>, FetchError>;

    async fn fetch_unread_count(&self) -> Result<u64, FetchError>;

    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), MutationError>;

    async fn mark_all_notifications_read(&self) -> Result<(), MutationError>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scriptable in-memory API used by the store and runtime tests.

    use std::collections::VecDeque;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::sync::Semaphore;

    use super::*;

    /// Yield to other tasks until `cond` holds.
    pub async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition was not reached");
    }

    #[derive(Default)]
    struct Script {
        pages: VecDeque<Result<TimelinePage, FetchError>>,
        notifications: VecDeque<Result<Vec<Notification>, FetchError>>,
        unread_counts: VecDeque<Result<u64, FetchError>>,
        mutations: VecDeque<Result<(), MutationError>>,
        timeline_queries: Vec<TimelineQuery>,
        mutation_calls: Vec<String>,
    }

    /// Responses are consumed in order; an empty queue answers with an
    /// empty page / empty list / zero / success.
    ///
    /// With a gate installed every call first waits for a permit, which lets
    /// a test observe state while the call is in flight.
    #[derive(Clone, Default)]
    pub struct MockApi {
        script: Arc<Mutex<Script>>,
        gate: Option<Arc<Semaphore>>,
    }

    impl MockApi {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn gated() -> Self {
            Self {
                script: Arc::default(),
                gate: Some(Arc::new(Semaphore::new(0))),
            }
        }

        /// Let `n` gated calls proceed.
        pub fn release(&self, n: usize) {
            if let Some(gate) = &self.gate {
                gate.add_permits(n);
            }
        }

        pub fn push_page(&self, page: Result<TimelinePage, FetchError>) {
            self.script.lock().pages.push_back(page);
        }

        pub fn push_notifications(&self, result: Result<Vec<Notification>, FetchError>) {
            self.script.lock().notifications.push_back(result);
        }

        pub fn push_unread_count(&self, result: Result<u64, FetchError>) {
            self.script.lock().unread_counts.push_back(result);
        }

        pub fn push_mutation(&self, result: Result<(), MutationError>) {
            self.script.lock().mutations.push_back(result);
        }

        pub fn fail_next_mutation(&self) {
            self.push_mutation(Err(MutationError::Rejected {
                status: 500,
                message: "internal error".to_string(),
            }));
        }

        pub fn timeline_queries(&self) -> Vec<TimelineQuery> {
            self.script.lock().timeline_queries.clone()
        }

        /// Calls recorded as `"<action>:<id>"`
        pub fn mutation_calls(&self) -> Vec<String> {
            self.script.lock().mutation_calls.clone()
        }

        async fn wait_gate(&self) {
            if let Some(gate) = &self.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
        }

        async fn mutate(&self, call: String) -> Result<(), MutationError> {
            self.script.lock().mutation_calls.push(call);
            self.wait_gate().await;
            self.script.lock().mutations.pop_front().unwrap_or(Ok(()))
        }
    }

    #[async_trait]
    impl MicroblogApi for MockApi {
        async fn fetch_timeline(&self, query: &TimelineQuery) -> Result<TimelinePage, FetchError> {
            self.script.lock().timeline_queries.push(query.clone());
            self.wait_gate().await;
            self.script
                .lock()
                .pages
                .pop_front()
                .unwrap_or_else(|| Ok(TimelinePage::default()))
        }

        async fn toggle_like(&self, post_id: &str) -> Result<(), MutationError> {
            self.mutate(format!("like:{}", post_id)).await
        }

        async fn repost(&self, post_id: &str) -> Result<(), MutationError> {
            self.mutate(format!("repost:{}", post_id)).await
        }

        async fn unrepost(&self, post_id: &str) -> Result<(), MutationError> {
            self.mutate(format!("unrepost:{}", post_id)).await
        }

        async fn fetch_notifications(&self, _limit: u32) -> Result<Vec<Notification>, FetchError> {
            self.wait_gate().await;
            self.script
                .lock()
                .notifications
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn fetch_unread_count(&self) -> Result<u64, FetchError> {
            self.wait_gate().await;
            self.script.lock().unread_counts.pop_front().unwrap_or(Ok(0))
        }

        async fn mark_notification_read(&self, notification_id: &str) -> Result<(), MutationError> {
            self.mutate(format!("read:{}", notification_id)).await
        }

        async fn mark_all_notifications_read(&self) -> Result<(), MutationError> {
            self.mutate("read-all".to_string()).await
        }
    }
}
