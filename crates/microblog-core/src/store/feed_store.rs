use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::api::{MicroblogApi, TimelineQuery};
use crate::error::{FetchError, MutationError};
use crate::models::{FeedFilter, FeedScope, FeedSort, Post};

/// Point-in-time copy of the feed for rendering
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    pub posts: Vec<Post>,
    pub loading: bool,
    pub error: Option<String>,
    pub has_more: bool,
    pub scope: FeedScope,
}

struct FeedState {
    posts: Vec<Post>,
    /// Page loads started but not yet settled
    in_flight: usize,
    error: Option<String>,
    has_more: bool,
    next_cursor: Option<String>,
    scope: FeedScope,
}

impl FeedState {
    fn new(scope: FeedScope) -> Self {
        Self {
            posts: Vec::new(),
            in_flight: 0,
            error: None,
            has_more: true,
            next_cursor: None,
            scope,
        }
    }

    fn begin_load(&mut self) {
        self.in_flight += 1;
        self.error = None;
    }

    fn reset_pagination(&mut self) {
        self.next_cursor = None;
        self.has_more = true;
    }

    fn find_mut(&mut self, post_id: &str) -> Option<&mut Post> {
        self.posts.iter_mut().find(|p| p.id == post_id)
    }
}

/// Fields one optimistic mutation overwrote. Restoring always writes the
/// viewer flag and its counter together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Engagement {
    Like { liked: bool, like_count: u32 },
    Repost { reposted: bool, repost_count: u32 },
}

impl Engagement {
    fn like_of(post: &Post) -> Self {
        Self::Like {
            liked: post.liked,
            like_count: post.like_count,
        }
    }

    fn repost_of(post: &Post) -> Self {
        Self::Repost {
            reposted: post.reposted,
            repost_count: post.repost_count,
        }
    }

    fn restore(self, post: &mut Post) {
        match self {
            Self::Like { liked, like_count } => {
                post.liked = liked;
                post.like_count = like_count;
            }
            Self::Repost {
                reposted,
                repost_count,
            } => {
                post.reposted = reposted;
                post.repost_count = repost_count;
            }
        }
    }
}

/// Ordered post cache for one feed scope.
///
/// Cloning yields another handle to the same cache. Mutations apply locally
/// first, call the server, and roll back the touched fields if the call fails.
#[derive(Clone)]
pub struct FeedStore {
    api: Arc<dyn MicroblogApi>,
    state: Arc<Mutex<FeedState>>,
    page_size: u32,
}

impl FeedStore {
    pub fn new(api: Arc<dyn MicroblogApi>, page_size: u32) -> Self {
        Self::with_scope(api, page_size, FeedScope::default())
    }

    pub fn with_scope(api: Arc<dyn MicroblogApi>, page_size: u32, scope: FeedScope) -> Self {
        Self {
            api,
            state: Arc::new(Mutex::new(FeedState::new(scope))),
            page_size,
        }
    }

    // ===== Getters =====

    pub fn posts(&self) -> Vec<Post> {
        self.state.lock().posts.clone()
    }

    pub fn post(&self, post_id: &str) -> Option<Post> {
        self.state
            .lock()
            .posts
            .iter()
            .find(|p| p.id == post_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().in_flight > 0
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    pub fn has_more(&self) -> bool {
        self.state.lock().has_more
    }

    pub fn scope(&self) -> FeedScope {
        self.state.lock().scope
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        let state = self.state.lock();
        FeedSnapshot {
            posts: state.posts.clone(),
            loading: state.in_flight > 0,
            error: state.error.clone(),
            has_more: state.has_more,
            scope: state.scope,
        }
    }

    // ===== Loading =====

    /// Fetch one page. Without a cursor the result replaces the cache; with a
    /// cursor it is appended, skipping posts already present.
    ///
    /// A replace load adopts `scope` once its page arrives; until then the
    /// stored scope and cursor still describe the cached posts.
    ///
    /// Returns how many posts became newly visible. On failure the cache is
    /// untouched and the message is kept in [`FeedStore::error`].
    pub async fn load_page(
        &self,
        scope: FeedScope,
        cursor: Option<String>,
    ) -> Result<usize, FetchError> {
        self.state.lock().begin_load();
        self.fetch_and_merge(scope, cursor).await
    }

    /// Append the next page of the current scope.
    ///
    /// Returns `Ok(None)` without fetching when a load is already running or
    /// the previous page had no continuation.
    pub async fn load_more(&self) -> Result<Option<usize>, FetchError> {
        let (scope, cursor) = {
            let mut state = self.state.lock();
            if state.in_flight > 0 || !state.has_more {
                return Ok(None);
            }
            state.begin_load();
            (state.scope, state.next_cursor.clone())
        };
        self.fetch_and_merge(scope, cursor).await.map(Some)
    }

    /// Drop pagination state and replace the cache with the first page.
    pub async fn refresh(&self) -> Result<usize, FetchError> {
        let scope = {
            let mut state = self.state.lock();
            state.reset_pagination();
            state.begin_load();
            state.scope
        };
        self.fetch_and_merge(scope, None).await
    }

    /// Caller must have called `begin_load` first.
    async fn fetch_and_merge(
        &self,
        scope: FeedScope,
        cursor: Option<String>,
    ) -> Result<usize, FetchError> {
        let append = cursor.is_some();
        let query = TimelineQuery {
            limit: self.page_size,
            cursor,
            scope,
        };
        let result = self.api.fetch_timeline(&query).await;

        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        match result {
            Ok(page) => {
                let added = if append {
                    merge_unique(&mut state.posts, page.posts)
                } else {
                    let mut posts = Vec::with_capacity(page.posts.len());
                    let added = merge_unique(&mut posts, page.posts);
                    state.posts = posts;
                    state.scope = scope;
                    added
                };
                state.has_more = page.next.is_some();
                state.next_cursor = page.next;
                state.error = None;
                tracing::debug!(
                    "Timeline {} {:?}: {} new posts, {} total, has_more={}",
                    if append { "append" } else { "replace" },
                    scope,
                    added,
                    state.posts.len(),
                    state.has_more
                );
                Ok(added)
            }
            Err(err) => {
                tracing::warn!("Error fetching timeline: {}", err);
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    // ===== Scope =====

    /// Each setter resets pagination so the next load replaces the cache.
    /// Returns whether the scope actually changed.
    pub fn set_filter(&self, filter: FeedFilter) -> bool {
        self.update_scope(|scope| scope.filter = filter)
    }

    pub fn set_sort(&self, sort: FeedSort) -> bool {
        self.update_scope(|scope| scope.sort = sort)
    }

    pub fn set_scope(&self, new_scope: FeedScope) -> bool {
        self.update_scope(|scope| *scope = new_scope)
    }

    fn update_scope(&self, edit: impl FnOnce(&mut FeedScope)) -> bool {
        let mut state = self.state.lock();
        let before = state.scope;
        edit(&mut state.scope);
        state.reset_pagination();
        state.scope != before
    }

    // ===== Local mutations =====

    /// Insert a freshly authored or pushed post at the top.
    /// Returns false (and changes nothing) if the id is already cached.
    pub fn add_local(&self, post: Post) -> bool {
        let mut state = self.state.lock();
        if state.posts.iter().any(|p| p.id == post.id) {
            return false;
        }
        state.posts.insert(0, post);
        true
    }

    /// Remove a post. Removing an absent id is a no-op.
    pub fn remove(&self, post_id: &str) -> bool {
        let mut state = self.state.lock();
        let before = state.posts.len();
        state.posts.retain(|p| p.id != post_id);
        state.posts.len() != before
    }

    /// Edit a cached post in place without contacting the server.
    pub fn update_post(&self, post_id: &str, edit: impl FnOnce(&mut Post)) -> bool {
        let mut state = self.state.lock();
        match state.find_mut(post_id) {
            Some(post) => {
                edit(post);
                true
            }
            None => false,
        }
    }

    // ===== Optimistic mutations =====

    /// Like if not liked, unlike otherwise.
    pub async fn toggle_like(&self, post_id: &str) -> Result<(), MutationError> {
        let before = self.apply_optimistic(post_id, |post| {
            let before = Engagement::like_of(post);
            post.like_count = if post.liked {
                post.like_count.saturating_sub(1)
            } else {
                post.like_count.saturating_add(1)
            };
            post.liked = !post.liked;
            before
        })?;

        let result = self.api.toggle_like(post_id).await;
        self.settle(post_id, before, result, "like")
    }

    pub async fn repost(&self, post_id: &str) -> Result<(), MutationError> {
        let before = self.apply_optimistic(post_id, |post| {
            let before = Engagement::repost_of(post);
            post.reposted = true;
            post.repost_count = post.repost_count.saturating_add(1);
            before
        })?;

        let result = self.api.repost(post_id).await;
        self.settle(post_id, before, result, "repost")
    }

    pub async fn unrepost(&self, post_id: &str) -> Result<(), MutationError> {
        let before = self.apply_optimistic(post_id, |post| {
            let before = Engagement::repost_of(post);
            post.reposted = false;
            post.repost_count = post.repost_count.saturating_sub(1);
            before
        })?;

        let result = self.api.unrepost(post_id).await;
        self.settle(post_id, before, result, "unrepost")
    }

    /// Snapshot and edit under one lock so the snapshot matches exactly what
    /// the edit overwrote.
    fn apply_optimistic(
        &self,
        post_id: &str,
        edit: impl FnOnce(&mut Post) -> Engagement,
    ) -> Result<Engagement, MutationError> {
        let mut state = self.state.lock();
        let post = state
            .find_mut(post_id)
            .ok_or_else(|| MutationError::UnknownPost(post_id.to_string()))?;
        Ok(edit(post))
    }

    fn settle(
        &self,
        post_id: &str,
        before: Engagement,
        result: Result<(), MutationError>,
        action: &str,
    ) -> Result<(), MutationError> {
        if let Err(err) = &result {
            if let Some(post) = self.state.lock().find_mut(post_id) {
                before.restore(post);
            }
            tracing::warn!("Error trying to {} post {}: {}", action, post_id, err);
        }
        result
    }
}

/// Append `incoming` to `posts`, skipping ids already present (including
/// repeats within `incoming`). Returns how many were appended.
fn merge_unique(posts: &mut Vec<Post>, incoming: Vec<Post>) -> usize {
    let mut seen: HashSet<String> = posts.iter().map(|p| p.id.clone()).collect();
    let before = posts.len();
    for post in incoming {
        if seen.insert(post.id.clone()) {
            posts.push(post);
        }
    }
    posts.len() - before
}
