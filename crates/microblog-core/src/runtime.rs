use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::api::{HttpApi, MicroblogApi};
use crate::config::ClientConfig;
use crate::error::FetchError;
use crate::polling::{Poller, PollerConfig, VisibilityMonitor};
use crate::store::{FeedStore, NotificationStore};
use crate::streaming::{
    ChannelEvent, PushConnector, PushEvent, RealtimeChannel, ReconnectPolicy, WsConnector,
};

/// One signed-in session: both caches plus the producers that keep them
/// fresh (unread-count polling, optional timeline polling, push channel).
pub struct FeedRuntime {
    config: ClientConfig,
    feed: FeedStore,
    notifications: NotificationStore,
    visibility: VisibilityMonitor,
    connector: Arc<dyn PushConnector>,
    channel: Option<RealtimeChannel<PushEvent>>,
    pollers: Vec<Poller>,
    dispatch: Option<JoinHandle<()>>,
}

impl FeedRuntime {
    /// Runtime over HTTP and WebSocket as described by `config`.
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        let api = Arc::new(HttpApi::new(&config)?);
        Ok(Self::with_api(config, api, Arc::new(WsConnector)))
    }

    pub fn with_api(
        config: ClientConfig,
        api: Arc<dyn MicroblogApi>,
        connector: Arc<dyn PushConnector>,
    ) -> Self {
        let feed = FeedStore::new(api.clone(), config.timeline_page_size);
        let notifications = NotificationStore::new(api, config.notification_page_size);
        Self {
            config,
            feed,
            notifications,
            visibility: VisibilityMonitor::new(true),
            connector,
            channel: None,
            pollers: Vec::new(),
            dispatch: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn feed(&self) -> &FeedStore {
        &self.feed
    }

    pub fn notifications(&self) -> &NotificationStore {
        &self.notifications
    }

    /// The host reports foreground/background here; pollers pause while hidden.
    pub fn visibility(&self) -> &VisibilityMonitor {
        &self.visibility
    }

    pub fn channel(&self) -> Option<&RealtimeChannel<PushEvent>> {
        self.channel.as_ref()
    }

    /// Raw channel events, for surfaces that show connection status.
    pub fn subscribe_push(&self) -> Option<broadcast::Receiver<ChannelEvent<PushEvent>>> {
        self.channel.as_ref().map(|channel| channel.subscribe())
    }

    pub fn is_started(&self) -> bool {
        !self.pollers.is_empty()
    }

    /// Initial loads, then background producers. Load failures are logged and
    /// left in the caches' `error` fields; they do not prevent startup.
    pub async fn start(&mut self) {
        if self.is_started() {
            return;
        }

        let (timeline, notifications) =
            tokio::join!(self.feed.refresh(), self.notifications.load_all());
        if let Err(e) = timeline {
            tracing::warn!("Initial timeline load failed: {}", e);
        }
        if let Err(e) = notifications {
            tracing::warn!("Initial notification load failed: {}", e);
        }

        let store = self.notifications.clone();
        self.pollers.push(Poller::spawn(
            PollerConfig::every(self.config.unread_poll_interval()),
            &self.visibility,
            move || {
                let store = store.clone();
                async move {
                    store.load_unread_count().await?;
                    anyhow::Ok(())
                }
            },
        ));

        if let Some(interval) = self.config.feed_refresh_interval() {
            let feed = self.feed.clone();
            self.pollers.push(Poller::spawn(
                PollerConfig::every(interval),
                &self.visibility,
                move || {
                    let feed = feed.clone();
                    async move {
                        feed.refresh().await?;
                        anyhow::Ok(())
                    }
                },
            ));
        }

        if let Some(url) = self.config.push_url.clone() {
            let channel = RealtimeChannel::new(
                url,
                self.connector.clone(),
                ReconnectPolicy::from_config(&self.config),
            );
            self.dispatch = Some(tokio::spawn(dispatch_push_events(
                channel.subscribe(),
                self.feed.clone(),
                self.notifications.clone(),
            )));
            channel.connect();
            self.channel = Some(channel);
        }

        tracing::info!(
            "Feed runtime started ({} pollers, push {})",
            self.pollers.len(),
            if self.channel.is_some() { "on" } else { "off" }
        );
    }

    /// Stop pollers, close the push channel and stop routing its events.
    pub fn shutdown(&mut self) {
        if !self.is_started() {
            return;
        }
        self.pollers.clear();
        if let Some(channel) = self.channel.take() {
            channel.disconnect();
        }
        if let Some(dispatch) = self.dispatch.take() {
            dispatch.abort();
        }
        tracing::info!("Feed runtime stopped");
    }
}

impl Drop for FeedRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Route one push event into the cache that owns it.
pub fn apply_push_event(feed: &FeedStore, notifications: &NotificationStore, event: PushEvent) {
    match event {
        PushEvent::Post(post) => {
            let id = post.id.clone();
            if !feed.add_local(post) {
                tracing::debug!("Ignoring pushed post {}: already cached", id);
            }
        }
        PushEvent::Notification(notification) => {
            let id = notification.id.clone();
            if !notifications.add_push(notification) {
                tracing::debug!("Ignoring pushed notification {}: already cached", id);
            }
        }
        PushEvent::PostDeleted { id } => {
            feed.remove(&id);
        }
    }
}

async fn dispatch_push_events(
    mut events: broadcast::Receiver<ChannelEvent<PushEvent>>,
    feed: FeedStore,
    notifications: NotificationStore,
) {
    loop {
        match events.recv().await {
            Ok(ChannelEvent::Message(event)) => apply_push_event(&feed, &notifications, event),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Push dispatch fell behind, {} events skipped", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}
