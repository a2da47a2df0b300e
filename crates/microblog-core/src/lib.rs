pub mod api;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod polling;
pub mod runtime;
pub mod store;
pub mod streaming;

// Re-export the types most callers need at crate root
pub use api::{HttpApi, MicroblogApi, TimelineQuery};
pub use config::ClientConfig;
pub use error::{ChannelError, FetchError, MutationError};
pub use models::{FeedFilter, FeedScope, FeedSort, Notification, Post, TimelinePage};
pub use polling::{Poller, PollerConfig, VisibilityMonitor};
pub use runtime::FeedRuntime;
pub use store::{FeedStore, NotificationStore};
pub use streaming::{ChannelEvent, PushEvent, RealtimeChannel, ReconnectPolicy};
