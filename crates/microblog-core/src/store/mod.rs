mod feed_store;
mod notification_store;

pub use feed_store::{FeedSnapshot, FeedStore};
pub use notification_store::{NotificationSnapshot, NotificationStore};
