pub mod notification;
pub mod post;
pub mod scope;

pub use notification::{Notification, NotificationKind, TargetType};
pub use post::{Post, RepostedBy, Visibility};
pub use scope::{FeedFilter, FeedScope, FeedSort, TimelinePage};
