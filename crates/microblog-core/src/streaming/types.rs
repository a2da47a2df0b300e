use serde::{Deserialize, Serialize};

use crate::models::{Notification, Post};

/// Event delivered over the push channel.
///
/// Wire shape: `{"type": "post", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PushEvent {
    Post(Post),
    Notification(Notification),
    PostDeleted { id: String },
}
