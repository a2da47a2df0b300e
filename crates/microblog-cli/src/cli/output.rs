use anyhow::Result;
use microblog_core::{ChannelEvent, Notification, Post, PushEvent};
use serde::Serialize;
use serde_json::{json, Value};

pub fn print_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<()> {
    if pretty {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", serde_json::to_string(value)?);
    }
    Ok(())
}

/// Notification as printed: the wire fields plus a readable summary
#[derive(Serialize)]
pub struct NotificationView<'a> {
    #[serde(flatten)]
    pub notification: &'a Notification,
    pub summary: String,
}

pub fn notification_views(notifications: &[Notification]) -> Vec<NotificationView<'_>> {
    notifications
        .iter()
        .map(|notification| NotificationView {
            notification,
            summary: notification.summary(),
        })
        .collect()
}

/// Post as printed, with its repost and reply flags spelled out
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView<'a> {
    #[serde(flatten)]
    pub post: &'a Post,
    pub is_repost: bool,
    pub is_reply: bool,
}

pub fn post_views(posts: &[Post]) -> Vec<PostView<'_>> {
    posts
        .iter()
        .map(|post| PostView {
            post,
            is_repost: post.is_repost(),
            is_reply: post.is_reply(),
        })
        .collect()
}

/// One output line for `watch`
pub fn push_event_line(event: &ChannelEvent<PushEvent>, unread_count: u64) -> Value {
    match event {
        ChannelEvent::Open => json!({ "event": "open" }),
        ChannelEvent::Close => json!({ "event": "close" }),
        ChannelEvent::Error(e) => json!({ "event": "error", "message": e.to_string() }),
        ChannelEvent::Message(PushEvent::Notification(notification)) => json!({
            "event": "notification",
            "summary": notification.summary(),
            "data": notification,
            "unreadCount": unread_count,
        }),
        ChannelEvent::Message(message) => json!({ "event": "message", "data": message }),
    }
}
