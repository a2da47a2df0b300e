use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Follow,
    FollowRequest,
    Like,
    Repost,
    Reply,
    Mention,
    /// Federation lifecycle event; the server puts the details in `message`
    Federation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Post,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub actor_id: String,
    pub actor_name: String,
    pub actor_handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<TargetType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
}

impl Notification {
    /// One-line description of what happened.
    pub fn summary(&self) -> String {
        let name = &self.actor_name;
        match self.kind {
            NotificationKind::Follow => format!("{} followed you", name),
            NotificationKind::FollowRequest => format!("{} requested to follow you", name),
            NotificationKind::Like => format!("{} liked your post", name),
            NotificationKind::Repost => format!("{} reposted your post", name),
            NotificationKind::Reply => format!("{} replied to your post", name),
            NotificationKind::Mention => format!("{} mentioned you", name),
            NotificationKind::Federation => self
                .message
                .clone()
                .unwrap_or_else(|| "Federation update".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Notification {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_like_notification() {
        let n = parse(
            r#"{
                "id": "n1",
                "type": "like",
                "actorId": "u1",
                "actorName": "Ada",
                "actorHandle": "@ada",
                "targetId": "p1",
                "targetType": "post",
                "targetContent": "hello",
                "read": false,
                "createdAt": "2024-05-01T12:00:00Z"
            }"#,
        );
        assert_eq!(n.kind, NotificationKind::Like);
        assert_eq!(n.target_type, Some(TargetType::Post));
        assert!(!n.read);
        assert_eq!(n.summary(), "Ada liked your post");
    }

    #[test]
    fn test_follow_request_kind_is_snake_case() {
        let n = parse(
            r#"{"id": "n2", "type": "follow_request", "actorId": "u", "actorName": "Bo",
                "actorHandle": "@bo", "read": true, "createdAt": "2024-05-01T12:00:00Z"}"#,
        );
        assert_eq!(n.kind, NotificationKind::FollowRequest);
        assert_eq!(n.summary(), "Bo requested to follow you");
    }

    #[test]
    fn test_federation_summary_uses_message() {
        let mut n = parse(
            r#"{"id": "n3", "type": "federation", "actorId": "srv", "actorName": "remote.example",
                "actorHandle": "remote.example", "message": "Instance remote.example is now federated",
                "read": false, "createdAt": "2024-05-01T12:00:00Z"}"#,
        );
        assert_eq!(n.summary(), "Instance remote.example is now federated");
        n.message = None;
        assert_eq!(n.summary(), "Federation update");
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let result = serde_json::from_str::<Notification>(
            r#"{"id": "n4", "type": "poke", "actorId": "u", "actorName": "x",
                "actorHandle": "x", "read": false, "createdAt": "2024-05-01T12:00:00Z"}"#,
        );
        assert!(result.is_err());
    }
}
