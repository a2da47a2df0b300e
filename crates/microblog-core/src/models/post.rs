use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Followers,
    Private,
}

/// Actor who surfaced a post into the timeline by reposting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepostedBy {
    pub id: String,
    pub name: String,
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// A timeline entry.
///
/// `liked` / `reposted` describe the viewer's relationship to the post and are
/// independent of the counters, which count everyone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub author_handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_avatar: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub like_count: u32,
    #[serde(default)]
    pub repost_count: u32,
    #[serde(default)]
    pub reply_count: u32,
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    pub reposted: bool,
    #[serde(default)]
    pub federated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_warning: Option<String>,
    #[serde(default)]
    pub is_sensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reposted_by: Option<RepostedBy>,
}

impl Post {
    /// True when this entry appears in the feed because someone reposted it.
    pub fn is_repost(&self) -> bool {
        self.reposted_by.is_some()
    }

    /// True when this post answers another post.
    pub fn is_reply(&self) -> bool {
        self.reply_to_id.is_some()
    }
}
