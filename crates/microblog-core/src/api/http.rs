use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{MicroblogApi, TimelineQuery};
use crate::config::ClientConfig;
use crate::constants::paths;
use crate::error::{FetchError, MutationError};
use crate::models::{Notification, TimelinePage};

/// Error body shape the server uses for non-2xx responses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// The list endpoint has answered both with a wrapper object and a bare array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NotificationsBody {
    Bare(Vec<Notification>),
    Wrapped {
        #[serde(default)]
        notifications: Vec<Notification>,
    },
}

#[derive(Debug, Deserialize)]
struct UnreadCountBody {
    #[serde(default)]
    count: u64,
}

/// reqwest-backed implementation of [`MicroblogApi`]
#[derive(Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl HttpApi {
    pub fn new(config: &ClientConfig) -> Result<Self, FetchError> {
        let base_url = Url::parse(&config.api_base_url).map_err(|e| {
            FetchError::Transport(format!("Invalid API base URL {}: {}", config.api_base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::Transport(format!(
                "Invalid API base URL {}",
                config.api_base_url
            )));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            auth_token: config.auth_token.clone(),
        })
    }

    /// `{base}/v1/microblog/{segments...}` with each segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // new() rejects cannot-be-a-base URLs, so this always succeeds
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(paths::MICROBLOG);
            path.extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(ACCEPT, "application/json");
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
        action: &str,
    ) -> Result<T, FetchError> {
        tracing::debug!("GET {} ({})", url, action);
        let response = self.request(Method::GET, url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response, action).await;
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        if !is_json(&response) {
            return Err(FetchError::Malformed(format!(
                "Expected JSON while trying to {}, got {}",
                action,
                content_type(&response).unwrap_or("no content type")
            )));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Malformed(e.to_string()))
    }

    async fn send_mutation(
        &self,
        method: Method,
        url: Url,
        action: &str,
    ) -> Result<(), MutationError> {
        tracing::debug!("{} {} ({})", method, url, action);
        let response = self.request(method, url).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = error_message(response, action).await;
        Err(MutationError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

fn content_type(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
}

fn is_json(response: &Response) -> bool {
    content_type(response)
        .map(|ct| ct.contains("application/json"))
        .unwrap_or(false)
}

/// Prefer the server's `message`, then `error`, then a generic description.
async fn error_message(response: Response, action: &str) -> String {
    let fallback = format!("Failed to {}: {}", action, response.status().as_u16());
    if !is_json(&response) {
        return fallback;
    }

    match response.json::<ErrorBody>().await {
        Ok(body) => body
            .message
            .filter(|m| !m.is_empty())
            .or(body.error.filter(|e| !e.is_empty()))
            .unwrap_or(fallback),
        Err(_) => fallback,
    }
}

#[async_trait]
impl MicroblogApi for HttpApi {
    async fn fetch_timeline(&self, query: &TimelineQuery) -> Result<TimelinePage, FetchError> {
        let mut params = vec![("limit", query.limit.to_string())];
        if let Some(cursor) = &query.cursor {
            params.push(("cursor", cursor.clone()));
        }
        for (key, value) in query.scope.query_params() {
            params.push((key, value.to_string()));
        }

        self.get_json(self.endpoint(&[paths::TIMELINE]), &params, "fetch timeline")
            .await
    }

    async fn toggle_like(&self, post_id: &str) -> Result<(), MutationError> {
        let url = self.endpoint(&[paths::POSTS, post_id, paths::LIKE]);
        self.send_mutation(Method::POST, url, "like post").await
    }

    async fn repost(&self, post_id: &str) -> Result<(), MutationError> {
        let url = self.endpoint(&[paths::POSTS, post_id, paths::REPOST]);
        self.send_mutation(Method::POST, url, "repost").await
    }

    async fn unrepost(&self, post_id: &str) -> Result<(), MutationError> {
        let url = self.endpoint(&[paths::POSTS, post_id, paths::REPOST]);
        self.send_mutation(Method::DELETE, url, "unrepost").await
    }

    async fn fetch_notifications(&self, limit: u32) -> Result<Vec<Notification>, FetchError> {
        let body: NotificationsBody = self
            .get_json(
                self.endpoint(&[paths::NOTIFICATIONS]),
                &[("limit", limit.to_string())],
                "fetch notifications",
            )
            .await?;

        Ok(match body {
            NotificationsBody::Bare(list) => list,
            NotificationsBody::Wrapped { notifications } => notifications,
        })
    }

    async fn fetch_unread_count(&self) -> Result<u64, FetchError> {
        let body: UnreadCountBody = self
            .get_json(
                self.endpoint(&[paths::NOTIFICATIONS, paths::UNREAD_COUNT]),
                &[],
                "fetch unread count",
            )
            .await?;
        Ok(body.count)
    }

    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), MutationError> {
        let url = self.endpoint(&[paths::NOTIFICATIONS, notification_id, paths::READ]);
        self.send_mutation(Method::POST, url, "mark notification as read")
            .await
    }

    async fn mark_all_notifications_read(&self) -> Result<(), MutationError> {
        let url = self.endpoint(&[paths::NOTIFICATIONS, paths::READ_ALL]);
        self.send_mutation(Method::POST, url, "mark all notifications as read")
            .await
    }
}
