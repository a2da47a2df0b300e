use std::sync::Arc;

use anyhow::{bail, Context, Result};
use microblog_core::store::{FeedSnapshot, NotificationSnapshot};
use microblog_core::streaming::ChannelState;
use microblog_core::{
    ChannelEvent, ClientConfig, FeedRuntime, FeedScope, FeedStore, HttpApi, MicroblogApi,
    MutationError, NotificationStore, Post,
};
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;

use super::output::{notification_views, post_views, print_json, push_event_line};

/// Engagement action on a single post
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAction {
    Like,
    Repost,
    Unrepost,
}

/// CLI command parsed from arguments
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Print the timeline for a scope
    Timeline { scope: FeedScope, pages: u32 },
    /// Like/repost/unrepost a post found within the first `pages` pages
    Engage {
        action: PostAction,
        post_id: String,
        pages: u32,
    },
    /// List notifications with the unread count
    Notifications,
    /// Print only the unread count
    Unread,
    /// Mark one notification read
    MarkRead { notification_id: String },
    /// Mark every notification read
    MarkAllRead,
    /// Run the background runtime and print push events until Ctrl-C
    Watch,
}

pub async fn run_command(command: CliCommand, config: ClientConfig, pretty: bool) -> Result<()> {
    if command == CliCommand::Watch {
        return watch(config, pretty).await;
    }

    let api: Arc<dyn MicroblogApi> =
        Arc::new(HttpApi::new(&config).context("Invalid API base URL")?);
    let result = execute(command, api, &config).await?;
    print_json(&result, pretty)
}

/// Run a one-shot command and return its JSON result.
pub async fn execute(
    command: CliCommand,
    api: Arc<dyn MicroblogApi>,
    config: &ClientConfig,
) -> Result<Value> {
    match command {
        CliCommand::Timeline { scope, pages } => {
            let feed = FeedStore::with_scope(api, config.timeline_page_size, scope);
            load_pages(&feed, pages, |_| false).await?;
            Ok(feed_json(&feed.snapshot()))
        }
        CliCommand::Engage {
            action,
            post_id,
            pages,
        } => {
            let feed = FeedStore::new(api, config.timeline_page_size);
            let post = engage(&feed, action, &post_id, pages).await?;
            Ok(serde_json::to_value(post)?)
        }
        CliCommand::Notifications => {
            let store = NotificationStore::new(api, config.notification_page_size);
            store.load_all().await?;
            Ok(notifications_json(&store.snapshot()))
        }
        CliCommand::Unread => {
            let store = NotificationStore::new(api, config.notification_page_size);
            let count = store.load_unread_count().await?;
            Ok(json!({ "unreadCount": count }))
        }
        CliCommand::MarkRead { notification_id } => {
            let store = NotificationStore::new(api, config.notification_page_size);
            store.load_all().await?;
            store.mark_read(&notification_id).await?;
            Ok(json!({ "id": notification_id, "unreadCount": store.unread_count() }))
        }
        CliCommand::MarkAllRead => {
            let store = NotificationStore::new(api, config.notification_page_size);
            store.load_all().await?;
            store.mark_all_read().await?;
            Ok(json!({ "unreadCount": store.unread_count() }))
        }
        CliCommand::Watch => bail!("watch is not a one-shot command"),
    }
}

/// Load up to `pages` pages, stopping early at the end of the feed or once
/// `found` matches the cache.
async fn load_pages(
    feed: &FeedStore,
    pages: u32,
    found: impl Fn(&FeedStore) -> bool,
) -> Result<()> {
    feed.refresh().await.context("Failed to load timeline")?;
    for _ in 1..pages.max(1) {
        if found(feed) {
            break;
        }
        match feed.load_more().await.context("Failed to load timeline")? {
            Some(_) => {}
            None => break,
        }
    }
    Ok(())
}

async fn engage(feed: &FeedStore, action: PostAction, post_id: &str, pages: u32) -> Result<Post> {
    load_pages(feed, pages, |feed| feed.post(post_id).is_some()).await?;

    let result = match action {
        PostAction::Like => feed.toggle_like(post_id).await,
        PostAction::Repost => feed.repost(post_id).await,
        PostAction::Unrepost => feed.unrepost(post_id).await,
    };
    match result {
        Ok(()) => {}
        Err(MutationError::UnknownPost(id)) => {
            bail!("Post {} not found in the first {} page(s)", id, pages.max(1))
        }
        Err(e) => return Err(e.into()),
    }

    feed.post(post_id)
        .with_context(|| format!("Post {} disappeared from the feed", post_id))
}

fn feed_json(snapshot: &FeedSnapshot) -> Value {
    json!({
        "filter": snapshot.scope.filter,
        "sort": snapshot.scope.sort,
        "posts": post_views(&snapshot.posts),
        "hasMore": snapshot.has_more,
    })
}

fn notifications_json(snapshot: &NotificationSnapshot) -> Value {
    json!({
        "notifications": notification_views(&snapshot.notifications),
        "unreadCount": snapshot.unread_count,
    })
}

async fn watch(config: ClientConfig, pretty: bool) -> Result<()> {
    if config.push_url.is_none() {
        bail!("watch needs a pushUrl in the config file");
    }

    let mut runtime = FeedRuntime::new(config).context("Invalid API base URL")?;
    runtime.start().await;
    let (Some(mut events), Some(push_url)) = (
        runtime.subscribe_push(),
        runtime.channel().map(|c| c.url().to_string()),
    ) else {
        bail!("Push channel was not started");
    };
    print_json(
        &json!({
            "event": "started",
            "pushUrl": push_url,
            "posts": runtime.feed().len(),
            "unreadCount": runtime.notifications().unread_count(),
        }),
        pretty,
    )?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    let unread = runtime.notifications().unread_count();
                    print_json(&push_event_line(&event, unread), pretty)?;
                    let gave_up = matches!(event, ChannelEvent::Close)
                        && runtime
                            .channel()
                            .is_some_and(|c| c.state() == ChannelState::Closed { terminal: true });
                    if gave_up {
                        tracing::warn!("Push channel gave up reconnecting");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Output fell behind, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    runtime.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use microblog_core::{FeedFilter, FeedSort};
    use std::collections::HashMap;

    fn post_json(id: &str, like_count: u32) -> Value {
        json!({
            "id": id,
            "authorId": "u1",
            "authorName": "Ada",
            "authorHandle": "@ada",
            "content": format!("post {}", id),
            "createdAt": "2024-05-01T12:00:00Z",
            "likeCount": like_count,
            "repostCount": 0,
            "replyCount": 0
        })
    }

    async fn serve(router: Router) -> (Arc<dyn MicroblogApi>, ClientConfig) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        let config = ClientConfig {
            api_base_url: format!("http://{}", addr),
            timeline_page_size: 2,
            ..ClientConfig::default()
        };
        let api: Arc<dyn MicroblogApi> = Arc::new(HttpApi::new(&config).unwrap());
        (api, config)
    }

    /// Two pages: p1,p2 then p3 (cursor "c1")
    fn timeline_router() -> Router {
        Router::new()
            .route(
                "/v1/microblog/timeline",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    match params.get("cursor").map(String::as_str) {
                        None => Json(json!({
                            "posts": [post_json("p1", 1), post_json("p2", 2)],
                            "next": "c1"
                        })),
                        Some(_) => Json(json!({ "posts": [post_json("p3", 3)] })),
                    }
                }),
            )
            .route(
                "/v1/microblog/posts/:id/like",
                post(|Path(_id): Path<String>| async { Json(json!({})) }),
            )
    }

    #[tokio::test]
    async fn test_timeline_loads_requested_pages() {
        let (api, config) = serve(timeline_router()).await;
        let command = CliCommand::Timeline {
            scope: FeedScope::new(FeedFilter::Local, FeedSort::Popular),
            pages: 5,
        };

        let result = execute(command, api, &config).await.unwrap();
        assert_eq!(result["posts"].as_array().unwrap().len(), 3);
        assert_eq!(result["posts"][2]["id"], json!("p3"));
        assert_eq!(result["posts"][2]["isRepost"], json!(false));
        assert_eq!(result["hasMore"], json!(false));
        assert_eq!(result["filter"], json!("local"));
        assert_eq!(result["sort"], json!("popular"));
    }

    #[tokio::test]
    async fn test_like_searches_later_pages() {
        let (api, config) = serve(timeline_router()).await;
        let command = CliCommand::Engage {
            action: PostAction::Like,
            post_id: "p3".to_string(),
            pages: 2,
        };

        let result = execute(command, api, &config).await.unwrap();
        assert_eq!(result["id"], json!("p3"));
        assert_eq!(result["liked"], json!(true));
        assert_eq!(result["likeCount"], json!(4));
    }

    #[tokio::test]
    async fn test_like_reports_missing_post() {
        let (api, config) = serve(timeline_router()).await;
        let command = CliCommand::Engage {
            action: PostAction::Like,
            post_id: "p3".to_string(),
            pages: 1,
        };

        let err = execute(command, api, &config).await.unwrap_err();
        assert_eq!(err.to_string(), "Post p3 not found in the first 1 page(s)");
    }

    #[tokio::test]
    async fn test_mark_read_reports_remaining_unread() {
        let router = Router::new()
            .route(
                "/v1/microblog/notifications",
                get(|| async {
                    Json(json!({ "notifications": [
                        {"id": "n1", "type": "like", "actorId": "u2", "actorName": "Grace",
                         "actorHandle": "@grace", "read": false, "createdAt": "2024-05-01T12:00:00Z"},
                        {"id": "n2", "type": "follow", "actorId": "u3", "actorName": "Alan",
                         "actorHandle": "@alan", "read": false, "createdAt": "2024-05-01T12:00:00Z"}
                    ]}))
                }),
            )
            .route(
                "/v1/microblog/notifications/:id/read",
                post(|| async { Json(json!({})) }),
            );
        let (api, config) = serve(router).await;

        let result = execute(
            CliCommand::MarkRead {
                notification_id: "n1".to_string(),
            },
            api.clone(),
            &config,
        )
        .await
        .unwrap();
        assert_eq!(result, json!({ "id": "n1", "unreadCount": 1 }));

        let listed = execute(CliCommand::Notifications, api, &config).await.unwrap();
        assert_eq!(listed["unreadCount"], json!(2));
        assert_eq!(
            listed["notifications"][1]["summary"],
            json!("Alan followed you")
        );
    }
}
