//! Application-wide constants
//!
//! Endpoint paths and the defaults used when a config field is left out.

/// Default API base URL (the development backend)
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";

/// Posts requested per timeline page
pub const DEFAULT_TIMELINE_PAGE_SIZE: u32 = 20;

/// Notifications requested per full refresh
pub const DEFAULT_NOTIFICATION_PAGE_SIZE: u32 = 50;

/// Unread badge polling cadence
pub const DEFAULT_UNREAD_POLL_INTERVAL_MS: u64 = 30_000;

/// Shortest interval a poller will run at; smaller values are raised to it
pub const MIN_POLL_INTERVAL_MS: u64 = 1_000;

/// Fixed delay between push channel reconnect attempts
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 3_000;

/// Reconnect attempts allowed without an intervening successful open
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;

/// Environment variables checked (in order) for an API base URL override
pub const API_BASE_URL_ENV_VARS: [&str; 2] = ["MICROBLOG_API_BASE_URL", "MICROBLOG_API_URL"];

// REST path segments, relative to the API base URL
pub mod paths {
    pub const MICROBLOG: [&str; 2] = ["v1", "microblog"];
    pub const TIMELINE: &str = "timeline";
    pub const POSTS: &str = "posts";
    pub const LIKE: &str = "like";
    pub const REPOST: &str = "repost";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const UNREAD_COUNT: &str = "unread-count";
    pub const READ: &str = "read";
    pub const READ_ALL: &str = "read-all";
}
