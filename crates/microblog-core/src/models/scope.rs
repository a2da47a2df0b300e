use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Post;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFilter {
    #[default]
    All,
    Following,
    Local,
    Federated,
}

impl FeedFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Following => "following",
            Self::Local => "local",
            Self::Federated => "federated",
        }
    }
}

impl FromStr for FeedFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "following" => Ok(Self::Following),
            "local" => Ok(Self::Local),
            "federated" => Ok(Self::Federated),
            other => Err(format!(
                "unknown filter '{}' (expected all, following, local or federated)",
                other
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSort {
    #[default]
    Latest,
    Popular,
    Trending,
}

impl FeedSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Popular => "popular",
            Self::Trending => "trending",
        }
    }
}

impl FromStr for FeedSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "latest" => Ok(Self::Latest),
            "popular" => Ok(Self::Popular),
            "trending" => Ok(Self::Trending),
            other => Err(format!(
                "unknown sort '{}' (expected latest, popular or trending)",
                other
            )),
        }
    }
}

/// Which slice of the timeline is being paged through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedScope {
    pub filter: FeedFilter,
    pub sort: FeedSort,
}

impl FeedScope {
    pub fn new(filter: FeedFilter, sort: FeedSort) -> Self {
        Self { filter, sort }
    }

    /// Query parameters the timeline endpoint expects. Defaults are left out.
    pub fn query_params(&self) -> Vec<(&'static str, &'static str)> {
        let mut params = Vec::new();
        if self.filter != FeedFilter::All {
            params.push(("filter", self.filter.as_str()));
        }
        if self.sort != FeedSort::Latest {
            params.push(("sort", self.sort.as_str()));
        }
        params
    }
}

/// One page of the timeline. `next` present means more data is available.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelinePage {
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
}
