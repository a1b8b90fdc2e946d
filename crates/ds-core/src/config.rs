//! # Configuration
//!
//! Read once at startup and handed to the services that need it.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use anyhow::Context;

pub const DEFAULT_API_URL: &str = "https://api.m3o.com/v1";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_HTML_DIR: &str = "./html";
pub const DEFAULT_LIST_LIMIT: u32 = 1000;

#[derive(Clone)]
pub struct ForumConfig {
    /// Bearer token for the hosted record store and user service
    pub api_token: String,
    pub api_url: String,
    /// User ids allowed to cast boosted votes
    pub moderators: ModeratorList,
    pub bind_addr: String,
    pub html_dir: PathBuf,
    /// Limit applied to listings that do not ask for one
    pub list_limit: u32,
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            moderators: ModeratorList::default(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            html_dir: PathBuf::from(DEFAULT_HTML_DIR),
            list_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl fmt::Debug for ForumConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForumConfig")
            .field("api_token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("moderators", &self.moderators)
            .field("bind_addr", &self.bind_addr)
            .field("html_dir", &self.html_dir)
            .field("list_limit", &self.list_limit)
            .finish()
    }
}

impl ForumConfig {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| {
            lookup(key).unwrap_or_else(|| {
                log::info!("{key} not set, using default: {default:?}");
                default.to_string()
            })
        };

        let list_limit = var("DISTRIBUTED_LIST_LIMIT", &DEFAULT_LIST_LIMIT.to_string())
            .trim()
            .parse::<u32>()
            .context("invalid DISTRIBUTED_LIST_LIMIT")?;
        if list_limit == 0 {
            anyhow::bail!("invalid DISTRIBUTED_LIST_LIMIT: must be greater than zero");
        }

        Ok(Self {
            api_token: lookup("M3O_API_TOKEN").unwrap_or_default(),
            api_url: var("M3O_API_URL", DEFAULT_API_URL),
            moderators: ModeratorList::parse(&lookup("DISTRIBUTED_MODS").unwrap_or_default()),
            bind_addr: var("DISTRIBUTED_ADDR", DEFAULT_BIND_ADDR),
            html_dir: PathBuf::from(var("DISTRIBUTED_HTML_DIR", DEFAULT_HTML_DIR)),
            list_limit,
        })
    }
}

/// The fixed allow-list of moderator user ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeratorList(HashSet<String>);

impl ModeratorList {
    /// Parses a comma-separated list of user ids.
    pub fn parse(csv: &str) -> Self {
        csv.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.0.contains(user_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<String> for ModeratorList {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
