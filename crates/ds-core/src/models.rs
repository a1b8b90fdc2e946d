//! # Domain Models
//!
//! Typed views of the records held by the external record store.
//! Records are decoded once at the store boundary: counters default to zero,
//! a missing or non-numeric `score` stays `None`, and fields this crate does
//! not know about are carried in `extra` so an update writes the whole record back.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};

/// A raw record as exchanged with the record store.
pub type Record = Map<String, Value>;

/// The collections the forum reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Boards,
    Posts,
    Comments,
    PostVoteChecks,
    CommentVoteChecks,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Boards => "boards",
            Table::Posts => "posts",
            Table::Comments => "comments",
            Table::PostVoteChecks => "postsvotecheck",
            Table::CommentVoteChecks => "commentsvotecheck",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Creation time in whichever shape the record carries it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Created {
    Unix(i64),
    UnixFloat(f64),
    /// RFC 3339 text, as written by this service
    Timestamp(String),
    Unknown(Value),
}

impl Default for Created {
    fn default() -> Self {
        Created::Unknown(Value::Null)
    }
}

impl Created {
    pub fn now() -> Self {
        Created::Timestamp(Utc::now().to_rfc3339())
    }

    /// Unix seconds; anything unparseable counts as the epoch.
    pub fn unix_seconds(&self) -> i64 {
        match self {
            Created::Unix(secs) => *secs,
            Created::UnixFloat(secs) => *secs as i64,
            Created::Timestamp(text) => match DateTime::parse_from_rfc3339(text) {
                Ok(ts) => ts.timestamp(),
                Err(e) => {
                    log::debug!("unparseable created timestamp {text:?}: {e}");
                    0
                }
            },
            Created::Unknown(_) => 0,
        }
    }
}

/// A vote score. Votes only ever write whole numbers, but stored records may
/// carry fractions and those still rank by their exact magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Score {
    Whole(i64),
    Fraction(f64),
}

impl Score {
    pub fn as_f64(self) -> f64 {
        match self {
            Score::Whole(n) => n as f64,
            Score::Fraction(f) => f,
        }
    }
}

impl From<i64> for Score {
    fn from(n: i64) -> Self {
        Score::Whole(n)
    }
}

/// A link or text submission inside a board.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub title: String,
    pub url: String,
    pub content: String,
    /// Name of the containing board ("sub" in older clients)
    #[serde(alias = "sub")]
    pub board: String,
    #[serde(deserialize_with = "lenient::count")]
    pub upvotes: i64,
    #[serde(deserialize_with = "lenient::count")]
    pub downvotes: i64,
    #[serde(deserialize_with = "lenient::score", skip_serializing_if = "Option::is_none")]
    pub score: Option<Score>,
    #[serde(deserialize_with = "lenient::count")]
    pub comment_count: i64,
    pub created: Created,
    #[serde(flatten)]
    pub extra: Record,
}

/// A reply to a post, optionally nested under another comment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Comment {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub content: String,
    /// Id of the parent comment, empty for top-level comments
    pub parent: String,
    pub post_id: String,
    #[serde(deserialize_with = "lenient::count")]
    pub upvotes: i64,
    #[serde(deserialize_with = "lenient::count")]
    pub downvotes: i64,
    #[serde(deserialize_with = "lenient::score", skip_serializing_if = "Option::is_none")]
    pub score: Option<Score>,
    pub created: Created,
    #[serde(flatten)]
    pub extra: Record,
}

/// A named container for posts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Board {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Display names of the board's moderators
    pub moderators: Vec<String>,
    pub created: Created,
    #[serde(flatten)]
    pub extra: Record,
}

/// Marks that a user has already cast a normal vote on a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteCheck {
    pub id: String,
}

impl VoteCheck {
    pub fn new(record_id: &str, user_id: &str) -> Self {
        Self {
            id: format!("{record_id}{user_id}"),
        }
    }
}

/// A login session issued by the account service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    #[serde(deserialize_with = "lenient::integer")]
    pub created: i64,
    #[serde(deserialize_with = "lenient::integer")]
    pub expires: i64,
}

/// A user account held by the account service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(deserialize_with = "lenient::integer")]
    pub created: i64,
    #[serde(deserialize_with = "lenient::integer")]
    pub updated: i64,
    pub verified: bool,
    pub profile: HashMap<String, String>,
}

/// The resolved identity behind a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub user_id: String,
    pub user_name: String,
}

/// A typed record that lives in a fixed table.
pub trait StoredRecord: Serialize + DeserializeOwned {
    const TABLE: Table;

    fn id(&self) -> &str;

    fn from_record(record: Record) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(record))?)
    }

    fn to_record(&self) -> Result<Record> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(AppError::Upstream(anyhow::anyhow!(
                "{} record encoded as non-object: {other}",
                Self::TABLE
            ))),
        }
    }
}

impl StoredRecord for Post {
    const TABLE: Table = Table::Posts;

    fn id(&self) -> &str {
        &self.id
    }
}

impl StoredRecord for Comment {
    const TABLE: Table = Table::Comments;

    fn id(&self) -> &str {
        &self.id
    }
}

impl StoredRecord for Board {
    const TABLE: Table = Table::Boards;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Field decoders that never fail on a wrong type.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn number(value: &Value) -> Option<i64> {
        value
            .as_i64()
            .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
    }

    /// Vote and comment counters: anything non-numeric is zero.
    pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        Ok(number(&Value::deserialize(deserializer)?).unwrap_or(0))
    }

    /// Scores: anything non-numeric is absent; fractions are kept.
    pub fn score<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<super::Score>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value.as_i64() {
            Some(n) => Some(super::Score::Whole(n)),
            None => value
                .as_f64()
                .filter(|f| f.is_finite())
                .map(super::Score::Fraction),
        })
    }

    /// Integers that may arrive as JSON strings (int64 over a JSON gateway).
    pub fn integer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match &value {
            Value::String(text) => text.trim().parse().unwrap_or(0),
            other => number(other).unwrap_or(0),
        })
    }
}
