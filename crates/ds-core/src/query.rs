//! # Content Query Builder
//!
//! Turns listing requests for boards, posts and comments into record store
//! reads, then hands the results to the ranking engine. The store's
//! newest-first order is only a starting point; rank order wins.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::config::ForumConfig;
use crate::error::Result;
use crate::models::{Board, Comment, Post, Record, StoredRecord, Table};
use crate::ranking::{sort_by_rank, Rankable};
use crate::traits::RecordStore;

/// Board filter value meaning "every board".
pub const ALL_BOARDS: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn as_str(&self) -> &'static str {
        match self {
            Order::Asc => "asc",
            Order::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Gte,
    Lte,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Eq => "==",
            Op::Gte => ">=",
            Op::Lte => "<=",
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Op::Eq => ordering == Ordering::Equal,
            Op::Gte => ordering != Ordering::Less,
            Op::Lte => ordering != Ordering::Greater,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Number(i64),
}

/// A single `field op value` filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: Op,
    pub value: FilterValue,
}

impl Condition {
    pub fn text_eq(field: &str, value: &str) -> Self {
        Self {
            field: field.to_string(),
            op: Op::Eq,
            value: FilterValue::Text(value.to_string()),
        }
    }

    pub fn at_least(field: &str, value: i64) -> Self {
        Self {
            field: field.to_string(),
            op: Op::Gte,
            value: FilterValue::Number(value),
        }
    }

    pub fn at_most(field: &str, value: i64) -> Self {
        Self {
            field: field.to_string(),
            op: Op::Lte,
            value: FilterValue::Number(value),
        }
    }

    /// Evaluates the filter against a raw record. Type mismatches never match.
    pub fn matches(&self, record: &Record) -> bool {
        let Some(actual) = record.get(&self.field) else {
            return false;
        };
        let ordering = match (&self.value, actual) {
            (FilterValue::Text(expected), Value::String(actual)) => {
                Some(actual.as_str().cmp(expected.as_str()))
            }
            (FilterValue::Number(expected), Value::Number(actual)) => actual
                .as_f64()
                .and_then(|a| a.partial_cmp(&(*expected as f64))),
            _ => None,
        };
        ordering.is_some_and(|o| self.op.holds(o))
    }
}

/// Renders the store's query syntax, e.g. `score >= 5` or `board == 'rust'`.
impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            FilterValue::Text(text) => write!(
                f,
                "{} {} '{}'",
                self.field,
                self.op.as_str(),
                text.replace('\\', "\\\\").replace('\'', "\\'")
            ),
            FilterValue::Number(n) => write!(f, "{} {} {}", self.field, self.op.as_str(), n),
        }
    }
}

/// A read against one table of the record store.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    pub table: Table,
    pub id: Option<String>,
    pub conditions: Vec<Condition>,
    pub order_by: Option<String>,
    pub order: Order,
    pub limit: Option<u32>,
}

impl ReadRequest {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            id: None,
            conditions: Vec::new(),
            order_by: None,
            order: Order::Desc,
            limit: None,
        }
    }

    pub fn by_id(table: Table, id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::new(table)
        }
    }

    pub fn newest_first(mut self) -> Self {
        self.order_by = Some("created".to_string());
        self.order = Order::Desc;
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The conditions joined with `and`, or `None` when unfiltered.
    pub fn query(&self) -> Option<String> {
        if self.conditions.is_empty() {
            return None;
        }
        let parts: Vec<String> = self.conditions.iter().map(ToString::to_string).collect();
        Some(parts.join(" and "))
    }
}

/// Body of a board listing request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BoardsQuery {
    pub id: String,
    pub name: String,
    pub limit: i64,
}

/// Body of a post listing request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PostsQuery {
    pub id: String,
    /// Lowest score to include; only applied when positive
    pub min: i64,
    /// Highest score to include; only applied when positive
    pub max: i64,
    pub limit: i64,
    #[serde(alias = "sub")]
    pub board: String,
}

/// Body of a comment listing request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommentsQuery {
    pub post_id: String,
    pub limit: i64,
}

/// Read for the single board carrying `name`.
pub fn board_by_name(name: &str) -> ReadRequest {
    ReadRequest::new(Table::Boards)
        .filter(Condition::text_eq("name", name))
        .limit(1)
}

/// Builds and runs listing reads.
pub struct ContentQueries {
    store: Arc<dyn RecordStore>,
    default_limit: u32,
}

impl ContentQueries {
    pub fn new(config: &ForumConfig, store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            default_limit: config.list_limit,
        }
    }

    fn limit_for(&self, requested: i64) -> u32 {
        if requested > 0 {
            u32::try_from(requested).unwrap_or(u32::MAX)
        } else {
            self.default_limit
        }
    }

    pub fn boards_request(&self, query: &BoardsQuery) -> ReadRequest {
        if !query.id.is_empty() {
            return ReadRequest::by_id(Table::Boards, &query.id);
        }
        let mut request = ReadRequest::new(Table::Boards)
            .newest_first()
            .limit(self.limit_for(query.limit));
        if !query.name.is_empty() {
            request = request.filter(Condition::text_eq("name", &query.name));
        }
        request
    }

    pub fn posts_request(&self, query: &PostsQuery) -> ReadRequest {
        if !query.id.is_empty() {
            return ReadRequest::by_id(Table::Posts, &query.id);
        }
        let mut request = ReadRequest::new(Table::Posts)
            .newest_first()
            .limit(self.limit_for(query.limit));
        // A zero bound is indistinguishable from "unset"; only positive bounds filter.
        if query.min > 0 {
            request = request.filter(Condition::at_least("score", query.min));
        }
        if query.max > 0 {
            request = request.filter(Condition::at_most("score", query.max));
        }
        if !query.board.is_empty() && query.board != ALL_BOARDS {
            request = request.filter(Condition::text_eq("board", &query.board));
        }
        request
    }

    pub fn comments_request(&self, query: &CommentsQuery) -> ReadRequest {
        ReadRequest::new(Table::Comments)
            .newest_first()
            .filter(Condition::text_eq("postId", &query.post_id))
            .limit(self.limit_for(query.limit))
    }

    pub async fn list_boards(&self, query: &BoardsQuery) -> Result<Vec<Board>> {
        self.ranked(self.boards_request(query)).await
    }

    pub async fn list_posts(&self, query: &PostsQuery) -> Result<Vec<Post>> {
        self.ranked(self.posts_request(query)).await
    }

    pub async fn list_comments(&self, query: &CommentsQuery) -> Result<Vec<Comment>> {
        self.ranked(self.comments_request(query)).await
    }

    async fn ranked<T: StoredRecord + Rankable>(&self, request: ReadRequest) -> Result<Vec<T>> {
        log::debug!(
            "reading {} id={:?} query={:?} limit={:?}",
            request.table,
            request.id,
            request.query(),
            request.limit
        );
        let records = self.store.read(&request).await?;
        let mut items: Vec<T> = records
            .into_iter()
            .filter_map(|record| match T::from_record(record) {
                Ok(item) => Some(item),
                Err(e) => {
                    log::warn!("skipping undecodable {} record: {e}", request.table);
                    None
                }
            })
            .collect();
        sort_by_rank(&mut items);
        Ok(items)
    }
}
