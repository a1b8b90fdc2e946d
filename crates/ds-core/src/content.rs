//! # Content Creation
//!
//! Boards, posts and comments. Creating a comment also bumps the parent
//! post's `commentCount`; the two writes are not atomic, so a failed bump
//! leaves the comment stored.

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::accounts::Accounts;
use crate::error::{AppError, Result};
use crate::locks::KeyedLocks;
use crate::models::{Board, Comment, Created, Post, Record, Score, StoredRecord, Table};
use crate::query::{board_by_name, ReadRequest};
use crate::traits::RecordStore;

pub const BOARD_NAME_MAX: usize = 50;
pub const POST_TITLE_MAX: usize = 200;
pub const POST_URL_MAX: usize = 200;
pub const POST_CONTENT_MAX: usize = 3000;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewBoard {
    pub name: String,
    pub description: String,
    pub moderators: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoardRequest {
    pub board: NewBoard,
    pub session_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewPost {
    pub title: String,
    pub url: String,
    pub content: String,
    #[serde(alias = "sub")]
    pub board: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostRequest {
    pub post: NewPost,
    pub session_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewComment {
    pub content: String,
    /// Parent comment id, empty for a top-level comment
    pub parent: String,
    pub post_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommentRequest {
    pub comment: NewComment,
    pub session_id: String,
}

pub struct ContentWriter {
    store: Arc<dyn RecordStore>,
    accounts: Accounts,
    locks: Arc<KeyedLocks>,
}

impl ContentWriter {
    pub fn new(store: Arc<dyn RecordStore>, accounts: Accounts, locks: Arc<KeyedLocks>) -> Self {
        Self {
            store,
            accounts,
            locks,
        }
    }

    pub async fn create_board(&self, request: BoardRequest) -> Result<Board> {
        let BoardRequest {
            board: new,
            session_id,
        } = request;

        if new.name.is_empty() {
            return Err(AppError::validation("board name is required"));
        }
        if new.name.len() > BOARD_NAME_MAX {
            return Err(AppError::validation("board name is too long"));
        }

        let _guard = self
            .locks
            .acquire(Table::Boards, &format!("name:{}", new.name))
            .await;
        if self.board_exists(&new.name).await {
            return Err(AppError::conflict(format!(
                "board {} already exists",
                new.name
            )));
        }

        let author = self.accounts.author(&session_id).await?;
        let moderators = if new.moderators.is_empty() {
            vec![author.user_name]
        } else {
            new.moderators
        };

        let board = Board {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            description: new.description,
            moderators,
            created: Created::now(),
            extra: Record::new(),
        };
        self.store.create(Table::Boards, board.to_record()?).await?;
        log::info!("created board {} ({})", board.name, board.id);
        Ok(board)
    }

    /// Only a successful, non-empty read counts as existing.
    async fn board_exists(&self, name: &str) -> bool {
        match self.store.read(&board_by_name(name)).await {
            Ok(records) => !records.is_empty(),
            Err(e) => {
                log::debug!("board lookup for {name:?} failed: {e}");
                false
            }
        }
    }

    pub async fn create_post(&self, request: PostRequest) -> Result<Post> {
        let PostRequest {
            post: new,
            session_id,
        } = request;

        if new.board.is_empty() || new.title.is_empty() {
            return Err(AppError::validation("both title and board are required"));
        }
        if new.url.is_empty() && new.content.is_empty() {
            return Err(AppError::validation("url or content required"));
        }
        if new.title.len() > POST_TITLE_MAX || new.url.len() > POST_URL_MAX {
            return Err(AppError::validation("post url or title too long"));
        }
        if new.board.len() > BOARD_NAME_MAX {
            return Err(AppError::validation("post board too long"));
        }
        if new.content.len() > POST_CONTENT_MAX {
            return Err(AppError::validation("post content too long"));
        }

        let author = self.accounts.author(&session_id).await?;
        let post = Post {
            id: Uuid::new_v4().to_string(),
            user_id: author.user_id,
            user_name: author.user_name,
            title: new.title,
            url: new.url,
            content: new.content,
            board: new.board,
            upvotes: 0,
            downvotes: 0,
            score: Some(Score::Whole(0)),
            comment_count: 0,
            created: Created::now(),
            extra: Record::new(),
        };
        self.store.create(Table::Posts, post.to_record()?).await?;
        log::info!("created post {} in {}", post.id, post.board);
        Ok(post)
    }

    pub async fn create_comment(&self, request: CommentRequest) -> Result<Comment> {
        let CommentRequest {
            comment: new,
            session_id,
        } = request;

        let author = self.accounts.author(&session_id).await?;
        if new.post_id.is_empty() {
            return Err(AppError::validation("no post id"));
        }
        self.single_post(&new.post_id).await?;

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            user_id: author.user_id,
            user_name: author.user_name,
            content: new.content,
            parent: new.parent,
            post_id: new.post_id,
            upvotes: 0,
            downvotes: 0,
            score: Some(Score::Whole(0)),
            created: Created::now(),
            extra: Record::new(),
        };
        self.store
            .create(Table::Comments, comment.to_record()?)
            .await?;
        log::info!("created comment {} on {}", comment.id, comment.post_id);

        self.bump_comment_count(&comment.post_id).await?;
        Ok(comment)
    }

    /// Re-reads the post and persists it with `commentCount + 1`.
    pub async fn bump_comment_count(&self, post_id: &str) -> Result<i64> {
        let _guard = self.locks.acquire(Table::Posts, post_id).await;
        let mut post = self.single_post(post_id).await?;
        post.comment_count += 1;
        self.store
            .update(Table::Posts, post_id, post.to_record()?)
            .await?;
        Ok(post.comment_count)
    }

    async fn single_post(&self, post_id: &str) -> Result<Post> {
        let records = self
            .store
            .read(&ReadRequest::by_id(Table::Posts, post_id))
            .await?;
        let mut records = records.into_iter();
        match (records.next(), records.next()) {
            (None, _) => Err(AppError::not_found("post not found")),
            (Some(record), None) => Post::from_record(record),
            (Some(_), Some(_)) => Err(AppError::conflict("multiple posts found")),
        }
    }
}
