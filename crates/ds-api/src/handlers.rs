//! # ds-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the core services.

use std::sync::Arc;

use actix_web::{web, HttpResponse};
use ds_core::{
    AccountService, Accounts, BoardRequest, BoardsQuery, CommentRequest, CommentsQuery,
    ContentQueries, ContentWriter, Credentials, Direction, ForumConfig, KeyedLocks, PostRequest,
    PostsQuery, RecordStore, Signup, VoteCoordinator, VoteTarget, VoteWeigher,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// State shared across all Actix-web workers.
pub struct AppState {
    pub queries: ContentQueries,
    pub votes: VoteCoordinator,
    pub content: ContentWriter,
    pub accounts: Accounts,
}

impl AppState {
    /// Wires the core services around one store, one account service and one
    /// set of per-record locks.
    pub fn new(
        config: &ForumConfig,
        store: Arc<dyn RecordStore>,
        accounts: Arc<dyn AccountService>,
        weigher: Arc<dyn VoteWeigher>,
    ) -> Self {
        let accounts = Accounts::new(accounts);
        let locks = Arc::new(KeyedLocks::new());
        Self {
            queries: ContentQueries::new(config, store.clone()),
            votes: VoteCoordinator::new(
                config,
                store.clone(),
                accounts.clone(),
                weigher,
                locks.clone(),
            ),
            content: ContentWriter::new(store, accounts.clone(), locks),
            accounts,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VoteRequest {
    id: String,
    session_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SessionRequest {
    session_id: String,
}

#[derive(Serialize)]
struct Records<T> {
    records: Vec<T>,
}

type ApiResult = Result<HttpResponse, ApiError>;

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    Ok(serde_json::from_slice(body)?)
}

/// Listing endpoints treat an empty body as "no filters".
fn decode_or_default<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    decode(body)
}

fn empty() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({}))
}

/// Answers a bare `OPTIONS` request with permissive CORS headers and no body.
pub async fn preflight() -> HttpResponse {
    HttpResponse::Ok()
        .insert_header(("Access-Control-Allow-Origin", "*"))
        .insert_header(("Access-Control-Allow-Methods", "*"))
        .insert_header(("Access-Control-Allow-Headers", "*"))
        .content_type("application/json")
        .finish()
}

async fn vote(
    data: &AppState,
    body: &[u8],
    target: VoteTarget,
    direction: Direction,
) -> ApiResult {
    let request: VoteRequest = decode(body)?;
    data.votes
        .cast_vote(target, &request.id, &request.session_id, direction)
        .await?;
    Ok(empty())
}

pub async fn upvote_post(data: web::Data<AppState>, body: web::Bytes) -> ApiResult {
    vote(&data, &body, VoteTarget::Post, Direction::Up).await
}

pub async fn downvote_post(data: web::Data<AppState>, body: web::Bytes) -> ApiResult {
    vote(&data, &body, VoteTarget::Post, Direction::Down).await
}

pub async fn upvote_comment(data: web::Data<AppState>, body: web::Bytes) -> ApiResult {
    vote(&data, &body, VoteTarget::Comment, Direction::Up).await
}

pub async fn downvote_comment(data: web::Data<AppState>, body: web::Bytes) -> ApiResult {
    vote(&data, &body, VoteTarget::Comment, Direction::Down).await
}

/// Creates a board; the creator moderates it unless others are named.
pub async fn create_board(data: web::Data<AppState>, body: web::Bytes) -> ApiResult {
    let request: BoardRequest = decode(&body)?;
    let board = data.content.create_board(request).await?;
    Ok(HttpResponse::Ok().json(board))
}

pub async fn create_post(data: web::Data<AppState>, body: web::Bytes) -> ApiResult {
    let request: PostRequest = decode(&body)?;
    let post = data.content.create_post(request).await?;
    Ok(HttpResponse::Ok().json(post))
}

/// Creates a comment and bumps the parent post's comment count.
pub async fn create_comment(data: web::Data<AppState>, body: web::Bytes) -> ApiResult {
    let request: CommentRequest = decode(&body)?;
    let comment = data.content.create_comment(request).await?;
    Ok(HttpResponse::Ok().json(comment))
}

pub async fn list_boards(data: web::Data<AppState>, body: web::Bytes) -> ApiResult {
    let query: BoardsQuery = decode_or_default(&body)?;
    let records = data.queries.list_boards(&query).await?;
    Ok(HttpResponse::Ok().json(Records { records }))
}

pub async fn list_posts(data: web::Data<AppState>, body: web::Bytes) -> ApiResult {
    let query: PostsQuery = decode_or_default(&body)?;
    let records = data.queries.list_posts(&query).await?;
    Ok(HttpResponse::Ok().json(Records { records }))
}

pub async fn list_comments(data: web::Data<AppState>, body: web::Bytes) -> ApiResult {
    let query: CommentsQuery = decode_or_default(&body)?;
    let records = data.queries.list_comments(&query).await?;
    Ok(HttpResponse::Ok().json(Records { records }))
}

pub async fn signup(data: web::Data<AppState>, body: web::Bytes) -> ApiResult {
    let request: Signup = decode(&body)?;
    let rsp = data.accounts.signup(&request).await?;
    Ok(HttpResponse::Ok().json(rsp))
}

pub async fn login(data: web::Data<AppState>, body: web::Bytes) -> ApiResult {
    let request: Credentials = decode(&body)?;
    let rsp = data.accounts.login(&request).await?;
    Ok(HttpResponse::Ok().json(rsp))
}

pub async fn logout(data: web::Data<AppState>, body: web::Bytes) -> ApiResult {
    let request: SessionRequest = decode(&body)?;
    data.accounts.logout(&request.session_id).await?;
    Ok(empty())
}

/// Returns the session together with the account profile behind it.
pub async fn read_session(data: web::Data<AppState>, body: web::Bytes) -> ApiResult {
    let request: SessionRequest = decode(&body)?;
    let view = data.accounts.read_session(&request.session_id).await?;
    Ok(HttpResponse::Ok().json(view))
}
