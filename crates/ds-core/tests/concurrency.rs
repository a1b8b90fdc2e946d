//! Concurrent writers against one record must not lose increments.

use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use ds_core::{
    Account, AccountService, Accounts, CommentRequest, ContentWriter, Direction, ForumConfig,
    KeyedLocks, NewComment, NewPost, Post, PostRequest, ReadRequest, RecordStore, Score,
    SeededWeigher, Session, StoredRecord, Table, VoteCoordinator, VoteTarget,
};
use ds_db_memory::MemoryRecordStore;

const WRITERS: usize = 50;

/// Session `s{n}` belongs to user `u{n}`, named `user{n}`.
struct NumberedSessions;

#[async_trait]
impl AccountService for NumberedSessions {
    async fn create_account(&self, _: &str, _: &str, _: &str) -> anyhow::Result<Account> {
        bail!("read-only accounts")
    }

    async fn read_account_by_id(&self, id: &str) -> anyhow::Result<Account> {
        Ok(Account {
            id: id.to_string(),
            username: format!("user{}", id.trim_start_matches('u')),
            ..Account::default()
        })
    }

    async fn read_account_by_username(&self, _: &str) -> anyhow::Result<Account> {
        bail!("account not found")
    }

    async fn login(&self, _: &str, _: &str) -> anyhow::Result<Session> {
        bail!("read-only accounts")
    }

    async fn logout(&self, _: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn read_session(&self, session_id: &str) -> anyhow::Result<Session> {
        Ok(Session {
            id: session_id.to_string(),
            user_id: format!("u{}", session_id.trim_start_matches('s')),
            ..Session::default()
        })
    }
}

struct Forum {
    store: Arc<MemoryRecordStore>,
    votes: Arc<VoteCoordinator>,
    content: Arc<ContentWriter>,
    locks: Arc<KeyedLocks>,
}

fn forum() -> Forum {
    let store = Arc::new(MemoryRecordStore::new());
    let accounts = Accounts::new(Arc::new(NumberedSessions));
    let locks = Arc::new(KeyedLocks::new());
    Forum {
        votes: Arc::new(VoteCoordinator::new(
            &ForumConfig::default(),
            store.clone(),
            accounts.clone(),
            Arc::new(SeededWeigher::seeded(7)),
            locks.clone(),
        )),
        content: Arc::new(ContentWriter::new(store.clone(), accounts, locks.clone())),
        store,
        locks,
    }
}

async fn new_post(forum: &Forum) -> String {
    let request = PostRequest {
        post: NewPost {
            title: "busy thread".into(),
            content: "everyone replies".into(),
            board: "rust".into(),
            ..NewPost::default()
        },
        session_id: "s0".into(),
    };
    forum.content.create_post(request).await.unwrap().id
}

async fn stored_post(forum: &Forum, id: &str) -> Post {
    let mut records = forum
        .store
        .read(&ReadRequest::by_id(Table::Posts, id))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    Post::from_record(records.remove(0)).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_votes_are_all_counted() {
    let forum = forum();
    let post_id = new_post(&forum).await;

    let tasks: Vec<_> = (1..=WRITERS)
        .map(|n| {
            let votes = forum.votes.clone();
            let post_id = post_id.clone();
            tokio::spawn(async move {
                votes
                    .cast_vote(VoteTarget::Post, &post_id, &format!("s{n}"), Direction::Up)
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let post = stored_post(&forum, &post_id).await;
    assert_eq!(post.upvotes, WRITERS as i64);
    assert_eq!(post.score, Some(Score::Whole(WRITERS as i64)));
    assert_eq!(forum.store.len(Table::PostVoteChecks), WRITERS);
    assert!(forum.locks.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_comments_are_all_counted() {
    let forum = forum();
    let post_id = new_post(&forum).await;

    let tasks: Vec<_> = (1..=WRITERS)
        .map(|n| {
            let content = forum.content.clone();
            let request = CommentRequest {
                comment: NewComment {
                    content: format!("reply {n}"),
                    post_id: post_id.clone(),
                    ..NewComment::default()
                },
                session_id: format!("s{n}"),
            };
            tokio::spawn(async move { content.create_comment(request).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let post = stored_post(&forum, &post_id).await;
    assert_eq!(post.comment_count, WRITERS as i64);
    assert_eq!(forum.store.len(Table::Comments), WRITERS);
    assert!(forum.locks.is_empty());
}

#[tokio::test]
async fn rejected_votes_leave_no_lock_behind() {
    let forum = forum();
    for n in 0..100 {
        let err = forum
            .votes
            .cast_vote(VoteTarget::Post, &format!("ghost-{n}"), "s1", Direction::Up)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "post or comment not found");
    }
    assert!(forum.locks.is_empty());
}
