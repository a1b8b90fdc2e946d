//! # Vote Coordinator
//!
//! Validates a vote, blocks duplicate votes per (record, user), applies the
//! vote weight and recomputes the score. Moderators cast a randomized heavier
//! vote and are exempt from the duplicate check.

use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;

use crate::accounts::Accounts;
use crate::config::{ForumConfig, ModeratorList};
use crate::error::{AppError, Result};
use crate::locks::KeyedLocks;
use crate::models::{Comment, Post, Record, Score, StoredRecord, Table, VoteCheck};
use crate::query::ReadRequest;
use crate::traits::{RecordStore, VoteWeigher};

/// Range of a moderator's vote weight, inclusive on both ends.
pub const MODERATOR_WEIGHT: RangeInclusive<i64> = 4..=16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTarget {
    Post,
    Comment,
}

impl VoteTarget {
    pub fn table(self) -> Table {
        match self {
            VoteTarget::Post => Table::Posts,
            VoteTarget::Comment => Table::Comments,
        }
    }

    /// Table holding the duplicate-vote markers for this kind of record.
    pub fn check_table(self) -> Table {
        match self {
            VoteTarget::Post => Table::PostVoteChecks,
            VoteTarget::Comment => Table::CommentVoteChecks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Counters of a record after a vote was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    pub weight: i64,
    pub moderator: bool,
    pub tally: Tally,
}

/// A record that carries vote counters.
pub trait Votable: StoredRecord {
    /// Adds `weight` to the counter for `direction` and recomputes the score.
    fn apply_vote(&mut self, direction: Direction, weight: i64) -> Tally;
}

fn tally(
    upvotes: &mut i64,
    downvotes: &mut i64,
    score: &mut Option<Score>,
    direction: Direction,
    weight: i64,
) -> Tally {
    // Stored counters are untrusted and may already sit at the i64 bounds.
    match direction {
        Direction::Up => *upvotes = upvotes.saturating_add(weight),
        Direction::Down => *downvotes = downvotes.saturating_add(weight),
    }
    let new_score = upvotes.saturating_sub(*downvotes);
    *score = Some(Score::Whole(new_score));
    Tally {
        upvotes: *upvotes,
        downvotes: *downvotes,
        score: new_score,
    }
}

impl Votable for Post {
    fn apply_vote(&mut self, direction: Direction, weight: i64) -> Tally {
        tally(
            &mut self.upvotes,
            &mut self.downvotes,
            &mut self.score,
            direction,
            weight,
        )
    }
}

impl Votable for Comment {
    fn apply_vote(&mut self, direction: Direction, weight: i64) -> Tally {
        tally(
            &mut self.upvotes,
            &mut self.downvotes,
            &mut self.score,
            direction,
            weight,
        )
    }
}

/// Moderator weights from one RNG, seeded once.
pub struct SeededWeigher {
    rng: Mutex<StdRng>,
}

impl SeededWeigher {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic sequence, for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl VoteWeigher for SeededWeigher {
    fn moderator_weight(&self) -> i64 {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_range(MODERATOR_WEIGHT)
    }
}

pub struct VoteCoordinator {
    store: Arc<dyn RecordStore>,
    accounts: Accounts,
    moderators: ModeratorList,
    weigher: Arc<dyn VoteWeigher>,
    locks: Arc<KeyedLocks>,
}

impl VoteCoordinator {
    pub fn new(
        config: &ForumConfig,
        store: Arc<dyn RecordStore>,
        accounts: Accounts,
        weigher: Arc<dyn VoteWeigher>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            store,
            accounts,
            moderators: config.moderators.clone(),
            weigher,
            locks,
        }
    }

    /// Casts one vote on a post or comment on behalf of a session.
    pub async fn cast_vote(
        &self,
        target: VoteTarget,
        record_id: &str,
        session_id: &str,
        direction: Direction,
    ) -> Result<VoteOutcome> {
        if record_id.is_empty() {
            return Err(AppError::validation("missing post id"));
        }
        match target {
            VoteTarget::Post => {
                self.vote_on::<Post>(target, record_id, session_id, direction)
                    .await
            }
            VoteTarget::Comment => {
                self.vote_on::<Comment>(target, record_id, session_id, direction)
                    .await
            }
        }
    }

    async fn vote_on<T: Votable>(
        &self,
        target: VoteTarget,
        record_id: &str,
        session_id: &str,
        direction: Direction,
    ) -> Result<VoteOutcome> {
        // 1. The record must exist
        self.read_votable::<T>(target, record_id).await?;

        // 2. Identity
        let user_id = self.accounts.user_id(session_id).await?;

        // Re-read under the lock so concurrent tallies build on each other
        let _guard = self.locks.acquire(target.table(), record_id).await;
        let mut item: T = self.read_votable(target, record_id).await?;

        // 3. One normal vote per user and record
        let moderator = self.moderators.contains(&user_id);
        let check = VoteCheck::new(record_id, &user_id);
        if !moderator && self.has_voted(target, &check).await {
            return Err(AppError::conflict("already voted"));
        }

        let weight = if moderator {
            self.weigher.moderator_weight()
        } else {
            1
        };

        if !moderator {
            self.store
                .create(target.check_table(), check_record(&check))
                .await?;
        }

        // 4. Apply and write the whole record back
        let tally = item.apply_vote(direction, weight);
        self.store
            .update(target.table(), record_id, item.to_record()?)
            .await?;

        log::debug!(
            "{direction:?} vote on {} {record_id} by {user_id}: weight {weight}, score {}",
            target.table(),
            tally.score
        );
        Ok(VoteOutcome {
            weight,
            moderator,
            tally,
        })
    }

    async fn read_votable<T: Votable>(&self, target: VoteTarget, record_id: &str) -> Result<T> {
        let record = self
            .store
            .read(&ReadRequest::by_id(target.table(), record_id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::not_found("post or comment not found"))?;
        T::from_record(record)
    }

    /// A failed lookup counts as "not voted": the marker table may not exist yet.
    async fn has_voted(&self, target: VoteTarget, check: &VoteCheck) -> bool {
        match self
            .store
            .read(&ReadRequest::by_id(target.check_table(), &check.id))
            .await
        {
            Ok(records) => !records.is_empty(),
            Err(e) => {
                log::debug!("vote check lookup in {} failed: {e}", target.check_table());
                false
            }
        }
    }
}

fn check_record(check: &VoteCheck) -> Record {
    let mut record = Record::new();
    record.insert("id".to_string(), Value::String(check.id.clone()));
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Session;
    use crate::traits::{MockAccountService, MockRecordStore, MockVoteWeigher};
    use serde_json::json;

    const POST_ID: &str = "post-1";
    const USER_ID: &str = "user-1";
    const MOD_ID: &str = "mod-1";

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn accounts_for(user_id: &'static str) -> Accounts {
        let mut service = MockAccountService::new();
        service.expect_read_session().returning(move |id| {
            Ok(Session {
                id: id.to_string(),
                user_id: user_id.to_string(),
                ..Session::default()
            })
        });
        Accounts::new(Arc::new(service))
    }

    fn coordinator(
        store: MockRecordStore,
        accounts: Accounts,
        weigher: Arc<dyn VoteWeigher>,
    ) -> VoteCoordinator {
        let config = ForumConfig {
            moderators: ModeratorList::parse(MOD_ID),
            ..ForumConfig::default()
        };
        VoteCoordinator::new(
            &config,
            Arc::new(store),
            accounts,
            weigher,
            Arc::new(KeyedLocks::new()),
        )
    }

    fn no_weigher() -> Arc<dyn VoteWeigher> {
        let mut weigher = MockVoteWeigher::new();
        weigher.expect_moderator_weight().never();
        Arc::new(weigher)
    }

    fn expect_post(store: &mut MockRecordStore, post: Value) {
        let post = record(post);
        store
            .expect_read()
            .withf(|r| r.table == Table::Posts && r.id.as_deref() == Some(POST_ID))
            .returning(move |_| Ok(vec![post.clone()]));
    }

    #[tokio::test]
    async fn empty_id_fails_before_any_call() {
        let store = MockRecordStore::new();
        let service = MockAccountService::new();
        let votes = coordinator(store, Accounts::new(Arc::new(service)), no_weigher());

        let err = votes
            .cast_vote(VoteTarget::Post, "", "s1", Direction::Up)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.to_string(), "missing post id");
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let mut store = MockRecordStore::new();
        store.expect_read().returning(|_| Ok(Vec::new()));
        let service = MockAccountService::new();
        let votes = coordinator(store, Accounts::new(Arc::new(service)), no_weigher());

        let err = votes
            .cast_vote(VoteTarget::Comment, "c1", "s1", Direction::Down)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "post or comment not found");
    }

    #[tokio::test]
    async fn session_failure_propagates() {
        let mut store = MockRecordStore::new();
        expect_post(&mut store, json!({ "id": POST_ID }));
        let mut service = MockAccountService::new();
        service
            .expect_read_session()
            .returning(|_| Err(anyhow::anyhow!("session not found")));
        let votes = coordinator(store, Accounts::new(Arc::new(service)), no_weigher());

        let err = votes
            .cast_vote(VoteTarget::Post, POST_ID, "bad", Direction::Up)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
        assert_eq!(err.to_string(), "session not found");
    }

    #[tokio::test]
    async fn first_vote_adds_one_and_records_marker() {
        let mut store = MockRecordStore::new();
        expect_post(
            &mut store,
            json!({ "id": POST_ID, "upvotes": 2, "downvotes": "junk", "title": "t" }),
        );
        store
            .expect_read()
            .withf(|r| r.table == Table::PostVoteChecks)
            .returning(|_| Ok(Vec::new()));
        store
            .expect_create()
            .withf(|table, rec| {
                *table == Table::PostVoteChecks && rec["id"] == json!("post-1user-1")
            })
            .times(1)
            .returning(|_, _| Ok("post-1user-1".to_string()));
        store
            .expect_update()
            .withf(|table, id, rec| {
                *table == Table::Posts
                    && id == POST_ID
                    && rec["upvotes"] == json!(3)
                    && rec["downvotes"] == json!(0)
                    && rec["score"] == json!(3)
                    && rec["title"] == json!("t")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let votes = coordinator(store, accounts_for(USER_ID), no_weigher());
        let outcome = votes
            .cast_vote(VoteTarget::Post, POST_ID, "s1", Direction::Up)
            .await
            .unwrap();
        assert_eq!(outcome.weight, 1);
        assert!(!outcome.moderator);
        assert_eq!(
            outcome.tally,
            Tally {
                upvotes: 3,
                downvotes: 0,
                score: 3
            }
        );
    }

    #[tokio::test]
    async fn second_vote_is_rejected() {
        let mut store = MockRecordStore::new();
        expect_post(&mut store, json!({ "id": POST_ID, "upvotes": 1, "score": 1 }));
        store
            .expect_read()
            .withf(|r| r.table == Table::PostVoteChecks)
            .returning(|_| Ok(vec![record(json!({ "id": "post-1user-1" }))]));
        store.expect_create().never();
        store.expect_update().never();

        let votes = coordinator(store, accounts_for(USER_ID), no_weigher());
        let err = votes
            .cast_vote(VoteTarget::Post, POST_ID, "s1", Direction::Down)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(err.to_string(), "already voted");
    }

    #[tokio::test]
    async fn failed_marker_lookup_counts_as_unvoted() {
        let mut store = MockRecordStore::new();
        expect_post(&mut store, json!({ "id": POST_ID }));
        store
            .expect_read()
            .withf(|r| r.table == Table::PostVoteChecks)
            .returning(|_| Err(anyhow::anyhow!("table not found")));
        store.expect_create().times(1).returning(|_, _| Ok(String::new()));
        store
            .expect_update()
            .withf(|_, _, rec| rec["downvotes"] == json!(1) && rec["score"] == json!(-1))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let votes = coordinator(store, accounts_for(USER_ID), no_weigher());
        let outcome = votes
            .cast_vote(VoteTarget::Post, POST_ID, "s1", Direction::Down)
            .await
            .unwrap();
        assert_eq!(outcome.tally.score, -1);
    }

    #[tokio::test]
    async fn moderators_vote_heavier_without_markers() {
        let mut store = MockRecordStore::new();
        expect_post(&mut store, json!({ "id": POST_ID, "upvotes": 1, "downvotes": 1 }));
        store.expect_create().never();
        store
            .expect_update()
            .withf(|_, _, rec| {
                rec["upvotes"] == json!(8) && rec["downvotes"] == json!(1) && rec["score"] == json!(7)
            })
            .times(2)
            .returning(|_, _, _| Ok(()));
        let mut weigher = MockVoteWeigher::new();
        weigher.expect_moderator_weight().times(2).return_const(7i64);

        let votes = coordinator(store, accounts_for(MOD_ID), Arc::new(weigher));
        for _ in 0..2 {
            let outcome = votes
                .cast_vote(VoteTarget::Post, POST_ID, "s-mod", Direction::Up)
                .await
                .unwrap();
            assert!(outcome.moderator);
            assert_eq!(outcome.weight, 7);
        }
    }

    #[tokio::test]
    async fn comment_votes_use_comment_tables() {
        let mut store = MockRecordStore::new();
        store
            .expect_read()
            .withf(|r| r.table == Table::Comments)
            .returning(|_| Ok(vec![record(json!({ "id": "c1", "postId": POST_ID }))]));
        store
            .expect_read()
            .withf(|r| r.table == Table::CommentVoteChecks && r.id.as_deref() == Some("c1user-1"))
            .returning(|_| Ok(Vec::new()));
        store
            .expect_create()
            .withf(|table, _| *table == Table::CommentVoteChecks)
            .times(1)
            .returning(|_, _| Ok(String::new()));
        store
            .expect_update()
            .withf(|table, id, rec| *table == Table::Comments && id == "c1" && rec["postId"] == json!(POST_ID))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let votes = coordinator(store, accounts_for(USER_ID), no_weigher());
        votes
            .cast_vote(VoteTarget::Comment, "c1", "s1", Direction::Up)
            .await
            .unwrap();
    }

    #[test]
    fn huge_stored_counters_saturate() {
        let mut post = Post::from_record(record(json!({
            "id": POST_ID,
            "upvotes": 1e19,
            "downvotes": -1e19,
        })))
        .unwrap();
        assert_eq!(post.upvotes, i64::MAX);

        let tally = post.apply_vote(Direction::Up, 16);
        assert_eq!(tally.upvotes, i64::MAX);
        assert_eq!(tally.score, i64::MAX);

        let tally = post.apply_vote(Direction::Down, 1);
        assert_eq!(tally.downvotes, i64::MIN + 1);
        assert_eq!(post.score, Some(Score::Whole(i64::MAX)));
    }

    #[test]
    fn seeded_weights_stay_in_range() {
        let weigher = SeededWeigher::seeded(42);
        let draws: Vec<i64> = (0..2_000).map(|_| weigher.moderator_weight()).collect();
        assert!(draws.iter().all(|w| MODERATOR_WEIGHT.contains(w)));
        assert!(draws.contains(&4));
        assert!(draws.contains(&16));

        let again = SeededWeigher::seeded(42);
        let replay: Vec<i64> = (0..2_000).map(|_| again.moderator_weight()).collect();
        assert_eq!(draws, replay);
    }
}
