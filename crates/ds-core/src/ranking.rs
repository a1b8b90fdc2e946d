//! # Ranking
//!
//! Orders posts, comments and boards for display by combining the order of
//! magnitude of the vote score with the age of the record.

use std::cmp::Ordering;

use crate::models::{Board, Comment, Created, Post, Score};

/// Reference point for the recency term, in Unix seconds.
pub const RANK_EPOCH: i64 = 1_134_028_003;

/// Seconds of age worth one unit of rank.
pub const DECAY_SECONDS: f64 = 45_000.0;

/// Rank of a record without a numeric score; below every real rank.
pub const UNSCORED: f64 = f64::NEG_INFINITY;

/// Anything that can be placed in a ranked listing.
pub trait Rankable {
    fn score(&self) -> Option<f64>;
    fn created(&self) -> &Created;
}

impl Rankable for Post {
    fn score(&self) -> Option<f64> {
        self.score.map(Score::as_f64)
    }

    fn created(&self) -> &Created {
        &self.created
    }
}

impl Rankable for Comment {
    fn score(&self) -> Option<f64> {
        self.score.map(Score::as_f64)
    }

    fn created(&self) -> &Created {
        &self.created
    }
}

/// Boards are never voted on, so they keep the store's order.
impl Rankable for Board {
    fn score(&self) -> Option<f64> {
        None
    }

    fn created(&self) -> &Created {
        &self.created
    }
}

/// Computes the sort key; higher is more prominent.
pub fn rank<R: Rankable + ?Sized>(record: &R) -> f64 {
    let Some(score) = record.score().filter(|s| s.is_finite()) else {
        return UNSCORED;
    };

    let sign = if score > 0.0 {
        1.0
    } else if score < 0.0 {
        -1.0
    } else {
        0.0
    };
    let order = score.abs().max(1.0).log10();
    let seconds = record.created().unix_seconds().saturating_sub(RANK_EPOCH);

    sign * order + seconds as f64 / DECAY_SECONDS
}

/// Descending rank order. Equal ranks fall back to the raw score so that a
/// score of 1 still sorts above 0 at the same age.
pub fn compare_rank<R: Rankable + ?Sized>(a: &R, b: &R) -> Ordering {
    let score = |r: &R| r.score().unwrap_or(UNSCORED);
    rank(b)
        .total_cmp(&rank(a))
        .then_with(|| score(b).total_cmp(&score(a)))
}

/// Sorts in place, most prominent first. The sort is stable.
pub fn sort_by_rank<R: Rankable>(records: &mut [R]) {
    records.sort_by(|a, b| compare_rank(a, b));
}
