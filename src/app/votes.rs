//! Vote aggregation.
//!
//! A post's `points` column caches the sum of its vote values. Every change to
//! a vote row and the matching `points` adjustment happen in one transaction
//! that holds the post row lock, so concurrent votes on the same post are
//! applied one after another and never compute their delta from a stale
//! total. Votes on different posts lock different rows and run in parallel.

use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use rand::Rng;
use sqlx::Row;
use thiserror::Error;

use crate::app::posts::{post_from_row, POST_COLUMNS};
use crate::domain::post::Post;
use crate::domain::vote::{plan_vote, Vote, VoteChange, VotePlan, VoteType};
use crate::infra::db::Db;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Serialization failure, deadlock, lock timeout or a unique violation.
    #[error("transient storage conflict: {0}")]
    Conflict(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    /// The voting user's row is gone, so the vote cannot reference it.
    #[error("voter {0} no longer exists")]
    UnknownVoter(i32),
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                // serialization_failure, deadlock_detected, lock_not_available, unique_violation
                Some("40001") | Some("40P01") | Some("55P03") | Some("23505") => {
                    Self::Conflict(err.to_string())
                }
                _ => Self::Fatal(err.into()),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => Self::Unavailable(err.to_string()),
            _ => Self::Fatal(err.into()),
        }
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23503"))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    #[error("not authenticated")]
    Unauthenticated,
    #[error("post {0} not found")]
    PostNotFound(i32),
    #[error("storage unavailable after {attempts} attempt(s)")]
    StorageUnavailable { attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct VoteOutcome {
    pub post: Post,
    pub plan: VotePlan,
}

/// Transactional read-decide-write of one user's vote on one post.
#[async_trait]
pub trait VoteStore: Send + Sync {
    /// Applies `requested` for `(post_id, user_id)` while holding the post's
    /// lock. Returns `Ok(None)` when the post does not exist; in that case
    /// nothing is written.
    async fn apply_vote(
        &self,
        post_id: i32,
        user_id: i32,
        requested: VoteType,
    ) -> Result<Option<VoteOutcome>, StoreError>;
}

#[derive(Clone)]
pub struct PgVoteStore {
    db: Db,
    lock_timeout_ms: u64,
}

impl PgVoteStore {
    pub fn new(db: Db, lock_timeout_ms: u64) -> Self {
        Self { db, lock_timeout_ms }
    }
}

#[async_trait]
impl VoteStore for PgVoteStore {
    async fn apply_vote(
        &self,
        post_id: i32,
        user_id: i32,
        requested: VoteType,
    ) -> Result<Option<VoteOutcome>, StoreError> {
        // Dropping `tx` without commit rolls everything back, including when
        // the caller goes away mid-request.
        let mut tx = self.db.pool().begin().await?;

        // SET LOCAL does not accept bind parameters.
        sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM posts WHERE id = $1 FOR UPDATE",
            POST_COLUMNS
        ))
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };
        let mut post = post_from_row(&row);

        let existing: Option<i16> = sqlx::query_scalar(
            "SELECT value FROM votes WHERE post_id = $1 AND user_id = $2",
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let existing = existing
            .map(|value| {
                VoteType::from_db(value).ok_or_else(|| anyhow!("unknown vote value: {}", value))
            })
            .transpose()?;

        let plan = plan_vote(existing, requested);

        match plan.change {
            VoteChange::Unchanged => {
                tx.commit().await?;
                return Ok(Some(VoteOutcome { post, plan }));
            }
            VoteChange::Insert => {
                let inserted = sqlx::query(
                    "INSERT INTO votes (post_id, user_id, value) VALUES ($1, $2, $3)",
                )
                .bind(post_id)
                .bind(user_id)
                .bind(plan.value.as_db())
                .execute(&mut *tx)
                .await;

                // The post row is locked, so a foreign key miss can only be the user.
                if let Err(err) = inserted {
                    return Err(if is_foreign_key_violation(&err) {
                        StoreError::UnknownVoter(user_id)
                    } else {
                        err.into()
                    });
                }
            }
            VoteChange::Flip { .. } => {
                sqlx::query("UPDATE votes SET value = $3 WHERE post_id = $1 AND user_id = $2")
                    .bind(post_id)
                    .bind(user_id)
                    .bind(plan.value.as_db())
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let points: i32 = sqlx::query_scalar(
            "UPDATE posts SET points = points + $2 WHERE id = $1 RETURNING points",
        )
        .bind(post_id)
        .bind(plan.delta)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        post.points = points;
        Ok(Some(VoteOutcome { post, plan }))
    }
}

/// Current votes for a batch of `(post_id, user_id)` pairs. Pairs without a
/// vote are simply absent from the result.
pub async fn votes_by_keys(db: &Db, keys: &[(i32, i32)]) -> Result<Vec<Vote>, sqlx::Error> {
    let (post_ids, user_ids): (Vec<i32>, Vec<i32>) = keys.iter().copied().unzip();

    let rows = sqlx::query(
        "SELECT v.post_id, v.user_id, v.value \
         FROM votes v \
         JOIN UNNEST($1::int4[], $2::int4[]) AS k(post_id, user_id) \
           ON v.post_id = k.post_id AND v.user_id = k.user_id",
    )
    .bind(post_ids)
    .bind(user_ids)
    .fetch_all(db.pool())
    .await?;

    let mut votes = Vec::with_capacity(rows.len());
    for row in rows {
        let raw: i16 = row.get("value");
        let Some(value) = VoteType::from_db(raw) else {
            tracing::warn!(value = raw, "skipping vote with unknown value");
            continue;
        };
        votes.push(Vote {
            post_id: row.get("post_id"),
            user_id: row.get("user_id"),
            value,
        });
    }

    Ok(votes)
}

/// Bounded retry with capped exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = 2_u32.saturating_pow(attempt.saturating_sub(1));
        let base_ms = u64::try_from(self.initial_backoff.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max_backoff.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(u64::from(exponent)).min(max_ms))
    }

    /// Base delay plus up to 50% random jitter so colliding voters spread out.
    fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let spread = u64::try_from(base.as_millis() / 2).unwrap_or(0);
        if spread == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
    }
}

pub struct VoteService<S> {
    store: S,
    retry: RetryPolicy,
}

impl<S: VoteStore> VoteService<S> {
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Applies a vote by the session's user, retrying transient storage
    /// conflicts. `current_user_id` must come from the authenticated session.
    pub async fn cast_vote(
        &self,
        current_user_id: Option<i32>,
        post_id: i32,
        vote: VoteType,
    ) -> Result<VoteOutcome, VoteError> {
        let user_id = current_user_id.ok_or(VoteError::Unauthenticated)?;
        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.store.apply_vote(post_id, user_id, vote).await {
                Ok(Some(outcome)) => {
                    tracing::debug!(
                        post_id = post_id,
                        user_id = user_id,
                        change = ?outcome.plan.change,
                        delta = outcome.plan.delta,
                        points = outcome.post.points,
                        attempt = attempt,
                        "vote applied"
                    );
                    return Ok(outcome);
                }
                Ok(None) => return Err(VoteError::PostNotFound(post_id)),
                Err(StoreError::UnknownVoter(_)) => {
                    tracing::warn!(
                        post_id = post_id,
                        user_id = user_id,
                        "vote from a session whose user no longer exists"
                    );
                    return Err(VoteError::Unauthenticated);
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.jittered_delay(attempt);
                    tracing::warn!(
                        error = %err,
                        post_id = post_id,
                        attempt = attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "retrying vote after transient storage failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    tracing::error!(
                        error = ?err,
                        post_id = post_id,
                        user_id = user_id,
                        attempt = attempt,
                        "failed to apply vote"
                    );
                    return Err(VoteError::StorageUnavailable { attempts: attempt });
                }
            }
        }

        Err(VoteError::StorageUnavailable {
            attempts: max_attempts,
        })
    }
}
