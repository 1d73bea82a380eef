use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::post::{Post, PostPage};
use crate::infra::db::Db;

pub(crate) const POST_COLUMNS: &str =
    "id, title, text, user_id, points, created_at, updated_at";

pub(crate) fn post_from_row(row: &PgRow) -> Post {
    Post {
        id: row.get("id"),
        title: row.get("title"),
        text: row.get("text"),
        user_id: row.get("user_id"),
        points: row.get("points"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error("post not found")]
    NotFound,
    #[error("caller does not own this post")]
    Unauthorized,
    #[error("author {0} no longer exists")]
    UnknownAuthor(i32),
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_post(
        &self,
        owner_id: i32,
        title: String,
        text: String,
    ) -> Result<Post, PostError> {
        let row = sqlx::query(&format!(
            "INSERT INTO posts (title, text, user_id) VALUES ($1, $2, $3) RETURNING {}",
            POST_COLUMNS
        ))
        .bind(title)
        .bind(text)
        .bind(owner_id)
        .fetch_one(self.db.pool())
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23503") => {
                PostError::UnknownAuthor(owner_id)
            }
            _ => PostError::Storage(err),
        })?;

        Ok(post_from_row(&row))
    }

    pub async fn get_post(&self, post_id: i32) -> Result<Option<Post>> {
        let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = $1", POST_COLUMNS))
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    pub async fn list_all(&self) -> Result<Vec<Post>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM posts ORDER BY created_at DESC, id DESC",
            POST_COLUMNS
        ))
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    /// Newest-first page strictly older than `cursor`.
    pub async fn paginate(
        &self,
        limit: i64,
        cursor: Option<(OffsetDateTime, i32)>,
    ) -> Result<PostPage> {
        let total_posts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(self.db.pool())
            .await?;

        // One extra row tells us whether another page exists.
        let rows = match cursor {
            Some((created_at, post_id)) => {
                sqlx::query(&format!(
                    "SELECT {} FROM posts \
                     WHERE (created_at < $1 OR (created_at = $1 AND id < $2)) \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $3",
                    POST_COLUMNS
                ))
                .bind(created_at)
                .bind(post_id)
                .bind(limit + 1)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM posts \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $1",
                    POST_COLUMNS
                ))
                .bind(limit + 1)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        let mut posts: Vec<Post> = rows.iter().map(post_from_row).collect();
        let has_more = i64::try_from(posts.len()).unwrap_or(i64::MAX) > limit;
        posts.truncate(limit.max(0) as usize);

        Ok(PostPage {
            total_posts,
            posts,
            has_more,
        })
    }

    /// Edits title and text. Points are never touched here.
    pub async fn update_post(
        &self,
        caller_id: i32,
        post_id: i32,
        title: String,
        text: String,
    ) -> Result<Post, PostError> {
        let mut tx = self.db.pool().begin().await?;
        self.lock_owned_post(&mut tx, caller_id, post_id).await?;

        let row = sqlx::query(&format!(
            "UPDATE posts SET title = $2, text = $3, updated_at = now() \
             WHERE id = $1 \
             RETURNING {}",
            POST_COLUMNS
        ))
        .bind(post_id)
        .bind(title)
        .bind(text)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(post_from_row(&row))
    }

    /// Deletes the post; its votes go with it through the foreign key cascade.
    pub async fn delete_post(&self, caller_id: i32, post_id: i32) -> Result<(), PostError> {
        let mut tx = self.db.pool().begin().await?;
        self.lock_owned_post(&mut tx, caller_id, post_id).await?;

        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn lock_owned_post(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        caller_id: i32,
        post_id: i32,
    ) -> Result<(), PostError> {
        let owner_id: Option<i32> =
            sqlx::query_scalar("SELECT user_id FROM posts WHERE id = $1 FOR UPDATE")
                .bind(post_id)
                .fetch_optional(&mut **tx)
                .await?;

        match owner_id {
            None => Err(PostError::NotFound),
            Some(owner_id) if owner_id != caller_id => Err(PostError::Unauthorized),
            Some(_) => Ok(()),
        }
    }
}
