use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use thiserror::Error;

use crate::domain::user::User;
use crate::infra::db::Db;

pub(crate) const USER_COLUMNS: &str = "id, email, username, created_at, updated_at";

pub(crate) fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[derive(Debug, Error)]
pub enum UserError {
    #[error("user not found")]
    NotFound,
    #[error("caller may only delete their own account")]
    Unauthorized,
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_user(&self, user_id: i32) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    pub async fn users_by_ids(&self, user_ids: &[i32]) -> Result<Vec<User>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users WHERE id = ANY($1)",
            USER_COLUMNS
        ))
        .bind(user_ids)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    /// Delete an account and everything it owns (posts and votes cascade).
    pub async fn delete_by_username(&self, caller_id: i32, username: &str) -> Result<User, UserError> {
        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE username = $1 FOR UPDATE",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&mut *tx)
        .await?;

        let user = match row {
            Some(row) => user_from_row(&row),
            None => return Err(UserError::NotFound),
        };
        if user.id != caller_id {
            return Err(UserError::Unauthorized);
        }

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user)
    }
}
