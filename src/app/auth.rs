use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use sqlx::Row;

use crate::app::users::{user_from_row, USER_COLUMNS};
use crate::domain::user::{validate_registration, FieldIssue, Registration, User};
use crate::infra::db::Db;

#[derive(Debug, Clone)]
pub enum RegisterOutcome {
    Created(User),
    Invalid { message: String, issue: FieldIssue },
    Duplicate(FieldIssue),
}

#[derive(Debug, Clone)]
pub enum LoginOutcome {
    LoggedIn(User),
    UnknownUser,
    WrongPassword,
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
}

impl AuthService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn register(&self, registration: Registration) -> Result<RegisterOutcome> {
        if let Some((message, issue)) = validate_registration(&registration) {
            return Ok(RegisterOutcome::Invalid { message, issue });
        }

        let existing = sqlx::query("SELECT username FROM users WHERE username = $1 OR email = $2")
            .bind(&registration.username)
            .bind(&registration.email)
            .fetch_optional(self.db.pool())
            .await?;

        if let Some(row) = existing {
            let username: String = row.get("username");
            return Ok(RegisterOutcome::Duplicate(duplicate_issue(
                username == registration.username,
            )));
        }

        let password_hash = hash_password(&registration.password)?;
        let inserted = sqlx::query(&format!(
            "INSERT INTO users (email, username, password_hash) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&registration.email)
        .bind(&registration.username)
        .bind(password_hash)
        .fetch_one(self.db.pool())
        .await;

        match inserted {
            Ok(row) => Ok(RegisterOutcome::Created(user_from_row(&row))),
            // A concurrent registration claimed the name between check and insert.
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
                let on_username = db_err
                    .constraint()
                    .map(|name| name.contains("username"))
                    .unwrap_or(false);
                Ok(RegisterOutcome::Duplicate(duplicate_issue(on_username)))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// `identifier` is treated as an email when it contains `@`, otherwise as a username.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginOutcome> {
        let column = if identifier.contains('@') { "email" } else { "username" };
        let row = sqlx::query(&format!(
            "SELECT {}, password_hash FROM users WHERE {} = $1",
            USER_COLUMNS, column
        ))
        .bind(identifier)
        .fetch_optional(self.db.pool())
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(LoginOutcome::UnknownUser),
        };

        let password_hash: String = row.get("password_hash");
        if !verify_password(password, &password_hash)? {
            return Ok(LoginOutcome::WrongPassword);
        }

        Ok(LoginOutcome::LoggedIn(user_from_row(&row)))
    }
}

fn duplicate_issue(on_username: bool) -> FieldIssue {
    if on_username {
        FieldIssue::new("username", "Username has already been taken")
    } else {
        FieldIssue::new("email", "Email has already been taken")
    }
}

pub(crate) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

pub(crate) fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
