use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use crate::app::auth::{hash_password, verify_password};
use crate::app::users::{user_from_row, USER_COLUMNS};
use crate::domain::user::{password_long_enough, FieldIssue, User};
use crate::infra::db::Db;
use crate::infra::mailer::Mailer;
use crate::infra::reset_tokens::ResetTokenStore;

#[derive(Debug, Clone)]
pub enum ChangePasswordOutcome {
    Changed(User),
    Rejected { message: String, issue: FieldIssue },
}

impl ChangePasswordOutcome {
    fn rejected(message: &str, field: &str, detail: &str) -> Self {
        Self::Rejected {
            message: message.into(),
            issue: FieldIssue::new(field, detail),
        }
    }
}

#[derive(Clone)]
pub struct PasswordResetService {
    db: Db,
    tokens: ResetTokenStore,
    mailer: Arc<dyn Mailer>,
    link_base: String,
}

impl PasswordResetService {
    pub fn new(
        db: Db,
        tokens: ResetTokenStore,
        mailer: Arc<dyn Mailer>,
        link_base: String,
    ) -> Self {
        Self {
            db,
            tokens,
            mailer,
            link_base,
        }
    }

    /// Issues a fresh reset token and mails the link. Unknown emails are a
    /// silent no-op.
    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        let user_id: Option<i32> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(self.db.pool())
            .await?;

        let Some(user_id) = user_id else {
            tracing::debug!("password reset requested for unknown email");
            return Ok(());
        };

        let token = Uuid::new_v4().to_string();
        self.tokens.replace(user_id, &hash_password(&token)?).await?;

        let link = format!("{}?token={}&userId={}", self.link_base, token, user_id);
        self.mailer
            .send(
                email,
                "Reset your password",
                &format!("<a href=\"{}\">Click here to change your password</a>", link),
            )
            .await?;

        tracing::info!(user_id = user_id, "password reset token issued");
        Ok(())
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        token: &str,
        new_password: &str,
    ) -> Result<ChangePasswordOutcome> {
        let Ok(user_id) = user_id.parse::<i32>() else {
            return Ok(ChangePasswordOutcome::rejected(
                "Invalid token",
                "token",
                "Token has expired",
            ));
        };

        let Some(token_hash) = self.tokens.get(user_id).await? else {
            return Ok(ChangePasswordOutcome::rejected(
                "Invalid token",
                "token",
                "Token has expired",
            ));
        };

        if !password_long_enough(new_password) {
            return Ok(ChangePasswordOutcome::rejected(
                "Invalid password",
                "newPassword",
                "Password must be longer than 2 characters",
            ));
        }

        if !verify_password(token, &token_hash)? {
            return Ok(ChangePasswordOutcome::rejected(
                "Invalid token",
                "token",
                "Invalid token",
            ));
        }

        let row = sqlx::query(&format!(
            "UPDATE users SET password_hash = $2, updated_at = now() \
             WHERE id = $1 \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(hash_password(new_password)?)
        .fetch_optional(self.db.pool())
        .await?;

        let Some(row) = row else {
            return Ok(ChangePasswordOutcome::rejected(
                "User not found",
                "user",
                "User not found",
            ));
        };

        self.tokens.delete(user_id).await?;
        tracing::info!(user_id = user_id, "password changed via reset token");

        Ok(ChangePasswordOutcome::Changed(user_from_row(&row)))
    }
}
