use std::fmt::Debug;

use async_graphql::{Context, Object, Result};
use axum::http::header::SET_COOKIE;

use crate::app::auth::{AuthService, LoginOutcome, RegisterOutcome};
use crate::app::password_reset::{ChangePasswordOutcome, PasswordResetService};
use crate::app::posts::{PostError, PostService};
use crate::app::users::{UserError, UserService};
use crate::app::votes::{PgVoteStore, VoteError, VoteService};
use crate::domain::user::{FieldIssue, Registration, User};
use crate::graphql::types::{
    ChangePasswordData, ForgotPasswordInput, LoginInput, PostInput, PostMutationResponse,
    RegisterInput, UserMutationResponse, VoteTypeValue,
};
use crate::graphql::{app_state, log_internal, request_context, require_user, unauthenticated};
use crate::http::{clear_session_cookie, session_cookie};
use crate::AppState;

#[derive(Debug, Default)]
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn register(
        &self,
        ctx: &Context<'_>,
        register_input: RegisterInput,
    ) -> Result<UserMutationResponse> {
        let state = app_state(ctx)?;
        let outcome = match AuthService::new(state.db.clone())
            .register(Registration {
                email: register_input.email,
                username: register_input.username,
                password: register_input.password,
            })
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => return Ok(user_server_error(err, "failed to register user")),
        };

        match outcome {
            RegisterOutcome::Created(user) => {
                if let Err(response) = start_session(ctx, state, &user).await {
                    return Ok(response);
                }
                tracing::info!(user_id = user.id, "user registered");
                Ok(UserMutationResponse::ok(200, "Register successfully", user))
            }
            RegisterOutcome::Invalid { message, issue } => {
                Ok(UserMutationResponse::invalid(&message, issue))
            }
            RegisterOutcome::Duplicate(issue) => Ok(UserMutationResponse::invalid(
                "Duplicate username or email",
                issue,
            )),
        }
    }

    async fn login(&self, ctx: &Context<'_>, login_input: LoginInput) -> Result<UserMutationResponse> {
        let state = app_state(ctx)?;
        let outcome = match AuthService::new(state.db.clone())
            .login(&login_input.username_or_email, &login_input.password)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => return Ok(user_server_error(err, "failed to log in")),
        };

        match outcome {
            LoginOutcome::LoggedIn(user) => {
                if let Err(response) = start_session(ctx, state, &user).await {
                    return Ok(response);
                }
                Ok(UserMutationResponse::ok(200, "Login successfully", user))
            }
            LoginOutcome::UnknownUser => Ok(UserMutationResponse::invalid(
                "User not found",
                FieldIssue::new("usernameOrEmail", "Username or email incorrect"),
            )),
            LoginOutcome::WrongPassword => Ok(UserMutationResponse::invalid(
                "Password incorrect",
                FieldIssue::new("password", "Password incorrect"),
            )),
        }
    }

    /// Ends the caller's session and clears the cookie. Returns `false` only
    /// when the session store could not be reached.
    async fn logout(&self, ctx: &Context<'_>) -> Result<bool> {
        end_session(ctx, app_state(ctx)?).await
    }

    async fn delete_user_by_username(
        &self,
        ctx: &Context<'_>,
        username: String,
    ) -> Result<UserMutationResponse> {
        let caller_id = require_user(ctx)?;
        let state = app_state(ctx)?;

        match UserService::new(state.db.clone())
            .delete_by_username(caller_id, &username)
            .await
        {
            Ok(user) => {
                tracing::info!(user_id = user.id, "user deleted");
                end_session(ctx, state).await?;
                Ok(UserMutationResponse::ok(200, "Deleted user successfully", user))
            }
            Err(UserError::NotFound) => Ok(UserMutationResponse::failure(404, "User not found")),
            Err(UserError::Unauthorized) => Ok(UserMutationResponse::failure(
                403,
                "You can only delete your own account",
            )),
            Err(UserError::Storage(err)) => Ok(user_server_error(err, "failed to delete user")),
        }
    }

    async fn forgot_password(
        &self,
        ctx: &Context<'_>,
        forgot_password_input: ForgotPasswordInput,
    ) -> Result<bool> {
        let state = app_state(ctx)?;
        if let Err(err) = password_reset(state)
            .forgot_password(&forgot_password_input.email)
            .await
        {
            tracing::error!(error = ?err, "failed to issue password reset");
        }
        Ok(true)
    }

    async fn change_password(
        &self,
        ctx: &Context<'_>,
        change_password_data: ChangePasswordData,
    ) -> Result<UserMutationResponse> {
        let state = app_state(ctx)?;
        let outcome = match password_reset(state)
            .change_password(
                &change_password_data.user_id,
                &change_password_data.token,
                &change_password_data.new_password,
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => return Ok(user_server_error(err, "failed to change password")),
        };

        match outcome {
            ChangePasswordOutcome::Changed(user) => Ok(UserMutationResponse::ok(
                200,
                "Updated password successfully",
                user,
            )),
            ChangePasswordOutcome::Rejected { message, issue } => {
                Ok(UserMutationResponse::invalid(&message, issue))
            }
        }
    }

    async fn create_post(
        &self,
        ctx: &Context<'_>,
        post_input: PostInput,
    ) -> Result<PostMutationResponse> {
        let owner_id = require_user(ctx)?;
        if let Some(issue) = validate_post_input(&post_input) {
            return Ok(PostMutationResponse::invalid("Invalid post", issue));
        }

        let state = app_state(ctx)?;
        match PostService::new(state.db.clone())
            .create_post(owner_id, post_input.title, post_input.text)
            .await
        {
            Ok(post) => {
                tracing::info!(post_id = post.id, user_id = owner_id, "post created");
                Ok(PostMutationResponse::ok(200, "Created post successfully", Some(post)))
            }
            Err(err) => post_failure(err, "failed to create post"),
        }
    }

    async fn update_post(
        &self,
        ctx: &Context<'_>,
        id: i32,
        post_input: PostInput,
    ) -> Result<PostMutationResponse> {
        let caller_id = require_user(ctx)?;
        if let Some(issue) = validate_post_input(&post_input) {
            return Ok(PostMutationResponse::invalid("Invalid post", issue));
        }

        let state = app_state(ctx)?;
        match PostService::new(state.db.clone())
            .update_post(caller_id, id, post_input.title, post_input.text)
            .await
        {
            Ok(post) => Ok(PostMutationResponse::ok(200, "Post updated successfully", Some(post))),
            Err(err) => post_failure(err, "failed to update post"),
        }
    }

    async fn delete_post(&self, ctx: &Context<'_>, id: i32) -> Result<PostMutationResponse> {
        let caller_id = require_user(ctx)?;
        let state = app_state(ctx)?;

        match PostService::new(state.db.clone())
            .delete_post(caller_id, id)
            .await
        {
            Ok(()) => {
                tracing::info!(post_id = id, user_id = caller_id, "post deleted");
                Ok(PostMutationResponse::ok(200, "Deleted post successfully", None))
            }
            Err(err) => post_failure(err, "failed to delete post"),
        }
    }

    /// Casts the caller's vote on a post. Repeating the same vote is a no-op;
    /// the opposite vote flips it.
    async fn vote(
        &self,
        ctx: &Context<'_>,
        post_id: i32,
        vote_value: VoteTypeValue,
    ) -> Result<PostMutationResponse> {
        let state = app_state(ctx)?;
        let current_user_id = request_context(ctx)?.current_user_id;

        let service = VoteService::new(
            PgVoteStore::new(state.db.clone(), state.vote_lock_timeout_ms),
            state.vote_retry.clone(),
        );

        match service
            .cast_vote(current_user_id, post_id, vote_value.into())
            .await
        {
            Ok(outcome) => Ok(PostMutationResponse::ok(200, "Post voted", Some(outcome.post))),
            Err(VoteError::Unauthenticated) => Err(unauthenticated()),
            Err(VoteError::PostNotFound(_)) => {
                Ok(PostMutationResponse::failure(404, "Post doesn't exist"))
            }
            Err(VoteError::StorageUnavailable { .. }) => Ok(PostMutationResponse::failure(
                503,
                "Voting is temporarily unavailable, please retry",
            )),
        }
    }
}

async fn start_session(
    ctx: &Context<'_>,
    state: &AppState,
    user: &User,
) -> Result<(), UserMutationResponse> {
    let token = state
        .sessions
        .create(user.id)
        .await
        .map_err(|err| user_server_error(err, "failed to create session"))?;

    ctx.append_http_header(
        SET_COOKIE,
        session_cookie(
            &state.session_cookie_name,
            &token,
            state.sessions.ttl_seconds(),
            state.cookie_secure,
        ),
    );
    Ok(())
}

/// Clears the session cookie and drops the caller's session, if any. Returns
/// `false` only when the session store could not be reached.
async fn end_session(ctx: &Context<'_>, state: &AppState) -> Result<bool> {
    ctx.append_http_header(
        SET_COOKIE,
        clear_session_cookie(&state.session_cookie_name, state.cookie_secure),
    );

    let Some(token) = request_context(ctx)?.session_token.as_deref() else {
        return Ok(true);
    };

    match state.sessions.destroy(token).await {
        Ok(_) => Ok(true),
        Err(err) => {
            tracing::error!(error = ?err, "failed to destroy session");
            Ok(false)
        }
    }
}

fn user_server_error(err: impl Debug, context: &str) -> UserMutationResponse {
    log_internal(err, context);
    UserMutationResponse::server_error()
}

fn password_reset(state: &AppState) -> PasswordResetService {
    PasswordResetService::new(
        state.db.clone(),
        state.reset_tokens.clone(),
        state.mailer.clone(),
        state.reset_link_base.clone(),
    )
}

fn validate_post_input(input: &PostInput) -> Option<FieldIssue> {
    if input.title.trim().is_empty() {
        return Some(FieldIssue::new("title", "Title must not be empty"));
    }
    if input.text.trim().is_empty() {
        return Some(FieldIssue::new("text", "Text must not be empty"));
    }
    None
}

fn post_failure(err: PostError, context: &str) -> Result<PostMutationResponse> {
    match err {
        PostError::NotFound => Ok(PostMutationResponse::failure(404, "Post doesn't exist")),
        PostError::Unauthorized => Ok(PostMutationResponse::failure(
            403,
            "You are not allowed to modify this post",
        )),
        PostError::UnknownAuthor(_) => Err(unauthenticated()),
        PostError::Storage(err) => {
            log_internal(err, context);
            Ok(PostMutationResponse::server_error())
        }
    }
}
