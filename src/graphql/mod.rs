//! GraphQL surface: schema construction and per-request context.
//!
//! Process-wide clients live in [`AppState`] and are attached once when the
//! schema is built. Everything tied to a single inbound request (the caller's
//! identity and the batching loaders) is attached in [`with_request_data`] and
//! dropped when the request finishes.

use std::fmt::Debug;

use async_graphql::dataloader::DataLoader;
use async_graphql::{Context, EmptySubscription, Error, ErrorExtensions, Schema};

use crate::http::SessionUser;
use crate::AppState;

mod loaders;
mod mutation;
mod query;
mod types;

pub use loaders::{UserLoader, VoteKey, VoteLoader};
pub use mutation::MutationRoot;
pub use query::QueryRoot;

pub type AppSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema(state: AppState) -> AppSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(state)
        .finish()
}

/// Identity of the caller for the current request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub current_user_id: Option<i32>,
    pub session_token: Option<String>,
}

pub fn with_request_data(
    request: async_graphql::Request,
    state: &AppState,
    session: SessionUser,
) -> async_graphql::Request {
    request
        .data(RequestContext {
            current_user_id: session.user_id,
            session_token: session.token,
        })
        .data(DataLoader::new(UserLoader::new(state.db.clone()), tokio::spawn))
        .data(DataLoader::new(VoteLoader::new(state.db.clone()), tokio::spawn))
}

pub(crate) fn app_state<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a AppState> {
    ctx.data::<AppState>()
}

pub(crate) fn request_context<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a RequestContext> {
    ctx.data::<RequestContext>()
}

pub(crate) fn require_user(ctx: &Context<'_>) -> async_graphql::Result<i32> {
    request_context(ctx)?
        .current_user_id
        .ok_or_else(unauthenticated)
}

pub(crate) fn unauthenticated() -> Error {
    Error::new("Not authenticated").extend_with(|_, ext| ext.set("code", "UNAUTHENTICATED"))
}

pub(crate) fn bad_input(message: &str) -> Error {
    Error::new(message).extend_with(|_, ext| ext.set("code", "BAD_USER_INPUT"))
}

pub(crate) fn log_internal(err: impl Debug, context: &str) {
    tracing::error!(error = ?err, "{}", context);
}

pub(crate) fn internal_error(err: impl Debug, context: &str) -> Error {
    log_internal(err, context);
    Error::new("Internal server error").extend_with(|_, ext| ext.set("code", "INTERNAL_SERVER_ERROR"))
}
