use axum::{routing::get, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn graphql() -> Router<AppState> {
    Router::new().route("/graphql", get(handlers::graphiql).post(handlers::graphql))
}
