use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::extract::{Extension, State};
use axum::response::{Html, IntoResponse};
use axum::Json;
use serde::Serialize;

use crate::graphql::{self, AppSchema};
use crate::http::SessionUser;
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

pub(crate) async fn graphiql() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

/// Executes one GraphQL request with its own session identity and loaders.
pub(crate) async fn graphql(
    State(state): State<AppState>,
    Extension(schema): Extension<AppSchema>,
    session: SessionUser,
    request: GraphQLRequest,
) -> GraphQLResponse {
    let request = graphql::with_request_data(request.into_inner(), &state, session);
    schema.execute(request).await.into()
}
