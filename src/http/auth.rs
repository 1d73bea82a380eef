use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::http::AppError;
use crate::AppState;

/// Identity resolved from the session cookie. Anonymous requests carry `None`.
#[derive(Debug, Clone, Default)]
pub struct SessionUser {
    pub user_id: Option<i32>,
    pub token: Option<String>,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|cookies| cookie_value(cookies, &state.session_cookie_name));

        let Some(token) = token else {
            return Ok(SessionUser::default());
        };

        let user_id = state.sessions.user_id(&token).await.map_err(|err| {
            tracing::error!(error = ?err, "failed to load session");
            AppError::internal("failed to authenticate")
        })?;

        Ok(SessionUser {
            user_id,
            token: Some(token),
        })
    }
}

fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

pub fn session_cookie(name: &str, token: &str, max_age_seconds: u64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        name, token, max_age_seconds
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_session_cookie(name: &str, secure: bool) -> String {
    session_cookie(name, "", 0, secure)
}
