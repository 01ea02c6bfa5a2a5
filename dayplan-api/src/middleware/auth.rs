/// Request authentication
///
/// Pulls the credentials off each request (the `api_key` query parameter,
/// the `Authorization` header and the `sessionid` cookie), resolves them
/// against the database and stores the resulting [`AuthContext`] in the
/// request extensions. Handlers read it with `Extension<AuthContext>`.
///
/// [`AuthContext`]: dayplan_shared::auth::middleware::AuthContext

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, Method, Uri},
    middleware::Next,
    response::Response,
};
use dayplan_shared::auth::{
    api_key::extract_api_key,
    middleware::{resolve, Credentials, PgCredentialStore},
    session::token_from_headers,
};

use crate::{app::AppState, error::ApiError};

/// Authentication middleware layer
///
/// Anonymous `GET` requests pass with an anonymous context; every other
/// method needs a valid credential.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let credentials = credentials_from_parts(req.uri(), req.headers());
    let is_get = matches!(*req.method(), Method::GET | Method::HEAD);

    let store = PgCredentialStore::new(state.db.clone());
    let context = resolve(&store, is_get, &credentials).await.map_err(|e| {
        tracing::debug!(
            method = %req.method(),
            path = %req.uri().path(),
            error = %e,
            "Authentication rejected"
        );
        ApiError::from(e)
    })?;

    tracing::debug!(
        identifier = %context.identifier,
        user_id = ?context.principal.as_ref().map(|p| p.user_id),
        "Request authenticated"
    );

    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}

/// Collects the raw credentials a request carries
pub fn credentials_from_parts(uri: &Uri, headers: &HeaderMap) -> Credentials {
    let query_key = uri.query().and_then(api_key_param);
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());

    Credentials {
        api_key: extract_api_key(query_key.as_deref(), authorization),
        session_token: token_from_headers(headers),
    }
}

fn api_key_param(query: &str) -> Option<String> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .ok()?
        .into_iter()
        .find(|(k, _)| k == "api_key")
        .map(|(_, v)| v)
}
