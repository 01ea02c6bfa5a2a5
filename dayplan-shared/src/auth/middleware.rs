/// Per-request principal resolution
///
/// Every request under `/api/v1` passes through the authenticator before it
/// reaches a handler. The authenticator looks at two credentials:
///
/// - an **API key**, from the `api_key` query parameter or the
///   `Authorization` header
/// - a **session**, from the `sessionid` cookie
///
/// and produces an [`AuthContext`] that the HTTP layer stores in the request
/// extensions.
///
/// # Resolution
///
/// | api key | session | method | result |
/// |---------|---------|--------|--------|
/// | present | active  | any    | session principal |
/// | present | none    | any    | key lookup: unknown → `InvalidApiKey`, inactive → `InactiveAccount` |
/// | absent  | active  | any    | session principal |
/// | absent  | none    | GET    | anonymous |
/// | absent  | none    | other  | `MissingCredentials` |
///
/// Sessions that are expired or belong to an inactive account count as
/// absent.
///
/// # Example
///
/// ```no_run
/// use axum::Extension;
/// use dayplan_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     match auth.principal {
///         Some(p) => format!("profile {}", p.profile_id),
///         None => "anonymous".to_string(),
///     }
/// }
/// ```

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::api_key::{request_identifier, ANONYMOUS_IDENTIFIER};
use super::session::hash_session_token;
use crate::models::api_key::ApiKey;
use crate::models::session::Session;
use crate::models::user::UserAccount;

/// How the principal proved its identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// `sessionid` cookie
    Session,

    /// API key
    ApiKey,
}

/// An authenticated caller
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub user_id: Uuid,

    /// Profile that owns everything this caller creates
    pub profile_id: Uuid,

    pub email: String,

    pub is_superuser: bool,

    pub method: AuthMethod,

    /// Set when `method` is [`AuthMethod::Session`]
    pub session_id: Option<Uuid>,
}

impl Principal {
    fn from_account(account: UserAccount, method: AuthMethod, session_id: Option<Uuid>) -> Self {
        Self {
            user_id: account.user_id,
            profile_id: account.profile_id,
            email: account.email,
            is_superuser: account.is_superuser,
            method,
            session_id,
        }
    }
}

/// Result of authentication, stored in request extensions
#[derive(Debug, Clone, Serialize)]
pub struct AuthContext {
    /// `None` for anonymous read requests
    pub principal: Option<Principal>,

    /// Key for access logs: the API key, the session user's email, or `anonymous`
    pub identifier: String,
}

impl AuthContext {
    /// Context for a request without credentials
    pub fn anonymous() -> Self {
        Self {
            principal: None,
            identifier: ANONYMOUS_IDENTIFIER.to_string(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.principal.is_none()
    }

    /// The principal, or `MissingCredentials` for anonymous requests
    pub fn require_principal(&self) -> Result<&Principal, AuthError> {
        self.principal.as_ref().ok_or(AuthError::MissingCredentials)
    }
}

/// Authentication failures
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No usable credential on a request that needs one
    #[error("Authentication credentials were not provided")]
    MissingCredentials,

    /// API key does not match any account
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Credential belongs to a deactivated account
    #[error("Account is inactive")]
    InactiveAccount,

    /// Credential lookup failed
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Raw credentials pulled off a request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub session_token: Option<String>,
}

/// Account lookups the authenticator needs
///
/// [`PgCredentialStore`] is the production implementation; tests swap in an
/// in-memory one.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Finds the account owning `key`, compared case-insensitively
    async fn account_by_api_key(&self, key: &str) -> Result<Option<UserAccount>, sqlx::Error>;

    /// Finds the active, unexpired session with this token hash and its account
    async fn account_by_session(
        &self,
        token_hash: &str,
    ) -> Result<Option<(Uuid, UserAccount)>, sqlx::Error>;
}

/// Credential store backed by PostgreSQL
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn account_by_api_key(&self, key: &str) -> Result<Option<UserAccount>, sqlx::Error> {
        ApiKey::find_account(&self.pool, key).await
    }

    async fn account_by_session(
        &self,
        token_hash: &str,
    ) -> Result<Option<(Uuid, UserAccount)>, sqlx::Error> {
        Ok(Session::find_active_account(&self.pool, token_hash)
            .await?
            .map(|row| (row.session_id, row.account)))
    }
}

/// Resolves the caller of a request
///
/// `is_get` is true for `GET` requests, the only method anonymous callers
/// may use.
pub async fn resolve<S>(
    store: &S,
    is_get: bool,
    credentials: &Credentials,
) -> Result<AuthContext, AuthError>
where
    S: CredentialStore + ?Sized,
{
    if let Some(token) = credentials.session_token.as_deref() {
        if let Some((session_id, account)) = store
            .account_by_session(&hash_session_token(token))
            .await?
            .filter(|(_, account)| account.is_active)
        {
            let identifier = match credentials.api_key.as_deref() {
                Some(key) => request_identifier(Some(key)),
                None => account.email.clone(),
            };
            return Ok(AuthContext {
                principal: Some(Principal::from_account(
                    account,
                    AuthMethod::Session,
                    Some(session_id),
                )),
                identifier,
            });
        }
    }

    match credentials.api_key.as_deref() {
        Some(key) => {
            let account = store
                .account_by_api_key(key)
                .await?
                .ok_or(AuthError::InvalidApiKey)?;

            if !account.is_active {
                return Err(AuthError::InactiveAccount);
            }

            Ok(AuthContext {
                principal: Some(Principal::from_account(account, AuthMethod::ApiKey, None)),
                identifier: request_identifier(Some(key)),
            })
        }
        None if is_get => Ok(AuthContext::anonymous()),
        None => Err(AuthError::MissingCredentials),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore {
        keys: HashMap<String, UserAccount>,
        sessions: HashMap<String, (Uuid, UserAccount)>,
    }

    impl MemoryStore {
        fn with_key(mut self, key: &str, account: UserAccount) -> Self {
            self.keys.insert(key.to_lowercase(), account);
            self
        }

        fn with_session(mut self, token: &str, account: UserAccount) -> Self {
            self.sessions
                .insert(hash_session_token(token), (Uuid::new_v4(), account));
            self
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryStore {
        async fn account_by_api_key(&self, key: &str) -> Result<Option<UserAccount>, sqlx::Error> {
            Ok(self.keys.get(&key.to_lowercase()).cloned())
        }

        async fn account_by_session(
            &self,
            token_hash: &str,
        ) -> Result<Option<(Uuid, UserAccount)>, sqlx::Error> {
            Ok(self.sessions.get(token_hash).cloned())
        }
    }

    fn account(email: &str, is_active: bool) -> UserAccount {
        UserAccount {
            user_id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
            email: email.to_string(),
            is_active,
            is_superuser: false,
        }
    }

    fn creds(api_key: Option<&str>, session: Option<&str>) -> Credentials {
        Credentials {
            api_key: api_key.map(String::from),
            session_token: session.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_anonymous_get_is_allowed() {
        let store = MemoryStore::default();

        let ctx = resolve(&store, true, &creds(None, None)).await.unwrap();

        assert!(ctx.is_anonymous());
        assert_eq!(ctx.identifier, "anonymous");
        assert!(matches!(
            ctx.require_principal(),
            Err(AuthError::MissingCredentials)
        ));
    }

    #[tokio::test]
    async fn test_anonymous_write_is_rejected() {
        let store = MemoryStore::default();

        let result = resolve(&store, false, &creds(None, None)).await;

        assert!(matches!(result, Err(AuthError::MissingCredentials)));
    }

    #[tokio::test]
    async fn test_api_key_lookup_is_case_insensitive() {
        let alice = account("alice@example.com", true);
        let store = MemoryStore::default().with_key("abcdef", alice.clone());

        let ctx = resolve(&store, false, &creds(Some("ABCDEF"), None))
            .await
            .unwrap();

        let principal = ctx.principal.unwrap();
        assert_eq!(principal.user_id, alice.user_id);
        assert_eq!(principal.profile_id, alice.profile_id);
        assert_eq!(principal.method, AuthMethod::ApiKey);
        assert_eq!(ctx.identifier, "ABCDEF");
    }

    #[tokio::test]
    async fn test_unknown_api_key_is_rejected_even_for_get() {
        let store = MemoryStore::default();

        let result = resolve(&store, true, &creds(Some("nope"), None)).await;

        assert!(matches!(result, Err(AuthError::InvalidApiKey)));
    }

    #[tokio::test]
    async fn test_inactive_api_key_account_is_forbidden() {
        let store = MemoryStore::default().with_key("k", account("bob@example.com", false));

        let result = resolve(&store, true, &creds(Some("k"), None)).await;

        assert!(matches!(result, Err(AuthError::InactiveAccount)));
    }

    #[tokio::test]
    async fn test_session_wins_over_api_key() {
        let alice = account("alice@example.com", true);
        let bob = account("bob@example.com", true);
        let store = MemoryStore::default()
            .with_key("bobkey", bob)
            .with_session("tok", alice.clone());

        let ctx = resolve(&store, false, &creds(Some("bobkey"), Some("tok")))
            .await
            .unwrap();

        let principal = ctx.principal.unwrap();
        assert_eq!(principal.user_id, alice.user_id);
        assert_eq!(principal.method, AuthMethod::Session);
        assert!(principal.session_id.is_some());
    }

    #[tokio::test]
    async fn test_session_only_uses_email_identifier() {
        let alice = account("alice@example.com", true);
        let store = MemoryStore::default().with_session("tok", alice);

        let ctx = resolve(&store, false, &creds(None, Some("tok"))).await.unwrap();

        assert_eq!(ctx.identifier, "alice@example.com");
    }

    #[tokio::test]
    async fn test_unknown_session_falls_through() {
        let alice = account("alice@example.com", true);
        let store = MemoryStore::default().with_key("k", alice.clone());

        let ctx = resolve(&store, true, &creds(None, Some("stale"))).await.unwrap();
        assert!(ctx.is_anonymous());

        let ctx = resolve(&store, false, &creds(Some("k"), Some("stale")))
            .await
            .unwrap();
        assert_eq!(ctx.principal.unwrap().user_id, alice.user_id);

        let result = resolve(&store, false, &creds(None, Some("stale"))).await;
        assert!(matches!(result, Err(AuthError::MissingCredentials)));
    }

    #[tokio::test]
    async fn test_inactive_session_counts_as_absent() {
        let store = MemoryStore::default().with_session("tok", account("x@example.com", false));

        let ctx = resolve(&store, true, &creds(None, Some("tok"))).await.unwrap();

        assert!(ctx.is_anonymous());
    }
}
