use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, warn};
use uuid::Uuid;

pub const CSRF_TOKEN_KEY: &str = "csrf_token";

/// Forms older than this are refused.
const CSRF_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfToken {
    pub value: String,
    pub created_at: i64,
}

impl CsrfToken {
    pub fn new() -> Self {
        Self {
            value: Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp() - self.created_at > CSRF_TOKEN_TTL_SECONDS
    }
}

impl Default for CsrfToken {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CsrfError {
    #[error("no token in session")]
    Missing,
    #[error("token expired")]
    Expired,
    #[error("token mismatch")]
    Mismatch,
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

pub async fn generate_csrf_token(
    session: &Session,
) -> Result<String, tower_sessions::session::Error> {
    let token = CsrfToken::new();
    let value = token.value.clone();
    session.insert(CSRF_TOKEN_KEY, token).await?;
    Ok(value)
}

/// Token to embed in the next rendered form.
pub async fn get_or_create_csrf_token(
    session: &Session,
) -> Result<String, tower_sessions::session::Error> {
    match session.get::<CsrfToken>(CSRF_TOKEN_KEY).await? {
        Some(existing) if !existing.is_expired() => Ok(existing.value),
        _ => generate_csrf_token(session).await,
    }
}

/// Checks the token posted with a form. A valid token is replaced so it
/// cannot be replayed.
pub async fn validate_csrf_form_field(session: &Session, form_token: &str) -> Result<(), CsrfError> {
    let stored = session
        .get::<CsrfToken>(CSRF_TOKEN_KEY)
        .await?
        .ok_or(CsrfError::Missing)?;

    if stored.is_expired() {
        warn!("CSRF token expired during form validation");
        return Err(CsrfError::Expired);
    }

    if form_token != stored.value {
        warn!("CSRF form token mismatch");
        return Err(CsrfError::Mismatch);
    }

    debug!("CSRF form token validated");
    generate_csrf_token(session).await?;
    Ok(())
}

/// Token for a template; a session failure degrades to a token that will
/// simply fail validation on submit.
pub async fn csrf_token_for_form(session: &Session) -> String {
    get_or_create_csrf_token(session)
        .await
        .unwrap_or_else(|e| {
            warn!("Failed to create CSRF token: {}", e);
            String::new()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tower_sessions::MemoryStore;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_get_or_create_reuses_token() {
        let session = session();
        let first = get_or_create_csrf_token(&session).await.unwrap();
        let second = get_or_create_csrf_token(&session).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_valid_token_is_rotated() {
        let session = session();
        let token = get_or_create_csrf_token(&session).await.unwrap();

        validate_csrf_form_field(&session, &token).await.unwrap();

        let next = get_or_create_csrf_token(&session).await.unwrap();
        assert_ne!(token, next);
        assert!(matches!(
            validate_csrf_form_field(&session, &token).await,
            Err(CsrfError::Mismatch)
        ));
    }

    #[tokio::test]
    async fn test_missing_and_expired_tokens() {
        let session = session();
        assert!(matches!(
            validate_csrf_form_field(&session, "anything").await,
            Err(CsrfError::Missing)
        ));

        let stale = CsrfToken {
            value: "stale".to_string(),
            created_at: chrono::Utc::now().timestamp() - CSRF_TOKEN_TTL_SECONDS - 1,
        };
        session.insert(CSRF_TOKEN_KEY, stale).await.unwrap();
        assert!(matches!(
            validate_csrf_form_field(&session, "stale").await,
            Err(CsrfError::Expired)
        ));
    }
}
