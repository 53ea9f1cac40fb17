use crate::models::account::Account;
use tower_sessions::Session;

pub const ACCOUNT_ID_KEY: &str = "account_id";
pub const USERNAME_KEY: &str = "username";
pub const AUTH_TIMESTAMP_KEY: &str = "auth_timestamp";

/// Binds `account` to the session. The session id is cycled first so a
/// pre-login id cannot be reused after authentication.
pub async fn log_in(
    session: &Session,
    account: &Account,
    at: chrono::DateTime<chrono::Utc>,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(ACCOUNT_ID_KEY, account.id).await?;
    session.insert(USERNAME_KEY, account.username.as_str()).await?;
    session.insert(AUTH_TIMESTAMP_KEY, at.timestamp()).await?;
    tracing::debug!(account_id = account.id, "session bound to account");
    Ok(())
}

pub async fn logged_in_account_id(
    session: &Session,
) -> Result<Option<i64>, tower_sessions::session::Error> {
    session.get::<i64>(ACCOUNT_ID_KEY).await
}

pub async fn log_out(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
