pub mod test_helpers {
    use crate::{
        clock::Clock,
        config::session::SessionConfig,
        routes,
        services::{account_service::hash_password, EmailError, EmailService},
        AppState,
    };
    use async_trait::async_trait;
    use axum::Router;
    use chrono::{DateTime, Utc};
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
    use std::sync::{Arc, Mutex};
    use tempfile::NamedTempFile;
    use tower_sessions::MemoryStore;

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_db() -> Result<SqlitePool, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    /// Create a temporary file-based SQLite database for testing
    /// Useful when several connections must see the same data
    pub async fn create_test_db_file() -> Result<(SqlitePool, NamedTempFile), sqlx::Error> {
        let temp_file = NamedTempFile::new().map_err(sqlx::Error::Io)?;
        let db_path = temp_file
            .path()
            .to_str()
            .ok_or_else(|| sqlx::Error::Configuration("Invalid database path".into()))?;
        let database_url = format!("sqlite://{}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok((pool, temp_file))
    }

    /// Insert an account with a hashed password and no verification token
    pub async fn insert_test_account(
        pool: &SqlitePool,
        username: &str,
        email: &str,
        password: &str,
        verified: bool,
    ) -> Result<i64, sqlx::Error> {
        let password_hash = hash_password(password).map_err(|e| {
            sqlx::Error::Configuration(format!("Password hashing failed: {}", e).into())
        })?;

        let result = sqlx::query(
            "INSERT INTO accounts (username, email, password, email_verified) VALUES (?, ?, ?, ?)",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(verified)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Store a known verification token issued at `issued_at`
    pub async fn set_verification_token(
        pool: &SqlitePool,
        account_id: i64,
        token: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE accounts SET email_verification_token = ?, email_check_token_generated_at = ? WHERE id = ?",
        )
        .bind(token)
        .bind(issued_at)
        .bind(account_id)
        .execute(pool)
        .await?;

        Ok(())
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentEmail {
        pub to: String,
        pub username: String,
        pub token: String,
    }

    /// Email service that keeps every message in memory
    #[derive(Default)]
    pub struct RecordingEmailService {
        sent: Mutex<Vec<SentEmail>>,
        fail: bool,
    }

    impl RecordingEmailService {
        pub fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub fn sent(&self) -> Vec<SentEmail> {
            self.sent
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone()
        }
    }

    #[async_trait]
    impl EmailService for RecordingEmailService {
        async fn send_verification_email(
            &self,
            to_email: &str,
            username: &str,
            token: &str,
        ) -> Result<(), EmailError> {
            if self.fail {
                return Err(EmailError::SendFailed("smtp unavailable".to_string()));
            }
            self.sent
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(SentEmail {
                    to: to_email.to_string(),
                    username: username.to_string(),
                    token: token.to_string(),
                });
            Ok(())
        }
    }

    /// Full application router over an in-memory session store
    pub fn create_test_app(
        pool: SqlitePool,
        email_service: Arc<dyn EmailService>,
        clock: Arc<dyn Clock>,
    ) -> Router {
        let state = AppState::new(pool, email_service, clock);
        let session_layer = SessionConfig::from_env().create_layer(MemoryStore::default());
        routes::build_router(state, session_layer)
    }
}

// Note: This is test-only code. Panic on error is acceptable in tests.
#[cfg(test)]
pub async fn create_test_pool() -> sqlx::SqlitePool {
    match test_helpers::create_test_db().await {
        Ok(pool) => pool,
        Err(e) => panic!("Failed to create test pool: {}", e),
    }
}
