use crate::models::account::{Account, NewAccount};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Account not found")]
    NotFound,
    #[error("Account already exists")]
    AlreadyExists,
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait AccountRepository: Send + Sync {
    async fn create_account(&self, new_account: &NewAccount) -> RepositoryResult<Account>;
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Account>>;
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<Account>>;
    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<Account>>;
    async fn exists_by_email(&self, email: &str) -> RepositoryResult<bool>;
    async fn exists_by_username(&self, username: &str) -> RepositoryResult<bool>;
    async fn count(&self) -> RepositoryResult<i64>;
    async fn update_verification_token(
        &self,
        id: i64,
        token: &str,
        generated_at: DateTime<Utc>,
    ) -> RepositoryResult<()>;
    /// Flips `email_verified` and stamps `joined_at` unless the account is
    /// already verified. Returns whether a row changed.
    async fn mark_verified(&self, id: i64, joined_at: DateTime<Utc>) -> RepositoryResult<bool>;
    async fn list_accounts(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> RepositoryResult<Vec<Account>>;
}

const ACCOUNT_COLUMNS: &str = r#"
    id,
    username,
    email,
    password,
    profile_image,
    email_verified,
    email_verification_token,
    email_check_token_generated_at,
    joined_at,
    bio,
    url,
    occupation,
    location,
    study_created_by_email,
    study_created_by_web,
    study_enrollment_result_by_email,
    study_enrollment_result_by_web,
    study_updated_by_email,
    study_updated_by_web
"#;

pub struct SqliteAccountRepository {
    pool: SqlitePool,
}

impl SqliteAccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, filter: &str, value: &str) -> RepositoryResult<Option<Account>> {
        let sql = format!("SELECT {} FROM accounts WHERE {} = ?", ACCOUNT_COLUMNS, filter);
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn create_account(&self, new_account: &NewAccount) -> RepositoryResult<Account> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (
                username, email, password,
                email_verification_token, email_check_token_generated_at
            )
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new_account.username)
        .bind(&new_account.email)
        .bind(&new_account.password_hash)
        .bind(&new_account.email_verification_token)
        .bind(new_account.email_check_token_generated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(res) => {
                let id = res.last_insert_rowid();
                self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
            }
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::AlreadyExists),
            Err(e) => Err(RepositoryError::Database(e)),
        }
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Account>> {
        let sql = format!("SELECT {} FROM accounts WHERE id = ?", ACCOUNT_COLUMNS);
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<Account>> {
        self.find_one("email", email).await
    }

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<Account>> {
        self.find_one("username", username).await
    }

    async fn exists_by_email(&self, email: &str) -> RepositoryResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE email = ?)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn exists_by_username(&self, username: &str) -> RepositoryResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE username = ?)")
                .bind(username)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn count(&self) -> RepositoryResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn update_verification_token(
        &self,
        id: i64,
        token: &str,
        generated_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET email_verification_token = ?, email_check_token_generated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(token)
        .bind(generated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn mark_verified(&self, id: i64, joined_at: DateTime<Utc>) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET email_verified = 1, joined_at = ?
            WHERE id = ? AND email_verified = 0
            "#,
        )
        .bind(joined_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Either already verified or gone; only the latter is an error.
            if self.find_by_id(id).await?.is_none() {
                return Err(RepositoryError::NotFound);
            }
            return Ok(false);
        }

        Ok(true)
    }

    async fn list_accounts(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> RepositoryResult<Vec<Account>> {
        let limit = limit.unwrap_or(100);
        let offset = offset.unwrap_or(0);

        let sql = format!(
            "SELECT {} FROM accounts ORDER BY id ASC LIMIT ? OFFSET ?",
            ACCOUNT_COLUMNS
        );
        let accounts = sqlx::query_as::<_, Account>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(accounts)
    }
}
