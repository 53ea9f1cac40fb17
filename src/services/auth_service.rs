use crate::models::account::Account;
use crate::repositories::account_repository::AccountRepository;
use argon2::{password_hash::PasswordHash, Argon2, PasswordVerifier};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Account not found")]
    AccountNotFound,
    #[error("Repository error: {0}")]
    RepositoryError(#[from] crate::repositories::account_repository::RepositoryError),
}

pub struct LoginRequest {
    /// Either the username or the email address.
    pub login: String,
    pub password: String,
}

pub struct AuthService {
    account_repository: Arc<dyn AccountRepository>,
}

impl AuthService {
    pub fn new(account_repository: Arc<dyn AccountRepository>) -> Self {
        Self { account_repository }
    }

    pub async fn authenticate(&self, request: LoginRequest) -> Result<Account, AuthServiceError> {
        let login = request.login.trim();

        let account = if login.contains('@') {
            self.account_repository.find_by_email(login).await?
        } else {
            self.account_repository.find_by_username(login).await?
        }
        .ok_or(AuthServiceError::InvalidCredentials)?;

        if !verify_password(&request.password, &account.password) {
            return Err(AuthServiceError::InvalidCredentials);
        }

        Ok(account)
    }

    pub async fn get_account_by_id(&self, account_id: i64) -> Result<Account, AuthServiceError> {
        self.account_repository
            .find_by_id(account_id)
            .await?
            .ok_or(AuthServiceError::AccountNotFound)
    }
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    if let Ok(parsed_hash) = PasswordHash::new(password_hash) {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    } else {
        false
    }
}
