pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use clock::Clock;
use repositories::{AccountRepository, SqliteAccountRepository};
use services::{AccountService, AuthService, EmailService, SignUpFormValidator};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub account_service: Arc<AccountService>,
    pub auth_service: Arc<AuthService>,
    pub sign_up_validator: Arc<SignUpFormValidator>,
    pub pool: sqlx::SqlitePool,
}

impl AppState {
    /// Wires the SQLite repository into every service that needs it.
    pub fn new(
        pool: sqlx::SqlitePool,
        email_service: Arc<dyn EmailService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let account_repository: Arc<dyn AccountRepository> =
            Arc::new(SqliteAccountRepository::new(pool.clone()));

        Self {
            account_service: Arc::new(AccountService::new(
                account_repository.clone(),
                email_service,
                clock,
            )),
            auth_service: Arc::new(AuthService::new(account_repository.clone())),
            sign_up_validator: Arc::new(SignUpFormValidator::new(account_repository)),
            pool,
        }
    }
}
