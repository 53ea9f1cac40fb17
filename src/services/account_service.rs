use crate::auth::session;
use crate::clock::Clock;
use crate::models::account::{Account, NewAccount};
use crate::models::sign_up::SignUpForm;
use crate::repositories::account_repository::{AccountRepository, RepositoryError};
use crate::services::email_service::{EmailError, EmailService};
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHasher,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_sessions::Session;

#[derive(Debug, thiserror::Error)]
pub enum AccountServiceError {
    #[error("Username or email already registered")]
    AlreadyRegistered,
    #[error("Account not found")]
    AccountNotFound,
    #[error("Password hashing failed: {0}")]
    HashingError(String),
    #[error("Email error: {0}")]
    EmailError(#[from] EmailError),
    #[error("Session error: {0}")]
    SessionError(#[from] tower_sessions::session::Error),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

pub struct AccountService {
    repository: Arc<dyn AccountRepository>,
    email_service: Arc<dyn EmailService>,
    clock: Arc<dyn Clock>,
}

impl AccountService {
    pub fn new(
        repository: Arc<dyn AccountRepository>,
        email_service: Arc<dyn EmailService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            email_service,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Persists a new unverified account with its first verification token
    /// and mails the token out.
    ///
    /// A mail failure is logged and does not undo the account; the user can
    /// ask for another email from the verify prompt.
    pub async fn process_new_account(
        &self,
        form: &SignUpForm,
    ) -> Result<Account, AccountServiceError> {
        let password_hash = hash_password(&form.password)?;
        let new_account =
            NewAccount::new(&form.username, &form.email, password_hash, self.clock.now());

        let account = match self.repository.create_account(&new_account).await {
            Ok(account) => account,
            Err(RepositoryError::AlreadyExists) => {
                return Err(AccountServiceError::AlreadyRegistered)
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(account_id = account.id, username = %account.username, "account created");

        if let Some(token) = account.email_verification_token.as_deref() {
            if let Err(e) = self
                .email_service
                .send_verification_email(&account.email, &account.username, token)
                .await
            {
                tracing::error!(
                    account_id = account.id,
                    "failed to send verification email after sign-up: {}",
                    e
                );
            }
        }

        Ok(account)
    }

    /// Issues a new token, mails it, then stores it. Nothing is stored when
    /// the mail cannot be sent, so a failed attempt does not start a cooldown.
    pub async fn send_sign_up_confirm_email(
        &self,
        account: &Account,
    ) -> Result<Account, AccountServiceError> {
        let generated_at = self.clock.now();
        let mut updated = account.clone();
        updated.generate_email_verification_token(generated_at);
        let token = updated
            .email_verification_token
            .clone()
            .unwrap_or_default();

        self.email_service
            .send_verification_email(&updated.email, &updated.username, &token)
            .await?;

        match self
            .repository
            .update_verification_token(updated.id, &token, generated_at)
            .await
        {
            Ok(()) => {}
            Err(RepositoryError::NotFound) => return Err(AccountServiceError::AccountNotFound),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(account_id = updated.id, "verification email re-sent");
        Ok(updated)
    }

    /// Marks the account verified. Returns whether this call did the
    /// transition; a second verification is a no-op.
    pub async fn complete_sign_up(&self, account: &mut Account) -> Result<bool, AccountServiceError> {
        let now = self.clock.now();
        if !account.complete_sign_up(now) {
            return Ok(false);
        }

        let changed = match self.repository.mark_verified(account.id, now).await {
            Ok(changed) => changed,
            Err(RepositoryError::NotFound) => return Err(AccountServiceError::AccountNotFound),
            Err(e) => return Err(e.into()),
        };

        if !changed {
            // A concurrent request verified first; keep its join time.
            if let Some(stored) = self.repository.find_by_id(account.id).await? {
                account.joined_at = stored.joined_at;
            }
        } else {
            tracing::info!(account_id = account.id, "email verified");
        }

        Ok(changed)
    }

    pub async fn login(&self, session: &Session, account: &Account) -> Result<(), AccountServiceError> {
        session::log_in(session, account, self.clock.now()).await?;
        Ok(())
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AccountServiceError> {
        Ok(self.repository.find_by_email(email).await?)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Account>, AccountServiceError> {
        Ok(self.repository.find_by_id(id).await?)
    }

    pub async fn count_accounts(&self) -> Result<i64, AccountServiceError> {
        Ok(self.repository.count().await?)
    }

    pub async fn list_accounts(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Account>, AccountServiceError> {
        Ok(self.repository.list_accounts(limit, offset).await?)
    }
}

pub fn hash_password(password: &str) -> Result<String, AccountServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AccountServiceError::HashingError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::account::sample_account;
    use crate::repositories::account_repository::MockAccountRepository;
    use crate::services::email_service::MockEmailService;
    use chrono::{Duration, TimeZone};
    use mockall::predicate::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap()
    }

    fn sign_up_form() -> SignUpForm {
        SignUpForm {
            username: "studier".to_string(),
            email: "a@x.com".to_string(),
            password: "password123".to_string(),
            csrf_token: String::new(),
        }
    }

    fn service(
        repo: MockAccountRepository,
        email: MockEmailService,
        clock: Arc<ManualClock>,
    ) -> AccountService {
        AccountService::new(Arc::new(repo), Arc::new(email), clock)
    }

    #[tokio::test]
    async fn test_process_new_account_hashes_and_sends() {
        let mut mock_repo = MockAccountRepository::new();
        mock_repo
            .expect_create_account()
            .withf(|new_account| {
                new_account.username == "studier"
                    && new_account.email == "a@x.com"
                    && new_account.password_hash.starts_with("$argon2")
                    && new_account.email_check_token_generated_at == t0()
            })
            .times(1)
            .returning(|new_account| {
                let mut account = sample_account();
                account.email_verification_token =
                    Some(new_account.email_verification_token.clone());
                account.email_check_token_generated_at =
                    Some(new_account.email_check_token_generated_at);
                Box::pin(async move { Ok(account) })
            });

        let mut mock_email = MockEmailService::new();
        mock_email
            .expect_send_verification_email()
            .with(eq("a@x.com"), eq("studier"), always())
            .times(1)
            .returning(|_, _, _| Box::pin(async move { Ok(()) }));

        let service = service(mock_repo, mock_email, Arc::new(ManualClock::new(t0())));
        let account = service
            .process_new_account(&sign_up_form())
            .await
            .expect("account should be created");

        assert!(!account.email_verified);
        assert!(account.email_verification_token.is_some());
    }

    #[tokio::test]
    async fn test_process_new_account_survives_email_failure() {
        let mut mock_repo = MockAccountRepository::new();
        mock_repo
            .expect_create_account()
            .times(1)
            .returning(|new_account| {
                let mut account = sample_account();
                account.email_verification_token =
                    Some(new_account.email_verification_token.clone());
                Box::pin(async move { Ok(account) })
            });

        let mut mock_email = MockEmailService::new();
        mock_email
            .expect_send_verification_email()
            .times(1)
            .returning(|_, _, _| {
                Box::pin(async move { Err(EmailError::SendFailed("smtp down".to_string())) })
            });

        let service = service(mock_repo, mock_email, Arc::new(ManualClock::new(t0())));
        assert!(service.process_new_account(&sign_up_form()).await.is_ok());
    }

    #[tokio::test]
    async fn test_process_new_account_duplicate() {
        let mut mock_repo = MockAccountRepository::new();
        mock_repo
            .expect_create_account()
            .times(1)
            .returning(|_| Box::pin(async move { Err(RepositoryError::AlreadyExists) }));

        let service = service(
            mock_repo,
            MockEmailService::new(),
            Arc::new(ManualClock::new(t0())),
        );
        let result = service.process_new_account(&sign_up_form()).await;
        assert!(matches!(result, Err(AccountServiceError::AlreadyRegistered)));
    }

    #[tokio::test]
    async fn test_resend_stores_new_token_after_sending() {
        let clock = Arc::new(ManualClock::new(t0() + Duration::minutes(61)));

        let mut mock_email = MockEmailService::new();
        mock_email
            .expect_send_verification_email()
            .times(1)
            .returning(|_, _, _| Box::pin(async move { Ok(()) }));

        let mut mock_repo = MockAccountRepository::new();
        mock_repo
            .expect_update_verification_token()
            .withf(|id, token, generated_at| {
                *id == 1 && token != "abc" && *generated_at == t0() + Duration::minutes(61)
            })
            .times(1)
            .returning(|_, _, _| Box::pin(async move { Ok(()) }));

        let mut account = sample_account();
        account.email_verification_token = Some("abc".to_string());
        account.email_check_token_generated_at = Some(t0());

        let service = service(mock_repo, mock_email, clock);
        let updated = service
            .send_sign_up_confirm_email(&account)
            .await
            .expect("resend should succeed");

        assert_ne!(updated.email_verification_token.as_deref(), Some("abc"));
        assert_eq!(
            updated.email_check_token_generated_at,
            Some(t0() + Duration::minutes(61))
        );
    }

    #[tokio::test]
    async fn test_resend_failure_keeps_old_token() {
        let mut mock_email = MockEmailService::new();
        mock_email
            .expect_send_verification_email()
            .times(1)
            .returning(|_, _, _| {
                Box::pin(async move { Err(EmailError::SendFailed("smtp down".to_string())) })
            });

        let mut mock_repo = MockAccountRepository::new();
        mock_repo.expect_update_verification_token().times(0);

        let service = service(mock_repo, mock_email, Arc::new(ManualClock::new(t0())));
        let result = service.send_sign_up_confirm_email(&sample_account()).await;
        assert!(matches!(result, Err(AccountServiceError::EmailError(_))));
    }

    #[tokio::test]
    async fn test_complete_sign_up_marks_once() {
        let mut mock_repo = MockAccountRepository::new();
        mock_repo
            .expect_mark_verified()
            .with(eq(1), eq(t0()))
            .times(1)
            .returning(|_, _| Box::pin(async move { Ok(true) }));

        let service = service(
            mock_repo,
            MockEmailService::new(),
            Arc::new(ManualClock::new(t0())),
        );

        let mut account = sample_account();
        assert!(service.complete_sign_up(&mut account).await.unwrap());
        assert!(account.email_verified);
        assert_eq!(account.joined_at, Some(t0()));

        assert!(!service.complete_sign_up(&mut account).await.unwrap());
        assert_eq!(account.joined_at, Some(t0()));
    }

    #[tokio::test]
    async fn test_complete_sign_up_lost_race_takes_stored_join_time() {
        let earlier = t0() - Duration::seconds(1);

        let mut mock_repo = MockAccountRepository::new();
        mock_repo
            .expect_mark_verified()
            .times(1)
            .returning(|_, _| Box::pin(async move { Ok(false) }));
        mock_repo
            .expect_find_by_id()
            .with(eq(1))
            .times(1)
            .returning(move |_| {
                let mut stored = sample_account();
                stored.email_verified = true;
                stored.joined_at = Some(earlier);
                Box::pin(async move { Ok(Some(stored)) })
            });

        let service = service(
            mock_repo,
            MockEmailService::new(),
            Arc::new(ManualClock::new(t0())),
        );

        let mut account = sample_account();
        assert!(!service.complete_sign_up(&mut account).await.unwrap());
        assert!(account.email_verified);
        assert_eq!(account.joined_at, Some(earlier));
    }

    #[test]
    fn test_hash_password_is_salted() {
        let first = hash_password("password123").unwrap();
        let second = hash_password("password123").unwrap();
        assert!(first.starts_with("$argon2"));
        assert_ne!(first, second);
    }
}
