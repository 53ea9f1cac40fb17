use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use studylink::{
    clock::ManualClock,
    models::SignUpForm,
    repositories::SqliteAccountRepository,
    services::{AccountService, AccountServiceError, SignUpFormValidator},
    test_utils::test_helpers::{self, RecordingEmailService},
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap()
}

fn form(username: &str, email: &str) -> SignUpForm {
    SignUpForm {
        username: username.to_string(),
        email: email.to_string(),
        password: "password123".to_string(),
        csrf_token: String::new(),
    }
}

struct Fixture {
    service: AccountService,
    validator: SignUpFormValidator,
    clock: Arc<ManualClock>,
    emails: Arc<RecordingEmailService>,
}

async fn setup() -> Fixture {
    let pool = test_helpers::create_test_db().await.unwrap();
    let repository = Arc::new(SqliteAccountRepository::new(pool));
    let clock = Arc::new(ManualClock::new(t0()));
    let emails = Arc::new(RecordingEmailService::default());

    Fixture {
        service: AccountService::new(repository.clone(), emails.clone(), clock.clone()),
        validator: SignUpFormValidator::new(repository),
        clock,
        emails,
    }
}

#[tokio::test]
async fn test_process_new_account_issues_token_and_sends_it() {
    let fixture = setup().await;

    let account = fixture
        .service
        .process_new_account(&form("studier", "a@x.com"))
        .await
        .unwrap();

    assert!(!account.email_verified);
    assert_eq!(account.email_check_token_generated_at, Some(t0()));
    let sent = fixture.emails.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(account.email_verification_token, Some(sent[0].token.clone()));
    assert_eq!(fixture.service.count_accounts().await.unwrap(), 1);
}

#[tokio::test]
async fn test_validator_sees_accounts_created_by_the_service() {
    let fixture = setup().await;
    fixture
        .service
        .process_new_account(&form("studier", "a@x.com"))
        .await
        .unwrap();

    let errors = fixture
        .validator
        .validate(&form("studier", "a@x.com"))
        .await
        .unwrap();
    assert_eq!(errors.message_for("email"), Some("This email is already in use."));
    assert_eq!(
        errors.message_for("username"),
        Some("This username is already in use.")
    );

    let errors = fixture
        .validator
        .validate(&form("other", "b@x.com"))
        .await
        .unwrap();
    assert!(!errors.has_errors());
}

#[tokio::test]
async fn test_concurrent_duplicate_is_already_registered() {
    let fixture = setup().await;
    fixture
        .service
        .process_new_account(&form("studier", "a@x.com"))
        .await
        .unwrap();

    // Skipping the validator, the unique index still refuses the row
    let result = fixture
        .service
        .process_new_account(&form("studier", "b@x.com"))
        .await;

    assert!(matches!(result, Err(AccountServiceError::AlreadyRegistered)));
    assert_eq!(fixture.emails.sent().len(), 1);
}

#[tokio::test]
async fn test_resend_replaces_token_and_timestamp() {
    let fixture = setup().await;
    let account = fixture
        .service
        .process_new_account(&form("studier", "a@x.com"))
        .await
        .unwrap();

    fixture.clock.advance(Duration::minutes(61));
    let updated = fixture
        .service
        .send_sign_up_confirm_email(&account)
        .await
        .unwrap();

    assert_ne!(updated.email_verification_token, account.email_verification_token);
    assert_eq!(
        updated.email_check_token_generated_at,
        Some(t0() + Duration::minutes(61))
    );

    let stored = fixture
        .service
        .find_by_email("a@x.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.email_verification_token, updated.email_verification_token);
    assert_eq!(
        stored.email_check_token_generated_at,
        updated.email_check_token_generated_at
    );
    assert_eq!(fixture.emails.sent().len(), 2);
}

#[tokio::test]
async fn test_complete_sign_up_is_idempotent() {
    let fixture = setup().await;
    let mut account = fixture
        .service
        .process_new_account(&form("studier", "a@x.com"))
        .await
        .unwrap();
    fixture.clock.advance(Duration::minutes(10));

    assert!(fixture.service.complete_sign_up(&mut account).await.unwrap());
    assert!(account.email_verified);
    assert_eq!(account.joined_at, Some(t0() + Duration::minutes(10)));

    // A stale copy loses the race and picks up the stored join time
    let mut stale = fixture
        .service
        .list_accounts(None, None)
        .await
        .unwrap()
        .remove(0);
    stale.email_verified = false;
    stale.joined_at = None;
    fixture.clock.advance(Duration::days(1));

    assert!(!fixture.service.complete_sign_up(&mut stale).await.unwrap());
    assert_eq!(stale.joined_at, Some(t0() + Duration::minutes(10)));
}

#[tokio::test]
async fn test_concurrent_verifications_stamp_join_time_once() {
    let (pool, _db_file) = test_helpers::create_test_db_file().await.unwrap();
    let repository = Arc::new(SqliteAccountRepository::new(pool));
    let clock = Arc::new(ManualClock::new(t0()));
    let service = Arc::new(AccountService::new(
        repository,
        Arc::new(RecordingEmailService::default()),
        clock,
    ));
    let account = service
        .process_new_account(&form("studier", "a@x.com"))
        .await
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let service = service.clone();
            let mut copy = account.clone();
            tokio::spawn(async move { service.complete_sign_up(&mut copy).await.unwrap() })
        })
        .collect();

    let mut transitions = 0;
    for handle in handles {
        if handle.await.unwrap() {
            transitions += 1;
        }
    }

    assert_eq!(transitions, 1);
    let stored = service.find_by_email("a@x.com").await.unwrap().unwrap();
    assert!(stored.email_verified);
    assert_eq!(stored.joined_at, Some(t0()));
}
