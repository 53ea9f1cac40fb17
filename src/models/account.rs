use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Minimum spacing between two verification emails for the same account.
pub const CONFIRM_EMAIL_COOLDOWN_MINUTES: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub profile_image: Option<String>,
    pub email_verified: bool,
    #[serde(skip_serializing)]
    pub email_verification_token: Option<String>,
    pub email_check_token_generated_at: Option<DateTime<Utc>>,
    pub joined_at: Option<DateTime<Utc>>,
    pub bio: Option<String>,
    pub url: Option<String>,
    pub occupation: Option<String>,
    pub location: Option<String>,
    pub study_created_by_email: bool,
    pub study_created_by_web: bool,
    pub study_enrollment_result_by_email: bool,
    pub study_enrollment_result_by_web: bool,
    pub study_updated_by_email: bool,
    pub study_updated_by_web: bool,
}

impl Account {
    /// Issues a fresh token and records `now` as its issuance time.
    pub fn generate_email_verification_token(&mut self, now: DateTime<Utc>) {
        self.email_verification_token = Some(new_verification_token());
        self.email_check_token_generated_at = Some(now);
    }

    /// Marks the account verified and stamps the join time.
    ///
    /// Returns `false` and leaves the account untouched when it was already
    /// verified, so `joined_at` keeps the time of the first verification.
    pub fn complete_sign_up(&mut self, now: DateTime<Utc>) -> bool {
        if self.email_verified {
            return false;
        }
        self.email_verified = true;
        self.joined_at = Some(now);
        true
    }

    /// Exact comparison against the stored token. An account that never had
    /// a token issued accepts nothing.
    pub fn is_valid_token(&self, token: &str) -> bool {
        match self.email_verification_token.as_deref() {
            Some(stored) if !stored.is_empty() => stored == token,
            _ => false,
        }
    }

    pub fn can_send_confirm_email(&self, now: DateTime<Utc>) -> bool {
        match self.email_check_token_generated_at {
            Some(issued_at) => now >= issued_at + Duration::minutes(CONFIRM_EMAIL_COOLDOWN_MINUTES),
            None => true,
        }
    }
}

/// Data needed to insert an account. The token is issued before the insert
/// so the row never exists without one.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub email_verification_token: String,
    pub email_check_token_generated_at: DateTime<Utc>,
}

impl NewAccount {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            email_verification_token: new_verification_token(),
            email_check_token_generated_at: now,
        }
    }
}

fn new_verification_token() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
pub(crate) fn sample_account() -> Account {
    Account {
        id: 1,
        username: "studier".to_string(),
        email: "a@x.com".to_string(),
        password: "hash".to_string(),
        profile_image: None,
        email_verified: false,
        email_verification_token: None,
        email_check_token_generated_at: None,
        joined_at: None,
        bio: None,
        url: None,
        occupation: None,
        location: None,
        study_created_by_email: false,
        study_created_by_web: true,
        study_enrollment_result_by_email: false,
        study_enrollment_result_by_web: true,
        study_updated_by_email: false,
        study_updated_by_web: true,
    }
}
