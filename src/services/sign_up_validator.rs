use crate::models::sign_up::{SignUpForm, ValidationErrors};
use crate::repositories::account_repository::{AccountRepository, RepositoryError};
use lettre::Address;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static USERNAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ㄱ-ㅎ가-힣a-z0-9_-]{3,20}$").expect("username pattern is a valid regex")
});

pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 50;

/// Checks a sign-up submission. Shape rules run first and need nothing but
/// the form; uniqueness is looked up only for fields whose shape passed.
pub struct SignUpFormValidator {
    repository: Arc<dyn AccountRepository>,
}

impl SignUpFormValidator {
    pub fn new(repository: Arc<dyn AccountRepository>) -> Self {
        Self { repository }
    }

    pub async fn validate(&self, form: &SignUpForm) -> Result<ValidationErrors, RepositoryError> {
        let mut errors = validate_format(form);

        if !errors.has_field_error("email") && self.repository.exists_by_email(&form.email).await? {
            errors.reject("email", "invalid.email", "This email is already in use.");
        }

        if !errors.has_field_error("username")
            && self.repository.exists_by_username(&form.username).await?
        {
            errors.reject(
                "username",
                "invalid.username",
                "This username is already in use.",
            );
        }

        Ok(errors)
    }
}

pub fn validate_format(form: &SignUpForm) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if !USERNAME_PATTERN.is_match(&form.username) {
        errors.reject(
            "username",
            "invalid.username",
            "Use 3 to 20 characters: lowercase letters, digits, '_' or '-'.",
        );
    }

    if form.email.is_empty() || form.email.len() > 255 || form.email.parse::<Address>().is_err() {
        errors.reject("email", "invalid.email", "Enter a valid email address.");
    }

    let password_len = form.password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&password_len) {
        errors.reject(
            "password",
            "invalid.password",
            format!(
                "Password must be {} to {} characters.",
                PASSWORD_MIN_LEN, PASSWORD_MAX_LEN
            ),
        );
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::account_repository::MockAccountRepository;
    use mockall::predicate::*;

    fn form(username: &str, email: &str, password: &str) -> SignUpForm {
        SignUpForm {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            csrf_token: String::new(),
        }
    }

    #[test]
    fn test_valid_form_has_no_format_errors() {
        let errors = validate_format(&form("studier", "a@x.com", "password123"));
        assert!(!errors.has_errors());

        let errors = validate_format(&form("스터디_1", "a@x.com", "password123"));
        assert!(!errors.has_errors());
    }

    #[test]
    fn test_format_errors_per_field() {
        let errors = validate_format(&form("ab", "not-an-email", "short"));
        assert_eq!(errors.len(), 3);
        assert!(errors.has_field_error("username"));
        assert!(errors.has_field_error("email"));
        assert!(errors.has_field_error("password"));

        let errors = validate_format(&form("UpperCase", "a@x.com", &"p".repeat(51)));
        assert!(errors.has_field_error("username"));
        assert!(errors.has_field_error("password"));
        assert!(!errors.has_field_error("email"));
    }

    #[tokio::test]
    async fn test_duplicate_email_and_username_rejected() {
        let mut mock_repo = MockAccountRepository::new();
        mock_repo
            .expect_exists_by_email()
            .with(eq("a@x.com"))
            .times(1)
            .returning(|_| Box::pin(async move { Ok(true) }));
        mock_repo
            .expect_exists_by_username()
            .with(eq("studier"))
            .times(1)
            .returning(|_| Box::pin(async move { Ok(true) }));

        let validator = SignUpFormValidator::new(Arc::new(mock_repo));
        let errors = validator
            .validate(&form("studier", "a@x.com", "password123"))
            .await
            .expect("validation should run");

        assert_eq!(
            errors.message_for("email"),
            Some("This email is already in use.")
        );
        assert_eq!(
            errors.message_for("username"),
            Some("This username is already in use.")
        );
    }

    #[tokio::test]
    async fn test_malformed_fields_skip_lookups() {
        let mock_repo = MockAccountRepository::new();
        let validator = SignUpFormValidator::new(Arc::new(mock_repo));

        let errors = validator
            .validate(&form("x", "bad", "password123"))
            .await
            .expect("validation should run");

        assert_eq!(errors.len(), 2);
    }
}
