use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use std::env;

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Failed to build email message: {0}")]
    MessageBuild(String),
    #[error("Failed to send email: {0}")]
    SendFailed(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait EmailService: Send + Sync {
    async fn send_verification_email(
        &self,
        to_email: &str,
        username: &str,
        token: &str,
    ) -> Result<(), EmailError>;
}

/// Link the user clicks to prove they received the email.
pub fn verification_link(base_url: &str, email: &str, token: &str) -> String {
    format!(
        "{}/verify-email-token?token={}&email={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(token),
        urlencoding::encode(email)
    )
}

/// Writes the email to the log instead of sending it. Used when SMTP is not
/// configured.
pub struct LoggingEmailService {
    base_url: String,
}

impl LoggingEmailService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl EmailService for LoggingEmailService {
    async fn send_verification_email(
        &self,
        to_email: &str,
        username: &str,
        token: &str,
    ) -> Result<(), EmailError> {
        let link = verification_link(&self.base_url, to_email, token);
        tracing::info!(
            to = %to_email,
            username = %username,
            link = %link,
            "verification email (not sent, SMTP not configured)"
        );
        Ok(())
    }
}

pub struct SmtpEmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
    from_name: String,
    base_url: String,
}

impl SmtpEmailService {
    pub fn new(base_url: impl Into<String>) -> Result<Self, EmailError> {
        let smtp_host = env::var("SMTP_HOST")
            .map_err(|_| EmailError::ConfigError("SMTP_HOST not set".to_string()))?;
        let smtp_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse::<u16>()
            .map_err(|_| EmailError::ConfigError("Invalid SMTP_PORT".to_string()))?;
        let smtp_username = env::var("SMTP_USERNAME")
            .map_err(|_| EmailError::ConfigError("SMTP_USERNAME not set".to_string()))?;
        let smtp_password = env::var("SMTP_PASSWORD")
            .map_err(|_| EmailError::ConfigError("SMTP_PASSWORD not set".to_string()))?;
        let from_email = env::var("SMTP_FROM_EMAIL")
            .map_err(|_| EmailError::ConfigError("SMTP_FROM_EMAIL not set".to_string()))?;
        let from_name = env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "StudyLink".to_string());
        let encryption = env::var("SMTP_ENCRYPTION").unwrap_or_else(|_| "starttls".to_string());

        let credentials = Credentials::new(smtp_username, smtp_password);

        let mailer = match encryption.to_lowercase().as_str() {
            "tls" => AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp_host)
                .map_err(|e| EmailError::ConfigError(format!("SMTP relay error: {}", e)))?
                .port(smtp_port)
                .credentials(credentials)
                .build(),
            "starttls" => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp_host)
                .map_err(|e| EmailError::ConfigError(format!("SMTP starttls error: {}", e)))?
                .port(smtp_port)
                .credentials(credentials)
                .build(),
            "none" => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp_host)
                .port(smtp_port)
                .credentials(credentials)
                .build(),
            other => {
                return Err(EmailError::ConfigError(format!(
                    "Invalid SMTP_ENCRYPTION value: {}. Use 'tls', 'starttls', or 'none'",
                    other
                )))
            }
        };

        Ok(Self {
            mailer,
            from_email,
            from_name,
            base_url: base_url.into(),
        })
    }
}

fn verification_email_body(username: &str, link: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
</head>
<body style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1 style="color: #333;">Welcome to StudyLink, {username}!</h1>
    <p>Confirm your email address to finish signing up.</p>
    <p style="text-align: center; margin: 30px 0;">
        <a href="{link}" style="background-color: #0d6efd; color: white; padding: 12px 24px; text-decoration: none; border-radius: 4px; display: inline-block;">Verify email</a>
    </p>
    <p style="color: #666; font-size: 14px;">Or paste this link into your browser:</p>
    <p style="color: #666; font-size: 14px; word-break: break-all;">{link}</p>
</body>
</html>
"#
    )
}

#[async_trait]
impl EmailService for SmtpEmailService {
    async fn send_verification_email(
        &self,
        to_email: &str,
        username: &str,
        token: &str,
    ) -> Result<(), EmailError> {
        let link = verification_link(&self.base_url, to_email, token);

        let email = Message::builder()
            .from(
                format!("{} <{}>", self.from_name, self.from_email)
                    .parse()
                    .map_err(|e| {
                        EmailError::MessageBuild(format!("Invalid from address: {}", e))
                    })?,
            )
            .to(to_email
                .parse()
                .map_err(|e| EmailError::MessageBuild(format!("Invalid to address: {}", e)))?)
            .subject("StudyLink, complete your sign-up")
            .header(ContentType::TEXT_HTML)
            .body(verification_email_body(username, &link))
            .map_err(|e| EmailError::MessageBuild(e.to_string()))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;

        Ok(())
    }
}

pub fn create_email_service(base_url: &str) -> Box<dyn EmailService> {
    if env::var("SMTP_HOST").is_ok() {
        match SmtpEmailService::new(base_url) {
            Ok(service) => {
                tracing::info!("Using SMTP email service");
                Box::new(service)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize SMTP email service: {}. Falling back to logging service",
                    e
                );
                Box::new(LoggingEmailService::new(base_url))
            }
        }
    } else {
        tracing::info!("SMTP not configured. Verification emails will be written to the log");
        Box::new(LoggingEmailService::new(base_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_link_encodes_query_values() {
        let link = verification_link("http://localhost:8080/", "a+b@x.com", "abc");
        assert_eq!(
            link,
            "http://localhost:8080/verify-email-token?token=abc&email=a%2Bb%40x.com"
        );
    }

    #[test]
    fn test_body_contains_link_and_username() {
        let body = verification_email_body("studier", "http://h/verify-email-token?token=t");
        assert!(body.contains("studier"));
        assert!(body.contains("http://h/verify-email-token?token=t"));
    }

    #[tokio::test]
    async fn test_logging_service_never_fails() {
        let service = LoggingEmailService::new("http://localhost:8080");
        let result = service
            .send_verification_email("a@x.com", "studier", "abc")
            .await;
        assert!(result.is_ok());
    }
}
