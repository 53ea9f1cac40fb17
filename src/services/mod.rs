pub mod account_service;
pub mod auth_service;
pub mod email_service;
pub mod sign_up_validator;

pub use account_service::{AccountService, AccountServiceError};
pub use auth_service::{AuthService, AuthServiceError, LoginRequest};
pub use email_service::{
    create_email_service, EmailError, EmailService, LoggingEmailService, SmtpEmailService,
};
pub use sign_up_validator::SignUpFormValidator;
