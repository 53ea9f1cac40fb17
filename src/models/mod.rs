pub mod account;
pub mod sign_up;

pub use account::{Account, NewAccount, CONFIRM_EMAIL_COOLDOWN_MINUTES};
pub use sign_up::{FieldError, SignUpForm, ValidationErrors};
