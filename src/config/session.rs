use std::env;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha512};
use time::Duration;
use tower_sessions::{
    cookie::{Key, SameSite},
    service::SignedCookie,
    Expiry, SessionManagerLayer, SessionStore,
};
use tracing::warn;

use super::{current_environment, env_flag_enabled, ConfigError};

pub type SessionLayer<S> = SessionManagerLayer<S, SignedCookie>;

const MIN_SECRET_BYTES: usize = 64;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secure: bool,
    pub same_site: SameSite,
    pub idle_timeout: Duration,
    pub cookie_name: String,
}

impl SessionConfig {
    pub fn from_env() -> Self {
        if current_environment() == "production" {
            SessionConfig {
                secure: true,
                same_site: SameSite::Strict,
                idle_timeout: Duration::hours(2),
                cookie_name: "__Host-studylink".to_string(),
            }
        } else {
            SessionConfig {
                secure: false,
                same_site: SameSite::Lax,
                idle_timeout: Duration::days(7),
                cookie_name: "studylink_session".to_string(),
            }
        }
    }

    /// Signed-cookie session layer over any store; the server uses the
    /// SQLite store, tests use the in-memory one.
    pub fn create_layer<S: SessionStore + Clone>(&self, store: S) -> SessionLayer<S> {
        SessionManagerLayer::new(store)
            .with_secure(self.secure)
            .with_http_only(true)
            .with_same_site(self.same_site)
            .with_name(self.cookie_name.clone())
            .with_expiry(Expiry::OnInactivity(self.idle_timeout))
            .with_signed(load_session_key())
    }
}

/// Refuses to start a production server with plain HTTP or a weak secret.
pub fn validate_production_config() -> Result<(), ConfigError> {
    if current_environment() != "production" {
        return Ok(());
    }

    if !env_flag_enabled("FORCE_HTTPS") {
        return Err(ConfigError::Insecure(
            "Production requires HTTPS. Set FORCE_HTTPS=true".to_string(),
        ));
    }

    let secret =
        env::var("SESSION_SECRET").map_err(|_| ConfigError::MissingInProduction("SESSION_SECRET"))?;

    if decode_secret_bytes(&secret).len() < MIN_SECRET_BYTES {
        return Err(ConfigError::Insecure(format!(
            "SESSION_SECRET must be at least {} bytes in production",
            MIN_SECRET_BYTES
        )));
    }

    let lowered = secret.to_ascii_lowercase();
    if ["example", "changeme", "default"]
        .iter()
        .any(|weak| lowered.contains(weak))
    {
        return Err(ConfigError::Insecure(
            "SESSION_SECRET looks like a placeholder value".to_string(),
        ));
    }

    Ok(())
}

fn load_session_key() -> Key {
    match env::var("SESSION_SECRET") {
        Ok(secret) if !secret.is_empty() => key_from_secret_bytes(&decode_secret_bytes(&secret)),
        _ => {
            warn!("SESSION_SECRET not set; generating ephemeral key (development only)");
            Key::generate()
        }
    }
}

fn decode_secret_bytes(secret: &str) -> Vec<u8> {
    STANDARD
        .decode(secret.as_bytes())
        .unwrap_or_else(|_| secret.as_bytes().to_vec())
}

fn key_from_secret_bytes(bytes: &[u8]) -> Key {
    if bytes.len() >= MIN_SECRET_BYTES {
        Key::from(&bytes[..MIN_SECRET_BYTES])
    } else {
        Key::from(Sha512::digest(bytes).as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_secret_is_stretched_to_a_full_key() {
        let key = key_from_secret_bytes(b"short");
        assert_eq!(key.master().len(), 64);
    }

    #[test]
    fn test_base64_secret_is_decoded() {
        let encoded = STANDARD.encode([7u8; 64]);
        assert_eq!(decode_secret_bytes(&encoded), vec![7u8; 64]);
        assert_eq!(decode_secret_bytes("not base64!"), b"not base64!".to_vec());
    }
}
