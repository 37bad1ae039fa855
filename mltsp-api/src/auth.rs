//! Bearer-token verification.
//!
//! Tokens are minted by an external identity provider sharing an HMAC
//! secret with this service. The API only verifies them and derives the
//! caller's user key: the email claim when present, else the subject.

use crate::error::{ApiError, ApiResult};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mltsp_core::{ConfigError, MltspError};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Placeholder secret used when `MLTSP_JWT_SECRET` is unset. Refused when
/// `MLTSP_ENVIRONMENT` is production.
const DEV_SECRET: &str = "mltsp-dev-secret-do-not-deploy";

/// Minimum secret length accepted in production.
const MIN_PRODUCTION_SECRET_LEN: usize = 32;

/// Source of "now" for expiry checks, in Unix seconds.
pub trait JwtClock: Send + Sync {
    fn now_epoch_secs(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl JwtClock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl JwtClock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}

/// Pinned clocks for tests.
pub mod test_clocks {
    use super::FixedClock;

    /// 2024-01-01T00:00:00Z
    pub fn valid() -> FixedClock {
        FixedClock(1_704_067_200)
    }

    /// 2030-01-01T00:00:00Z
    pub fn future() -> FixedClock {
        FixedClock(1_893_456_000)
    }
}

/// HMAC secret. Debug output shows only its length.
#[derive(Clone)]
pub struct JwtSecret(SecretString);

impl JwtSecret {
    pub fn new(secret: String) -> Result<Self, MltspError> {
        if secret.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "jwt_secret".to_string(),
            }
            .into());
        }
        Ok(Self(SecretString::from(secret)))
    }

    fn dev() -> Self {
        Self(SecretString::from(DEV_SECRET.to_string()))
    }

    /// Blank values fall back to the development secret.
    fn from_setting(value: Option<String>) -> Self {
        value
            .filter(|v| !v.trim().is_empty())
            .and_then(|v| Self::new(v).ok())
            .unwrap_or_else(Self::dev)
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.expose().len()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }

    pub fn is_dev_default(&self) -> bool {
        self.expose() == DEV_SECRET
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("JwtSecret")
            .field(&format_args!("<{} bytes redacted>", self.len()))
            .finish()
    }
}

/// Token verification settings.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: JwtSecret,
    /// HS256 unless overridden in code
    pub jwt_algorithm: Algorithm,
    /// Lifetime of tokens minted by [`generate_jwt_token`]
    pub jwt_expiration_secs: i64,
    /// Grace period after `exp`
    pub jwt_clock_skew_secs: i64,
    /// When set, tokens must carry exactly this `iss`
    pub jwt_issuer: Option<String>,
    pub clock: Arc<dyn JwtClock>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &self.jwt_secret)
            .field("algorithm", &self.jwt_algorithm)
            .field("expiration_secs", &self.jwt_expiration_secs)
            .field("skew_secs", &self.jwt_clock_skew_secs)
            .field("issuer", &self.jwt_issuer)
            .finish_non_exhaustive()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: JwtSecret::dev(),
            jwt_algorithm: Algorithm::HS256,
            jwt_expiration_secs: 3600,
            jwt_clock_skew_secs: 60,
            jwt_issuer: None,
            clock: Arc::new(SystemClock),
        }
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn is_production_env() -> bool {
    matches!(
        std::env::var("MLTSP_ENVIRONMENT")
            .unwrap_or_default()
            .to_lowercase()
            .as_str(),
        "production" | "prod"
    )
}

impl AuthConfig {
    /// Reads `MLTSP_JWT_SECRET`, `MLTSP_JWT_EXPIRATION_SECS`,
    /// `MLTSP_JWT_CLOCK_SKEW_SECS` and `MLTSP_JWT_ISSUER`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            jwt_secret: JwtSecret::from_setting(std::env::var("MLTSP_JWT_SECRET").ok()),
            jwt_expiration_secs: env_i64("MLTSP_JWT_EXPIRATION_SECS", defaults.jwt_expiration_secs),
            jwt_clock_skew_secs: env_i64("MLTSP_JWT_CLOCK_SKEW_SECS", defaults.jwt_clock_skew_secs),
            jwt_issuer: std::env::var("MLTSP_JWT_ISSUER")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            ..defaults
        }
    }

    /// Production refuses the development secret and secrets shorter than
    /// 32 bytes. Other environments only warn.
    pub fn validate_for_production(&self) -> ApiResult<()> {
        let production = is_production_env();
        let problem = if self.jwt_secret.is_dev_default() {
            Some("MLTSP_JWT_SECRET is unset; the development secret is in use".to_string())
        } else if self.jwt_secret.len() < MIN_PRODUCTION_SECRET_LEN {
            Some(format!(
                "MLTSP_JWT_SECRET has {} bytes; at least {} are required in production",
                self.jwt_secret.len(),
                MIN_PRODUCTION_SECRET_LEN
            ))
        } else {
            None
        };

        match problem {
            Some(problem) if production => Err(ApiError::invalid_input(problem)),
            Some(problem) => {
                tracing::warn!("{}", problem);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Claims read from a bearer token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Claims {
    pub fn new(
        subject: String,
        email: Option<String>,
        expiration_secs: i64,
        clock: &dyn JwtClock,
    ) -> Self {
        let iat = clock.now_epoch_secs();
        Self {
            sub: subject,
            iat,
            exp: iat + expiration_secs,
            iss: None,
            email,
        }
    }

    pub fn with_issuer(self, issuer: impl Into<String>) -> Self {
        Self {
            iss: Some(issuer.into()),
            ..self
        }
    }

    pub fn is_expired(&self, clock: &dyn JwtClock) -> bool {
        self.exp < clock.now_epoch_secs()
    }

    /// Key under which this user's grants and user record are stored.
    pub fn user_key(&self) -> &str {
        self.email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(self.sub.as_str())
    }
}

/// The authenticated caller, placed in request extensions by
/// [`crate::middleware::auth_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Email when the token has one, else the subject
    pub user_key: String,
    pub subject: String,
    pub email: Option<String>,
}

impl From<Claims> for AuthContext {
    fn from(claims: Claims) -> Self {
        Self {
            user_key: claims.user_key().to_string(),
            subject: claims.sub,
            email: claims.email,
        }
    }
}

fn decode_error(err: jsonwebtoken::errors::Error) -> ApiError {
    let reason = match err.kind() {
        ErrorKind::InvalidSignature => "signature does not match".to_string(),
        ErrorKind::InvalidToken => "not a JWT".to_string(),
        ErrorKind::MissingRequiredClaim(claim) => format!("missing `{}` claim", claim),
        _ => err.to_string(),
    };
    ApiError::invalid_token(format!("Bearer token rejected: {}", reason))
}

/// Verify a token's signature with `jsonwebtoken`, then check expiry,
/// issuer and subject against `config`.
pub fn validate_jwt_token(config: &AuthConfig, token: &str) -> ApiResult<Claims> {
    let mut validation = Validation::new(config.jwt_algorithm);
    // Expiry is judged against `config.clock` below.
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.set_required_spec_claims(&["exp"]);

    let key = DecodingKey::from_secret(config.jwt_secret.expose().as_bytes());
    let claims = decode::<Claims>(token, &key, &validation)
        .map_err(decode_error)?
        .claims;

    let now = config.clock.now_epoch_secs();
    if now < 0 {
        tracing::error!(now, "Host clock reports a pre-1970 time");
        return Err(ApiError::internal_error("Server clock is misconfigured"));
    }
    if claims.exp < now - config.jwt_clock_skew_secs {
        return Err(ApiError::token_expired());
    }

    if let Some(expected) = config.jwt_issuer.as_deref() {
        if claims.iss.as_deref() != Some(expected) {
            return Err(ApiError::invalid_token("Token issuer is not accepted"));
        }
    }
    if claims.user_key().trim().is_empty() {
        return Err(ApiError::invalid_token("Token carries no subject"));
    }

    Ok(claims)
}

/// Mint a token signed with the configured secret, for tests and local
/// tooling.
pub fn generate_jwt_token(
    config: &AuthConfig,
    subject: String,
    email: Option<String>,
) -> ApiResult<String> {
    let claims = Claims::new(subject, email, config.jwt_expiration_secs, &*config.clock);
    let claims = match config.jwt_issuer.as_deref() {
        Some(issuer) => claims.with_issuer(issuer),
        None => claims,
    };

    encode(
        &Header::new(config.jwt_algorithm),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.expose().as_bytes()),
    )
    .map_err(|e| ApiError::internal_error(format!("Could not sign token: {}", e)))
}

/// Resolve the caller from an `Authorization` header value.
pub fn authenticate(config: &AuthConfig, auth_header: Option<&str>) -> ApiResult<AuthContext> {
    let header = auth_header.ok_or_else(|| {
        ApiError::unauthorized("Authorization header with a bearer token is required")
    })?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::invalid_token("Authorization header must use Bearer scheme"))?;

    validate_jwt_token(config, token.trim()).map(AuthContext::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    struct EnvVarGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let previous = std::env::var(key).ok();
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
            Self { key, previous }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.previous.as_deref() {
                Some(value) => std::env::set_var(self.key, value),
                None => std::env::remove_var(self.key),
            }
        }
    }

    fn test_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: JwtSecret::new("test_secret".to_string())
                .expect("Test secret should be valid"),
            clock: Arc::new(test_clocks::valid()),
            ..Default::default()
        }
    }

    #[test]
    fn test_jwt_generation_and_validation() -> ApiResult<()> {
        let config = test_config();
        let token = generate_jwt_token(
            &config,
            "auth0|123".to_string(),
            Some("alice@example.com".to_string()),
        )?;

        let claims = validate_jwt_token(&config, &token)?;
        assert_eq!(claims.sub, "auth0|123");
        assert_eq!(claims.user_key(), "alice@example.com");
        assert!(!claims.is_expired(&test_clocks::valid()));
        Ok(())
    }

    #[test]
    fn test_user_key_falls_back_to_subject() {
        let claims = Claims::new("bob".to_string(), None, 60, &test_clocks::valid());
        assert_eq!(claims.user_key(), "bob");

        let claims = Claims::new("bob".to_string(), Some(" ".to_string()), 60, &test_clocks::valid());
        assert_eq!(claims.user_key(), "bob");
    }

    #[test]
    fn test_expired_token() -> ApiResult<()> {
        let mut config = test_config();
        config.jwt_expiration_secs = -1;
        let token = generate_jwt_token(&config, "user".to_string(), None)?;

        config.clock = Arc::new(test_clocks::future());
        let result = validate_jwt_token(&config, &token);
        assert!(matches!(result, Err(ref e) if e.code == ErrorCode::TokenExpired));
        Ok(())
    }

    #[test]
    fn test_wrong_secret_rejected() -> ApiResult<()> {
        let config = test_config();
        let token = generate_jwt_token(&config, "user".to_string(), None)?;

        let other = AuthConfig {
            jwt_secret: JwtSecret::new("another_secret".to_string())
                .expect("Test secret should be valid"),
            ..test_config()
        };
        let result = validate_jwt_token(&other, &token);
        assert!(matches!(result, Err(ref e) if e.code == ErrorCode::InvalidToken));
        Ok(())
    }

    #[test]
    fn test_issuer_enforced() -> ApiResult<()> {
        let config = test_config();
        let token = generate_jwt_token(&config, "user".to_string(), None)?;

        let strict = AuthConfig {
            jwt_issuer: Some("https://id.mltsp.io".to_string()),
            ..test_config()
        };
        assert!(validate_jwt_token(&strict, &token).is_err());

        let token = generate_jwt_token(&strict, "user".to_string(), None)?;
        assert!(validate_jwt_token(&strict, &token).is_ok());
        Ok(())
    }

    #[test]
    fn test_authenticate_bearer() -> ApiResult<()> {
        let config = test_config();
        let token = generate_jwt_token(
            &config,
            "sub-1".to_string(),
            Some("carol@example.com".to_string()),
        )?;
        let header = format!("Bearer {}", token);

        let context = authenticate(&config, Some(&header))?;
        assert_eq!(context.user_key, "carol@example.com");
        assert_eq!(context.subject, "sub-1");
        Ok(())
    }

    #[test]
    fn test_authenticate_missing_or_malformed_header() {
        let config = test_config();

        let result = authenticate(&config, None);
        assert!(matches!(result, Err(ref e) if e.code == ErrorCode::Unauthorized));

        let result = authenticate(&config, Some("Basic dXNlcjpwYXNz"));
        assert!(matches!(result, Err(ref e) if e.code == ErrorCode::InvalidToken));
    }

    #[test]
    fn test_clock_skew_tolerance() -> ApiResult<()> {
        let mut config = test_config();
        config.jwt_expiration_secs = 100;
        let token = generate_jwt_token(&config, "user".to_string(), None)?;

        config.clock = Arc::new(FixedClock(test_clocks::valid().0 + 130));
        assert!(validate_jwt_token(&config, &token).is_ok());

        config.clock = Arc::new(FixedClock(test_clocks::valid().0 + 200));
        assert!(validate_jwt_token(&config, &token).is_err());
        Ok(())
    }

    #[test]
    fn test_pre_epoch_clock_fails_loud() -> ApiResult<()> {
        let mut config = test_config();
        let token = generate_jwt_token(&config, "user".to_string(), None)?;

        config.clock = Arc::new(FixedClock(-1000));
        let result = validate_jwt_token(&config, &token);
        assert!(matches!(result, Err(ref e) if e.code == ErrorCode::InternalError));
        Ok(())
    }

    #[test]
    fn test_secret_is_redacted() {
        let secret = JwtSecret::new("super-secret-value".to_string()).unwrap();
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("redacted"));
        assert!(JwtSecret::new(String::new()).is_err());
    }

    #[test]
    fn test_production_validation_rejects_insecure_default() {
        let _env_lock = ENV_MUTEX.lock().expect("env mutex should not be poisoned");
        let _env_guard = EnvVarGuard::set("MLTSP_ENVIRONMENT", Some("production"));
        let config = AuthConfig::default();
        assert!(config.validate_for_production().is_err());
    }

    #[test]
    fn test_production_validation_rejects_short_secret() {
        let _env_lock = ENV_MUTEX.lock().expect("env mutex should not be poisoned");
        let _env_guard = EnvVarGuard::set("MLTSP_ENVIRONMENT", Some("prod"));
        let config = AuthConfig {
            jwt_secret: JwtSecret::new("short".to_string()).expect("test secret should be valid"),
            ..Default::default()
        };
        assert!(config.validate_for_production().is_err());
    }

    #[test]
    fn test_production_validation_allows_secure_secret() {
        let _env_lock = ENV_MUTEX.lock().expect("env mutex should not be poisoned");
        let _env_guard = EnvVarGuard::set("MLTSP_ENVIRONMENT", Some("production"));
        let config = AuthConfig {
            jwt_secret: JwtSecret::new(
                "this-is-a-very-secure-secret-that-is-at-least-32-characters-long".to_string(),
            )
            .expect("test secret should be valid"),
            ..Default::default()
        };
        assert!(config.validate_for_production().is_ok());
    }

    #[test]
    fn test_production_validation_allows_development() {
        let _env_lock = ENV_MUTEX.lock().expect("env mutex should not be poisoned");
        let _env_guard = EnvVarGuard::set("MLTSP_ENVIRONMENT", None);
        assert!(AuthConfig::default().validate_for_production().is_ok());
    }
}
