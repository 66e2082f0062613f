//! Token Service
//!
//! Issues and validates access/refresh token pairs. Access tokens carry the
//! full identity (`user_id`, `username`, `role`); refresh tokens carry only
//! the user id. The two kinds are signed with different secrets and have
//! different lifetimes, so one can never be accepted in place of the other.
//!
//! Tokens are stateless: nothing is recorded server-side, and an old
//! refresh token stays valid until it expires.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use manga_core::{ConfigError, EntityId, MangaError, MangaResult, Role, TokenPair, User};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

const ALGORITHM: Algorithm = Algorithm::HS256;

const INSECURE_ACCESS_SECRET: &str = "INSECURE_DEFAULT_ACCESS_SECRET_CHANGE_IN_PRODUCTION";
const INSECURE_REFRESH_SECRET: &str = "INSECURE_DEFAULT_REFRESH_SECRET_CHANGE_IN_PRODUCTION";

const MIN_PRODUCTION_SECRET_LEN: usize = 32;

// ============================================================================
// CLOCK ABSTRACTION
// ============================================================================

/// Clock used for every issued-at, expiry and not-before check.
///
/// Time validation is done here rather than inside `jsonwebtoken`, so
/// tests can pin the clock and a broken system clock surfaces as an error.
pub trait JwtClock: Send + Sync {
    /// Current time as Unix epoch seconds. Negative means the clock is
    /// broken.
    fn now_epoch_secs(&self) -> i64;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl JwtClock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl JwtClock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}


// ============================================================================
// JWT SECRET (TYPE-SAFE)
// ============================================================================

/// Signing secret that never shows up in logs or `Debug` output.
#[derive(Clone)]
pub struct JwtSecret(SecretString);

impl JwtSecret {
    /// # Errors
    /// Returns `MangaError::Config` if the secret is empty.
    pub fn new(secret: String) -> MangaResult<Self> {
        if secret.is_empty() {
            return Err(MangaError::Config(ConfigError::MissingRequired {
                field: "jwt_secret".to_string(),
            }));
        }
        Ok(Self(SecretString::new(secret.into())))
    }

    /// Expose the secret value (only for cryptographic operations).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }

    /// Check if the secret is one of the built-in development defaults.
    pub fn is_insecure_default(&self) -> bool {
        let secret = self.0.expose_secret();
        secret == INSECURE_ACCESS_SECRET || secret == INSECURE_REFRESH_SECRET
    }

    fn same_as(&self, other: &JwtSecret) -> bool {
        self.expose() == other.expose()
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JwtSecret([REDACTED, {} chars])", self.len())
    }
}

/// Wrap a configured secret, falling back to `fallback` when empty.
fn build_jwt_secret(secret: String, fallback: &str) -> JwtSecret {
    match JwtSecret::new(secret) {
        Ok(secret) => secret,
        Err(_) => JwtSecret(SecretString::new(fallback.to_string().into())),
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Token service configuration.
#[derive(Clone)]
pub struct TokenConfig {
    /// Secret for access tokens
    pub access_secret: JwtSecret,

    /// Secret for refresh tokens; must differ from `access_secret`
    pub refresh_secret: JwtSecret,

    /// Access token lifetime in seconds
    pub access_ttl_secs: i64,

    /// Refresh token lifetime in seconds
    pub refresh_ttl_secs: i64,

    /// Tolerance applied to `exp` and `nbf` checks
    pub leeway_secs: i64,

    /// Time source
    pub clock: Arc<dyn JwtClock>,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("access_secret", &self.access_secret)
            .field("refresh_secret", &self.refresh_secret)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("leeway_secs", &self.leeway_secs)
            .field("clock", &"<dyn JwtClock>")
            .finish()
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_secret: build_jwt_secret(String::new(), INSECURE_ACCESS_SECRET),
            refresh_secret: build_jwt_secret(String::new(), INSECURE_REFRESH_SECRET),
            access_ttl_secs: 24 * 60 * 60,
            refresh_ttl_secs: 7 * 24 * 60 * 60,
            leeway_secs: 0,
            clock: Arc::new(SystemClock),
        }
    }
}

impl TokenConfig {
    /// Create token configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `MANGA_JWT_SECRET`: access token secret
    /// - `MANGA_JWT_EXPIRATION_HOURS`: access token lifetime (default: 24)
    /// - `MANGA_JWT_REFRESH_SECRET`: refresh token secret
    /// - `MANGA_JWT_REFRESH_EXPIRATION_DAYS`: refresh token lifetime (default: 7)
    /// - `MANGA_JWT_LEEWAY_SECS`: clock skew tolerance (default: 0)
    pub fn from_env() -> Self {
        let access_hours: i64 = std::env::var("MANGA_JWT_EXPIRATION_HOURS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(24);
        let refresh_days: i64 = std::env::var("MANGA_JWT_REFRESH_EXPIRATION_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(7);

        Self {
            access_secret: build_jwt_secret(
                std::env::var("MANGA_JWT_SECRET").unwrap_or_default(),
                INSECURE_ACCESS_SECRET,
            ),
            refresh_secret: build_jwt_secret(
                std::env::var("MANGA_JWT_REFRESH_SECRET").unwrap_or_default(),
                INSECURE_REFRESH_SECRET,
            ),
            access_ttl_secs: access_hours.saturating_mul(60 * 60),
            refresh_ttl_secs: refresh_days.saturating_mul(24 * 60 * 60),
            leeway_secs: std::env::var("MANGA_JWT_LEEWAY_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            clock: Arc::new(SystemClock),
        }
    }

    /// Builder-style clock override.
    pub fn with_clock(mut self, clock: Arc<dyn JwtClock>) -> Self {
        self.clock = clock;
        self
    }

    /// Check the secrets before serving traffic.
    ///
    /// Equal secrets are always rejected. In production (`MANGA_ENVIRONMENT`
    /// is `production` or `prod`) default or short secrets are rejected too;
    /// elsewhere they only produce a warning.
    pub fn validate_for_production(&self) -> MangaResult<()> {
        let environment = std::env::var("MANGA_ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase();
        let is_production = environment == "production" || environment == "prod";

        if self.access_secret.same_as(&self.refresh_secret) {
            return Err(MangaError::Config(ConfigError::IncompatibleOptions {
                option_a: "MANGA_JWT_SECRET".to_string(),
                option_b: "MANGA_JWT_REFRESH_SECRET".to_string(),
            }));
        }

        for (field, secret) in [
            ("MANGA_JWT_SECRET", &self.access_secret),
            ("MANGA_JWT_REFRESH_SECRET", &self.refresh_secret),
        ] {
            if secret.is_insecure_default() {
                if is_production {
                    return Err(MangaError::Config(ConfigError::InvalidValue {
                        field: field.to_string(),
                        value: "[REDACTED]".to_string(),
                        reason: format!(
                            "insecure default secret in MANGA_ENVIRONMENT={}",
                            environment
                        ),
                    }));
                }
                tracing::warn!(
                    field,
                    "Using insecure default JWT secret. Set a random value of at least 32 characters before deploying."
                );
            } else if secret.len() < MIN_PRODUCTION_SECRET_LEN {
                if is_production {
                    return Err(MangaError::Config(ConfigError::InvalidValue {
                        field: field.to_string(),
                        value: "[REDACTED]".to_string(),
                        reason: format!(
                            "secret is {} chars, at least {} required",
                            secret.len(),
                            MIN_PRODUCTION_SECRET_LEN
                        ),
                    }));
                }
                tracing::warn!(field, len = secret.len(), "JWT secret is short");
            }
        }

        Ok(())
    }
}

// ============================================================================
// CLAIMS
// ============================================================================

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: EntityId,
    pub username: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    /// Decimal user id
    pub sub: String,
}

/// Claims carried by a refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub user_id: EntityId,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    pub sub: String,
}

trait TimedClaims {
    fn exp(&self) -> i64;
    fn nbf(&self) -> i64;
}

impl TimedClaims for AccessClaims {
    fn exp(&self) -> i64 {
        self.exp
    }
    fn nbf(&self) -> i64 {
        self.nbf
    }
}

impl TimedClaims for RefreshClaims {
    fn exp(&self) -> i64 {
        self.exp
    }
    fn nbf(&self) -> i64 {
        self.nbf
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Why a token operation failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token is malformed: {reason}")]
    Malformed { reason: String },

    #[error("Token uses an unexpected signing algorithm")]
    WrongAlgorithm,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Token is not valid yet")]
    NotYetValid,

    #[error("Token belongs to user {token_user}, not {current_user}")]
    UserMismatch {
        token_user: EntityId,
        current_user: EntityId,
    },

    #[error("Failed to sign token: {reason}")]
    Signing { reason: String },

    #[error("System clock returned pre-epoch time")]
    Clock,
}

impl From<TokenError> for MangaError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => MangaError::TokenExpired,
            TokenError::Signing { .. } | TokenError::Clock => MangaError::internal(err.to_string()),
            TokenError::Malformed { .. }
            | TokenError::WrongAlgorithm
            | TokenError::InvalidSignature
            | TokenError::NotYetValid
            | TokenError::UserMismatch { .. } => MangaError::token_invalid(err.to_string()),
        }
    }
}

/// Check `exp` and `nbf` against `now`, allowing `leeway_secs` either way.
///
/// A token is expired from the second its `exp` is reached.
pub fn validate_claim_times(
    now: i64,
    exp: i64,
    nbf: i64,
    leeway_secs: i64,
) -> Result<(), TokenError> {
    if nbf > now.saturating_add(leeway_secs) {
        return Err(TokenError::NotYetValid);
    }
    if now.saturating_sub(leeway_secs) >= exp {
        return Err(TokenError::Expired);
    }
    Ok(())
}

// ============================================================================
// TOKEN SERVICE
// ============================================================================

/// Issues and validates token pairs. Cheap to clone.
#[derive(Debug, Clone)]
pub struct TokenService {
    config: Arc<TokenConfig>,
}

impl TokenService {
    /// # Errors
    /// Returns `MangaError::Config` if both token kinds share one secret.
    pub fn new(config: TokenConfig) -> MangaResult<Self> {
        if config.access_secret.same_as(&config.refresh_secret) {
            return Err(MangaError::Config(ConfigError::IncompatibleOptions {
                option_a: "access_secret".to_string(),
                option_b: "refresh_secret".to_string(),
            }));
        }
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    fn now(&self) -> Result<i64, TokenError> {
        let now = self.config.clock.now_epoch_secs();
        if now < 0 {
            tracing::error!(
                timestamp = now,
                "System clock returned pre-epoch time - server time is broken"
            );
            return Err(TokenError::Clock);
        }
        Ok(now)
    }

    /// Mint a fresh access/refresh pair for `user`.
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, TokenError> {
        let now = self.now()?;
        let sub = user.id.to_string();

        let access = AccessClaims {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            exp: now.saturating_add(self.config.access_ttl_secs),
            iat: now,
            nbf: now,
            sub: sub.clone(),
        };
        let refresh = RefreshClaims {
            user_id: user.id,
            exp: now.saturating_add(self.config.refresh_ttl_secs),
            iat: now,
            nbf: now,
            sub,
        };

        Ok(TokenPair {
            access_token: sign(&access, &self.config.access_secret)?,
            refresh_token: sign(&refresh, &self.config.refresh_secret)?,
        })
    }

    /// Verify an access token's signature and time window.
    pub fn validate_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.validate(token, &self.config.access_secret)
    }

    /// Verify a refresh token's signature and time window.
    pub fn validate_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        self.validate(token, &self.config.refresh_secret)
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// `current_user` is the freshly loaded user record; the token must
    /// name the same id.
    pub fn refresh(&self, refresh_token: &str, current_user: &User) -> Result<TokenPair, TokenError> {
        let claims = self.validate_refresh(refresh_token)?;
        if claims.user_id != current_user.id {
            tracing::warn!(
                token_user = claims.user_id,
                current_user = current_user.id,
                "Refresh token does not match user"
            );
            return Err(TokenError::UserMismatch {
                token_user: claims.user_id,
                current_user: current_user.id,
            });
        }
        self.issue_pair(current_user)
    }

    fn validate<C>(&self, token: &str, secret: &JwtSecret) -> Result<C, TokenError>
    where
        C: DeserializeOwned + TimedClaims,
    {
        let decoding_key = DecodingKey::from_secret(secret.expose().as_bytes());

        // Signature only; times are checked against our own clock below.
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);

        let data = decode::<C>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => TokenError::WrongAlgorithm,
            _ => TokenError::Malformed {
                reason: e.to_string(),
            },
        })?;

        let now = self.now()?;
        validate_claim_times(
            now,
            data.claims.exp(),
            data.claims.nbf(),
            self.config.leeway_secs,
        )?;
        Ok(data.claims)
    }
}

fn sign<C: Serialize>(claims: &C, secret: &JwtSecret) -> Result<String, TokenError> {
    let encoding_key = EncodingKey::from_secret(secret.expose().as_bytes());
    encode(&Header::new(ALGORITHM), claims, &encoding_key).map_err(|e| TokenError::Signing {
        reason: e.to_string(),
    })
}

// ============================================================================
// AUTH CONTEXT
// ============================================================================

/// Identity of an authenticated request, taken from its access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: EntityId,
    pub username: String,
    pub role: Role,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<AccessClaims> for AuthContext {
    fn from(claims: AccessClaims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
            role: claims.role,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
