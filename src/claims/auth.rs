use super::model::{NewUser, User};
use super::store::{StoreError, UserStore};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("expected a {expected} token")]
    WrongTokenKind { expected: TokenKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
}

/// Issues and checks bearer tokens. Subjects are opaque user ids.
pub trait TokenService: Send + Sync {
    fn issue(&self, subject: &str) -> Result<TokenPair, AuthError>;

    /// Subject of a valid, unexpired access token.
    fn verify(&self, token: &str) -> Result<String, AuthError>;

    /// New access token for the subject of a valid refresh token.
    fn refresh(&self, refresh_token: &str) -> Result<String, AuthError>;
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: "supersecretkey".to_string(),
            access_ttl: Duration::minutes(30),
            refresh_ttl: Duration::days(7),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TokenClaims {
    pub sub: String,
    pub exp: i64,
    pub kind: TokenKind,
}

/// HS256 JSON Web Tokens.
pub struct JwtTokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    config: AuthConfig,
}

impl JwtTokenService {
    pub fn new(config: AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            config,
        }
    }

    fn sign(&self, subject: &str, kind: TokenKind, ttl: Duration) -> Result<String, AuthError> {
        let claims = TokenClaims {
            sub: subject.to_string(),
            exp: (Utc::now() + ttl).timestamp(),
            kind,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    fn check(&self, token: &str, expected: TokenKind) -> Result<String, AuthError> {
        let data = decode::<TokenClaims>(token, &self.decoding, &self.validation)?;
        if data.claims.kind != expected {
            return Err(AuthError::WrongTokenKind { expected });
        }
        Ok(data.claims.sub)
    }
}

impl TokenService for JwtTokenService {
    fn issue(&self, subject: &str) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.sign(subject, TokenKind::Access, self.config.access_ttl)?,
            refresh_token: self.sign(subject, TokenKind::Refresh, self.config.refresh_ttl)?,
            token_type: "bearer",
        })
    }

    fn verify(&self, token: &str) -> Result<String, AuthError> {
        self.check(token, TokenKind::Access)
    }

    fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let subject = self.check(refresh_token, TokenKind::Refresh)?;
        self.sign(&subject, TokenKind::Access, self.config.access_ttl)
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Salted SHA-256, stored as `salt$digest`.
pub fn hash_password(password: &str) -> String {
    let salt = hex::encode(rand::random::<[u8; 16]>());
    let digest = digest(&salt, password);
    format!("{}${}", salt, digest)
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, expected)) => digest(salt, password) == expected,
        None => false,
    }
}

/// Validate and store a new user with a hashed password.
pub async fn register<S: UserStore + ?Sized>(store: &S, new_user: NewUser) -> Result<User, StoreError> {
    new_user.validate()?;
    store
        .create_user(
            &new_user.username,
            &new_user.full_name,
            hash_password(&new_user.password),
        )
        .await
}

/// The user with these credentials, or `None` if either is wrong.
pub async fn authenticate<S: UserStore + ?Sized>(
    store: &S,
    username: &str,
    password: &str,
) -> Result<Option<User>, StoreError> {
    Ok(store
        .find_by_username(username)
        .await?
        .filter(|user| verify_password(password, &user.password_hash)))
}
