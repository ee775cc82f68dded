//! One-time secrets handed out by email: verification links, password resets and unsubscribe
//! links. Only the keyed hash is ever stored; the plaintext travels inside the email and is
//! returned to the caller exactly once.
use crate::release::PersistenceError;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScope {
    EmailVerification,
    SubscriberEmailVerification,
    Unsubscribe,
    PasswordReset,
}

impl TokenScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScope::EmailVerification => "email_verification",
            TokenScope::SubscriberEmailVerification => "subscriber_email_verification",
            TokenScope::Unsubscribe => "unsubscribe",
            TokenScope::PasswordReset => "password_reset",
        }
    }
}

/// What to persist alongside a freshly generated token.
#[derive(Debug, Clone, PartialEq)]
pub struct NewToken {
    pub expires_at: DateTime<Utc>,
    pub scope: TokenScope,
    pub subject_id: Uuid,
}

#[derive(Debug)]
pub struct IssuedToken {
    pub hash: String,
    pub plaintext: Secret<String>,
}

/// Generates tokens and derives their stored form with HMAC-SHA256 under the signing key.
#[derive(Clone)]
pub struct TokenHasher {
    signing_key: Secret<String>,
}

impl TokenHasher {
    pub fn new(signing_key: Secret<String>) -> Self {
        Self { signing_key }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(self.signing_key.expose_secret().as_bytes())
            .expect("HMAC can take a key of any size")
    }

    pub fn hash(&self, plaintext: &str) -> String {
        let mut mac = self.mac();
        mac.update(plaintext.as_bytes());
        base64::encode_config(mac.finalize().into_bytes(), base64::URL_SAFE)
    }

    /// Constant-time comparison of a presented plaintext against a stored hash.
    pub fn verify(&self, plaintext: &str, hash: &str) -> bool {
        let expected = match base64::decode_config(hash, base64::URL_SAFE) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let mut mac = self.mac();
        mac.update(plaintext.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    pub fn generate(&self) -> IssuedToken {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let plaintext = base64::encode_config(bytes, base64::URL_SAFE);
        IssuedToken {
            hash: self.hash(&plaintext),
            plaintext: Secret::new(plaintext),
        }
    }
}

/// Issues a token and persists its hash inside the caller's transaction.
#[async_trait]
pub trait TokenIssuer<Tx: Send>: Send + Sync {
    async fn issue_token(
        &self,
        tx: &mut Tx,
        token: NewToken,
    ) -> Result<IssuedToken, PersistenceError>;
}

pub struct PgTokenIssuer {
    hasher: TokenHasher,
}

impl PgTokenIssuer {
    pub fn new(hasher: TokenHasher) -> Self {
        Self { hasher }
    }
}

#[async_trait]
impl TokenIssuer<Transaction<'static, Postgres>> for PgTokenIssuer {
    #[tracing::instrument(
        name = "Issue subscriber token",
        skip(self, tx, token),
        fields(scope = token.scope.as_str(), subscriber_id = %token.subject_id)
    )]
    async fn issue_token(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        token: NewToken,
    ) -> Result<IssuedToken, PersistenceError> {
        let issued = self.hasher.generate();
        sqlx::query(
            r#"
            INSERT INTO subscriber_tokens (hash, scope, expires_at, subscriber_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&issued.hash)
        .bind(token.scope.as_str())
        .bind(token.expires_at)
        .bind(token.subject_id)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await
        .context("Failed to store a subscriber token")?;

        Ok(issued)
    }
}
