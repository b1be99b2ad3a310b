//! # ag-auth-simple
//!
//! Argon2-based implementation of `AuthProvider`.
//! Handles account sign-up, password sign-in, the shared demo identity and
//! opaque session tokens.

use std::sync::Arc;

use ag_core::error::{AppError, Result, ValidationError};
use ag_core::models::{Identity, Session, UserAccount};
use ag_core::traits::{AuthProvider, UserRepo};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Session lifetime unless overridden with [`SimpleAuthProvider::with_session_ttl`].
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 12;

struct ActiveSession {
    identity: Identity,
    issued_at: DateTime<Utc>,
}

pub struct SimpleAuthProvider {
    users: Arc<dyn UserRepo>,
    /// Mixed into token digests so the session table never holds raw tokens.
    session_salt: String,
    session_ttl: Duration,
    /// token digest -> session
    sessions: DashMap<String, ActiveSession>,
}

impl SimpleAuthProvider {
    /// Accepts a salt string (e.g., from an environment variable)
    pub fn new(users: Arc<dyn UserRepo>, salt: &str) -> Self {
        Self {
            users,
            session_salt: salt.to_string(),
            session_ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            sessions: DashMap::new(),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    fn expired(&self, session: &ActiveSession, now: DateTime<Utc>) -> bool {
        now - session.issued_at >= self.session_ttl
    }

    /// Drops every expired session.
    fn sweep(&self, now: DateTime<Utc>) {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !self.expired(session, now));
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            log::debug!("evicted {} expired sessions", evicted);
        }
    }

    fn digest(&self, token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.session_salt.as_bytes());
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn open_session(&self, identity: Identity) -> Result<Session> {
        let mut raw = [0u8; 32];
        getrandom::getrandom(&mut raw).map_err(|e| AppError::Backend(format!("entropy source failed: {e}")))?;
        let token = URL_SAFE_NO_PAD.encode(raw);

        let now = Utc::now();
        self.sweep(now);
        self.sessions.insert(
            self.digest(&token),
            ActiveSession {
                identity: identity.clone(),
                issued_at: now,
            },
        );
        Ok(Session { token, identity })
    }
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(ValidationError::InvalidEmail.into()),
    }
}

fn hash_password(password: &str) -> Result<String> {
    let mut salt = [0u8; 16];
    getrandom::getrandom(&mut salt).map_err(|e| AppError::Backend(format!("entropy source failed: {e}")))?;
    let salt = SaltString::encode_b64(&salt).map_err(|e| AppError::Backend(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Backend(e.to_string()))
}

/// Verifies if a provided password matches a stored Argon2 hash.
fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(p) => p,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[async_trait]
impl AuthProvider for SimpleAuthProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort(MIN_PASSWORD_LEN).into());
        }

        let account = UserAccount {
            id: Uuid::now_v7(),
            email,
            password_hash: hash_password(password)?,
            created_at: Utc::now(),
        };
        self.users.create_user(&account).await?;
        log::info!("registered user {}", account.id);

        Ok(Identity {
            user_id: account.id,
            email: account.email,
            is_demo: false,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email)?;
        let account = self
            .users
            .find_user_by_email(&email)
            .await
            .map_err(AppError::backend)?;

        match account {
            Some(account) if verify_password(password, &account.password_hash) => {
                log::info!("user {} signed in", account.id);
                self.open_session(Identity {
                    user_id: account.id,
                    email: account.email,
                    is_demo: false,
                })
            }
            _ => Err(AppError::Unauthorized("invalid email or password".into())),
        }
    }

    fn demo_session(&self) -> Result<Session> {
        self.open_session(Identity::demo())
    }

    fn resolve(&self, token: &str) -> Option<Identity> {
        let key = self.digest(token);
        let now = Utc::now();
        // the read guard must be gone before remove_if takes the shard lock
        let identity = {
            let session = self.sessions.get(&key)?;
            (!self.expired(&session, now)).then(|| session.identity.clone())
        };
        if identity.is_none() {
            self.sessions.remove_if(&key, |_, session| self.expired(session, now));
        }
        identity
    }

    fn sign_out(&self, token: &str) {
        self.sessions.remove(&self.digest(token));
    }
}
