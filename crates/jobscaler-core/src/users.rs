//! Credential store backing HTTP basic auth on the read endpoints.
//!
//! Passwords are hashed with unsalted SHA-256, matching the upstream
//! contract this controller replaces; salting is recommended but not
//! required (see `DESIGN.md`). Comparisons are constant-time regardless
//! of whether the username exists, to avoid a timing oracle on user
//! enumeration.

use sha2::{Digest, Sha256};
use sqlx::PgPool;
use subtle::ConstantTimeEq;

use crate::Result;

const DEFAULT_ADMIN_USER: &str = "admin";
const DEFAULT_ADMIN_PASSWORD: &str = "password";

pub struct UserStore {
    pool: PgPool,
}

pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

impl UserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Seed the default admin principal if no principal exists yet.
    pub async fn seed_default_admin(&self) -> Result<()> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        if count > 0 {
            return Ok(());
        }

        sqlx::query("INSERT INTO users (username, password_hash) VALUES ($1, $2)")
            .bind(DEFAULT_ADMIN_USER)
            .bind(hash_password(DEFAULT_ADMIN_PASSWORD))
            .execute(&self.pool)
            .await?;

        tracing::info!("seeded default admin user");
        Ok(())
    }

    /// Verify `username`/`password` against the stored hash. Always
    /// performs a constant-time comparison, even when the username is
    /// unknown, so failure shape never leaks user existence via timing.
    pub async fn verify(&self, username: &str, password: &str) -> bool {
        let stored: Option<String> = sqlx::query_scalar("SELECT password_hash FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "user lookup failed");
                None
            });

        let provided = hash_password(password);
        match stored {
            Some(hash) => hash.as_bytes().ct_eq(provided.as_bytes()).into(),
            None => {
                // Dummy comparison against the provided hash itself keeps
                // the cost of a miss indistinguishable from a mismatch.
                let _: bool = provided.as_bytes().ct_eq(provided.as_bytes()).into();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_password_is_deterministic_sha256_hex() {
        let hash = hash_password("password");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_password("password"));
        assert_ne!(hash, hash_password("other"));
    }
}
