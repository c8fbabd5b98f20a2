// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User store (§6 `users.json`): PBKDF2 password hashing, RFC 6238 TOTP,
//! and SSH login pubkeys, persisted via the same tempfile+fsync+rename
//! pattern the session store uses (§5 "Atomic file writes").
//!
//! No crate in the retrieval pack reaches for password hashing, so this
//! leans on `ring::pbkdf2` — already a workspace dependency with no other
//! consumer before this crate was written.

use std::collections::HashMap;
use std::io::Write as _;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use base64::Engine;
use rand::RngCore;
use ring::pbkdf2;
use serde::{Deserialize, Serialize};

use centaurx_core::error::{CoreError, CoreResult, ErrorCode};
use centaurx_core::ids::UserId;
use parking_lot::RwLock;

use crate::config::SeedUser;
use crate::totp;

const PBKDF2_ITERATIONS: u32 = 210_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = ring::digest::SHA256_OUTPUT_LEN;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRecord {
    username: String,
    /// `pbkdf2$<iterations>$<salt_b64>$<hash_b64>`.
    password_hash: String,
    #[serde(default)]
    totp_secret: Option<String>,
    #[serde(default)]
    login_pubkeys: Vec<String>,
}

#[allow(clippy::expect_used)]
fn hash_password(password: &str, salt: &[u8]) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        NonZeroU32::new(PBKDF2_ITERATIONS).expect("PBKDF2_ITERATIONS is a nonzero constant"),
        salt,
        password.as_bytes(),
        &mut out,
    );
    out
}

fn encode_password_hash(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    let hash = hash_password(password, &salt);
    format!(
        "pbkdf2${PBKDF2_ITERATIONS}${}${}",
        base64::engine::general_purpose::STANDARD.encode(salt),
        base64::engine::general_purpose::STANDARD.encode(hash)
    )
}

fn verify_password_hash(encoded: &str, password: &str) -> bool {
    let mut parts = encoded.splitn(4, '$');
    let (Some("pbkdf2"), Some(iterations), Some(salt_b64), Some(hash_b64)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let Ok(iterations) = iterations.parse::<u32>() else { return false };
    let Some(iterations) = NonZeroU32::new(iterations) else { return false };
    let Ok(salt) = base64::engine::general_purpose::STANDARD.decode(salt_b64) else { return false };
    let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(hash_b64) else { return false };

    let mut actual = [0u8; HASH_LEN];
    pbkdf2::derive(pbkdf2::PBKDF2_HMAC_SHA256, iterations, &salt, password.as_bytes(), &mut actual);
    totp::constant_time_eq(&actual, &expected)
}

/// In-memory user store with atomic JSON persistence.
pub struct AuthStore {
    users: RwLock<HashMap<String, UserRecord>>,
    path: PathBuf,
}

impl AuthStore {
    pub fn new(path: PathBuf) -> Self {
        Self { users: RwLock::new(HashMap::new()), path }
    }

    /// Load `users.json` if present; a missing file is not an error (first
    /// boot before any seeding has happened).
    pub fn load(&self) -> std::io::Result<usize> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let records: Vec<UserRecord> =
            serde_json::from_str(&contents).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut users = self.users.write();
        let count = records.len();
        for record in records {
            users.insert(record.username.clone(), record);
        }
        Ok(count)
    }

    pub fn save(&self) -> std::io::Result<()> {
        let records: Vec<UserRecord> = self.users.read().values().cloned().collect();
        let json = serde_json::to_string_pretty(&records).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("tmp");
        {
            let mut f = std::fs::File::create(&tmp_path)?;
            f.write_all(json.as_bytes())?;
            f.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Seed users from config into an empty store. Idempotent: a user
    /// already present (by username) is left untouched rather than
    /// re-hashed, so re-seeding on every restart never resets passwords an
    /// operator has since changed via `/api/chpasswd`.
    pub fn seed(&self, seed_users: &[SeedUser]) -> CoreResult<()> {
        {
            let mut users = self.users.write();
            for seed in seed_users {
                if users.contains_key(&seed.username) {
                    continue;
                }
                users.insert(
                    seed.username.clone(),
                    UserRecord {
                        username: seed.username.clone(),
                        password_hash: encode_password_hash(&seed.password),
                        totp_secret: seed.totp_secret.clone(),
                        login_pubkeys: seed.login_pubkeys.clone(),
                    },
                );
            }
        }
        self.save().map_err(|e| CoreError::internal(format!("save seeded users: {e}")))
    }

    /// Verify username/password/TOTP, returning the resolved [`UserId`] on
    /// success. Unknown usernames and bad credentials return the same
    /// `AuthFailed` error so a caller cannot distinguish the two (§7).
    pub fn verify_login(&self, username: &str, password: &str, totp_code: &str, unix_time: u64) -> CoreResult<UserId> {
        let record = self.users.read().get(username).cloned();
        let Some(record) = record else { return Err(CoreError::new(ErrorCode::AuthFailed, "invalid credentials")) };

        if !verify_password_hash(&record.password_hash, password) {
            return Err(CoreError::new(ErrorCode::AuthFailed, "invalid credentials"));
        }
        if let Some(secret) = &record.totp_secret {
            if !totp::verify(secret, totp_code, unix_time) {
                return Err(CoreError::new(ErrorCode::TOTPFailed, "invalid verification code"));
            }
        }
        UserId::new(username).map_err(|e| CoreError::internal(format!("seeded username fails validation: {e}")))
    }

    /// `POST /api/chpasswd`: requires the current password and a valid TOTP
    /// code before accepting the new one.
    pub fn change_password(&self, username: &str, current_password: &str, totp_code: &str, new_password: &str, unix_time: u64) -> CoreResult<()> {
        self.verify_login(username, current_password, totp_code, unix_time)?;
        {
            let mut users = self.users.write();
            let Some(record) = users.get_mut(username) else {
                return Err(CoreError::new(ErrorCode::AuthFailed, "invalid credentials"));
            };
            record.password_hash = encode_password_hash(new_password);
        }
        self.save().map_err(|e| CoreError::internal(format!("save password change: {e}")))
    }

    /// Login pubkeys registered to `username`, for SSH pubkey auth.
    pub fn pubkeys_for(&self, username: &str) -> Vec<String> {
        self.users.read().get(username).map(|r| r.login_pubkeys.clone()).unwrap_or_default()
    }

    /// Whether `username` has a TOTP secret configured, for the SSH
    /// keyboard-interactive challenge.
    pub fn totp_secret_for(&self, username: &str) -> Option<String> {
        self.users.read().get(username).and_then(|r| r.totp_secret.clone())
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.read().contains_key(username)
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    #[cfg(test)]
    fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[path = "auth_store_tests.rs"]
mod tests;
