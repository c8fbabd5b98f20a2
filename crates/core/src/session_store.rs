// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP session store (C8): opaque token → user mapping with TTL and a
//! per-session cancellation context derived from a long-lived base context,
//! so logout aborts only that session's outstanding operations (§4.6, §5).

use std::collections::HashMap;
use std::io::Write as _;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::ids::{SessionToken, UserId};

/// A live HTTP session (§3 "Session (HTTP)"). Preferences live on the
/// user's `UserState` (`TabSessionService::preferences`), not here — a
/// session only identifies who is asking and for how long.
pub struct Session {
    pub user: UserId,
    pub expires_at: SystemTime,
    pub cancel: CancellationToken,
}

impl Session {
    fn is_expired(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }
}

/// On-disk representation of a session, used by the optional JSON
/// persistence path (§4.6, §6 `sessions.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedSession {
    token: String,
    user: String,
    expires_at_epoch_secs: u64,
}

pub struct SessionStore {
    sessions: RwLock<HashMap<SessionToken, Session>>,
    base_cancel: CancellationToken,
    ttl: Duration,
}

impl SessionStore {
    /// `base_cancel` is the server's long-lived base context; every session's
    /// cancellation token is a child of it, so a global shutdown cancels all
    /// sessions but a single logout cancels only its own.
    pub fn new(base_cancel: CancellationToken, ttl: Duration) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), base_cancel, ttl }
    }

    /// Create a new session for `user`, returning its opaque token.
    pub fn create(&self, user: UserId) -> SessionToken {
        let token = SessionToken::generate();
        let session = Session { user, expires_at: SystemTime::now() + self.ttl, cancel: self.base_cancel.child_token() };
        self.sessions.write().insert(token.clone(), session);
        token
    }

    /// Resolve a token to its user, rejecting expired sessions. Does not
    /// remove the entry; `purge_expired` owns eviction.
    pub fn user_for(&self, token: &SessionToken) -> Option<UserId> {
        let sessions = self.sessions.read();
        let session = sessions.get(token)?;
        if session.is_expired(SystemTime::now()) {
            return None;
        }
        Some(session.user.clone())
    }

    /// The per-session cancellation token, for binding to an in-flight
    /// request so logout aborts it (§5).
    pub fn cancel_token(&self, token: &SessionToken) -> Option<CancellationToken> {
        self.sessions.read().get(token).map(|s| s.cancel.clone())
    }

    /// Logout: cancel the session's context and remove it.
    pub fn logout(&self, token: &SessionToken) {
        if let Some(session) = self.sessions.write().remove(token) {
            session.cancel.cancel();
        }
    }

    /// Remove every expired session, cancelling each one's context first.
    /// Intended to run on a periodic sweep.
    pub fn purge_expired(&self) -> usize {
        let now = SystemTime::now();
        let mut sessions = self.sessions.write();
        let expired: Vec<SessionToken> = sessions
            .iter()
            .filter(|(_, s)| s.is_expired(now))
            .map(|(t, _)| t.clone())
            .collect();
        for token in &expired {
            if let Some(session) = sessions.remove(token) {
                session.cancel.cancel();
            }
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Persist all non-expired sessions to `path` via tempfile + rename
    /// (§5 "atomic write"). The cancellation token itself is not persisted:
    /// on restart, sessions are rehydrated with fresh tokens bound to the
    /// new base context.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let now = SystemTime::now();
        let persisted: Vec<PersistedSession> = self
            .sessions
            .read()
            .iter()
            .filter(|(_, s)| !s.is_expired(now))
            .map(|(token, s)| PersistedSession {
                token: token.as_str().to_string(),
                user: s.user.as_str().to_string(),
                expires_at_epoch_secs: s
                    .expires_at
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs(),
            })
            .collect();

        let json = serde_json::to_string_pretty(&persisted)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let tmp_path = path.with_extension("tmp");
        {
            let mut f = std::fs::File::create(&tmp_path)?;
            f.write_all(json.as_bytes())?;
            f.sync_all()?;
        }
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Load persisted sessions from `path`, silently dropping any already
    /// expired (§6).
    pub fn load(&self, path: &Path) -> std::io::Result<usize> {
        let contents = std::fs::read_to_string(path)?;
        let persisted: Vec<PersistedSession> = serde_json::from_str(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let now = SystemTime::now();
        let mut sessions = self.sessions.write();
        let mut loaded = 0;
        for p in persisted {
            let expires_at = UNIX_EPOCH + Duration::from_secs(p.expires_at_epoch_secs);
            if expires_at <= now {
                continue;
            }
            let Ok(user) = UserId::new(p.user) else { continue };
            sessions.insert(SessionToken::from_raw(p.token), Session { user, expires_at, cancel: self.base_cancel.child_token() });
            loaded += 1;
        }
        Ok(loaded)
    }
}

#[cfg(test)]
#[path = "session_store_tests.rs"]
mod tests;
