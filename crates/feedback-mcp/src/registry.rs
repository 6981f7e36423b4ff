//! Registry of feedback sessions currently awaiting a human response.
//!
//! [`ActiveSessions`] is owned by [`crate::orchestrator::FeedbackOrchestrator`]
//! and cloned (cheaply, it is an `Arc`) into the server heartbeat. Entries are
//! inserted through [`ActiveSessions::register`], which hands back a
//! [`SessionGuard`]; dropping the guard removes the entry. Every exit path of a
//! feedback request, including an unwinding panic, therefore releases its slot
//! exactly once.
//!
//! The lock is a `std::sync::Mutex` so that [`Drop`] can take it without an
//! async context. It is never held across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;

use crate::session::SessionData;

/// Sessions older than this are swept from the registry (25 hours), one hour
/// past the default elicitation timeout.
pub const DEFAULT_SESSION_MAX_AGE: Duration = Duration::from_secs(25 * 60 * 60);

/// Shared map of `session_id` → snapshot taken at registration.
#[derive(Debug, Clone, Default)]
pub struct ActiveSessions {
    inner: Arc<Mutex<HashMap<String, SessionData>>>,
}

impl ActiveSessions {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionData>> {
        // A poisoned map is still a valid map; keep serving.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert `data` and return a guard that removes it on drop.
    #[must_use = "dropping the guard immediately unregisters the session"]
    pub fn register(&self, data: SessionData) -> SessionGuard {
        let session_id = data.session_id.clone();
        let active = {
            let mut map = self.lock();
            map.insert(session_id.clone(), data);
            map.len()
        };
        tracing::debug!(%session_id, active, "session registered");
        SessionGuard {
            sessions: self.clone(),
            session_id,
        }
    }

    /// Remove a session by id. Returns `true` if it was present.
    ///
    /// Absence is not an error: the heartbeat sweep may already have
    /// removed it.
    pub fn remove(&self, session_id: &str) -> bool {
        self.lock().remove(session_id).is_some()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.lock().contains_key(session_id)
    }

    pub fn get(&self, session_id: &str) -> Option<SessionData> {
        self.lock().get(session_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Ids of all registered sessions, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Drop entries whose `start_time` is more than `max_age` in the past.
    ///
    /// Returns the removed ids for logging.
    pub fn sweep_expired(&self, max_age: Duration) -> Vec<String> {
        let now = Utc::now();
        let mut map = self.lock();
        let expired: Vec<String> = map
            .iter()
            .filter(|(_, data)| {
                (now - data.start_time)
                    .to_std()
                    .is_ok_and(|age| age > max_age)
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            map.remove(id);
        }
        drop(map);

        for id in &expired {
            tracing::info!(session_id = %id, "swept expired session");
        }
        expired
    }

    /// Remove every entry, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut map = self.lock();
        let n = map.len();
        map.clear();
        n
    }
}

/// Scoped registration handle returned by [`ActiveSessions::register`].
#[derive(Debug)]
pub struct SessionGuard {
    sessions: ActiveSessions,
    session_id: String,
}

impl SessionGuard {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let removed = self.sessions.remove(&self.session_id);
        tracing::debug!(
            session_id = %self.session_id,
            removed,
            active = self.sessions.len(),
            "session released"
        );
    }
}
