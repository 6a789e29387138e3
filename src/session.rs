//! Ephemeral session store.
//!
//! A session links one user's pending tier choice to the media reference and
//! rendition map needed to fulfil it. Entries are strictly per-user, live in
//! memory only, and die on close, on expiry, or with the process. This is the
//! stateful opaque-key design; a stateless re-derivation store could sit
//! behind the same interface.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::error::SessionError;
use crate::extract::MediaReference;
use crate::rendition::RenditionMap;

/// How long an unconsumed selection stays resolvable.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Opaque key handed to the transport as callback payload.
pub type SessionKey = String;

/// Data handed back to the orchestrator on a successful resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSession {
    /// Identity of the media the user is choosing a tier for.
    pub media: MediaReference,
    /// Best rendition per offered tier.
    pub renditions: RenditionMap,
}

#[derive(Debug)]
struct SessionEntry {
    user_id: i64,
    media: MediaReference,
    renditions: RenditionMap,
    opened_at: Instant,
}

/// In-memory session table, safe to share across handler tasks.
///
/// A coarse mutex guards the whole table; operations are short (clone in,
/// clone out) so contention is not a concern at this scale.
pub struct SessionStore {
    ttl: Duration,
    entries: Mutex<HashMap<SessionKey, SessionEntry>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Creates a store with the default TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Creates a store whose entries expire after `ttl`.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Opens a session for `user_id` and returns its opaque key.
    ///
    /// Expired entries are swept opportunistically here, so an abandoned
    /// selection never outlives the TTL by more than one `open`.
    pub fn open(&self, user_id: i64, media: MediaReference, renditions: RenditionMap) -> SessionKey {
        let key = Uuid::new_v4().simple().to_string();
        let mut entries = self.entries.lock().expect("session table poisoned");
        let ttl = self.ttl;
        entries.retain(|_, e| e.opened_at.elapsed() < ttl);
        entries.insert(
            key.clone(),
            SessionEntry {
                user_id,
                media,
                renditions,
                opened_at: Instant::now(),
            },
        );
        key
    }

    /// Resolves a key on behalf of `user_id`.
    ///
    /// The entry stays in the table: a key may be resolved again until the
    /// orchestrator closes it (when a transfer starts, or on cancel).
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] for unknown, expired, or closed keys;
    /// [`SessionError::Forbidden`] when the key belongs to someone else.
    pub fn resolve(&self, key: &str, user_id: i64) -> Result<ResolvedSession, SessionError> {
        let mut entries = self.entries.lock().expect("session table poisoned");
        let Some(entry) = entries.get(key) else {
            return Err(SessionError::NotFound);
        };
        if entry.opened_at.elapsed() >= self.ttl {
            entries.remove(key);
            return Err(SessionError::NotFound);
        }
        if entry.user_id != user_id {
            return Err(SessionError::Forbidden);
        }
        Ok(ResolvedSession {
            media: entry.media.clone(),
            renditions: entry.renditions.clone(),
        })
    }

    /// Closes a session. Idempotent; closing an unknown key is a no-op.
    pub fn close(&self, key: &str) {
        self.entries
            .lock()
            .expect("session table poisoned")
            .remove(key);
    }

    /// Number of live (possibly expired but unswept) sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("session table poisoned").len()
    }

    /// True when no sessions are open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendition::{RawFormat, select};
    use std::sync::Arc;

    fn media() -> MediaReference {
        MediaReference {
            id: "vid1".to_string(),
            title: "A video".to_string(),
            thumbnail_url: None,
        }
    }

    fn renditions() -> RenditionMap {
        select(&[RawFormat {
            vcodec: Some("avc1".to_string()),
            acodec: Some("mp4a".to_string()),
            height: Some(480),
            ext: Some("mp4".to_string()),
            url: Some("https://cdn/v".to_string()),
            http_headers: std::collections::HashMap::new(),
        }])
    }

    #[test]
    fn open_then_resolve_returns_the_map() {
        let store = SessionStore::new();
        let key = store.open(7, media(), renditions());
        let resolved = store.resolve(&key, 7).unwrap();
        assert_eq!(resolved.media.id, "vid1");
        assert_eq!(resolved.renditions.len(), 1);
    }

    #[test]
    fn resolve_by_other_user_is_forbidden() {
        let store = SessionStore::new();
        let key = store.open(7, media(), renditions());
        assert_eq!(store.resolve(&key, 8), Err(SessionError::Forbidden));
        // The rightful owner can still resolve afterwards.
        assert!(store.resolve(&key, 7).is_ok());
    }

    #[test]
    fn unknown_key_is_not_found() {
        let store = SessionStore::new();
        assert_eq!(store.resolve("nope", 7), Err(SessionError::NotFound));
    }

    #[test]
    fn resolve_twice_before_close() {
        // Documented behavior of the stateful design: re-resolution is
        // allowed until the orchestrator closes the key.
        let store = SessionStore::new();
        let key = store.open(7, media(), renditions());
        assert!(store.resolve(&key, 7).is_ok());
        assert!(store.resolve(&key, 7).is_ok());
    }

    #[test]
    fn close_is_idempotent_and_resolve_after_close_is_not_found() {
        let store = SessionStore::new();
        let key = store.open(7, media(), renditions());
        store.close(&key);
        store.close(&key);
        assert_eq!(store.resolve(&key, 7), Err(SessionError::NotFound));
        assert!(store.is_empty());
    }

    #[test]
    fn expired_entries_are_not_resolvable() {
        let store = SessionStore::with_ttl(Duration::ZERO);
        let key = store.open(7, media(), renditions());
        assert_eq!(store.resolve(&key, 7), Err(SessionError::NotFound));
    }

    #[test]
    fn expired_entries_are_swept_on_open() {
        let store = SessionStore::with_ttl(Duration::ZERO);
        let _stale = store.open(7, media(), renditions());
        let _fresh = store.open(8, media(), renditions());
        // The second open sweeps the first (already expired) entry.
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn concurrent_sessions_do_not_interfere() {
        let store = Arc::new(SessionStore::new());
        let mut handles = Vec::new();
        for user in 0..16i64 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                let key = store.open(user, media(), renditions());
                let resolved = store.resolve(&key, user).unwrap();
                assert_eq!(resolved.media.id, "vid1");
                store.close(&key);
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert!(store.is_empty());
    }
}
