//! In-process session registry keyed by a session id cookie.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use uuid::Uuid;
use warden_auth::{MemorySessionStore, RequestContext, ResponseCookie};

pub const SESSION_COOKIE: &str = "warden-session";

/// Session opened for one request.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: String,
    pub store: Arc<MemorySessionStore>,
    /// Created by this request; the client does not know the id yet.
    pub fresh: bool,
}

impl SessionHandle {
    /// Cookie announcing a fresh, non-empty session to the client.
    pub fn cookie(&self) -> Option<ResponseCookie> {
        (self.fresh && !self.store.is_empty()).then(|| ResponseCookie {
            name: SESSION_COOKIE.to_string(),
            value: self.id.clone(),
            expires: None,
            http_only: true,
            path: "/".to_string(),
        })
    }
}

/// Sessions idle for longer than this are dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug)]
struct SessionEntry {
    store: Arc<MemorySessionStore>,
    last_seen: Instant,
}

/// Live sessions by id.
///
/// Only sessions holding data are kept. Emptied sessions (logout) are removed
/// on commit, and idle ones expire after `idle_timeout`.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<String, SessionEntry>>>,
    idle_timeout: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            inner: Arc::default(),
            idle_timeout,
        }
    }

    /// Session named by the request's session cookie, or a new detached one.
    pub fn open(&self, req: &RequestContext) -> SessionHandle {
        if let Some(id) = req.cookie(SESSION_COOKIE) {
            let mut sessions = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            let now = Instant::now();
            let live = sessions
                .get(id)
                .map(|entry| now.duration_since(entry.last_seen) < self.idle_timeout);
            match live {
                Some(true) => {
                    if let Some(entry) = sessions.get_mut(id) {
                        entry.last_seen = now;
                        return SessionHandle {
                            id: id.to_string(),
                            store: entry.store.clone(),
                            fresh: false,
                        };
                    }
                }
                Some(false) => {
                    tracing::debug!("session expired");
                    sessions.remove(id);
                }
                None => {}
            }
        }

        SessionHandle {
            id: Uuid::now_v7().to_string(),
            store: Arc::new(MemorySessionStore::new()),
            fresh: true,
        }
    }

    /// Settle the session after a request.
    ///
    /// A fresh session is kept once something was written to it, and the
    /// returned cookie lets the client present it again. A known session
    /// left empty is forgotten.
    pub fn commit(&self, handle: &SessionHandle) -> Option<ResponseCookie> {
        let mut sessions = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if handle.store.is_empty() {
            if !handle.fresh {
                sessions.remove(&handle.id);
            }
            return None;
        }
        if !handle.fresh {
            return None;
        }

        let now = Instant::now();
        let idle_timeout = self.idle_timeout;
        sessions.retain(|_, entry| now.duration_since(entry.last_seen) < idle_timeout);
        sessions.insert(
            handle.id.clone(),
            SessionEntry {
                store: handle.store.clone(),
                last_seen: now,
            },
        );
        handle.cookie()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
