use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::types::Session;

/// Shared handle to one conversation. Holding its lock serialises every
/// request for that session.
pub type SessionHandle = Arc<Mutex<Session>>;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the session, creating it if unseen, with `last_activity`
    /// bumped to now.
    async fn touch(&self, session_id: &str, user_id: &str) -> SessionHandle;
    async fn get(&self, session_id: &str) -> Option<SessionHandle>;
    async fn set(&self, session: Session);
    async fn delete(&self, session_id: &str) -> bool;
    /// Drops sessions idle for longer than `max_idle`. Returns how many went.
    async fn sweep(&self, max_idle: Duration) -> usize;
    async fn count(&self) -> usize;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn touch(&self, session_id: &str, user_id: &str) -> SessionHandle {
        let handle = {
            let existing = self.sessions.read().await.get(session_id).cloned();
            match existing {
                Some(handle) => handle,
                None => {
                    let mut sessions = self.sessions.write().await;
                    sessions
                        .entry(session_id.to_string())
                        .or_insert_with(|| {
                            debug!(session_id, "session created");
                            Arc::new(Mutex::new(Session::new(session_id, user_id)))
                        })
                        .clone()
                }
            }
        };

        handle.lock().await.metadata.last_activity = Utc::now();
        handle
    }

    async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(session_id).cloned()
    }

    async fn set(&self, session: Session) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), Arc::new(Mutex::new(session)));
    }

    async fn delete(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    async fn sweep(&self, max_idle: Duration) -> usize {
        let max_idle =
            chrono::Duration::from_std(max_idle).unwrap_or_else(|_| chrono::Duration::days(3650));
        let cutoff = Utc::now() - max_idle;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        // A session whose lock is held is mid-request and therefore active.
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(session) => session.metadata.last_activity >= cutoff,
            Err(_) => true,
        });
        before - sessions.len()
    }

    async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Periodically evicts idle sessions, independent of request handling.
pub fn spawn_session_sweeper(
    store: Arc<dyn SessionStore>,
    max_idle: Duration,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = store.sweep(max_idle).await;
            if evicted > 0 {
                let remaining = store.count().await;
                info!(evicted, remaining, "idle sessions evicted");
            }
        }
    })
}
