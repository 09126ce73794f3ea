//! Session token storage shared by every management API call
//!
//! The store is read on every request and written only after a successful
//! login. Each write bumps a generation counter. A caller that saw a 401
//! passes the generation it used to [`SessionStore::refresh_with`]; if
//! another task already replaced the session in the meantime, the caller
//! reuses that session instead of logging in again.

use std::fmt;
use std::future::Future;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::errors::ApiError;

/// Opaque session token returned by a successful login
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("token", &"<redacted>").finish()
    }
}

/// Consistent view of the store at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session: Option<Session>,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct SessionState {
    session: Option<Session>,
    generation: u64,
}

/// Holder for the current session
///
/// Shared between clients as an `Arc<SessionStore>`.
#[derive(Debug, Default)]
pub struct SessionStore {
    state: RwLock<SessionState>,
    login_gate: Mutex<()>,
}

impl SessionStore {
    /// Empty store; the first authenticated call will trigger a login
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a session
    pub fn with_session(session: Session) -> Self {
        Self {
            state: RwLock::new(SessionState { session: Some(session), generation: 1 }),
            login_gate: Mutex::new(()),
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        SessionSnapshot { session: state.session.clone(), generation: state.generation }
    }

    pub async fn generation(&self) -> u64 {
        self.state.read().await.generation
    }

    /// Replace the session, returning the new generation
    pub async fn replace(&self, session: Session) -> u64 {
        let mut state = self.state.write().await;
        state.session = Some(session);
        state.generation += 1;
        state.generation
    }

    /// Log in unless the session changed since `observed_generation`
    ///
    /// Concurrent callers are serialized on the login gate. The first one
    /// runs `login` and stores the result; callers that queued behind it
    /// observe the bumped generation and return the fresh session without
    /// calling `login`. The state lock is never held while `login` runs.
    pub async fn refresh_with<F, Fut>(
        &self,
        observed_generation: u64,
        login: F,
    ) -> Result<SessionSnapshot, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Session, ApiError>>,
    {
        let _gate = self.login_gate.lock().await;

        let current = self.snapshot().await;
        if current.generation != observed_generation && current.session.is_some() {
            debug!(
                observed = observed_generation,
                current = current.generation,
                "Session already refreshed by another caller"
            );
            return Ok(current);
        }

        let session = login().await?;
        let generation = self.replace(session.clone()).await;
        info!(generation, "Session refreshed");

        Ok(SessionSnapshot { session: Some(session), generation })
    }
}
