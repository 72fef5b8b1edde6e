//! The process-wide session slot.
//!
//! Every request reads a fresh [`SessionSnapshot`]. Only the authenticator
//! replaces or clears the session; other components can merely flag it
//! invalid, which forces a renewal before the next request.

use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, RwLock};

use crate::error::{Error, Result};
use crate::session::Session;

/// Something able to produce a fresh session after the current one expired.
#[async_trait]
pub trait SessionRenewer: Send + Sync {
    async fn renew(&self) -> Result<Session>;
}

/// A consistent view of the session slot.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session: Option<Session>,
    /// Bumped on every replacement, used to detect concurrent renewals.
    pub generation: u64,
}

#[derive(Debug, Default)]
struct SessionState {
    session: Option<Session>,
    generation: u64,
}

struct Shared {
    state: RwLock<SessionState>,
    renewer: Mutex<Option<Weak<dyn SessionRenewer>>>,
    renewing: AsyncMutex<()>,
}

/// Cheaply cloneable handle to the shared session.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").finish_non_exhaustive()
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl SessionHandle {
    /// A handle with no session installed.
    pub fn anonymous() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(SessionState::default()),
                renewer: Mutex::new(None),
                renewing: AsyncMutex::new(()),
            }),
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.shared.state.read().await;
        SessionSnapshot {
            session: state.session.clone(),
            generation: state.generation,
        }
    }

    pub async fn current(&self) -> Option<Session> {
        self.shared.state.read().await.session.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.shared
            .state
            .read()
            .await
            .session
            .as_ref()
            .is_some_and(|s| s.is_usable() && s.is_authenticated())
    }

    /// Register who renews an invalidated session.
    pub fn set_renewer(&self, renewer: Weak<dyn SessionRenewer>) {
        if let Ok(mut slot) = self.shared.renewer.lock() {
            *slot = Some(renewer);
        }
    }

    /// Snapshot for a new request, renewing first if the installed session
    /// was flagged invalid or has expired.
    pub async fn active(&self) -> Result<SessionSnapshot> {
        let snapshot = self.snapshot().await;
        match &snapshot.session {
            Some(session) if !session.is_usable() => self.renew_snapshot(snapshot.generation).await,
            _ => Ok(snapshot),
        }
    }

    /// Like [`renew`](Self::renew), paired with the generation the renewed
    /// session was installed under.
    pub async fn renew_snapshot(&self, generation: u64) -> Result<SessionSnapshot> {
        let session = self.renew(generation).await?;
        let generation = self.shared.state.read().await.generation;
        Ok(SessionSnapshot {
            session: Some(session),
            generation,
        })
    }

    /// Flag the session of `generation` invalid. A newer session is left alone.
    pub async fn mark_invalid(&self, generation: u64) {
        let mut state = self.shared.state.write().await;
        if state.generation != generation {
            return;
        }
        if let Some(session) = state.session.as_mut() {
            if session.valid {
                tracing::warn!("Session for '{}' was invalidated", session.account);
            }
            session.valid = false;
        }
    }

    /// Obtain a usable session after the one of `generation` went bad.
    ///
    /// Concurrent callers are serialized; the first one renews and the rest
    /// pick up its result.
    pub async fn renew(&self, generation: u64) -> Result<Session> {
        let _guard = self.shared.renewing.lock().await;

        {
            let state = self.shared.state.read().await;
            if state.generation != generation {
                if let Some(session) = state.session.as_ref().filter(|s| s.is_usable()) {
                    return Ok(session.clone());
                }
            }
        }

        let renewer = self
            .shared
            .renewer
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().and_then(Weak::upgrade));
        let Some(renewer) = renewer else {
            return Err(Error::AuthExpired);
        };

        tracing::info!("Re-authenticating expired session");
        renewer.renew().await.map_err(|e| {
            tracing::error!("Re-authentication failed: {}", e);
            Error::AuthExpired
        })
    }

    pub(crate) async fn replace(&self, session: Session) {
        let mut state = self.shared.state.write().await;
        state.session = Some(session);
        state.generation += 1;
    }

    pub(crate) async fn clear(&self) -> Option<Session> {
        let mut state = self.shared.state.write().await;
        state.generation += 1;
        state.session.take()
    }
}
