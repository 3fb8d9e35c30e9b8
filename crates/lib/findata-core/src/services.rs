use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::access::AccessContext;
use crate::error::CoreResult;
use crate::store::{RecordStore, StoreError};

/// Bounds concurrent store sessions and hands out scoped [`Session`]s.
pub struct SessionManager<S> {
    inner: Arc<SessionManagerInner<S>>,
}

struct SessionManagerInner<S> {
    store: Arc<S>,
    permits: Arc<Semaphore>,
    max_sessions: usize,
}

impl<S> Clone for SessionManager<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: RecordStore> SessionManager<S> {
    /// Creates a manager allowing at most `max_sessions` (minimum 1)
    /// concurrent sessions.
    #[must_use]
    pub fn new(store: Arc<S>, max_sessions: usize) -> Self {
        let max_sessions = max_sessions.max(1);
        Self {
            inner: Arc::new(SessionManagerInner {
                store,
                permits: Arc::new(Semaphore::new(max_sessions)),
                max_sessions,
            }),
        }
    }

    /// Waits for a free slot and opens a session bound to `access`.
    ///
    /// # Errors
    /// Returns `CoreError::Store` if the pool has been closed.
    pub async fn acquire(&self, access: AccessContext) -> CoreResult<Session<S>> {
        let permit = self
            .inner
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| StoreError::Unavailable("session pool closed".to_string()))?;
        debug!(
            caller = %access.caller_key(),
            available = self.available(),
            "session acquired"
        );
        Ok(Session {
            store: self.inner.store.clone(),
            access,
            _permit: permit,
        })
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    #[must_use]
    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    #[must_use]
    pub fn max_sessions(&self) -> usize {
        self.inner.max_sessions
    }

    /// Stops handing out new sessions; sessions already open run to
    /// completion.
    pub fn close(&self) {
        self.inner.permits.close();
    }
}

/// One unit of store work executed under a fixed [`AccessContext`].
///
/// The pool slot is released when the session is dropped, whichever way the
/// call ends.
pub struct Session<S> {
    store: Arc<S>,
    access: AccessContext,
    _permit: OwnedSemaphorePermit,
}

impl<S> Session<S> {
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn access(&self) -> &AccessContext {
        &self.access
    }
}
