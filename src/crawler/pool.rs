//! Bounded pool of reusable browser sessions
//!
//! At most `capacity` sessions are leased at any time; further `acquire()` calls
//! wait. Sessions are created lazily through a [`SessionFactory`] and handed back
//! to the idle stack when their [`SessionLease`] is dropped, on every exit path.

use async_trait::async_trait;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

use crate::metrics;
use crate::utils::error::PoolError;

/// A live browser able to render pages one at a time
#[async_trait]
pub trait BrowserSession: Send + 'static {
    /// Load `url`, wait `settle` for scripts to run, return the rendered markup
    async fn render(&mut self, url: &str, settle: Duration) -> anyhow::Result<String>;

    /// Interrupt whatever the session was doing after a render was cut short
    async fn abandon(&mut self) {}

    /// Release the underlying browser
    async fn close(&mut self) {}
}

/// Creates new browser sessions on demand
#[async_trait]
pub trait SessionFactory: Send + Sync + 'static {
    type Session: BrowserSession;

    async fn create(&self) -> anyhow::Result<Self::Session>;
}

struct Shared<S> {
    idle: Mutex<Vec<S>>,
    closed: AtomicBool,
    leased: AtomicUsize,
}

impl<S> Shared<S> {
    fn idle(&self) -> std::sync::MutexGuard<'_, Vec<S>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Semaphore-guarded pool of browser sessions
pub struct SessionPool<F: SessionFactory> {
    factory: F,
    permits: Arc<Semaphore>,
    shared: Arc<Shared<F::Session>>,
    capacity: usize,
    created: AtomicUsize,
}

impl<F: SessionFactory> SessionPool<F> {
    /// Create a pool allowing `capacity` concurrent leases (at least one)
    pub fn new(factory: F, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            factory,
            permits: Arc::new(Semaphore::new(capacity)),
            shared: Arc::new(Shared {
                idle: Mutex::new(Vec::with_capacity(capacity)),
                closed: AtomicBool::new(false),
                leased: AtomicUsize::new(0),
            }),
            capacity,
            created: AtomicUsize::new(0),
        }
    }

    /// Lease a session, waiting while all of them are out
    ///
    /// An idle session is reused when available, otherwise a new one is created.
    /// If creation fails the slot is released again.
    pub async fn acquire(&self) -> Result<SessionLease<F::Session>, PoolError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        let idle = self.shared.idle().pop();
        let session = match idle {
            Some(session) => session,
            None => {
                let session = self
                    .factory
                    .create()
                    .await
                    .map_err(|e| PoolError::Launch(format!("{e:#}")))?;
                let total = self.created.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(sessions_created = total, "Created browser session");
                session
            }
        };

        let leased = self.shared.leased.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_sessions_leased(leased);

        Ok(SessionLease {
            session: Some(session),
            shared: Arc::clone(&self.shared),
            _permit: permit,
        })
    }

    /// Stop handing out sessions and close the idle ones
    ///
    /// Sessions still leased are dropped when their lease ends.
    pub async fn close(&self) {
        // Flag and drain under the idle lock so no lease returns a session in between
        let idle = {
            let mut guard = self.shared.idle();
            self.shared.closed.store(true, Ordering::SeqCst);
            std::mem::take(&mut *guard)
        };
        self.permits.close();

        let count = idle.len();
        for mut session in idle {
            session.close().await;
        }

        info!(closed_sessions = count, "Browser session pool closed");
    }

    /// Sessions currently leased
    pub fn leased(&self) -> usize {
        self.shared.leased.load(Ordering::SeqCst)
    }

    /// Sessions waiting in the idle stack
    pub fn idle(&self) -> usize {
        self.shared.idle().len()
    }

    /// Sessions created over the pool's lifetime
    pub fn sessions_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

/// RAII lease that returns the session to its pool on drop
pub struct SessionLease<S: BrowserSession> {
    session: Option<S>,
    shared: Arc<Shared<S>>,
    _permit: OwnedSemaphorePermit,
}

impl<S: BrowserSession> SessionLease<S> {
    /// Close the session instead of returning it to the pool
    ///
    /// The slot is released; the next lease creates a fresh session.
    pub async fn discard(mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
    }
}

impl<S: BrowserSession> Deref for SessionLease<S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.session.as_ref().expect("session should be present")
    }
}

impl<S: BrowserSession> DerefMut for SessionLease<S> {
    fn deref_mut(&mut self) -> &mut S {
        self.session.as_mut().expect("session should be present")
    }
}

impl<S: BrowserSession> Drop for SessionLease<S> {
    fn drop(&mut self) {
        // Runs before `_permit` is released, so a waiter always finds the session idle
        if let Some(session) = self.session.take() {
            let mut idle = self.shared.idle();
            if !self.shared.closed.load(Ordering::SeqCst) {
                idle.push(session);
            }
        }
        let leased = self.shared.leased.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_sessions_leased(leased);
    }
}
