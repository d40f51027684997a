//! Per-browser-session state.

use parking_lot::Mutex;
use polars::prelude::DataFrame;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

use crate::chart::ChartSpec;
use crate::source::TableLoader;
use crate::view::ViewStateController;

/// Sessions untouched for this long are dropped when a new session is created.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// What one browser tab has loaded and last displayed.
pub struct Session {
    pub controller: ViewStateController,
    /// Rows after filter and sort; export source
    pub displayed: Option<DataFrame>,
    pub charts: Vec<ChartSpec>,
    last_access: Instant,
}

impl Session {
    fn new(loader: Arc<dyn TableLoader>) -> Self {
        Self {
            controller: ViewStateController::new(loader),
            displayed: None,
            charts: Vec::new(),
            last_access: Instant::now(),
        }
    }

    /// Name of the loaded file, if any.
    pub fn filename(&self) -> Option<&str> {
        self.controller.identity().map(|i| i.filename.as_str())
    }
}

/// Sessions by id. Each session sits behind its own lock so requests for different
/// sessions never wait on each other beyond the map lookup.
pub struct SessionStore {
    loader: Arc<dyn TableLoader>,
    idle_timeout: Duration,
    sessions: Mutex<HashMap<Uuid, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new(loader: Arc<dyn TableLoader>) -> Self {
        Self::with_idle_timeout(loader, SESSION_IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(loader: Arc<dyn TableLoader>, idle_timeout: Duration) -> Self {
        Self {
            loader,
            idle_timeout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new session, first dropping the ones idle past the timeout.
    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        // A session busy on another request is in use, so it is kept
        sessions.retain(|_, session| match session.try_lock() {
            Some(guard) => guard.last_access.elapsed() < self.idle_timeout,
            None => true,
        });
        if sessions.len() < before {
            debug!("evicted {} idle session(s)", before - sessions.len());
        }
        sessions.insert(id, Arc::new(Mutex::new(Session::new(self.loader.clone()))));
        id
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.sessions.lock().contains_key(id)
    }

    /// Run `f` on the session `id`. `None` when the id was never issued or has expired.
    pub fn with_session<R>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let session = self.sessions.lock().get(&id).cloned()?;
        let mut guard = session.lock();
        guard.last_access = Instant::now();
        Some(f(&mut guard))
    }
}
