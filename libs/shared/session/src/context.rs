use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use shared_models::auth::{Session, UserProfile};

use crate::store::{
    CredentialStore, MemoryCredentialStore, StoreError, TOKEN_EXPIRY_KEY, TOKEN_KEY, USER_KEY,
};

/// Process-wide session state shared by the gateway, the session manager and the wizard.
///
/// Every `authenticate` and `destroy` moves the epoch forward. Work that started
/// under an older epoch (a renewal in flight when the user logged out) can check
/// it with [`SessionContext::renew_if_current`] and is refused.
pub struct SessionContext {
    store: Arc<dyn CredentialStore>,
    current: RwLock<Option<Session>>,
    epoch: AtomicU64,
    destroy_hooks: Mutex<Vec<DestroyHook>>,
}

type DestroyHook = Box<dyn Fn() + Send + Sync>;

impl SessionContext {
    /// Restore whatever session the store holds. An expired or incomplete one is discarded.
    pub fn init(store: Arc<dyn CredentialStore>) -> Self {
        let restored = Self::restore(store.as_ref());

        let context = Self {
            store,
            current: RwLock::new(None),
            epoch: AtomicU64::new(0),
            destroy_hooks: Mutex::new(Vec::new()),
        };

        match restored {
            Some(session) if session.is_valid() => {
                info!("Restored session for user {}", session.user.id);
                *context.write() = Some(session);
            }
            Some(_) => {
                info!("Persisted session has expired, clearing it");
                context.clear_persisted();
            }
            None => debug!("No persisted session found"),
        }

        context
    }

    pub fn in_memory() -> Self {
        Self::init(Arc::new(MemoryCredentialStore::new()))
    }

    fn restore(store: &dyn CredentialStore) -> Option<Session> {
        let token = store.get(TOKEN_KEY).filter(|t| !t.is_empty())?;

        let user = match store.get(USER_KEY).map(|raw| serde_json::from_str::<UserProfile>(&raw)) {
            Some(Ok(user)) => user,
            Some(Err(e)) => {
                warn!("Persisted user is unreadable: {}", e);
                return None;
            }
            None => return None,
        };

        let expires_at = store
            .get(TOKEN_EXPIRY_KEY)
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc))?;

        Some(Session { token, expires_at, user })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Session>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<Session>> {
        self.current.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Install a freshly issued session and persist it. Returns the new epoch.
    pub fn authenticate(&self, session: Session) -> Result<u64, StoreError> {
        let user_json = serde_json::to_string(&session.user)?;
        self.store.set(TOKEN_KEY, &session.token)?;
        self.store.set(USER_KEY, &user_json)?;
        self.store.set(TOKEN_EXPIRY_KEY, &session.expires_at.to_rfc3339())?;

        info!("Session authenticated for user {}", session.user.id);
        let mut current = self.write();
        *current = Some(session);
        Ok(self.epoch.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Swap in a renewed credential. Returns false when there is no session to renew.
    pub fn renew(&self, token: &str, expires_at: DateTime<Utc>) -> bool {
        let mut current = self.write();
        let Some(session) = current.as_mut() else {
            debug!("Renewal ignored: no active session");
            return false;
        };

        session.token = token.to_string();
        session.expires_at = expires_at;

        if let Err(e) = self
            .store
            .set(TOKEN_KEY, token)
            .and_then(|_| self.store.set(TOKEN_EXPIRY_KEY, &expires_at.to_rfc3339()))
        {
            warn!("Failed to persist renewed token: {}", e);
        }

        debug!("Session renewed, now expires at {}", expires_at);
        true
    }

    /// Renew only if no login or logout happened since `epoch` was observed.
    pub fn renew_if_current(&self, epoch: u64, token: &str, expires_at: DateTime<Utc>) -> bool {
        if self.epoch() != epoch {
            warn!("Discarding renewal result from a superseded session");
            return false;
        }
        self.renew(token, expires_at)
    }

    /// Run `hook` after every `destroy` that cleared a session, whoever triggered it.
    pub fn on_destroy(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.destroy_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(hook));
    }

    /// Clear the session and its persisted keys. Idempotent and infallible.
    pub fn destroy(&self) {
        let had_session = self.write().take().is_some();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.clear_persisted();

        if had_session {
            info!("Session destroyed");
            let hooks = self.destroy_hooks.lock().unwrap_or_else(PoisonError::into_inner);
            for hook in hooks.iter() {
                hook();
            }
        }
    }

    fn clear_persisted(&self) {
        for key in [TOKEN_KEY, USER_KEY, TOKEN_EXPIRY_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!("Failed to clear persisted {}: {}", key, e);
            }
        }
    }

    pub fn update_user(&self, user: UserProfile) -> Result<(), StoreError> {
        let user_json = serde_json::to_string(&user)?;
        let mut current = self.write();
        if let Some(session) = current.as_mut() {
            self.store.set(USER_KEY, &user_json)?;
            session.user = user;
        }
        Ok(())
    }

    pub fn current(&self) -> Option<Session> {
        self.read().clone()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.read().as_ref().map(|s| s.user.clone())
    }

    /// Token to present as a bearer credential, if one is held.
    pub fn bearer_token(&self) -> Option<String> {
        self.read()
            .as_ref()
            .map(|s| s.token.clone())
            .filter(|t| !t.is_empty())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.read().as_ref().map(|s| s.expires_at)
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().as_ref().map(Session::is_valid).unwrap_or(false)
    }
}
