//! Session state management.
//!
//! [`SessionStore`] owns the single current identity, mediates login,
//! registration, and logout against the backend, and revalidates the
//! persisted identity once at startup. Operations never panic and never leak
//! raw transport errors: they return a classified [`AuthError`] whose
//! `Display` form is the notification text.
//!
//! Concurrent auth attempts are not serialized; instead each attempt takes a
//! generation number and a response from a superseded attempt is discarded
//! without touching state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::instrument;

use bookstall_core::{Email, Role, UserId};

use crate::api::{ApiClient, UserProfile};
use crate::error::AuthError;
use crate::storage::{self, StateStorage, keys};

/// The authenticated user's profile as mirrored client-side.
///
/// The server is the authority; this is the snapshot it returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub id: UserId,
    pub username: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
}

impl From<UserProfile> for SessionIdentity {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: profile.id,
            username: profile.username,
            full_name: profile.full_name,
            email: profile.email,
            phone: profile.phone,
            // Legacy accounts come back without a role.
            role: profile.role.unwrap_or_default(),
        }
    }
}

/// Current session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Startup revalidation has not resolved yet; route guards defer.
    #[default]
    Loading,
    /// No identity.
    Unauthenticated,
    /// An identity is active.
    Authenticated(SessionIdentity),
}

impl SessionState {
    /// Whether an identity is active.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// The active identity, if any.
    #[must_use]
    pub const fn identity(&self) -> Option<&SessionIdentity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }
}

/// Persisted identity snapshot.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedIdentity {
    saved_at: DateTime<Utc>,
    identity: SessionIdentity,
}

/// The session store.
///
/// Constructed once per application instance. Wires itself into the API
/// client's session-expiry hook so a 401 on any call forces client-side
/// logout.
pub struct SessionStore {
    api: ApiClient,
    storage: Arc<dyn StateStorage>,
    tx: watch::Sender<SessionState>,
    generation: AtomicU64,
}

impl SessionStore {
    /// Create a session store. The initial state is [`SessionState::Loading`]
    /// until [`SessionStore::restore_session`] resolves it.
    pub fn new(api: ApiClient, storage: Arc<dyn StateStorage>) -> Arc<Self> {
        let (tx, _rx) = watch::channel(SessionState::Loading);
        let store = Arc::new(Self {
            api,
            storage,
            tx,
            generation: AtomicU64::new(0),
        });

        // Weak so the hook doesn't keep the store alive.
        let weak = Arc::downgrade(&store);
        store.api.set_session_expiry_hook(Box::new(move || {
            if let Some(store) = weak.upgrade() {
                store.force_logout();
            }
        }));

        store
    }

    /// Current session state snapshot.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    /// Subscribe to session state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Log in with username and password.
    ///
    /// On success the identity is persisted and the state transitions to
    /// `Authenticated`.
    ///
    /// # Errors
    ///
    /// Returns a classified [`AuthError`] whose `Display` form is the
    /// message to show the user. Never panics, never surfaces raw transport
    /// errors.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SessionIdentity, AuthError> {
        let generation = self.begin_attempt();
        let result = self.api.login(username, password).await;

        if self.is_stale(generation) {
            tracing::debug!("discarding stale login response");
            return Err(AuthError::Superseded);
        }

        let profile = result.map_err(AuthError::from_login)?;
        Ok(self.establish(profile))
    }

    /// Register a new account. The backend auto-authenticates on success, so
    /// semantics mirror [`SessionStore::login`].
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` before any network call if the
    /// email is structurally invalid, otherwise a classified [`AuthError`].
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        full_name: &str,
        phone: &str,
    ) -> Result<SessionIdentity, AuthError> {
        let email = Email::parse(email)?;

        let generation = self.begin_attempt();
        let result = self
            .api
            .register(username, email.as_str(), password, full_name, phone)
            .await;

        if self.is_stale(generation) {
            tracing::debug!("discarding stale register response");
            return Err(AuthError::Superseded);
        }

        let profile = result.map_err(AuthError::from_register)?;
        Ok(self.establish(profile))
    }

    /// Log out.
    ///
    /// The remote call is best-effort: its errors are logged, not surfaced.
    /// Persisted identity and the legacy token are cleared and the state
    /// transitions to `Unauthenticated` regardless of the remote outcome.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        // Invalidate any in-flight login/register first.
        self.begin_attempt();

        if let Err(e) = self.api.logout().await {
            tracing::warn!("remote logout failed: {e}");
        }

        self.discard_identity();
        self.tx.send_replace(SessionState::Unauthenticated);
    }

    /// Revalidate the persisted identity against the backend.
    ///
    /// Invoked once at startup. A persisted identity is confirmed with
    /// `GET /auth/me`; on success the refreshed profile is re-persisted, on
    /// failure the identity is discarded. Either way the `Loading` state
    /// resolves.
    #[instrument(skip(self))]
    pub async fn restore_session(&self) {
        let generation = self.begin_attempt();

        let persisted =
            storage::load_typed::<PersistedIdentity, _>(self.storage.as_ref(), keys::IDENTITY)
                .unwrap_or_else(|e| {
                    tracing::warn!("failed to read persisted identity: {e}");
                    None
                });

        if persisted.is_none() {
            self.tx.send_replace(SessionState::Unauthenticated);
            return;
        }

        match self.api.me().await {
            Ok(profile) => {
                if self.is_stale(generation) {
                    return;
                }
                self.establish(profile);
            }
            Err(e) => {
                tracing::info!("persisted session no longer valid: {e}");
                if self.is_stale(generation) {
                    return;
                }
                self.discard_identity();
                self.tx.send_replace(SessionState::Unauthenticated);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// Persist the profile and transition to `Authenticated`.
    fn establish(&self, profile: UserProfile) -> SessionIdentity {
        let identity = SessionIdentity::from(profile);
        self.persist(&identity);
        self.tx
            .send_replace(SessionState::Authenticated(identity.clone()));
        identity
    }

    /// Forced client-side logout on session expiry: no remote call, just
    /// discard local state.
    fn force_logout(&self) {
        self.begin_attempt();
        self.discard_identity();
        self.tx.send_replace(SessionState::Unauthenticated);
    }

    fn persist(&self, identity: &SessionIdentity) {
        let persisted = PersistedIdentity {
            saved_at: Utc::now(),
            identity: identity.clone(),
        };
        if let Err(e) = storage::save_typed(self.storage.as_ref(), keys::IDENTITY, &persisted) {
            tracing::warn!("failed to persist identity: {e}");
        }
    }

    fn discard_identity(&self) {
        for key in [keys::IDENTITY, keys::LEGACY_TOKEN] {
            if let Err(e) = self.storage.remove(key) {
                tracing::warn!("failed to clear persisted key {key}: {e}");
            }
        }
    }

    /// Start a new auth attempt, invalidating all in-flight ones.
    fn begin_attempt(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether a newer attempt started after `generation`.
    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn profile(role: Option<Role>) -> UserProfile {
        UserProfile {
            id: UserId::new(1),
            username: "reader".to_string(),
            full_name: Some("A Reader".to_string()),
            email: Some("reader@example.com".to_string()),
            phone: None,
            role,
        }
    }

    #[test]
    fn test_identity_defaults_missing_role_to_customer() {
        let identity = SessionIdentity::from(profile(None));
        assert_eq!(identity.role, Role::Customer);
    }

    #[test]
    fn test_identity_keeps_explicit_role() {
        let identity = SessionIdentity::from(profile(Some(Role::Staff)));
        assert_eq!(identity.role, Role::Staff);
    }

    #[test]
    fn test_state_accessors() {
        assert!(!SessionState::Loading.is_authenticated());
        assert!(!SessionState::Unauthenticated.is_authenticated());
        assert!(SessionState::Loading.identity().is_none());

        let state = SessionState::Authenticated(SessionIdentity::from(profile(None)));
        assert!(state.is_authenticated());
        assert_eq!(state.identity().unwrap().username, "reader");
    }
}
