//! End-to-end session lifecycle tests against the mock backend.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use bookstall_client::error::AuthError;
use bookstall_client::session::{SessionState, SessionStore};
use bookstall_client::storage::{MemoryStorage, StateStorage, keys};
use bookstall_core::Role;
use bookstall_integration_tests::MockBackend;

#[tokio::test]
async fn login_success_authenticates_and_persists() {
    let backend = MockBackend::start().await;
    backend.add_user("reader", "hunter2", Some("CUSTOMER"));

    let storage = Arc::new(MemoryStorage::new());
    let store = SessionStore::new(backend.api_client(), Arc::clone(&storage) as Arc<dyn StateStorage>);
    store.restore_session().await;

    let identity = store.login("reader", "hunter2").await.unwrap();
    assert_eq!(identity.username, "reader");
    assert_eq!(identity.role, Role::Customer);

    assert_eq!(
        store.state(),
        SessionState::Authenticated(identity.clone())
    );
    assert!(storage.load(keys::IDENTITY).unwrap().is_some());
}

#[tokio::test]
async fn login_rejected_credentials_reports_message() {
    let backend = MockBackend::start().await;
    backend.add_user("reader", "hunter2", None);

    let store = SessionStore::new(backend.api_client(), Arc::new(MemoryStorage::new()));
    store.restore_session().await;

    let err = store.login("reader", "wrongpass").await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid username or password");
    assert_eq!(store.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn login_unreachable_backend_reports_connection_message() {
    // Nothing listens on this port.
    let config =
        bookstall_client::config::ClientConfig::with_base_url("http://127.0.0.1:1/api/v1")
            .unwrap();
    let api = bookstall_client::api::ApiClient::new(&config).unwrap();
    let store = SessionStore::new(api, Arc::new(MemoryStorage::new()));

    let err = store.login("reader", "hunter2").await.unwrap_err();
    assert!(matches!(err, AuthError::Unreachable));
    assert_eq!(
        err.to_string(),
        "Unable to connect to server. Please check if the backend is running."
    );
}

#[tokio::test]
async fn legacy_role_defaults_to_customer() {
    let backend = MockBackend::start().await;
    backend.add_user("oldtimer", "pw", Some("USER"));

    let store = SessionStore::new(backend.api_client(), Arc::new(MemoryStorage::new()));
    let identity = store.login("oldtimer", "pw").await.unwrap();
    assert_eq!(identity.role, Role::Customer);
}

#[tokio::test]
async fn register_auto_authenticates() {
    let backend = MockBackend::start().await;

    let store = SessionStore::new(backend.api_client(), Arc::new(MemoryStorage::new()));
    store.restore_session().await;

    let identity = store
        .register("newreader", "new@example.com", "pw", "New Reader", "0770000000")
        .await
        .unwrap();

    assert_eq!(identity.username, "newreader");
    assert!(store.state().is_authenticated());
}

#[tokio::test]
async fn register_duplicate_surfaces_server_message() {
    let backend = MockBackend::start().await;
    backend.add_user("reader", "hunter2", None);

    let store = SessionStore::new(backend.api_client(), Arc::new(MemoryStorage::new()));
    let err = store
        .register("reader", "reader@example.com", "pw", "Reader", "077")
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Username or email already exists");
    assert!(!store.state().is_authenticated());
}

#[tokio::test]
async fn register_invalid_email_fails_before_network() {
    let backend = MockBackend::start().await;
    let store = SessionStore::new(backend.api_client(), Arc::new(MemoryStorage::new()));

    let err = store
        .register("reader", "not-an-email", "pw", "Reader", "077")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidEmail(_)));
}

#[tokio::test]
async fn logout_clears_state_even_when_remote_fails() {
    let backend = MockBackend::start().await;
    backend.add_user("reader", "hunter2", None);

    let storage = Arc::new(MemoryStorage::new());
    let store = SessionStore::new(backend.api_client(), Arc::clone(&storage) as Arc<dyn StateStorage>);
    store.login("reader", "hunter2").await.unwrap();

    backend.set_fail_logout(true);
    store.logout().await;

    assert_eq!(store.state(), SessionState::Unauthenticated);
    assert!(storage.load(keys::IDENTITY).unwrap().is_none());
    assert!(storage.load(keys::LEGACY_TOKEN).unwrap().is_none());
}

#[tokio::test]
async fn restore_session_with_live_backend_session() {
    let backend = MockBackend::start().await;
    backend.add_user("reader", "hunter2", Some("STAFF"));

    let api = backend.api_client();
    let storage = Arc::new(MemoryStorage::new());

    // First run: log in, which persists the identity and sets the cookie.
    let first = SessionStore::new(api.clone(), Arc::clone(&storage) as Arc<dyn StateStorage>);
    first.login("reader", "hunter2").await.unwrap();
    drop(first);

    // Second run: restore from storage and revalidate.
    let second = SessionStore::new(api, Arc::clone(&storage) as Arc<dyn StateStorage>);
    assert_eq!(second.state(), SessionState::Loading);

    second.restore_session().await;
    let state = second.state();
    assert_eq!(state.identity().unwrap().role, Role::Staff);
}

#[tokio::test]
async fn restore_session_discards_expired_identity() {
    let backend = MockBackend::start().await;
    backend.add_user("reader", "hunter2", None);

    let api = backend.api_client();
    let storage = Arc::new(MemoryStorage::new());

    let first = SessionStore::new(api.clone(), Arc::clone(&storage) as Arc<dyn StateStorage>);
    first.login("reader", "hunter2").await.unwrap();
    drop(first);

    // Server-side session disappears between runs.
    backend.expire_sessions();

    let second = SessionStore::new(api, Arc::clone(&storage) as Arc<dyn StateStorage>);
    second.restore_session().await;

    assert_eq!(second.state(), SessionState::Unauthenticated);
    assert!(storage.load(keys::IDENTITY).unwrap().is_none());
}

#[tokio::test]
async fn restore_session_without_persisted_identity_resolves_loading() {
    let backend = MockBackend::start().await;
    let store = SessionStore::new(backend.api_client(), Arc::new(MemoryStorage::new()));

    assert_eq!(store.state(), SessionState::Loading);
    store.restore_session().await;
    assert_eq!(store.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn session_expiry_on_any_call_forces_logout() {
    let backend = MockBackend::start().await;
    backend.add_user("reader", "hunter2", None);

    let api = backend.api_client();
    let storage = Arc::new(MemoryStorage::new());
    let store = SessionStore::new(api.clone(), Arc::clone(&storage) as Arc<dyn StateStorage>);
    store.login("reader", "hunter2").await.unwrap();

    // The session dies server-side; the next authenticated call trips the
    // global 401 classification and the hook forces client-side logout.
    backend.expire_sessions();
    let err = api.me().await.unwrap_err();
    assert!(matches!(
        err,
        bookstall_client::error::ApiError::SessionExpired
    ));

    assert_eq!(store.state(), SessionState::Unauthenticated);
    assert!(storage.load(keys::IDENTITY).unwrap().is_none());
}

#[tokio::test]
async fn stale_login_response_is_discarded() {
    let backend = MockBackend::start().await;
    backend.add_user("reader", "hunter2", None);
    backend.set_login_delay(std::time::Duration::from_millis(200));

    let storage = Arc::new(MemoryStorage::new());
    let store = SessionStore::new(backend.api_client(), Arc::clone(&storage) as Arc<dyn StateStorage>);
    store.restore_session().await;

    // Start a slow login, then log out while it is still in flight. The
    // late login response must be discarded rather than re-authenticating.
    let slow = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.login("reader", "hunter2").await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    store.logout().await;

    let result = slow.await.unwrap();
    assert!(matches!(result, Err(AuthError::Superseded)));
    assert_eq!(store.state(), SessionState::Unauthenticated);
    assert!(storage.load(keys::IDENTITY).unwrap().is_none());
}

#[tokio::test]
async fn remote_logout_terminates_server_session() {
    let backend = MockBackend::start().await;
    backend.add_user("reader", "hunter2", None);

    let store = SessionStore::new(backend.api_client(), Arc::new(MemoryStorage::new()));
    store.login("reader", "hunter2").await.unwrap();
    assert_eq!(backend.live_sessions(), 1);

    store.logout().await;
    assert_eq!(backend.live_sessions(), 0);
}
