//! Integration test support for Bookstall.
//!
//! Provides [`MockBackend`], an in-process axum server speaking the same
//! REST contract as the real backend: session-cookie auth endpoints plus a
//! small item catalog. Tests point an `ApiClient` at it and drive the client
//! stores end to end.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bookstall-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc, clippy::expect_used)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use bookstall_client::api::ApiClient;
use bookstall_client::config::ClientConfig;

/// A registered account on the mock backend.
#[derive(Clone)]
struct StoredUser {
    password: String,
    profile: Value,
}

struct BackendState {
    users: Mutex<HashMap<String, StoredUser>>,
    /// Live session tokens mapped to usernames.
    sessions: Mutex<HashMap<String, String>>,
    items: Mutex<Vec<Value>>,
    next_token: AtomicU64,
    fail_logout: AtomicBool,
    /// Artificial delay applied to login responses, in milliseconds.
    login_delay_ms: AtomicU64,
}

/// In-process mock of the Bookstall REST backend.
pub struct MockBackend {
    addr: SocketAddr,
    state: Arc<BackendState>,
}

/// Install a test-writer tracing subscriber honoring `RUST_LOG`. Safe to
/// call from every test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl MockBackend {
    /// Start the backend on an ephemeral local port.
    pub async fn start() -> Self {
        init_tracing();

        let state = Arc::new(BackendState {
            users: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            items: Mutex::new(default_items()),
            next_token: AtomicU64::new(1),
            fail_logout: AtomicBool::new(false),
            login_delay_ms: AtomicU64::new(0),
        });

        let app = Router::new()
            .route("/api/v1/auth/login", post(login))
            .route("/api/v1/auth/register", post(register))
            .route("/api/v1/auth/logout", post(logout))
            .route("/api/v1/auth/me", get(me))
            .route("/api/v1/items", get(list_items))
            .route("/api/v1/items/{id}", get(get_item))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().expect("mock backend addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve mock backend");
        });

        Self { addr, state }
    }

    /// Base URL for `ClientConfig`.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}/api/v1", self.addr)
    }

    /// Build an `ApiClient` pointed at this backend.
    #[must_use]
    pub fn api_client(&self) -> ApiClient {
        let config = ClientConfig::with_base_url(&self.base_url()).expect("mock backend url");
        ApiClient::new(&config).expect("build api client")
    }

    /// Seed an account. `role` uses the wire form (`"ADMIN"`, `"STAFF"`,
    /// `"CUSTOMER"`, or legacy `"USER"`); `None` omits the field entirely.
    pub fn add_user(&self, username: &str, password: &str, role: Option<&str>) {
        let mut profile = json!({
            "id": 1 + self.state.users.lock().unwrap().len() as i64,
            "username": username,
            "fullName": format!("{username} Fullname"),
            "email": format!("{username}@example.com"),
            "phone": "0771234567",
        });
        if let Some(role) = role {
            profile["role"] = json!(role);
        }

        self.state.users.lock().unwrap().insert(
            username.to_string(),
            StoredUser {
                password: password.to_string(),
                profile,
            },
        );
    }

    /// Invalidate every live server-side session, as an expiry would.
    pub fn expire_sessions(&self) {
        self.state.sessions.lock().unwrap().clear();
    }

    /// Make `POST /auth/logout` answer 500.
    pub fn set_fail_logout(&self, fail: bool) {
        self.state.fail_logout.store(fail, Ordering::SeqCst);
    }

    /// Delay every login response, for racing a slow login against other
    /// session operations.
    pub fn set_login_delay(&self, delay: std::time::Duration) {
        self.state
            .login_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of live sessions.
    #[must_use]
    pub fn live_sessions(&self) -> usize {
        self.state.sessions.lock().unwrap().len()
    }
}

fn default_items() -> Vec<Value> {
    vec![
        json!({
            "id": 1,
            "name": "Dune",
            "description": "Science fiction classic",
            "price": 10.0,
            "stock": 5,
            "imageUrl": "/images/dune.jpg",
            "category": "Fiction",
        }),
        json!({
            "id": 2,
            "name": "Emma",
            "price": 5.0,
            "stock": 10,
            "category": "Fiction",
        }),
        json!({
            "id": 3,
            "name": "Sold Out Almanac",
            "price": 3.5,
            "stock": 0,
        }),
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

type Shared = Arc<BackendState>;

fn issue_session(state: &Shared, username: &str) -> String {
    let token = format!("sess-{}", state.next_token.fetch_add(1, Ordering::SeqCst));
    state
        .sessions
        .lock()
        .unwrap()
        .insert(token.clone(), username.to_string());
    token
}

fn session_user(state: &Shared, headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    let token = cookies.split(';').find_map(|c| {
        let (name, value) = c.trim().split_once('=')?;
        (name == "SESSION").then(|| value.to_string())
    })?;
    state.sessions.lock().unwrap().get(&token).cloned()
}

fn with_session_cookie(token: &str, body: Value) -> Response {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, format!("SESSION={token}; Path=/"))],
        Json(body),
    )
        .into_response()
}

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let delay = state.login_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
    }

    let username = body["username"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default();

    let user = state.users.lock().unwrap().get(&username).cloned();
    match user {
        Some(user) if user.password == password => {
            let token = issue_session(&state, &username);
            with_session_cookie(&token, user.profile)
        }
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let username = body["username"].as_str().unwrap_or_default().to_string();
    if username.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({"message": "Username is required"})))
            .into_response();
    }

    {
        let users = state.users.lock().unwrap();
        if users.contains_key(&username) {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"message": "Username or email already exists"})),
            )
                .into_response();
        }
    }

    let profile = json!({
        "id": 100,
        "username": username,
        "fullName": body["fullName"],
        "email": body["email"],
        "phone": body["phone"],
        "role": "CUSTOMER",
    });
    state.users.lock().unwrap().insert(
        username.clone(),
        StoredUser {
            password: body["password"].as_str().unwrap_or_default().to_string(),
            profile: profile.clone(),
        },
    );

    let token = issue_session(&state, &username);
    with_session_cookie(&token, profile)
}

async fn logout(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if state.fail_logout.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    if let Some(cookies) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
        let mut sessions = state.sessions.lock().unwrap();
        for cookie in cookies.split(';') {
            if let Some(("SESSION", token)) = cookie.trim().split_once('=') {
                sessions.remove(token);
            }
        }
    }
    StatusCode::OK.into_response()
}

async fn me(State(state): State<Shared>, headers: HeaderMap) -> Response {
    match session_user(&state, &headers) {
        Some(username) => {
            let user = state.users.lock().unwrap().get(&username).cloned();
            user.map_or_else(
                || StatusCode::UNAUTHORIZED.into_response(),
                |u| Json(u.profile).into_response(),
            )
        }
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn list_items(State(state): State<Shared>) -> Response {
    Json(state.items.lock().unwrap().clone()).into_response()
}

async fn get_item(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    let item = state
        .items
        .lock()
        .unwrap()
        .iter()
        .find(|i| i["id"].as_i64() == Some(id))
        .cloned();
    item.map_or_else(
        || StatusCode::NOT_FOUND.into_response(),
        |i| Json(i).into_response(),
    )
}
