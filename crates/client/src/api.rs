//! REST API client for the Bookstall backend.
//!
//! # Architecture
//!
//! - Session-cookie authentication: the backend sets a session cookie on
//!   login/register, and `reqwest`'s cookie store replays it on every call
//!   (the browser-era client did the same with `withCredentials`).
//! - Every call carries the configured timeout; there is no retry policy.
//! - Catalog reads are cached in-memory via `moka` (5 minute TTL).
//! - Any 401 outside the login call is classified as session expiry and
//!   fires a registered hook so the session store can force logout, no
//!   matter which call tripped it.
//!
//! # Example
//!
//! ```rust,ignore
//! use bookstall_client::{api::ApiClient, config::ClientConfig};
//!
//! let config = ClientConfig::from_env()?;
//! let api = ApiClient::new(&config)?;
//!
//! let profile = api.login("reader", "hunter2").await?;
//! let items = api.list_items().await?;
//! ```

use std::sync::{Arc, RwLock};
use std::time::Duration;

use moka::future::Cache;
use reqwest::{Response, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;
use url::Url;

use bookstall_core::{ItemId, Role, UserId};

use crate::config::ClientConfig;
use crate::error::ApiError;

/// How long catalog responses stay cached.
const CATALOG_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Hook invoked when a call is rejected with session expiry.
pub type SessionExpiryHook = Box<dyn Fn() + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

/// Identity profile returned by the auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Absent for legacy accounts; callers default it to customer.
    #[serde(default)]
    pub role: Option<Role>,
}

/// A catalog item as served by `GET /items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: ItemId,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Units in stock at the time of the read. A point-in-time snapshot,
    /// stale the moment it arrives; the backend re-validates at checkout.
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
    full_name: &'a str,
    phone: &'a str,
}

/// Which call a response belongs to, for 401 classification.
#[derive(Clone, Copy, PartialEq, Eq)]
enum CallOrigin {
    /// The login call: 401 means rejected credentials.
    Login,
    /// Everything else: 401 means the server-side session is gone.
    Session,
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// Client for the Bookstall REST backend.
///
/// Cheaply cloneable; all clones share the cookie jar, the catalog cache,
/// and the session-expiry hook.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: reqwest::Client,
    base_url: Url,
    list_cache: Cache<(), Arc<Vec<CatalogItem>>>,
    item_cache: Cache<i64, CatalogItem>,
    expiry_hook: RwLock<Option<SessionExpiryHook>>,
}

impl ApiClient {
    /// Create a new API client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Build` if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .cookie_store(true)
            .build()
            .map_err(ApiError::Build)?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                http,
                base_url: config.api_base_url.clone(),
                list_cache: Cache::builder().time_to_live(CATALOG_CACHE_TTL).build(),
                item_cache: Cache::builder().time_to_live(CATALOG_CACHE_TTL).build(),
                expiry_hook: RwLock::new(None),
            }),
        })
    }

    /// Register the hook fired when any call reports session expiry.
    ///
    /// Replaces any previously registered hook.
    pub fn set_session_expiry_hook(&self, hook: SessionExpiryHook) {
        if let Ok(mut guard) = self.inner.expiry_hook.write() {
            *guard = Some(hook);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Auth Endpoints
    // ─────────────────────────────────────────────────────────────────────────

    /// `POST /auth/login`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` for rejected credentials, or the
    /// classified transport/server error.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<UserProfile, ApiError> {
        let resp = self
            .post("auth/login")
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        self.decode(resp, CallOrigin::Login).await
    }

    /// `POST /auth/register`. The backend auto-authenticates on success.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` for duplicate username/email, or the
    /// classified transport/server error.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        full_name: &str,
        phone: &str,
    ) -> Result<UserProfile, ApiError> {
        let resp = self
            .post("auth/register")
            .json(&RegisterRequest {
                username,
                email,
                password,
                full_name,
                phone,
            })
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        self.decode(resp, CallOrigin::Session).await
    }

    /// `POST /auth/logout`.
    ///
    /// # Errors
    ///
    /// Returns the classified transport/server error. Callers treat logout
    /// as best-effort.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), ApiError> {
        let resp = self
            .post("auth/logout")
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(self.error_from_status(resp, CallOrigin::Session).await)
        }
    }

    /// `GET /auth/me` - revalidate the current session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::SessionExpired` when the session is invalid, or
    /// the classified transport/server error.
    #[instrument(skip(self))]
    pub async fn me(&self) -> Result<UserProfile, ApiError> {
        let resp = self
            .get("auth/me")
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        self.decode(resp, CallOrigin::Session).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Catalog Endpoints
    // ─────────────────────────────────────────────────────────────────────────

    /// `GET /items` - full catalog, cached.
    ///
    /// # Errors
    ///
    /// Returns the classified transport/server error.
    #[instrument(skip(self))]
    pub async fn list_items(&self) -> Result<Arc<Vec<CatalogItem>>, ApiError> {
        if let Some(items) = self.inner.list_cache.get(&()).await {
            return Ok(items);
        }

        let resp = self
            .get("items")
            .send()
            .await
            .map_err(ApiError::from_transport)?;
        let items: Vec<CatalogItem> = self.decode(resp, CallOrigin::Session).await?;
        let items = Arc::new(items);

        self.inner.list_cache.insert((), Arc::clone(&items)).await;
        Ok(items)
    }

    /// `GET /items/{id}` - single item, cached. Used for the stock/price
    /// snapshot when adding to the cart.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for an unknown id, or the classified
    /// transport/server error.
    #[instrument(skip(self))]
    pub async fn get_item(&self, id: ItemId) -> Result<CatalogItem, ApiError> {
        if let Some(item) = self.inner.item_cache.get(&id.as_i64()).await {
            return Ok(item);
        }

        let resp = self
            .get(&format!("items/{id}"))
            .send()
            .await
            .map_err(ApiError::from_transport)?;
        let item: CatalogItem = self.decode(resp, CallOrigin::Session).await?;

        self.inner.item_cache.insert(id.as_i64(), item.clone()).await;
        Ok(item)
    }

    /// Drop cached catalog responses.
    pub fn invalidate_catalog_cache(&self) {
        self.inner.list_cache.invalidate_all();
        self.inner.item_cache.invalidate_all();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn endpoint(&self, path: &str) -> Url {
        // Paths here are compile-time relative segments; join only fails on
        // malformed input.
        self.inner
            .base_url
            .join(path)
            .unwrap_or_else(|_| self.inner.base_url.clone())
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.inner.http.get(self.endpoint(path))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.inner.http.post(self.endpoint(path))
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        &self,
        resp: Response,
        origin: CallOrigin,
    ) -> Result<T, ApiError> {
        if resp.status().is_success() {
            resp.json::<T>().await.map_err(ApiError::from_transport)
        } else {
            Err(self.error_from_status(resp, origin).await)
        }
    }

    async fn error_from_status(&self, resp: Response, origin: CallOrigin) -> ApiError {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            if origin == CallOrigin::Login {
                return ApiError::Unauthorized;
            }
            self.fire_session_expired();
            return ApiError::SessionExpired;
        }

        match status.as_u16() {
            400 => ApiError::Validation {
                message: extract_message(resp).await,
            },
            404 => ApiError::NotFound,
            500..=599 => ApiError::Server {
                status: status.as_u16(),
            },
            s => ApiError::Unexpected { status: s },
        }
    }

    fn fire_session_expired(&self) {
        tracing::warn!("session expired, forcing client-side logout");
        if let Ok(guard) = self.inner.expiry_hook.read()
            && let Some(hook) = guard.as_ref()
        {
            hook();
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// The backend answers with either a bare string or `{"message": "..."}`.
async fn extract_message(resp: Response) -> Option<String> {
    let text = resp.text().await.ok()?;
    if text.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::String(s)) => Some(s),
        Ok(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => Some(text),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_decodes_legacy_role() {
        let profile: UserProfile = serde_json::from_str(
            r#"{"id": 3, "username": "reader", "fullName": "A Reader", "role": "USER"}"#,
        )
        .unwrap();

        assert_eq!(profile.role, Some(Role::Customer));
        assert_eq!(profile.full_name.as_deref(), Some("A Reader"));
        assert_eq!(profile.email, None);
    }

    #[test]
    fn test_profile_decodes_missing_role() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"id": 3, "username": "reader"}"#).unwrap();
        assert_eq!(profile.role, None);
    }

    #[test]
    fn test_catalog_item_decodes_numeric_price() {
        let item: CatalogItem = serde_json::from_str(
            r#"{"id": 1, "name": "Dune", "price": 10.50, "stock": 5, "imageUrl": "/img/dune.jpg"}"#,
        )
        .unwrap();

        assert_eq!(item.price, Decimal::new(1050, 2));
        assert_eq!(item.stock, Some(5));
        assert_eq!(item.image_url.as_deref(), Some("/img/dune.jpg"));
    }
}
