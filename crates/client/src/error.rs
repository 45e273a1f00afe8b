//! Error taxonomy for remote calls and session operations.
//!
//! [`ApiError`] classifies transport and HTTP failures the way the backend
//! contract defines them. [`AuthError`] is the session-facing view: every
//! variant renders as the human-readable message a view should display, so
//! session operations return a tagged result instead of surfacing raw
//! transport errors.

use thiserror::Error;

use bookstall_core::EmailError;

/// Errors from the REST API client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP client itself could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// Connection refused, DNS failure, or request timeout. Classified
    /// distinctly from HTTP error responses.
    #[error("Unable to connect to server. Please check if the backend is running.")]
    Unreachable(#[source] reqwest::Error),

    /// 401 on the login call itself: the credentials were rejected.
    #[error("invalid credentials")]
    Unauthorized,

    /// 401 on any authenticated call other than login: the server-side
    /// session is gone. Detected globally and forces client-side logout.
    #[error("Session expired. Please login again.")]
    SessionExpired,

    /// 400 with an optional server-provided message.
    #[error("{}", .message.as_deref().unwrap_or("Bad request. Please check your input."))]
    Validation {
        /// Message extracted from the response body, if any.
        message: Option<String>,
    },

    /// Resource not found.
    #[error("Resource not found.")]
    NotFound,

    /// Any 5xx response.
    #[error("Server error. Please try again later.")]
    Server { status: u16 },

    /// Response status outside the contract.
    #[error("unexpected response status {status}")]
    Unexpected { status: u16 },

    /// Response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(#[source] reqwest::Error),
}

impl ApiError {
    /// Classify a transport-level `reqwest` error.
    #[must_use]
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err)
        } else {
            // Connect failures, timeouts, and request build errors all read
            // as "backend unreachable" to the user.
            Self::Unreachable(err)
        }
    }
}

/// Errors returned by session operations (login, register, logout, restore).
///
/// The `Display` form is the notification text for the user.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Login rejected with 401.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Registration rejected with 400. Carries the server message when one
    /// was provided.
    #[error("{0}")]
    Rejected(String),

    /// Backend unreachable.
    #[error("Unable to connect to server. Please check if the backend is running.")]
    Unreachable,

    /// Backend returned a 5xx.
    #[error("Server error. Please try again later.")]
    ServerFault,

    /// Email failed structural validation before any network call.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// A newer auth attempt started while this one was in flight; its
    /// response was discarded without touching session state.
    #[error("Superseded by a newer sign-in attempt")]
    Superseded,

    /// Anything the taxonomy does not name.
    #[error("{context} failed. Please try again.")]
    Other {
        /// Operation that failed ("Login" or "Registration").
        context: &'static str,
    },
}

impl AuthError {
    /// Classify an [`ApiError`] from the login endpoint.
    #[must_use]
    pub(crate) fn from_login(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized | ApiError::SessionExpired => Self::InvalidCredentials,
            ApiError::Unreachable(_) => Self::Unreachable,
            ApiError::Server { .. } => Self::ServerFault,
            _ => Self::Other { context: "Login" },
        }
    }

    /// Classify an [`ApiError`] from the registration endpoint.
    #[must_use]
    pub(crate) fn from_register(err: ApiError) -> Self {
        match err {
            ApiError::Validation { message } => Self::Rejected(
                message.unwrap_or_else(|| "Username or email already exists".to_string()),
            ),
            ApiError::Unreachable(_) => Self::Unreachable,
            ApiError::Server { .. } => Self::ServerFault,
            _ => Self::Other {
                context: "Registration",
            },
        }
    }
}
