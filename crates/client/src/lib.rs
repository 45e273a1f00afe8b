//! Bookstall client library.
//!
//! This crate owns the client-resident state of the Bookstall storefront:
//! the shopping cart, the authentication session, and the REST client both
//! consume. Rendering, routing chrome, and the backend itself live elsewhere;
//! views subscribe to the stores here and call their operations.
//!
//! # Architecture
//!
//! - [`CartStore`](cart::CartStore) holds the authoritative cart, persists a
//!   snapshot on every mutation, and broadcasts changes over a watch channel.
//! - [`SessionStore`](session::SessionStore) owns the single current identity,
//!   mediates login/registration/logout against the backend, and revalidates
//!   the persisted identity at startup.
//! - [`ApiClient`](api::ApiClient) wraps the REST backend with a bounded
//!   timeout, a cookie-based session, and a catalog cache.
//!
//! Stores are explicit objects constructed once per application instance and
//! injected into consumers; there is no ambient global state.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod guard;
pub mod session;
pub mod storage;
