//! Bookstall Core - Shared types library.
//!
//! This crate provides common types used across all Bookstall components:
//! - `client` - Cart and session state management plus the REST API client
//! - `integration-tests` - End-to-end tests against a mock backend
//!
//! # Architecture
//!
//! The core crate contains only types and helpers - no I/O, no HTTP clients,
//! no storage. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, emails, roles, and money

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
