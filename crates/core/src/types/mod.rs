//! Core types for Bookstall.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod role;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{TAX_RATE, line_total, round_to_cents, tax_on};
pub use role::Role;
