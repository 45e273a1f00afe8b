//! Route access policy.
//!
//! The routing chrome is rendering territory, but the decision of who may
//! enter a destination lives here so it can be tested without a UI. Staff
//! counts as admin-equivalent for access (not for display); see
//! [`Role::grants`].

use bookstall_core::Role;

use crate::session::SessionState;

/// Outcome of an access check for a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Let the visitor through.
    Granted,
    /// Startup revalidation has not resolved; defer the decision.
    Pending,
    /// Not authenticated; send to the login destination.
    RedirectToLogin,
    /// Authenticated but lacking the required role; send home.
    RedirectToHome,
}

/// Evaluate access to a destination.
///
/// `required` of `None` means the destination only needs an authenticated
/// session; `Some(role)` additionally requires the identity's role to
/// satisfy it.
#[must_use]
pub fn evaluate(state: &SessionState, required: Option<Role>) -> Access {
    let identity = match state {
        SessionState::Loading => return Access::Pending,
        SessionState::Unauthenticated => return Access::RedirectToLogin,
        SessionState::Authenticated(identity) => identity,
    };

    match required {
        Some(role) if !identity.role.grants(role) => Access::RedirectToHome,
        _ => Access::Granted,
    }
}
