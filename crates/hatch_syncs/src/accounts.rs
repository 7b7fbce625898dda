//! Account registration and login.

use hatch_concepts::PasswordAuthentication;
use hatch_engine::SyncRule;

use crate::common::{forward, respond_error, respond_with};

/// Plain registration path.
pub const REGISTER: &str = "/PasswordAuthentication/register";
/// Plain login path.
pub const AUTHENTICATE: &str = "/PasswordAuthentication/authenticate";

/// Account rules.
#[must_use]
pub fn rules() -> Vec<SyncRule> {
    let credentials = &["username", "password"];
    vec![
        forward(
            "RegisterPlainRequest",
            REGISTER,
            PasswordAuthentication::REGISTER,
            credentials,
        ),
        respond_error("RegisterPlainError", REGISTER, PasswordAuthentication::REGISTER),
        respond_with(
            "RegisterPlainResponse",
            REGISTER,
            PasswordAuthentication::REGISTER,
            &[("user", "user")],
        ),
        forward(
            "AuthenticatePlainRequest",
            AUTHENTICATE,
            PasswordAuthentication::AUTHENTICATE,
            credentials,
        ),
        respond_error(
            "AuthenticatePlainError",
            AUTHENTICATE,
            PasswordAuthentication::AUTHENTICATE,
        ),
        respond_with(
            "AuthenticatePlainResponse",
            AUTHENTICATE,
            PasswordAuthentication::AUTHENTICATE,
            &[("user", "user")],
        ),
    ]
}
