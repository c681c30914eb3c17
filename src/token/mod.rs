mod keyset;
mod validator;

pub mod config;

use thiserror::Error;

pub use keyset::{HttpKeySource, KeySource, RemoteKeySet};
pub use validator::{AppTokenClaims, AppTokenValidator, Audience};

/// Reasons an application token could not be checked. The validator entry
/// points collapse all of these into "invalid"; they only surface in logs.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(#[from] jsonwebtoken::errors::Error),

    #[error("no key found for key id '{0}'")]
    KeyNotFound(String),

    #[error("key '{0}' is not an RSA key")]
    NotRsaKey(String),

    #[error("fetch key set: {0}")]
    KeyDiscovery(#[from] reqwest::Error),

    #[error("token has no '{0}' claim")]
    MissingClaim(&'static str),
}
