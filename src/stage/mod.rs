mod app_token;
mod cors;
mod identity;
mod mappable;
mod permissions;
mod role;
pub mod transaction;
mod union;

pub mod chain;
pub mod config;
pub mod factory;

use actix_web::http::StatusCode;
use anyhow::Result;
use async_trait::async_trait;

use crate::request::{GuardRequest, RequestContext};

pub use app_token::AppTokenStage;
pub use cors::{CorsStage, PREFLIGHT_HEADERS};
pub use identity::{InternalUserStage, UserAuthenticationStage};
pub use mappable::PermissionStage;
pub use permissions::TokenPermissionsStage;
pub use role::RoleStage;
pub use transaction::{ClosedTransactionStage, OpenTransactionStage, TransactionStage};
pub use union::UnionStage;

/// Trait that defines one step of request authorization.
///
/// Stages run in order before the protected operation. Any stage may halt the
/// run with a status; the remaining stages are then skipped. The trait is
/// thread-safe and one instance serves every request.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Decides whether the request may go on.
    ///
    /// # Returns
    /// * `Ok(Decision::Continue)` - The next stage runs
    /// * `Ok(Decision::Halt(status))` - The request is rejected with `status`
    /// * `Err(_)` - The stage could not decide, the request fails
    async fn pre_handle(&self, req: &GuardRequest, ctx: &mut RequestContext) -> Result<Decision>;

    /// Runs once the request completed, whatever the outcome of
    /// [`Stage::pre_handle`] was.
    async fn post_handle(&self, _req: &GuardRequest, _ctx: &mut RequestContext) {}
}

/// Outcome of [`Stage::pre_handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Halt(StatusCode),
}

impl Decision {
    /// `Continue` when `allowed`, otherwise halts with `status`.
    pub fn allow_or(allowed: bool, status: StatusCode) -> Self {
        if allowed {
            Decision::Continue
        } else {
            Decision::Halt(status)
        }
    }
}
