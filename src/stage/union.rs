use anyhow::Result;
use async_trait::async_trait;

use crate::request::{GuardRequest, RequestContext};

use super::app_token::AppTokenStage;
use super::cors::CorsStage;
use super::identity::{InternalUserStage, UserAuthenticationStage};
use super::mappable::PermissionStage;
use super::permissions::TokenPermissionsStage;
use super::role::RoleStage;
use super::transaction::{ClosedTransactionStage, OpenTransactionStage, TransactionStage};
use super::{Decision, Stage};

/// A union type that can hold different types of stages
pub enum UnionStage {
    /// Gates cross-origin requests
    Cors(CorsStage),
    /// Reads the token permissions header up front
    TokenPermissions(TokenPermissionsStage),
    /// Checks one permission key against a method mapping
    Permission(PermissionStage),
    /// Requires an internal api key
    InternalUser(InternalUserStage),
    /// Requires an authenticated caller, internal for most methods
    UserAuthentication(UserAuthenticationStage),
    /// Requires an oauth2 user with a role
    Role(RoleStage),
    /// Requires a valid application token
    AppToken(AppTokenStage),
    /// Loads the transaction of the request
    Transaction(TransactionStage),
    /// Requires an open transaction for changes
    OpenTransaction(OpenTransactionStage),
    /// Requires a closed transaction
    ClosedTransaction(ClosedTransactionStage),
}

impl UnionStage {
    pub fn name(&self) -> &'static str {
        match self {
            UnionStage::Cors(_) => "cors",
            UnionStage::TokenPermissions(_) => "token_permissions",
            UnionStage::Permission(_) => "permission",
            UnionStage::InternalUser(_) => "internal_user",
            UnionStage::UserAuthentication(_) => "user_authentication",
            UnionStage::Role(_) => "role",
            UnionStage::AppToken(_) => "app_token",
            UnionStage::Transaction(_) => "transaction",
            UnionStage::OpenTransaction(_) => "open_transaction",
            UnionStage::ClosedTransaction(_) => "closed_transaction",
        }
    }
}

#[async_trait]
impl Stage for UnionStage {
    async fn pre_handle(&self, req: &GuardRequest, ctx: &mut RequestContext) -> Result<Decision> {
        match self {
            UnionStage::Cors(s) => s.pre_handle(req, ctx).await,
            UnionStage::TokenPermissions(s) => s.pre_handle(req, ctx).await,
            UnionStage::Permission(s) => s.pre_handle(req, ctx).await,
            UnionStage::InternalUser(s) => s.pre_handle(req, ctx).await,
            UnionStage::UserAuthentication(s) => s.pre_handle(req, ctx).await,
            UnionStage::Role(s) => s.pre_handle(req, ctx).await,
            UnionStage::AppToken(s) => s.pre_handle(req, ctx).await,
            UnionStage::Transaction(s) => s.pre_handle(req, ctx).await,
            UnionStage::OpenTransaction(s) => s.pre_handle(req, ctx).await,
            UnionStage::ClosedTransaction(s) => s.pre_handle(req, ctx).await,
        }
    }

    async fn post_handle(&self, req: &GuardRequest, ctx: &mut RequestContext) {
        match self {
            UnionStage::Cors(s) => s.post_handle(req, ctx).await,
            UnionStage::TokenPermissions(s) => s.post_handle(req, ctx).await,
            UnionStage::Permission(s) => s.post_handle(req, ctx).await,
            UnionStage::InternalUser(s) => s.post_handle(req, ctx).await,
            UnionStage::UserAuthentication(s) => s.post_handle(req, ctx).await,
            UnionStage::Role(s) => s.post_handle(req, ctx).await,
            UnionStage::AppToken(s) => s.post_handle(req, ctx).await,
            UnionStage::Transaction(s) => s.post_handle(req, ctx).await,
            UnionStage::OpenTransaction(s) => s.post_handle(req, ctx).await,
            UnionStage::ClosedTransaction(s) => s.post_handle(req, ctx).await,
        }
    }
}
