use anyhow::Result;
use async_trait::async_trait;
use log::debug;

use crate::header;
use crate::permission::read_token_permissions;
use crate::request::{GuardRequest, RequestContext};

use super::{Decision, Stage};

/// Parses the token permissions header up front and stores the result for
/// the stages after it. A malformed header fails the request.
pub struct TokenPermissionsStage {
    header: String,
    enforce_all_keys: bool,
}

impl TokenPermissionsStage {
    pub fn new(enforce_all_keys: bool) -> Self {
        Self {
            header: String::from(header::AUTHORISED_TOKEN_PERMISSIONS),
            enforce_all_keys,
        }
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }
}

#[async_trait]
impl Stage for TokenPermissionsStage {
    async fn pre_handle(&self, req: &GuardRequest, ctx: &mut RequestContext) -> Result<Decision> {
        let permissions = read_token_permissions(req, &self.header, self.enforce_all_keys)?;
        debug!(
            "Store token permissions for {} request, enforce all keys: {}",
            req.method(),
            self.enforce_all_keys
        );
        ctx.store_token_permissions(permissions);
        Ok(Decision::Continue)
    }

    async fn post_handle(&self, _req: &GuardRequest, ctx: &mut RequestContext) {
        ctx.clear_token_permissions();
    }
}

#[cfg(test)]
mod tests {
    use crate::permission::{InvalidClaimFormat, PermissionKey};

    use super::*;

    #[tokio::test]
    async fn test_store_permissions() {
        let stage = TokenPermissionsStage::new(true);
        let req = GuardRequest::new("GET").with_header(
            header::AUTHORISED_TOKEN_PERMISSIONS,
            "company_number=00006400 company_officers=read",
        );
        let mut ctx = RequestContext::new();

        let decision = stage.pre_handle(&req, &mut ctx).await.unwrap();
        assert_eq!(decision, Decision::Continue);

        let perms = ctx.token_permissions().unwrap();
        assert!(perms.has_permission(PermissionKey::CompanyOfficers, "read"));
        assert!(!perms.has_permission(PermissionKey::CompanyOfficers, "delete"));

        stage.post_handle(&req, &mut ctx).await;
        assert!(ctx.token_permissions().is_none());
    }

    #[tokio::test]
    async fn test_store_degraded_permissions() {
        let stage = TokenPermissionsStage::new(false).with_header("X-Permissions");
        let req = GuardRequest::new("DELETE").with_header("x-permissions", "company_number=00006400");
        let mut ctx = RequestContext::new();

        stage.pre_handle(&req, &mut ctx).await.unwrap();

        let perms = ctx.token_permissions().unwrap();
        assert!(perms.has_permission(PermissionKey::CompanyOfficers, "delete"));
        assert!(perms.has_permission(PermissionKey::CompanyNumber, "00006400"));
        assert!(!perms.has_permission(PermissionKey::CompanyNumber, "00000000"));
    }

    #[tokio::test]
    async fn test_invalid_header() {
        let stage = TokenPermissionsStage::new(true);
        let req = GuardRequest::new("GET")
            .with_header(header::AUTHORISED_TOKEN_PERMISSIONS, "invalid");
        let mut ctx = RequestContext::new();

        let err = stage.pre_handle(&req, &mut ctx).await.unwrap_err();
        let err = err.downcast::<InvalidClaimFormat>().unwrap();
        assert_eq!(err.raw(), "invalid");
        assert!(ctx.token_permissions().is_none());
    }
}
