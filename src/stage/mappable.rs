use std::collections::HashSet;
use std::sync::Arc;

use actix_web::http::StatusCode;
use anyhow::Result;
use async_trait::async_trait;
use log::debug;

use crate::header;
use crate::mapping::{crud_mapping, PermissionsMapping};
use crate::permission::{read_token_permissions, PermissionKey, Permissions};
use crate::request::{GuardRequest, RequestContext};

use super::{Decision, Stage};

/// Checks that the caller holds, for one permission key, at least one of the
/// values the mapping requires for the request method.
///
/// The permissions stored by an earlier stage are reused. Otherwise they are
/// read from the header and stored for later stages, and removed again once
/// the request completes.
pub struct PermissionStage {
    key: PermissionKey,
    mapping: Arc<PermissionsMapping>,
    ignored_methods: HashSet<String>,
    ignore_api_key_requests: bool,
    enforce_all_keys: bool,
    header: String,
    deny_status: StatusCode,
}

impl PermissionStage {
    /// Uses the CRUD mapping: `POST` needs `create`, `PUT` and `PATCH` need
    /// `update`, `DELETE` needs `delete`, anything else needs `read`.
    pub fn crud(key: PermissionKey) -> Self {
        Self::mapped(key, crud_mapping())
    }

    pub fn mapped(key: PermissionKey, mapping: Arc<PermissionsMapping>) -> Self {
        Self {
            key,
            mapping,
            ignored_methods: HashSet::new(),
            ignore_api_key_requests: false,
            enforce_all_keys: true,
            header: String::from(header::AUTHORISED_TOKEN_PERMISSIONS),
            deny_status: StatusCode::UNAUTHORIZED,
        }
    }

    /// Methods for which the stage does nothing.
    pub fn with_ignored_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    /// Skips requests made with an API key.
    pub fn ignore_api_key_requests(mut self, ignore: bool) -> Self {
        self.ignore_api_key_requests = ignore;
        self
    }

    /// When off, only the company number key is checked against the header.
    pub fn enforce_all_keys(mut self, enforce: bool) -> Self {
        self.enforce_all_keys = enforce;
        self
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    pub fn with_deny_status(mut self, status: StatusCode) -> Self {
        self.deny_status = status;
        self
    }

    fn is_ignored(&self, req: &GuardRequest) -> bool {
        if self.ignored_methods.contains(req.method()) {
            return true;
        }
        self.ignore_api_key_requests
            && req.header(header::IDENTITY_TYPE) == Some(header::API_KEY_IDENTITY_TYPE)
    }

    fn load_permissions(
        &self,
        req: &GuardRequest,
        ctx: &mut RequestContext,
    ) -> Result<Arc<dyn Permissions>> {
        if let Some(permissions) = ctx.token_permissions() {
            return Ok(permissions);
        }

        let permissions = read_token_permissions(req, &self.header, self.enforce_all_keys)?;
        debug!(
            "Create token permissions and store them in request, enforce all keys: {}",
            self.enforce_all_keys
        );
        ctx.store_token_permissions(permissions.clone());
        Ok(permissions)
    }
}

#[async_trait]
impl Stage for PermissionStage {
    async fn pre_handle(&self, req: &GuardRequest, ctx: &mut RequestContext) -> Result<Decision> {
        if self.is_ignored(req) {
            return Ok(Decision::Continue);
        }

        let permissions = self.load_permissions(req, ctx)?;

        let required = self.mapping.apply(req.method());
        let authorised = required.is_empty()
            || required
                .iter()
                .any(|value| permissions.has_permission(self.key, value));

        debug!(
            "Permission stage handled {} request, authorised: {authorised}, expected: {}={:?}",
            req.method(),
            self.key,
            required
        );

        Ok(Decision::allow_or(authorised, self.deny_status))
    }

    async fn post_handle(&self, req: &GuardRequest, ctx: &mut RequestContext) {
        if !self.is_ignored(req) {
            ctx.clear_token_permissions();
        }
    }
}
