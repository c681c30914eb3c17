use actix_web::http::StatusCode;
use anyhow::Result;
use async_trait::async_trait;
use log::debug;

use crate::header;
use crate::request::{GuardRequest, RequestContext};

use super::{Decision, Stage};

const OAUTH2_IDENTITY_TYPE: &str = "oauth2";

/// Requires an OAuth2 user holding a role.
pub struct RoleStage {
    role: String,
    deny_status: StatusCode,
}

impl RoleStage {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            deny_status: StatusCode::UNAUTHORIZED,
        }
    }

    pub fn with_deny_status(mut self, status: StatusCode) -> Self {
        self.deny_status = status;
        self
    }
}

fn is_oauth2_user(req: &GuardRequest) -> bool {
    req.header(header::IDENTITY).is_some()
        && req
            .header(header::IDENTITY_TYPE)
            .is_some_and(|t| t.contains(OAUTH2_IDENTITY_TYPE))
}

#[async_trait]
impl Stage for RoleStage {
    async fn pre_handle(&self, req: &GuardRequest, _ctx: &mut RequestContext) -> Result<Decision> {
        if !is_oauth2_user(req) {
            debug!("Identity type provided was not oauth2");
            return Ok(Decision::Halt(self.deny_status));
        }

        let has_role = req
            .header(header::AUTHORISED_ROLES)
            .is_some_and(|roles| roles.split(' ').any(|role| role == self.role));
        if !has_role {
            debug!("User does not have role {:?}", self.role);
            return Ok(Decision::Halt(self.deny_status));
        }

        debug!("Authorised user has role {:?}", self.role);
        Ok(Decision::Continue)
    }
}
