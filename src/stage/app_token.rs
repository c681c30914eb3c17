use actix_web::http::StatusCode;
use anyhow::Result;
use async_trait::async_trait;
use log::debug;

use crate::request::{GuardRequest, RequestContext};
use crate::token::AppTokenValidator;

use super::{Decision, Stage};

/// Requires a valid application token.
pub struct AppTokenStage {
    validator: AppTokenValidator,
    deny_status: StatusCode,
}

impl AppTokenStage {
    pub fn new(validator: AppTokenValidator) -> Self {
        Self {
            validator,
            deny_status: StatusCode::UNAUTHORIZED,
        }
    }

    pub fn with_deny_status(mut self, status: StatusCode) -> Self {
        self.deny_status = status;
        self
    }
}

#[async_trait]
impl Stage for AppTokenStage {
    async fn pre_handle(&self, req: &GuardRequest, _ctx: &mut RequestContext) -> Result<Decision> {
        let valid = self.validator.has_valid_application_token(req).await;
        if !valid {
            debug!("No valid application token supplied");
        }
        Ok(Decision::allow_or(valid, self.deny_status))
    }
}
