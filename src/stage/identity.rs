use std::collections::HashSet;

use actix_web::http::StatusCode;
use anyhow::Result;
use async_trait::async_trait;
use log::debug;

use crate::header;
use crate::request::{GuardRequest, RequestContext};

use super::{Decision, Stage};

/// Lets through API key callers holding the internal user role only.
#[derive(Debug, Clone, Copy, Default)]
pub struct InternalUserStage;

impl InternalUserStage {
    pub fn new() -> Self {
        Self
    }

    fn decide(&self, req: &GuardRequest) -> Decision {
        if req.header(header::IDENTITY).is_none() {
            debug!("No authorised identity");
            return Decision::Halt(StatusCode::UNAUTHORIZED);
        }

        let identity_type = req.header(header::IDENTITY_TYPE);
        if identity_type != Some(header::API_KEY_IDENTITY_TYPE) {
            debug!("Invalid identity type {identity_type:?}");
            return Decision::Halt(StatusCode::FORBIDDEN);
        }

        if req.header(header::AUTHORISED_KEY_ROLES) != Some(header::INTERNAL_USER_ROLE) {
            debug!("User does not have internal user privileges");
            return Decision::Halt(StatusCode::FORBIDDEN);
        }

        debug!("Authorised as api key (internal user)");
        Decision::Continue
    }
}

#[async_trait]
impl Stage for InternalUserStage {
    async fn pre_handle(&self, req: &GuardRequest, _ctx: &mut RequestContext) -> Result<Decision> {
        Ok(self.decide(req))
    }
}

/// Opens the listed methods to any authenticated caller with an allowed
/// identity type. Every other method is for internal users only.
pub struct UserAuthenticationStage {
    external_methods: HashSet<String>,
    allowed_identity_types: HashSet<String>,
    internal: InternalUserStage,
}

impl UserAuthenticationStage {
    /// API keys are always an allowed identity type for external methods.
    pub fn new<M, T>(external_methods: M, other_allowed_identity_types: T) -> Self
    where
        M: IntoIterator,
        M::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        let mut allowed_identity_types: HashSet<String> = other_allowed_identity_types
            .into_iter()
            .map(Into::into)
            .collect();
        allowed_identity_types.insert(String::from(header::API_KEY_IDENTITY_TYPE));

        Self {
            external_methods: external_methods.into_iter().map(Into::into).collect(),
            allowed_identity_types,
            internal: InternalUserStage::new(),
        }
    }
}

#[async_trait]
impl Stage for UserAuthenticationStage {
    async fn pre_handle(&self, req: &GuardRequest, _ctx: &mut RequestContext) -> Result<Decision> {
        if !self.external_methods.contains(req.method()) {
            return Ok(self.internal.decide(req));
        }

        if req.header(header::IDENTITY).is_none() {
            debug!("No authorised identity");
            return Ok(Decision::Halt(StatusCode::UNAUTHORIZED));
        }

        let identity_type = req.header(header::IDENTITY_TYPE);
        let allowed = identity_type.is_some_and(|t| self.allowed_identity_types.contains(t));
        if !allowed {
            debug!("Invalid identity type {identity_type:?}");
            return Ok(Decision::Halt(StatusCode::FORBIDDEN));
        }

        Ok(Decision::Continue)
    }
}
