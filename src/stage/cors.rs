use std::collections::HashSet;

use actix_web::http::StatusCode;
use anyhow::Result;
use async_trait::async_trait;
use log::debug;

use crate::header;
use crate::request::{GuardRequest, RequestContext};

use super::{Decision, Stage};

/// Headers answering a CORS preflight request.
pub const PREFLIGHT_HEADERS: [(&str, &str); 4] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Headers", "*"),
    ("Access-Control-Allow-Methods", "*"),
    ("Access-Control-Max-Age", "3600"),
];

/// Gates cross-origin requests.
///
/// A preflight (`OPTIONS`) is answered with 204 and ends the run. Any other
/// cross-origin request must use an external method and carry a non-empty
/// `ERIC-Allowed-Origin` header, or it is rejected with 403. Same-origin
/// requests pass untouched.
pub struct CorsStage {
    external_methods: HashSet<String>,
}

impl CorsStage {
    const OPTIONS_METHOD: &'static str = "OPTIONS";

    pub fn new<I, S>(external_methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            external_methods: external_methods.into_iter().map(Into::into).collect(),
        }
    }
}

/// A request is cross-origin when it names an origin whose host differs from
/// the host the request was sent to.
fn is_cors_request(req: &GuardRequest) -> bool {
    let Some(origin) = req.headers().get_non_blank(header::ORIGIN) else {
        return false;
    };
    let origin_host = origin
        .split_once("://")
        .map_or(origin, |(_, host)| host)
        .trim_end_matches('/');

    let host = req
        .headers()
        .get_non_blank(header::FORWARDED_HOST)
        .or_else(|| req.headers().get_non_blank(header::HOST));
    !host.is_some_and(|host| host.eq_ignore_ascii_case(origin_host))
}

#[async_trait]
impl Stage for CorsStage {
    async fn pre_handle(&self, req: &GuardRequest, _ctx: &mut RequestContext) -> Result<Decision> {
        if !is_cors_request(req) {
            return Ok(Decision::Continue);
        }

        if req.method().eq_ignore_ascii_case(Self::OPTIONS_METHOD) {
            debug!("Answer cors preflight request");
            return Ok(Decision::Halt(StatusCode::NO_CONTENT));
        }

        let external = self.external_methods.contains(req.method());
        let allowed_origin = req.headers().get_non_blank(header::ALLOWED_ORIGIN).is_some();
        if !external || !allowed_origin {
            debug!(
                "Cors forbidden for {} request, external method: {external}, allowed origin: {allowed_origin}",
                req.method()
            );
            return Ok(Decision::Halt(StatusCode::FORBIDDEN));
        }

        Ok(Decision::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cors_request(method: &str) -> GuardRequest {
        GuardRequest::new(method)
            .with_header(header::ORIGIN, "http://example.com")
            .with_header(header::HOST, "api.example.com")
    }

    #[tokio::test]
    async fn test_cors() {
        let stage = CorsStage::new(["GET", "POST"]);
        let mut ctx = RequestContext::new();

        // Test case 1: preflight
        let req = cors_request("OPTIONS");
        let decision = stage.pre_handle(&req, &mut ctx).await.unwrap();
        assert_eq!(decision, Decision::Halt(StatusCode::NO_CONTENT));

        // Test case 2: external method with an allowed origin
        let req = cors_request("GET").with_header(header::ALLOWED_ORIGIN, "example.com");
        let decision = stage.pre_handle(&req, &mut ctx).await.unwrap();
        assert_eq!(decision, Decision::Continue);

        // Test case 3: method not external
        let req = cors_request("DELETE").with_header(header::ALLOWED_ORIGIN, "example.com");
        let decision = stage.pre_handle(&req, &mut ctx).await.unwrap();
        assert_eq!(decision, Decision::Halt(StatusCode::FORBIDDEN));

        // Test case 4: missing or empty allowed origin
        let req = cors_request("POST");
        let decision = stage.pre_handle(&req, &mut ctx).await.unwrap();
        assert_eq!(decision, Decision::Halt(StatusCode::FORBIDDEN));

        let req = cors_request("POST").with_header(header::ALLOWED_ORIGIN, "");
        let decision = stage.pre_handle(&req, &mut ctx).await.unwrap();
        assert_eq!(decision, Decision::Halt(StatusCode::FORBIDDEN));
    }

    #[tokio::test]
    async fn test_not_cors() {
        let stage = CorsStage::new(["GET"]);
        let mut ctx = RequestContext::new();

        // No origin at all
        let req = GuardRequest::new("DELETE");
        let decision = stage.pre_handle(&req, &mut ctx).await.unwrap();
        assert_eq!(decision, Decision::Continue);

        // Same origin, through the proxy
        let req = GuardRequest::new("DELETE")
            .with_header(header::ORIGIN, "https://api.example.com")
            .with_header(header::HOST, "guard.internal:8080")
            .with_header(header::FORWARDED_HOST, "api.example.com");
        let decision = stage.pre_handle(&req, &mut ctx).await.unwrap();
        assert_eq!(decision, Decision::Continue);

        // Same origin, direct
        let req = GuardRequest::new("OPTIONS")
            .with_header(header::ORIGIN, "http://localhost:8080")
            .with_header(header::HOST, "localhost:8080");
        let decision = stage.pre_handle(&req, &mut ctx).await.unwrap();
        assert_eq!(decision, Decision::Continue);
    }
}
