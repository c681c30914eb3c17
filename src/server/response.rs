use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder};
use serde::{Deserialize, Serialize};

use crate::stage::PREFLIGHT_HEADERS;

pub const SERVER_ERROR: &str = "Authorization could not be decided";

/// Body of every guard response. Denials never say which check failed.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommonResponse {
    pub code: u16,
    pub message: Option<String>,
}

/// A wrapper struct for HTTP responses that provides convenient methods
/// for creating common response types
pub struct Response {
    http_response: HttpResponse,
}

impl Response {
    pub fn ok() -> Self {
        let resp = CommonResponse {
            code: StatusCode::OK.into(),
            message: None,
        };
        Self {
            http_response: HttpResponse::Ok().json(resp),
        }
    }

    /// Answers a CORS preflight request, without a body.
    pub fn preflight() -> Self {
        let mut builder = HttpResponse::NoContent();
        for header in PREFLIGHT_HEADERS {
            builder.insert_header(header);
        }
        Self {
            http_response: builder.finish(),
        }
    }

    /// A denial carrying only the canonical reason of `status`.
    pub fn denied(status: StatusCode) -> Self {
        let message = status.canonical_reason().unwrap_or("Request denied");
        Self::err_response(status, message.to_string())
    }

    pub fn error() -> Self {
        Self::err_response(StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR.to_string())
    }

    fn err_response(status: StatusCode, message: String) -> Self {
        let resp = CommonResponse {
            code: status.into(),
            message: Some(message),
        };
        Self {
            http_response: HttpResponseBuilder::new(status).json(resp),
        }
    }
}

impl From<Response> for HttpResponse {
    fn from(val: Response) -> Self {
        val.http_response
    }
}
