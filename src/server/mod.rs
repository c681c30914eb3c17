mod response;

use std::sync::Arc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::web::{self, Data};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer};
use anyhow::{Context, Result};
use log::{error, info, warn};
use openssl::ssl::SslAcceptorBuilder;
use sd_notify::NotifyState;

use crate::header::{self, HeaderMap};
use crate::request::GuardRequest;
use crate::stage::chain::Pipeline;
use crate::stage::transaction::TRANSACTION_ID_PARAM;
use crate::stage::Decision;

pub use response::{CommonResponse, Response};

/// A forward-auth server: a reverse proxy asks it whether a request may
/// reach the protected API, and the pipeline answers.
pub struct GuardServer {
    ssl: Option<SslAcceptorBuilder>,
    pipeline: Arc<Pipeline>,

    keep_alive_secs: Option<u64>,
    workers: Option<u64>,

    bind: String,
}

impl GuardServer {
    const HEALTHZ_PATH: &'static str = "/healthz";
    const TRANSACTIONS_SEGMENT: &'static str = "transactions";

    pub fn new(bind: String, pipeline: Pipeline) -> Self {
        Self {
            ssl: None,
            pipeline: Arc::new(pipeline),
            keep_alive_secs: None,
            workers: None,
            bind,
        }
    }

    pub fn set_ssl(&mut self, ssl: SslAcceptorBuilder) {
        self.ssl = Some(ssl);
    }

    pub fn set_keep_alive_secs(&mut self, keep_alive_secs: u64) {
        self.keep_alive_secs = Some(keep_alive_secs);
    }

    pub fn set_workers(&mut self, workers: u64) {
        self.workers = Some(workers);
    }

    pub async fn run(mut self) -> Result<()> {
        let pipeline = Data::from(self.pipeline.clone());
        let mut srv = HttpServer::new(move || {
            App::new()
                .app_data(pipeline.clone())
                .configure(Self::routes)
        });

        if let Some(ssl) = self.ssl.take() {
            info!("Binding to https://{}", self.bind);
            srv = srv.bind_openssl(&self.bind, ssl).context("bind with ssl")?
        } else {
            warn!("Using HTTP (without SSL). THIS IS DANGEROUS, DO NOT USE IN PRODUCTION");
            info!("Binding to http://{}", self.bind);
            srv = srv.bind(&self.bind).context("bind without ssl")?
        };

        if let Some(keep_alive) = self.keep_alive_secs {
            srv = srv.keep_alive(Duration::from_secs(keep_alive));
        }
        if let Some(workers) = self.workers {
            srv = srv.workers(workers as usize);
        }

        sd_notify::notify(true, &[NotifyState::Ready]).context("notify systemd")?;
        info!("Starting guard server");
        srv.run().await.context("run server")?;

        info!("Server stopped by user");
        Ok(())
    }

    /// Registers the health check and the catch-all guard route. Requires a
    /// `Data<Pipeline>` in the app data.
    pub fn routes(cfg: &mut web::ServiceConfig) {
        cfg.service(web::resource(Self::HEALTHZ_PATH).route(web::get().to(Self::handle_healthz)))
            .default_service(web::route().to(Self::handle_guard));
    }

    async fn handle_healthz() -> HttpResponse {
        Response::ok().into()
    }

    async fn handle_guard(req: HttpRequest, pipeline: Data<Pipeline>) -> HttpResponse {
        let guard_req = Self::guard_request(&req);
        match pipeline.handle(&guard_req).await {
            Ok(Decision::Continue) => Response::ok().into(),
            Ok(Decision::Halt(StatusCode::NO_CONTENT)) => Response::preflight().into(),
            Ok(Decision::Halt(status)) => Response::denied(status).into(),
            Err(e) => {
                error!(
                    "Authorize {} {}: {:#}",
                    guard_req.method(),
                    req.uri().path(),
                    e
                );
                Response::error().into()
            }
        }
    }

    /// Converts an inbound request into the form the stages read. The
    /// forwarded method and uri, when present, replace the request's own.
    pub fn guard_request(req: &HttpRequest) -> GuardRequest {
        let headers: HeaderMap = req
            .headers()
            .iter()
            .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?)))
            .collect();

        let method = headers
            .get_non_blank(header::FORWARDED_METHOD)
            .map(|m| m.trim().to_ascii_uppercase())
            .unwrap_or_else(|| req.method().as_str().to_string());

        let path = headers
            .get_non_blank(header::FORWARDED_URI)
            .map(|uri| uri.split(['?', '#']).next().unwrap_or_default().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());

        let mut guard_req = GuardRequest::new(method);
        if let Some(transaction_id) = Self::transaction_id(&path) {
            guard_req = guard_req.with_path_param(TRANSACTION_ID_PARAM, transaction_id);
        }
        guard_req.with_headers(headers)
    }

    fn transaction_id(path: &str) -> Option<&str> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        segments.find(|s| *s == Self::TRANSACTIONS_SEGMENT)?;
        segments.next()
    }
}
