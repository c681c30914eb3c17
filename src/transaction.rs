use std::time::Duration;

use actix_web::http::StatusCode;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{expandenv, CommonConfig};
use crate::header;

pub const STATUS_OPEN: &str = "open";
pub const STATUS_CLOSED: &str = "closed";

/// The subset of a transaction resource the guard stages need.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Transaction {
    #[serde(default)]
    pub id: Option<String>,

    pub status: String,

    #[serde(default)]
    pub company_number: Option<String>,
}

impl Transaction {
    pub fn is_open(&self) -> bool {
        self.status.eq_ignore_ascii_case(STATUS_OPEN)
    }

    pub fn is_closed(&self) -> bool {
        self.status.eq_ignore_ascii_case(STATUS_CLOSED)
    }
}

#[derive(Debug, Error)]
pub enum TransactionError {
    /// The transactions API answered with a non success status.
    #[error("transactions api returned {0}")]
    Status(StatusCode),
    #[error("request transactions api: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Fetches transactions by id on behalf of the caller.
#[async_trait]
pub trait TransactionClient: Send + Sync {
    async fn get_transaction(
        &self,
        transaction_id: &str,
        passthrough_token: Option<&str>,
    ) -> Result<Transaction, TransactionError>;
}

/// Transactions API configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TransactionsConfig {
    /// Base url of the transactions API, e.g. `https://api.example.com`.
    /// Required by the transaction stage.
    #[serde(default)]
    pub api_url: String,

    /// Request header holding the caller token forwarded to the API.
    #[serde(default = "TransactionsConfig::default_passthrough_header")]
    pub passthrough_header: String,

    #[serde(default = "TransactionsConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TransactionsConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            passthrough_header: Self::default_passthrough_header(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

impl CommonConfig for TransactionsConfig {
    fn complete(&mut self) -> Result<()> {
        self.api_url = expandenv("api_url", &self.api_url)?;
        self.api_url = self.api_url.trim_end_matches('/').to_string();
        if self.passthrough_header.is_empty() {
            bail!("passthrough_header is required");
        }
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than 0");
        }
        Ok(())
    }
}

impl TransactionsConfig {
    pub fn build_client(&self) -> Result<HttpTransactionClient> {
        if self.api_url.is_empty() {
            bail!("transactions api_url is required by the transaction stage");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .context("build transactions http client")?;
        Ok(HttpTransactionClient::new(
            client,
            self.api_url.clone(),
            self.passthrough_header.clone(),
        ))
    }

    fn default_passthrough_header() -> String {
        String::from(header::ACCESS_TOKEN)
    }

    fn default_timeout_secs() -> u64 {
        10
    }
}

/// Reads transactions from `GET {api_url}/transactions/{id}`.
pub struct HttpTransactionClient {
    client: reqwest::Client,
    api_url: String,
    passthrough_header: String,
}

impl HttpTransactionClient {
    pub fn new(client: reqwest::Client, api_url: String, passthrough_header: String) -> Self {
        Self {
            client,
            api_url,
            passthrough_header,
        }
    }
}

#[async_trait]
impl TransactionClient for HttpTransactionClient {
    async fn get_transaction(
        &self,
        transaction_id: &str,
        passthrough_token: Option<&str>,
    ) -> Result<Transaction, TransactionError> {
        let url = format!("{}/transactions/{transaction_id}", self.api_url);
        debug!("Fetch transaction from {url}");

        let mut req = self.client.get(&url);
        if let Some(token) = passthrough_token {
            req = req.header(self.passthrough_header.as_str(), token);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let status = StatusCode::from_u16(status.as_u16())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return Err(TransactionError::Status(status));
        }

        Ok(resp.json().await?)
    }
}
