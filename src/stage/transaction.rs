use std::sync::Arc;

use actix_web::http::StatusCode;
use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error};

use crate::request::{GuardRequest, RequestContext};
use crate::transaction::{TransactionClient, TransactionError};

use super::{Decision, Stage};

/// Path parameter holding the transaction id.
pub const TRANSACTION_ID_PARAM: &str = "transaction_id";

/// Loads the transaction named by the request path and stores it for the
/// stages after it.
pub struct TransactionStage {
    client: Arc<dyn TransactionClient>,
    passthrough_header: String,
}

impl TransactionStage {
    /// `passthrough_header` names the request header whose value is forwarded
    /// to the transactions API.
    pub fn new(client: Arc<dyn TransactionClient>, passthrough_header: impl Into<String>) -> Self {
        Self {
            client,
            passthrough_header: passthrough_header.into(),
        }
    }
}

#[async_trait]
impl Stage for TransactionStage {
    async fn pre_handle(&self, req: &GuardRequest, ctx: &mut RequestContext) -> Result<Decision> {
        let Some(transaction_id) = req.path_param(TRANSACTION_ID_PARAM) else {
            error!("{} request has no transaction id", req.method());
            return Ok(Decision::Halt(StatusCode::INTERNAL_SERVER_ERROR));
        };

        let passthrough = req.header(&self.passthrough_header);
        match self.client.get_transaction(transaction_id, passthrough).await {
            Ok(transaction) => {
                debug!("Store transaction {transaction_id} in request");
                ctx.store_transaction(transaction);
                Ok(Decision::Continue)
            }
            Err(TransactionError::Status(status)) => {
                error!("Get transaction {transaction_id}: api returned {status}");
                Ok(Decision::Halt(status))
            }
            Err(e) => {
                error!("Get transaction {transaction_id}: {e}");
                Ok(Decision::Halt(StatusCode::INTERNAL_SERVER_ERROR))
            }
        }
    }
}

/// Rejects changes to a transaction which is no longer open. `GET` requests
/// only need the transaction to exist.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenTransactionStage;

#[async_trait]
impl Stage for OpenTransactionStage {
    async fn pre_handle(&self, req: &GuardRequest, ctx: &mut RequestContext) -> Result<Decision> {
        let allowed = ctx
            .transaction()
            .is_some_and(|t| req.method() == "GET" || t.is_open());
        Ok(Decision::allow_or(allowed, StatusCode::FORBIDDEN))
    }
}

/// Requires a closed transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosedTransactionStage;

#[async_trait]
impl Stage for ClosedTransactionStage {
    async fn pre_handle(&self, _req: &GuardRequest, ctx: &mut RequestContext) -> Result<Decision> {
        let allowed = ctx.transaction().is_some_and(|t| t.is_closed());
        Ok(Decision::allow_or(allowed, StatusCode::INTERNAL_SERVER_ERROR))
    }
}
