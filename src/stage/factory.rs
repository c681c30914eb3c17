use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

use crate::config::PermissionsConfig;
use crate::mapping::crud_mapping;
use crate::transaction::{TransactionClient, TransactionsConfig};

use super::chain::Pipeline;
use super::config::{deny_status, PermissionStageConfig, StageConfig};
use super::union::UnionStage;
use super::{
    AppTokenStage, ClosedTransactionStage, CorsStage, InternalUserStage, OpenTransactionStage,
    PermissionStage, RoleStage, TokenPermissionsStage, TransactionStage, UserAuthenticationStage,
};

/// Factory for building the stage pipeline from configuration.
pub struct PipelineFactory<'a> {
    permissions: &'a PermissionsConfig,
    transactions: &'a TransactionsConfig,
}

impl<'a> PipelineFactory<'a> {
    pub fn new(permissions: &'a PermissionsConfig, transactions: &'a TransactionsConfig) -> Self {
        Self {
            permissions,
            transactions,
        }
    }

    /// Builds every configured stage, in order. Transaction stages share one
    /// API client.
    pub fn build_pipeline(&self, cfgs: &[StageConfig]) -> Result<Pipeline> {
        let mut transaction_client: Option<Arc<dyn TransactionClient>> = None;
        let mut stages = Vec::with_capacity(cfgs.len());

        for (idx, cfg) in cfgs.iter().enumerate() {
            let stage = match cfg {
                StageConfig::Cors(cfg) => {
                    UnionStage::Cors(CorsStage::new(cfg.external_methods.iter().cloned()))
                }
                StageConfig::TokenPermissions => UnionStage::TokenPermissions(
                    TokenPermissionsStage::new(self.permissions.enable_token_permission_auth)
                        .with_header(self.permissions.header.clone()),
                ),
                StageConfig::Permission(cfg) => UnionStage::Permission(
                    self.build_permission_stage(cfg)
                        .with_context(|| format!("build stages[{idx}]"))?,
                ),
                StageConfig::InternalUser => UnionStage::InternalUser(InternalUserStage::new()),
                StageConfig::UserAuthentication(cfg) => {
                    UnionStage::UserAuthentication(UserAuthenticationStage::new(
                        cfg.external_methods.iter().cloned(),
                        cfg.other_allowed_identity_types.iter().cloned(),
                    ))
                }
                StageConfig::Role(cfg) => UnionStage::Role(
                    RoleStage::new(cfg.role.clone()).with_deny_status(deny_status(cfg.deny_status)?),
                ),
                StageConfig::AppToken(cfg) => {
                    let validator = cfg
                        .token
                        .build_validator()
                        .with_context(|| format!("build stages[{idx}]"))?;
                    info!("Application token keys are read from {}", cfg.token.keys_url());
                    UnionStage::AppToken(
                        AppTokenStage::new(validator)
                            .with_deny_status(deny_status(cfg.deny_status)?),
                    )
                }
                StageConfig::Transaction => {
                    let client = match transaction_client.as_ref() {
                        Some(client) => client.clone(),
                        None => {
                            let client: Arc<dyn TransactionClient> = Arc::new(
                                self.transactions
                                    .build_client()
                                    .with_context(|| format!("build stages[{idx}]"))?,
                            );
                            transaction_client = Some(client.clone());
                            client
                        }
                    };
                    UnionStage::Transaction(TransactionStage::new(
                        client,
                        self.transactions.passthrough_header.clone(),
                    ))
                }
                StageConfig::OpenTransaction => UnionStage::OpenTransaction(OpenTransactionStage),
                StageConfig::ClosedTransaction => {
                    UnionStage::ClosedTransaction(ClosedTransactionStage)
                }
            };
            info!("Pipeline stage {idx}: {}", stage.name());
            stages.push(stage);
        }

        Ok(Pipeline::new(stages))
    }

    fn build_permission_stage(&self, cfg: &PermissionStageConfig) -> Result<PermissionStage> {
        let mapping = match cfg.mapping.as_ref() {
            Some(mapping) => Arc::new(mapping.build().context("build permissions mapping")?),
            None => crud_mapping(),
        };

        Ok(PermissionStage::mapped(cfg.key, mapping)
            .with_ignored_methods(cfg.ignored_methods.iter().cloned())
            .ignore_api_key_requests(cfg.ignore_api_key_requests)
            .enforce_all_keys(self.permissions.enable_token_permission_auth)
            .with_header(self.permissions.header.clone())
            .with_deny_status(deny_status(cfg.deny_status)?))
    }
}
