use actix_web::http::StatusCode;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::CommonConfig;
use crate::mapping::MappingConfig;
use crate::permission::PermissionKey;
use crate::token::config::AppTokenConfig;

/// One entry of the `[[stages]]` list, selected by its `type` field.
///
/// ```toml
/// [[stages]]
/// type = "internal_user"
///
/// [[stages]]
/// type = "permission"
/// key = "company_accounts"
/// ignored_methods = ["OPTIONS"]
/// ```
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageConfig {
    Cors(CorsStageConfig),
    TokenPermissions,
    Permission(PermissionStageConfig),
    InternalUser,
    UserAuthentication(UserAuthenticationStageConfig),
    Role(RoleStageConfig),
    AppToken(AppTokenStageConfig),
    Transaction,
    OpenTransaction,
    ClosedTransaction,
}

impl CommonConfig for StageConfig {
    fn complete(&mut self) -> Result<()> {
        match self {
            StageConfig::Cors(cfg) => cfg.complete().context("cors"),
            StageConfig::Permission(cfg) => cfg.complete().context("permission"),
            StageConfig::UserAuthentication(cfg) => cfg.complete().context("user_authentication"),
            StageConfig::Role(cfg) => cfg.complete().context("role"),
            StageConfig::AppToken(cfg) => cfg.complete().context("app_token"),
            StageConfig::TokenPermissions
            | StageConfig::InternalUser
            | StageConfig::Transaction
            | StageConfig::OpenTransaction
            | StageConfig::ClosedTransaction => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsStageConfig {
    /// Methods cross-origin callers may use.
    #[serde(default)]
    pub external_methods: Vec<String>,
}

impl CommonConfig for CorsStageConfig {
    fn complete(&mut self) -> Result<()> {
        if self.external_methods.iter().any(|m| m.is_empty()) {
            bail!("external_methods must not contain an empty method");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PermissionStageConfig {
    /// The permission key checked by the stage.
    pub key: PermissionKey,

    /// Required values per method. Defaults to the CRUD mapping.
    #[serde(default)]
    pub mapping: Option<MappingConfig>,

    #[serde(default)]
    pub ignored_methods: Vec<String>,

    #[serde(default)]
    pub ignore_api_key_requests: bool,

    #[serde(default = "default_unauthorized")]
    pub deny_status: u16,
}

impl CommonConfig for PermissionStageConfig {
    fn complete(&mut self) -> Result<()> {
        if let Some(mapping) = self.mapping.as_ref() {
            mapping.build().context("mapping")?;
        }
        check_deny_status(self.deny_status)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UserAuthenticationStageConfig {
    /// Methods open to any authenticated caller.
    #[serde(default)]
    pub external_methods: Vec<String>,

    /// Identity types accepted for external methods besides API keys.
    #[serde(default)]
    pub other_allowed_identity_types: Vec<String>,
}

impl CommonConfig for UserAuthenticationStageConfig {
    fn complete(&mut self) -> Result<()> {
        if self.external_methods.iter().any(|m| m.is_empty()) {
            bail!("external_methods must not contain an empty method");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RoleStageConfig {
    pub role: String,

    /// 401 for a plain role check, 403 when the role grants a permission.
    #[serde(default = "default_unauthorized")]
    pub deny_status: u16,
}

impl CommonConfig for RoleStageConfig {
    fn complete(&mut self) -> Result<()> {
        if self.role.is_empty() {
            bail!("role is required");
        }
        check_deny_status(self.deny_status)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppTokenStageConfig {
    #[serde(flatten)]
    pub token: AppTokenConfig,

    #[serde(default = "default_unauthorized")]
    pub deny_status: u16,
}

impl CommonConfig for AppTokenStageConfig {
    fn complete(&mut self) -> Result<()> {
        self.token.complete()?;
        check_deny_status(self.deny_status)?;
        Ok(())
    }
}

fn default_unauthorized() -> u16 {
    StatusCode::UNAUTHORIZED.as_u16()
}

pub(super) fn deny_status(code: u16) -> Result<StatusCode> {
    let status = StatusCode::from_u16(code).with_context(|| format!("invalid status {code}"))?;
    if !status.is_client_error() && !status.is_server_error() {
        bail!("deny_status must be a 4xx or 5xx status, found {code}");
    }
    Ok(status)
}

fn check_deny_status(code: u16) -> Result<()> {
    deny_status(code).map(|_| ())
}
