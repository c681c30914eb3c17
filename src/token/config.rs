use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig};
use crate::header;

use super::{AppTokenValidator, HttpKeySource, RemoteKeySet};

/// Application token validation configuration.
///
/// The three identifiers support `$VAR` expansion, so secrets can be kept out
/// of the config file.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppTokenConfig {
    /// The directory tenant issuing the tokens. Required.
    #[serde(default)]
    pub tenant_id: String,

    /// Client id of the peer application allowed to call, matched against
    /// the `appid` claim. Required.
    #[serde(default)]
    pub logic_app_client_id: String,

    /// Client id of this application, the token audience is
    /// `api://{cis_app_client_id}`. Required.
    #[serde(default)]
    pub cis_app_client_id: String,

    /// Header carrying the token.
    #[serde(default = "AppTokenConfig::default_header")]
    pub header: String,

    /// Base url of the key discovery endpoint, the keys are read from
    /// `{keys_url_base}{tenant_id}/discovery/v2.0/keys`.
    #[serde(default = "AppTokenConfig::default_keys_url_base")]
    pub keys_url_base: String,

    /// Expected issuer is `{issuer_base}{tenant_id}/`.
    #[serde(default = "AppTokenConfig::default_issuer_base")]
    pub issuer_base: String,

    #[serde(default = "AppTokenConfig::default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for AppTokenConfig {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            logic_app_client_id: String::new(),
            cis_app_client_id: String::new(),
            header: Self::default_header(),
            keys_url_base: Self::default_keys_url_base(),
            issuer_base: Self::default_issuer_base(),
            fetch_timeout_secs: Self::default_fetch_timeout_secs(),
        }
    }
}

impl CommonConfig for AppTokenConfig {
    fn complete(&mut self) -> Result<()> {
        self.tenant_id = expandenv("tenant_id", &self.tenant_id)?;
        if self.tenant_id.is_empty() {
            bail!("tenant_id is required");
        }

        self.logic_app_client_id = expandenv("logic_app_client_id", &self.logic_app_client_id)?;
        if self.logic_app_client_id.is_empty() {
            bail!("logic_app_client_id is required");
        }

        self.cis_app_client_id = expandenv("cis_app_client_id", &self.cis_app_client_id)?;
        if self.cis_app_client_id.is_empty() {
            bail!("cis_app_client_id is required");
        }

        if self.header.is_empty() {
            bail!("header is required");
        }

        self.keys_url_base = expandenv("keys_url_base", &self.keys_url_base)?;
        if !self.keys_url_base.ends_with('/') {
            self.keys_url_base.push('/');
        }
        if !self.issuer_base.ends_with('/') {
            self.issuer_base.push('/');
        }

        if self.fetch_timeout_secs == 0 {
            bail!("fetch_timeout_secs must be greater than 0");
        }

        Ok(())
    }
}

impl AppTokenConfig {
    pub fn keys_url(&self) -> String {
        format!("{}{}/discovery/v2.0/keys", self.keys_url_base, self.tenant_id)
    }

    pub fn build_validator(&self) -> Result<AppTokenValidator> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.fetch_timeout_secs))
            .build()
            .context("build key discovery http client")?;
        let source = HttpKeySource::new(client, self.keys_url());

        Ok(AppTokenValidator::new(
            self.tenant_id.clone(),
            self.logic_app_client_id.clone(),
            &self.cis_app_client_id,
            &self.issuer_base,
            self.header.clone(),
            RemoteKeySet::new(Box::new(source)),
        ))
    }

    fn default_header() -> String {
        String::from(header::OAUTH_ACCESS_TOKEN)
    }

    fn default_keys_url_base() -> String {
        String::from("https://login.microsoftonline.com/")
    }

    fn default_issuer_base() -> String {
        String::from("https://sts.windows.net/")
    }

    fn default_fetch_timeout_secs() -> u64 {
        10
    }
}
