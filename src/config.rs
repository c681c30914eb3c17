use std::path::{Path, PathBuf};
use std::{env, fs, io};

use anyhow::{bail, Context, Result};
use clap::Args;
use log::warn;
use openssl::ssl::{SslAcceptor, SslAcceptorBuilder, SslFiletype, SslMethod};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::header;
use crate::logs::LogsConfig;
use crate::server::GuardServer;
use crate::stage::chain::Pipeline;
use crate::stage::config::StageConfig;
use crate::stage::factory::PipelineFactory;
use crate::transaction::TransactionsConfig;

pub trait CommonConfig {
    fn complete(&mut self) -> Result<()>;
}

/// See: [`shellexpand::full`].
pub fn expandenv(name: &str, s: impl AsRef<str>) -> Result<String> {
    let s =
        shellexpand::full(s.as_ref()).with_context(|| format!("expand env value for '{name}'"))?;
    Ok(s.to_string())
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// The config file path. Defaults to `$PERMGUARD_CONFIG`, then
    /// `./permguard.toml`.
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

impl ConfigArgs {
    const ENV_CONFIG: &'static str = "PERMGUARD_CONFIG";
    const DEFAULT_CONFIG: &'static str = "permguard.toml";

    pub fn path(&self) -> PathBuf {
        if let Some(path) = self.config.as_ref() {
            return path.clone();
        }
        match env::var(Self::ENV_CONFIG) {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => PathBuf::from(Self::DEFAULT_CONFIG),
        }
    }

    pub fn load<T>(&self) -> Result<T>
    where
        T: CommonConfig + DeserializeOwned + Default,
    {
        load_config(&self.path())
    }
}

/// Reads and completes a config file. A missing file falls back to the
/// default config.
pub fn load_config<T>(path: &Path) -> Result<T>
where
    T: CommonConfig + DeserializeOwned + Default,
{
    let mut cfg: T = match fs::read_to_string(path) {
        Ok(s) => toml::from_str(&s).context("parse config toml")?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            warn!(
                "Config file {} not found, using defaults",
                path.display()
            );
            T::default()
        }
        Err(err) => {
            return Err(err).context(format!("read config file: {}", path.display()));
        }
    };

    cfg.complete().context("validate config")?;
    Ok(cfg)
}

/// Token permission settings shared by every stage reading the permissions
/// header.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PermissionsConfig {
    #[serde(default = "PermissionsConfig::default_header")]
    pub header: String,

    /// When off, only the `company_number` key is checked and every other
    /// key is granted.
    #[serde(default = "PermissionsConfig::default_enable_token_permission_auth")]
    pub enable_token_permission_auth: bool,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            header: Self::default_header(),
            enable_token_permission_auth: Self::default_enable_token_permission_auth(),
        }
    }
}

impl CommonConfig for PermissionsConfig {
    fn complete(&mut self) -> Result<()> {
        if self.header.is_empty() {
            bail!("header is required");
        }
        if !self.enable_token_permission_auth {
            warn!("Token permission auth is disabled, only company_number is checked");
        }
        Ok(())
    }
}

impl PermissionsConfig {
    fn default_header() -> String {
        String::from(header::AUTHORISED_TOKEN_PERMISSIONS)
    }

    fn default_enable_token_permission_auth() -> bool {
        true
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GuardConfig {
    #[serde(default = "GuardConfig::default_bind")]
    pub bind: String,

    #[serde(default)]
    pub ssl: bool,

    #[serde(default)]
    pub ssl_cert: Option<PathBuf>,

    #[serde(default)]
    pub ssl_key: Option<PathBuf>,

    pub keep_alive_secs: Option<u64>,

    pub workers: Option<u64>,

    #[serde(default)]
    pub logs: LogsConfig,

    #[serde(default)]
    pub permissions: PermissionsConfig,

    #[serde(default)]
    pub transactions: TransactionsConfig,

    /// The stages every request runs through, in order.
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            bind: Self::default_bind(),
            ssl: false,
            ssl_cert: None,
            ssl_key: None,
            keep_alive_secs: None,
            workers: None,
            logs: LogsConfig::default(),
            permissions: PermissionsConfig::default(),
            transactions: TransactionsConfig::default(),
            stages: vec![],
        }
    }
}

impl CommonConfig for GuardConfig {
    fn complete(&mut self) -> Result<()> {
        if self.bind.is_empty() {
            bail!("bind is required");
        }

        if self.ssl {
            if self.ssl_cert.is_none() {
                bail!("ssl_cert is required when ssl is enabled");
            }
            if self.ssl_key.is_none() {
                bail!("ssl_key is required when ssl is enabled");
            }
        }

        if let Some(keep_alive_secs) = self.keep_alive_secs {
            if keep_alive_secs == 0 {
                bail!("keep_alive_secs must be greater than 0");
            }
        }

        if let Some(workers) = self.workers {
            if workers == 0 {
                bail!("workers must be greater than 0");
            }
        }

        self.logs.complete().context("logs")?;
        self.permissions.complete().context("permissions")?;
        self.transactions.complete().context("transactions")?;

        if self.stages.is_empty() {
            warn!("No stages configured, every request will be allowed");
        }
        for (idx, stage) in self.stages.iter_mut().enumerate() {
            stage.complete().with_context(|| format!("stages[{idx}]"))?;
        }

        Ok(())
    }
}

impl GuardConfig {
    pub fn build_pipeline(&self) -> Result<Pipeline> {
        let factory = PipelineFactory::new(&self.permissions, &self.transactions);
        factory.build_pipeline(&self.stages)
    }

    pub fn build_server(&self, pipeline: Pipeline) -> Result<GuardServer> {
        let mut srv = GuardServer::new(self.bind.clone(), pipeline);
        if self.ssl {
            let ssl = self.build_ssl()?;
            srv.set_ssl(ssl);
        }

        if let Some(keep_alive_secs) = self.keep_alive_secs {
            srv.set_keep_alive_secs(keep_alive_secs);
        }

        if let Some(workers) = self.workers {
            srv.set_workers(workers);
        }

        Ok(srv)
    }

    fn build_ssl(&self) -> Result<SslAcceptorBuilder> {
        let (Some(cert_path), Some(key_path)) = (self.ssl_cert.as_ref(), self.ssl_key.as_ref())
        else {
            bail!("ssl_cert and ssl_key are required when ssl is enabled");
        };
        if !key_path.exists() {
            bail!("ssl key file not exists: {:?}", key_path);
        }
        if !cert_path.exists() {
            bail!("ssl cert file not exists: {:?}", cert_path);
        }

        let mut builder =
            SslAcceptor::mozilla_intermediate(SslMethod::tls()).context("init ssl acceptor")?;

        builder
            .set_private_key_file(key_path, SslFiletype::PEM)
            .context("load ssl key file")?;
        builder
            .set_certificate_chain_file(cert_path)
            .context("load ssl cert file")?;

        Ok(builder)
    }

    fn default_bind() -> String {
        String::from("127.0.0.1:8080")
    }
}
