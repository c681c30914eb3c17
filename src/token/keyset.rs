use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use jsonwebtoken::DecodingKey;
use log::{debug, info};
use parking_lot::RwLock;

use super::TokenError;

/// Somewhere to load a JSON Web Key Set from.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch_keys(&self) -> Result<JwkSet, TokenError>;
}

/// Loads the key set from a discovery endpoint over HTTP.
pub struct HttpKeySource {
    client: reqwest::Client,
    url: String,
}

impl HttpKeySource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch_keys(&self) -> Result<JwkSet, TokenError> {
        info!("Fetch signing keys from {}", self.url);
        let keys = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<JwkSet>()
            .await?;
        debug!("Fetched {} signing keys", keys.keys.len());
        Ok(keys)
    }
}

/// A process wide cache of a remote key set.
///
/// The set is loaded on first use and replaced as a whole when a key id is
/// missing from it. Concurrent refreshes may fetch twice; the last one to
/// finish wins. The lock is never held while fetching.
pub struct RemoteKeySet {
    source: Box<dyn KeySource>,
    cache: RwLock<Option<Arc<JwkSet>>>,
}

impl RemoteKeySet {
    pub fn new(source: Box<dyn KeySource>) -> Self {
        Self {
            source,
            cache: RwLock::new(None),
        }
    }

    /// Returns the RSA verification key for `kid`, refreshing the cache once
    /// if the key is not in it. A token without a key id never matches, so it
    /// costs one refresh like any other miss.
    pub async fn find_rsa_key(&self, kid: Option<&str>) -> Result<DecodingKey, TokenError> {
        let keys = match self.snapshot() {
            Some(keys) => keys,
            None => self.refresh().await?,
        };
        if let Some((kid, jwk)) = lookup(&keys, kid) {
            return rsa_key(kid, jwk);
        }

        debug!("Key id {kid:?} not in cached key set, refresh");
        let keys = self.refresh().await?;
        match lookup(&keys, kid) {
            Some((kid, jwk)) => rsa_key(kid, jwk),
            None => Err(TokenError::KeyNotFound(kid.unwrap_or_default().to_string())),
        }
    }

    fn snapshot(&self) -> Option<Arc<JwkSet>> {
        self.cache.read().clone()
    }

    async fn refresh(&self) -> Result<Arc<JwkSet>, TokenError> {
        let keys = Arc::new(self.source.fetch_keys().await?);
        *self.cache.write() = Some(keys.clone());
        Ok(keys)
    }
}

fn lookup<'a, 'k>(keys: &'k JwkSet, kid: Option<&'a str>) -> Option<(&'a str, &'k Jwk)> {
    let kid = kid?;
    keys.find(kid).map(|jwk| (kid, jwk))
}

fn rsa_key(kid: &str, jwk: &Jwk) -> Result<DecodingKey, TokenError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => Ok(DecodingKey::from_rsa_components(&rsa.n, &rsa.e)?),
        _ => Err(TokenError::NotRsaKey(kid.to_string())),
    }
}
