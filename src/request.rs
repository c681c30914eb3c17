use std::collections::HashMap;
use std::sync::Arc;

use crate::header::HeaderMap;
use crate::permission::Permissions;
use crate::transaction::Transaction;

/// The parts of an inbound request the guard stages look at.
#[derive(Debug, Clone, Default)]
pub struct GuardRequest {
    method: String,
    headers: HeaderMap,
    path_params: HashMap<String, String>,
}

impl GuardRequest {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_path_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(key.into(), value.into());
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn path_param(&self, key: &str) -> Option<&str> {
        self.path_params.get(key).map(String::as_str)
    }
}

/// Request scoped storage shared by the stages of one pipeline run.
///
/// A context must never outlive its request: the pipeline clears it once the
/// request completes, so grants of one caller can not leak into another
/// caller's request even if contexts are pooled.
#[derive(Debug, Default)]
pub struct RequestContext {
    token_permissions: Option<Arc<dyn Permissions>>,
    transaction: Option<Transaction>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token_permissions(&self) -> Option<Arc<dyn Permissions>> {
        self.token_permissions.clone()
    }

    pub fn store_token_permissions(&mut self, permissions: Arc<dyn Permissions>) {
        self.token_permissions = Some(permissions);
    }

    pub fn clear_token_permissions(&mut self) {
        self.token_permissions = None;
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    pub fn store_transaction(&mut self, transaction: Transaction) {
        self.transaction = Some(transaction);
    }

    pub fn clear(&mut self) {
        self.token_permissions = None;
        self.transaction = None;
    }
}
