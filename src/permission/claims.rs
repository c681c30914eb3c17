use std::collections::{HashMap, HashSet};

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::{PermissionKey, Permissions};

/// Space separated `key=value[,value...]` pairs.
static PERMISSION_LIST_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_]+=[A-Za-z0-9_]+(,[A-Za-z0-9_]+)*( [A-Za-z0-9_]+=[A-Za-z0-9_]+(,[A-Za-z0-9_]+)*)*$")
        .unwrap()
});

/// The token permissions header does not follow the claim grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid token permission header: {raw}")]
pub struct InvalidClaimFormat {
    raw: String,
}

impl InvalidClaimFormat {
    fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
        }
    }

    /// The header value that failed to parse.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// The permissions granted by one token permissions header.
///
/// The header has the format `key1=valueA key2=valueB key3=valueC,valueD`,
/// which becomes:
///
/// ```text
/// key1 -> {valueA}
/// key2 -> {valueB}
/// key3 -> {valueC, valueD}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionIndex {
    permissions: HashMap<String, HashSet<String>>,
}

impl PermissionIndex {
    /// Parses a raw header value. An absent or blank header grants nothing.
    ///
    /// The whole header is matched against the grammar before any pair is
    /// read, and a key may only appear once.
    pub fn parse(raw: Option<&str>) -> Result<Self, InvalidClaimFormat> {
        let raw = match raw {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => return Ok(Self::default()),
        };

        if !PERMISSION_LIST_PATTERN.is_match(raw) {
            return Err(InvalidClaimFormat::new(raw));
        }

        let mut permissions = HashMap::new();
        for pair in raw.split(' ') {
            // The grammar guarantees exactly one '=' per pair
            let (key, values) = match pair.split_once('=') {
                Some(kv) => kv,
                None => return Err(InvalidClaimFormat::new(raw)),
            };
            let values: HashSet<String> = values.split(',').map(String::from).collect();
            if permissions.insert(key.to_string(), values).is_some() {
                return Err(InvalidClaimFormat::new(raw));
            }
        }

        let index = Self { permissions };
        debug!("Parsed token permissions {raw:?}: {:?}", index.permissions);
        Ok(index)
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// The values granted for a raw key, including keys outside
    /// [`PermissionKey`].
    pub fn values(&self, key: &str) -> Option<&HashSet<String>> {
        self.permissions.get(key)
    }
}

impl Permissions for PermissionIndex {
    fn has_permission(&self, key: PermissionKey, value: &str) -> bool {
        self.values(key.as_str())
            .is_some_and(|values| values.contains(value))
    }
}
