use std::collections::HashMap;

/// Identity of the caller, as asserted by the upstream gateway.
pub const IDENTITY: &str = "ERIC-Identity";
/// Identity type of the caller, e.g. `key` or `oauth2`.
pub const IDENTITY_TYPE: &str = "ERIC-Identity-Type";
/// Roles attached to an API key.
pub const AUTHORISED_KEY_ROLES: &str = "ERIC-Authorised-Key-Roles";
/// Space separated roles of an OAuth2 user.
pub const AUTHORISED_ROLES: &str = "ERIC-Authorised-Roles";
/// Token permission claims, see [`crate::permission::PermissionIndex::parse`].
pub const AUTHORISED_TOKEN_PERMISSIONS: &str = "ERIC-Authorised-Token-Permissions";
/// Token forwarded to downstream APIs on behalf of the caller.
pub const ACCESS_TOKEN: &str = "ERIC-Access-Token";
/// Signed application token checked by the application token validator.
pub const OAUTH_ACCESS_TOKEN: &str = "x-oauth-access-token";
/// Original method of a request forwarded to the guard server.
pub const FORWARDED_METHOD: &str = "X-Forwarded-Method";
/// Original uri of a request forwarded to the guard server.
pub const FORWARDED_URI: &str = "X-Forwarded-Uri";
/// Original host of a request forwarded to the guard server.
pub const FORWARDED_HOST: &str = "X-Forwarded-Host";
pub const HOST: &str = "Host";
pub const ORIGIN: &str = "Origin";
/// Set by the gateway when the request origin is allowed to call the API.
pub const ALLOWED_ORIGIN: &str = "ERIC-Allowed-Origin";

pub const API_KEY_IDENTITY_TYPE: &str = "key";
pub const INTERNAL_USER_ROLE: &str = "*";

/// HeaderMap stores request headers with case-insensitive key lookup.
///
/// Header names are lowercased on insert, so the original spelling is not
/// preserved. Inserting a name twice keeps the last value.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    inner: HashMap<String, String>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        self.inner
            .insert(key.as_ref().to_ascii_lowercase(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Like [`HeaderMap::get`], but treats a whitespace-only value as absent.
    pub fn get_non_blank(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderMap
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut headers = HeaderMap::new();
        for (key, value) in iter {
            headers.insert(key, value);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_get() {
        let mut headers = HeaderMap::new();
        headers.insert(IDENTITY_TYPE, "key");

        assert_eq!(headers.get("eric-identity-type"), Some("key"));
        assert_eq!(headers.get("ERIC-IDENTITY-TYPE"), Some("key"));
        assert_eq!(headers.get("Eric-Identity-Type"), Some("key"));
        assert_eq!(headers.get(IDENTITY), None);
    }

    #[test]
    fn test_insert_overwrites_other_case() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Oauth-Access-Token", "first");
        let old = headers.insert(OAUTH_ACCESS_TOKEN, "second");

        assert_eq!(old.as_deref(), Some("first"));
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get(OAUTH_ACCESS_TOKEN), Some("second"));
    }

    #[test]
    fn test_get_non_blank() {
        let headers: HeaderMap = [(IDENTITY, "   "), (IDENTITY_TYPE, "oauth2")]
            .into_iter()
            .collect();

        assert_eq!(headers.get(IDENTITY), Some("   "));
        assert_eq!(headers.get_non_blank(IDENTITY), None);
        assert_eq!(headers.get_non_blank(IDENTITY_TYPE), Some("oauth2"));
        assert_eq!(headers.get_non_blank(AUTHORISED_ROLES), None);
    }
}
