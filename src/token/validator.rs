use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::request::GuardRequest;

use super::{RemoteKeySet, TokenError};

/// Every RSA signature algorithm; the key set only says the key is RSA.
const RSA_ALGORITHMS: [Algorithm; 6] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

/// Audience claim, either a single value or a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub fn contains(&self, aud: &str) -> bool {
        match self {
            Audience::Single(s) => s == aud,
            Audience::Multiple(v) => v.iter().any(|a| a == aud),
        }
    }
}

/// Claims of an application token. Every field is optional at decode time so
/// that a missing claim is reported by the claim checks, not by the decoder.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppTokenClaims {
    #[serde(default)]
    pub aud: Option<Audience>,
    #[serde(default)]
    pub appid: Option<String>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub tid: Option<String>,
    #[serde(default)]
    pub exp: Option<u64>,
    #[serde(default)]
    pub nbf: Option<u64>,
}

/// Validates signed application tokens issued to a trusted peer application.
///
/// A token is valid when it is signed by a key of the tenant's key set and
/// carries:
/// - `aud` containing `api://{cis_app_client_id}`
/// - `appid` equal to the peer application's client id
/// - `iss` equal to `{issuer_base}{tenant_id}/`
/// - `tid` equal to the tenant id
/// - `exp` in the future and `nbf` in the past
pub struct AppTokenValidator {
    tenant_id: String,
    logic_app_client_id: String,
    expected_audience: String,
    expected_issuer: String,
    header: String,
    keys: RemoteKeySet,
}

impl AppTokenValidator {
    pub fn new(
        tenant_id: impl Into<String>,
        logic_app_client_id: impl Into<String>,
        cis_app_client_id: &str,
        issuer_base: &str,
        header: impl Into<String>,
        keys: RemoteKeySet,
    ) -> Self {
        let tenant_id = tenant_id.into();
        let expected_issuer = format!("{issuer_base}{tenant_id}/");
        Self {
            tenant_id,
            logic_app_client_id: logic_app_client_id.into(),
            expected_audience: format!("api://{cis_app_client_id}"),
            expected_issuer,
            header: header.into(),
            keys,
        }
    }

    /// Checks the token carried by the request header. A missing or empty
    /// header is invalid.
    pub async fn has_valid_application_token(&self, req: &GuardRequest) -> bool {
        match req.header(&self.header) {
            Some(token) if !token.is_empty() => self.validate_token(token).await,
            _ => {
                debug!("Request has no application token in {:?}", self.header);
                false
            }
        }
    }

    pub async fn validate_token(&self, token: &str) -> bool {
        let now = Utc::now().timestamp().max(0) as u64;
        self.validate_token_at(token, now).await
    }

    /// Validates the token against the clock value `now`, in seconds since
    /// the epoch. Never fails: every error makes the token invalid.
    pub async fn validate_token_at(&self, token: &str, now: u64) -> bool {
        match self.check_token(token, now).await {
            Ok(valid) => valid,
            Err(e) => {
                warn!("Reject application token: {e}");
                false
            }
        }
    }

    async fn check_token(&self, token: &str, now: u64) -> Result<bool, TokenError> {
        let header = decode_header(token)?;
        let kid = header.kid;
        let key = self.keys.find_rsa_key(kid.as_deref()).await?;

        // Claims are checked by hand below
        let mut validation = Validation::new(Algorithm::RS256);
        validation.algorithms = RSA_ALGORITHMS.to_vec();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let claims = match decode::<AppTokenClaims>(token, &key, &validation) {
            Ok(data) => data.claims,
            Err(e) if matches!(e.kind(), ErrorKind::InvalidSignature) => {
                debug!("Application token signature does not match key {kid:?}");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        self.verify_claims(&claims, now)
    }

    /// Checks the claims of a token whose signature was already verified.
    ///
    /// The identity claims are checked first; a missing `exp` or `nbf` is an
    /// error only once they all match.
    pub fn verify_claims(&self, claims: &AppTokenClaims, now: u64) -> Result<bool, TokenError> {
        if !claims
            .aud
            .as_ref()
            .is_some_and(|aud| aud.contains(&self.expected_audience))
        {
            debug!("Application token audience mismatch: {:?}", claims.aud);
            return Ok(false);
        }
        if claims.appid.as_deref() != Some(self.logic_app_client_id.as_str()) {
            debug!("Application token appid mismatch: {:?}", claims.appid);
            return Ok(false);
        }
        if claims.iss.as_deref() != Some(self.expected_issuer.as_str()) {
            debug!("Application token issuer mismatch: {:?}", claims.iss);
            return Ok(false);
        }
        if claims.tid.as_deref() != Some(self.tenant_id.as_str()) {
            debug!("Application token tenant mismatch: {:?}", claims.tid);
            return Ok(false);
        }

        let exp = claims.exp.ok_or(TokenError::MissingClaim("exp"))?;
        if exp <= now {
            debug!("Application token expired at {exp}");
            return Ok(false);
        }
        let nbf = claims.nbf.ok_or(TokenError::MissingClaim("nbf"))?;
        if nbf >= now {
            debug!("Application token not valid before {nbf}");
            return Ok(false);
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use jsonwebtoken::jwk::JwkSet;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::header;
    use crate::token::testing::*;
    use crate::token::{HttpKeySource, KeySource};

    use super::*;

    const NOW: u64 = 1_760_000_000;

    struct StaticSource {
        keys: JwkSet,
        fetches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl KeySource for StaticSource {
        async fn fetch_keys(&self) -> Result<JwkSet, TokenError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.keys.clone())
        }
    }

    fn build_validator(signer: &TestSigner) -> (AppTokenValidator, Arc<AtomicUsize>) {
        let fetches = Arc::new(AtomicUsize::new(0));
        let source = StaticSource {
            keys: parse_key_set(vec![signer.jwk()]),
            fetches: fetches.clone(),
        };
        let validator = AppTokenValidator::new(
            TENANT_ID,
            LOGIC_APP_CLIENT_ID,
            CIS_APP_CLIENT_ID,
            "https://sts.windows.net/",
            header::OAUTH_ACCESS_TOKEN,
            RemoteKeySet::new(Box::new(source)),
        );
        (validator, fetches)
    }

    #[tokio::test]
    async fn test_valid_token() {
        let signer = TestSigner::generate("k1");
        let (validator, _) = build_validator(&signer);

        let token = signer.sign(&valid_claims(NOW));
        assert!(validator.validate_token_at(&token, NOW).await);

        // Audience as a list
        let mut claims = valid_claims(NOW);
        claims["aud"] = json!(["api://other", format!("api://{CIS_APP_CLIENT_ID}")]);
        let token = signer.sign(&claims);
        assert!(validator.validate_token_at(&token, NOW).await);
    }

    #[tokio::test]
    async fn test_valid_token_now() {
        let signer = TestSigner::generate("k1");
        let (validator, _) = build_validator(&signer);

        let now = Utc::now().timestamp() as u64;
        let token = signer.sign(&valid_claims(now));
        assert!(validator.validate_token(&token).await);

        let req = GuardRequest::new("POST").with_header(header::OAUTH_ACCESS_TOKEN, token);
        assert!(validator.has_valid_application_token(&req).await);
    }

    #[tokio::test]
    async fn test_missing_token() {
        let signer = TestSigner::generate("k1");
        let (validator, fetches) = build_validator(&signer);

        let req = GuardRequest::new("POST");
        assert!(!validator.has_valid_application_token(&req).await);

        let req = GuardRequest::new("POST").with_header(header::OAUTH_ACCESS_TOKEN, "");
        assert!(!validator.has_valid_application_token(&req).await);

        assert_eq!(fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_token() {
        let signer = TestSigner::generate("k1");
        let (validator, _) = build_validator(&signer);

        for token in ["not-a-jwt", "a.b.c", "Bearer xyz", "...", "eyJhbGciOiJSUzI1NiJ9"] {
            assert!(!validator.validate_token_at(token, NOW).await, "token {token}");
        }
    }

    #[tokio::test]
    async fn test_invalid_signature() {
        let signer = TestSigner::generate("k1");
        // Same key id, different key pair
        let forger = TestSigner::generate("k1");
        let (validator, _) = build_validator(&signer);

        let token = forger.sign(&valid_claims(NOW));
        assert!(!validator.validate_token_at(&token, NOW).await);
    }

    #[tokio::test]
    async fn test_claims_mismatch() {
        let signer = TestSigner::generate("k1");
        let (validator, _) = build_validator(&signer);

        let cases = [
            ("aud", json!("api://other-app")),
            ("aud", json!(CIS_APP_CLIENT_ID)),
            ("appid", json!("other-logic-app")),
            ("iss", json!("https://sts.windows.net/other-tenant/")),
            ("iss", json!(format!("https://sts.windows.net/{TENANT_ID}"))),
            ("tid", json!("other-tenant")),
            ("exp", json!(NOW - 1)),
            ("exp", json!(NOW)),
            ("nbf", json!(NOW + 60)),
            ("nbf", json!(NOW)),
        ];
        for (claim, value) in cases {
            let mut claims = valid_claims(NOW);
            claims[claim] = value.clone();
            let token = signer.sign(&claims);
            assert!(
                !validator.validate_token_at(&token, NOW).await,
                "claim {claim}={value}"
            );
        }

        for claim in ["aud", "appid", "iss", "tid", "exp", "nbf"] {
            let mut claims = valid_claims(NOW);
            claims.as_object_mut().unwrap().remove(claim);
            let token = signer.sign(&claims);
            assert!(
                !validator.validate_token_at(&token, NOW).await,
                "missing claim {claim}"
            );
        }
    }

    #[test]
    fn test_verify_claims_missing_time() {
        let signer = TestSigner::generate("k1");
        let (validator, _) = build_validator(&signer);

        let claims = AppTokenClaims {
            aud: Some(Audience::Single(format!("api://{CIS_APP_CLIENT_ID}"))),
            appid: Some(LOGIC_APP_CLIENT_ID.to_string()),
            iss: Some(format!("https://sts.windows.net/{TENANT_ID}/")),
            tid: Some(TENANT_ID.to_string()),
            exp: None,
            nbf: Some(NOW - 1),
        };
        let err = validator.verify_claims(&claims, NOW).unwrap_err();
        assert!(matches!(err, TokenError::MissingClaim("exp")));

        let claims = AppTokenClaims {
            exp: Some(NOW + 1),
            nbf: None,
            ..claims
        };
        let err = validator.verify_claims(&claims, NOW).unwrap_err();
        assert!(matches!(err, TokenError::MissingClaim("nbf")));

        // Identity claims are checked before the time claims
        let claims = AppTokenClaims {
            tid: Some("other-tenant".to_string()),
            ..claims
        };
        assert!(!validator.verify_claims(&claims, NOW).unwrap());
    }

    #[tokio::test]
    async fn test_key_id() {
        let signer = TestSigner::generate("k1");
        let (validator, fetches) = build_validator(&signer);

        // No kid in the header: a miss, initial load plus exactly one refresh
        let token = signer.sign_with_kid(&valid_claims(NOW), None);
        assert!(!validator.validate_token_at(&token, NOW).await);
        assert_eq!(fetches.load(Ordering::SeqCst), 2);

        // Unknown kid: exactly one more refresh
        let token = signer.sign_with_kid(&valid_claims(NOW), Some("unknown"));
        assert!(!validator.validate_token_at(&token, NOW).await);
        assert_eq!(fetches.load(Ordering::SeqCst), 3);

        // Known kid is served from the cache
        let token = signer.sign(&valid_claims(NOW));
        assert!(validator.validate_token_at(&token, NOW).await);
        assert_eq!(fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rsa_algorithms() {
        let signer = TestSigner::generate("k1");
        let (validator, _) = build_validator(&signer);

        for alg in RSA_ALGORITHMS {
            let token = signer.sign_with_algorithm(&valid_claims(NOW), alg);
            assert!(validator.validate_token_at(&token, NOW).await, "{alg:?}");
        }

        // A shared secret token never verifies against the RSA key
        let mut header = jsonwebtoken::Header::new(Algorithm::HS256);
        header.kid = Some("k1".to_string());
        let token = jsonwebtoken::encode(
            &header,
            &valid_claims(NOW),
            &jsonwebtoken::EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(!validator.validate_token_at(&token, NOW).await);
    }

    #[tokio::test]
    async fn test_remote_key_set() {
        let signer = TestSigner::generate("k1");

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/{TENANT_ID}/discovery/v2.0/keys")))
            .respond_with(ResponseTemplate::new(200).set_body_json(key_set(vec![signer.jwk()])))
            .expect(2)
            .mount(&server)
            .await;

        let url = format!("{}/{TENANT_ID}/discovery/v2.0/keys", server.uri());
        let source = HttpKeySource::new(reqwest::Client::new(), url);
        let validator = AppTokenValidator::new(
            TENANT_ID,
            LOGIC_APP_CLIENT_ID,
            CIS_APP_CLIENT_ID,
            "https://sts.windows.net/",
            header::OAUTH_ACCESS_TOKEN,
            RemoteKeySet::new(Box::new(source)),
        );

        let token = signer.sign(&valid_claims(NOW));
        assert!(validator.validate_token_at(&token, NOW).await);

        let token = signer.sign_with_kid(&valid_claims(NOW), Some("rotated"));
        assert!(!validator.validate_token_at(&token, NOW).await);
    }
}
