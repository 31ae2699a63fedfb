//! Attestation client.
//!
//! [`AttestationClient::fetch`] returns a token an application can present to
//! a relying service: either a fresh `app-svc-req` envelope wrapping the role
//! credential, or the raw `as-app-token` credential. Credentials are served
//! from the on-disk cache while they are unexpired; otherwise the client
//! signs an `as-app-req`, asks the Attestation Service and caches the answer.

use crate::cache::TokenCache;
use crate::error::ClientError;
use chrono::Utc;
use rand::RngCore;
use spartan_core::{
    AUTH_HEADER, AttestationConfig, ConfigError, RoleToken, SELF_ISSUER, TokenResponse, TokenType,
};
use spartan_token::{KeyFamily, KeyPair, Payload, SignOptions, sign};
use std::time::Duration;

/// Per-call options for [`AttestationClient::fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// `app-svc-req` (default) for a wrapped envelope, `as-app-token` for the
    /// raw role credential.
    pub token_type: TokenType,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            token_type: TokenType::AppSvcReq,
        }
    }
}

impl FetchOptions {
    /// Ask for the raw role credential instead of an envelope.
    pub fn credential() -> Self {
        Self {
            token_type: TokenType::AsAppToken,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.token_type {
            TokenType::AppSvcReq | TokenType::AsAppToken => Ok(()),
            TokenType::AsAppReq => Err(ConfigError::InvalidValue {
                field: "token_type".to_string(),
                reason: "fetch returns app-svc-req or as-app-token".to_string(),
            }),
        }
    }
}

/// Client for the Attestation Service.
pub struct AttestationClient {
    config: AttestationConfig,
    keys: KeyPair,
    subject: String,
    http: reqwest::Client,
    cache: TokenCache,
}

impl AttestationClient {
    /// Create a client. Fails when the configuration is incomplete or the key
    /// pair cannot sign with the configured algorithm.
    pub fn new(config: AttestationConfig, keys: KeyPair) -> Result<Self, ClientError> {
        config.validate()?;
        if KeyFamily::of(config.algorithm) != Some(keys.family()) {
            return Err(ConfigError::InvalidValue {
                field: "algorithm".to_string(),
                reason: format!("{:?} does not match the application key", config.algorithm),
            }
            .into());
        }

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build()?;

        let cache = TokenCache::new(&config.cache_path);
        let subject = keys.subject();

        Ok(Self {
            config,
            keys,
            subject,
            http,
            cache,
        })
    }

    /// Subject the application is known by (hash of its public key).
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn config(&self) -> &AttestationConfig {
        &self.config
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Obtain a token for `role`.
    pub async fn fetch(&self, role: &str, options: &FetchOptions) -> Result<String, ClientError> {
        options.validate()?;
        if role.trim().is_empty() {
            return Err(ConfigError::MissingField("role".to_string()).into());
        }

        let (request_nonce, envelope_nonce) = nonces();

        if let Some(astoken) = self.cached_credential(role).await {
            tracing::debug!(role = %role, "Using cached role credential");
            return self.finish(astoken, options, &envelope_nonce);
        }

        let credentials = self.request_credentials(&request_nonce).await?;
        let astoken = credentials
            .iter()
            .find(|entry| entry.role == role)
            .map(|entry| entry.astoken.clone());

        if let Err(e) = self.cache.store(credentials).await {
            tracing::warn!(
                path = %self.cache.path().display(),
                error = %e,
                "Failed to update token cache"
            );
        }

        match astoken {
            Some(astoken) => self.finish(astoken, options, &envelope_nonce),
            None => Err(ClientError::NotAuthorized {
                role: role.to_string(),
            }),
        }
    }

    async fn cached_credential(&self, role: &str) -> Option<String> {
        let record = match self.cache.load().await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!(role = %role, "Token cache is empty");
                return None;
            }
            Err(e) => {
                tracing::debug!(error = %e, "Token cache unreadable; treating as miss");
                return None;
            }
        };

        record
            .fresh_token(role, Utc::now().timestamp())
            .map(str::to_string)
    }

    /// One round trip to the AS.
    async fn request_credentials(&self, nonce: &str) -> Result<Vec<RoleToken>, ClientError> {
        let request = sign(
            &Payload::as_app_req(self.keys.public_key_pem(), nonce),
            &self.keys,
            &self.envelope_options(),
        )?;

        tracing::info!(
            url = %self.config.as_url,
            subject = %self.subject,
            "Requesting role credentials from attestation service"
        );

        let response = self
            .http
            .get(&self.config.as_url)
            .header(AUTH_HEADER, request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        tracing::info!(count = parsed.tokens.len(), "Received role credentials");
        Ok(parsed.tokens)
    }

    fn finish(
        &self,
        astoken: String,
        options: &FetchOptions,
        nonce: &str,
    ) -> Result<String, ClientError> {
        if options.token_type == TokenType::AsAppToken {
            return Ok(astoken);
        }

        let envelope = sign(
            &Payload::app_svc_req(self.keys.public_key_pem(), astoken, nonce),
            &self.keys,
            &self.envelope_options(),
        )?;
        Ok(envelope)
    }

    fn envelope_options(&self) -> SignOptions {
        SignOptions::new(self.subject.clone(), SELF_ISSUER)
            .expires_in(self.config.envelope_ttl_secs)
            .algorithm(self.config.algorithm)
            .key_id(self.config.key_id.clone())
    }
}

impl std::fmt::Debug for AttestationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationClient")
            .field("as_url", &self.config.as_url)
            .field("subject", &self.subject)
            .field("cache", &self.cache.dir())
            .finish_non_exhaustive()
    }
}

/// Two independent nonces: one for the AS request, one for the envelope.
fn nonces() -> (String, String) {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    (hex::encode(&bytes[..8]), hex::encode(&bytes[8..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP_PRIVATE: &str = include_str!("../../../testdata/app-es256-private.pem");
    const APP_PUBLIC: &str = include_str!("../../../testdata/app-es256-public.pem");

    fn keys() -> KeyPair {
        KeyPair::from_pem(APP_PRIVATE, APP_PUBLIC).unwrap()
    }

    #[test]
    fn test_nonces_are_distinct_hex() {
        let (a, b) = nonces();
        assert_eq!(a.len(), 16);
        assert_eq!(b.len(), 16);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = AttestationConfig::new("", "/tmp/spartan");
        assert!(matches!(
            AttestationClient::new(config, keys()),
            Err(ClientError::Config(ConfigError::MissingField(_)))
        ));
    }

    #[test]
    fn test_new_rejects_algorithm_key_mismatch() {
        let mut config = AttestationConfig::new("http://localhost:3000/v1/as/tokens", "/tmp/spartan");
        config.algorithm = spartan_token::Algorithm::RS256;
        assert!(matches!(
            AttestationClient::new(config, keys()),
            Err(ClientError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_options() {
        let dir = tempfile::tempdir().unwrap();
        let config = AttestationConfig::new("http://127.0.0.1:9/v1/as/tokens", dir.path());
        let client = AttestationClient::new(config, keys()).unwrap();

        let err = client.fetch("", &FetchOptions::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::Config(ConfigError::MissingField(_))));

        let options = FetchOptions {
            token_type: TokenType::AsAppReq,
        };
        let err = client.fetch("SuperRole", &options).await.unwrap_err();
        assert!(matches!(err, ClientError::Config(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_debug_hides_keys() {
        let config = AttestationConfig::new("http://localhost:3000/v1/as/tokens", "/tmp/spartan");
        let client = AttestationClient::new(config, keys()).unwrap();
        let debug = format!("{client:?}");
        assert!(debug.contains("localhost:3000"));
        assert!(!debug.contains("PRIVATE KEY"));
    }
}
