//! Token authenticator.
//!
//! Dispatches on the declared token type, then checks the chain that type
//! requires:
//!
//! | type | checks |
//! |---|---|
//! | `app-svc-req` | envelope signed by its embedded key, subject bound to that key, nested credential signed by the AS, same subject, role, address, nonce |
//! | `as-app-token` | signed by the AS, role, address |
//! | `as-app-req` | signed by its embedded key, subject bound to that key, nonce |

use crate::decision::{AuthData, AuthDecision};
use crate::error::AuthError;
use crate::replay::ReplayGuard;
use chrono::Utc;
use spartan_core::{AddressPolicy, AuthenticatorConfig, ConfigError, ReplayPolicy, TokenType};
use spartan_token::{Claims, PublicKey, TokenError, VerifyOptions, decode, subject_for, verify};
use std::net::IpAddr;

/// Validates inbound tokens against a fixed configuration and AS key.
#[derive(Debug)]
pub struct TokenAuthenticator {
    config: AuthenticatorConfig,
    as_public_key: PublicKey,
    verify_options: VerifyOptions,
    replay: Option<ReplayGuard>,
}

impl TokenAuthenticator {
    /// Create an authenticator. Fails when the configuration is incomplete.
    pub fn new(config: AuthenticatorConfig, as_public_key: PublicKey) -> Result<Self, ConfigError> {
        config.validate()?;

        let verify_options = VerifyOptions::new(config.algorithms.clone(), config.leeway_secs);
        let replay = match config.replay {
            ReplayPolicy::ExpiryWindow => None,
            ReplayPolicy::RejectReuse => Some(ReplayGuard::new()),
        };

        Ok(Self {
            config,
            as_public_key,
            verify_options,
            replay,
        })
    }

    pub fn config(&self) -> &AuthenticatorConfig {
        &self.config
    }

    /// Token type this authenticator accepts.
    pub fn expected_type(&self) -> TokenType {
        self.config.token_type
    }

    /// Authenticate `token`, optionally comparing the address bound into the
    /// credential with `remote_addr`.
    pub fn authenticate(&self, token: Option<&str>, remote_addr: Option<&str>) -> AuthDecision {
        match self.try_authenticate(token, remote_addr) {
            Ok(data) => {
                tracing::debug!(
                    subject = data.subject().unwrap_or_default(),
                    token_type = %self.config.token_type,
                    "Token accepted"
                );
                AuthDecision::allow(data)
            }
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    status = e.status_code(),
                    token_type = %self.config.token_type,
                    "Token rejected"
                );
                AuthDecision::deny(&e)
            }
        }
    }

    /// Like [`authenticate`](Self::authenticate) but returns the failure reason.
    pub fn try_authenticate(
        &self,
        token: Option<&str>,
        remote_addr: Option<&str>,
    ) -> Result<AuthData, AuthError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let unverified = decode(token).map_err(|e| AuthError::Malformed(e.to_string()))?;
        let declared = unverified.claims.payload.kind.as_deref().unwrap_or_default();
        if declared != self.config.token_type.as_str() {
            return Err(AuthError::TypeMismatch {
                expected: self.config.token_type,
                actual: declared.to_string(),
            });
        }

        match self.config.token_type {
            TokenType::AppSvcReq => self.check_service_request(token, &unverified.claims, remote_addr),
            TokenType::AsAppToken => {
                let credential = self.check_credential(token, remote_addr)?;
                Ok(AuthData {
                    auth_token: None,
                    authz_token: Some(credential),
                })
            }
            TokenType::AsAppReq => {
                let request = self.check_self_signed(token, &unverified.claims)?;
                self.check_nonce(&request)?;
                Ok(AuthData {
                    auth_token: Some(request),
                    authz_token: None,
                })
            }
        }
    }

    fn check_service_request(
        &self,
        token: &str,
        unverified: &Claims,
        remote_addr: Option<&str>,
    ) -> Result<AuthData, AuthError> {
        let envelope = self.check_self_signed(token, unverified)?;

        let astoken = envelope
            .payload
            .astoken
            .as_deref()
            .ok_or_else(|| AuthError::CredentialVerify(missing("astoken")))?;
        let credential = verify(astoken, &self.as_public_key, &self.verify_options)
            .map_err(AuthError::CredentialVerify)?;

        if credential.token_type() != Some(TokenType::AsAppToken) {
            return Err(AuthError::NestedType(
                credential.payload.kind.clone().unwrap_or_default(),
            ));
        }
        if credential.sub != envelope.sub {
            return Err(AuthError::IdentityMismatch {
                envelope: envelope.sub,
                credential: credential.sub,
            });
        }
        self.check_role(&credential)?;
        self.check_address(&credential, remote_addr)?;
        self.check_nonce(&envelope)?;

        Ok(AuthData {
            auth_token: Some(envelope),
            authz_token: Some(credential),
        })
    }

    fn check_credential(&self, token: &str, remote_addr: Option<&str>) -> Result<Claims, AuthError> {
        let credential =
            verify(token, &self.as_public_key, &self.verify_options).map_err(AuthError::Verify)?;
        self.check_role(&credential)?;
        self.check_address(&credential, remote_addr)?;
        Ok(credential)
    }

    /// Verify a token with the public key it carries.
    fn check_self_signed(&self, token: &str, unverified: &Claims) -> Result<Claims, AuthError> {
        let pem = unverified
            .payload
            .pubkey
            .as_deref()
            .ok_or_else(|| AuthError::Verify(missing("pubkey")))?;
        let key = PublicKey::from_pem(pem).map_err(AuthError::Verify)?;
        let claims = verify(token, &key, &self.verify_options).map_err(AuthError::Verify)?;

        if self.config.require_subject_binding && claims.sub != subject_for(pem) {
            return Err(AuthError::SubjectBinding);
        }
        Ok(claims)
    }

    fn check_role(&self, credential: &Claims) -> Result<(), AuthError> {
        let expected = self.config.role.as_deref().unwrap_or_default();
        let actual = credential.payload.role.as_deref();
        if actual == Some(expected) {
            return Ok(());
        }
        Err(AuthError::RoleMismatch {
            expected: expected.to_string(),
            actual: actual.map(str::to_string),
        })
    }

    fn check_address(&self, credential: &Claims, remote_addr: Option<&str>) -> Result<(), AuthError> {
        let (Some(remote), Some(bound)) = (remote_addr, credential.payload.ip.as_deref()) else {
            return Ok(());
        };
        if same_address(bound, remote) {
            return Ok(());
        }

        match self.config.address_policy {
            AddressPolicy::Ignore => Ok(()),
            AddressPolicy::SoftWarn => {
                tracing::warn!(
                    subject = %credential.sub,
                    token_ip = %bound,
                    remote_ip = %remote,
                    "IP mismatch between credential and connection"
                );
                Ok(())
            }
            AddressPolicy::Reject => Err(AuthError::AddressMismatch {
                bound: bound.to_string(),
                remote: remote.to_string(),
            }),
        }
    }

    fn check_nonce(&self, claims: &Claims) -> Result<(), AuthError> {
        let Some(guard) = &self.replay else {
            return Ok(());
        };
        let nonce = claims.payload.nonce.as_deref().ok_or(AuthError::MissingNonce)?;
        // Verification accepts a token until exp + leeway; remember it that long.
        let leeway = i64::try_from(self.config.leeway_secs).unwrap_or(i64::MAX);
        let accepted_until = claims.exp.saturating_add(leeway);
        if guard.check_and_record(&claims.sub, nonce, accepted_until, Utc::now().timestamp()) {
            Ok(())
        } else {
            Err(AuthError::Replay)
        }
    }
}

fn missing(claim: &str) -> TokenError {
    TokenError::MissingClaim {
        claim: claim.to_string(),
    }
}

/// Compare addresses, treating IPv4-mapped IPv6 as the IPv4 address.
fn same_address(a: &str, b: &str) -> bool {
    match (a.parse::<IpAddr>(), b.parse::<IpAddr>()) {
        (Ok(a), Ok(b)) => a.to_canonical() == b.to_canonical(),
        _ => a == b,
    }
}
