//! HTTP server and Attestation Service settings.

use serde::{Deserialize, Serialize};

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, e.g. "127.0.0.1:3000"
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// A role the AS hands out, and to whom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role: String,

    /// Application subjects (public key hashes) granted the role. `*` grants it
    /// to every authenticated application.
    #[serde(default)]
    pub members: Vec<String>,
}

impl RoleGrant {
    pub fn includes(&self, subject: &str) -> bool {
        self.members.iter().any(|m| m == "*" || m == subject)
    }
}

/// Attestation Service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationServiceConfig {
    /// `iss` claim of minted role credentials.
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Lifetime of minted role credentials, in seconds.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,

    /// Bind the caller's address into the credential (`ip` claim).
    #[serde(default = "default_true")]
    pub bind_address: bool,

    #[serde(default)]
    pub grants: Vec<RoleGrant>,
}

fn default_issuer() -> String {
    "spartan-domain".to_string()
}

fn default_token_ttl() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

impl Default for AttestationServiceConfig {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            token_ttl_secs: default_token_ttl(),
            bind_address: true,
            grants: Vec::new(),
        }
    }
}

impl AttestationServiceConfig {
    /// Roles granted to `subject`, in configuration order.
    pub fn roles_for<'a>(&'a self, subject: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.grants
            .iter()
            .filter(move |grant| grant.includes(subject))
            .map(|grant| grant.role.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_for_subject() {
        let config = AttestationServiceConfig {
            grants: vec![
                RoleGrant {
                    role: "SuperRole".to_string(),
                    members: vec!["*".to_string()],
                },
                RoleGrant {
                    role: "Billing".to_string(),
                    members: vec!["abc123".to_string()],
                },
            ],
            ..Default::default()
        };

        let roles: Vec<_> = config.roles_for("abc123").collect();
        assert_eq!(roles, vec!["SuperRole", "Billing"]);

        let roles: Vec<_> = config.roles_for("other").collect();
        assert_eq!(roles, vec!["SuperRole"]);
    }
}
