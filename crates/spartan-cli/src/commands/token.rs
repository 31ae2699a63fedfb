//! Token commands.
//!
//! `spartan token inspect` - Print a token's contents without verifying it.
//! `spartan token verify` - Verify a token against a public key.
//! `spartan token sign` - Sign a token with a local key pair.
//! `spartan token fetch` - Run the attestation client for a role.

use super::file_or_value;
use anyhow::{Context, bail};
use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use spartan_client::{AttestationClient, FetchOptions};
use spartan_core::SpartanConfig;
use spartan_token::{Algorithm, KeyPair, Payload, PublicKey, SignOptions, VerifyOptions};
use std::path::Path;

/// Parse a duration like "60s", "30m", "1h" or "7d" into seconds.
fn parse_duration(s: &str) -> anyhow::Result<u64> {
    let s = s.trim().to_lowercase();

    let (digits, unit) = match s.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => (&s[..i], c),
        _ => (s.as_str(), 's'),
    };
    let value: u64 = digits
        .parse()
        .with_context(|| format!("Invalid duration: {s}"))?;

    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86400,
        other => bail!("Unknown duration unit '{other}' in {s}"),
    };
    let secs = value
        .checked_mul(multiplier)
        .with_context(|| format!("Duration too large: {s}"))?;
    if secs == 0 {
        bail!("Duration must be positive");
    }
    Ok(secs)
}

fn read_token(token: &str) -> anyhow::Result<String> {
    Ok(file_or_value(token)?.trim().to_string())
}

fn describe_time(timestamp: i64) -> String {
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| timestamp.to_string())
}

/// Inspect a token without verification.
pub fn inspect(token: &str) -> anyhow::Result<()> {
    let token = read_token(token)?;
    let decoded = spartan_token::decode(&token).context("Failed to decode token")?;

    let output = json!({
        "header": &decoded.header,
        "claims": &decoded.claims,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    let now = Utc::now().timestamp();
    let state = if decoded.claims.is_expired_at(now) {
        "expired"
    } else {
        "not expired"
    };
    eprintln!("Expires: {} ({state})", describe_time(decoded.claims.exp));
    eprintln!("Signature NOT verified; use `spartan token verify` for that.");

    Ok(())
}

/// Verify a token and print its claims.
pub fn verify(
    token: &str,
    key: Option<String>,
    algorithms: Vec<Algorithm>,
    leeway: u64,
) -> anyhow::Result<()> {
    let key = key.context("Public key not provided. Pass --key <path> or set SPARTAN_PUBLIC_KEY")?;
    let public_key = PublicKey::from_pem(file_or_value(&key)?).context("Failed to load public key")?;
    let token = read_token(token)?;

    let claims = spartan_token::verify(&token, &public_key, &VerifyOptions::new(algorithms, leeway))
        .context("Token verification failed")?;

    println!("✔ Token is valid");
    println!();
    println!("Token Details:");
    println!("  Subject: {}", claims.sub);
    println!("  Issuer:  {}", claims.iss);
    println!("  Type:    {}", claims.payload.kind.as_deref().unwrap_or("(none)"));
    if let Some(role) = &claims.payload.role {
        println!("  Role:    {role}");
    }
    println!("  Expires: {}", describe_time(claims.exp));

    Ok(())
}

/// Inputs of `token sign` besides the keys.
#[derive(Debug, Clone)]
pub struct SignRequest {
    pub sub: Option<String>,
    pub iss: String,
    pub exp: String,
    pub algorithm: Algorithm,
    pub claims: Option<String>,
}

/// Sign a token and return it.
pub fn sign(
    private_key: Option<String>,
    public_key: Option<String>,
    request: SignRequest,
) -> anyhow::Result<String> {
    let private_key = private_key
        .context("Private key not provided. Pass --key <path> or set SPARTAN_PRIVATE_KEY")?;
    let public_key = public_key
        .context("Public key not provided. Pass --public-key <path> or set SPARTAN_PUBLIC_KEY")?;
    let keys = KeyPair::from_pem(&file_or_value(&private_key)?, file_or_value(&public_key)?)
        .context("Failed to load key pair")?;

    let payload = match &request.claims {
        Some(raw) => {
            let value: Value = serde_json::from_str(raw).context("--claims must be JSON")?;
            if !value.is_object() {
                bail!("--claims must be a JSON object");
            }
            serde_json::from_value::<Payload>(value).context("Invalid claims")?
        }
        None => Payload::default(),
    };

    let subject = request.sub.unwrap_or_else(|| keys.subject());
    let options = SignOptions::new(subject, request.iss)
        .expires_in(parse_duration(&request.exp)?)
        .algorithm(request.algorithm);

    spartan_token::sign(&payload, &keys, &options).context("Failed to sign token")
}

/// Fetch a token for `role` using the `attestation` section of `config_path`.
pub async fn fetch(config_path: &Path, role: &str, raw: bool) -> anyhow::Result<()> {
    let config = SpartanConfig::from_file(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    let attestation = config.require_attestation()?.clone();

    let keys = KeyPair::from_sources(&config.keys.app_private, &config.keys.app_public)
        .context("Failed to load application key pair")?
        .context("keys.app_private and keys.app_public must both be configured")?;

    let client = AttestationClient::new(attestation, keys)?;
    let options = if raw {
        FetchOptions::credential()
    } else {
        FetchOptions::default()
    };

    let token = client
        .fetch(role, &options)
        .await
        .with_context(|| format!("Failed to obtain a token for role {role}"))?;
    tracing::debug!(subject = %client.subject(), role = %role, "Fetched token");
    println!("{token}");

    Ok(())
}
