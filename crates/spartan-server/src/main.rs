use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use spartan_auth::TokenAuthenticator;
use spartan_core::{KeysConfig, SpartanConfig};
use spartan_server::{AttestationState, router, routes};
use spartan_token::{KeyPair, Keychain, PublicKey};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "spartan-server",
    version,
    about = "Spartan Attestation Service and protected demo endpoint"
)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "SPARTAN_CONFIG", default_value = "spartan.yaml")]
    config: PathBuf,

    /// Override `server.bind` from the configuration file
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = SpartanConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;

    let app = build_app(&config)?;

    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    tracing::info!("spartan-server listening on {}", bind);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

fn build_app(config: &SpartanConfig) -> Result<Router> {
    let mut app = routes::health_router();
    let as_keys = load_as_keys(&config.keys)?;

    if let Some(service) = &config.attestation_service {
        let keys = as_keys.clone().context(
            "attestation_service needs an AS key pair (keys.as_private + keys.as_public, or keys.keys_dir)",
        )?;
        let state = AttestationState::new(keys, service.clone())
            .context("Invalid attestation_service configuration")?;
        tracing::info!(
            issuer = %service.issuer,
            grants = service.grants.len(),
            "Attestation service enabled"
        );
        app = app.merge(router(Arc::new(state)));
    }

    if let Some(auth) = &config.authenticator {
        let as_public = match PublicKey::from_source(&config.keys.as_public)
            .context("Failed to load AS public key")?
        {
            Some(key) => key,
            None => as_keys
                .map(|keys| keys.public_key().clone())
                .context("authenticator needs keys.as_public")?,
        };
        let authenticator = TokenAuthenticator::new(auth.clone(), as_public)
            .context("Invalid authenticator configuration")?;
        tracing::info!(
            role = auth.role.as_deref().unwrap_or_default(),
            token_type = %auth.token_type,
            path = routes::AUTH_TEST_PATH,
            "Protected endpoint enabled"
        );
        app = app.merge(routes::protected_router(Arc::new(authenticator)));
    }

    Ok(app.layer(TraceLayer::new_for_http()))
}

/// AS key pair from explicit sources, else the current version in `keys_dir`.
fn load_as_keys(keys: &KeysConfig) -> Result<Option<KeyPair>> {
    if let Some(pair) = KeyPair::from_sources(&keys.as_private, &keys.as_public)
        .context("Failed to load AS key pair")?
    {
        return Ok(Some(pair));
    }

    let Some(dir) = &keys.keys_dir else {
        return Ok(None);
    };
    let keychain = Keychain::load(dir, false)
        .with_context(|| format!("Failed to load keychain from {}", dir.display()))?;
    let record = keychain
        .current()
        .with_context(|| format!("No current key version in {}", dir.display()))?;
    tracing::info!(kid = %record.kid, "Using AS key from keychain");
    Ok(Some(record.key_pair()?))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
