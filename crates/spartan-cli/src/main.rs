use clap::{Parser, Subcommand};
use spartan_token::Algorithm;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "spartan", version, about = "Spartan token and key tools")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect, verify, sign and fetch tokens
    Token {
        #[command(subcommand)]
        cmd: TokenCommand,
    },

    /// Inspect key material
    Keys {
        #[command(subcommand)]
        cmd: KeysCommand,
    },
}

#[derive(Subcommand, Debug)]
enum TokenCommand {
    /// Print a token's header and claims without verifying it
    Inspect {
        /// Token string or path to a file containing it
        token: String,
    },

    /// Verify a token's signature, expiry and algorithm
    Verify {
        /// Token string or path to a file containing it
        token: String,

        /// Public key: PEM file path or PEM text
        #[arg(long, env = "SPARTAN_PUBLIC_KEY")]
        key: Option<String>,

        /// Accepted algorithm (repeatable)
        #[arg(long = "alg", value_parser = parse_algorithm, default_value = "ES256")]
        algorithms: Vec<Algorithm>,

        /// Clock skew tolerated on expiry, in seconds
        #[arg(long, default_value_t = 0)]
        leeway: u64,
    },

    /// Sign a token
    Sign {
        /// Private key: PEM file path or PEM text
        #[arg(long, env = "SPARTAN_PRIVATE_KEY")]
        key: Option<String>,

        /// Matching public key: PEM file path or PEM text
        #[arg(long, env = "SPARTAN_PUBLIC_KEY")]
        public_key: Option<String>,

        /// Subject; defaults to the hash of the public key
        #[arg(long)]
        sub: Option<String>,

        /// Issuer
        #[arg(long, default_value = "self")]
        iss: String,

        /// Lifetime, e.g. "60s", "30m", "1h"
        #[arg(long, default_value = "1h")]
        exp: String,

        #[arg(long = "alg", value_parser = parse_algorithm, default_value = "ES256")]
        algorithm: Algorithm,

        /// Payload claims as a JSON object, e.g. '{"type":"as-app-token","role":"SuperRole"}'
        #[arg(long)]
        claims: Option<String>,
    },

    /// Obtain a token for a role from the Attestation Service (or the cache)
    Fetch {
        /// Path to the configuration file
        #[arg(short, long, env = "SPARTAN_CONFIG", default_value = "spartan.yaml")]
        config: PathBuf,

        #[arg(long)]
        role: String,

        /// Print the raw role credential instead of a service envelope
        #[arg(long, default_value_t = false)]
        raw: bool,
    },
}

#[derive(Subcommand, Debug)]
enum KeysCommand {
    /// List the versions in a key directory
    List {
        dir: PathBuf,

        /// Ignore private keys
        #[arg(long, default_value_t = false)]
        public_only: bool,
    },

    /// Print the subject (SHA-256 of the PEM) for a public key
    Subject {
        /// Public key: PEM file path or PEM text
        key: String,
    },
}

fn parse_algorithm(s: &str) -> Result<Algorithm, String> {
    s.parse::<Algorithm>()
        .map_err(|_| format!("unknown algorithm '{s}'"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Token { cmd } => match cmd {
            TokenCommand::Inspect { token } => commands::token::inspect(&token)?,
            TokenCommand::Verify {
                token,
                key,
                algorithms,
                leeway,
            } => commands::token::verify(&token, key, algorithms, leeway)?,
            TokenCommand::Sign {
                key,
                public_key,
                sub,
                iss,
                exp,
                algorithm,
                claims,
            } => {
                let request = commands::token::SignRequest {
                    sub,
                    iss,
                    exp,
                    algorithm,
                    claims,
                };
                println!("{}", commands::token::sign(key, public_key, request)?);
            }
            TokenCommand::Fetch { config, role, raw } => {
                commands::token::fetch(&config, &role, raw).await?
            }
        },

        Command::Keys { cmd } => match cmd {
            KeysCommand::List { dir, public_only } => commands::keys::list(&dir, public_only)?,
            KeysCommand::Subject { key } => commands::keys::subject(&key)?,
        },
    }

    Ok(())
}
