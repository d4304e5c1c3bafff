//! Learning platform API command-line client
//!
//! Thin host around `api-client`: loads configuration, opens the persisted
//! credential pair, and issues calls. Token refresh happens transparently
//! inside the client; this binary never logs in on its own.
//!
//! ```text
//! learning-api [--config PATH] get <path>
//! learning-api [--config PATH] status
//! learning-api [--config PATH] logout
//! ```

mod config;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use api_client::{ApiClient, ApiRequest, ApiResponse};
use session_auth::{CredentialPair, FileTokenStore};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Parsed command line
#[derive(Debug, PartialEq, Eq)]
struct Cli {
    config_path: Option<String>,
    command: Command,
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    /// Authenticated GET, body printed to stdout
    Get { path: String },
    /// Whether credentials are stored, and whose
    Status,
    /// Clear stored credentials
    Logout,
}

const USAGE: &str = "usage: learning-api [--config PATH] <get PATH | status | logout>";

fn parse_args(args: &[String]) -> Result<Cli> {
    let mut config_path = None;
    let mut positional = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let value = iter.next().context("--config needs a path")?;
            config_path = Some(value.clone());
        } else if arg == "-h" || arg == "--help" {
            bail!("{USAGE}");
        } else {
            positional.push(arg.as_str());
        }
    }

    let command = match positional.as_slice() {
        ["get", path] => Command::Get {
            path: (*path).to_string(),
        },
        ["status"] => Command::Status,
        ["logout"] => Command::Logout,
        _ => bail!("{USAGE}"),
    };

    Ok(Cli {
        config_path,
        command,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs on stderr; stdout is reserved for response bodies
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_args(&args)?;

    let (config_path, explicit) = Config::resolve_path(cli.config_path.as_deref());
    let config = if explicit || config_path.exists() {
        Config::load(&config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?
    } else {
        Config::from_env().context("invalid configuration")?
    };

    info!(
        base_url = %config.api.base_url,
        timeout_secs = config.api.timeout_secs,
        credentials = %config.credentials.path.display(),
        "configuration loaded"
    );

    let store = FileTokenStore::load(config.credentials.path.clone())
        .await
        .with_context(|| {
            format!(
                "failed to open credential file {}",
                config.credentials.path.display()
            )
        })?;
    let client = ApiClient::new(config.client_config(), Arc::new(store))
        .context("failed to build API client")?;

    match cli.command {
        Command::Get { path } => {
            let response = client
                .send(ApiRequest::get(path.as_str()))
                .await
                .with_context(|| format!("GET {path} failed"))?;
            println!("{}", render_body(&response));
            if !response.status().is_success() {
                bail!("GET {path} returned {}", response.status());
            }
        }
        Command::Status => {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            println!("{}", status_line(client.store().get().as_ref(), now));
        }
        Command::Logout => {
            client.logout().await.context("failed to clear credentials")?;
            println!("logged out");
        }
    }

    Ok(())
}

/// Pretty-print JSON bodies; anything else is printed as text.
fn render_body(response: &ApiResponse) -> String {
    match response.json::<serde_json::Value>() {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| response.text()),
        Err(_) => response.text(),
    }
}

fn status_line(pair: Option<&CredentialPair>, now_secs: u64) -> String {
    let Some(pair) = pair else {
        return "logged out".to_string();
    };
    match session_auth::decode_unverified(pair.access()) {
        Ok(claims) => {
            let state = if claims.is_expired_at(now_secs) {
                "expired, will refresh on next call"
            } else {
                "valid"
            };
            format!(
                "logged in as {} (access token {state}, exp {})",
                claims.sub, claims.exp as u64
            )
        }
        Err(_) => "logged in (access token is not a JWT)".to_string(),
    }
}
