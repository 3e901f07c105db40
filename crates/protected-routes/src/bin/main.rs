//! Binary entry point for the protected-routes demo server.

use anyhow::{Context, Result};
use axum::extract::Path;
use clap::Parser;
use http::Method;
use protected_routes::auth::jwt::JwtValidator;
use protected_routes::auth::keys::{JwkSetStore, JwkSource, RemoteJwkSet};
use protected_routes::{ProtectedRouter, ProtectedRoutesConfig, ProtectionConfig, RouteDescriptor};
use std::path::PathBuf;
use url::Url;

/// Demo server with bearer-protected routes and RFC 9728 metadata.
#[derive(Parser)]
#[command(name = "protected-routes", version, about)]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:3000")]
    listen: String,

    /// Origin advertised in metadata documents and challenges.
    #[arg(long, default_value = "http://localhost:3000")]
    origin: String,

    /// Authorization server issuing tokens. Defaults to the origin.
    #[arg(long = "authorization-server")]
    authorization_servers: Vec<String>,

    /// Protect routes that do not say otherwise.
    #[arg(long)]
    all_routes_require_authorization: bool,

    /// Local JWK set used to verify tokens.
    #[arg(long, conflicts_with = "jwks_url", required_unless_present = "jwks_url")]
    jwks_file: Option<PathBuf>,

    /// Remote JWK set used to verify tokens.
    #[arg(long)]
    jwks_url: Option<Url>,

    /// Accepted `aud` value. Without it, an audience must prefix the
    /// requested URL.
    #[arg(long)]
    audience: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    }
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let servers = if cli.authorization_servers.is_empty() {
        vec![cli.origin.clone()]
    } else {
        cli.authorization_servers
    };
    let config = ProtectedRoutesConfig::new(&cli.origin, servers)?
        .all_routes_require_authorization(cli.all_routes_require_authorization);

    let jwks = match (cli.jwks_file, cli.jwks_url) {
        (Some(path), _) => {
            let json = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            JwkSource::from(JwkSetStore::from_json(&json)?)
        }
        (None, Some(url)) => JwkSource::from(RemoteJwkSet::new(url)),
        (None, None) => anyhow::bail!("one of --jwks-file or --jwks-url is required"),
    };

    let expected = cli.audience;
    let validator = JwtValidator::new(
        jwks,
        |sub: String| async move { anyhow::Ok(!sub.is_empty()) },
        move |aud: String, url: String| {
            let accepted = match &expected {
                Some(expected) => aud == *expected,
                None => url.starts_with(&aud),
            };
            async move { anyhow::Ok(accepted) }
        },
    );

    let app = ProtectedRouter::new(config, validator)
        .get("/", hello)?
        .post("/", hello)?
        .get("/protected", hello)?
        .get("/protected/:arg", echo)?
        .route(RouteDescriptor::new(Method::GET, "/public").protected(false), hello)?
        .route(
            RouteDescriptor::new(Method::GET, "/admin")
                .protected(ProtectionConfig::scopes(["admin"])),
            hello,
        )?
        .into_router();

    let listener = tokio::net::TcpListener::bind(&cli.listen)
        .await
        .with_context(|| format!("failed to bind {}", cli.listen))?;
    tracing::info!(addr = %cli.listen, origin = %cli.origin, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn hello() -> &'static str {
    "Hello, world!"
}

async fn echo(Path(arg): Path<String>) -> String {
    format!("Hello, {arg}!")
}
