use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use whorl::{Gateway, NullDriver, RegistrySink, SessionRegistry, SessionTiming};
use whorl::{telemetry, web};
use whorlconf::WhorlConfig;

/// The whorl enrollment daemon
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of ./whorl.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overriding the configured one
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config =
        WhorlConfig::load_with_override(cli.config.as_deref()).context("Failed to load config")?;
    telemetry::init(&config.telemetry.log_level);

    let port = cli.port.unwrap_or(config.bind.http_port);
    let addr = format!("{}:{}", config.bind.http_host, port);

    let registry = SessionRegistry::new_shared();
    let sink = Arc::new(RegistrySink::new(registry.clone()));
    let gateway = Arc::new(Gateway::new(
        registry,
        Arc::new(NullDriver),
        sink,
        SessionTiming::from(&config.session),
    ));

    let app = web::router(web::WebState { gateway });
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, "whorl listening");
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
