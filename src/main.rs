use anyhow::Context;
use book_summarizer::{api, config, logging, processing::SummaryService, uploads::UploadSettings};
use clap::Parser;
use std::net::Ipv4Addr;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Streaming document summarization API.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Directory containing config.json, tokenizer.json, and model.safetensors (overrides MODEL_DIR).
    #[arg(long, value_name = "DIR")]
    model_dir: Option<PathBuf>,
    /// Port to listen on (overrides SERVER_PORT).
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing();

    let mut settings = config::load_config().context("Failed to load config from environment")?;
    if let Some(model_dir) = cli.model_dir {
        settings.model_dir = model_dir;
    }
    if let Some(port) = cli.port {
        settings.server_port = Some(port);
    }
    let config = config::install_config(settings);

    let service = SummaryService::load(config).with_context(|| {
        format!(
            "Failed to load summarization model from {}",
            config.model_dir.display()
        )
    })?;
    let app = api::create_router(Arc::new(service), UploadSettings::from_config(config));

    let (listener, port) = bind_listener(config.server_port, config.port_range.clone())
        .await
        .context("Failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

/// Bind the requested port, or the first free port in `fallback` when none was requested.
async fn bind_listener(
    requested: Option<u16>,
    fallback: RangeInclusive<u16>,
) -> Result<(TcpListener, u16), std::io::Error> {
    if let Some(port) = requested {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    let (first, last) = (*fallback.start(), *fallback.end());
    for port in fallback {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => return Ok((listener, port)),
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use");
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        format!("No free port between {first} and {last}"),
    ))
}
