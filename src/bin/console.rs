//! Headless console session: stdin lines play the part of final
//! transcripts, synthesized speech is printed and paced.
//!
//! Reads the config from the path given as the first argument, falling
//! back to the default config path, falling back to defaults. All tracing
//! output goes to stderr so stdout stays a clean conversation transcript.

use colloquy::config::SessionConfig;
use colloquy::llm::ApiModelStream;
use colloquy::session::SessionCoordinator;
use colloquy::speech::{ConsoleInput, ConsoleOutput};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => SessionConfig::from_file(std::path::Path::new(&path))?,
        None => {
            let path = SessionConfig::default_config_path();
            if path.exists() {
                SessionConfig::from_file(&path)?
            } else {
                SessionConfig::default()
            }
        }
    };

    tracing::info!(
        "colloquy-console starting (model: {} at {})",
        config.model.api_model,
        config.model.api_url
    );

    let model = Arc::new(ApiModelStream::new(&config.model));
    let coordinator = SessionCoordinator::new(
        config,
        Box::new(ConsoleInput::new()),
        Box::new(ConsoleOutput::default()),
        model,
    );
    let handle = coordinator.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping session");
            handle.stop(false);
        }
    });

    coordinator.run().await.map_err(|e| {
        tracing::error!("session ended with error: {e}");
        anyhow::anyhow!("session failed: {e}")
    })?;

    tracing::info!("colloquy-console shut down cleanly");
    Ok(())
}
