// Strength board entry point.
//
// Startup sequence:
// 1. Initialize tracing (stderr, so stdout carries only the rendered board)
// 2. Load config
// 3. Build the snapshot cache for the configured data source
// 4. Load, score and render
// 5. Keep polling for changes until Ctrl+C, if enabled

mod app;
mod render;

use anyhow::Context;
use strength_core::config;
use strength_core::snapshot::SnapshotCache;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("Strength board starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    let base_dir = std::env::current_dir().context("failed to read working directory")?;
    let source = config.data_source(&base_dir);
    info!(
        "Config loaded: data={}{}, metric={}, reference={}",
        source.path.display(),
        source
            .sheet
            .as_deref()
            .map(|s| format!(" [{s}]"))
            .unwrap_or_default(),
        config.scoring.metric_field,
        config.scoring.reference_policy
    );

    // 3. Snapshot cache
    let cache = SnapshotCache::new(source, config.alias_table());
    let mut board = app::Board::new(cache, config.score_request(), config.output.format);

    // 4 + 5. Render, then poll if configured
    let mut stdout = std::io::stdout();
    app::run(&mut board, &mut stdout, config.poll_interval(), shutdown_signal())
        .await
        .context("strength board failed")?;

    info!("Strength board shut down cleanly");
    Ok(())
}

/// Resolves on Ctrl+C. If the handler cannot be installed, never resolves.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Initialize tracing to stderr.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("strength_board=info,strength_core=info,warn")
            }),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
