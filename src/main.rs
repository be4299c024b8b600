mod audio;
mod auth;
mod config;
mod controller;
mod error;
mod logging;
mod model;
mod resolver;
mod router;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::BufReader;

use audio::{ChannelRef, LocalTransport, MpvOutput, PlaybackSession};
use config::Config;
use controller::QueueController;
use resolver::{CatalogProvider, SpotifyCatalog, TrackResolver, YtDlpSearch};
use router::CommandRouter;

const TOKEN_CHECK_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    let _log_guard = match logging::init_logging(&config.log_dir, &config.log_filter) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: Failed to initialize logging: {:#}", e);
            None
        }
    };

    tracing::info!("=== Jukebox-RS Starting ===");
    tracing::debug!(
        channel = %config.channel,
        yt_dlp = %config.yt_dlp_path.display(),
        player = %config.player_path.display(),
        "Configuration loaded"
    );

    // Catalog lookups are optional; free-text search works without them
    let catalog = match config.catalog_credentials() {
        Some(credentials) => match auth::authenticate_catalog(&credentials).await {
            Ok(client) => Some(SpotifyCatalog::new(client)),
            Err(e) => {
                tracing::error!(error = ?e, "Catalog authentication failed, Spotify queries disabled");
                None
            }
        },
        None => {
            tracing::warn!("No Spotify credentials configured, Spotify queries disabled");
            None
        }
    };

    if let Some(catalog) = catalog.clone() {
        spawn_token_refresh(catalog);
    }

    let search = YtDlpSearch::new(config.yt_dlp_path.clone(), config.search_results);
    let resolver = TrackResolver::new(
        Arc::new(search),
        catalog.map(|c| Arc::new(c) as Arc<dyn CatalogProvider>),
        config.resolve_timeout(),
    );

    let (session, status_rx) = PlaybackSession::new(
        Arc::new(LocalTransport::new(config.player_path.clone())),
        Arc::new(MpvOutput::new(config.player_path.clone())),
        config.connect_timeout(),
    );

    let controller = QueueController::new(resolver, session);
    let listener = controller.start_status_listener(status_rx);

    let router = CommandRouter::new(controller.clone(), ChannelRef(config.channel.clone()));

    println!("Jukebox ready. Type `!help` to see the list of commands.");
    let res = router
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await;

    controller.stop().await;
    listener.abort();

    if let Err(err) = res {
        tracing::error!(error = ?err, "Console error");
    }

    tracing::info!("Jukebox-RS shutting down");
    Ok(())
}

/// Periodically check the catalog token and refresh it before it expires
fn spawn_token_refresh(catalog: SpotifyCatalog) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TOKEN_CHECK_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = catalog.refresh_token_if_needed().await {
                tracing::warn!("Token refresh check failed: {}", e);
            }
        }
    });
}
