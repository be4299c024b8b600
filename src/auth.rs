use anyhow::{Context, Result};
use rspotify::{ClientCredsSpotify, Config, Credentials};

use crate::config::CatalogCredentials;

/// Obtain a catalog token with the client-credentials grant.
///
/// No user login is involved; the token only grants access to public catalog data.
pub async fn authenticate_catalog(credentials: &CatalogCredentials) -> Result<ClientCredsSpotify> {
    tracing::info!("Requesting catalog access token");

    let spotify = ClientCredsSpotify::with_config(
        Credentials::new(&credentials.client_id, &credentials.client_secret),
        Config {
            token_cached: false,
            token_refreshing: false,
            ..Default::default()
        },
    );

    spotify
        .request_token()
        .await
        .context("catalog client-credentials grant failed")?;

    tracing::info!("Catalog access token acquired");
    Ok(spotify)
}
