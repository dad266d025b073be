//! Basemap tile fetching
//!
//! Tile access goes through the [`TileFetcher`] trait so the renderer can be
//! exercised in tests without a network. The production fetcher pulls PNG
//! tiles from the CartoDB Positron service.

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

/// URL template for the basemap tile service
const TILE_URL_TEMPLATE: &str = "https://basemaps.cartocdn.com/light_all/{z}/{x}/{y}.png";

/// Errors that can occur when fetching a single basemap tile
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// HTTP request failed or returned a non-success status
    #[error("tile request failed: {0}")]
    Http(String),
}

/// Source of encoded basemap tiles, addressed by pyramid coordinates
#[async_trait]
pub trait TileFetcher: Send + Sync {
    /// Returns the encoded image bytes of the tile at (zoom, x, y)
    async fn fetch_tile(&self, zoom: u8, x: u32, y: u32) -> Result<Vec<u8>, TileError>;
}

/// Tile fetcher backed by the CartoDB Positron HTTP service
#[derive(Debug, Clone)]
pub struct HttpTileFetcher {
    client: Client,
    url_template: String,
}

impl HttpTileFetcher {
    /// Creates a fetcher for the default tile service
    pub fn new(client: Client) -> Self {
        Self {
            client,
            url_template: TILE_URL_TEMPLATE.to_string(),
        }
    }

    /// Overrides the tile service URL template
    ///
    /// The template must contain `{z}`, `{x}` and `{y}` placeholders.
    #[allow(dead_code)]
    pub fn with_url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = template.into();
        self
    }

    fn tile_url(&self, zoom: u8, x: u32, y: u32) -> String {
        self.url_template
            .replace("{z}", &zoom.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }
}

#[async_trait]
impl TileFetcher for HttpTileFetcher {
    async fn fetch_tile(&self, zoom: u8, x: u32, y: u32) -> Result<Vec<u8>, TileError> {
        let url = self.tile_url(zoom, x, y);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TileError::Http(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(TileError::Http(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| TileError::Http(format!("failed to read response: {e}")))
    }
}
