//! Request orchestration
//!
//! Drives one lookup through cache → fetch → format → render and shapes the
//! reply. The registry client and the cache are injected at construction;
//! the orchestrator owns no global state.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::FixedOffset;
use tracing::{info, warn};

use crate::cache::MemoryCache;
use crate::format::{format_parcel, Ring};
use crate::registry::{FeatureRecord, LookupOutcome, RegistryClient};
use crate::render::MapRenderer;

/// Message shown when the registry has no record for the number
pub const NOT_FOUND_MESSAGE: &str = "❌ Объект с таким кадастровым номером не найден.";

/// Label on the refresh affordance offered with cached replies
pub const REFRESH_LABEL: &str = "🔄 Обновить информацию";

/// Offset of Moscow time, used for user-facing cache timestamps
const MOSCOW_OFFSET_SECS: i32 = 3 * 3600;

/// A reply to one lookup request
///
/// One text block always; a rendered map and a refresh affordance when the
/// request produced them.
#[derive(Debug, Clone)]
pub struct Reply {
    /// Markdown-flavored text block
    pub text: String,
    /// Path of the rendered map, when geometry was present and rendering
    /// succeeded
    pub map: Option<PathBuf>,
    /// Refresh affordance, offered with cache hits only
    pub refresh: Option<RefreshButton>,
}

/// Interactive affordance re-triggering a fetch for a cached identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshButton {
    /// Button caption
    pub label: String,
    /// Opaque token the transport hands back on activation; equals the
    /// identifier
    pub token: String,
}

impl Reply {
    fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            map: None,
            refresh: None,
        }
    }
}

/// Drives the lookup-cache-render pipeline
pub struct Orchestrator {
    registry: Arc<dyn RegistryClient>,
    cache: Arc<MemoryCache<FeatureRecord>>,
    renderer: MapRenderer,
}

impl Orchestrator {
    /// Creates an orchestrator over the given collaborators
    ///
    /// The cache is shared: the caller keeps its own handle and may hand the
    /// same instance to several orchestrators.
    pub fn new(
        registry: Arc<dyn RegistryClient>,
        cache: Arc<MemoryCache<FeatureRecord>>,
        renderer: MapRenderer,
    ) -> Self {
        Self {
            registry,
            cache,
            renderer,
        }
    }

    /// Handles a lookup request
    ///
    /// A cache hit is served from the cached record with a freshness
    /// annotation and a refresh affordance; a miss goes to the registry.
    pub async fn lookup(&self, identifier: &str) -> Reply {
        let number = identifier.trim();

        if let Some((record, fetched_at)) = self.cache.get(number).await {
            info!(number, "serving cached record");
            let formatted = format_parcel(&record);
            let mut text = formatted.text;
            let local = fetched_at.with_timezone(&moscow_offset());
            text.push_str(&format!(
                "\n\n🔁 *Данные из кэша от:* `{}`",
                local.format("%Y-%m-%d %H:%M:%S")
            ));
            let map = self.render_map(&formatted.rings, number).await;
            return Reply {
                text,
                map,
                refresh: Some(RefreshButton {
                    label: REFRESH_LABEL.to_string(),
                    token: number.to_string(),
                }),
            };
        }

        info!(number, "cache miss, fetching from registry");
        self.fetch_and_reply(number).await
    }

    /// Handles a refresh request
    ///
    /// Always fetches, bypassing the cache lookup, and overwrites whatever
    /// entry exists — no matter how fresh it is.
    pub async fn refresh(&self, identifier: &str) -> Reply {
        let number = identifier.trim();
        info!(number, "refresh requested, bypassing cache");
        self.fetch_and_reply(number).await
    }

    async fn fetch_and_reply(&self, number: &str) -> Reply {
        match self.registry.find(number).await {
            Ok(LookupOutcome::Found(record)) => {
                self.cache.set(number, record.clone()).await;
                let formatted = format_parcel(&record);
                let map = self.render_map(&formatted.rings, number).await;
                Reply {
                    text: formatted.text,
                    map,
                    refresh: None,
                }
            }
            Ok(LookupOutcome::NotFound) => Reply::text_only(NOT_FOUND_MESSAGE),
            Err(err) => Reply::text_only(format!("❌ Ошибка при получении данных: {err}")),
        }
    }

    /// Renders the map when there is geometry to draw
    ///
    /// A render failure degrades the reply to text-only instead of becoming
    /// a user-facing error.
    async fn render_map(&self, rings: &[Ring], number: &str) -> Option<PathBuf> {
        if rings.is_empty() {
            return None;
        }
        match self.renderer.render(rings, number).await {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(number, error = %err, "map rendering failed, replying with text only");
                None
            }
        }
    }
}

fn moscow_offset() -> FixedOffset {
    FixedOffset::east_opt(MOSCOW_OFFSET_SECS).expect("fixed offset is in range")
}
