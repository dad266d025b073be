//! Registry data model and lookup seam
//!
//! This module defines the feature record shape returned by the cadastral
//! registry and the [`RegistryClient`] trait the orchestrator calls through.
//! The NSPD-backed implementation lives in [`nspd`].

pub mod nspd;

pub use nspd::NspdClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One parcel as returned by the registry: attribute bag plus optional geometry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Property envelope carrying the attribute options
    #[serde(default)]
    pub properties: Properties,
    /// Parcel geometry in geodetic degrees, if the registry has one
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

/// Property envelope around the attribute options bag
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Properties {
    #[serde(default)]
    pub options: ParcelOptions,
}

/// Attributes of a land record
///
/// Every field is optional: the registry omits whatever it has no data for,
/// and the formatter substitutes localized placeholders. Field names follow
/// the registry's wire format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParcelOptions {
    /// Kind of object, e.g. "Земельный участок"
    pub land_record_type: Option<String>,
    /// Human-readable address
    pub readable_address: Option<String>,
    /// Surveyed area in square meters; takes precedence over the recorded one
    pub specified_area: Option<f64>,
    /// Area as recorded in the land register, in square meters
    pub land_record_area: Option<f64>,
    /// Assessed cadastral cost in rubles
    pub cost_value: Option<f64>,
    /// Land category, e.g. "Земли населённых пунктов"
    pub land_record_category_type: Option<String>,
    /// Permitted use as established by the title document
    pub permitted_use_established_by_document: Option<String>,
}

/// Parcel geometry as (longitude, latitude) pairs in degrees
///
/// Only the polygon kinds carry coordinates the renderer can use; any other
/// kind the registry may emit is preserved as `Other` and treated as
/// "no rings" downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    /// A single polygon: outer ring first, optional hole rings after it
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
    /// Several polygons, each with its own ring list
    MultiPolygon { coordinates: Vec<Vec<Vec<[f64; 2]>>> },
    /// Any geometry kind the pipeline does not draw
    #[serde(other)]
    Other,
}

/// Result of a registry lookup that completed without a transport failure
#[derive(Debug, Clone)]
pub enum LookupOutcome {
    /// The registry returned a record for the identifier
    Found(FeatureRecord),
    /// The registry has no record for the identifier
    NotFound,
}

/// Errors that can occur when querying the registry
#[derive(Debug, Error)]
pub enum RegistryError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Registry answered with an unexpected HTTP status
    #[error("unexpected HTTP status {0} from registry")]
    UnexpectedStatus(u16),

    /// Failed to parse the registry response
    #[error("failed to parse registry response: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Lookup seam between the orchestrator and the registry integration
///
/// Kept as a trait so tests can substitute a scripted registry; the
/// production implementation is [`NspdClient`]. One call per request: the
/// core does not retry, paginate, or stream.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Looks up a single cadastral number
    async fn find(&self, cadastral_number: &str) -> Result<LookupOutcome, RegistryError>;
}
