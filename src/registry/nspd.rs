//! NSPD geoportal client
//!
//! Queries the public NSPD thematic search API for a cadastral number and
//! maps the response onto [`FeatureRecord`]. The portal serves geometry in
//! EPSG:3857 meters; coordinates are converted to geodetic degrees on
//! ingestion so the rest of the pipeline only ever sees (longitude, latitude)
//! pairs.

use std::f64::consts::PI;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{FeatureRecord, Geometry, LookupOutcome, Properties, RegistryClient, RegistryError};

/// Base URL for the NSPD thematic search API
const NSPD_SEARCH_URL: &str = "https://nspd.gov.ru/api/geoportal/v2/search/geoportal";

/// Thematic search section covering land records
const LAND_RECORDS_SEARCH_ID: u32 = 1;

/// Equatorial radius used by the Web Mercator projection, in meters
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Client for the NSPD public registry
#[derive(Debug, Clone)]
pub struct NspdClient {
    client: Client,
}

impl Default for NspdClient {
    fn default() -> Self {
        Self::new()
    }
}

impl NspdClient {
    /// Creates a new NspdClient with default settings
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Creates a new NspdClient with a custom HTTP client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RegistryClient for NspdClient {
    async fn find(&self, cadastral_number: &str) -> Result<LookupOutcome, RegistryError> {
        let search_id = LAND_RECORDS_SEARCH_ID.to_string();
        let response = self
            .client
            .get(NSPD_SEARCH_URL)
            .query(&[
                ("query", cadastral_number),
                ("thematicSearchId", search_id.as_str()),
            ])
            .send()
            .await?;

        // The portal answers an unknown number with 204 No Content.
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(LookupOutcome::NotFound);
        }
        if !response.status().is_success() {
            return Err(RegistryError::UnexpectedStatus(response.status().as_u16()));
        }

        let body = response.text().await?;
        match first_record(&body)? {
            Some(record) => Ok(LookupOutcome::Found(record)),
            None => Ok(LookupOutcome::NotFound),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Option<FeatureCollection>,
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<RawFeature>,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    properties: Properties,
    #[serde(default)]
    geometry: Option<RawGeometry>,
}

/// Geometry as it arrives from the portal: shape plus an optional CRS stamp
#[derive(Debug, Deserialize)]
struct RawGeometry {
    #[serde(flatten)]
    shape: Geometry,
    #[serde(default)]
    crs: Option<Crs>,
}

#[derive(Debug, Deserialize)]
struct Crs {
    #[serde(default)]
    properties: CrsProperties,
}

#[derive(Debug, Default, Deserialize)]
struct CrsProperties {
    #[serde(default)]
    name: Option<String>,
}

/// Parses a search response body and returns its first feature, if any
fn first_record(body: &str) -> Result<Option<FeatureRecord>, serde_json::Error> {
    let parsed: SearchResponse = serde_json::from_str(body)?;
    Ok(parsed
        .data
        .and_then(|collection| collection.features.into_iter().next())
        .map(into_record))
}

fn into_record(feature: RawFeature) -> FeatureRecord {
    let geometry = feature.geometry.map(|raw| {
        if is_mercator(raw.crs.as_ref()) {
            reproject_to_degrees(raw.shape)
        } else {
            raw.shape
        }
    });
    FeatureRecord {
        properties: feature.properties,
        geometry,
    }
}

fn is_mercator(crs: Option<&Crs>) -> bool {
    crs.and_then(|c| c.properties.name.as_deref())
        .map(|name| name.ends_with("3857"))
        // The portal omits the CRS stamp on some layers but serves 3857 regardless.
        .unwrap_or(true)
}

fn reproject_to_degrees(shape: Geometry) -> Geometry {
    match shape {
        Geometry::Polygon { coordinates } => Geometry::Polygon {
            coordinates: coordinates.into_iter().map(ring_to_degrees).collect(),
        },
        Geometry::MultiPolygon { coordinates } => Geometry::MultiPolygon {
            coordinates: coordinates
                .into_iter()
                .map(|polygon| polygon.into_iter().map(ring_to_degrees).collect())
                .collect(),
        },
        other => other,
    }
}

fn ring_to_degrees(ring: Vec<[f64; 2]>) -> Vec<[f64; 2]> {
    ring.into_iter()
        .map(|[x, y]| mercator_to_lon_lat(x, y))
        .collect()
}

/// Converts EPSG:3857 meters to (longitude, latitude) degrees
fn mercator_to_lon_lat(x: f64, y: f64) -> [f64; 2] {
    let lon = x / EARTH_RADIUS_M * 180.0 / PI;
    let lat = ((y / EARTH_RADIUS_M).exp().atan() * 2.0 - PI / 2.0) * 180.0 / PI;
    [lon, lat]
}
