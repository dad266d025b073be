//! Web Mercator math for the map renderer
//!
//! Converts geodetic degrees into "world pixel" coordinates of the Web
//! Mercator tile pyramid, where the world at zoom `z` is a square of
//! `256 * 2^z` pixels.

use std::f64::consts::PI;

use super::RenderError;

/// Edge length of one basemap tile in pixels
pub const TILE_SIZE: u32 = 256;

/// Deepest zoom level requested from the tile service
pub const MAX_ZOOM: u8 = 18;

/// Latitude bound of the Web Mercator projection
pub const MAX_LAT: f64 = 85.051_128_78;

/// Projects (longitude, latitude) degrees to world pixels at the given zoom
///
/// # Returns
/// * `Ok((x, y))` with `y` growing southwards, matching tile row order
/// * `Err(RenderError::OutOfProjection)` when the point lies outside the
///   projection bounds
pub fn project(lon: f64, lat: f64, zoom: u8) -> Result<(f64, f64), RenderError> {
    if !(-MAX_LAT..=MAX_LAT).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(RenderError::OutOfProjection { lon, lat });
    }

    let world = f64::from(TILE_SIZE) * 2.0_f64.powi(i32::from(zoom));
    let x = (lon + 180.0) / 360.0 * world;
    let lat_rad = lat * PI / 180.0;
    let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * world;
    Ok((x, y))
}
