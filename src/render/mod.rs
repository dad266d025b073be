//! Map rendering for parcel polygons
//!
//! Projects polygon rings onto the Web Mercator plane, picks a zoom level so
//! the padded bounding box fits the canvas, composites fetched basemap tiles,
//! and draws the boundary with a translucent fill. Output is a PNG named
//! after the identifier; rendering the same identifier again overwrites the
//! previous file.

mod mercator;
mod tiles;

pub use tiles::{HttpTileFetcher, TileError, TileFetcher};

use std::path::PathBuf;
use std::sync::Arc;

use ab_glyph::{FontVec, PxScale};
use futures::future::join_all;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use thiserror::Error;
use tiny_skia::{
    Color, FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke, Transform,
};
use tracing::{debug, warn};

use crate::format::Ring;
use mercator::{project, MAX_ZOOM, TILE_SIZE};

/// Canvas edge length in pixels
const CANVAS_SIZE: u32 = 800;

/// Fraction of the bounding box extent added as margin on each side
const PADDING_RATIO: f64 = 0.2;

/// Background shown where a basemap tile is missing or failed to load
const FALLBACK_TILE_COLOR: (u8, u8, u8) = (221, 221, 221);

/// Candidate font files for the title and axis captions
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Errors fatal to a render call
///
/// No partial image is written on failure: validation and projection run
/// before anything touches the filesystem.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No rings to draw
    #[error("no polygon rings to render")]
    EmptyGeometry,

    /// A ring has too few points to form a polygon
    #[error("degenerate ring with {0} points, need at least 3")]
    DegenerateRing(usize),

    /// A vertex lies outside the Web Mercator projection bounds
    #[error("coordinate ({lon}, {lat}) outside projection bounds")]
    OutOfProjection { lon: f64, lat: f64 },

    /// Rasterization failed
    #[error("rasterization failed: {0}")]
    Raster(String),

    /// Writing or encoding the output image failed
    #[error("failed to write image: {0}")]
    Output(#[from] image::ImageError),
}

/// Renders parcel polygons over fetched basemap tiles
pub struct MapRenderer {
    tiles: Arc<dyn TileFetcher>,
    out_dir: PathBuf,
}

impl MapRenderer {
    /// Creates a renderer writing into `out_dir`, fetching tiles over HTTP
    /// with the given client
    pub fn new(client: reqwest::Client, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            tiles: Arc::new(HttpTileFetcher::new(client)),
            out_dir: out_dir.into(),
        }
    }

    /// Creates a renderer with a custom tile source
    ///
    /// Used by tests to render without a network.
    pub fn with_fetcher(tiles: Arc<dyn TileFetcher>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            tiles,
            out_dir: out_dir.into(),
        }
    }

    /// Renders the rings over a basemap and returns the written file path
    ///
    /// The path is derived from `label` (`<out_dir>/<label>_map.png`), so
    /// repeated renders for one label overwrite rather than accumulate.
    pub async fn render(&self, rings: &[Ring], label: &str) -> Result<PathBuf, RenderError> {
        if rings.is_empty() {
            return Err(RenderError::EmptyGeometry);
        }
        for ring in rings {
            if ring.len() < 3 {
                return Err(RenderError::DegenerateRing(ring.len()));
            }
        }

        let viewport = Viewport::fit(rings)?;
        let mut pixmap = Pixmap::new(CANVAS_SIZE, CANVAS_SIZE)
            .ok_or_else(|| RenderError::Raster("pixmap allocation failed".into()))?;
        let (r, g, b) = FALLBACK_TILE_COLOR;
        pixmap.fill(Color::from_rgba8(r, g, b, 255));

        self.draw_basemap(&mut pixmap, &viewport).await;
        draw_rings(&mut pixmap, &viewport, rings)?;

        let mut canvas = RgbaImage::from_raw(CANVAS_SIZE, CANVAS_SIZE, pixmap.take())
            .ok_or_else(|| RenderError::Raster("canvas buffer size mismatch".into()))?;
        draw_captions(&mut canvas, label);

        let path = self.out_dir.join(format!("{label}_map.png"));
        canvas.save(&path)?;
        Ok(path)
    }

    /// Fetches and composites the basemap tiles covering the viewport
    ///
    /// Tiles are fetched concurrently. A missing or undecodable tile leaves
    /// its area at the fallback color; basemap problems never fail the
    /// render.
    async fn draw_basemap(&self, pixmap: &mut Pixmap, viewport: &Viewport) {
        let tile_size = f64::from(TILE_SIZE);
        let canvas = f64::from(CANVAS_SIZE);
        let max_index = (1u32 << viewport.zoom).saturating_sub(1);
        let first_col = (viewport.origin_x / tile_size).floor().max(0.0) as u32;
        let first_row = (viewport.origin_y / tile_size).floor().max(0.0) as u32;
        let last_col = ((((viewport.origin_x + canvas) / tile_size).floor()).max(0.0) as u32)
            .min(max_index);
        let last_row = ((((viewport.origin_y + canvas) / tile_size).floor()).max(0.0) as u32)
            .min(max_index);

        let mut requests = Vec::new();
        for row in first_row..=last_row {
            for col in first_col..=last_col {
                let tiles = Arc::clone(&self.tiles);
                let zoom = viewport.zoom;
                requests.push(async move { (row, col, tiles.fetch_tile(zoom, col, row).await) });
            }
        }

        for (row, col, result) in join_all(requests).await {
            let bytes = match result {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(zoom = viewport.zoom, col, row, error = %err, "basemap tile unavailable");
                    continue;
                }
            };
            match decode_tile(&bytes) {
                Some(tile) => {
                    let x = (f64::from(col) * tile_size - viewport.origin_x).round() as i32;
                    let y = (f64::from(row) * tile_size - viewport.origin_y).round() as i32;
                    pixmap.draw_pixmap(
                        x,
                        y,
                        tile.as_ref(),
                        &PixmapPaint::default(),
                        Transform::identity(),
                        None,
                    );
                }
                None => warn!(zoom = viewport.zoom, col, row, "basemap tile failed to decode"),
            }
        }
    }
}

/// Pixel-space viewport: zoom level plus the world-pixel origin of the canvas
#[derive(Debug)]
struct Viewport {
    zoom: u8,
    origin_x: f64,
    origin_y: f64,
}

impl Viewport {
    /// Picks the deepest zoom at which the padded bounding box of the rings
    /// fits the canvas, and centers the canvas on the box
    fn fit(rings: &[Ring]) -> Result<Self, RenderError> {
        // Bounding box in world pixels at zoom 0; extents scale by 2^zoom.
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for &(lon, lat) in rings.iter().flatten() {
            let (x, y) = project(lon, lat, 0)?;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        let padded_width = (max_x - min_x) * (1.0 + 2.0 * PADDING_RATIO);
        let padded_height = (max_y - min_y) * (1.0 + 2.0 * PADDING_RATIO);
        let canvas = f64::from(CANVAS_SIZE);

        let mut zoom = MAX_ZOOM;
        while zoom > 0 {
            let scale = 2.0_f64.powi(i32::from(zoom));
            if padded_width * scale <= canvas && padded_height * scale <= canvas {
                break;
            }
            zoom -= 1;
        }

        let scale = 2.0_f64.powi(i32::from(zoom));
        let center_x = (min_x + max_x) / 2.0 * scale;
        let center_y = (min_y + max_y) / 2.0 * scale;
        Ok(Self {
            zoom,
            origin_x: center_x - canvas / 2.0,
            origin_y: center_y - canvas / 2.0,
        })
    }

    /// Converts a geodetic vertex to canvas pixel coordinates
    fn to_canvas(&self, lon: f64, lat: f64) -> Result<(f32, f32), RenderError> {
        let (x, y) = project(lon, lat, self.zoom)?;
        Ok(((x - self.origin_x) as f32, (y - self.origin_y) as f32))
    }
}

/// Strokes the ring boundaries and fills the interior translucently
fn draw_rings(pixmap: &mut Pixmap, viewport: &Viewport, rings: &[Ring]) -> Result<(), RenderError> {
    let mut builder = PathBuilder::new();
    for ring in rings {
        for (i, &(lon, lat)) in ring.iter().enumerate() {
            let (x, y) = viewport.to_canvas(lon, lat)?;
            if i == 0 {
                builder.move_to(x, y);
            } else {
                builder.line_to(x, y);
            }
        }
        builder.close();
    }
    let path = builder
        .finish()
        .ok_or_else(|| RenderError::Raster("polygon path construction failed".into()))?;

    let mut fill = Paint::default();
    fill.set_color_rgba8(46, 110, 206, 77);
    fill.anti_alias = true;
    pixmap.fill_path(&path, &fill, FillRule::Winding, Transform::identity(), None);

    let mut boundary = Paint::default();
    boundary.set_color_rgba8(0, 0, 255, 255);
    boundary.anti_alias = true;
    let stroke = Stroke {
        width: 2.0,
        ..Stroke::default()
    };
    pixmap.stroke_path(&path, &boundary, &stroke, Transform::identity(), None);
    Ok(())
}

/// Decodes tile bytes into a pixmap ready for compositing
fn decode_tile(bytes: &[u8]) -> Option<Pixmap> {
    let decoded = image::load_from_memory(bytes).ok()?.to_rgba8();
    let (width, height) = decoded.dimensions();
    let mut pixmap = Pixmap::new(width, height)?;
    // Basemap tiles are opaque, so straight alpha equals premultiplied.
    pixmap.data_mut().copy_from_slice(decoded.as_raw());
    Some(pixmap)
}

/// Draws the title and axis captions in Russian
///
/// Skipped when no usable system font is found; the map itself never depends
/// on font availability.
fn draw_captions(canvas: &mut RgbaImage, label: &str) {
    let Some(font) = load_system_font() else {
        debug!("no system font found, skipping map captions");
        return;
    };
    let color = Rgba([40u8, 40, 40, 255]);
    let size = CANVAS_SIZE as i32;

    let title = format!("Участок {label}");
    let title_scale = PxScale::from(28.0);
    let (title_width, _) = text_size(title_scale, &font, &title);
    draw_text_mut(
        canvas,
        color,
        ((size - title_width as i32) / 2).max(0),
        12,
        title_scale,
        &font,
        &title,
    );

    let caption_scale = PxScale::from(18.0);
    let (lon_width, _) = text_size(caption_scale, &font, "Долгота");
    draw_text_mut(
        canvas,
        color,
        ((size - lon_width as i32) / 2).max(0),
        size - 28,
        caption_scale,
        &font,
        "Долгота",
    );
    draw_text_mut(canvas, color, 8, size / 2, caption_scale, &font, "Широта");
}

/// Probes well-known font locations for a face with Cyrillic glyphs
fn load_system_font() -> Option<FontVec> {
    for path in FONT_CANDIDATES {
        if let Ok(bytes) = std::fs::read(path) {
            if let Ok(font) = FontVec::try_from_vec(bytes) {
                return Some(font);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::ImageFormat;
    use std::io::Cursor;
    use tempfile::TempDir;

    /// Square ring of roughly 100 meters near central Moscow
    fn moscow_ring() -> Ring {
        vec![
            (37.5200, 55.6500),
            (37.5216, 55.6500),
            (37.5216, 55.6509),
            (37.5200, 55.6509),
        ]
    }

    /// Tile source producing one flat PNG for every coordinate
    struct FlatTiles;

    #[async_trait]
    impl TileFetcher for FlatTiles {
        async fn fetch_tile(&self, _zoom: u8, _x: u32, _y: u32) -> Result<Vec<u8>, TileError> {
            let tile = RgbaImage::from_pixel(TILE_SIZE, TILE_SIZE, Rgba([240, 240, 235, 255]));
            let mut bytes = Cursor::new(Vec::new());
            tile.write_to(&mut bytes, ImageFormat::Png)
                .expect("tile encoding should succeed");
            Ok(bytes.into_inner())
        }
    }

    /// Tile source that always fails
    struct NoTiles;

    #[async_trait]
    impl TileFetcher for NoTiles {
        async fn fetch_tile(&self, _zoom: u8, _x: u32, _y: u32) -> Result<Vec<u8>, TileError> {
            Err(TileError::Http("offline".to_string()))
        }
    }

    fn test_renderer(dir: &TempDir) -> MapRenderer {
        MapRenderer::with_fetcher(Arc::new(FlatTiles), dir.path().to_path_buf())
    }

    #[tokio::test]
    async fn test_render_empty_rings_fails_and_writes_nothing() {
        let dir = TempDir::new().expect("temp dir");
        let renderer = test_renderer(&dir);

        let result = renderer.render(&[], "EMPTY").await;

        assert!(matches!(result, Err(RenderError::EmptyGeometry)));
        assert_eq!(
            std::fs::read_dir(dir.path()).expect("read dir").count(),
            0,
            "no file may be written on failure"
        );
    }

    #[tokio::test]
    async fn test_render_degenerate_ring_fails() {
        let dir = TempDir::new().expect("temp dir");
        let renderer = test_renderer(&dir);

        let rings = vec![vec![(37.52, 55.65), (37.53, 55.65)]];
        let result = renderer.render(&rings, "DEGENERATE").await;

        assert!(matches!(result, Err(RenderError::DegenerateRing(2))));
    }

    #[tokio::test]
    async fn test_render_out_of_projection_vertex_fails() {
        let dir = TempDir::new().expect("temp dir");
        let renderer = test_renderer(&dir);

        let rings = vec![vec![(37.52, 91.0), (37.53, 55.65), (37.53, 55.66)]];
        let result = renderer.render(&rings, "POLE").await;

        assert!(matches!(result, Err(RenderError::OutOfProjection { .. })));
        assert_eq!(std::fs::read_dir(dir.path()).expect("read dir").count(), 0);
    }

    #[tokio::test]
    async fn test_render_writes_deterministic_path_and_overwrites() {
        let dir = TempDir::new().expect("temp dir");
        let renderer = test_renderer(&dir);
        let rings = vec![moscow_ring()];

        let path = renderer.render(&rings, "TEST123").await.expect("render");
        assert_eq!(path, dir.path().join("TEST123_map.png"));
        assert!(path.exists());

        let again = renderer.render(&rings, "TEST123").await.expect("render");
        assert_eq!(again, path);
        assert_eq!(
            std::fs::read_dir(dir.path()).expect("read dir").count(),
            1,
            "second render must overwrite, not accumulate"
        );
    }

    #[tokio::test]
    async fn test_render_output_is_a_decodable_canvas() {
        let dir = TempDir::new().expect("temp dir");
        let renderer = test_renderer(&dir);

        let path = renderer
            .render(&[moscow_ring()], "77:06:0012018:1000")
            .await
            .expect("render");

        let written = image::open(&path).expect("output should decode").to_rgba8();
        assert_eq!(written.dimensions(), (CANVAS_SIZE, CANVAS_SIZE));
    }

    #[tokio::test]
    async fn test_render_survives_unavailable_basemap() {
        let dir = TempDir::new().expect("temp dir");
        let renderer = MapRenderer::with_fetcher(Arc::new(NoTiles), dir.path().to_path_buf());

        let path = renderer
            .render(&[moscow_ring()], "OFFLINE")
            .await
            .expect("basemap failures must not fail the render");

        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_render_multi_ring_geometry() {
        let dir = TempDir::new().expect("temp dir");
        let renderer = test_renderer(&dir);

        let second: Ring = vec![
            (37.5230, 55.6500),
            (37.5246, 55.6500),
            (37.5246, 55.6509),
            (37.5230, 55.6509),
        ];
        let path = renderer
            .render(&[moscow_ring(), second], "MULTI")
            .await
            .expect("render");

        assert!(path.exists());
    }

    #[test]
    fn test_viewport_keeps_padding_margin() {
        let rings = vec![moscow_ring()];
        let viewport = Viewport::fit(&rings).expect("viewport");

        for &(lon, lat) in rings.iter().flatten() {
            let (x, y) = viewport.to_canvas(lon, lat).expect("projectable");
            let canvas = CANVAS_SIZE as f32;
            // With 20% padding per side the geometry occupies at most
            // 1/1.4 of the canvas, centered.
            assert!(x > canvas * 0.1 && x < canvas * 0.9, "x was {}", x);
            assert!(y > canvas * 0.1 && y < canvas * 0.9, "y was {}", y);
        }
    }

    #[test]
    fn test_viewport_zoom_shrinks_for_larger_extents() {
        let small = Viewport::fit(&[moscow_ring()]).expect("viewport");

        let wide: Ring = vec![(30.0, 50.0), (40.0, 50.0), (40.0, 60.0), (30.0, 60.0)];
        let large = Viewport::fit(&[wide]).expect("viewport");

        assert!(
            large.zoom < small.zoom,
            "zoom {} should be below {}",
            large.zoom,
            small.zoom
        );
    }

    #[test]
    fn test_viewport_centers_geometry() {
        let viewport = Viewport::fit(&[moscow_ring()]).expect("viewport");

        let (min_lon, max_lon) = (37.5200, 37.5216);
        let (min_lat, max_lat) = (55.6500, 55.6509);

        let (x1, y1) = viewport.to_canvas(min_lon, min_lat).expect("projectable");
        let (x2, y2) = viewport.to_canvas(max_lon, max_lat).expect("projectable");
        let center = CANVAS_SIZE as f32 / 2.0;

        assert!(((x1 + x2) / 2.0 - center).abs() < 1.0);
        assert!(((y1 + y2) / 2.0 - center).abs() < 1.0);
    }
}
