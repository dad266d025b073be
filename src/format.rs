//! Formatting of registry records
//!
//! Turns a feature record into the user-facing text block and the polygon
//! rings the renderer consumes. Pure transform: no I/O, total over any
//! record shape.

use crate::registry::{FeatureRecord, Geometry};

/// One closed polygon boundary as (longitude, latitude) vertices
pub type Ring = Vec<(f64, f64)>;

/// Placeholders shown when the registry omits an attribute
const UNKNOWN_OBJECT_TYPE: &str = "Неизвестно";
const UNKNOWN_ADDRESS: &str = "Неизвестен";
const UNKNOWN_AREA: &str = "Неизвестна";
const UNKNOWN_COST: &str = "Не указана";
const UNKNOWN_CATEGORY: &str = "Не указана";
const UNKNOWN_PERMITTED_USE: &str = "Не установлен";

/// Separator between thousands groups (non-breaking space)
const THOUSANDS_SEPARATOR: char = '\u{00a0}';

/// Formatter output: the text block plus the rings extracted from geometry
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedResult {
    /// Multi-line, markdown-flavored description of the parcel
    pub text: String,
    /// Outer rings of the parcel geometry, empty when there is none
    pub rings: Vec<Ring>,
}

/// Renders a feature record into text and rings
///
/// Absent attributes fall back to their placeholders; absent or non-polygon
/// geometry yields an empty ring list. Never fails.
pub fn format_parcel(record: &FeatureRecord) -> FormattedResult {
    let options = &record.properties.options;

    let object_type = options
        .land_record_type
        .as_deref()
        .unwrap_or(UNKNOWN_OBJECT_TYPE);
    let address = options.readable_address.as_deref().unwrap_or(UNKNOWN_ADDRESS);

    // The surveyed area wins over the recorded one; first present value is used.
    let area = options
        .specified_area
        .or(options.land_record_area)
        .map(format_number)
        .unwrap_or_else(|| UNKNOWN_AREA.to_string());

    // Thousands grouping applies only to a numeric cost; the placeholder
    // passes through untouched.
    let cost = match options.cost_value {
        Some(value) => group_thousands(value),
        None => UNKNOWN_COST.to_string(),
    };

    let land_category = options
        .land_record_category_type
        .as_deref()
        .unwrap_or(UNKNOWN_CATEGORY);
    let permitted_use = options
        .permitted_use_established_by_document
        .as_deref()
        .unwrap_or(UNKNOWN_PERMITTED_USE);

    let text = format!(
        "🏷 **Тип объекта:** {object_type}\n\
         📍 **Адрес:** {address}\n\
         📐 **Площадь:** {area} кв.м\n\
         💰 **Кадастровая стоимость:** {cost} ₽\n\
         🏞 **Категория земель:** {land_category}\n\
         📄 **Вид разрешенного использования:** {permitted_use}\n"
    );

    FormattedResult {
        text,
        rings: extract_rings(record.geometry.as_ref()),
    }
}

/// Extracts the outer rings of the geometry, one entry per polygon
///
/// Holes are discarded: the map only needs the visual outline. The return
/// shape is uniform regardless of the geometry kind, so a single polygon
/// comes back as a one-element ring list.
fn extract_rings(geometry: Option<&Geometry>) -> Vec<Ring> {
    match geometry {
        Some(Geometry::Polygon { coordinates }) => coordinates
            .first()
            .map(|outer| vec![to_ring(outer)])
            .unwrap_or_default(),
        Some(Geometry::MultiPolygon { coordinates }) => coordinates
            .iter()
            .filter_map(|polygon| polygon.first())
            .map(|outer| to_ring(outer))
            .collect(),
        Some(Geometry::Other) | None => Vec::new(),
    }
}

fn to_ring(points: &[[f64; 2]]) -> Ring {
    points.iter().map(|&[lon, lat]| (lon, lat)).collect()
}

/// Groups a cost value by thousands with non-breaking spaces
///
/// Kopecks are kept with two digits when present, dropped when the value is
/// whole.
fn group_thousands(value: f64) -> String {
    let negative = value < 0.0;
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3 + 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(THOUSANDS_SEPARATOR);
        }
        grouped.push(digit);
    }
    if fraction > 0 {
        grouped.push_str(&format!(".{fraction:02}"));
    }
    if negative {
        grouped.insert(0, '-');
    }
    grouped
}

/// Formats an area without a trailing ".0" on whole values
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
