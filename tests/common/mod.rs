//! GeoJSON fixture builders for end-to-end scenarios. Property codes match
//! the source GIS schema consumed by the normalizer.

use geojson::{Feature, Geometry, JsonObject, Value};
use serde_json::{Value as Json, json};

pub fn props(pairs: &[(&str, Json)]) -> JsonObject {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn feature(geometry: Value, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geometry)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn line_string(coords: &[(f64, f64)]) -> Value {
    Value::LineString(coords.iter().map(|(x, y)| vec![*x, *y]).collect())
}

pub fn pole(id: &str, x: f64, y: f64) -> Feature {
    feature(Value::Point(vec![x, y]), props(&[("GID", json!(id))]))
}

/// Low-voltage wire, single phase.
pub fn lv_wire(id: &str, coords: &[(f64, f64)]) -> Feature {
    feature(
        line_string(coords),
        props(&[
            ("GID", json!(id)),
            ("PRWR_KND_CD", json!("L")),
            ("PHAR_CLCD", json!("A")),
        ]),
    )
}

/// High-voltage wire, single phase.
pub fn hv_wire(id: &str, coords: &[(f64, f64)]) -> Feature {
    feature(
        line_string(coords),
        props(&[
            ("GID", json!(id)),
            ("PHAR_CLCD", json!("A")),
            ("VOLT_VAL", json!(22_900)),
        ]),
    )
}

/// High-voltage wire, three phase.
pub fn hv3_wire(id: &str, coords: &[(f64, f64)]) -> Feature {
    feature(
        line_string(coords),
        props(&[
            ("GID", json!(id)),
            ("PHAR_CLCD", json!("ABC")),
            ("VOLT_VAL", json!(22_900)),
        ]),
    )
}

pub fn road(id: &str, coords: &[(f64, f64)]) -> Feature {
    feature(line_string(coords), props(&[("ROAD_ID", json!(id))]))
}

pub fn building(id: &str, exterior: &[(f64, f64)]) -> Feature {
    let mut ring: Vec<Vec<f64>> = exterior.iter().map(|(x, y)| vec![*x, *y]).collect();
    if ring.first() != ring.last() {
        ring.push(ring[0].clone());
    }
    feature(Value::Polygon(vec![ring]), props(&[("BLDG_ID", json!(id))]))
}
