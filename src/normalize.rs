//! Turns raw GIS feature records into the typed entities of the data model.
//!
//! Raw records are GeoJSON features whose properties carry the source
//! system's coded attributes. Decoding is lossy by design: malformed
//! records are dropped and counted, coded fields that cannot be decoded
//! propagate `Unknown` instead of guessing.

use geojson::{Feature, JsonObject, Value};
use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};

use crate::geometry::point_strictly_inside;
use crate::{
    Building, Coordinate, DesignConfig, Line, LineType, PhaseClass, Pole, Railway, River, Road,
    RoadClass, Transformer, VoltageClass, WireSpec,
};

/// Facility status codes that mark a removed or demolished feature.
const REMOVED_STATUS: [&str; 4] = ["D", "R", "DD", "RR"];

/// Raw feature batches by kind, as delivered by the GIS source.
#[derive(Debug, Clone, Default)]
pub struct RawFeatureSet {
    pub poles: Vec<Feature>,
    pub lines: Vec<Feature>,
    pub transformers: Vec<Feature>,
    pub roads: Vec<Feature>,
    pub buildings: Vec<Feature>,
    pub railways: Vec<Feature>,
    pub rivers: Vec<Feature>,
}

/// Per-kind counters of records dropped during normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropCounters {
    pub poles: usize,
    pub lines: usize,
    pub transformers: usize,
    pub roads: usize,
    pub buildings: usize,
    pub railways: usize,
    pub rivers: usize,
}

/// Normalized, immutable feature container for one request.
#[derive(Debug, Clone, Default)]
pub struct NormalizedFeatures {
    pub poles: Vec<Pole>,
    pub lines: Vec<Line>,
    pub transformers: Vec<Transformer>,
    pub roads: Vec<Road>,
    pub buildings: Vec<Building>,
    pub railways: Vec<Railway>,
    pub rivers: Vec<River>,
    pub dropped: DropCounters,
}

impl NormalizedFeatures {
    pub fn pole_by_id(&self, id: &str) -> Option<&Pole> {
        self.poles.iter().find(|p| p.id == id)
    }
}

/// Decodes a raw phase code. Codes carrying all three of A, B and C are
/// three-phase, a lone letter is single-phase, anything else is unknown.
/// Case-insensitive.
pub fn decode_phase(code: &str) -> PhaseClass {
    let code = code.trim().to_ascii_uppercase();
    if code.contains('A') && code.contains('B') && code.contains('C') {
        PhaseClass::Three
    } else if code.len() == 1 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        PhaseClass::Single
    } else {
        PhaseClass::Unknown
    }
}

/// Combines a conductor-kind code with a cross-section code into a
/// canonical wire spec. Unrecognized combinations stay undecoded.
pub fn decode_wire_spec(kind: &str, section: &str) -> Option<WireSpec> {
    match (kind.trim().to_ascii_uppercase().as_str(), section.trim()) {
        ("OW", "22") => Some(WireSpec::Ow22),
        ("OW", "38") => Some(WireSpec::Ow38),
        ("ACSR", "58") => Some(WireSpec::Acsr58),
        ("ACSR", "95") => Some(WireSpec::Acsr95),
        ("ACSR", "160") => Some(WireSpec::Acsr160),
        _ => None,
    }
}

/// Scans an annotation text (e.g. `"OW 22 x 3"`) for a conductor token
/// followed by its cross-section.
fn wire_spec_from_annotation(text: &str) -> Option<WireSpec> {
    let upper = text.to_ascii_uppercase();
    let tokens: Vec<&str> = upper.split_whitespace().collect();
    for pair in tokens.windows(2) {
        if let Some(spec) = decode_wire_spec(pair[0], pair[1]) {
            return Some(spec);
        }
    }
    None
}

/// Whether the annotation marks an embedded overhead low-voltage wire.
fn annotation_marks_overhead_wire(text: &str) -> bool {
    let upper = text.to_ascii_uppercase();
    upper.contains("OW")
}

fn properties(feature: &Feature) -> Option<&JsonObject> {
    feature.properties.as_ref()
}

fn prop_str<'a>(props: &'a JsonObject, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| props.get(*k))
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn prop_f64(props: &JsonObject, key: &str) -> Option<f64> {
    let value = props.get(key)?;
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Feature id: first present among the given keys, string or numeric.
fn feature_id(props: &JsonObject, keys: &[&str]) -> Option<String> {
    for key in keys {
        match props.get(*key) {
            Some(v) if v.is_string() => {
                let s = v.as_str().unwrap_or_default().trim();
                if !s.is_empty() {
                    return Some(s.to_string());
                }
            }
            Some(v) if v.is_number() => return Some(v.to_string()),
            _ => {}
        }
    }
    None
}

fn is_removed(props: &JsonObject) -> bool {
    if let Some(status) = prop_str(props, &["FAC_STAT_CD"])
        && REMOVED_STATUS.contains(&status)
    {
        return true;
    }
    prop_str(props, &["REMOVE_YN"]) == Some("Y")
}

fn parse_point(feature: &Feature) -> Option<Coordinate> {
    match &feature.geometry.as_ref()?.value {
        Value::Point(p) if p.len() >= 2 && p[0].is_finite() && p[1].is_finite() => {
            Some(Coordinate::new(p[0], p[1]))
        }
        _ => None,
    }
}

fn parse_line_string(feature: &Feature) -> Option<Vec<Coordinate>> {
    match &feature.geometry.as_ref()?.value {
        Value::LineString(raw) => parse_positions(raw),
        _ => None,
    }
}

fn parse_positions(raw: &[Vec<f64>]) -> Option<Vec<Coordinate>> {
    let mut vertices: Vec<Coordinate> = Vec::with_capacity(raw.len());
    for p in raw {
        if p.len() < 2 || !p[0].is_finite() || !p[1].is_finite() {
            return None;
        }
        let c = Coordinate::new(p[0], p[1]);
        // collapse consecutive duplicates instead of dropping the record
        if vertices.last() != Some(&c) {
            vertices.push(c);
        }
    }
    (vertices.len() >= 2).then_some(vertices)
}

fn parse_polygon(feature: &Feature) -> Option<geo::Polygon> {
    match &feature.geometry.as_ref()?.value {
        Value::Polygon(rings) if !rings.is_empty() => {
            let to_ring = |ring: &Vec<Vec<f64>>| -> Option<geo::LineString> {
                let coords: Vec<geo::Coord> = ring
                    .iter()
                    .filter(|p| p.len() >= 2 && p[0].is_finite() && p[1].is_finite())
                    .map(|p| geo::coord! { x: p[0], y: p[1] })
                    .collect();
                (coords.len() >= 4).then(|| geo::LineString::new(coords))
            };

            let exterior = to_ring(&rings[0])?;
            let interiors: Vec<geo::LineString> =
                rings[1..].iter().filter_map(to_ring).collect();
            Some(geo::Polygon::new(exterior, interiors))
        }
        _ => None,
    }
}

/// Normalizes one request's raw feature batches.
pub fn normalize(config: &DesignConfig, raw: &RawFeatureSet) -> NormalizedFeatures {
    let mut result = NormalizedFeatures::default();

    parse_poles(raw, &mut result);
    parse_lines(raw, &mut result);
    extract_transformers(raw, &mut result);
    parse_roads(raw, &mut result);
    parse_buildings(raw, &mut result);
    parse_overlays(raw, &mut result);

    drop_poles_inside_buildings(&mut result);
    link_lines_to_poles(config, &mut result);
    derive_pole_attributes(&mut result);

    info!(
        poles = result.poles.len(),
        lines = result.lines.len(),
        roads = result.roads.len(),
        buildings = result.buildings.len(),
        dropped = ?result.dropped,
        "feature normalization complete"
    );

    result
}

fn parse_poles(raw: &RawFeatureSet, out: &mut NormalizedFeatures) {
    let mut seen = FxHashSet::default();

    for feature in &raw.poles {
        let Some(props) = properties(feature) else {
            out.dropped.poles += 1;
            continue;
        };
        if is_removed(props) {
            out.dropped.poles += 1;
            continue;
        }

        let kind_code = prop_str(props, &["POLE_FORM_CD", "POLE_TYPE"]).map(str::to_string);
        // support poles cannot source a service connection
        if kind_code.as_deref() == Some("G") {
            out.dropped.poles += 1;
            continue;
        }

        let Some(position) = parse_point(feature) else {
            out.dropped.poles += 1;
            continue;
        };
        let Some(id) = feature_id(props, &["GID", "POLE_ID", "FTR_IDN"]) else {
            warn!("pole feature without id dropped");
            out.dropped.poles += 1;
            continue;
        };
        if !seen.insert(id.clone()) {
            debug!(%id, "duplicate pole id dropped");
            out.dropped.poles += 1;
            continue;
        }

        let voltage_class = match prop_f64(props, "VOLT_VAL") {
            Some(v) if v > 0.0 && v >= 1000.0 => VoltageClass::Hv,
            Some(v) if v > 0.0 => VoltageClass::Lv,
            _ => VoltageClass::Unknown,
        };

        out.poles.push(Pole {
            id,
            position,
            voltage_class,
            phase_class: PhaseClass::Unknown,
            pole_kind_code: kind_code,
            has_lv: false,
            has_hv: false,
            has_hv_three_phase: false,
        });
    }
}

fn parse_line_feature(feature: &Feature, seen: &mut FxHashSet<String>) -> Result<Line, ()> {
    let props = properties(feature).ok_or(())?;
    if is_removed(props) {
        return Err(());
    }
    let vertices = parse_line_string(feature).ok_or(())?;
    let id = feature_id(props, &["GID", "LINE_ID", "FTR_IDN"]).ok_or(())?;
    if !seen.insert(id.clone()) {
        debug!(%id, "duplicate line id dropped");
        return Err(());
    }

    let phase_class = prop_str(props, &["PHAR_CLCD"])
        .map(decode_phase)
        .unwrap_or_default();

    let voltage_value = prop_f64(props, "VOLT_VAL").filter(|v| *v > 0.0);
    let kind = prop_str(props, &["PRWR_KND_CD"]);
    let line_type = if matches!(kind, Some("L" | "LV")) {
        LineType::Lv
    } else if let Some(v) = voltage_value {
        if v < 1000.0 { LineType::Lv } else { LineType::Hv }
    } else {
        LineType::Hv
    };

    let wire_spec = prop_str(props, &["TEXT_GIS_ANNXN"]).and_then(wire_spec_from_annotation);

    Ok(Line {
        id,
        vertices,
        start_pole_id: prop_str(props, &["LWER_FAC_GID", "ST_POLE_ID", "FR_POLE_ID"])
            .map(str::to_string),
        end_pole_id: prop_str(props, &["UPPO_FAC_GID", "ED_POLE_ID", "TO_POLE_ID"])
            .map(str::to_string),
        line_type,
        phase_class,
        wire_spec,
        voltage_value,
    })
}

fn parse_lines(raw: &RawFeatureSet, out: &mut NormalizedFeatures) {
    let mut seen = FxHashSet::default();

    for feature in &raw.lines {
        match parse_line_feature(feature, &mut seen) {
            Ok(line) => out.lines.push(line),
            Err(()) => out.dropped.lines += 1,
        }
    }
}

/// Transformer records double as carriers of low-voltage service spans:
/// when the annotation text holds an overhead-wire marker, the feature's
/// polyline is emitted as a synthetic LV line.
fn extract_transformers(raw: &RawFeatureSet, out: &mut NormalizedFeatures) {
    for feature in &raw.transformers {
        let Some(props) = properties(feature) else {
            out.dropped.transformers += 1;
            continue;
        };
        if is_removed(props) {
            out.dropped.transformers += 1;
            continue;
        }

        let vertices = parse_line_string(feature);
        let position = parse_point(feature).or_else(|| vertices.as_ref().map(|v| v[0]));
        let Some(position) = position else {
            out.dropped.transformers += 1;
            continue;
        };
        let Some(id) = feature_id(props, &["GID", "FTR_IDN"]) else {
            out.dropped.transformers += 1;
            continue;
        };

        let annotation = prop_str(props, &["TEXT_GIS_ANNXN"]).map(str::to_string);

        if let (Some(text), Some(vertices)) = (annotation.as_deref(), vertices.as_ref())
            && annotation_marks_overhead_wire(text)
        {
            let phase_class = prop_str(props, &["PHAR_CLCD"])
                .map(decode_phase)
                .unwrap_or_default();

            out.lines.push(Line {
                id: format!("LV_{id}"),
                vertices: vertices.clone(),
                start_pole_id: prop_str(props, &["LWER_FAC_GID", "ST_POLE_ID"])
                    .map(str::to_string),
                end_pole_id: prop_str(props, &["UPPO_FAC_GID", "ED_POLE_ID"])
                    .map(str::to_string),
                line_type: LineType::Lv,
                phase_class,
                wire_spec: wire_spec_from_annotation(text),
                voltage_value: None,
            });
            debug!(%id, "low-voltage line extracted from transformer annotation");
        }

        out.transformers.push(Transformer {
            id,
            position,
            capacity_kva: prop_f64(props, "CAP_VAL").filter(|v| *v > 0.0),
            annotation,
        });
    }
}

fn parse_roads(raw: &RawFeatureSet, out: &mut NormalizedFeatures) {
    let mut seen = FxHashSet::default();

    for feature in &raw.roads {
        let parsed = properties(feature).and_then(|props| {
            let vertices = parse_line_string(feature)?;
            let id = feature_id(props, &["ROAD_ID", "GID", "FTR_IDN"])?;
            seen.insert(id.clone()).then_some(())?;

            let classification = match prop_str(props, &["ROAD_TP", "ROAD_TYPE"]) {
                Some("1" | "P") => RoadClass::Primary,
                Some("2" | "S") => RoadClass::Side,
                Some("3" | "A") => RoadClass::Alley,
                _ => RoadClass::Unknown,
            };

            Some(Road {
                id,
                vertices,
                classification,
            })
        });

        match parsed {
            Some(road) => out.roads.push(road),
            None => out.dropped.roads += 1,
        }
    }
}

fn parse_buildings(raw: &RawFeatureSet, out: &mut NormalizedFeatures) {
    for feature in &raw.buildings {
        let parsed = properties(feature).and_then(|props| {
            let polygon = parse_polygon(feature)?;
            let id = feature_id(props, &["BLDG_ID", "GID", "FTR_IDN"])?;
            Some(Building { id, polygon })
        });

        match parsed {
            Some(building) => out.buildings.push(building),
            None => out.dropped.buildings += 1,
        }
    }
}

fn overlay_vertices(feature: &Feature) -> Option<Vec<Coordinate>> {
    match &feature.geometry.as_ref()?.value {
        Value::LineString(raw) => parse_positions(raw),
        // area overlays contribute their boundary
        Value::Polygon(rings) => rings.first().and_then(|ring| parse_positions(ring)),
        _ => None,
    }
}

fn parse_overlays(raw: &RawFeatureSet, out: &mut NormalizedFeatures) {
    for feature in &raw.railways {
        let parsed = properties(feature).and_then(|props| {
            let vertices = overlay_vertices(feature)?;
            let id = feature_id(props, &["GID", "FTR_IDN"])?;
            Some(Railway { id, vertices })
        });
        match parsed {
            Some(railway) => out.railways.push(railway),
            None => out.dropped.railways += 1,
        }
    }

    for feature in &raw.rivers {
        let parsed = properties(feature).and_then(|props| {
            let vertices = overlay_vertices(feature)?;
            let id = feature_id(props, &["GID", "FTR_IDN"])?;
            Some(River { id, vertices })
        });
        match parsed {
            Some(river) => out.rivers.push(river),
            None => out.dropped.rivers += 1,
        }
    }
}

/// A pole recorded inside a building footprint is bad data; keep the
/// building and drop the pole.
fn drop_poles_inside_buildings(out: &mut NormalizedFeatures) {
    if out.buildings.is_empty() {
        return;
    }

    let buildings = &out.buildings;
    let dropped = &mut out.dropped;
    out.poles.retain(|pole| {
        let inside = buildings
            .iter()
            .any(|b| point_strictly_inside(&b.polygon, pole.position));
        if inside {
            debug!(id = %pole.id, "pole inside building dropped");
            dropped.poles += 1;
        }
        !inside
    });
}

/// Lines extracted from transformer records usually carry no endpoint
/// references; each bare end adopts the nearest pole within tolerance.
fn link_lines_to_poles(config: &DesignConfig, out: &mut NormalizedFeatures) {
    if out.poles.is_empty() {
        return;
    }

    let nearest_pole = |c: Coordinate| -> Option<String> {
        out.poles
            .iter()
            .map(|p| (p, p.position.distance(c)))
            .filter(|(_, d)| *d <= config.link_tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.id.cmp(&b.0.id)))
            .map(|(p, _)| p.id.clone())
    };

    let mut linked = 0usize;
    let poles: FxHashSet<&str> = out.poles.iter().map(|p| p.id.as_str()).collect();

    for line in &mut out.lines {
        // an endpoint ref that resolves to no known pole is as good as absent
        if line
            .start_pole_id
            .as_deref()
            .is_some_and(|id| !poles.contains(id))
        {
            line.start_pole_id = None;
        }
        if line
            .end_pole_id
            .as_deref()
            .is_some_and(|id| !poles.contains(id))
        {
            line.end_pole_id = None;
        }

        if line.start_pole_id.is_none()
            && let Some(id) = nearest_pole(line.vertices[0])
        {
            line.start_pole_id = Some(id);
            linked += 1;
        }
        if line.end_pole_id.is_none()
            && let Some(id) = nearest_pole(line.vertices[line.vertices.len() - 1])
        {
            line.end_pole_id = Some(id);
            linked += 1;
        }
    }

    if linked > 0 {
        debug!(linked, "line endpoints adopted nearby poles");
    }
}

/// Derives the per-pole adjacency flags and the final voltage/phase
/// classification from the incident lines.
fn derive_pole_attributes(out: &mut NormalizedFeatures) {
    for i in 0..out.poles.len() {
        let id = out.poles[i].id.clone();
        let (mut has_lv, mut has_hv, mut has_hv_three_phase) = (false, false, false);

        for line in &out.lines {
            if line.start_pole_id.as_deref() != Some(id.as_str())
                && line.end_pole_id.as_deref() != Some(id.as_str())
            {
                continue;
            }
            match line.line_type {
                LineType::Hv => {
                    has_hv = true;
                    if line.phase_class == PhaseClass::Three {
                        has_hv_three_phase = true;
                    }
                }
                LineType::Lv => has_lv = true,
            }
        }

        let pole = &mut out.poles[i];
        pole.has_lv = has_lv;
        pole.has_hv = has_hv;
        pole.has_hv_three_phase = has_hv_three_phase;

        if pole.voltage_class == VoltageClass::Unknown {
            let form_hv = pole
                .pole_kind_code
                .as_deref()
                .is_some_and(|c| c.starts_with('H'));
            pole.voltage_class = if has_hv || form_hv {
                VoltageClass::Hv
            } else {
                VoltageClass::Lv
            };
        }

        pole.phase_class = if has_hv_three_phase {
            PhaseClass::Three
        } else if has_lv || has_hv {
            PhaseClass::Single
        } else {
            PhaseClass::Unknown
        };
    }
}
