use approx::abs_diff_eq;
use geo::{Coord, LineString, Point, Polygon, coord};

/// Voltage classification of a pole or line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum VoltageClass {
    /// High voltage (22.9 kV distribution).
    Hv = 0,
    /// Low voltage (220/380 V service).
    Lv = 1,
    /// Classification could not be derived from the source data.
    Unknown = 2,
}

impl Default for VoltageClass {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Phase classification decoded from the raw phase code of a line.
/// A code carrying all three of A, B and C is three-phase; a single
/// letter is single-phase; everything else stays unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PhaseClass {
    Single = 1,
    Three = 3,
    Unknown = 0,
}

impl Default for PhaseClass {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Service phase requested by the consumer. Unlike [`PhaseClass`] there is
/// no unknown case: a request always names its phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServicePhase {
    Single,
    Three,
}

impl ServicePhase {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "SINGLE",
            Self::Three => "THREE",
        }
    }

    /// Divisor applied to the nominal voltage when deriving load current:
    /// 1 for single-phase, √3 for three-phase.
    pub fn phase_factor(&self) -> f64 {
        match self {
            Self::Single => 1.0,
            Self::Three => 3f64.sqrt(),
        }
    }
}

/// Whether a line carries high or low voltage. Lines with no usable
/// classification default to high voltage, the source network's default
/// for distribution spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LineType {
    Hv = 0,
    Lv = 1,
}

impl LineType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hv => "HV",
            Self::Lv => "LV",
        }
    }
}

/// Canonical conductor specification: conductor kind plus cross-section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WireSpec {
    Ow22,
    Ow38,
    Acsr58,
    Acsr95,
    Acsr160,
}

impl WireSpec {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ow22 => "OW_22",
            Self::Ow38 => "OW_38",
            Self::Acsr58 => "ACSR_58",
            Self::Acsr95 => "ACSR_95",
            Self::Acsr160 => "ACSR_160",
        }
    }

    /// Conductor resistance in Ω/km at 20 °C.
    pub const fn resistance_ohm_per_km(&self) -> f64 {
        match self {
            Self::Ow22 => 0.827,
            Self::Ow38 => 0.480,
            Self::Acsr58 => 0.595,
            Self::Acsr95 => 0.363,
            Self::Acsr160 => 0.215,
        }
    }

    /// Next larger cross-section, used for long-span drop mitigation.
    pub const fn upgraded(&self) -> Self {
        match self {
            Self::Ow22 => Self::Ow38,
            Self::Ow38 => Self::Acsr58,
            Self::Acsr58 => Self::Acsr95,
            Self::Acsr95 | Self::Acsr160 => Self::Acsr160,
        }
    }
}

/// New-pole specification used for pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PoleSpec {
    C10,
    C12,
    C14,
    Steel10,
    Steel12,
}

impl PoleSpec {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::C10 => "C10",
            Self::C12 => "C12",
            Self::C14 => "C14",
            Self::Steel10 => "STEEL_10",
            Self::Steel12 => "STEEL_12",
        }
    }
}

/// Point on the projected metric plane (EPSG:3857 semantics, metres).
#[derive(Debug, Clone, Copy, Default)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        const EPSILON: f64 = 1e-6;
        abs_diff_eq!(self.x, other.x, epsilon = EPSILON)
            && abs_diff_eq!(self.y, other.y, epsilon = EPSILON)
    }
}

impl Coordinate {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn point(self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn coord(self) -> Coord {
        coord! { x: self.x, y: self.y }
    }

    /// Straight-line distance to another coordinate.
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<Coord> for Coordinate {
    fn from(c: Coord) -> Self {
        Self { x: c.x, y: c.y }
    }
}

impl From<Point> for Coordinate {
    fn from(p: Point) -> Self {
        Self { x: p.x(), y: p.y() }
    }
}

pub(crate) fn to_line_string(vertices: &[Coordinate]) -> LineString {
    LineString::from_iter(vertices.iter().map(|v| v.coord()))
}

/// Existing utility pole. Immutable after normalization; the adjacency
/// flags are derived once from the incident lines.
#[derive(Debug, Clone, PartialEq)]
pub struct Pole {
    pub id: String,
    pub position: Coordinate,
    pub voltage_class: VoltageClass,
    pub phase_class: PhaseClass,
    /// Raw pole-form code as delivered by the source (`H`, `O`, ...).
    pub pole_kind_code: Option<String>,
    /// At least one incident low-voltage line.
    pub has_lv: bool,
    /// At least one incident high-voltage line.
    pub has_hv: bool,
    /// At least one incident three-phase high-voltage line.
    pub has_hv_three_phase: bool,
}

impl Pole {
    /// Whether the pole can serve a three-phase request.
    pub const fn is_three_phase_connected(&self) -> bool {
        self.has_hv_three_phase
    }
}

/// Existing wire span. Endpoint pole references may be absent in the raw
/// data and are then recovered spatially during normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub id: String,
    pub vertices: Vec<Coordinate>,
    pub start_pole_id: Option<String>,
    pub end_pole_id: Option<String>,
    pub line_type: LineType,
    pub phase_class: PhaseClass,
    pub wire_spec: Option<WireSpec>,
    /// Explicit voltage in volts when the source supplies one.
    pub voltage_value: Option<f64>,
}

impl Line {
    pub fn length(&self) -> f64 {
        self.vertices.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    pub fn line_string(&self) -> LineString {
        to_line_string(&self.vertices)
    }
}

/// Transformer feature. Its annotation text may embed a low-voltage
/// overhead wire that the normalizer extracts as a synthetic [`Line`].
#[derive(Debug, Clone, PartialEq)]
pub struct Transformer {
    pub id: String,
    pub position: Coordinate,
    pub capacity_kva: Option<f64>,
    pub annotation: Option<String>,
}

/// Road classification. Display filtering only; it never influences
/// routing weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoadClass {
    Primary,
    Side,
    Alley,
    Unknown,
}

impl Default for RoadClass {
    fn default() -> Self {
        Self::Unknown
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Road {
    pub id: String,
    pub vertices: Vec<Coordinate>,
    pub classification: RoadClass,
}

/// Building footprint; forbidden ground for new poles.
#[derive(Debug, Clone, PartialEq)]
pub struct Building {
    pub id: String,
    pub polygon: Polygon,
}

/// Railway overlay; informational only.
#[derive(Debug, Clone, PartialEq)]
pub struct Railway {
    pub id: String,
    pub vertices: Vec<Coordinate>,
}

/// River overlay; informational only.
#[derive(Debug, Clone, PartialEq)]
pub struct River {
    pub id: String,
    pub vertices: Vec<Coordinate>,
}

/// A single design request: one consumer, one phase, optional load.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignRequest {
    pub consumer: Coordinate,
    pub phase: ServicePhase,
    /// Requested load in kW. When absent the configured default applies.
    pub load_kw: Option<f64>,
}
