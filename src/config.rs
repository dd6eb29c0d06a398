use std::time::Duration;

use crate::{PoleSpec, WireSpec};

/// Process-wide immutable configuration. Loaded once at startup and shared
/// read-only between workers.
#[derive(Debug, Clone)]
pub struct DesignConfig {
    /// Hard cap on consumer → source pole routed length, metres.
    pub max_distance: f64,
    /// Maximum straight-line distance for a direct-segment connection.
    pub fast_track_limit: f64,
    /// Target spacing of newly constructed poles along a path.
    pub pole_interval: f64,
    /// Road-endpoint merge distance for topology repair.
    pub snap_tolerance: f64,
    /// Maximum perpendicular distance from consumer/pole to a road.
    pub max_attach: f64,
    /// Slide budget when a new pole lands inside a building.
    pub pole_nudge: f64,
    /// Truncation of the ranked output.
    pub max_routes: usize,
    /// Amortised per-pole cost folded into edge weights.
    pub pole_cost_share: f64,
    /// Distance under which road vertices collapse into one node.
    pub vertex_merge_tolerance: f64,
    /// Distance for adopting the nearest pole as a bare line endpoint.
    pub link_tolerance: f64,
    /// Interior angle (degrees) below which a path vertex counts as a turn.
    pub turn_angle_limit: f64,
    /// Ranking score per new pole. Dominates the other ranking terms.
    pub score_weight_pole: u64,
    /// Ranking score per metre of routed length.
    pub score_weight_distance: f64,
    /// Ranking score per counted turn.
    pub score_weight_turn: u64,
    /// Load assumed when the request does not supply one, kW.
    pub default_load_kw: f64,
    /// Overhead as a fraction of material + labor.
    pub overhead_rate: f64,
    /// Profit as a fraction of material + labor + overhead.
    pub profit_rate: f64,
    /// Wall-clock deadline per request, enforced at stage boundaries.
    pub request_timeout: Duration,
    /// Acceptable voltage drop for low-voltage service, percent.
    pub limit_vd_lv: f64,
    /// Acceptable voltage drop for high-voltage service, percent.
    pub limit_vd_hv: f64,
    /// Nominal single-phase low voltage, volts.
    pub nominal_voltage_lv: f64,
    /// Nominal three-phase low voltage, volts.
    pub nominal_voltage_lv_three: f64,
    /// Nominal high voltage, volts.
    pub nominal_voltage_hv: f64,
    pub prices: PriceTable,
}

impl Default for DesignConfig {
    fn default() -> Self {
        Self {
            max_distance: 400.0,
            fast_track_limit: 50.0,
            pole_interval: 40.0,
            snap_tolerance: 10.0,
            max_attach: 100.0,
            pole_nudge: 5.0,
            max_routes: 10,
            pole_cost_share: 5000.0,
            vertex_merge_tolerance: 1.0,
            link_tolerance: 15.0,
            turn_angle_limit: 150.0,
            score_weight_pole: 10_000,
            score_weight_distance: 1.0,
            score_weight_turn: 50,
            default_load_kw: 5.0,
            overhead_rate: 0.05,
            profit_rate: 0.05,
            request_timeout: Duration::from_secs(60),
            limit_vd_lv: 6.0,
            limit_vd_hv: 3.0,
            nominal_voltage_lv: 220.0,
            nominal_voltage_lv_three: 380.0,
            nominal_voltage_hv: 22_900.0,
            prices: PriceTable::default(),
        }
    }
}

/// Unit prices in won. Values mirror the utility's standard price book.
#[derive(Debug, Clone)]
pub struct PriceTable {
    pub pole_c10: u64,
    pub pole_c12: u64,
    pub pole_c14: u64,
    pub pole_steel_10: u64,
    pub pole_steel_12: u64,
    pub wire_ow_22: u64,
    pub wire_ow_38: u64,
    pub wire_acsr_58: u64,
    pub wire_acsr_95: u64,
    pub wire_acsr_160: u64,
    pub insulator_pin: u64,
    pub arm_tie: u64,
    pub clamp: u64,
    pub connector: u64,
    pub labor_base: u64,
    pub labor_pole_install: u64,
    pub labor_wire_stretch: u64,
    pub labor_insulator: u64,
    pub road_crossing: u64,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            pole_c10: 350_000,
            pole_c12: 450_000,
            pole_c14: 550_000,
            pole_steel_10: 800_000,
            pole_steel_12: 950_000,
            wire_ow_22: 5_500,
            wire_ow_38: 7_000,
            wire_acsr_58: 6_500,
            wire_acsr_95: 8_500,
            wire_acsr_160: 12_000,
            insulator_pin: 25_000,
            arm_tie: 35_000,
            clamp: 15_000,
            connector: 8_000,
            labor_base: 200_000,
            labor_pole_install: 250_000,
            labor_wire_stretch: 15_000,
            labor_insulator: 20_000,
            road_crossing: 100_000,
        }
    }
}

impl PriceTable {
    pub const fn pole_unit_cost(&self, spec: PoleSpec) -> u64 {
        match spec {
            PoleSpec::C10 => self.pole_c10,
            PoleSpec::C12 => self.pole_c12,
            PoleSpec::C14 => self.pole_c14,
            PoleSpec::Steel10 => self.pole_steel_10,
            PoleSpec::Steel12 => self.pole_steel_12,
        }
    }

    pub const fn wire_unit_cost(&self, spec: WireSpec) -> u64 {
        match spec {
            WireSpec::Ow22 => self.wire_ow_22,
            WireSpec::Ow38 => self.wire_ow_38,
            WireSpec::Acsr58 => self.wire_acsr_58,
            WireSpec::Acsr95 => self.wire_acsr_95,
            WireSpec::Acsr160 => self.wire_acsr_160,
        }
    }
}
