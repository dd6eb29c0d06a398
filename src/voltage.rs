//! Voltage drop along a proposed route at the requested load.
//!
//! The drop uses the per-spec conductor constant: resistance doubled for
//! the single-phase return conductor, scaled by √3 for three-phase. Routes
//! over the class limit are flagged, not removed; the caller decides.

use tracing::debug;

use crate::{DesignConfig, ServicePhase, VoltageClass, WireSpec};

/// Voltage drop summary for one route.
#[derive(Debug, Clone, PartialEq)]
pub struct VoltageDrop {
    pub distance_m: f64,
    pub load_kw: f64,
    pub load_current_a: f64,
    pub voltage_drop_v: f64,
    pub voltage_drop_percent: f64,
    pub is_acceptable: bool,
    pub limit_percent: f64,
    pub wire_spec: WireSpec,
}

/// Nominal voltage and acceptance limit for the given source class and
/// requested phase.
fn nominal_voltage(
    config: &DesignConfig,
    phase: ServicePhase,
    source: VoltageClass,
) -> (f64, f64) {
    match (source, phase) {
        (VoltageClass::Hv, _) => (config.nominal_voltage_hv, config.limit_vd_hv),
        (_, ServicePhase::Three) => (config.nominal_voltage_lv_three, config.limit_vd_lv),
        (_, ServicePhase::Single) => (config.nominal_voltage_lv, config.limit_vd_lv),
    }
}

/// Computes the percent drop over `distance_m` at `load_kw`.
pub fn calculate(
    config: &DesignConfig,
    distance_m: f64,
    load_kw: f64,
    phase: ServicePhase,
    source: VoltageClass,
    wire_spec: WireSpec,
) -> VoltageDrop {
    let (nominal_v, limit_percent) = nominal_voltage(config, phase, source);

    let load_current_a = load_kw * 1000.0 / (nominal_v * phase.phase_factor());

    // conductor constant per metre: 2R single-phase return, √3·R three-phase
    let resistance_per_m = wire_spec.resistance_ohm_per_km() / 1000.0;
    let k = match phase {
        ServicePhase::Single => 2.0 * resistance_per_m,
        ServicePhase::Three => 3f64.sqrt() * resistance_per_m,
    };

    let voltage_drop_v = k * load_current_a * distance_m;
    let voltage_drop_percent = voltage_drop_v / nominal_v * 100.0;
    let is_acceptable = voltage_drop_percent <= limit_percent;

    debug!(
        distance_m,
        load_kw,
        drop_percent = voltage_drop_percent,
        acceptable = is_acceptable,
        "voltage drop evaluated"
    );

    VoltageDrop {
        distance_m,
        load_kw,
        load_current_a,
        voltage_drop_v,
        voltage_drop_percent,
        is_acceptable,
        limit_percent,
        wire_spec,
    }
}
