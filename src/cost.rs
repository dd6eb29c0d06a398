//! Itemised construction cost for one route: material, labor, overhead and
//! profit, plus the integer cost index used for ranking.

use tracing::debug;

use crate::{DesignConfig, PoleSpec, ServicePhase, VoltageClass, WireSpec};

/// Paths longer than this upgrade the conductor one size to keep the drop
/// in check.
const LONG_SPAN_THRESHOLD: f64 = 200.0;

/// Material column of the breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialCost {
    pub pole_count: usize,
    pub pole_spec: PoleSpec,
    pub pole_unit_cost: u64,
    pub pole_cost: u64,
    pub wire_length: f64,
    pub wire_spec: WireSpec,
    pub wire_unit_cost: u64,
    pub wire_cost: u64,
    pub insulator_count: usize,
    pub insulator_cost: u64,
    pub arm_tie_count: usize,
    pub arm_tie_cost: u64,
    pub clamp_count: usize,
    pub clamp_cost: u64,
    pub connector_count: usize,
    pub connector_cost: u64,
    pub total: u64,
}

/// Labor column of the breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct LaborCost {
    pub base: u64,
    pub pole_install_count: usize,
    pub pole_install_unit_cost: u64,
    pub pole_install_cost: u64,
    pub wire_stretch_length: f64,
    pub wire_stretch_unit_cost: u64,
    pub wire_stretch_cost: u64,
    pub insulator_install_count: usize,
    pub insulator_install_unit_cost: u64,
    pub insulator_install_cost: u64,
    pub total: u64,
}

/// Full itemisation for one route.
#[derive(Debug, Clone, PartialEq)]
pub struct CostBreakdown {
    pub material: MaterialCost,
    pub labor: LaborCost,
    pub overhead_rate: f64,
    pub overhead_cost: u64,
    pub profit_rate: f64,
    pub profit_cost: u64,
    /// Turn-pole surcharge (road crossings and bend hardware).
    pub extra_cost: u64,
    pub subtotal: u64,
    pub total_cost: u64,
}

/// Integer ranking key from the route evaluation score: each new pole
/// weighs 10 000 points against 1 point per metre and 50 per turn, so a
/// route that plants one pole fewer outranks any same-length alternative.
pub fn cost_index(
    config: &DesignConfig,
    new_pole_count: usize,
    distance: f64,
    turn_count: usize,
) -> u64 {
    new_pole_count as u64 * config.score_weight_pole
        + (distance * config.score_weight_distance) as u64
        + turn_count as u64 * config.score_weight_turn
}

/// Selects pole and wire specs from the request phase, source class,
/// load and span length.
pub fn select_specs(
    phase: ServicePhase,
    source: VoltageClass,
    load_kw: f64,
    path_length: f64,
) -> (PoleSpec, WireSpec) {
    let wire = match (phase, source) {
        (ServicePhase::Single, VoltageClass::Hv) => {
            if load_kw <= 20.0 {
                WireSpec::Acsr58
            } else {
                WireSpec::Acsr95
            }
        }
        (ServicePhase::Single, _) => {
            if load_kw <= 5.0 {
                WireSpec::Ow22
            } else if load_kw <= 20.0 {
                WireSpec::Ow38
            } else {
                WireSpec::Acsr58
            }
        }
        (ServicePhase::Three, _) => {
            if load_kw <= 5.0 {
                WireSpec::Acsr58
            } else if load_kw <= 20.0 {
                WireSpec::Acsr95
            } else {
                WireSpec::Acsr160
            }
        }
    };

    let wire = if path_length > LONG_SPAN_THRESHOLD {
        wire.upgraded()
    } else {
        wire
    };

    let pole = match (phase, source) {
        (ServicePhase::Single, VoltageClass::Lv | VoltageClass::Unknown) => PoleSpec::C10,
        _ if wire == WireSpec::Acsr160 => PoleSpec::C14,
        _ => PoleSpec::C12,
    };

    (pole, wire)
}

/// Prices one route.
pub fn estimate(
    config: &DesignConfig,
    phase: ServicePhase,
    source: VoltageClass,
    load_kw: f64,
    path_length: f64,
    new_pole_count: usize,
    turn_count: usize,
) -> CostBreakdown {
    let prices = &config.prices;
    let (pole_spec, wire_spec) = select_specs(phase, source, load_kw, path_length);

    let pole_unit_cost = prices.pole_unit_cost(pole_spec);
    let wire_unit_cost = prices.wire_unit_cost(wire_spec);

    let insulator_count = new_pole_count * 3;
    let arm_tie_count = new_pole_count;
    let clamp_count = new_pole_count * 2;
    let connector_count = new_pole_count.max(1);

    let mut material = MaterialCost {
        pole_count: new_pole_count,
        pole_spec,
        pole_unit_cost,
        pole_cost: new_pole_count as u64 * pole_unit_cost,
        wire_length: path_length,
        wire_spec,
        wire_unit_cost,
        wire_cost: (path_length * wire_unit_cost as f64) as u64,
        insulator_count,
        insulator_cost: insulator_count as u64 * prices.insulator_pin,
        arm_tie_count,
        arm_tie_cost: arm_tie_count as u64 * prices.arm_tie,
        clamp_count,
        clamp_cost: clamp_count as u64 * prices.clamp,
        connector_count,
        connector_cost: connector_count as u64 * prices.connector,
        total: 0,
    };
    material.total = material.pole_cost
        + material.wire_cost
        + material.insulator_cost
        + material.arm_tie_cost
        + material.clamp_cost
        + material.connector_cost;

    let mut labor = LaborCost {
        base: prices.labor_base,
        pole_install_count: new_pole_count,
        pole_install_unit_cost: prices.labor_pole_install,
        pole_install_cost: new_pole_count as u64 * prices.labor_pole_install,
        wire_stretch_length: path_length,
        wire_stretch_unit_cost: prices.labor_wire_stretch,
        wire_stretch_cost: (path_length * prices.labor_wire_stretch as f64) as u64,
        insulator_install_count: insulator_count,
        insulator_install_unit_cost: prices.labor_insulator,
        insulator_install_cost: insulator_count as u64 * prices.labor_insulator,
        total: 0,
    };
    labor.total =
        labor.base + labor.pole_install_cost + labor.wire_stretch_cost + labor.insulator_install_cost;

    let subtotal = material.total + labor.total;
    let overhead_cost = (subtotal as f64 * config.overhead_rate) as u64;
    let profit_cost = ((subtotal + overhead_cost) as f64 * config.profit_rate) as u64;
    let extra_cost = turn_count as u64 * prices.road_crossing;
    let total_cost = subtotal + overhead_cost + profit_cost + extra_cost;

    debug!(
        pole_spec = pole_spec.as_str(),
        wire_spec = wire_spec.as_str(),
        total_cost,
        "route priced"
    );

    CostBreakdown {
        material,
        labor,
        overhead_rate: config.overhead_rate,
        overhead_cost,
        profit_rate: config.profit_rate,
        profit_cost,
        extra_cost,
        subtotal,
        total_cost,
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn spec_selection_by_phase_and_load() {
        assert_eq!(
            select_specs(ServicePhase::Single, VoltageClass::Lv, 5.0, 100.0),
            (PoleSpec::C10, WireSpec::Ow22)
        );
        assert_eq!(
            select_specs(ServicePhase::Single, VoltageClass::Lv, 15.0, 100.0),
            (PoleSpec::C10, WireSpec::Ow38)
        );
        assert_eq!(
            select_specs(ServicePhase::Single, VoltageClass::Hv, 5.0, 100.0),
            (PoleSpec::C12, WireSpec::Acsr58)
        );
        assert_eq!(
            select_specs(ServicePhase::Three, VoltageClass::Hv, 5.0, 100.0),
            (PoleSpec::C12, WireSpec::Acsr58)
        );
        assert_eq!(
            select_specs(ServicePhase::Three, VoltageClass::Hv, 30.0, 100.0),
            (PoleSpec::C14, WireSpec::Acsr160)
        );
    }

    #[test]
    fn long_spans_upgrade_the_wire() {
        assert_eq!(
            select_specs(ServicePhase::Single, VoltageClass::Lv, 5.0, 250.0),
            (PoleSpec::C10, WireSpec::Ow38)
        );
        assert_eq!(
            select_specs(ServicePhase::Three, VoltageClass::Hv, 15.0, 250.0),
            (PoleSpec::C14, WireSpec::Acsr160)
        );
    }

    #[test]
    fn breakdown_arithmetic() {
        let config = DesignConfig::default();
        let breakdown = estimate(
            &config,
            ServicePhase::Single,
            VoltageClass::Lv,
            5.0,
            100.0,
            2,
            0,
        );

        // material: 2 × 350 000 + 100 × 5 500 + 6 × 25 000 + 2 × 35 000
        //         + 4 × 15 000 + 2 × 8 000
        assert_eq!(breakdown.material.pole_cost, 700_000);
        assert_eq!(breakdown.material.wire_cost, 550_000);
        assert_eq!(breakdown.material.total, 1_546_000);

        // labor: 200 000 + 2 × 250 000 + 100 × 15 000 + 6 × 20 000
        assert_eq!(breakdown.labor.total, 2_320_000);

        assert_eq!(breakdown.subtotal, 3_866_000);
        assert_eq!(breakdown.overhead_cost, 193_300);
        assert_eq!(breakdown.profit_cost, 202_965);
        assert_eq!(breakdown.total_cost, 4_262_265);
    }

    #[test]
    fn cost_index_ranks_pole_count_above_distance() {
        let config = DesignConfig::default();
        assert_eq!(cost_index(&config, 2, 105.0, 1), 20_155);
        assert_eq!(cost_index(&config, 0, 31.6, 0), 31);
        // one pole fewer beats any in-radius distance or turn advantage
        assert!(cost_index(&config, 1, 399.9, 3) < cost_index(&config, 2, 40.0, 0));
    }

    #[test]
    fn turns_add_the_crossing_surcharge() {
        let config = DesignConfig::default();
        let straight = estimate(
            &config,
            ServicePhase::Single,
            VoltageClass::Lv,
            5.0,
            100.0,
            2,
            0,
        );
        let bent = estimate(
            &config,
            ServicePhase::Single,
            VoltageClass::Lv,
            5.0,
            100.0,
            2,
            2,
        );
        assert_eq!(bent.total_cost - straight.total_cost, 200_000);
    }
}
