//! Assembled route results and their deterministic ranking.

use crate::cost::CostBreakdown;
use crate::voltage::VoltageDrop;
use crate::{Coordinate, PoleSpec, VoltageClass, WireSpec};

/// One feasible wiring route, fully priced and validated.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteResult {
    /// 1-based rank after sorting; assigned by [`rank_routes`].
    pub rank: u32,
    pub total_cost: u64,
    /// Weighted ranking score: new poles dominate, then routed metres,
    /// then turns.
    pub cost_index: u64,
    /// Routed length from the consumer to the source pole, metres.
    pub total_distance: f64,
    pub start_pole_id: String,
    pub start_pole_coord: Coordinate,
    pub new_poles_count: usize,
    pub path_coordinates: Vec<Coordinate>,
    pub new_pole_coordinates: Vec<Coordinate>,
    pub wire_cost: u64,
    pub pole_cost: u64,
    pub labor_cost: u64,
    pub overhead_cost: u64,
    pub profit_cost: u64,
    pub pole_spec: PoleSpec,
    pub wire_spec: WireSpec,
    /// Voltage class of the source pole.
    pub source_voltage_type: VoltageClass,
    /// 1 or 3, from the source pole's connectivity.
    pub source_phase_type: u8,
    pub voltage_drop: VoltageDrop,
    pub detailed_cost: CostBreakdown,
    pub turn_count: usize,
    pub is_fast_track: bool,
    pub remark: Option<String>,
}

/// Sorts ascending by `(cost_index, total_distance, start_pole_id)`, assigns
/// ranks from 1 and truncates to `max_routes`.
pub fn rank_routes(mut routes: Vec<RouteResult>, max_routes: usize) -> Vec<RouteResult> {
    routes.sort_by(|a, b| {
        a.cost_index
            .cmp(&b.cost_index)
            .then_with(|| a.total_distance.total_cmp(&b.total_distance))
            .then_with(|| a.start_pole_id.cmp(&b.start_pole_id))
    });
    routes.truncate(max_routes);
    for (i, route) in routes.iter_mut().enumerate() {
        route.rank = (i + 1) as u32;
    }
    routes
}
