//! Places new poles along an accepted path at the configured interval.
//!
//! Positions are multiples of the interval measured along the polyline,
//! strictly between the consumer and the existing source pole; the last
//! span may be shorter. A position inside a building slides along the path
//! within the nudge budget or the whole path is rejected.

use tracing::{debug, trace};

use crate::geometry::{interior_angle, point_at_arc_length, polyline_length};
use crate::pathfind::PathResult;
use crate::{Coordinate, DesignConfig, NormalizedFeatures, SpatialIndex};

/// Granularity of the building-avoidance slide.
const NUDGE_STEP: f64 = 0.5;

/// Placement result for one path.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    /// Ordered new-pole coordinates, consumer side first.
    pub new_poles: Vec<Coordinate>,
    /// Interior bends sharper than the configured angle.
    pub turn_count: usize,
}

/// A pole position that could not escape a building within the budget.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationBlocked {
    /// Arc-length position of the offending pole, metres from the consumer.
    pub position: f64,
}

/// Allocates new poles for an accepted path.
pub fn allocate(
    config: &DesignConfig,
    features: &NormalizedFeatures,
    index: &SpatialIndex,
    path: &PathResult,
) -> Result<Allocation, AllocationBlocked> {
    let turn_count = count_turns(config, &path.polyline);

    if path.is_fast_track && path.total_length <= config.fast_track_limit {
        return Ok(Allocation {
            new_poles: Vec::new(),
            turn_count,
        });
    }

    let length = polyline_length(&path.polyline);
    let count = (length / config.pole_interval).floor() as usize;
    let mut new_poles = Vec::with_capacity(count);

    for k in 1..=count {
        let position = k as f64 * config.pole_interval;
        // a position coinciding with the source pole is not interior
        if position >= length - 1e-6 {
            continue;
        }

        let placed = place_pole(config, features, index, &path.polyline, position, length)
            .ok_or(AllocationBlocked { position })?;
        new_poles.push(placed);
    }

    debug!(
        poles = new_poles.len(),
        turns = turn_count,
        length,
        "pole allocation complete"
    );

    Ok(Allocation {
        new_poles,
        turn_count,
    })
}

/// Interpolates the pole position, sliding along the path when it lands
/// inside a building. Smaller displacements are preferred; at equal
/// magnitude the forward direction wins.
fn place_pole(
    config: &DesignConfig,
    features: &NormalizedFeatures,
    index: &SpatialIndex,
    polyline: &[Coordinate],
    position: f64,
    total_length: f64,
) -> Option<Coordinate> {
    let base = point_at_arc_length(polyline, position);
    if !index.inside_building(features, base) {
        return Some(base);
    }

    let steps = (config.pole_nudge / NUDGE_STEP).round() as usize;
    for step in 1..=steps {
        let offset = step as f64 * NUDGE_STEP;
        for signed in [offset, -offset] {
            let shifted = position + signed;
            if shifted <= 1e-6 || shifted >= total_length - 1e-6 {
                continue;
            }
            let nudged = point_at_arc_length(polyline, shifted);
            if !index.inside_building(features, nudged) {
                trace!(position, offset = signed, "pole nudged out of building");
                return Some(nudged);
            }
        }
    }

    None
}

fn count_turns(config: &DesignConfig, polyline: &[Coordinate]) -> usize {
    if polyline.len() < 3 {
        return 0;
    }
    polyline
        .windows(3)
        .filter(|w| interior_angle(w[0], w[1], w[2]) < config.turn_angle_limit)
        .count()
}

#[cfg(test)]
mod tests {
    use geo::polygon;
    use test_log::test;

    use super::*;
    use crate::normalize::{RawFeatureSet, normalize};
    use crate::{Building, DesignConfig};

    fn c(x: f64, y: f64) -> Coordinate {
        Coordinate::new(x, y)
    }

    fn empty_features() -> NormalizedFeatures {
        normalize(&DesignConfig::default(), &RawFeatureSet::default())
    }

    fn path(polyline: Vec<Coordinate>, fast_track: bool) -> PathResult {
        let total_length = polyline_length(&polyline);
        PathResult {
            polyline,
            total_length,
            total_weight: total_length,
            is_fast_track: fast_track,
        }
    }

    #[test]
    fn poles_at_interval_multiples() {
        let features = empty_features();
        let index = SpatialIndex::build(&features);
        let config = DesignConfig::default();

        let p = path(vec![c(0.0, 0.0), c(205.0, 0.0)], false);
        let allocation = allocate(&config, &features, &index, &p).unwrap();

        assert_eq!(allocation.new_poles.len(), 5);
        for (k, pole) in allocation.new_poles.iter().enumerate() {
            assert_eq!(*pole, c((k as f64 + 1.0) * 40.0, 0.0));
        }
    }

    #[test]
    fn exact_multiple_keeps_poles_interior() {
        let features = empty_features();
        let index = SpatialIndex::build(&features);
        let config = DesignConfig::default();

        // 200 m: the k = 5 position would land on the source pole
        let p = path(vec![c(0.0, 0.0), c(200.0, 0.0)], false);
        let allocation = allocate(&config, &features, &index, &p).unwrap();
        assert_eq!(allocation.new_poles.len(), 4);
        assert_eq!(allocation.new_poles.last(), Some(&c(160.0, 0.0)));
    }

    #[test]
    fn fast_track_needs_no_poles() {
        let features = empty_features();
        let index = SpatialIndex::build(&features);
        let config = DesignConfig::default();

        let p = path(vec![c(0.0, 0.0), c(30.0, 10.0)], true);
        let allocation = allocate(&config, &features, &index, &p).unwrap();
        assert!(allocation.new_poles.is_empty());
    }

    #[test]
    fn positions_follow_the_bends() {
        let features = empty_features();
        let index = SpatialIndex::build(&features);
        let config = DesignConfig::default();

        let p = path(vec![c(0.0, 0.0), c(30.0, 0.0), c(30.0, 60.0)], false);
        let allocation = allocate(&config, &features, &index, &p).unwrap();

        assert_eq!(allocation.new_poles.len(), 2);
        assert_eq!(allocation.new_poles[0], c(30.0, 10.0));
        assert_eq!(allocation.new_poles[1], c(30.0, 50.0));
        assert_eq!(allocation.turn_count, 1);
    }

    #[test]
    fn pole_inside_building_is_nudged_out() {
        let mut features = empty_features();
        features.buildings.push(Building {
            id: "B1".into(),
            polygon: polygon![
                (x: 37.8, y: -1.0),
                (x: 42.2, y: -1.0),
                (x: 42.2, y: 1.0),
                (x: 37.8, y: 1.0),
            ],
        });
        let index = SpatialIndex::build(&features);
        let config = DesignConfig::default();

        let p = path(vec![c(0.0, 0.0), c(100.0, 0.0)], false);
        let allocation = allocate(&config, &features, &index, &p).unwrap();

        assert_eq!(allocation.new_poles.len(), 2);
        // the 40 m pole slid forward to the first clear position
        assert_eq!(allocation.new_poles[0], c(42.5, 0.0));
        assert_eq!(allocation.new_poles[1], c(80.0, 0.0));
    }

    #[test]
    fn unclearable_building_rejects_the_path() {
        let mut features = empty_features();
        features.buildings.push(Building {
            id: "B1".into(),
            polygon: polygon![
                (x: 30.0, y: -1.0),
                (x: 50.0, y: -1.0),
                (x: 50.0, y: 1.0),
                (x: 30.0, y: 1.0),
            ],
        });
        let index = SpatialIndex::build(&features);
        let config = DesignConfig::default();

        let p = path(vec![c(0.0, 0.0), c(100.0, 0.0)], false);
        let blocked = allocate(&config, &features, &index, &p).unwrap_err();
        assert_eq!(blocked.position, 40.0);
    }
}
