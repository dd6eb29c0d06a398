//! Selects the existing poles that can source the requested service and
//! orders them for the pathfinder.
//!
//! The phase matching rule is strict for three-phase requests (only poles
//! carrying a three-phase high-voltage line qualify) and permissive for
//! single-phase requests (any pole with an incident line qualifies). The
//! radius filter is a hard request limit, not a quality knob.

use tracing::debug;

use crate::geometry::segment_blocked_by_polygon;
use crate::{Coordinate, NormalizedFeatures, ServicePhase, SpatialIndex};

/// An existing pole considered as the origin for serving the consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub pole_index: usize,
    pub pole_id: String,
    pub position: Coordinate,
    /// Straight-line distance to the consumer, metres.
    pub distance_to_consumer: f64,
    /// Eligible for a direct segment without routing through roads.
    pub is_fast_track: bool,
    /// Ordering key for the pathfinder; lower explores first.
    pub priority: i64,
}

/// Selects, scores and orders candidate source poles.
pub fn select_candidates(
    features: &NormalizedFeatures,
    index: &SpatialIndex,
    consumer: Coordinate,
    phase: ServicePhase,
    max_distance: f64,
    fast_track_limit: f64,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for (pole_index, distance) in index.poles_within(consumer, max_distance) {
        let pole = &features.poles[pole_index];

        let matches = match phase {
            ServicePhase::Three => pole.has_hv_three_phase,
            ServicePhase::Single => pole.has_lv || pole.has_hv,
        };
        if !matches {
            continue;
        }

        let mut priority = distance.floor() as i64;
        match phase {
            ServicePhase::Single => {
                if pole.has_lv {
                    priority -= 100;
                } else {
                    // HV-only source needs a transformer, so it ranks behind
                    priority += 50;
                }
            }
            ServicePhase::Three => {
                if pole.has_hv_three_phase {
                    priority -= 100;
                } else if pole.has_hv {
                    priority -= 50;
                }
            }
        }

        let is_fast_track =
            distance <= fast_track_limit && !direct_segment_blocked(features, index, consumer, pole.position);

        debug!(
            id = %pole.id,
            distance,
            priority,
            fast_track = is_fast_track,
            "candidate accepted"
        );

        candidates.push(Candidate {
            pole_index,
            pole_id: pole.id.clone(),
            position: pole.position,
            distance_to_consumer: distance,
            is_fast_track,
            priority,
        });
    }

    candidates.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.distance_to_consumer.total_cmp(&b.distance_to_consumer))
            .then_with(|| a.pole_id.cmp(&b.pole_id))
    });

    candidates
}

/// A direct consumer-pole segment that passes through a building cannot be
/// strung; the candidate then falls back to road routing.
fn direct_segment_blocked(
    features: &NormalizedFeatures,
    index: &SpatialIndex,
    consumer: Coordinate,
    pole: Coordinate,
) -> bool {
    let min = Coordinate::new(consumer.x.min(pole.x), consumer.y.min(pole.y));
    let max = Coordinate::new(consumer.x.max(pole.x), consumer.y.max(pole.y));

    index.buildings_in_bbox(min, max).any(|b| {
        segment_blocked_by_polygon(
            consumer,
            pole,
            &features.buildings[b.building_index].polygon,
        )
    })
}
