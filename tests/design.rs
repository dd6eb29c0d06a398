//! End-to-end scenarios over GeoJSON fixtures: fast-track, graph routing,
//! phase filtering, crossing rejection, distance caps and deterministic
//! ordering.

mod common;

use common::*;
use gridpath::{
    Coordinate, DesignConfig, DesignEngine, DesignRequest, DesignStatus, RawFeatureSet,
    RejectReason, ServicePhase, VoltageClass,
};
use test_log::test;

fn engine() -> DesignEngine {
    DesignEngine::new(DesignConfig::default())
}

fn request(x: f64, y: f64, phase: ServicePhase) -> DesignRequest {
    DesignRequest {
        consumer: Coordinate::new(x, y),
        phase,
        load_kw: None,
    }
}

fn c(x: f64, y: f64) -> Coordinate {
    Coordinate::new(x, y)
}

#[test]
fn fast_track_direct_connection() {
    // one LV pole 31.6 m away, no roads, nothing in between
    let features = RawFeatureSet {
        poles: vec![pole("P1", 14_242_530.0, 4_437_648.0)],
        lines: vec![lv_wire(
            "W1",
            &[(14_242_530.0, 4_437_648.0), (14_242_560.0, 4_437_658.0)],
        )],
        ..Default::default()
    };

    let outcome = engine().run(
        &request(14_242_500.0, 4_437_638.0, ServicePhase::Single),
        &features,
    );

    assert_eq!(outcome.status, DesignStatus::Success);
    assert_eq!(outcome.routes.len(), 1);

    let route = &outcome.routes[0];
    assert_eq!(route.rank, 1);
    assert_eq!(
        route.path_coordinates,
        vec![
            c(14_242_500.0, 4_437_638.0),
            c(14_242_530.0, 4_437_648.0)
        ]
    );
    assert_eq!(route.new_poles_count, 0);
    assert!(route.new_pole_coordinates.is_empty());
    assert!((route.total_distance - 1000f64.sqrt()).abs() < 1e-6);
    assert!(route.is_fast_track);
    assert!(route.remark.is_some());
    assert_eq!(route.source_voltage_type, VoltageClass::Lv);
    assert!(route.voltage_drop.is_acceptable);
}

#[test]
fn graph_route_along_a_straight_road() {
    // 200 m road, consumer 3 m off one end, LV pole 2 m off the other
    let features = RawFeatureSet {
        poles: vec![pole("P1", 200.0, 2.0)],
        lines: vec![lv_wire("W1", &[(200.0, 2.0), (250.0, 2.0)])],
        roads: vec![road("R1", &[(0.0, 0.0), (200.0, 0.0)])],
        ..Default::default()
    };

    let outcome = engine().run(&request(0.0, -3.0, ServicePhase::Single), &features);

    assert_eq!(outcome.status, DesignStatus::Success);
    assert_eq!(outcome.routes.len(), 1);

    let route = &outcome.routes[0];
    assert!((route.total_distance - 205.0).abs() < 1e-6);
    assert_eq!(route.new_poles_count, 5);
    assert_eq!(route.new_poles_count, route.new_pole_coordinates.len());
    assert_eq!(
        route.path_coordinates,
        vec![c(0.0, -3.0), c(0.0, 0.0), c(200.0, 0.0), c(200.0, 2.0)]
    );
    // interval multiples measured along the path, consumer side first
    assert_eq!(route.new_pole_coordinates[0], c(37.0, 0.0));
    assert_eq!(route.new_pole_coordinates[4], c(197.0, 0.0));
    for w in route.path_coordinates.windows(2) {
        assert!(w[0].distance(w[1]) > 0.0);
    }
}

#[test]
fn three_phase_request_rejects_lv_only_poles() {
    let features = RawFeatureSet {
        poles: vec![pole("P1", 200.0, 2.0)],
        lines: vec![lv_wire("W1", &[(200.0, 2.0), (250.0, 2.0)])],
        roads: vec![road("R1", &[(0.0, 0.0), (200.0, 0.0)])],
        ..Default::default()
    };

    let outcome = engine().run(&request(0.0, -3.0, ServicePhase::Three), &features);
    assert_eq!(outcome.status, DesignStatus::NoCandidate);
    assert!(outcome.routes.is_empty());
}

#[test]
fn three_phase_request_served_from_hv3_pole() {
    let features = RawFeatureSet {
        poles: vec![pole("P1", 200.0, 2.0)],
        lines: vec![hv3_wire("W1", &[(200.0, 2.0), (250.0, 2.0)])],
        roads: vec![road("R1", &[(0.0, 0.0), (200.0, 0.0)])],
        ..Default::default()
    };

    let outcome = engine().run(&request(0.0, -3.0, ServicePhase::Three), &features);
    assert_eq!(outcome.status, DesignStatus::Success);

    let route = &outcome.routes[0];
    assert_eq!(route.source_phase_type, 3);
    assert_eq!(route.source_voltage_type, VoltageClass::Hv);
    assert_eq!(route.voltage_drop.limit_percent, 3.0);
}

#[test]
fn single_phase_hv_only_pole_is_not_three_phase_capable() {
    let features = RawFeatureSet {
        poles: vec![pole("P1", 200.0, 2.0)],
        lines: vec![hv_wire("W1", &[(200.0, 2.0), (250.0, 2.0)])],
        roads: vec![road("R1", &[(0.0, 0.0), (200.0, 0.0)])],
        ..Default::default()
    };

    let outcome = engine().run(&request(0.0, -3.0, ServicePhase::Three), &features);
    assert_eq!(outcome.status, DesignStatus::NoCandidate);
}

#[test]
fn crossing_paths_are_rejected_with_diagnostics() {
    // three radiating roads; wires cross the first two, the third is clear
    let features = RawFeatureSet {
        poles: vec![
            pole("P1", 102.0, 0.0),
            pole("P2", 0.0, 102.0),
            pole("P3", -102.0, 0.0),
        ],
        lines: vec![
            lv_wire("W1", &[(102.0, 0.0), (140.0, 30.0)]),
            lv_wire("W2", &[(0.0, 102.0), (30.0, 140.0)]),
            lv_wire("W3", &[(-102.0, 0.0), (-140.0, 30.0)]),
            hv3_wire("HV1", &[(50.0, -20.0), (50.0, 20.0)]),
            hv3_wire("HV2", &[(-20.0, 50.0), (20.0, 50.0)]),
        ],
        roads: vec![
            road("RA", &[(0.0, 0.0), (100.0, 0.0)]),
            road("RB", &[(0.0, 0.0), (0.0, 100.0)]),
            road("RC", &[(0.0, 0.0), (-100.0, 0.0)]),
        ],
        ..Default::default()
    };

    let outcome = engine().run(&request(0.0, -3.0, ServicePhase::Single), &features);

    assert_eq!(outcome.status, DesignStatus::Success);
    assert_eq!(outcome.routes.len(), 1);
    assert_eq!(outcome.routes[0].start_pole_id, "P3");
    assert_eq!(outcome.routes[0].rank, 1);

    let crossed: Vec<&str> = outcome
        .diagnostics
        .rejected_candidates
        .iter()
        .filter_map(|r| match &r.reason {
            RejectReason::Crossing { line_id, .. } => Some(line_id.as_str()),
            _ => None,
        })
        .collect();
    assert!(crossed.contains(&"HV1"));
    assert!(crossed.contains(&"HV2"));
}

#[test]
fn over_distance_by_road_with_reachable_euclidean() {
    // 450 m by road, 390 m by air
    let features = RawFeatureSet {
        poles: vec![pole("P1", 390.0, 2.0)],
        lines: vec![lv_wire("W1", &[(390.0, 2.0), (420.0, 30.0)])],
        roads: vec![road("R1", &[(0.0, 0.0), (195.0, 112.5), (390.0, 0.0)])],
        ..Default::default()
    };

    let outcome = engine().run(&request(0.0, -3.0, ServicePhase::Single), &features);

    assert_eq!(outcome.status, DesignStatus::OverDistance);
    assert!(outcome.routes.is_empty());
    assert!(
        outcome
            .diagnostics
            .rejected_candidates
            .iter()
            .any(|r| r.reason == RejectReason::OverDistance)
    );
}

#[test]
fn mixed_over_distance_and_unreachable_is_no_route() {
    // one candidate over the cap by road, one on a disconnected road
    let features = RawFeatureSet {
        poles: vec![pole("PA", 390.0, 2.0), pole("PB", 200.0, 205.0)],
        lines: vec![
            lv_wire("WA", &[(390.0, 2.0), (420.0, 30.0)]),
            lv_wire("WB", &[(200.0, 205.0), (230.0, 235.0)]),
        ],
        roads: vec![
            road("R1", &[(0.0, 0.0), (195.0, 112.5), (390.0, 0.0)]),
            road("R2", &[(150.0, 200.0), (250.0, 200.0)]),
        ],
        ..Default::default()
    };

    let outcome = engine().run(&request(0.0, -3.0, ServicePhase::Single), &features);

    // not every candidate ended over-distance, so the status stays NoRoute
    assert_eq!(outcome.status, DesignStatus::NoRoute);
    assert!(outcome.routes.is_empty());

    let reasons: Vec<&RejectReason> = outcome
        .diagnostics
        .rejected_candidates
        .iter()
        .map(|r| &r.reason)
        .collect();
    assert!(reasons.contains(&&RejectReason::OverDistance));
    assert!(reasons.contains(&&RejectReason::Unreachable));
}

#[test]
fn routed_distance_exactly_at_the_cap_is_accepted() {
    let features = RawFeatureSet {
        poles: vec![pole("P1", 395.0, 2.0)],
        lines: vec![lv_wire("W1", &[(395.0, 2.0), (430.0, 30.0)])],
        roads: vec![road("R1", &[(0.0, 0.0), (395.0, 0.0)])],
        ..Default::default()
    };

    let outcome = engine().run(&request(0.0, -3.0, ServicePhase::Single), &features);

    assert_eq!(outcome.status, DesignStatus::Success);
    let route = &outcome.routes[0];
    assert!((route.total_distance - 400.0).abs() < 1e-9);
    // the k = 10 interval position would land on the source pole
    assert_eq!(route.new_poles_count, 9);
}

#[test]
fn consumer_exactly_at_attachment_distance_is_accepted() {
    let features = RawFeatureSet {
        poles: vec![pole("P1", 60.0, 5.0)],
        lines: vec![lv_wire("W1", &[(60.0, 5.0), (90.0, 40.0)])],
        roads: vec![road("R1", &[(0.0, 0.0), (100.0, 0.0)])],
        ..Default::default()
    };

    let outcome = engine().run(&request(50.0, 100.0, ServicePhase::Single), &features);

    assert_eq!(outcome.status, DesignStatus::Success);
    assert!((outcome.routes[0].total_distance - 115.0).abs() < 1e-6);
}

#[test]
fn candidate_exactly_at_fast_track_limit() {
    let features = RawFeatureSet {
        poles: vec![pole("P1", 50.0, 0.0)],
        lines: vec![lv_wire("W1", &[(50.0, 0.0), (80.0, 30.0)])],
        ..Default::default()
    };

    let outcome = engine().run(&request(0.0, 0.0, ServicePhase::Single), &features);

    assert_eq!(outcome.status, DesignStatus::Success);
    let route = &outcome.routes[0];
    assert!(route.is_fast_track);
    assert_eq!(route.path_coordinates, vec![c(0.0, 0.0), c(50.0, 0.0)]);
}

#[test]
fn consumer_beyond_attachment_distance_has_no_road_access() {
    let features = RawFeatureSet {
        poles: vec![pole("P1", 60.0, 5.0)],
        lines: vec![lv_wire("W1", &[(60.0, 5.0), (90.0, 40.0)])],
        roads: vec![road("R1", &[(0.0, 0.0), (100.0, 0.0)])],
        ..Default::default()
    };

    let outcome = engine().run(&request(50.0, 150.0, ServicePhase::Single), &features);

    assert_eq!(outcome.status, DesignStatus::NoRoadAccess);
    assert!(outcome.routes.is_empty());
    assert!(outcome.error_message.is_some());
}

#[test]
fn unclearable_building_leaves_no_route() {
    let features = RawFeatureSet {
        poles: vec![pole("P1", 95.0, 2.0)],
        lines: vec![lv_wire("W1", &[(95.0, 2.0), (130.0, 30.0)])],
        roads: vec![road("R1", &[(0.0, 0.0), (100.0, 0.0)])],
        buildings: vec![building(
            "B1",
            &[(30.0, -2.0), (50.0, -2.0), (50.0, 2.0), (30.0, 2.0)],
        )],
        ..Default::default()
    };

    let outcome = engine().run(&request(0.0, -3.0, ServicePhase::Single), &features);

    assert_eq!(outcome.status, DesignStatus::NoRoute);
    assert!(
        outcome
            .diagnostics
            .rejected_candidates
            .iter()
            .any(|r| matches!(r.reason, RejectReason::BuildingBlocked { .. }))
    );
}

#[test]
fn identical_input_yields_identical_output() {
    let features = RawFeatureSet {
        poles: vec![
            pole("P1", 102.0, 0.0),
            pole("P2", 0.0, 102.0),
            pole("P3", -102.0, 0.0),
        ],
        lines: vec![
            lv_wire("W1", &[(102.0, 0.0), (140.0, 30.0)]),
            lv_wire("W2", &[(0.0, 102.0), (30.0, 140.0)]),
            lv_wire("W3", &[(-102.0, 0.0), (-140.0, 30.0)]),
            hv3_wire("HV1", &[(50.0, -20.0), (50.0, 20.0)]),
        ],
        roads: vec![
            road("RA", &[(0.0, 0.0), (100.0, 0.0)]),
            road("RB", &[(0.0, 0.0), (0.0, 100.0)]),
            road("RC", &[(0.0, 0.0), (-100.0, 0.0)]),
        ],
        ..Default::default()
    };

    let req = request(0.0, -3.0, ServicePhase::Single);
    let first = engine().run(&req, &features);
    let second = engine().run(&req, &features);

    assert_eq!(first.status, second.status);
    assert_eq!(first.routes, second.routes);
    assert_eq!(
        first.diagnostics.rejected_candidates,
        second.diagnostics.rejected_candidates
    );
}

#[test]
fn routes_are_ranked_by_cost_index() {
    // two clear candidates at different road distances
    let features = RawFeatureSet {
        poles: vec![pole("NEAR", 102.0, 0.0), pole("FAR", 0.0, 152.0)],
        lines: vec![
            lv_wire("W1", &[(102.0, 0.0), (140.0, 30.0)]),
            lv_wire("W2", &[(0.0, 152.0), (30.0, 190.0)]),
        ],
        roads: vec![
            road("RA", &[(0.0, 0.0), (100.0, 0.0)]),
            road("RB", &[(0.0, 0.0), (0.0, 150.0)]),
        ],
        ..Default::default()
    };

    let outcome = engine().run(&request(0.0, -3.0, ServicePhase::Single), &features);

    assert_eq!(outcome.status, DesignStatus::Success);
    assert_eq!(outcome.routes.len(), 2);
    assert_eq!(outcome.routes[0].start_pole_id, "NEAR");
    assert_eq!(outcome.routes[1].start_pole_id, "FAR");
    // pole-dominant score: 2 poles, 105 m, one bend at the road join
    assert_eq!(outcome.routes[0].cost_index, 2 * 10_000 + 105 + 50);
    // 3 poles, 155 m, straight onto the road
    assert_eq!(outcome.routes[1].cost_index, 3 * 10_000 + 155);
    assert_eq!(outcome.routes[0].rank, 1);
    assert_eq!(outcome.routes[1].rank, 2);

    // every accepted route respects the distance cap
    for route in &outcome.routes {
        assert!(route.total_distance <= 400.0);
    }
}
