//! Drives the design pipeline for one request.
//!
//! 1. Normalize raw features and build the spatial index.
//! 2. Select candidate source poles by phase and radius.
//! 3. Build the road graph and attach the consumer and the candidates.
//! 4. Find a path per candidate (direct segment for fast-track).
//! 5. Validate crossings, place new poles, price and check voltage drop.
//! 6. Rank accepted routes by cost index.
//!
//! Cancellation and the wall-clock deadline are honoured at stage
//! boundaries; the pathfinder additionally polls the token during long
//! searches. Request-level failures are statuses, never panics.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::allocate::allocate;
use crate::candidates::{Candidate, select_candidates};
use crate::cost::{cost_index, estimate};
use crate::crossing::validate_path;
use crate::error::DesignError;
use crate::graph::build_graph;
use crate::normalize::{DropCounters, RawFeatureSet, normalize};
use crate::pathfind::{PathOutcome, PathResult, Pathfinder, fast_track_path};
use crate::route::{RouteResult, rank_routes};
use crate::{
    Coordinate, DesignConfig, DesignRequest, LineType, NormalizedFeatures, SpatialIndex, voltage,
};

/// Shared cancellation flag; cloning hands out another handle to the same
/// signal.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Terminal status of a request. All of these are normal outcomes except
/// `InternalError`, which signals a bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DesignStatus {
    Success,
    NoCandidate,
    NoRoadAccess,
    NoRoute,
    OverDistance,
    Timeout,
    Cancelled,
    InternalError,
}

impl DesignStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::NoCandidate => "NoCandidate",
            Self::NoRoadAccess => "NoRoadAccess",
            Self::NoRoute => "NoRoute",
            Self::OverDistance => "OverDistance",
            Self::Timeout => "Timeout",
            Self::Cancelled => "Cancelled",
            Self::InternalError => "InternalError",
        }
    }
}

/// Why a candidate produced no route.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    NoRoadAttachment,
    Unreachable,
    OverDistance,
    Crossing {
        line_id: String,
        line_type: LineType,
    },
    BuildingBlocked {
        /// Arc-length position of the pole that could not clear a building.
        position: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedCandidate {
    pub pole_id: String,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub dropped_features: DropCounters,
    pub rejected_candidates: Vec<RejectedCandidate>,
}

/// Final result of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignOutcome {
    pub status: DesignStatus,
    /// Textual request phase, `"SINGLE"` or `"THREE"`.
    pub request_spec: &'static str,
    pub consumer_coord: Coordinate,
    /// Ranked routes; empty unless `status` is `Success`.
    pub routes: Vec<RouteResult>,
    pub error_message: Option<String>,
    pub processing_time_ms: u64,
    pub diagnostics: Diagnostics,
}

/// The design pipeline. Holds only configuration; every request owns its
/// own state and releases it on return.
#[derive(Debug, Clone)]
pub struct DesignEngine {
    config: DesignConfig,
}

impl DesignEngine {
    pub fn new(config: DesignConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DesignConfig {
        &self.config
    }

    pub fn run(&self, request: &DesignRequest, features: &RawFeatureSet) -> DesignOutcome {
        self.run_with(request, features, &CancelToken::new())
    }

    pub fn run_with(
        &self,
        request: &DesignRequest,
        features: &RawFeatureSet,
        cancel: &CancelToken,
    ) -> DesignOutcome {
        let started = Instant::now();
        match self.execute(request, features, cancel, started) {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(%error, "request failed on an internal error");
                self.outcome(
                    request,
                    started,
                    DesignStatus::InternalError,
                    Vec::new(),
                    Some(error.to_string()),
                    Diagnostics::default(),
                )
            }
        }
    }

    fn execute(
        &self,
        request: &DesignRequest,
        raw: &RawFeatureSet,
        cancel: &CancelToken,
        started: Instant,
    ) -> Result<DesignOutcome, DesignError> {
        let config = &self.config;
        let deadline = started + config.request_timeout;
        let load_kw = request.load_kw.unwrap_or(config.default_load_kw);

        info!(
            phase = request.phase.as_str(),
            x = request.consumer.x,
            y = request.consumer.y,
            load_kw,
            "design request started"
        );

        let interrupted = || {
            if cancel.is_cancelled() {
                Some(DesignStatus::Cancelled)
            } else if Instant::now() >= deadline {
                Some(DesignStatus::Timeout)
            } else {
                None
            }
        };

        macro_rules! checkpoint {
            ($engine:expr, $diagnostics:expr) => {
                if let Some(status) = interrupted() {
                    return Ok($engine.outcome(
                        request,
                        started,
                        status,
                        Vec::new(),
                        None,
                        $diagnostics,
                    ));
                }
            };
        }

        checkpoint!(self, Diagnostics::default());

        let features = normalize(config, raw);
        let mut diagnostics = Diagnostics {
            dropped_features: features.dropped.clone(),
            rejected_candidates: Vec::new(),
        };

        checkpoint!(self, diagnostics);

        let index = SpatialIndex::build(&features);
        let candidates = select_candidates(
            &features,
            &index,
            request.consumer,
            request.phase,
            config.max_distance,
            config.fast_track_limit,
        );

        if candidates.is_empty() {
            return Ok(self.outcome(
                request,
                started,
                DesignStatus::NoCandidate,
                Vec::new(),
                Some("no pole matching the requested phase within radius".into()),
                diagnostics,
            ));
        }

        checkpoint!(self, diagnostics);

        let built = build_graph(config, &features.roads, request.consumer, &candidates);
        let attachment: FxHashMap<usize, crate::NodeId> =
            built.attachments.iter().copied().collect();

        checkpoint!(self, diagnostics);

        let mut pathfinder = Pathfinder::new(&built.graph);
        let mut routes = Vec::new();

        for (candidate_index, candidate) in candidates.iter().enumerate() {
            if candidate.is_fast_track {
                let path = fast_track_path(request.consumer, candidate.position);
                match self.accept_route(
                    request,
                    &features,
                    &index,
                    candidate,
                    path,
                    load_kw,
                ) {
                    Ok(route) => {
                        routes.push(route);
                        continue;
                    }
                    Err(reason) => {
                        debug!(id = %candidate.pole_id, ?reason, "fast track rejected");
                        diagnostics.rejected_candidates.push(RejectedCandidate {
                            pole_id: candidate.pole_id.clone(),
                            reason,
                        });
                        // fall through to road routing
                    }
                }
            }

            if !built.consumer_attached {
                continue;
            }

            let Some(&goal) = attachment.get(&candidate_index) else {
                diagnostics.rejected_candidates.push(RejectedCandidate {
                    pole_id: candidate.pole_id.clone(),
                    reason: RejectReason::NoRoadAttachment,
                });
                continue;
            };

            match pathfinder.shortest_path(built.consumer_node, goal, config.max_distance, cancel)?
            {
                PathOutcome::Reached(path) => {
                    match self.accept_route(request, &features, &index, candidate, path, load_kw) {
                        Ok(route) => routes.push(route),
                        Err(reason) => {
                            debug!(id = %candidate.pole_id, ?reason, "route rejected");
                            diagnostics.rejected_candidates.push(RejectedCandidate {
                                pole_id: candidate.pole_id.clone(),
                                reason,
                            });
                        }
                    }
                }
                PathOutcome::OverDistance => {
                    diagnostics.rejected_candidates.push(RejectedCandidate {
                        pole_id: candidate.pole_id.clone(),
                        reason: RejectReason::OverDistance,
                    });
                }
                PathOutcome::Unreachable => {
                    diagnostics.rejected_candidates.push(RejectedCandidate {
                        pole_id: candidate.pole_id.clone(),
                        reason: RejectReason::Unreachable,
                    });
                }
                PathOutcome::Cancelled => {
                    return Ok(self.outcome(
                        request,
                        started,
                        DesignStatus::Cancelled,
                        Vec::new(),
                        None,
                        diagnostics,
                    ));
                }
            }
        }

        checkpoint!(self, diagnostics);

        if !routes.is_empty() {
            let ranked = rank_routes(routes, config.max_routes);
            return Ok(self.outcome(
                request,
                started,
                DesignStatus::Success,
                ranked,
                None,
                diagnostics,
            ));
        }

        if !built.consumer_attached {
            return Ok(self.outcome(
                request,
                started,
                DesignStatus::NoRoadAccess,
                Vec::new(),
                Some("no road within attachment distance of the consumer".into()),
                diagnostics,
            ));
        }

        // OverDistance only when every candidate ended over the cap; any
        // crossing, blocked, unreachable or unattached rejection means a
        // different failure is in play
        let all_over_distance = !diagnostics.rejected_candidates.is_empty()
            && diagnostics
                .rejected_candidates
                .iter()
                .all(|r| r.reason == RejectReason::OverDistance);

        let (status, message) = if all_over_distance {
            (
                DesignStatus::OverDistance,
                "every reachable path exceeds the distance cap",
            )
        } else {
            (DesignStatus::NoRoute, "no candidate yields an accepted path")
        };

        Ok(self.outcome(
            request,
            started,
            status,
            Vec::new(),
            Some(message.into()),
            diagnostics,
        ))
    }

    /// Validates, allocates, prices and assembles one route.
    fn accept_route(
        &self,
        request: &DesignRequest,
        features: &NormalizedFeatures,
        index: &SpatialIndex,
        candidate: &Candidate,
        path: PathResult,
        load_kw: f64,
    ) -> Result<RouteResult, RejectReason> {
        let config = &self.config;

        validate_path(index, &path.polyline).map_err(|crossing| RejectReason::Crossing {
            line_id: crossing.line_id,
            line_type: crossing.line_type,
        })?;

        let allocation = allocate(config, features, index, &path)
            .map_err(|blocked| RejectReason::BuildingBlocked {
                position: blocked.position,
            })?;

        let pole = &features.poles[candidate.pole_index];
        let source_voltage = pole.voltage_class;

        let breakdown = estimate(
            config,
            request.phase,
            source_voltage,
            load_kw,
            path.total_length,
            allocation.new_poles.len(),
            allocation.turn_count,
        );
        let drop = voltage::calculate(
            config,
            path.total_length,
            load_kw,
            request.phase,
            source_voltage,
            breakdown.material.wire_spec,
        );

        let remark = path.is_fast_track.then(|| {
            format!(
                "FastTrack - direct connection within {:.0} m",
                config.fast_track_limit
            )
        });

        let score = cost_index(
            config,
            allocation.new_poles.len(),
            path.total_length,
            allocation.turn_count,
        );

        Ok(RouteResult {
            rank: 0,
            total_cost: breakdown.total_cost,
            cost_index: score,
            total_distance: path.total_length,
            start_pole_id: candidate.pole_id.clone(),
            start_pole_coord: candidate.position,
            new_poles_count: allocation.new_poles.len(),
            path_coordinates: path.polyline,
            new_pole_coordinates: allocation.new_poles,
            wire_cost: breakdown.material.wire_cost,
            pole_cost: breakdown.material.pole_cost,
            labor_cost: breakdown.labor.total,
            overhead_cost: breakdown.overhead_cost,
            profit_cost: breakdown.profit_cost,
            pole_spec: breakdown.material.pole_spec,
            wire_spec: breakdown.material.wire_spec,
            source_voltage_type: source_voltage,
            source_phase_type: if pole.has_hv_three_phase { 3 } else { 1 },
            voltage_drop: drop,
            detailed_cost: breakdown,
            turn_count: allocation.turn_count,
            is_fast_track: path.is_fast_track,
            remark,
        })
    }

    fn outcome(
        &self,
        request: &DesignRequest,
        started: Instant,
        status: DesignStatus,
        routes: Vec<RouteResult>,
        error_message: Option<String>,
        diagnostics: Diagnostics,
    ) -> DesignOutcome {
        let processing_time_ms = started.elapsed().as_millis() as u64;
        info!(
            status = status.as_str(),
            routes = routes.len(),
            processing_time_ms,
            "design request finished"
        );
        DesignOutcome {
            status,
            request_spec: request.phase.as_str(),
            consumer_coord: request.consumer,
            routes,
            error_message,
            processing_time_ms,
            diagnostics,
        }
    }
}
