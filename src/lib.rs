#![doc = include_str!("../README.md")]

mod allocate;
mod cache;
mod candidates;
mod config;
mod cost;
mod crossing;
mod engine;
mod error;
mod geometry;
mod graph;
mod index;
mod model;
mod normalize;
mod pathfind;
mod route;
mod voltage;

pub use cache::{BboxKey, FeatureCache};
pub use candidates::{Candidate, select_candidates};
pub use config::{DesignConfig, PriceTable};
pub use cost::{
    CostBreakdown, LaborCost, MaterialCost, cost_index, estimate as estimate_cost, select_specs,
};
pub use crossing::{Crossing, validate_path};
pub use engine::{
    CancelToken, DesignEngine, DesignOutcome, DesignStatus, Diagnostics, RejectReason,
    RejectedCandidate,
};
pub use error::DesignError;
pub use graph::{
    EdgeId, EdgeKind, GraphBuildResult, NodeId, NodeOrigin, RoadEdge, RoadGraph, RoadNode,
    build_graph,
};
pub use index::SpatialIndex;
pub use model::{
    Building, Coordinate, DesignRequest, Line, LineType, PhaseClass, Pole, PoleSpec, Railway,
    River, Road, RoadClass, ServicePhase, Transformer, VoltageClass, WireSpec,
};
pub use normalize::{
    DropCounters, NormalizedFeatures, RawFeatureSet, decode_phase, decode_wire_spec, normalize,
};
pub use pathfind::{PathOutcome, PathResult, Pathfinder, fast_track_path};
pub use route::{RouteResult, rank_routes};
pub use voltage::{VoltageDrop, calculate as calculate_voltage_drop};
