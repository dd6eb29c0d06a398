//! Shortest weighted paths from the consumer to each candidate pole.
//!
//! A* over edge weights with the straight-line distance as heuristic. The
//! heuristic is admissible because every edge weight is at least its
//! length. Ties in the priority queue break on node id so repeated runs
//! expand nodes in the same order and produce identical floating-point
//! sums.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::error::DesignError;
use crate::{CancelToken, Coordinate, NodeId, RoadGraph};

/// Cancellation polling interval, in node expansions.
const CANCEL_CHECK_INTERVAL: usize = 1024;

/// An accepted consumer → candidate path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathResult {
    /// Ordered coordinates from the consumer to the candidate pole.
    /// Consecutive vertices are never equal.
    pub polyline: Vec<Coordinate>,
    /// Sum of edge lengths, metres.
    pub total_length: f64,
    /// Sum of edge weights.
    pub total_weight: f64,
    pub is_fast_track: bool,
}

/// Outcome of one search.
#[derive(Debug, Clone, PartialEq)]
pub enum PathOutcome {
    Reached(PathResult),
    /// Every frontier extension toward the goal exceeded the length cap.
    OverDistance,
    Unreachable,
    Cancelled,
}

/// A direct consumer-pole segment for fast-track candidates. Still subject
/// to crossing validation.
pub fn fast_track_path(consumer: Coordinate, pole: Coordinate) -> PathResult {
    let distance = consumer.distance(pole);
    PathResult {
        polyline: vec![consumer, pole],
        total_length: distance,
        total_weight: distance,
        is_fast_track: true,
    }
}

#[derive(Debug, Clone, Copy)]
struct HeapElement {
    /// Weight so far plus the heuristic to the goal.
    estimate: f64,
    weight: f64,
    length: f64,
    node: NodeId,
}

// BinaryHeap pops its greatest element, so the comparison is inverted to
// get a min-heap on the estimate; equal estimates fall back to the node
// id, which keeps the expansion order reproducible.
impl Ord for HeapElement {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .estimate
            .total_cmp(&self.estimate)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for HeapElement {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeapElement {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapElement {}

/// Per-request search state. The heuristic memo lives for the request and
/// is dropped with it; its presence never changes results.
pub struct Pathfinder<'g> {
    graph: &'g RoadGraph,
    heuristic_cache: FxHashMap<(NodeId, NodeId), f64>,
}

impl<'g> Pathfinder<'g> {
    pub fn new(graph: &'g RoadGraph) -> Self {
        Self {
            graph,
            heuristic_cache: FxHashMap::default(),
        }
    }

    fn heuristic(&mut self, from: NodeId, to: NodeId) -> Result<f64, DesignError> {
        if let Some(&h) = self.heuristic_cache.get(&(from, to)) {
            return Ok(h);
        }

        let coordinate = |id: NodeId| {
            self.graph
                .node(id)
                .map(|n| n.coordinate)
                .ok_or_else(|| DesignError::internal(format!("unknown node {id:?}")))
        };
        let h = coordinate(from)?.distance(coordinate(to)?);
        self.heuristic_cache.insert((from, to), h);
        Ok(h)
    }

    /// A* from `origin` to `goal`, abandoning any branch whose accumulated
    /// length exceeds `max_length`.
    pub fn shortest_path(
        &mut self,
        origin: NodeId,
        goal: NodeId,
        max_length: f64,
        cancel: &CancelToken,
    ) -> Result<PathOutcome, DesignError> {
        debug!(?origin, ?goal, "computing shortest path");

        // cheapest weight seen so far per node
        let mut best_weight: FxHashMap<NodeId, f64> = FxHashMap::default();
        best_weight.insert(origin, 0.0);

        // predecessor on that cheapest path, for unpacking
        let mut previous: FxHashMap<NodeId, NodeId> = FxHashMap::default();

        let mut frontier = BinaryHeap::from([HeapElement {
            estimate: self.heuristic(origin, goal)?,
            weight: 0.0,
            length: 0.0,
            node: origin,
        }]);

        let mut pruned_by_cap = false;
        let mut expansions = 0usize;

        while let Some(element) = frontier.pop() {
            expansions += 1;
            if expansions % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return Ok(PathOutcome::Cancelled);
            }

            if element.node == goal {
                return Ok(PathOutcome::Reached(self.unpack(
                    &previous,
                    goal,
                    element.length,
                    element.weight,
                )?));
            }

            let known = best_weight
                .get(&element.node)
                .copied()
                .unwrap_or(f64::INFINITY);
            if element.weight > known {
                continue;
            }

            for (edge_id, neighbor) in self.graph.neighbors(element.node) {
                let edge = self
                    .graph
                    .edge(edge_id)
                    .ok_or_else(|| DesignError::internal(format!("unknown edge {edge_id:?}")))?;

                let length = element.length + edge.length;
                if length > max_length {
                    trace!(?neighbor, length, "branch exceeds length cap");
                    pruned_by_cap = true;
                    continue;
                }

                let weight = element.weight + edge.weight;
                let known = best_weight.get(&neighbor).copied().unwrap_or(f64::INFINITY);
                if weight < known {
                    best_weight.insert(neighbor, weight);
                    previous.insert(neighbor, element.node);
                    frontier.push(HeapElement {
                        estimate: weight + self.heuristic(neighbor, goal)?,
                        weight,
                        length,
                        node: neighbor,
                    });
                }
            }
        }

        // the cap may prune branches far from the goal, so over-distance
        // is only reported when the goal is actually connected
        Ok(if pruned_by_cap && self.is_connected(origin, goal) {
            PathOutcome::OverDistance
        } else {
            PathOutcome::Unreachable
        })
    }

    /// Plain reachability, ignoring lengths.
    fn is_connected(&self, origin: NodeId, goal: NodeId) -> bool {
        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        visited.insert(origin);
        let mut stack = vec![origin];

        while let Some(node) = stack.pop() {
            if node == goal {
                return true;
            }
            for (_, neighbor) in self.graph.neighbors(node) {
                if visited.insert(neighbor) {
                    stack.push(neighbor);
                }
            }
        }

        false
    }

    fn unpack(
        &self,
        previous: &FxHashMap<NodeId, NodeId>,
        goal: NodeId,
        total_length: f64,
        total_weight: f64,
    ) -> Result<PathResult, DesignError> {
        let mut nodes = vec![goal];
        let mut next = goal;
        while let Some(&prev) = previous.get(&next) {
            next = prev;
            nodes.push(prev);
        }
        nodes.reverse();

        let mut polyline: Vec<Coordinate> = Vec::with_capacity(nodes.len());
        for id in nodes {
            let node = self
                .graph
                .node(id)
                .ok_or_else(|| DesignError::internal(format!("unknown node {id:?}")))?;
            // attachment feet may coincide with the point they serve
            if polyline.last() != Some(&node.coordinate) {
                polyline.push(node.coordinate);
            }
        }

        Ok(PathResult {
            polyline,
            total_length,
            total_weight,
            is_fast_track: false,
        })
    }
}
