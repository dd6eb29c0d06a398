//! Weighted road-centerline graph with the consumer and the candidate
//! poles snapped in.
//!
//! Nodes and edges live in two parallel tables addressed by id newtypes;
//! edges carry node ids, never references. Nodes are keyed by quantized
//! coordinates so repeated vertices collapse, and road endpoints within the
//! snap tolerance are stitched to repair topology errors in the source.

use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::geometry::{SegmentProjection, project_onto_segment};
use crate::{Candidate, Coordinate, DesignConfig, Road};

/// Shortest representable edge; keeps lengths strictly positive when an
/// attachment point coincides with the road.
const MIN_EDGE_LENGTH: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOrigin {
    /// Vertex of a road polyline.
    RoadVertex,
    /// Synthetic vertex inserted when an attachment splits a segment.
    RoadSplit,
    Consumer,
    PoleAttach,
}

#[derive(Debug, Clone)]
pub struct RoadNode {
    pub coordinate: Coordinate,
    pub origin: NodeOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Segment of a road polyline (including split halves).
    Road,
    /// Synthetic edge repairing a broken road topology.
    Stitch,
    /// Consumer or pole attachment edge.
    Connection,
}

#[derive(Debug, Clone)]
pub struct RoadEdge {
    pub nodes: [NodeId; 2],
    /// Straight-line length, metres. Strictly positive.
    pub length: f64,
    /// Length plus the amortised cost of new poles along the span.
    pub weight: f64,
    pub kind: EdgeKind,
    /// Originating road, absent for stitch and attachment edges.
    pub road_id: Option<String>,
    removed: bool,
}

/// Undirected graph over parallel node and edge tables.
#[derive(Debug)]
pub struct RoadGraph {
    nodes: Vec<RoadNode>,
    edges: Vec<RoadEdge>,
    adjacency: Vec<Vec<(EdgeId, NodeId)>>,
}

impl RoadGraph {
    pub fn node(&self, id: NodeId) -> Option<&RoadNode> {
        self.nodes.get(id.0 as usize)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&RoadEdge> {
        self.edges.get(id.0 as usize).filter(|e| !e.removed)
    }

    pub fn neighbors(&self, id: NodeId) -> impl Iterator<Item = (EdgeId, NodeId)> + '_ {
        self.adjacency
            .get(id.0 as usize)
            .into_iter()
            .flatten()
            .copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn live_edge_count(&self) -> usize {
        self.edges.iter().filter(|e| !e.removed).count()
    }

    pub fn degree(&self, id: NodeId) -> usize {
        self.adjacency.get(id.0 as usize).map_or(0, Vec::len)
    }
}

/// Result of one graph construction.
#[derive(Debug)]
pub struct GraphBuildResult {
    pub graph: RoadGraph,
    /// Consumer node; has at least one incident edge iff `consumer_attached`.
    pub consumer_node: NodeId,
    pub consumer_attached: bool,
    /// Candidate index → its attachment node.
    pub attachments: Vec<(usize, NodeId)>,
    /// Candidates with no road within the attachment distance.
    pub unattached: Vec<usize>,
}

/// Builds the road graph for one request and attaches the consumer and all
/// candidate poles.
pub fn build_graph(
    config: &DesignConfig,
    roads: &[Road],
    consumer: Coordinate,
    candidates: &[Candidate],
) -> GraphBuildResult {
    let mut builder = GraphBuilder::new(config);

    builder.insert_roads(roads);
    builder.stitch_endpoints();

    info!(
        nodes = builder.nodes.len(),
        edges = builder.edges.len(),
        "road graph assembled"
    );

    let consumer_target = builder.attach_point(consumer);
    let consumer_node = builder.add_node(consumer, NodeOrigin::Consumer);
    let consumer_attached = match consumer_target {
        Some(target) => {
            builder.connect(consumer_node, target);
            true
        }
        None => {
            warn!("consumer has no road within attachment distance");
            false
        }
    };

    let mut attachments = Vec::new();
    let mut unattached = Vec::new();

    if consumer_attached {
        for (candidate_index, candidate) in candidates.iter().enumerate() {
            match builder.attach_point(candidate.position) {
                Some(target) => {
                    let node = builder.add_node(candidate.position, NodeOrigin::PoleAttach);
                    builder.connect(node, target);
                    attachments.push((candidate_index, node));
                }
                None => {
                    debug!(id = %candidate.pole_id, "candidate has no road access");
                    unattached.push(candidate_index);
                }
            }
        }
    }

    GraphBuildResult {
        graph: builder.finish(),
        consumer_node,
        consumer_attached,
        attachments,
        unattached,
    }
}

struct GraphBuilder<'a> {
    config: &'a DesignConfig,
    nodes: Vec<RoadNode>,
    edges: Vec<RoadEdge>,
    adjacency: Vec<Vec<(EdgeId, NodeId)>>,
    /// 1 m grid over node coordinates for vertex collapsing.
    grid: FxHashMap<(i64, i64), Vec<NodeId>>,
    cell: f64,
}

impl<'a> GraphBuilder<'a> {
    fn new(config: &'a DesignConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            edges: Vec::new(),
            adjacency: Vec::new(),
            grid: FxHashMap::default(),
            cell: config.vertex_merge_tolerance.max(0.01),
        }
    }

    fn grid_key(&self, c: Coordinate) -> (i64, i64) {
        ((c.x / self.cell).floor() as i64, (c.y / self.cell).floor() as i64)
    }

    fn add_node(&mut self, coordinate: Coordinate, origin: NodeOrigin) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(RoadNode { coordinate, origin });
        self.adjacency.push(Vec::new());
        self.grid.entry(self.grid_key(coordinate)).or_default().push(id);
        id
    }

    /// Closest existing node within `tolerance`, ties broken by id.
    fn find_node_near(&self, c: Coordinate, tolerance: f64) -> Option<NodeId> {
        let key = self.grid_key(c);
        let reach = (tolerance / self.cell).ceil() as i64;

        let mut best: Option<(f64, NodeId)> = None;
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                let Some(bucket) = self.grid.get(&(key.0 + dx, key.1 + dy)) else {
                    continue;
                };
                for &id in bucket {
                    let d = self.nodes[id.0 as usize].coordinate.distance(c);
                    if d <= tolerance
                        && best.is_none_or(|(bd, bid)| d < bd || (d == bd && id < bid))
                    {
                        best = Some((d, id));
                    }
                }
            }
        }
        best.map(|(_, id)| id)
    }

    fn get_or_create_road_node(&mut self, c: Coordinate) -> NodeId {
        match self.find_node_near(c, self.config.vertex_merge_tolerance) {
            Some(id) => id,
            None => self.add_node(c, NodeOrigin::RoadVertex),
        }
    }

    fn edge_weight(&self, length: f64) -> f64 {
        length + (length / self.config.pole_interval) * self.config.pole_cost_share
    }

    fn add_edge(
        &mut self,
        u: NodeId,
        v: NodeId,
        length: f64,
        kind: EdgeKind,
        road_id: Option<String>,
    ) {
        if u == v {
            return;
        }
        let length = length.max(MIN_EDGE_LENGTH);
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(RoadEdge {
            nodes: [u, v],
            length,
            weight: self.edge_weight(length),
            kind,
            road_id,
            removed: false,
        });
        self.adjacency[u.0 as usize].push((id, v));
        self.adjacency[v.0 as usize].push((id, u));
    }

    fn remove_edge(&mut self, id: EdgeId) {
        let [u, v] = self.edges[id.0 as usize].nodes;
        self.edges[id.0 as usize].removed = true;
        self.adjacency[u.0 as usize].retain(|(e, _)| *e != id);
        self.adjacency[v.0 as usize].retain(|(e, _)| *e != id);
    }

    fn are_connected(&self, u: NodeId, v: NodeId) -> bool {
        self.adjacency[u.0 as usize].iter().any(|(_, n)| *n == v)
    }

    fn insert_roads(&mut self, roads: &[Road]) {
        for road in roads {
            for w in road.vertices.windows(2) {
                let u = self.get_or_create_road_node(w[0]);
                let v = self.get_or_create_road_node(w[1]);
                let length = w[0].distance(w[1]);
                if length > 0.0 {
                    self.add_edge(u, v, length, EdgeKind::Road, Some(road.id.clone()));
                }
            }
        }
    }

    /// Connects dangling road endpoints that lie within the snap tolerance
    /// but belong to disconnected polylines.
    fn stitch_endpoints(&mut self) {
        let endpoints: Vec<NodeId> = (0..self.nodes.len() as u32)
            .map(NodeId)
            .filter(|id| self.adjacency[id.0 as usize].len() == 1)
            .collect();

        for (i, &u) in endpoints.iter().enumerate() {
            for &v in &endpoints[i + 1..] {
                let cu = self.nodes[u.0 as usize].coordinate;
                let cv = self.nodes[v.0 as usize].coordinate;
                let distance = cu.distance(cv);

                if distance > 0.0
                    && distance <= self.config.snap_tolerance
                    && !self.are_connected(u, v)
                {
                    debug!(?u, ?v, distance, "stitched disconnected road endpoints");
                    self.add_edge(u, v, distance, EdgeKind::Stitch, None);
                }
            }
        }
    }

    /// Finds the nearest road segment within the attachment distance and
    /// returns the node to connect to, splitting the segment when the
    /// perpendicular foot falls strictly inside it.
    fn attach_point(&mut self, point: Coordinate) -> Option<NodeId> {
        let mut best: Option<(EdgeId, SegmentProjection)> = None;

        for (i, edge) in self.edges.iter().enumerate() {
            if edge.removed || edge.kind == EdgeKind::Connection {
                continue;
            }
            let a = self.nodes[edge.nodes[0].0 as usize].coordinate;
            let b = self.nodes[edge.nodes[1].0 as usize].coordinate;
            let projection = project_onto_segment(point, a, b);

            if best
                .as_ref()
                .is_none_or(|(_, bp)| projection.distance < bp.distance)
            {
                best = Some((EdgeId(i as u32), projection));
            }
        }

        let (edge_id, projection) = best?;
        if projection.distance > self.config.max_attach {
            return None;
        }

        let [u, v] = self.edges[edge_id.0 as usize].nodes;
        let cu = self.nodes[u.0 as usize].coordinate;
        let cv = self.nodes[v.0 as usize].coordinate;

        // reuse an existing vertex when the foot lands on one
        if projection.foot.distance(cu) <= self.config.vertex_merge_tolerance {
            return Some(u);
        }
        if projection.foot.distance(cv) <= self.config.vertex_merge_tolerance {
            return Some(v);
        }

        let road_id = self.edges[edge_id.0 as usize].road_id.clone();
        let kind = self.edges[edge_id.0 as usize].kind;
        let foot = self.add_node(projection.foot, NodeOrigin::RoadSplit);
        self.remove_edge(edge_id);
        self.add_edge(u, foot, cu.distance(projection.foot), kind, road_id.clone());
        self.add_edge(foot, v, projection.foot.distance(cv), kind, road_id);

        Some(foot)
    }

    fn connect(&mut self, point_node: NodeId, target: NodeId) {
        let a = self.nodes[point_node.0 as usize].coordinate;
        let b = self.nodes[target.0 as usize].coordinate;
        self.add_edge(point_node, target, a.distance(b), EdgeKind::Connection, None);
    }

    fn finish(self) -> RoadGraph {
        debug_assert!(
            self.edges
                .iter()
                .filter(|e| !e.removed)
                .all(|e| e.length > 0.0 && e.weight > 0.0)
        );
        RoadGraph {
            nodes: self.nodes,
            edges: self.edges,
            adjacency: self.adjacency,
        }
    }
}
