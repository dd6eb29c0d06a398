//! Read-only spatial indices built once per request: existing lines (for
//! crossing tests), road segments (for snapping), buildings (for pole
//! avoidance) and poles (for candidate selection by radius).

use geo::Point;
use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::geometry::{point_strictly_inside, project_onto_segment};
use crate::{Coordinate, LineType, NormalizedFeatures};

/// An existing wire span held by the index.
#[derive(Debug, Clone)]
pub struct IndexedLine {
    pub id: String,
    pub line_type: LineType,
    pub vertices: Vec<Coordinate>,
    envelope: AABB<Point>,
}

impl RTreeObject for IndexedLine {
    type Envelope = AABB<Point>;
    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// One segment of a road polyline. Roads are indexed per segment so a
/// nearest lookup returns the enclosing segment directly.
#[derive(Debug, Clone)]
pub struct IndexedRoadSegment {
    pub road_index: usize,
    pub segment_index: usize,
    pub a: Coordinate,
    pub b: Coordinate,
}

impl RTreeObject for IndexedRoadSegment {
    type Envelope = AABB<Point>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.a.point(), self.b.point())
    }
}

impl PointDistance for IndexedRoadSegment {
    fn distance_2(&self, point: &Point) -> f64 {
        let d = project_onto_segment(Coordinate::from(*point), self.a, self.b).distance;
        d * d
    }
}

#[derive(Debug, Clone)]
pub struct IndexedBuilding {
    pub building_index: usize,
    envelope: AABB<Point>,
}

impl RTreeObject for IndexedBuilding {
    type Envelope = AABB<Point>;
    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

#[derive(Debug, Clone)]
pub struct IndexedPole {
    pub pole_index: usize,
    pub position: Coordinate,
}

impl RTreeObject for IndexedPole {
    type Envelope = AABB<Point>;
    fn envelope(&self) -> Self::Envelope {
        self.position.point().envelope()
    }
}

impl PointDistance for IndexedPole {
    fn distance_2(&self, point: &Point) -> f64 {
        let d = self.position.distance(Coordinate::from(*point));
        d * d
    }
}

fn polyline_envelope(vertices: &[Coordinate]) -> AABB<Point> {
    let mut min = vertices[0];
    let mut max = vertices[0];
    for v in vertices {
        min = Coordinate::new(min.x.min(v.x), min.y.min(v.y));
        max = Coordinate::new(max.x.max(v.x), max.y.max(v.y));
    }
    AABB::from_corners(min.point(), max.point())
}

/// Immutable per-request spatial index.
#[derive(Debug)]
pub struct SpatialIndex {
    lines: RTree<IndexedLine>,
    road_segments: RTree<IndexedRoadSegment>,
    buildings: RTree<IndexedBuilding>,
    poles: RTree<IndexedPole>,
}

impl SpatialIndex {
    pub fn build(features: &NormalizedFeatures) -> Self {
        let lines = features
            .lines
            .iter()
            .map(|line| IndexedLine {
                id: line.id.clone(),
                line_type: line.line_type,
                vertices: line.vertices.clone(),
                envelope: polyline_envelope(&line.vertices),
            })
            .collect();

        let mut segments = Vec::new();
        for (road_index, road) in features.roads.iter().enumerate() {
            for (segment_index, w) in road.vertices.windows(2).enumerate() {
                segments.push(IndexedRoadSegment {
                    road_index,
                    segment_index,
                    a: w[0],
                    b: w[1],
                });
            }
        }

        let buildings = features
            .buildings
            .iter()
            .enumerate()
            .map(|(building_index, b)| {
                let exterior: Vec<Coordinate> =
                    b.polygon.exterior().coords().map(|c| (*c).into()).collect();
                IndexedBuilding {
                    building_index,
                    envelope: polyline_envelope(&exterior),
                }
            })
            .collect();

        let poles = features
            .poles
            .iter()
            .enumerate()
            .map(|(pole_index, p)| IndexedPole {
                pole_index,
                position: p.position,
            })
            .collect();

        Self {
            lines: RTree::bulk_load(lines),
            road_segments: RTree::bulk_load(segments),
            buildings: RTree::bulk_load(buildings),
            poles: RTree::bulk_load(poles),
        }
    }

    /// All indexed lines whose envelope intersects the given rectangle.
    pub fn lines_in_bbox(
        &self,
        min: Coordinate,
        max: Coordinate,
    ) -> impl Iterator<Item = &IndexedLine> {
        self.lines
            .locate_in_envelope_intersecting(&AABB::from_corners(min.point(), max.point()))
    }

    /// Road segments ordered by increasing distance to the coordinate.
    pub fn road_segments_near(
        &self,
        c: Coordinate,
    ) -> impl Iterator<Item = &IndexedRoadSegment> {
        self.road_segments.nearest_neighbor_iter(&c.point())
    }

    pub fn has_roads(&self) -> bool {
        self.road_segments.size() > 0
    }

    /// Indices of buildings whose envelope intersects the rectangle.
    pub fn buildings_in_bbox(
        &self,
        min: Coordinate,
        max: Coordinate,
    ) -> impl Iterator<Item = &IndexedBuilding> {
        self.buildings
            .locate_in_envelope_intersecting(&AABB::from_corners(min.point(), max.point()))
    }

    /// Whether the coordinate lies strictly inside any building footprint.
    pub fn inside_building(&self, features: &NormalizedFeatures, c: Coordinate) -> bool {
        self.buildings_in_bbox(c, c).any(|b| {
            point_strictly_inside(&features.buildings[b.building_index].polygon, c)
        })
    }

    /// Poles within `radius` of `center`, ordered by increasing distance.
    pub fn poles_within(&self, center: Coordinate, radius: f64) -> Vec<(usize, f64)> {
        let mut result: Vec<(usize, f64)> = self
            .poles
            .locate_within_distance(center.point(), radius * radius)
            .map(|p| (p.pole_index, p.position.distance(center)))
            .collect();
        result.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        result
    }
}
