//! Rejects paths whose interior strictly crosses an existing wire.
//!
//! A touch at a shared endpoint (the candidate pole itself, or a road node
//! coincident with a line terminus) is permitted; any other shared point is
//! a crossing and the path is rejected, not repaired.

use tracing::debug;

use crate::geometry::strict_crossing;
use crate::{Coordinate, LineType, SpatialIndex};

/// The first strict crossing found on a path.
#[derive(Debug, Clone, PartialEq)]
pub struct Crossing {
    pub line_id: String,
    pub line_type: LineType,
    pub at: Coordinate,
}

/// Validates a path polyline against all existing lines. Short-circuits on
/// the first strict crossing; candidate lines are prefiltered by bounding
/// box overlap.
pub fn validate_path(index: &SpatialIndex, path: &[Coordinate]) -> Result<(), Crossing> {
    if path.len() < 2 {
        return Ok(());
    }

    let mut min = path[0];
    let mut max = path[0];
    for p in path {
        min = Coordinate::new(min.x.min(p.x), min.y.min(p.y));
        max = Coordinate::new(max.x.max(p.x), max.y.max(p.y));
    }

    // fixed iteration order keeps the reported crossing stable
    let mut nearby: Vec<_> = index.lines_in_bbox(min, max).collect();
    nearby.sort_by(|a, b| a.id.cmp(&b.id));

    for line in nearby {
        if let Some(at) = strict_crossing(path, &line.vertices) {
            debug!(line = %line.id, ?at, "path crosses existing wire");
            return Err(Crossing {
                line_id: line.id.clone(),
                line_type: line.line_type,
                at,
            });
        }
    }

    Ok(())
}
