//! Crown polygon validation and repair
//!
//! Checks every vectorized crown for the defects that break downstream GIS
//! consumers: open rings, degenerate rings, zero area, and
//! self-intersecting boundaries. Invalid polygons are replaced by their
//! convex hull; crowns that stay invalid are removed from the set and the
//! reason is recorded, so the surviving set is clean by construction.

use crownseg_core::{Result, TreeSet, ValidationReport};
use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, ConvexHull, Line, LineString, Polygon};

/// Validate every crown polygon, repairing where possible.
///
/// Trees whose polygon cannot be repaired are removed; the report lists
/// every tree in exactly one of its three buckets. Trees without a polygon
/// are not touched.
pub fn validate_crowns(mut tree_set: TreeSet) -> Result<(TreeSet, ValidationReport)> {
    let mut report = ValidationReport::default();

    for id in tree_set.ids() {
        let polygon = tree_set
            .get(id)
            .and_then(|rec| rec.crown.as_ref())
            .and_then(|crown| crown.polygon.clone());
        let Some(polygon) = polygon else {
            continue;
        };

        match check_polygon(&polygon) {
            Ok(()) => report.passed.push(id),
            Err(reason) => match repair(&polygon) {
                Some(fixed) => {
                    if let Some(crown) = tree_set.get_mut(id).and_then(|rec| rec.crown.as_mut()) {
                        crown.polygon = Some(fixed);
                    }
                    report.repaired.push(id);
                }
                None => {
                    tree_set.remove(id);
                    report.failed.push((id, reason));
                }
            },
        }
    }

    Ok((tree_set, report))
}

/// All validity conditions for one crown polygon
fn check_polygon(polygon: &Polygon<f64>) -> std::result::Result<(), String> {
    check_ring(polygon.exterior(), "exterior")?;
    for (i, interior) in polygon.interiors().iter().enumerate() {
        check_ring(interior, &format!("interior {i}"))?;
    }
    if polygon.unsigned_area() <= 0.0 {
        return Err("polygon has zero area".into());
    }
    Ok(())
}

fn check_ring(ring: &LineString<f64>, which: &str) -> std::result::Result<(), String> {
    if ring.0.len() < 4 {
        return Err(format!("{which} ring has fewer than 4 coordinates"));
    }
    if !ring.is_closed() {
        return Err(format!("{which} ring is not closed"));
    }
    if let Some((i, j)) = ring_self_intersection(ring) {
        return Err(format!(
            "{which} ring self-intersects between segments {i} and {j}"
        ));
    }
    Ok(())
}

/// First pair of non-adjacent segments that properly intersect or overlap.
///
/// O(n²) over the ring segments; crown outlines are small enough that this
/// never dominates.
fn ring_self_intersection(ring: &LineString<f64>) -> Option<(usize, usize)> {
    let segments: Vec<Line<f64>> = ring.lines().collect();
    let n = segments.len();

    for i in 0..n {
        for j in (i + 1)..n {
            // Consecutive segments (including last/first of the closed
            // ring) legitimately share an endpoint, but an overlap between
            // them is a spike folding the boundary back on itself
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(segments[i], segments[j]) {
                Some(LineIntersection::Collinear { .. }) => return Some((i, j)),
                Some(LineIntersection::SinglePoint { is_proper: true, .. }) if !adjacent => {
                    return Some((i, j));
                }
                _ => {}
            }
        }
    }

    None
}

/// Best-effort repair: the convex hull of the polygon. Returns `None` when
/// the hull itself is degenerate.
fn repair(polygon: &Polygon<f64>) -> Option<Polygon<f64>> {
    let hull = polygon.convex_hull();
    if hull.exterior().0.len() >= 4 && hull.unsigned_area() > 0.0 {
        Some(hull)
    } else {
        None
    }
}
