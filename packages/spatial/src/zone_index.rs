//! Zone polygon containment index.
//!
//! R-tree over zone boundary envelopes with exact point-in-polygon tests.
//! Points matching no polygon (typically coastline points just outside a
//! simplified boundary) fall back to the nearest polygon within a bounded
//! threshold. One resolver serves both the scalar and batch prediction
//! paths.

use geo::{Contains, MultiPolygon, Point};
use rstar::{AABB, RTree, RTreeObject};

/// Nearest-polygon fallback bound in planar degrees (≈50 km at
/// mid-latitudes). Points farther than this from every polygon resolve to
/// no zone.
pub const NEAR_FALLBACK_DEG: f64 = 0.5;

/// A zone boundary stored in the R-tree with its zone slot.
struct ZoneEntry {
    /// Caller-assigned slot (index into the caller's zone table).
    slot: usize,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for ZoneEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built containment index over zone boundary polygons.
///
/// Constructed once and shared across all consumers; queries never mutate.
pub struct ZoneIndex {
    tree: RTree<ZoneEntry>,
    len: usize,
}

impl ZoneIndex {
    /// Builds the index from `(slot, polygon)` pairs.
    #[must_use]
    pub fn build(polygons: Vec<(usize, MultiPolygon<f64>)>) -> Self {
        let len = polygons.len();
        let entries: Vec<ZoneEntry> = polygons
            .into_iter()
            .map(|(slot, polygon)| ZoneEntry {
                slot,
                envelope: compute_envelope(&polygon),
                polygon,
            })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
            len,
        }
    }

    /// Number of indexed polygons.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the index holds no polygons.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Resolves the zone slot containing `(lat, lon)`.
    ///
    /// Polygons may overlap; the lowest slot among containing polygons wins
    /// so repeated resolutions are deterministic. When no polygon contains
    /// the point, the nearest polygon within [`NEAR_FALLBACK_DEG`] is
    /// accepted instead; beyond that the point resolves to `None`.
    #[must_use]
    pub fn resolve(&self, lat: f64, lon: f64) -> Option<usize> {
        let point = Point::new(lon, lat);
        let query_env = AABB::from_point([lon, lat]);

        let containing = self
            .tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.contains(&point))
            .map(|entry| entry.slot)
            .min();
        if containing.is_some() {
            return containing;
        }

        // Coastline fallback: nearest polygon within the bounded threshold.
        let search_env = AABB::from_corners(
            [lon - NEAR_FALLBACK_DEG, lat - NEAR_FALLBACK_DEG],
            [lon + NEAR_FALLBACK_DEG, lat + NEAR_FALLBACK_DEG],
        );
        let mut best: Option<(f64, usize)> = None;
        for entry in self.tree.locate_in_envelope_intersecting(&search_env) {
            let dist = polygon_distance_deg(point, &entry.polygon);
            if dist <= NEAR_FALLBACK_DEG
                && best.is_none_or(|(best_dist, _)| dist < best_dist)
            {
                best = Some((dist, entry.slot));
            }
        }
        best.map(|(_, slot)| slot)
    }

    /// Resolves every point of parallel coordinate slices through the same
    /// containment-then-fallback path as [`Self::resolve`].
    #[must_use]
    pub fn resolve_batch(&self, lats: &[f64], lons: &[f64]) -> Vec<Option<usize>> {
        lats.iter()
            .zip(lons)
            .map(|(&lat, &lon)| self.resolve(lat, lon))
            .collect()
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    use geo::BoundingRect;

    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

/// Planar distance in degrees from a point to a polygon boundary, 0 when
/// the polygon contains the point.
fn polygon_distance_deg(point: Point<f64>, mp: &MultiPolygon<f64>) -> f64 {
    if mp.contains(&point) {
        return 0.0;
    }
    let mut best = f64::INFINITY;
    for polygon in &mp.0 {
        for line in polygon.exterior().lines() {
            best = best.min(point_segment_distance(point, line.start, line.end));
        }
        for ring in polygon.interiors() {
            for line in ring.lines() {
                best = best.min(point_segment_distance(point, line.start, line.end));
            }
        }
    }
    best
}

fn point_segment_distance(point: Point<f64>, a: geo::Coord<f64>, b: geo::Coord<f64>) -> f64 {
    let (px, py) = (point.x(), point.y());
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        (((px - a.x) * dx + (py - a.y) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (a.x + t * dx, a.y + t * dy);
    ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: min_x, y: min_y),
            (x: max_x, y: min_y),
            (x: max_x, y: max_y),
            (x: min_x, y: max_y),
            (x: min_x, y: min_y),
        ]])
    }

    #[test]
    fn containment_resolves_to_the_enclosing_zone() {
        let index = ZoneIndex::build(vec![
            (0, square(0.0, 0.0, 2.0, 2.0)),
            (1, square(5.0, 5.0, 7.0, 7.0)),
        ]);
        assert_eq!(index.resolve(1.0, 1.0), Some(0));
        assert_eq!(index.resolve(6.0, 6.0), Some(1));
    }

    #[test]
    fn overlapping_zones_resolve_deterministically() {
        let index = ZoneIndex::build(vec![
            (3, square(0.0, 0.0, 2.0, 2.0)),
            (1, square(0.0, 0.0, 2.0, 2.0)),
        ]);
        // Lowest slot wins among containing polygons.
        assert_eq!(index.resolve(1.0, 1.0), Some(1));
    }

    #[test]
    fn coastline_fallback_is_bounded() {
        let index = ZoneIndex::build(vec![(0, square(0.0, 0.0, 2.0, 2.0))]);
        // Just outside the boundary: accepted via fallback.
        assert_eq!(index.resolve(1.0, 2.3), Some(0));
        // Far outside the threshold: no zone.
        assert_eq!(index.resolve(1.0, 4.0), None);
    }

    #[test]
    fn batch_path_matches_scalar_path() {
        let index = ZoneIndex::build(vec![
            (0, square(0.0, 0.0, 2.0, 2.0)),
            (1, square(5.0, 5.0, 7.0, 7.0)),
        ]);
        let lats = [1.0, 6.0, 20.0, 2.3];
        let lons = [1.0, 6.0, 20.0, 1.0];
        let batch = index.resolve_batch(&lats, &lons);
        for (i, resolved) in batch.iter().enumerate() {
            assert_eq!(*resolved, index.resolve(lats[i], lons[i]));
        }
    }

    #[test]
    fn empty_index_resolves_nothing() {
        let index = ZoneIndex::build(Vec::new());
        assert!(index.is_empty());
        assert_eq!(index.resolve(0.0, 0.0), None);
    }
}
