//! Great-circle metric tree (vantage-point tree over haversine distance).
//!
//! Construction is O(n log n); queries prune on ball bounds and never scan
//! the full point set. All distances are great-circle angles in radians;
//! multiply by [`EARTH_RADIUS_KM`] for kilometers.

/// Mean Earth radius used to convert angular distances to kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle (haversine) distance between two `[lat, lon]` points given
/// in radians, returned as an angle in radians.
#[must_use]
pub fn haversine_rad(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dlat = b[0] - a[0];
    let dlon = b[1] - a[1];
    let h = (dlat / 2.0).sin().powi(2) + a[0].cos() * b[0].cos() * (dlon / 2.0).sin().powi(2);
    2.0 * h.sqrt().min(1.0).asin()
}

#[derive(Debug)]
struct Node {
    /// Index into `points` for this node's vantage point.
    point: u32,
    /// Median distance splitting inner from outer children, radians.
    threshold: f64,
    inner: Option<u32>,
    outer: Option<u32>,
}

/// A metric tree over geographic points supporting k-nearest-neighbor and
/// radius queries under great-circle distance.
///
/// Point indices returned by queries refer to the order of the coordinate
/// slice the tree was built from.
#[derive(Debug, Default)]
pub struct GreatCircleTree {
    /// `[lat, lon]` in radians, in input order.
    points: Vec<[f64; 2]>,
    nodes: Vec<Node>,
    root: Option<u32>,
}

impl GreatCircleTree {
    /// Builds a tree from `(lat, lon)` coordinates in degrees.
    #[must_use]
    pub fn build(coords: &[(f64, f64)]) -> Self {
        let points: Vec<[f64; 2]> = coords
            .iter()
            .map(|&(lat, lon)| [lat.to_radians(), lon.to_radians()])
            .collect();

        #[allow(clippy::cast_possible_truncation)]
        let items: Vec<u32> = (0..points.len() as u32).collect();
        let mut nodes = Vec::with_capacity(points.len());
        let root = Self::build_recursive(&points, items, &mut nodes);
        Self {
            points,
            nodes,
            root,
        }
    }

    /// Number of indexed points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the tree indexes no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn build_recursive(points: &[[f64; 2]], mut items: Vec<u32>, nodes: &mut Vec<Node>) -> Option<u32> {
        let vantage = items.pop()?;
        if items.is_empty() {
            nodes.push(Node {
                point: vantage,
                threshold: 0.0,
                inner: None,
                outer: None,
            });
            #[allow(clippy::cast_possible_truncation)]
            return Some(nodes.len() as u32 - 1);
        }

        let mut with_dist: Vec<(u32, f64)> = items
            .iter()
            .map(|&i| {
                (
                    i,
                    haversine_rad(points[vantage as usize], points[i as usize]),
                )
            })
            .collect();
        let mid = with_dist.len() / 2;
        with_dist.select_nth_unstable_by(mid, |a, b| a.1.total_cmp(&b.1));
        let threshold = with_dist[mid].1;

        let inner_items: Vec<u32> = with_dist[..mid].iter().map(|&(i, _)| i).collect();
        let outer_items: Vec<u32> = with_dist[mid..].iter().map(|&(i, _)| i).collect();

        let inner = Self::build_recursive(points, inner_items, nodes);
        let outer = Self::build_recursive(points, outer_items, nodes);
        nodes.push(Node {
            point: vantage,
            threshold,
            inner,
            outer,
        });
        #[allow(clippy::cast_possible_truncation)]
        Some(nodes.len() as u32 - 1)
    }

    /// Returns the `k` nearest points to `(lat, lon)` (degrees) as
    /// `(point_index, distance_radians)` pairs, nearest first.
    #[must_use]
    pub fn nearest(&self, lat: f64, lon: f64, k: usize) -> Vec<(usize, f64)> {
        let Some(root) = self.root else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }
        let query = [lat.to_radians(), lon.to_radians()];
        let mut best: Vec<(usize, f64)> = Vec::with_capacity(k + 1);
        self.knn_recursive(root, query, k, &mut best);
        best
    }

    /// The current k-th best distance, or infinity while under-filled.
    fn tau(best: &[(usize, f64)], k: usize) -> f64 {
        if best.len() < k {
            f64::INFINITY
        } else {
            best[best.len() - 1].1
        }
    }

    fn knn_recursive(&self, node_id: u32, query: [f64; 2], k: usize, best: &mut Vec<(usize, f64)>) {
        let node = &self.nodes[node_id as usize];
        let dist = haversine_rad(query, self.points[node.point as usize]);

        if dist < Self::tau(best, k) {
            let pos = best.partition_point(|&(_, d)| d <= dist);
            best.insert(pos, (node.point as usize, dist));
            best.truncate(k);
        }

        // Inner holds points closer to the vantage than the threshold;
        // visit the likelier side first and prune with the current bound.
        let (first, second) = if dist < node.threshold {
            (node.inner, node.outer)
        } else {
            (node.outer, node.inner)
        };
        if let Some(child) = first {
            self.knn_recursive(child, query, k, best);
        }
        if (dist - node.threshold).abs() <= Self::tau(best, k)
            && let Some(child) = second
        {
            self.knn_recursive(child, query, k, best);
        }
    }

    /// Returns every point within `radius_rad` (radians) of `(lat, lon)`
    /// (degrees) as `(point_index, distance_radians)` pairs, unordered.
    #[must_use]
    pub fn within_radius(&self, lat: f64, lon: f64, radius_rad: f64) -> Vec<(usize, f64)> {
        let Some(root) = self.root else {
            return Vec::new();
        };
        let query = [lat.to_radians(), lon.to_radians()];
        let mut hits = Vec::new();
        self.radius_recursive(root, query, radius_rad, &mut hits);
        hits
    }

    fn radius_recursive(
        &self,
        node_id: u32,
        query: [f64; 2],
        radius: f64,
        hits: &mut Vec<(usize, f64)>,
    ) {
        let node = &self.nodes[node_id as usize];
        let dist = haversine_rad(query, self.points[node.point as usize]);
        if dist <= radius {
            hits.push((node.point as usize, dist));
        }
        if dist - radius <= node.threshold
            && let Some(child) = node.inner
        {
            self.radius_recursive(child, query, radius, hits);
        }
        if dist + radius >= node.threshold
            && let Some(child) = node.outer
        {
            self.radius_recursive(child, query, radius, hits);
        }
    }

    /// Batched [`Self::nearest`] over parallel coordinate slices.
    #[must_use]
    pub fn nearest_batch(&self, lats: &[f64], lons: &[f64], k: usize) -> Vec<Vec<(usize, f64)>> {
        lats.iter()
            .zip(lons)
            .map(|(&lat, &lon)| self.nearest(lat, lon, k))
            .collect()
    }

    /// Batched [`Self::within_radius`] over parallel coordinate slices.
    #[must_use]
    pub fn within_radius_batch(
        &self,
        lats: &[f64],
        lons: &[f64],
        radius_rad: f64,
    ) -> Vec<Vec<(usize, f64)>> {
        lats.iter()
            .zip(lons)
            .map(|(&lat, &lon)| self.within_radius(lat, lon, radius_rad))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// European city coordinates for brute-force comparison.
    const CITIES: &[(f64, f64)] = &[
        (48.8566, 2.3522),   // Paris
        (52.5200, 13.4050),  // Berlin
        (51.5074, -0.1278),  // London
        (40.4168, -3.7038),  // Madrid
        (41.9028, 12.4964),  // Rome
        (59.3293, 18.0686),  // Stockholm
        (53.3498, -6.2603),  // Dublin
        (47.4979, 19.0402),  // Budapest
        (38.7223, -9.1393),  // Lisbon
        (60.1699, 24.9384),  // Helsinki
    ];

    fn brute_force(lat: f64, lon: f64) -> Vec<(usize, f64)> {
        let query = [lat.to_radians(), lon.to_radians()];
        let mut dists: Vec<(usize, f64)> = CITIES
            .iter()
            .enumerate()
            .map(|(i, &(plat, plon))| {
                (i, haversine_rad(query, [plat.to_radians(), plon.to_radians()]))
            })
            .collect();
        dists.sort_by(|a, b| a.1.total_cmp(&b.1));
        dists
    }

    #[test]
    fn haversine_matches_known_distance() {
        // Paris -> London is roughly 344 km.
        let paris = [48.8566f64.to_radians(), 2.3522f64.to_radians()];
        let london = [51.5074f64.to_radians(), (-0.1278f64).to_radians()];
        let km = haversine_rad(paris, london) * EARTH_RADIUS_KM;
        assert!((km - 344.0).abs() < 5.0, "got {km}");
    }

    #[test]
    fn knn_agrees_with_brute_force() {
        let tree = GreatCircleTree::build(CITIES);
        for &(lat, lon) in &[(50.0, 5.0), (45.0, 20.0), (61.0, 25.0), (37.0, -8.0)] {
            let expected = brute_force(lat, lon);
            for k in [1, 3, 5] {
                let got = tree.nearest(lat, lon, k);
                assert_eq!(got.len(), k);
                for (g, e) in got.iter().zip(&expected) {
                    assert_eq!(g.0, e.0);
                    assert!((g.1 - e.1).abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn radius_query_agrees_with_brute_force() {
        let tree = GreatCircleTree::build(CITIES);
        let radius = 1000.0 / EARTH_RADIUS_KM;
        let mut got = tree.within_radius(50.0, 5.0, radius);
        got.sort_by(|a, b| a.1.total_cmp(&b.1));
        let expected: Vec<(usize, f64)> = brute_force(50.0, 5.0)
            .into_iter()
            .filter(|&(_, d)| d <= radius)
            .collect();
        assert_eq!(
            got.iter().map(|&(i, _)| i).collect::<Vec<_>>(),
            expected.iter().map(|&(i, _)| i).collect::<Vec<_>>()
        );
    }

    #[test]
    fn radius_growth_never_shrinks_result_count() {
        let tree = GreatCircleTree::build(CITIES);
        let mut previous = 0;
        for km in [100.0, 300.0, 600.0, 1200.0, 2400.0] {
            let count = tree.within_radius(50.0, 5.0, km / EARTH_RADIUS_KM).len();
            assert!(count >= previous);
            previous = count;
        }
    }

    #[test]
    fn empty_tree_returns_empty_results() {
        let tree = GreatCircleTree::build(&[]);
        assert!(tree.is_empty());
        assert!(tree.nearest(0.0, 0.0, 3).is_empty());
        assert!(tree.within_radius(0.0, 0.0, 1.0).is_empty());
    }

    #[test]
    fn batch_forms_match_scalar_forms() {
        let tree = GreatCircleTree::build(CITIES);
        let lats = [50.0, 45.0];
        let lons = [5.0, 20.0];
        let batch = tree.nearest_batch(&lats, &lons, 2);
        for (i, result) in batch.iter().enumerate() {
            assert_eq!(*result, tree.nearest(lats[i], lons[i], 2));
        }
    }
}
