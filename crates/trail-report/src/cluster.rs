use serde::Serialize;
use tracing::debug;

/// Neighborhood radius in map distance units.
const EPS: f64 = 50.0;
/// Neighbors (including the point itself) required to make a core point.
const MIN_SAMPLES: usize = 20;
/// Cluster detection only runs on trails longer than this.
const MIN_TRAIL_POINTS: usize = 50;

/// Dominant area of activity: the bounding rectangle of the largest dense
/// cluster of recorded positions.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ActivityArea {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Core members of the winning cluster.
    pub core_points: usize,
}

const NOISE: i32 = -1;
const UNLABELED: i32 = -2;

/// Density-based clustering over the raw position samples. Returns the
/// bounding rectangle of the cluster with the most core points, or `None`
/// when the trail is too short or everything is noise. Ties keep the first
/// cluster encountered.
pub fn dominant_activity_area(points: &[(i32, i32)]) -> Option<ActivityArea> {
    if points.len() <= MIN_TRAIL_POINTS {
        return None;
    }

    let labels = dbscan(points, EPS, MIN_SAMPLES);
    let cluster_count = labels
        .iter()
        .filter(|&&l| l >= 0)
        .map(|&l| l + 1)
        .max()
        .unwrap_or(0);
    if cluster_count == 0 {
        debug!("No dense cluster among {} positions", points.len());
        return None;
    }

    // Rank clusters by their number of core points, not total membership
    let mut core_counts = vec![0usize; cluster_count as usize];
    for (i, &label) in labels.iter().enumerate() {
        if label >= 0 && is_core(points, i, EPS, MIN_SAMPLES) {
            core_counts[label as usize] += 1;
        }
    }
    let (winner, &core_points) = core_counts
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))?;

    let members: Vec<(i32, i32)> = points
        .iter()
        .zip(&labels)
        .filter(|(_, &l)| l == winner as i32)
        .map(|(&p, _)| p)
        .collect();

    let min_x = members.iter().map(|p| p.0).min()?;
    let max_x = members.iter().map(|p| p.0).max()?;
    let min_y = members.iter().map(|p| p.1).min()?;
    let max_y = members.iter().map(|p| p.1).max()?;

    debug!(
        "Dominant cluster: {} members, {} core, bounds ({}, {})..({}, {})",
        members.len(),
        core_points,
        min_x,
        min_y,
        max_x,
        max_y
    );

    Some(ActivityArea {
        x: min_x,
        y: min_y,
        width: (max_x - min_x) as u32,
        height: (max_y - min_y) as u32,
        core_points,
    })
}

/// Classic DBSCAN with an O(n^2) neighborhood query; trails are thousands of
/// points at most.
fn dbscan(points: &[(i32, i32)], eps: f64, min_samples: usize) -> Vec<i32> {
    let mut labels = vec![UNLABELED; points.len()];
    let mut next_cluster = 0i32;

    for i in 0..points.len() {
        if labels[i] != UNLABELED {
            continue;
        }

        let neighbors = region_query(points, i, eps);
        if neighbors.len() < min_samples {
            labels[i] = NOISE;
            continue;
        }

        let cluster = next_cluster;
        next_cluster += 1;
        labels[i] = cluster;

        // Expand: border points join the cluster, core points extend the frontier
        let mut frontier = neighbors;
        let mut cursor = 0;
        while cursor < frontier.len() {
            let j = frontier[cursor];
            cursor += 1;

            if labels[j] == NOISE {
                labels[j] = cluster;
            }
            if labels[j] != UNLABELED {
                continue;
            }
            labels[j] = cluster;

            let j_neighbors = region_query(points, j, eps);
            if j_neighbors.len() >= min_samples {
                frontier.extend(j_neighbors);
            }
        }
    }

    labels
}

fn region_query(points: &[(i32, i32)], i: usize, eps: f64) -> Vec<usize> {
    let eps_sq = eps * eps;
    let (px, py) = points[i];
    points
        .iter()
        .enumerate()
        .filter(|(_, &(x, y))| {
            let dx = (x - px) as f64;
            let dy = (y - py) as f64;
            dx * dx + dy * dy <= eps_sq
        })
        .map(|(j, _)| j)
        .collect()
}

fn is_core(points: &[(i32, i32)], i: usize, eps: f64, min_samples: usize) -> bool {
    region_query(points, i, eps).len() >= min_samples
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic jitter in -8..=8.
    fn jitter(i: usize, salt: usize) -> i32 {
        ((i * 31 + salt * 17) % 17) as i32 - 8
    }

    fn dense_group(center: (i32, i32), n: usize) -> Vec<(i32, i32)> {
        (0..n)
            .map(|i| (center.0 + jitter(i, 1), center.1 + jitter(i, 5)))
            .collect()
    }

    fn far_scatter(n: usize) -> Vec<(i32, i32)> {
        (0..n).map(|i| (1000 + 200 * i as i32, 2000 + 170 * i as i32)).collect()
    }

    #[test]
    fn test_short_trail_skips_clustering() {
        // 50 tightly packed points would cluster, but the trail is too short
        let points = dense_group((100, 100), 50);
        assert!(dominant_activity_area(&points).is_none());
    }

    #[test]
    fn test_dense_group_wins_over_scatter() {
        let mut points = dense_group((300, 400), 40);
        points.extend(far_scatter(15));
        assert!(points.len() > 50);

        let area = dominant_activity_area(&points).unwrap();
        // Bounds enclose the dense group only: jitter keeps it within +-8
        assert!(area.x >= 292 && area.x <= 300);
        assert!(area.y >= 392 && area.y <= 400);
        assert!(area.width <= 16);
        assert!(area.height <= 16);
        assert!(area.core_points >= 20);
    }

    #[test]
    fn test_all_noise_yields_no_area() {
        let points: Vec<(i32, i32)> = (0..60).map(|i| (i * 300, i * 250)).collect();
        assert!(dominant_activity_area(&points).is_none());
    }

    #[test]
    fn test_largest_of_two_clusters_wins() {
        let mut points = dense_group((200, 200), 25);
        points.extend(dense_group((2000, 2000), 45));
        let area = dominant_activity_area(&points).unwrap();
        assert!(area.x >= 1990 && area.x <= 2000);
        assert!(area.y >= 1990 && area.y <= 2000);
    }
}
