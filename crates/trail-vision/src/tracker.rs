use crate::flow::track_points;
use crate::matching::best_match;
use image::GrayImage;
use imageproc::corners::corners_fast9;
use tracing::debug;
use trail_state::Position;

/// Minimum correlation for an absolute position fix on the world map.
const RELOCALIZE_CONFIDENCE: f64 = 0.7;
/// Tracking survives as long as at least this many flow points remain.
pub const MIN_TRACKED_POINTS: usize = 6;
/// Feature seeding bounds.
const MAX_FEATURES: usize = 100;
const MIN_FEATURE_DISTANCE: f32 = 7.0;
const FAST_THRESHOLD: u8 = 20;

/// Recovers the player's absolute position from the minimap.
///
/// Two operating modes: an expensive full-map correlation that runs only when
/// no usable tracking state exists, and cheap frame-to-frame optical flow
/// that translates the last fix by the mean displacement of surviving
/// features. Drift accumulates during flow tracking but is bounded because
/// any degradation below `MIN_TRACKED_POINTS` forces a fresh correlation.
pub struct PositionTracker {
    state: TrackerState,
    floor: i32,
}

enum TrackerState {
    /// No usable prior: the next minimap goes through full-map correlation.
    Relocalize,
    /// A prior fix exists and can be advanced by optical flow.
    Tracking {
        prev_minimap: GrayImage,
        points: Vec<(f32, f32)>,
        /// Top-left of the matched minimap rectangle in world-map coordinates.
        map_x: f64,
        map_y: f64,
    },
}

impl PositionTracker {
    pub fn new(floor: i32) -> Self {
        Self {
            state: TrackerState::Relocalize,
            floor,
        }
    }

    /// Whether the next frame will pay for a full-map correlation.
    pub fn needs_relocalization(&self) -> bool {
        matches!(self.state, TrackerState::Relocalize)
    }

    /// Advance the tracker by one minimap frame. Consecutive calls must
    /// correspond to temporally adjacent frames; the flow estimate is
    /// meaningless otherwise.
    pub fn advance(
        &mut self,
        world_map_gray: &GrayImage,
        minimap_gray: &GrayImage,
    ) -> Option<Position> {
        match std::mem::replace(&mut self.state, TrackerState::Relocalize) {
            TrackerState::Relocalize => self.relocalize(world_map_gray, minimap_gray),
            TrackerState::Tracking {
                prev_minimap,
                points,
                map_x,
                map_y,
            } => self.follow(minimap_gray, prev_minimap, points, map_x, map_y),
        }
    }

    fn relocalize(
        &mut self,
        world_map_gray: &GrayImage,
        minimap_gray: &GrayImage,
    ) -> Option<Position> {
        let m = best_match(world_map_gray, minimap_gray)?;
        if m.score < RELOCALIZE_CONFIDENCE {
            debug!("Relocalization peak {:.3} below threshold", m.score);
            return None;
        }

        let points = seed_features(minimap_gray);
        debug!(
            "Relocalized at ({}, {}) score {:.3}, {} features seeded",
            m.x,
            m.y,
            m.score,
            points.len()
        );

        let map_x = m.x as f64;
        let map_y = m.y as f64;
        let position = self.center(map_x, map_y, minimap_gray);
        self.state = TrackerState::Tracking {
            prev_minimap: minimap_gray.clone(),
            points,
            map_x,
            map_y,
        };
        Some(position)
    }

    fn follow(
        &mut self,
        minimap_gray: &GrayImage,
        prev_minimap: GrayImage,
        points: Vec<(f32, f32)>,
        map_x: f64,
        map_y: f64,
    ) -> Option<Position> {
        let tracked = track_points(&prev_minimap, minimap_gray, &points);

        let survivors: Vec<((f32, f32), (f32, f32))> = points
            .iter()
            .zip(&tracked)
            .filter_map(|(&old, new)| new.map(|n| (old, n)))
            .collect();

        if survivors.len() < MIN_TRACKED_POINTS {
            debug!(
                "Tracking lost: {} of {} points survived",
                survivors.len(),
                points.len()
            );
            // State already reset to Relocalize by the caller's mem::replace
            return None;
        }

        let n = survivors.len() as f64;
        let dx: f64 = survivors.iter().map(|(o, c)| (c.0 - o.0) as f64).sum::<f64>() / n;
        let dy: f64 = survivors.iter().map(|(o, c)| (c.1 - o.1) as f64).sum::<f64>() / n;

        let map_x = map_x + dx;
        let map_y = map_y + dy;
        let position = self.center(map_x, map_y, minimap_gray);

        self.state = TrackerState::Tracking {
            prev_minimap: minimap_gray.clone(),
            points: survivors.into_iter().map(|(_, c)| c).collect(),
            map_x,
            map_y,
        };
        Some(position)
    }

    fn center(&self, map_x: f64, map_y: f64, minimap: &GrayImage) -> Position {
        Position {
            x: (map_x + minimap.width() as f64 / 2.0).round() as i32,
            y: (map_y + minimap.height() as f64 / 2.0).round() as i32,
            z: self.floor,
        }
    }
}

/// Pick up to `MAX_FEATURES` corner features, strongest first, keeping a
/// minimum spacing so the flow windows do not pile onto one structure.
fn seed_features(minimap: &GrayImage) -> Vec<(f32, f32)> {
    let mut corners = corners_fast9(minimap, FAST_THRESHOLD);
    corners.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let min_dist_sq = MIN_FEATURE_DISTANCE * MIN_FEATURE_DISTANCE;
    let mut picked: Vec<(f32, f32)> = Vec::new();
    for c in corners {
        let p = (c.x as f32, c.y as f32);
        if picked
            .iter()
            .all(|q| (q.0 - p.0).powi(2) + (q.1 - p.1).powi(2) >= min_dist_sq)
        {
            picked.push(p);
            if picked.len() >= MAX_FEATURES {
                break;
            }
        }
    }
    picked
}
