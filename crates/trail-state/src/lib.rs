use serde::{Deserialize, Serialize};

mod sink;

pub use sink::{JsonLinesSink, ResultSink};

/// Player position in world-map coordinates. `z` is the floor the whole
/// session runs on; there is no cross-floor tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// Health and mana percentages read off the vital bars, both in 0..=100.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VitalStats {
    pub hp_percent: f64,
    pub mana_percent: f64,
}

/// One row of the battle list. Entries are re-extracted every frame; there is
/// no identity linking between frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleListEntry {
    pub name: String,
    pub hp_percent: f64,
    pub is_target: bool,
}

/// Everything recovered from a single frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameAnalysis {
    pub player_coords: Option<Position>,
    pub stats: VitalStats,
    pub battle_list: Vec<BattleListEntry>,
}

/// A frame analysis tagged with its origin in the video, in the shape handed
/// to the persistence collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame_index: u64,
    pub timestamp_secs: f64,
    #[serde(flatten)]
    pub analysis: FrameAnalysis,
}

impl FrameAnalysis {
    pub fn new() -> Self {
        Self::default()
    }
}
