use image::{GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use trail_video::PixelRect;

/// UI elements the locator knows how to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiElement {
    Minimap,
    BattleList,
}

impl UiElement {
    pub fn as_str(&self) -> &'static str {
        match self {
            UiElement::Minimap => "minimap",
            UiElement::BattleList => "battle_list",
        }
    }

    /// Canonical on-screen size of the element's region. Template matching
    /// finds the corner; the region always takes this size.
    pub fn region_size(&self) -> (u32, u32) {
        match self {
            UiElement::Minimap => (150, 150),
            UiElement::BattleList => (150, 300),
        }
    }

    fn template_file(&self) -> &'static str {
        match self {
            UiElement::Minimap => "minimap_corner.png",
            UiElement::BattleList => "battle_list_header.png",
        }
    }
}

/// Fallback rectangle anchored to the frame's top-right corner, used when no
/// template is configured or the correlation score stays below threshold.
/// Most client skins keep these panels at this conventional spot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnchoredRect {
    /// Distance from the frame's right edge to the rectangle's left edge.
    pub right_offset: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl AnchoredRect {
    /// Resolve against a concrete frame size. `None` when the frame is too
    /// small to hold the rectangle.
    pub fn resolve(&self, frame_width: u32, frame_height: u32) -> Option<PixelRect> {
        if frame_width < self.right_offset {
            return None;
        }
        let rect = PixelRect::new(frame_width - self.right_offset, self.top, self.width, self.height);
        rect.fits_within(frame_width, frame_height).then_some(rect)
    }
}

/// Fallback positions per UI element, supplied at session construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackLayout {
    pub minimap: AnchoredRect,
    pub battle_list: AnchoredRect,
}

impl Default for FallbackLayout {
    fn default() -> Self {
        Self {
            minimap: AnchoredRect {
                right_offset: 160,
                top: 10,
                width: 150,
                height: 150,
            },
            battle_list: AnchoredRect {
                right_offset: 160,
                top: 170,
                width: 150,
                height: 300,
            },
        }
    }
}

impl FallbackLayout {
    pub fn get(&self, element: UiElement) -> AnchoredRect {
        match element {
            UiElement::Minimap => self.minimap,
            UiElement::BattleList => self.battle_list,
        }
    }
}

/// Rectangle anchored to the frame's bottom-left corner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BottomLeftRect {
    pub left: u32,
    /// Distance from the frame's bottom edge to the rectangle's top edge.
    pub bottom_offset: u32,
    pub width: u32,
    pub height: u32,
}

impl BottomLeftRect {
    pub fn resolve(&self, frame_width: u32, frame_height: u32) -> Option<PixelRect> {
        if frame_height < self.bottom_offset {
            return None;
        }
        let rect = PixelRect::new(self.left, frame_height - self.bottom_offset, self.width, self.height);
        rect.fits_within(frame_width, frame_height).then_some(rect)
    }
}

/// Vital-bar strips sit at a constant offset from the frame's bottom-left;
/// no search is performed for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VitalsLayout {
    pub health: BottomLeftRect,
    pub mana: BottomLeftRect,
}

impl Default for VitalsLayout {
    fn default() -> Self {
        Self {
            health: BottomLeftRect {
                left: 10,
                bottom_offset: 30,
                width: 100,
                height: 10,
            },
            mana: BottomLeftRect {
                left: 10,
                bottom_offset: 20,
                width: 100,
                height: 10,
            },
        }
    }
}

/// Optional `layout.json` in the data directory overriding the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub fallback: FallbackLayout,
    pub vitals: VitalsLayout,
}

/// Session-construction failures. Everything here is terminal: without the
/// world map there is nothing to correlate positions against.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Cannot load world map {path}: {source}")]
    WorldMap {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("Cannot read layout config {path}: {source}")]
    LayoutRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Cannot parse layout config {path}: {source}")]
    LayoutParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Read-only reference data shared by one analysis session: the world map,
/// whatever UI templates exist, and the layout configuration. Loaded once
/// and never mutated afterwards.
#[derive(Debug)]
pub struct ReferenceAssets {
    pub world_map: RgbaImage,
    pub world_map_gray: GrayImage,
    pub templates: HashMap<UiElement, GrayImage>,
    pub fallback: FallbackLayout,
    pub vitals: VitalsLayout,
}

impl ReferenceAssets {
    /// Load from a data directory. Expects:
    ///   - data_dir/map.png (required)
    ///   - data_dir/templates/{minimap_corner,battle_list_header}.png (optional)
    ///   - data_dir/layout.json (optional)
    pub fn load(data_dir: &Path) -> Result<Self, AssetError> {
        let map_path = data_dir.join("map.png");
        let world_map = image::open(&map_path)
            .map_err(|source| AssetError::WorldMap {
                path: map_path.clone(),
                source,
            })?
            .to_rgba8();
        info!(
            "World map loaded: {}x{} from {}",
            world_map.width(),
            world_map.height(),
            map_path.display()
        );

        let mut templates = HashMap::new();
        for element in [UiElement::Minimap, UiElement::BattleList] {
            let path = data_dir.join("templates").join(element.template_file());
            match image::open(&path) {
                Ok(img) => {
                    templates.insert(element, img.to_luma8());
                }
                Err(_) => {
                    warn!(
                        "No template for {} at {}; falling back to conventional position",
                        element.as_str(),
                        path.display()
                    );
                }
            }
        }

        let layout = Self::load_layout(&data_dir.join("layout.json"))?;

        Ok(Self::from_parts(world_map, templates, layout))
    }

    /// Build from already-loaded images; used by tests and embedders.
    pub fn from_parts(
        world_map: RgbaImage,
        templates: HashMap<UiElement, GrayImage>,
        layout: LayoutConfig,
    ) -> Self {
        let world_map_gray = image::imageops::grayscale(&world_map);
        Self {
            world_map,
            world_map_gray,
            templates,
            fallback: layout.fallback,
            vitals: layout.vitals,
        }
    }

    fn load_layout(path: &Path) -> Result<LayoutConfig, AssetError> {
        if !path.exists() {
            return Ok(LayoutConfig::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| AssetError::LayoutRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|source| AssetError::LayoutParse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Layout config loaded from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_resolves_against_frame() {
        let layout = FallbackLayout::default();
        let rect = layout.minimap.resolve(800, 600).unwrap();
        assert_eq!(rect, PixelRect::new(640, 10, 150, 150));

        let rect = layout.battle_list.resolve(800, 600).unwrap();
        assert_eq!(rect, PixelRect::new(640, 170, 150, 300));
    }

    #[test]
    fn test_fallback_rejects_tiny_frame() {
        let layout = FallbackLayout::default();
        assert!(layout.minimap.resolve(120, 600).is_none());
        assert!(layout.battle_list.resolve(800, 300).is_none());
    }

    #[test]
    fn test_vitals_layout_defaults() {
        let layout = VitalsLayout::default();
        let hp = layout.health.resolve(640, 480).unwrap();
        let mana = layout.mana.resolve(640, 480).unwrap();
        assert_eq!(hp, PixelRect::new(10, 450, 100, 10));
        assert_eq!(mana, PixelRect::new(10, 460, 100, 10));
    }

    #[test]
    fn test_load_missing_world_map_is_fatal() {
        let err = ReferenceAssets::load(Path::new("/nonexistent")).unwrap_err();
        assert!(matches!(err, AssetError::WorldMap { .. }));
    }

    #[test]
    fn test_layout_config_parses_partial_overrides() {
        let json = r#"{ "vitals": { "health": { "left": 12, "bottom_offset": 40, "width": 90, "height": 8 } } }"#;
        let config: LayoutConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.vitals.health.left, 12);
        // Untouched sections keep their defaults
        assert_eq!(config.fallback.minimap.right_offset, 160);
    }
}
