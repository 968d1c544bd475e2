//! Culling configuration, loadable from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::voxel::world_index::IndexLayout;

/// Tunables for the visibility engine. Missing JSON fields take defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullingConfig {
    /// Square radius of the loaded area, in chunks
    pub view_distance: i32,
    /// Lowest chunk Y of the world
    pub min_section_y: i32,
    /// Number of chunk layers
    pub height_sections: i32,
    /// Prune neighbors using each chunk's face-visibility table
    pub smart_cull: bool,
    /// Upper bound on how long a loading gap may go unrevisited before a
    /// full rebuild is forced
    pub staleness_bound_ms: u64,
    /// Camera movement (in blocks) that triggers a full rebuild. Power of two.
    pub rebuild_cell_size: i32,
    /// Camera yaw/pitch bucket width in degrees
    pub rotation_bucket_degrees: f32,
    /// Chunks farther than this many blocks on any axis get the ray-march test
    pub far_chunk_distance: i32,
    /// Chunks this close to the view-distance edge never arm the watchdog
    pub border_margin: i32,
    /// Run full rebuilds on the rayon pool instead of inline
    pub background_rebuilds: bool,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            view_distance: 12,
            min_section_y: -4,
            height_sections: 24,
            smart_cull: true,
            staleness_bound_ms: 500,
            rebuild_cell_size: 8,
            rotation_bucket_degrees: 2.0,
            far_chunk_distance: 60,
            border_margin: 1,
            background_rebuilds: true,
        }
    }
}

impl CullingConfig {
    /// Read a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.view_distance <= 0 {
            return Err(Error::Config(format!("view_distance must be positive, got {}", self.view_distance)));
        }
        if self.height_sections <= 0 {
            return Err(Error::Config(format!("height_sections must be positive, got {}", self.height_sections)));
        }
        if self.rebuild_cell_size <= 0 || (self.rebuild_cell_size & (self.rebuild_cell_size - 1)) != 0 {
            return Err(Error::Config(format!(
                "rebuild_cell_size must be a positive power of two, got {}",
                self.rebuild_cell_size
            )));
        }
        if self.rotation_bucket_degrees.is_nan() || self.rotation_bucket_degrees <= 0.0 {
            return Err(Error::Config(format!(
                "rotation_bucket_degrees must be positive, got {}",
                self.rotation_bucket_degrees
            )));
        }
        if self.border_margin < 0 {
            return Err(Error::Config("border_margin must not be negative".to_string()));
        }
        Ok(())
    }

    /// Shape of the world index this config describes
    pub fn index_layout(&self) -> IndexLayout {
        IndexLayout {
            view_distance: self.view_distance,
            min_section_y: self.min_section_y,
            height_sections: self.height_sections,
            border_margin: self.border_margin,
        }
    }

    /// Shift converting a block coordinate into a rebuild cell
    pub fn rebuild_cell_shift(&self) -> u32 {
        self.rebuild_cell_size.max(1).trailing_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = CullingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.staleness_bound_ms, 500);
        assert_eq!(config.rebuild_cell_shift(), 3);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad = [
            CullingConfig { view_distance: 0, ..Default::default() },
            CullingConfig { height_sections: 0, ..Default::default() },
            CullingConfig { rebuild_cell_size: 6, ..Default::default() },
            CullingConfig { rotation_bucket_degrees: 0.0, ..Default::default() },
            CullingConfig { rotation_bucket_degrees: f32::NAN, ..Default::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(Error::Config(_))), "{:?}", config);
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("culling.json");

        let config = CullingConfig {
            view_distance: 6,
            smart_cull: false,
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = CullingConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{ "view_distance": 4 }"#).unwrap();

        let loaded = CullingConfig::load(&path).unwrap();
        assert_eq!(loaded.view_distance, 4);
        assert_eq!(loaded.height_sections, 24);
        assert!(loaded.smart_cull);
    }

    #[test]
    fn test_load_rejects_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{ "view_distance": -1 }"#).unwrap();
        assert!(CullingConfig::load(&path).is_err());

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(CullingConfig::load(&path), Err(Error::Config(_))));

        assert!(matches!(
            CullingConfig::load(&dir.path().join("missing.json")),
            Err(Error::Io(_))
        ));
    }
}
