//! TOML-based configuration for the wall service and launcher.
//!
//! ```toml
//! [wall]
//! num_displays = [2, 2]
//! pixels_per_display = [320, 240]
//! bezel = [0.0, 0.0]
//! arrangement = "xy"
//! stereo = false
//!
//! [service]
//! head_node = false
//! decode_workers = 8
//! port_file = ".display-wall.port"
//! info_bind_address = "127.0.0.1"
//! info_port = 2903
//! log_level = "info"
//!
//! [compression]
//! codec = "zstd"
//! quality = 90
//!
//! [render]
//! clients = 2
//! frames = 10
//! tile_size = 32
//! ```
//!
//! # Arrangement names (for beginners)
//!
//! The two letters name the order in which display ranks are enumerated. The
//! first letter is the axis that varies fastest; lowercase walks that axis in
//! increasing coordinate order, uppercase in decreasing order. Coordinates are
//! wall pixel coordinates, with row 0 first in the frame buffer. `"xy"` is the
//! row-major layout with rank 0 on the display at pixel row 0, column 0;
//! `"Yx"` walks each column from its last pixel row back to row 0, columns
//! in increasing x. On a wall whose row 0 is physically at the bottom, `"xy"`
//! starts at the lower left.
//!
//! Every field carries a `#[serde(default = "...")]`, so a partial file (or no
//! file at all) still yields a complete configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wall_core::{Arrangement, CodecKind, GeometryError, Vec2f, Vec2i, WallGeometry};

use crate::application::assemble_frames::DEFAULT_DECODE_WORKERS;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "display-wall.toml";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The `[wall]` table does not describe a valid wall.
    #[error("invalid wall geometry: {0}")]
    Geometry(#[from] GeometryError),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ServiceConfig {
    #[serde(default)]
    pub wall: WallConfig,
    #[serde(default)]
    pub service: ServiceSection,
    #[serde(default)]
    pub compression: CompressionConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

/// Shape of the wall.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WallConfig {
    /// Display grid, columns then rows.
    #[serde(default = "default_num_displays")]
    pub num_displays: [i32; 2],
    /// Visible resolution of one display.
    #[serde(default = "default_pixels_per_display")]
    pub pixels_per_display: [i32; 2],
    /// Bezel width per axis, as a fraction of `pixels_per_display`.
    #[serde(default)]
    pub bezel: [f32; 2],
    #[serde(default)]
    pub arrangement: Arrangement,
    #[serde(default)]
    pub stereo: bool,
}

/// Process topology and the service's outward-facing adapters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceSection {
    /// Dedicate world rank 0 to relaying tiles.
    #[serde(default)]
    pub head_node: bool,
    /// Decode worker threads per display rank.
    #[serde(default = "default_decode_workers")]
    pub decode_workers: usize,
    /// File the endpoint name is written to.
    #[serde(default = "default_port_file")]
    pub port_file: PathBuf,
    #[serde(default = "default_info_bind_address")]
    pub info_bind_address: String,
    /// TCP port of the service info responder.
    #[serde(default = "default_info_port")]
    pub info_port: u16,
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Tile payload codec.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompressionConfig {
    #[serde(default)]
    pub codec: CodecKind,
    /// 1..=100; only lossy codecs use it.
    #[serde(default = "default_quality")]
    pub quality: u8,
}

/// Test-pattern rendering done by the launcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderConfig {
    /// Number of render ranks.
    #[serde(default = "default_clients")]
    pub clients: usize,
    /// Frames each render rank draws before exiting.
    #[serde(default = "default_frames")]
    pub frames: u64,
    /// Edge length of the square render tiles.
    #[serde(default = "default_tile_size")]
    pub tile_size: i32,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_num_displays() -> [i32; 2] {
    [2, 2]
}
fn default_pixels_per_display() -> [i32; 2] {
    [320, 240]
}
fn default_decode_workers() -> usize {
    DEFAULT_DECODE_WORKERS
}
fn default_port_file() -> PathBuf {
    PathBuf::from(".display-wall.port")
}
fn default_info_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_info_port() -> u16 {
    2903
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_quality() -> u8 {
    90
}
fn default_clients() -> usize {
    2
}
fn default_frames() -> u64 {
    10
}
fn default_tile_size() -> i32 {
    32
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            num_displays: default_num_displays(),
            pixels_per_display: default_pixels_per_display(),
            bezel: [0.0, 0.0],
            arrangement: Arrangement::default(),
            stereo: false,
        }
    }
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            head_node: false,
            decode_workers: default_decode_workers(),
            port_file: default_port_file(),
            info_bind_address: default_info_bind_address(),
            info_port: default_info_port(),
            log_level: default_log_level(),
        }
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            codec: CodecKind::default(),
            quality: default_quality(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            clients: default_clients(),
            frames: default_frames(),
            tile_size: default_tile_size(),
        }
    }
}

impl ServiceConfig {
    /// Validates the `[wall]` table into a geometry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Geometry`] if the wall is degenerate.
    pub fn geometry(&self) -> Result<WallGeometry, ConfigError> {
        let w = &self.wall;
        Ok(WallGeometry::new(
            Vec2i::new(w.num_displays[0], w.num_displays[1]),
            Vec2i::new(w.pixels_per_display[0], w.pixels_per_display[1]),
            Vec2f::new(w.bezel[0], w.bezel[1]),
            w.arrangement,
            w.stereo,
        )?)
    }

    /// Number of service ranks: one per display, plus the head node.
    pub fn service_ranks(&self) -> usize {
        let [x, y] = self.wall.num_displays;
        x.max(0) as usize * y.max(0) as usize + usize::from(self.service.head_node)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// The configuration file in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(CONFIG_FILE_NAME)
}

/// Loads `ServiceConfig` from `path`, returning `ServiceConfig::default()` if
/// the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServiceConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Persists `config` to `path`, creating the parent directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &ServiceConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_service_config_default_values() {
        // Arrange / Act
        let cfg = ServiceConfig::default();

        // Assert
        assert_eq!(cfg.wall.num_displays, [2, 2]);
        assert_eq!(cfg.wall.arrangement, Arrangement::XIncYInc);
        assert_eq!(cfg.service.decode_workers, 8);
        assert_eq!(cfg.service.info_port, 2903);
        assert_eq!(cfg.service.port_file, PathBuf::from(".display-wall.port"));
        assert_eq!(cfg.compression.codec, CodecKind::Zstd);
        assert_eq!(cfg.render.tile_size, 32);
    }

    #[test]
    fn test_service_ranks_counts_head_node() {
        let mut cfg = ServiceConfig::default();
        assert_eq!(cfg.service_ranks(), 4);
        cfg.service.head_node = true;
        assert_eq!(cfg.service_ranks(), 5);
    }

    // ── Parsing ───────────────────────────────────────────────────────────────

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: ServiceConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, ServiceConfig::default());
    }

    #[test]
    fn test_partial_wall_table_keeps_other_defaults() {
        // Arrange
        let toml_str = r#"
[wall]
num_displays = [4, 1]
arrangement = "Yx"
stereo = true

[compression]
codec = "quantized"
quality = 40
"#;

        // Act
        let cfg: ServiceConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.wall.num_displays, [4, 1]);
        assert_eq!(cfg.wall.pixels_per_display, [320, 240]);
        assert_eq!(cfg.wall.arrangement, Arrangement::YDecXInc);
        assert!(cfg.wall.stereo);
        assert_eq!(cfg.compression.codec, CodecKind::Quantized);
        assert_eq!(cfg.compression.quality, 40);
        assert_eq!(cfg.service.info_port, 2903);
    }

    #[test]
    fn test_unknown_arrangement_name_is_a_parse_error() {
        let result: Result<ServiceConfig, _> = toml::from_str("[wall]\narrangement = \"xx\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_geometry_from_config() {
        let mut cfg = ServiceConfig::default();
        cfg.wall.bezel = [0.1, 0.0];

        let g = cfg.geometry().expect("valid");

        assert_eq!(g.num_displays(), Vec2i::new(2, 2));
        assert_eq!(g.bezel_pixels(), Vec2i::new(32, 0));
        assert_eq!(g.total_pixels(), Vec2i::new(672, 480));
    }

    #[test]
    fn test_arrangement_names_place_rank_zero_by_pixel_row() {
        // Arrange: the default 2x2 wall of 320x240 displays
        let row_major: ServiceConfig =
            toml::from_str("[wall]\narrangement = \"xy\"\n").expect("deserialize");
        let columns_up: ServiceConfig =
            toml::from_str("[wall]\narrangement = \"Yx\"\n").expect("deserialize");

        // Act
        let row_major = row_major.geometry().expect("valid");
        let columns_up = columns_up.geometry().expect("valid");

        // Assert: "xy" starts at pixel row 0, "Yx" at the last display row
        assert_eq!(row_major.region_of_rank(0).lower, Vec2i::new(0, 0));
        assert_eq!(row_major.region_of_rank(1).lower, Vec2i::new(320, 0));
        assert_eq!(columns_up.region_of_rank(0).lower, Vec2i::new(0, 240));
        assert_eq!(columns_up.region_of_rank(1).lower, Vec2i::new(0, 0));
        assert_eq!(columns_up.region_of_rank(2).lower, Vec2i::new(320, 240));
    }

    #[test]
    fn test_degenerate_wall_is_a_geometry_error() {
        let mut cfg = ServiceConfig::default();
        cfg.wall.num_displays = [0, 2];
        assert!(matches!(cfg.geometry(), Err(ConfigError::Geometry(_))));
    }

    // ── load_config / save_config ─────────────────────────────────────────────

    #[test]
    fn test_load_config_returns_default_when_file_absent() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/display-wall.toml");
        let cfg = load_config(&path).expect("missing file is not an error");
        assert_eq!(cfg, ServiceConfig::default());
    }

    #[test]
    fn test_save_and_load_config_round_trip_via_temp_dir() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("wall_cfg_{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("display-wall.toml");
        let mut cfg = ServiceConfig::default();
        cfg.service.head_node = true;
        cfg.wall.arrangement = Arrangement::XDecYInc;
        cfg.render.frames = 3;

        // Act
        save_config(&cfg, &path).expect("save");
        let loaded = load_config(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_config_reports_malformed_toml() {
        let dir = std::env::temp_dir().join(format!("wall_cfg_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join("display-wall.toml");
        std::fs::write(&path, "[[[ not valid toml").expect("write");

        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));

        std::fs::remove_dir_all(&dir).ok();
    }
}
