//! Event configuration
//!
//! A single YAML document describes where the sources live, the reference sheet and
//! base map sizes, marker geometry, reserved tokens and the results table layout.
//! Every section has defaults matching a typical A4 event published with the common
//! timing software, so a minimal file only names the sources:
//!
//! ```yaml
//! sources:
//!   coordinates: coordinates.txt
//!   results: splits.html
//! map:
//!   image: static/map.png
//! ```
//!
//! Relative source paths are resolved against the configuration file's directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::registry::Role;
use crate::{Result, SplitviewError};

/// Complete event configuration
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Source file locations
    pub sources: Sources,
    /// Base map pixel size
    pub map: MapConfig,
    /// Physical reference sheet
    pub sheet: SheetConfig,
    /// Marker geometry
    pub markers: MarkerConfig,
    /// Polyline trimming
    pub route: RouteConfig,
    /// Map scale for distances
    pub distance: DistanceConfig,
    /// Reserved start/finish tokens
    pub tokens: Tokens,
    /// Results table interpretation
    pub results: ResultsLayout,
}

/// Source file locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Sources {
    /// `ID: (x_mm, y_mm)` lines
    pub coordinates: PathBuf,
    /// Results document (HTML splits export)
    pub results: PathBuf,
    /// `GROUP: tokens...` lines; open group mode when absent
    pub groups: Option<PathBuf>,
    /// WHATWG label of the results document encoding
    pub encoding: String,
}

impl Default for Sources {
    fn default() -> Self {
        Self {
            coordinates: PathBuf::from("coordinates.txt"),
            results: PathBuf::from("splits.html"),
            groups: None,
            encoding: "windows-1251".to_string(),
        }
    }
}

/// Base map pixel size, given explicitly or read from the image header
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MapConfig {
    pub width_px: Option<u32>,
    pub height_px: Option<u32>,
    pub image: Option<PathBuf>,
}

impl MapConfig {
    /// Resolve the base map's pixel size.
    ///
    /// Explicit dimensions win; otherwise only the image header is decoded.
    pub fn pixel_size(&self) -> Result<(u32, u32)> {
        if let (Some(width), Some(height)) = (self.width_px, self.height_px) {
            return Ok((width, height));
        }

        let Some(path) = &self.image else {
            return Err(SplitviewError::config(
                "map needs either width_px and height_px or an image path",
            ));
        };

        if !path.exists() {
            return Err(SplitviewError::missing_source("map image", path.clone()));
        }

        image::image_dimensions(path)
            .map_err(|e| SplitviewError::Image { path: path.clone(), details: e.to_string() })
    }
}

/// Physical page the coordinates were measured on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SheetConfig {
    pub width_mm: f64,
    pub height_mm: f64,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self { width_mm: 210.0, height_mm: 297.0 }
    }
}

/// Marker size and label placement, in millimeters of the printed sheet
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MarkerConfig {
    pub radius_mm: f64,
    pub label_offset_mm: f64,
    /// Start and finish markers are drawn larger and keep the route further out
    pub terminal_radius_multiplier: f64,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self { radius_mm: 6.0, label_offset_mm: 6.5, terminal_radius_multiplier: 1.5 }
    }
}

/// Polyline trimming constants, in pixels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RouteConfig {
    /// Extra clearance required before a segment is drawn at all
    pub margin_px: f64,
    /// Gap between a marker's edge and the segment end
    pub trim_offset_px: f64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self { margin_px: 10.0, trim_offset_px: 5.0 }
    }
}

/// Printed map scale
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DistanceConfig {
    /// Real-world meters per printed millimeter (10.0 for 1:10 000)
    pub meters_per_mm: f64,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self { meters_per_mm: 10.0 }
    }
}

/// Reserved start and finish tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Tokens {
    /// Any token with this prefix designates a start marker (`С1`, `С2`, ...)
    pub start_prefix: String,
    /// Start token used when a group names none
    pub default_start: String,
    pub finish: String,
}

impl Default for Tokens {
    fn default() -> Self {
        Self {
            start_prefix: "С".to_string(),
            default_start: "С1".to_string(),
            finish: "Ф1".to_string(),
        }
    }
}

impl Tokens {
    pub fn is_finish(&self, token: &str) -> bool {
        token == self.finish
    }

    pub fn is_start(&self, token: &str) -> bool {
        token == self.default_start
            || (!self.start_prefix.is_empty() && token.starts_with(&self.start_prefix))
    }

    /// Start or finish token
    pub fn is_reserved(&self, token: &str) -> bool {
        self.is_start(token) || self.is_finish(token)
    }

    /// Role implied by an identifier
    pub fn role_of(&self, token: &str) -> Role {
        if self.is_finish(token) {
            Role::Finish
        } else if self.is_start(token) {
            Role::Start
        } else {
            Role::Control
        }
    }
}

/// How results tables are laid out when headers don't say otherwise
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResultsLayout {
    /// Only tables with this class are results tables; every table when `None`
    pub table_class: Option<String>,
    pub name_labels: Vec<String>,
    pub result_labels: Vec<String>,
    pub rank_labels: Vec<String>,
    pub rank_column: usize,
    pub name_column: usize,
    pub result_column: usize,
    pub first_checkpoint_column: usize,
    /// Bare header numbers that are never control codes
    pub ignored_header_numbers: Vec<String>,
}

impl Default for ResultsLayout {
    fn default() -> Self {
        Self {
            table_class: Some("rezult".to_string()),
            name_labels: vec![
                "Фамилия".to_string(),
                "Фамилия, имя".to_string(),
                "Name".to_string(),
            ],
            result_labels: vec!["Результат".to_string(), "Result".to_string()],
            rank_labels: vec!["Место".to_string(), "Place".to_string()],
            rank_column: 0,
            name_column: 2,
            result_column: 8,
            first_checkpoint_column: 10,
            ignored_header_numbers: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file, resolving relative source paths.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SplitviewError::config_with_source(
                format!("cannot read configuration {}", path.display()),
                Box::new(e),
            )
        })?;

        let mut config = Self::from_yaml(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        debug!(config = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml_ng::from_str(yaml).map_err(|e| {
            SplitviewError::config_with_source("invalid configuration YAML", Box::new(e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Rebase every relative source path onto `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        rebase(&mut self.sources.coordinates);
        rebase(&mut self.sources.results);
        if let Some(groups) = self.sources.groups.as_mut() {
            rebase(groups);
        }
        if let Some(image) = self.map.image.as_mut() {
            rebase(image);
        }
    }

    /// Reject configurations that would produce meaningless geometry.
    pub fn validate(&self) -> Result<()> {
        if self.sheet.width_mm <= 0.0 || self.sheet.height_mm <= 0.0 {
            return Err(SplitviewError::config("sheet dimensions must be positive"));
        }
        if self.map.width_px == Some(0) || self.map.height_px == Some(0) {
            return Err(SplitviewError::config("map dimensions must be positive"));
        }
        if self.markers.radius_mm < 0.0 || self.markers.terminal_radius_multiplier <= 0.0 {
            return Err(SplitviewError::config("marker radius and multiplier must be positive"));
        }
        if self.distance.meters_per_mm <= 0.0 {
            return Err(SplitviewError::config("meters_per_mm must be positive"));
        }
        if self.tokens.finish.trim().is_empty() || self.tokens.default_start.trim().is_empty() {
            return Err(SplitviewError::config("start and finish tokens must not be empty"));
        }
        Ok(())
    }
}
