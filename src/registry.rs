//! Control point coordinates and their pixel-space projection
//!
//! Coordinates are measured in millimeters on a fixed reference sheet with the origin
//! in the bottom-left corner. The base map image shares the sheet's extent, so each
//! axis converts with its own pixels-per-millimeter factor and the vertical axis is
//! flipped for the top-left pixel origin.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{MarkerConfig, SheetConfig, Tokens};
use crate::geometry::PixelPoint;
use crate::{Result, SplitviewError};

/// What a control point marks on the course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Start,
    Control,
    Finish,
}

impl Role {
    /// Start and finish markers are drawn enlarged
    pub fn is_terminal(self) -> bool {
        matches!(self, Role::Start | Role::Finish)
    }
}

/// Position on the reference sheet, origin bottom-left
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalPosition {
    pub x_mm: f64,
    pub y_mm: f64,
}

impl PhysicalPosition {
    pub fn distance_mm(&self, other: &PhysicalPosition) -> f64 {
        (other.x_mm - self.x_mm).hypot(other.y_mm - self.y_mm)
    }
}

/// A loaded control point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub id: String,
    pub role: Role,
    pub position: PhysicalPosition,
    /// Marker center in image pixels
    pub pixel: PixelPoint,
    /// Label anchor, offset from the center so the code doesn't cover the circle
    pub label: PixelPoint,
    pub radius_px: f64,
}

impl ControlPoint {
    /// Keep-out radius used when trimming route segments.
    pub fn effective_radius(&self, terminal_multiplier: f64) -> f64 {
        if self.role.is_terminal() { self.radius_px * terminal_multiplier } else { self.radius_px }
    }
}

/// Millimeter to pixel conversion for one base map
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SheetScale {
    pub px_per_mm_x: f64,
    pub px_per_mm_y: f64,
    pub image_width_px: u32,
    pub image_height_px: u32,
}

impl SheetScale {
    pub fn new(sheet: SheetConfig, image_width_px: u32, image_height_px: u32) -> Self {
        Self {
            px_per_mm_x: f64::from(image_width_px) / sheet.width_mm,
            px_per_mm_y: f64::from(image_height_px) / sheet.height_mm,
            image_width_px,
            image_height_px,
        }
    }

    /// Project a sheet position to image pixels (y axis flipped).
    pub fn to_pixel(&self, position: PhysicalPosition) -> PixelPoint {
        PixelPoint {
            x: position.x_mm * self.px_per_mm_x,
            y: f64::from(self.image_height_px) - position.y_mm * self.px_per_mm_y,
        }
    }
}

/// Why a coordinate line was not turned into a control point
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinateSkip {
    #[error("blank line")]
    Blank,
    #[error("no ':' separator")]
    MissingColon,
    #[error("empty identifier")]
    EmptyId,
    #[error("no parenthesized (x, y) pair")]
    MissingPair,
    #[error("'{value}' is not a finite number")]
    BadNumber { value: String },
}

/// Parse one `ID: (x_mm, y_mm)` line.
pub fn parse_coordinate_line(line: &str) -> Result<(String, PhysicalPosition), CoordinateSkip> {
    let line = line.trim();
    if line.is_empty() {
        return Err(CoordinateSkip::Blank);
    }

    let (id, rest) = line.split_once(':').ok_or(CoordinateSkip::MissingColon)?;
    let id = id.trim();
    if id.is_empty() {
        return Err(CoordinateSkip::EmptyId);
    }

    let open = rest.find('(').ok_or(CoordinateSkip::MissingPair)?;
    let inner = &rest[open + 1..];
    let close = inner.find(')').ok_or(CoordinateSkip::MissingPair)?;
    let mut parts = inner[..close].split(',');

    let (Some(x), Some(y), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(CoordinateSkip::MissingPair);
    };

    Ok((id.to_string(), PhysicalPosition { x_mm: parse_mm(x)?, y_mm: parse_mm(y)? }))
}

fn parse_mm(value: &str) -> Result<f64, CoordinateSkip> {
    let value = value.trim();
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CoordinateSkip::BadNumber { value: value.to_string() })
}

/// Loaded control points in source order with O(1) lookup by id
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateRegistry {
    points: Vec<ControlPoint>,
    index: HashMap<String, usize>,
    scale: SheetScale,
    skipped: usize,
}

impl CoordinateRegistry {
    /// Load the coordinate source from disk.
    ///
    /// A missing file is [`SplitviewError::NoData`]; malformed lines are skipped.
    pub fn load<P: AsRef<Path>>(
        path: P,
        scale: SheetScale,
        markers: &MarkerConfig,
        tokens: &Tokens,
    ) -> Result<Self> {
        let path = path.as_ref();
        let bytes = SplitviewError::read_source("coordinates source", path)?;
        let registry = Self::from_source(&String::from_utf8_lossy(&bytes), scale, markers, tokens);

        info!(
            path = %path.display(),
            points = registry.len(),
            skipped = registry.skipped,
            "Loaded control point coordinates"
        );
        Ok(registry)
    }

    /// Build the registry from coordinate text.
    pub fn from_source(
        source: &str,
        scale: SheetScale,
        markers: &MarkerConfig,
        tokens: &Tokens,
    ) -> Self {
        let radius_px = markers.radius_mm * scale.px_per_mm_y;
        let label_offset_px = markers.label_offset_mm * scale.px_per_mm_x;

        let mut registry =
            Self { points: Vec::new(), index: HashMap::new(), scale, skipped: 0 };

        for (line_no, line) in source.lines().enumerate() {
            let (id, position) = match parse_coordinate_line(line) {
                Ok(parsed) => parsed,
                Err(CoordinateSkip::Blank) => continue,
                Err(reason) => {
                    debug!(line = line_no + 1, %reason, "Skipping coordinate line");
                    registry.skipped += 1;
                    continue;
                }
            };

            let pixel = scale.to_pixel(position);
            let point = ControlPoint {
                role: tokens.role_of(&id),
                position,
                pixel,
                label: PixelPoint { x: pixel.x + label_offset_px, y: pixel.y + label_offset_px },
                radius_px,
                id,
            };
            registry.insert(point);
        }

        registry
    }

    fn insert(&mut self, point: ControlPoint) {
        match self.index.get(&point.id) {
            Some(&slot) => {
                debug!(id = %point.id, "Duplicate control point replaces earlier entry");
                self.points[slot] = point;
            }
            None => {
                self.index.insert(point.id.clone(), self.points.len());
                self.points.push(point);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&ControlPoint> {
        self.index.get(id).map(|&slot| &self.points[slot])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Points in source order
    pub fn iter(&self) -> impl Iterator<Item = &ControlPoint> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of malformed lines dropped during the load
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn scale(&self) -> &SheetScale {
        &self.scale
    }

    /// Sheet distance between two known points, in millimeters.
    pub fn distance_mm(&self, from: &str, to: &str) -> Option<f64> {
        Some(self.get(from)?.position.distance_mm(&self.get(to)?.position))
    }
}
