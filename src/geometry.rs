//! Route polyline construction
//!
//! A competitor's route is drawn as straight segments between consecutive control
//! points. Segments stop short of each marker's circle so the line never covers the
//! marker itself, and pairs of markers that touch or overlap get no segment at all.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::trace;

use crate::config::RouteConfig;
use crate::registry::CoordinateRegistry;

/// A point in image pixel space, origin top-left
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn distance(&self, other: &PixelPoint) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// A marker as seen by the trimming function
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: PixelPoint,
    pub radius: f64,
}

/// One drawable piece of a route
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteSegment {
    pub start: PixelPoint,
    pub end: PixelPoint,
}

/// Trim the line between two marker centers to the markers' boundaries.
///
/// Returns `None` when `dist <= a.radius + b.radius + margin`. Otherwise the segment
/// runs from `trim_offset` beyond `a`'s edge to `trim_offset` before `b`'s edge along
/// the center line.
pub fn trimmed_segment(
    a: Circle,
    b: Circle,
    margin: f64,
    trim_offset: f64,
) -> Option<RouteSegment> {
    let dx = b.center.x - a.center.x;
    let dy = b.center.y - a.center.y;
    let dist = dx.hypot(dy);

    if dist.is_nan() || dist <= a.radius + b.radius + margin {
        return None;
    }

    let (ux, uy) = (dx / dist, dy / dist);
    let lead = a.radius + trim_offset;
    let tail = b.radius + trim_offset;

    Some(RouteSegment {
        start: PixelPoint { x: a.center.x + ux * lead, y: a.center.y + uy * lead },
        end: PixelPoint { x: b.center.x - ux * tail, y: b.center.y - uy * tail },
    })
}

/// Builds trimmed polylines against a loaded registry
#[derive(Debug, Clone, Copy)]
pub struct RouteGeometry<'a> {
    registry: &'a CoordinateRegistry,
    route: RouteConfig,
    terminal_multiplier: f64,
}

impl<'a> RouteGeometry<'a> {
    pub fn new(
        registry: &'a CoordinateRegistry,
        route: RouteConfig,
        terminal_multiplier: f64,
    ) -> Self {
        Self { registry, route, terminal_multiplier }
    }

    fn circle(&self, id: &str) -> Option<Circle> {
        let point = self.registry.get(id)?;
        let radius = point.effective_radius(self.terminal_multiplier);
        Some(Circle { center: point.pixel, radius })
    }

    /// Segments for consecutive known points of `path`.
    ///
    /// Identifiers missing from the registry are passed over; the line continues from
    /// the last known point.
    pub fn polyline<S: AsRef<str>>(&self, path: &[S]) -> Vec<RouteSegment> {
        let mut segments = Vec::with_capacity(path.len().saturating_sub(1));
        let mut previous: Option<Circle> = None;

        for id in path {
            let Some(current) = self.circle(id.as_ref()) else {
                trace!(id = id.as_ref(), "Unknown control point in path");
                continue;
            };

            if let Some(prev) = previous {
                if let Some(segment) =
                    trimmed_segment(prev, current, self.route.margin_px, self.route.trim_offset_px)
                {
                    segments.push(segment);
                }
            }
            previous = Some(current);
        }

        segments
    }
}

/// Render segments as SVG path data (`M x,y L x,y` per segment).
pub fn svg_path_data(segments: &[RouteSegment]) -> String {
    let mut d = String::with_capacity(segments.len() * 48);
    for segment in segments {
        if !d.is_empty() {
            d.push(' ');
        }
        let _ = write!(
            d,
            "M {:.2},{:.2} L {:.2},{:.2}",
            segment.start.x, segment.start.y, segment.end.x, segment.end.y
        );
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MarkerConfig, SheetConfig, Tokens};
    use crate::registry::SheetScale;
    use proptest::prelude::*;

    fn circle(x: f64, y: f64, radius: f64) -> Circle {
        Circle { center: PixelPoint { x, y }, radius }
    }

    #[test]
    fn overlapping_markers_get_no_segment() {
        // 3 px apart, radii 10 and 12
        let inner = trimmed_segment(circle(0.0, 0.0, 10.0), circle(3.0, 0.0, 12.0), 10.0, 5.0);
        assert_eq!(inner, None);
    }

    #[test]
    fn exact_threshold_is_not_exceeded() {
        let origin = circle(0.0, 0.0, 10.0);
        assert_eq!(trimmed_segment(origin, circle(30.0, 0.0, 10.0), 10.0, 5.0), None);
        assert!(trimmed_segment(origin, circle(30.1, 0.0, 10.0), 10.0, 5.0).is_some());
    }

    #[test]
    fn segment_stops_outside_both_markers() {
        let segment = trimmed_segment(circle(0.0, 0.0, 10.0), circle(100.0, 0.0, 20.0), 10.0, 5.0)
            .expect("far apart");
        assert_eq!(segment.start, PixelPoint { x: 15.0, y: 0.0 });
        assert_eq!(segment.end, PixelPoint { x: 75.0, y: 0.0 });

        let diagonal = trimmed_segment(circle(0.0, 0.0, 5.0), circle(30.0, 40.0, 5.0), 0.0, 0.0)
            .expect("far apart");
        assert!((diagonal.start.x - 3.0).abs() < 1e-9);
        assert!((diagonal.start.y - 4.0).abs() < 1e-9);
        assert!((diagonal.end.x - 27.0).abs() < 1e-9);
        assert!((diagonal.end.y - 36.0).abs() < 1e-9);
    }

    fn registry(source: &str) -> CoordinateRegistry {
        // 1 px per mm, 6 mm markers
        let sheet = SheetConfig { width_mm: 1000.0, height_mm: 1000.0 };
        let scale = SheetScale::new(sheet, 1000, 1000);
        CoordinateRegistry::from_source(source, scale, &MarkerConfig::default(), &Tokens::default())
    }

    #[test]
    fn polyline_skips_unknown_ids_and_keeps_anchor() {
        let registry = registry("С1: (0, 0)\n31: (100, 0)\n32: (200, 0)\nФ1: (300, 0)");
        let geometry = RouteGeometry::new(&registry, RouteConfig::default(), 1.5);

        let segments = geometry.polyline(&["С1", "31", "99", "32", "Ф1"]);
        assert_eq!(segments.len(), 3);
        // Start radius 6 * 1.5 = 9, plus 5 px offset
        assert!((segments[0].start.x - 14.0).abs() < 1e-9);
        // 31 -> 32 bridges the unknown 99
        assert!((segments[1].start.x - 111.0).abs() < 1e-9);
        assert!((segments[1].end.x - 189.0).abs() < 1e-9);
    }

    #[test]
    fn polyline_of_touching_markers_is_empty() {
        let registry = registry("31: (0, 0)\n32: (5, 0)");
        let geometry = RouteGeometry::new(&registry, RouteConfig::default(), 1.5);
        assert!(geometry.polyline(&["31", "32"]).is_empty());
        assert!(geometry.polyline::<&str>(&[]).is_empty());
    }

    #[test]
    fn svg_path_has_one_move_per_segment() {
        let segments = [
            RouteSegment {
                start: PixelPoint { x: 1.0, y: 2.0 },
                end: PixelPoint { x: 3.0, y: 4.5 },
            },
            RouteSegment {
                start: PixelPoint { x: 5.0, y: 6.0 },
                end: PixelPoint { x: 7.0, y: 8.0 },
            },
        ];
        assert_eq!(
            svg_path_data(&segments),
            "M 1.00,2.00 L 3.00,4.50 M 5.00,6.00 L 7.00,8.00"
        );
        assert_eq!(svg_path_data(&[]), "");
    }

    proptest! {
        #[test]
        fn prop_no_segment_at_or_below_threshold(
            ax in -500.0f64..500.0, ay in -500.0f64..500.0,
            bx in -500.0f64..500.0, by in -500.0f64..500.0,
            ra in 0.0f64..60.0, rb in 0.0f64..60.0,
            margin in 0.0f64..20.0,
        ) {
            let a = circle(ax, ay, ra);
            let b = circle(bx, by, rb);
            let dist = a.center.distance(&b.center);
            let segment = trimmed_segment(a, b, margin, 5.0);

            if dist <= ra + rb + margin {
                prop_assert!(segment.is_none());
            } else {
                let segment = segment.expect("beyond threshold");
                prop_assert!((segment.start.distance(&a.center) - (ra + 5.0)).abs() < 1e-6);
                prop_assert!((segment.end.distance(&b.center) - (rb + 5.0)).abs() < 1e-6);
            }
        }
    }
}
