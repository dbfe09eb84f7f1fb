//! Serializable views over a loaded snapshot
//!
//! These are the output contract: the event-wide table of points and groups, and a
//! per-competitor view with the drawn route, the split table and course coverage.

use serde::{Deserialize, Serialize};

use crate::cache::Snapshot;
use crate::geometry::{RouteSegment, svg_path_data};
use crate::registry::{ControlPoint, SheetScale};
use crate::results::{CompetitorRecord, GroupResults, ParseStats};
use crate::splits::SplitRow;
use crate::{Result, SplitviewError};

/// Event-wide export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventExport {
    pub scale: SheetScale,
    /// Control points in source order
    pub points: Vec<ControlPoint>,
    pub groups: Vec<GroupResults>,
    pub stats: ParseStats,
}

impl EventExport {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            scale: *snapshot.registry.scale(),
            points: snapshot.registry.iter().cloned().collect(),
            groups: snapshot.results.iter().cloned().collect(),
            stats: snapshot.results.stats(),
        }
    }
}

/// Everything needed to draw and tabulate one competitor's run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorView {
    pub record: CompetitorRecord,
    pub segments: Vec<RouteSegment>,
    /// SVG `d` attribute for `segments`
    pub path_data: String,
    pub splits: Vec<SplitRow>,
    /// Required controls the competitor visited, in course order
    pub taken: Vec<String>,
    /// Required controls the competitor never visited, in course order
    pub missed: Vec<String>,
    /// Visited controls with no known coordinates
    pub unknown: Vec<String>,
}

impl CompetitorView {
    pub fn build(snapshot: &Snapshot, record: &CompetitorRecord) -> Self {
        let segments = snapshot.geometry().polyline(&record.path);
        let visited = record.visited();

        let required = snapshot
            .results
            .get(&record.group)
            .map(|g| g.group.required.as_slice())
            .unwrap_or_default();
        let (taken, missed): (Vec<String>, Vec<String>) =
            required.iter().cloned().partition(|id| visited.contains(id));

        let mut unknown: Vec<String> = Vec::new();
        for id in visited {
            if !snapshot.registry.contains(id) && !unknown.contains(id) {
                unknown.push(id.clone());
            }
        }

        Self {
            path_data: svg_path_data(&segments),
            splits: snapshot.splits().rows(record),
            record: record.clone(),
            segments,
            taken,
            missed,
            unknown,
        }
    }

    /// Look up a competitor by group and name (or display name).
    pub fn find(snapshot: &Snapshot, group: &str, name: &str) -> Result<Self> {
        let record = snapshot.results.find(group, name).ok_or_else(|| {
            SplitviewError::no_data(format!("no competitor '{name}' in group '{group}'"))
        })?;
        Ok(Self::build(snapshot, record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splits::{LegTime, SplitKind};
    use crate::test_utils::write_event;

    fn snapshot() -> (tempfile::TempDir, Snapshot) {
        let dir = tempfile::tempdir().expect("tempdir");
        let files = write_event(dir.path()).expect("fixture event");
        let snapshot = Snapshot::load(&files.config).expect("fixture loads");
        (dir, snapshot)
    }

    #[test]
    fn event_export_lists_points_and_groups() {
        let (_dir, snapshot) = snapshot();
        let export = EventExport::from_snapshot(&snapshot);

        assert_eq!(export.points.len(), 6);
        assert_eq!(export.points[0].id, "С1");
        let groups: Vec<_> = export.groups.iter().map(|g| g.group.name.as_str()).collect();
        assert_eq!(groups, ["М21", "Ж21"]);
        assert_eq!(export.stats.rows_accepted, 4);

        let json = serde_json::to_value(&export).expect("serializes");
        assert_eq!(json["points"][0]["role"], "start");
        assert_eq!(json["groups"][0]["competitors"][0]["path"][1], "31");
    }

    #[test]
    fn competitor_view_covers_route_and_splits() {
        let (_dir, snapshot) = snapshot();
        let view = CompetitorView::find(&snapshot, "М21", "Иванов").expect("competitor");

        assert_eq!(view.record.display_name, "1. Иванов");
        assert_eq!(view.segments.len(), 4);
        assert_eq!(view.path_data.matches('M').count(), 4);
        assert_eq!(view.taken, ["31", "32", "45"]);
        assert!(view.missed.is_empty());
        assert!(view.unknown.is_empty());

        let finish = view.splits.last().expect("finish row");
        assert_eq!(finish.kind, SplitKind::Finish);
        // 45:12 result less 10:15 + 12:30 + 15:02 of legs
        assert_eq!(finish.leg_time, LegTime::Derived(445));
    }

    #[test]
    fn unfinished_competitor_has_missed_controls() {
        let (_dir, snapshot) = snapshot();
        let view = CompetitorView::find(&snapshot, "М21", "Сидоров").expect("competitor");

        assert_eq!(view.record.status.as_deref(), Some("снят"));
        assert_eq!(view.taken, ["31"]);
        assert_eq!(view.missed, ["32", "45"]);
        assert_eq!(view.splits.last().map(|r| r.leg_time.clone()), Some(LegTime::Undetermined));

        let json = serde_json::to_value(&view).expect("serializes");
        assert_eq!(json["splits"][2]["leg_time"]["state"], "undetermined");
    }

    #[test]
    fn unknown_competitor_is_no_data() {
        let (_dir, snapshot) = snapshot();
        assert!(matches!(
            CompetitorView::find(&snapshot, "М21", "Никто"),
            Err(SplitviewError::NoData { .. })
        ));
    }
}
