//! Elapsed time and distance tables
//!
//! Leg times in a results document are clock strings (`M:SS` or `H:MM:SS`). The split
//! table accumulates them in path order next to the straight-line distance of every
//! leg, and closes with a finish row derived from the competitor's official result.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::registry::CoordinateRegistry;
use crate::results::CompetitorRecord;

/// Placeholder for a missing time in source data
pub const NO_TIME: &str = "-";

/// Display value for an elapsed time that is not known yet
pub const NOT_REACHED: &str = "—";

/// Parse `H:MM:SS` or `MM:SS` into seconds.
///
/// Anything else, including the `-` placeholder, is `None`.
pub fn parse_clock(text: &str) -> Option<u32> {
    let text = text.trim();
    let parts: Vec<&str> = text.split(':').collect();

    let digits = |part: &str, max_len: usize| -> Option<u32> {
        if part.is_empty() || part.len() > max_len || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        part.parse().ok()
    };

    match parts.as_slice() {
        [hours, minutes, seconds] => {
            let hours = digits(hours, 4)?;
            let minutes = digits(minutes, 2).filter(|m| *m < 60)?;
            let seconds = digits(seconds, 2).filter(|s| *s < 60)?;
            Some(hours * 3600 + minutes * 60 + seconds)
        }
        [minutes, seconds] => {
            let minutes = digits(minutes, 4)?;
            let seconds = digits(seconds, 2).filter(|s| *s < 60)?;
            Some(minutes * 60 + seconds)
        }
        _ => None,
    }
}

/// Format seconds as `M:SS` below one hour, `H:MM:SS` from there on.
pub fn format_clock(seconds: u32) -> String {
    if seconds < 3600 {
        format!("{}:{:02}", seconds / 60, seconds % 60)
    } else {
        format!("{}:{:02}:{:02}", seconds / 3600, (seconds % 3600) / 60, seconds % 60)
    }
}

/// Row position within the split table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitKind {
    Start,
    Control,
    Finish,
}

/// Leg time shown for a row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum LegTime {
    /// Start row; there is no leg
    None,
    /// As printed in the results document (may be the `-` placeholder)
    Recorded(String),
    /// Finish leg computed from the result
    Derived(u32),
    /// Result missing, not a clock, or smaller than the accumulated legs
    Undetermined,
}

impl fmt::Display for LegTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegTime::None | LegTime::Undetermined => f.write_str(NOT_REACHED),
            LegTime::Recorded(text) => f.write_str(text),
            LegTime::Derived(seconds) => f.write_str(&format_clock(*seconds)),
        }
    }
}

/// One line of a competitor's split table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitRow {
    pub kind: SplitKind,
    /// 1-based position among interior controls
    pub index: Option<usize>,
    pub control: String,
    pub leg_time: LegTime,
    /// Accumulated seconds, `None` while nothing has accumulated
    pub elapsed_seconds: Option<u32>,
    pub elapsed: String,
    /// `None` when either end of the leg has no coordinates
    pub leg_distance_m: Option<u32>,
    pub cumulative_distance_m: u32,
}

/// Computes split tables against a loaded registry
#[derive(Debug, Clone, Copy)]
pub struct SplitsCalculator<'a> {
    registry: &'a CoordinateRegistry,
    meters_per_mm: f64,
}

impl<'a> SplitsCalculator<'a> {
    pub fn new(registry: &'a CoordinateRegistry, meters_per_mm: f64) -> Self {
        Self { registry, meters_per_mm }
    }

    /// Real-world length of a leg, rounded to the nearest meter.
    pub fn leg_distance_m(&self, from: &str, to: &str) -> Option<u32> {
        let meters = self.registry.distance_mm(from, to)? * self.meters_per_mm;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(meters.round() as u32)
    }

    /// Build the split table for one competitor.
    ///
    /// Interior rows only accumulate leg times that parse as clocks. The finish leg
    /// is `result - accumulated` when the result parses and is not smaller than the
    /// accumulated time, otherwise [`LegTime::Undetermined`].
    pub fn rows(&self, record: &CompetitorRecord) -> Vec<SplitRow> {
        let path = &record.path;
        let Some(start) = path.first() else {
            return Vec::new();
        };

        let mut rows = Vec::with_capacity(path.len());
        rows.push(SplitRow {
            kind: SplitKind::Start,
            index: None,
            control: start.clone(),
            leg_time: LegTime::None,
            elapsed_seconds: Some(0),
            elapsed: format_clock(0),
            leg_distance_m: Some(0),
            cumulative_distance_m: 0,
        });

        if path.len() < 2 {
            return rows;
        }

        let mut total_seconds = 0u32;
        let mut total_meters = 0u32;

        for (i, control) in path.iter().enumerate().take(path.len() - 1).skip(1) {
            let leg_time = record.leg_times.get(i - 1).map_or(NO_TIME, String::as_str);
            if let Some(seconds) = parse_clock(leg_time) {
                total_seconds = total_seconds.saturating_add(seconds);
            }

            let leg_distance_m = self.leg_distance_m(&path[i - 1], control);
            total_meters = total_meters.saturating_add(leg_distance_m.unwrap_or(0));

            rows.push(SplitRow {
                kind: SplitKind::Control,
                index: Some(i),
                control: control.clone(),
                leg_time: LegTime::Recorded(leg_time.to_string()),
                elapsed_seconds: (total_seconds > 0).then_some(total_seconds),
                elapsed: if total_seconds > 0 {
                    format_clock(total_seconds)
                } else {
                    NOT_REACHED.to_string()
                },
                leg_distance_m,
                cumulative_distance_m: total_meters,
            });
        }

        let finish = &path[path.len() - 1];
        let leg_distance_m = self.leg_distance_m(&path[path.len() - 2], finish);
        total_meters = total_meters.saturating_add(leg_distance_m.unwrap_or(0));

        let result_seconds = parse_clock(&record.result);
        let leg_time = match result_seconds {
            Some(result) if result >= total_seconds => LegTime::Derived(result - total_seconds),
            _ => LegTime::Undetermined,
        };

        rows.push(SplitRow {
            kind: SplitKind::Finish,
            index: None,
            control: finish.clone(),
            leg_time,
            elapsed_seconds: result_seconds,
            elapsed: match result_seconds {
                Some(_) => record.result.trim().to_string(),
                None => NOT_REACHED.to_string(),
            },
            leg_distance_m,
            cumulative_distance_m: total_meters,
        });

        rows
    }
}
