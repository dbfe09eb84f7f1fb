//! Column interpretation for results tables
//!
//! Exports differ in which columns they print and in what order, so the header row
//! is read first: control codes appear as `[31]` or `(31)` in checkpoint column
//! headings, and the name/result/rank columns are found by their labels. Anything
//! the header doesn't reveal falls back to the configured fixed indices.
//!
//! Each step returns a tagged outcome so a bad row or cell is skipped on its own.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use thiserror::Error;

use super::markup::{Cell, Row};
use crate::config::{ResultsLayout, Tokens};
use crate::splits::NO_TIME;

fn bracketed_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\[(]\s*([^\[\]()\s]+)\s*[\])]").expect("valid regex"))
}

fn bare_code() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|[^0-9:])([0-9]{2,3})(?:$|[^0-9:])").expect("valid regex"))
}

fn clock() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|[^0-9:])([0-9]{1,4}:[0-5][0-9](?::[0-5][0-9])?)(?:$|[^0-9:])")
            .expect("valid regex")
    })
}

/// First `H:MM` or `H:MM:SS` clock in `text`.
pub fn find_clock(text: &str) -> Option<&str> {
    clock().captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// First bracket- or paren-delimited token in `text`.
pub fn find_bracketed(text: &str) -> Option<&str> {
    bracketed_token().captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// First bare two or three digit number in `text` that isn't part of a clock.
pub fn find_bare_code(text: &str) -> Option<&str> {
    bare_code().captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

fn is_control_code(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

fn label_matches(cell_text: &str, labels: &[String]) -> bool {
    let text = cell_text.trim().to_lowercase();
    !text.is_empty()
        && labels.iter().any(|label| {
            let label = label.trim().to_lowercase();
            !label.is_empty() && text.contains(&label)
        })
}

/// What the header row says about a table's columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMap {
    /// Column index to control code
    pub checkpoints: BTreeMap<usize, String>,
    pub rank_column: usize,
    pub name_column: usize,
    pub result_column: usize,
    pub first_checkpoint_column: usize,
    /// Text of the name column's heading, used to spot repeated header rows
    pub name_label: Option<String>,
}

impl HeaderMap {
    /// Read a header row.
    pub fn interpret(header: &Row, layout: &ResultsLayout, tokens: &Tokens) -> Self {
        let texts: Vec<String> = header.cells.iter().map(Cell::text).collect();

        let accept = |token: &str| {
            is_control_code(token)
                && !tokens.is_reserved(token)
                && !layout.ignored_header_numbers.iter().any(|n| n == token)
        };

        let mut checkpoints: BTreeMap<usize, String> = texts
            .iter()
            .enumerate()
            .filter_map(|(column, text)| {
                bracketed_token()
                    .captures_iter(text)
                    .filter_map(|c| c.get(1))
                    .map(|m| m.as_str())
                    .find(|token| accept(token))
                    .map(|token| (column, token.to_string()))
            })
            .collect();

        if checkpoints.is_empty() {
            checkpoints = texts
                .iter()
                .enumerate()
                .filter_map(|(column, text)| {
                    find_bare_code(text).filter(|t| accept(t)).map(|t| (column, t.to_string()))
                })
                .collect();
        }

        let find_label = |labels: &[String]| texts.iter().position(|t| label_matches(t, labels));

        let name_column = find_label(&layout.name_labels).unwrap_or(layout.name_column);
        let result_column = find_label(&layout.result_labels).unwrap_or(layout.result_column);
        let rank_column = find_label(&layout.rank_labels).unwrap_or(layout.rank_column);
        let first_checkpoint_column =
            checkpoints.keys().next().copied().unwrap_or(layout.first_checkpoint_column);

        let name_label =
            texts.get(name_column).map(|t| t.trim().to_string()).filter(|t| !t.is_empty());

        Self {
            checkpoints,
            rank_column,
            name_column,
            result_column,
            first_checkpoint_column,
            name_label,
        }
    }

    /// Minimum cell count for a data row
    pub fn required_cells(&self) -> usize {
        self.first_checkpoint_column.max(self.name_column + 1)
    }

    /// Whether `column` holds rank, name or result rather than a control visit.
    ///
    /// A column the header maps to a control code is never an identity column, even
    /// when a fixed fallback index points at it.
    pub fn is_identity_column(&self, column: usize) -> bool {
        !self.checkpoints.contains_key(&column)
            && (column == self.rank_column
                || column == self.name_column
                || column == self.result_column)
    }
}

/// Why a data row produced no competitor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowSkip {
    #[error("row has {found} cells, needs {needed}")]
    TooFewCells { found: usize, needed: usize },
    #[error("empty name cell")]
    EmptyName,
    #[error("name cell repeats header label '{label}'")]
    HeaderLabel { label: String },
    #[error("no group context before this table")]
    NoGroupContext,
}

/// Identity and result columns of one data row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFields {
    pub rank: String,
    pub name: String,
    /// Finish clock, or `-`
    pub result: String,
    /// Result cell text when it holds no clock (e.g. a disqualification mark)
    pub status: Option<String>,
}

/// Read rank, name and result from a data row.
pub fn read_row_fields(
    row: &Row,
    header: &HeaderMap,
    layout: &ResultsLayout,
) -> Result<RowFields, RowSkip> {
    let needed = header.required_cells();
    if row.cells.len() < needed {
        return Err(RowSkip::TooFewCells { found: row.cells.len(), needed });
    }

    let text_at = |column: usize| row.cells.get(column).map(Cell::text).unwrap_or_default();

    let name = text_at(header.name_column).trim().to_string();
    if name.is_empty() {
        return Err(RowSkip::EmptyName);
    }

    let repeats_label = |label: &str| name.to_lowercase() == label.trim().to_lowercase();
    if let Some(label) = header
        .name_label
        .iter()
        .chain(layout.name_labels.iter())
        .find(|label| repeats_label(label))
    {
        return Err(RowSkip::HeaderLabel { label: label.clone() });
    }

    let rank = text_at(header.rank_column).trim().trim_end_matches('.').trim().to_string();

    let result_text = text_at(header.result_column);
    let (result, status) = match find_clock(&result_text) {
        Some(clock) => (clock.to_string(), None),
        None => {
            let status = result_text.trim();
            (NO_TIME.to_string(), (!status.is_empty()).then(|| status.to_string()))
        }
    };

    Ok(RowFields { rank, name, result, status })
}

/// Why a checkpoint cell contributed no visit
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CellSkip {
    #[error("empty cell")]
    Empty,
    #[error("no control code in cell or header")]
    NoControlId,
    #[error("reserved token '{id}'")]
    Reserved { id: String },
    #[error("'{id}' is not a control code")]
    NotNumeric { id: String },
}

/// A control visit read from one checkpoint cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub id: String,
    /// Leg clock, or `-`
    pub leg_time: String,
}

/// Read the control code and leg time from the cell in `column`.
///
/// The code comes from a bracketed token in the cell, then the header mapping, then
/// a bare number on the cell's first line. The leg time is taken from the second
/// line, or from the first line when there is only one.
///
/// A cell with neither a bracketed token nor any digit (`-`, `-----`) marks a
/// control that was not punched and counts as empty.
pub fn read_visit(
    cell: &Cell,
    column: usize,
    header: &HeaderMap,
    tokens: &Tokens,
) -> Result<Visit, CellSkip> {
    let Some(first) = cell.lines.first() else {
        return Err(CellSkip::Empty);
    };
    let has_digits = cell.lines.iter().any(|line| line.bytes().any(|b| b.is_ascii_digit()));
    if find_bracketed(first).is_none() && !has_digits {
        return Err(CellSkip::Empty);
    }

    let id = find_bracketed(first)
        .or_else(|| header.checkpoints.get(&column).map(String::as_str))
        .or_else(|| find_bare_code(first))
        .ok_or(CellSkip::NoControlId)?;

    if tokens.is_reserved(id) {
        return Err(CellSkip::Reserved { id: id.to_string() });
    }
    if !is_control_code(id) {
        return Err(CellSkip::NotNumeric { id: id.to_string() });
    }

    let leg_time = match cell.lines.get(1) {
        Some(second) => find_clock(second).map(str::to_string),
        None => find_clock(&bracketed_token().replace(first, " ")).map(str::to_string),
    };

    Ok(Visit { id: id.to_string(), leg_time: leg_time.unwrap_or_else(|| NO_TIME.to_string()) })
}
