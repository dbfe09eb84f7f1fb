//! Results document parsing
//!
//! Turns a timing-software HTML export into per-group competitor records. The
//! document is tokenized first (see [`markup`]), then every results table is read
//! in the group context set by the anchors and headings that precede it.
//!
//! ```text
//! <a name="М21"></a>
//! <table class="rezult">
//!   <tr><td>Место</td><td>№</td><td>Фамилия</td>...<td>#1 [31]</td>...</tr>
//!   <tr><td>1.</td><td>101</td><td>Иванов</td>...<td>[31]<br>3:15</td>...</tr>
//! </table>
//! ```
//!
//! Problems in individual rows and cells are skipped and counted in [`ParseStats`];
//! only an unreadable document fails the whole parse.

pub mod layout;
pub mod markup;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::{ResultsLayout, Tokens};
use crate::groups::{Group, GroupRegistry};
use crate::{Result, SplitviewError};

use layout::{HeaderMap, RowSkip, read_row_fields, read_visit};
use markup::{Document, MarkerKind, Table};

/// One competitor's line in the results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorRecord {
    /// `"{rank}. {name}"`, or just the name when unranked
    pub display_name: String,
    pub rank: String,
    pub name: String,
    pub group: String,
    /// Start token, visited controls, finish token
    pub path: Vec<String>,
    /// One entry per interior path element
    pub leg_times: Vec<String>,
    /// Finish clock, or `-`
    pub result: String,
    /// Non-clock result text such as a disqualification mark
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl CompetitorRecord {
    /// Controls visited between start and finish.
    pub fn visited(&self) -> &[String] {
        match self.path.len() {
            0..=2 => &[],
            len => &self.path[1..len - 1],
        }
    }
}

/// A group and its competitors in document order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupResults {
    pub group: Group,
    pub competitors: Vec<CompetitorRecord>,
}

/// Counters collected while parsing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStats {
    pub tables: usize,
    pub rows_accepted: usize,
    pub rows_skipped: usize,
    pub cells_skipped: usize,
}

/// Parsed results, groups in the order the document introduces them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedResults {
    groups: Vec<GroupResults>,
    stats: ParseStats,
}

impl ParsedResults {
    pub fn get(&self, group: &str) -> Option<&GroupResults> {
        self.groups.iter().find(|g| g.group.name == group)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupResults> {
        self.groups.iter()
    }

    /// Look up a competitor by name or display name.
    pub fn find(&self, group: &str, name: &str) -> Option<&CompetitorRecord> {
        let name = name.trim();
        self.get(group)?
            .competitors
            .iter()
            .find(|c| c.name == name || c.display_name == name)
    }

    pub fn competitor_count(&self) -> usize {
        self.groups.iter().map(|g| g.competitors.len()).sum()
    }

    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    fn register(&mut self, group: &Group) -> usize {
        if let Some(index) = self.groups.iter().position(|g| g.group.name == group.name) {
            return index;
        }
        self.groups.push(GroupResults { group: group.clone(), competitors: Vec::new() });
        self.groups.len() - 1
    }
}

/// Decode raw document bytes with the named encoding.
///
/// A byte order mark overrides the label.
pub fn decode_document(bytes: &[u8], label: &str) -> Result<String> {
    let encoding = encoding_rs::Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| SplitviewError::Encoding { label: label.to_string() })?;

    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!(encoding = used.name(), "Results document contains malformed byte sequences");
    }
    Ok(text.into_owned())
}

/// Reads results documents against a set of known groups
#[derive(Debug, Clone, Copy)]
pub struct ResultsParser<'a> {
    groups: &'a GroupRegistry,
    layout: &'a ResultsLayout,
    tokens: &'a Tokens,
}

impl<'a> ResultsParser<'a> {
    pub fn new(groups: &'a GroupRegistry, layout: &'a ResultsLayout, tokens: &'a Tokens) -> Self {
        Self { groups, layout, tokens }
    }

    /// Read, decode and parse a results document.
    ///
    /// Fails with [`SplitviewError::NoData`] when the file is missing and with
    /// [`SplitviewError::Parse`] when it holds no results table at all.
    pub fn load<P: AsRef<Path>>(&self, path: P, encoding: &str) -> Result<ParsedResults> {
        let path = path.as_ref();
        let bytes = SplitviewError::read_source("results document", path)?;
        let html = decode_document(&bytes, encoding)?;
        let results = self.parse(&html);

        if results.stats.tables == 0 {
            return Err(SplitviewError::Parse {
                context: path.display().to_string(),
                details: "no results tables found".to_string(),
            });
        }

        info!(
            path = %path.display(),
            groups = results.groups.len(),
            competitors = results.competitor_count(),
            rows_skipped = results.stats.rows_skipped,
            cells_skipped = results.stats.cells_skipped,
            "Parsed results document"
        );
        Ok(results)
    }

    /// Parse decoded markup.
    pub fn parse(&self, html: &str) -> ParsedResults {
        let document = markup::tokenize(html);
        let contexts = self.resolve_markers(&document);

        let mut results = ParsedResults::default();
        for group in contexts.iter().flatten() {
            results.register(group);
        }

        let mut current: Option<&Group> = None;

        for table in document.tables.iter().filter(|t| self.is_results_table(t)) {
            results.stats.tables += 1;

            let nearest = contexts[..table.markers_before.min(contexts.len())]
                .iter()
                .rev()
                .find_map(Option::as_ref);
            if nearest.is_some() {
                current = nearest;
            }

            let Some(group) = current else {
                let rows = table.rows.len().saturating_sub(1);
                debug!(rows, reason = %RowSkip::NoGroupContext, "Skipping table rows");
                results.stats.rows_skipped += rows;
                continue;
            };

            let slot = results.register(group);
            self.read_table(table, group, slot, &mut results);
        }

        results
    }

    fn is_results_table(&self, table: &Table) -> bool {
        match self.layout.table_class.as_deref() {
            Some(class) if !class.trim().is_empty() => table.has_class(class.trim()),
            _ => true,
        }
    }

    /// Resolve each marker to a group, in document order.
    fn resolve_markers(&self, document: &Document) -> Vec<Option<Group>> {
        document
            .markers
            .iter()
            .map(|marker| {
                let label = marker.label.trim();
                if self.groups.is_open() {
                    (marker.kind == MarkerKind::Anchor && !label.is_empty())
                        .then(|| Group::open(label, self.tokens))
                } else {
                    self.groups.resolve(label).cloned()
                }
            })
            .collect()
    }

    fn read_table(&self, table: &Table, group: &Group, slot: usize, results: &mut ParsedResults) {
        let Some((header_row, rows)) = table.rows.split_first() else {
            return;
        };
        let header = HeaderMap::interpret(header_row, self.layout, self.tokens);
        debug!(
            group = %group.name,
            checkpoints = header.checkpoints.len(),
            first_checkpoint = header.first_checkpoint_column,
            "Read results table header"
        );

        for (row_no, row) in rows.iter().enumerate() {
            let fields = match read_row_fields(row, &header, self.layout) {
                Ok(fields) => fields,
                Err(reason) => {
                    debug!(group = %group.name, row = row_no + 1, %reason, "Skipping results row");
                    results.stats.rows_skipped += 1;
                    continue;
                }
            };

            let mut path = vec![group.start.clone()];
            let mut leg_times = Vec::new();

            let checkpoint_cells = row
                .cells
                .iter()
                .enumerate()
                .skip(header.first_checkpoint_column)
                .filter(|(column, _)| !header.is_identity_column(*column));

            for (column, cell) in checkpoint_cells {
                match read_visit(cell, column, &header, self.tokens) {
                    Ok(visit) => {
                        path.push(visit.id);
                        leg_times.push(visit.leg_time);
                    }
                    Err(layout::CellSkip::Empty) => {}
                    Err(reason) => {
                        debug!(name = %fields.name, column, %reason, "Skipping checkpoint cell");
                        results.stats.cells_skipped += 1;
                    }
                }
            }
            path.push(self.tokens.finish.clone());

            let display_name = if fields.rank.is_empty() {
                fields.name.clone()
            } else {
                format!("{}. {}", fields.rank, fields.name)
            };

            results.groups[slot].competitors.push(CompetitorRecord {
                display_name,
                rank: fields.rank,
                name: fields.name,
                group: group.name.clone(),
                path,
                leg_times,
                result: fields.result,
                status: fields.status,
            });
            results.stats.rows_accepted += 1;
        }
    }
}
