//! Lenient markup tokenizer for results documents
//!
//! Timing software exports are HTML rather than XML: end tags are omitted, attributes
//! are unquoted and HTML entities are used freely. The tokenizer runs quick-xml with
//! end-name checks disabled and keeps only what the results parser needs, in
//! document order:
//!
//! - **markers**: named anchors (`<a name="...">`) and heading text, which set the
//!   group context for the tables that follow
//! - **tables**: rows of cells, each cell split into text lines at `<br>` and block
//!   boundaries; a nested table becomes a table of its own
//!
//! A syntax error never discards what was read before it.

use quick_xml::events::{BytesStart, Event};
use quick_xml::escape::resolve_html5_entity;
use quick_xml::reader::Reader;
use tracing::{debug, warn};

/// Source of a group-context marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Anchor,
    Heading,
}

/// A group-context candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub kind: MarkerKind,
    pub label: String,
}

/// One table cell, as trimmed non-empty text lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    pub lines: Vec<String>,
}

impl Cell {
    /// All lines joined with single spaces
    pub fn text(&self) -> String {
        self.lines.join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// Value of the `class` attribute
    pub class: Option<String>,
    pub rows: Vec<Row>,
    /// Number of markers seen before the table opened
    pub markers_before: usize,
}

impl Table {
    pub fn has_class(&self, class: &str) -> bool {
        self.class
            .as_deref()
            .is_some_and(|value| value.split_whitespace().any(|c| c.eq_ignore_ascii_case(class)))
    }
}

/// Tokenized results document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub markers: Vec<Marker>,
    /// Tables in order of their opening tags
    pub tables: Vec<Table>,
}

#[derive(Debug, Default)]
struct OpenCell {
    lines: Vec<String>,
    current: String,
}

impl OpenCell {
    fn push_text(&mut self, text: &str) {
        let mut pieces = text.split('\n');
        if let Some(first) = pieces.next() {
            self.current.push_str(first);
        }
        for piece in pieces {
            self.break_line();
            self.current.push_str(piece);
        }
    }

    fn break_line(&mut self) {
        let line = collapse_whitespace(&self.current);
        if !line.is_empty() {
            self.lines.push(line);
        }
        self.current.clear();
    }

    fn finish(mut self) -> Cell {
        self.break_line();
        Cell { lines: self.lines }
    }
}

#[derive(Debug)]
struct OpenTable {
    order: usize,
    table: Table,
    row: Option<Row>,
    cell: Option<OpenCell>,
}

impl OpenTable {
    fn close_cell(&mut self) {
        if let Some(cell) = self.cell.take() {
            self.row.get_or_insert_with(Row::default).cells.push(cell.finish());
        }
    }

    fn close_row(&mut self) {
        self.close_cell();
        if let Some(row) = self.row.take() {
            if !row.cells.is_empty() {
                self.table.rows.push(row);
            }
        }
    }

    fn open_cell(&mut self) {
        self.close_cell();
        self.row.get_or_insert_with(Row::default);
        self.cell = Some(OpenCell::default());
    }
}

#[derive(Debug, Default)]
struct Tokenizer {
    markers: Vec<Marker>,
    open_tables: Vec<OpenTable>,
    closed_tables: Vec<(usize, Table)>,
    table_count: usize,
    heading: Option<String>,
    raw_text: bool,
}

impl Tokenizer {
    fn innermost_cell(&mut self) -> Option<&mut OpenCell> {
        self.open_tables.last_mut().and_then(|t| t.cell.as_mut())
    }

    fn start(&mut self, element: &BytesStart, self_closing: bool) {
        let name = tag_name(element.name().as_ref());
        match name.as_str() {
            "table" if !self_closing => {
                self.open_tables.push(OpenTable {
                    order: self.table_count,
                    table: Table {
                        class: attribute(element, "class"),
                        rows: Vec::new(),
                        markers_before: self.markers.len(),
                    },
                    row: None,
                    cell: None,
                });
                self.table_count += 1;
            }
            "tr" => {
                if let Some(table) = self.open_tables.last_mut() {
                    table.close_row();
                    table.row = Some(Row::default());
                }
            }
            "td" | "th" => {
                if let Some(table) = self.open_tables.last_mut() {
                    table.open_cell();
                    if self_closing {
                        table.close_cell();
                    }
                }
            }
            "br" | "p" | "div" | "li" => {
                if let Some(cell) = self.innermost_cell() {
                    cell.break_line();
                }
            }
            "a" => {
                let label = attribute(element, "name").or_else(|| attribute(element, "id"));
                if let Some(label) = label.filter(|l| !l.trim().is_empty()) {
                    let label = label.trim().to_string();
                    self.markers.push(Marker { kind: MarkerKind::Anchor, label });
                }
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" if !self_closing => {
                self.heading = Some(String::new());
            }
            "script" | "style" if !self_closing => self.raw_text = true,
            _ => {}
        }
    }

    fn end(&mut self, name: &[u8]) {
        match tag_name(name).as_str() {
            "table" => {
                if let Some(mut open) = self.open_tables.pop() {
                    open.close_row();
                    self.closed_tables.push((open.order, open.table));
                }
            }
            "tr" => {
                if let Some(table) = self.open_tables.last_mut() {
                    table.close_row();
                }
            }
            "td" | "th" => {
                if let Some(table) = self.open_tables.last_mut() {
                    table.close_cell();
                }
            }
            "p" | "div" | "li" => {
                if let Some(cell) = self.innermost_cell() {
                    cell.break_line();
                }
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                if let Some(text) = self.heading.take() {
                    let label = collapse_whitespace(&text);
                    if !label.is_empty() {
                        self.markers.push(Marker { kind: MarkerKind::Heading, label });
                    }
                }
            }
            "script" | "style" => self.raw_text = false,
            _ => {}
        }
    }

    fn text(&mut self, raw: &str) {
        if self.raw_text {
            return;
        }
        let text = decode_entities(raw);
        if let Some(heading) = self.heading.as_mut() {
            heading.push_str(&text);
        }
        if let Some(cell) = self.innermost_cell() {
            cell.push_text(&text);
        }
    }

    fn finish(mut self) -> Document {
        while let Some(mut open) = self.open_tables.pop() {
            open.close_row();
            self.closed_tables.push((open.order, open.table));
        }
        self.closed_tables.sort_by_key(|(order, _)| *order);

        Document {
            markers: self.markers,
            tables: self.closed_tables.into_iter().map(|(_, table)| table).collect(),
        }
    }
}

/// Tokenize a results document.
pub fn tokenize(html: &str) -> Document {
    let mut reader = Reader::from_str(html);
    {
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.trim_text(false);
    }

    let mut tokenizer = Tokenizer::default();

    loop {
        let position = reader.buffer_position();
        match reader.read_event() {
            Ok(Event::Start(element)) => tokenizer.start(&element, false),
            Ok(Event::Empty(element)) => tokenizer.start(&element, true),
            Ok(Event::End(element)) => tokenizer.end(element.name().as_ref()),
            Ok(Event::Text(text)) => tokenizer.text(&String::from_utf8_lossy(&text)),
            Ok(Event::CData(data)) => tokenizer.text(&String::from_utf8_lossy(&data)),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                if reader.buffer_position() == position {
                    warn!(
                        position,
                        error = %e,
                        "Markup tokenizer stalled, keeping partial document"
                    );
                    break;
                }
                debug!(position, error = %e, "Skipping malformed markup");
            }
        }
    }

    tokenizer.finish()
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

fn attribute(element: &BytesStart, key: &str) -> Option<String> {
    element
        .html_attributes()
        .flatten()
        .find(|attr| attr.key.as_ref().eq_ignore_ascii_case(key.as_bytes()))
        .map(|attr| decode_entities(&String::from_utf8_lossy(&attr.value)))
}

/// Resolve character and HTML5 named references, leaving unknown ones as written.
fn decode_entities(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let resolved = rest[1..]
            .find(';')
            .filter(|&end| end > 0 && end <= 32)
            .and_then(|end| resolve_reference(&rest[1..=end]).map(|text| (text, end + 2)));

        match resolved {
            Some((text, consumed)) => {
                out.push_str(&text);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn resolve_reference(name: &str) -> Option<String> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    resolve_html5_entity(name).map(str::to_string)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
