//! Competition group definitions
//!
//! Each line of the group source names a group and the controls of its course:
//!
//! ```text
//! М21: С1 31 32 45 Ф1
//! Ж21: С2 31 33 Ф1
//! ```
//!
//! A token with the start prefix designates the group's start marker. Reserved
//! start/finish tokens never count as required controls.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Tokens;
use crate::{Result, SplitviewError};

/// A competition category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    /// Controls the course includes, in definition order
    pub required: Vec<String>,
    pub start: String,
}

impl Group {
    /// Group with no known course, used when the results document defines groups.
    pub fn open(name: impl Into<String>, tokens: &Tokens) -> Self {
        Self { name: name.into(), required: Vec::new(), start: tokens.default_start.clone() }
    }
}

/// Why a group line was not turned into a group
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupSkip {
    #[error("blank line")]
    Blank,
    #[error("no ':' separator")]
    MissingColon,
    #[error("empty group name")]
    EmptyName,
}

/// Parse one `GROUP_NAME: token token ...` line.
pub fn parse_group_line(line: &str, tokens: &Tokens) -> Result<Group, GroupSkip> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Err(GroupSkip::Blank);
    }

    let (name, rest) = line.split_once(':').ok_or(GroupSkip::MissingColon)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(GroupSkip::EmptyName);
    }

    let mut group = Group::open(name, tokens);
    let mut explicit_start = false;

    for token in rest.split(|c: char| c.is_whitespace() || c == ',').filter(|t| !t.is_empty()) {
        if tokens.is_start(token) {
            if !explicit_start {
                group.start = token.to_string();
                explicit_start = true;
            }
        } else if !tokens.is_finish(token) && !group.required.iter().any(|r| r == token) {
            group.required.push(token.to_string());
        }
    }

    Ok(group)
}

/// Known groups in definition order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupRegistry {
    groups: Vec<Group>,
    /// No definitions loaded; the results document names the groups
    open: bool,
}

impl GroupRegistry {
    /// Registry that accepts every anchor label as a group.
    pub fn open() -> Self {
        Self { groups: Vec::new(), open: true }
    }

    pub fn load<P: AsRef<Path>>(path: P, tokens: &Tokens) -> Result<Self> {
        let path = path.as_ref();
        let bytes = SplitviewError::read_source("group definitions", path)?;
        let registry = Self::from_source(&String::from_utf8_lossy(&bytes), tokens);
        info!(path = %path.display(), groups = registry.len(), "Loaded group definitions");
        Ok(registry)
    }

    pub fn from_source(source: &str, tokens: &Tokens) -> Self {
        let mut groups: Vec<Group> = Vec::new();

        for (line_no, line) in source.lines().enumerate() {
            match parse_group_line(line, tokens) {
                Ok(group) => {
                    if groups.iter().any(|g| g.name == group.name) {
                        debug!(line = line_no + 1, group = %group.name, "Duplicate group ignored");
                    } else {
                        groups.push(group);
                    }
                }
                Err(GroupSkip::Blank) => {}
                Err(reason) => debug!(line = line_no + 1, %reason, "Skipping group line"),
            }
        }

        Self { groups, open: false }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn get(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Resolve a context label (anchor name, heading text) to a group.
    ///
    /// A label matches when either string contains the other, ignoring case. The
    /// first group in definition order wins; empty labels never match.
    pub fn resolve(&self, label: &str) -> Option<&Group> {
        let label = label.trim().to_lowercase();
        if label.is_empty() {
            return None;
        }

        self.groups.iter().find(|group| {
            let name = group.name.to_lowercase();
            !name.is_empty() && (label.contains(&name) || name.contains(&label))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_and_required_controls() {
        let tokens = Tokens::default();
        let group = parse_group_line("ЖВ: С2, 31 32 Ф1 32 45", &tokens).expect("valid line");
        assert_eq!(group.name, "ЖВ");
        assert_eq!(group.start, "С2");
        assert_eq!(group.required, ["31", "32", "45"]);

        let group = parse_group_line("МЮ: 31 40", &tokens).expect("valid line");
        assert_eq!(group.start, "С1");
    }

    #[test]
    fn group_line_failure_modes() {
        let tokens = Tokens::default();
        assert_eq!(parse_group_line("", &tokens), Err(GroupSkip::Blank));
        assert_eq!(parse_group_line("# comment", &tokens), Err(GroupSkip::Blank));
        assert_eq!(parse_group_line("МЮ 31 40", &tokens), Err(GroupSkip::MissingColon));
        assert_eq!(parse_group_line(" : 31", &tokens), Err(GroupSkip::EmptyName));
    }

    #[test]
    fn registry_keeps_definition_order() {
        let registry = GroupRegistry::from_source(
            "Мужчины: С1 31\nbad line\nЖенщины: С1 32\nМужчины: С1 40\n",
            &Tokens::default(),
        );
        let names: Vec<_> = registry.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["Мужчины", "Женщины"]);
        let required = registry.get("Мужчины").map(|g| g.required.clone());
        assert_eq!(required, Some(vec!["31".to_string()]));
        assert!(!registry.is_open());
    }

    #[test]
    fn fuzzy_resolution_is_first_match() {
        let registry = GroupRegistry::from_source("МВ: 31\nМ: 32\nЖВ: 33", &Tokens::default());

        assert_eq!(registry.resolve("мв").map(|g| g.name.as_str()), Some("МВ"));
        assert_eq!(registry.resolve("Группа ЖВ").map(|g| g.name.as_str()), Some("ЖВ"));
        // "М" is contained in "МВ" too, but МВ is defined first
        assert_eq!(registry.resolve("М").map(|g| g.name.as_str()), Some("МВ"));
        assert_eq!(registry.resolve("  "), None);
        assert_eq!(registry.resolve("Ж21"), None);
    }

    #[test]
    fn missing_group_source_is_no_data() {
        let result = GroupRegistry::load("/no/such/groups.txt", &Tokens::default());
        assert!(matches!(result, Err(SplitviewError::NoData { .. })));
    }
}
