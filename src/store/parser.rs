//! Sectioned `key=value` text parser.
//!
//! ```text
//! # comment
//! [section]
//! key=value
//! ```
//!
//! Lines before the first header, blank lines, lines without `=`, and entries
//! with an empty key or value are dropped. Values are split on the first `=`
//! only, so `a=b=c` stores `b=c` under `a`.

use std::collections::{BTreeMap, HashMap};

/// Section name -> (key -> value).
pub type ParsedConfig = BTreeMap<String, HashMap<String, String>>;

/// Parse a raw config blob.
///
/// Sections that end up with no entries are omitted from the result. A header
/// seen twice in one blob merges into one section, later keys winning.
pub fn parse(raw: &str) -> ParsedConfig {
    let mut parsed = ParsedConfig::new();
    let mut current: Option<&str> = None;

    for line in raw.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(name) = section_header(line) {
            current = Some(name);
            continue;
        }

        let Some(section) = current else {
            tracing::debug!(line, "Dropping entry outside any section");
            continue;
        };

        match entry(line) {
            Some((key, value)) => {
                parsed
                    .entry(section.to_string())
                    .or_default()
                    .insert(key.to_string(), value.to_string());
            }
            None => tracing::debug!(section, line, "Dropping malformed line"),
        }
    }

    parsed
}

/// Parse header-less `key=value` lines, as found in a local config file.
///
/// Comments, blank lines, header lines and malformed lines are dropped.
pub fn parse_entries(raw: &str) -> HashMap<String, String> {
    raw.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| match entry(line) {
            Some((key, value)) => Some((key.to_string(), value.to_string())),
            None => {
                tracing::debug!(line, "Dropping malformed line");
                None
            }
        })
        .collect()
}

fn entry(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    if key.is_empty() || value.is_empty() {
        None
    } else {
        Some((key, value))
    }
}

fn section_header(line: &str) -> Option<&str> {
    let name = line.strip_prefix('[')?.strip_suffix(']')?;
    if name.is_empty() || name.contains(['[', ']']) {
        None
    } else {
        Some(name)
    }
}
