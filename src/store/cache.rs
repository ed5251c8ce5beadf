//! Process-wide section cache.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::observability::metrics;
use crate::store::split_config_name;

/// One named group of configuration entries.
///
/// Immutable once built; a reload swaps in a new `ConfigSection`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigSection {
    pub name: String,
    pub entries: HashMap<String, String>,
}

impl ConfigSection {
    pub fn new(name: impl Into<String>, entries: HashMap<String, String>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

/// A thread-safe store of section name -> section.
///
/// Readers take a clone of the section's `Arc`, so a concurrent
/// `replace_section` is observed either entirely or not at all.
#[derive(Debug, Default)]
pub struct ConfigCache {
    sections: DashMap<String, Arc<ConfigSection>>,
}

impl ConfigCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot of one section.
    pub fn section(&self, name: &str) -> Option<Arc<ConfigSection>> {
        self.sections.get(name).map(|r| r.value().clone())
    }

    /// Look up a raw value.
    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        self.section(section)?.get(key).map(str::to_string)
    }

    /// Look up a raw value, falling back to `default`.
    pub fn get_or_default(&self, section: &str, key: &str, default: &str) -> String {
        self.get(section, key).unwrap_or_else(|| default.to_string())
    }

    /// Look up a raw value by its dotted `section.key` name.
    pub fn get_by_name(&self, name: &str) -> Option<String> {
        let (section, key) = split_config_name(name)?;
        self.get(section, key)
    }

    /// Swap in a whole new map for `section`.
    pub fn replace_section(&self, section: &str, entries: HashMap<String, String>) {
        let fresh = Arc::new(ConfigSection::new(section, entries));
        self.sections.insert(section.to_string(), fresh);
        metrics::record_section_count(self.sections.len());
    }

    /// Names of all cached sections, sorted.
    pub fn section_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sections.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of cached sections.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Copy of every section, ordered by name.
    pub fn snapshot(&self) -> BTreeMap<String, HashMap<String, String>> {
        self.sections
            .iter()
            .map(|r| (r.key().clone(), r.value().entries.clone()))
            .collect()
    }

    // --- Typed accessors (dotted names) ---

    pub fn get_string(&self, name: &str, default: &str) -> String {
        self.get_by_name(name).unwrap_or_else(|| default.to_string())
    }

    pub fn get_i32(&self, name: &str, default: i32) -> i32 {
        self.parsed_or(name, default)
    }

    pub fn get_i64(&self, name: &str, default: i64) -> i64 {
        self.parsed_or(name, default)
    }

    pub fn get_f32(&self, name: &str, default: f32) -> f32 {
        self.parsed_or(name, default)
    }

    pub fn get_f64(&self, name: &str, default: f64) -> f64 {
        self.parsed_or(name, default)
    }

    /// `true` / `false` in any case; anything else yields `default`.
    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        match self.get_by_name(name) {
            Some(v) if v.eq_ignore_ascii_case("true") => true,
            Some(v) if v.eq_ignore_ascii_case("false") => false,
            _ => default,
        }
    }

    fn parsed_or<T: FromStr>(&self, name: &str, default: T) -> T {
        self.get_by_name(name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }
}
