//! Memoizing gray rule engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::gray::rule::{GrayRule, Policy, Subject};
use crate::observability::metrics;
use crate::store::{split_config_name, ConfigCache};

/// Evaluates gray rules stored as config values.
///
/// Parsed rules are memoized per `section.key`. Each memo entry remembers the
/// reload generation it was parsed under; `reset` bumps the generation, so a
/// rule parsed from a value read just before a reload is never served after it.
#[derive(Debug)]
pub struct GrayRuleEngine {
    cache: Arc<ConfigCache>,
    rules: DashMap<String, (u64, Arc<GrayRule>)>,
    generation: AtomicU64,
}

impl GrayRuleEngine {
    pub fn new(cache: Arc<ConfigCache>) -> Self {
        Self {
            cache,
            rules: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// Parsed rule for `section`/`key`, if the value exists and is well formed.
    ///
    /// Failed parses are not memoized.
    pub fn rule(&self, section: &str, key: &str) -> Option<Arc<GrayRule>> {
        let config_key = format!("{}.{}", section, key);
        let generation = self.generation.load(Ordering::Acquire);

        if let Some(entry) = self.rules.get(&config_key) {
            let (tagged, rule) = entry.value();
            if *tagged == generation {
                return Some(rule.clone());
            }
        }

        let raw = self.cache.get(section, key)?;
        match GrayRule::parse(config_key.as_str(), &raw) {
            Ok(rule) => {
                let rule = Arc::new(rule);
                self.rules.insert(config_key, (generation, rule.clone()));
                metrics::record_gray_rules_cached(self.rules.len());
                Some(rule)
            }
            Err(e) => {
                tracing::debug!(key = %config_key, value = %raw, error = %e, "Gray rule rejected");
                None
            }
        }
    }

    /// Decide for `subject` under the rule named `section.key`.
    ///
    /// No rule means not allowed.
    pub fn is_allowed<'a>(&self, config_name: &str, subject: impl Into<Subject<'a>>) -> bool {
        match split_config_name(config_name) {
            Some((section, key)) => self.is_allowed_in(section, key, subject),
            None => false,
        }
    }

    /// Same as [`is_allowed`](Self::is_allowed) with the name already split.
    pub fn is_allowed_in<'a>(&self, section: &str, key: &str, subject: impl Into<Subject<'a>>) -> bool {
        self.rule(section, key)
            .is_some_and(|rule| rule.is_allowed(subject.into()))
    }

    /// The exact list of a `deny` rule: the subjects let through despite the default.
    ///
    /// `None` for `allow` rules and missing or malformed values.
    pub fn white_list(&self, config_name: &str) -> Option<Vec<String>> {
        let (section, key) = split_config_name(config_name)?;
        let rule = self.rule(section, key)?;
        match rule.policy {
            Policy::Deny => Some(rule.exact_list().to_vec()),
            Policy::Allow => None,
        }
    }

    /// Drop every memoized rule. Called after each reload.
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.rules.clear();
        metrics::record_gray_rules_cached(0);
        metrics::record_gray_cache_reset();
        tracing::debug!("Gray rule memo reset");
    }

    /// Number of memoized rules.
    pub fn cached_rules(&self) -> usize {
        self.rules.len()
    }
}
