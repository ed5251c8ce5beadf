//! Gray rule grammar and evaluation.

use std::collections::HashSet;
use std::hash::Hasher;

use fnv::FnvHasher;
use thiserror::Error;

/// Default decision of a rule when no clause matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Allow,
    Deny,
}

impl Policy {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "allow" => Some(Policy::Allow),
            "deny" => Some(Policy::Deny),
            _ => None,
        }
    }
}

/// Reasons a config value does not yield a rule.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleParseError {
    #[error("unknown policy token {0:?}")]
    UnknownPolicy(String),

    #[error("invalid modulo clause {0:?}")]
    InvalidModulo(String),
}

/// The identity a decision is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject<'a> {
    /// String identifier; modulo clauses use its stable hash.
    Text(&'a str),
    /// Integral identifier; modulo clauses use the value itself.
    Id(i64),
    /// Unsigned identifier, for values past `i64::MAX`.
    Unsigned(u64),
}

impl<'a> From<&'a str> for Subject<'a> {
    fn from(s: &'a str) -> Self {
        Subject::Text(s)
    }
}

impl<'a> From<&'a String> for Subject<'a> {
    fn from(s: &'a String) -> Self {
        Subject::Text(s)
    }
}

impl From<i64> for Subject<'_> {
    fn from(id: i64) -> Self {
        Subject::Id(id)
    }
}

impl From<i32> for Subject<'_> {
    fn from(id: i32) -> Self {
        Subject::Id(id.into())
    }
}

impl From<u32> for Subject<'_> {
    fn from(id: u32) -> Self {
        Subject::Id(id.into())
    }
}

impl From<u64> for Subject<'_> {
    fn from(id: u64) -> Self {
        Subject::Unsigned(id)
    }
}

impl From<usize> for Subject<'_> {
    fn from(id: usize) -> Self {
        Subject::Unsigned(id as u64)
    }
}

/// FNV-1a 64 of the UTF-8 bytes, masked to 63 bits.
///
/// Stable across processes, platforms and releases.
pub fn stable_hash(s: &str) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(s.as_bytes());
    hasher.finish() & (i64::MAX as u64)
}

/// A parsed gray rule for one `section.key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayRule {
    pub key: String,
    pub policy: Policy,
    exact_list: Vec<String>,
    exact_set: HashSet<String>,
    moduli: Vec<u64>,
}

impl GrayRule {
    /// Parse `policy;clause;clause;...`.
    ///
    /// The policy must be exactly `allow` or `deny`. Clause tokens are
    /// trimmed and empty ones skipped, so a trailing `;` is fine. Duplicate
    /// clauses keep their first position.
    pub fn parse(key: impl Into<String>, raw: &str) -> Result<Self, RuleParseError> {
        let mut tokens = raw.split(';');
        let head = tokens.next().unwrap_or_default();
        let policy = Policy::parse(head).ok_or_else(|| RuleParseError::UnknownPolicy(head.to_string()))?;

        let mut exact_list = Vec::new();
        let mut exact_set = HashSet::new();
        let mut moduli = Vec::new();

        for token in tokens.map(str::trim).filter(|t| !t.is_empty()) {
            if let Some(digits) = token.strip_prefix('%') {
                let modulus = digits
                    .parse::<u64>()
                    .ok()
                    .filter(|m| *m > 0)
                    .ok_or_else(|| RuleParseError::InvalidModulo(token.to_string()))?;
                if !moduli.contains(&modulus) {
                    moduli.push(modulus);
                }
            } else if exact_set.insert(token.to_string()) {
                exact_list.push(token.to_string());
            }
        }

        Ok(Self {
            key: key.into(),
            policy,
            exact_list,
            exact_set,
            moduli,
        })
    }

    /// Exact-match identifiers in declaration order.
    pub fn exact_list(&self) -> &[String] {
        &self.exact_list
    }

    /// Modulo divisors in declaration order.
    pub fn moduli(&self) -> &[u64] {
        &self.moduli
    }

    /// True when any clause selects `subject`. Exact matches are checked first.
    pub fn matches(&self, subject: Subject<'_>) -> bool {
        match subject {
            Subject::Text(s) => {
                if self.exact_set.contains(s) {
                    return true;
                }
                if self.moduli.is_empty() {
                    return false;
                }
                let hash = stable_hash(s);
                self.moduli.iter().any(|m| hash % m == 0)
            }
            Subject::Id(id) => {
                if !self.exact_set.is_empty() && self.exact_set.contains(&id.to_string()) {
                    return true;
                }
                let magnitude = id.unsigned_abs();
                self.moduli.iter().any(|m| magnitude % m == 0)
            }
            Subject::Unsigned(id) => {
                if !self.exact_set.is_empty() && self.exact_set.contains(&id.to_string()) {
                    return true;
                }
                self.moduli.iter().any(|m| id % m == 0)
            }
        }
    }

    /// Decide for `subject`: a matching clause inverts the policy.
    pub fn is_allowed(&self, subject: Subject<'_>) -> bool {
        match self.policy {
            Policy::Allow => !self.matches(subject),
            Policy::Deny => self.matches(subject),
        }
    }
}
