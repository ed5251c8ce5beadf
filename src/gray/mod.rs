//! Gray release decisions.
//!
//! # Data Flow
//! ```text
//! is_allowed("section.key", subject)
//!     → engine.rs (memo lookup, tagged with the reload generation)
//!     → on miss: ConfigCache::get → rule.rs parse → memoize
//!     → rule.rs evaluate (policy, exact list, modulo clauses)
//! ```
//!
//! # Rule Format
//! ```text
//! allow;10000;%2;%5      everyone except 10000 and ids divisible by 2 or 5
//! deny;10000;2000;%2     nobody except 10000, 2000 and ids divisible by 2
//! ```
//!
//! # Design Decisions
//! - Clauses only ever invert the declared policy
//! - A missing or malformed value means "not allowed"
//! - The memo is dropped wholesale on every reload

pub mod engine;
pub mod rule;

pub use engine::GrayRuleEngine;
pub use rule::{stable_hash, GrayRule, Policy, RuleParseError, Subject};
