//! # Guardian Detector
//!
//! Keyword-based classification of outgoing chat text. The detector is the
//! first stage of the moderation pipeline: it scans a draft message against a
//! static rule catalog and reports the most severe match, if any.
//!
//! ## Design Notes
//!
//! - Detection is deterministic substring matching, not a model. A message is
//!   flagged iff it contains a catalog keyword, case-insensitively.
//! - When several rules match, the numerically highest severity wins; ties
//!   break toward the earliest rule in catalog order.
//! - A missing or unparseable catalog degrades the detector to "never flags".
//!   This is logged at error level but never surfaces to the caller: a broken
//!   config must not take the chat client down with it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use guardian_detector::{Detector, RuleCatalog};
//!
//! let detector = Detector::new(RuleCatalog::load("config/detection_rules.json"));
//!
//! if let Some(result) = detector.analyze("you're so stupid") {
//!     println!("flagged: {} ({:?})", result.matched_span, result.severity);
//! }
//! ```

mod detector;
mod rules;

pub use detector::{DetectionResult, Detector};
pub use rules::{CatalogError, DetectionRule, RuleCatalog, RuleCategory, Severity};
