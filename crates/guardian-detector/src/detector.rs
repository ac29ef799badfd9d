//! The detection engine itself.

use crate::rules::{DetectionRule, RuleCatalog, Severity};
use tracing::debug;

/// Outcome of analyzing one message against the catalog.
///
/// Created per analyzed message and consumed immediately by the interaction
/// flow; never persisted as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    /// The rule that produced the match.
    pub rule: DetectionRule,

    /// The matching slice of the original message, original casing preserved.
    pub matched_span: String,

    /// Severity derived from the rule's category.
    pub severity: Severity,

    /// User-facing guidance; never used for control flow.
    pub suggestion: String,
}

impl DetectionResult {
    fn new(rule: DetectionRule, matched_span: String) -> Self {
        let severity = rule.severity();
        let suggestion = rule.category.suggestion().to_string();
        Self {
            rule,
            matched_span,
            severity,
            suggestion,
        }
    }

    /// Compact summary for the pending-interaction record and logs.
    pub fn summary(&self) -> String {
        format!(
            "{} ({}): \"{}\"",
            self.severity.description(),
            self.rule.category,
            self.matched_span
        )
    }
}

/// Scans free text against a loaded rule catalog.
///
/// Classification is synchronous and in-memory only; there are no suspend
/// points here. One detector instance is constructed at process start and
/// shared by reference.
#[derive(Debug, Clone, Default)]
pub struct Detector {
    catalog: RuleCatalog,
}

impl Detector {
    /// Create a detector over a loaded catalog.
    pub fn new(catalog: RuleCatalog) -> Self {
        Self { catalog }
    }

    /// The catalog this detector runs against.
    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    /// Analyze a message, returning the most severe match or `None`.
    ///
    /// Matching is a case-insensitive substring search of every rule keyword.
    /// Among multiple matches the highest severity wins; ties break toward the
    /// earliest rule in catalog order. An empty catalog never flags.
    pub fn analyze(&self, message: &str) -> Option<DetectionResult> {
        let lowered = message.to_lowercase();

        let mut best: Option<(usize, &DetectionRule)> = None;
        for rule in self.catalog.rules() {
            let keyword = rule.keyword.to_lowercase();
            if keyword.is_empty() {
                continue;
            }
            if let Some(start) = lowered.find(&keyword) {
                // max_by semantics with first-wins tiebreak: only strictly
                // higher severity replaces the current best.
                let replace = match best {
                    Some((_, held)) => rule.severity() > held.severity(),
                    None => true,
                };
                if replace {
                    best = Some((start, rule));
                }
            }
        }

        let (start, rule) = best?;
        let keyword_len = rule.keyword.len();
        // Byte offsets from the lowercased haystack are only safe on the
        // original string when lowercasing did not change byte lengths.
        let matched_span = message
            .get(start..start + keyword_len)
            .unwrap_or(&rule.keyword)
            .to_string();

        let result = DetectionResult::new(rule.clone(), matched_span);
        debug!(
            severity = ?result.severity,
            category = %result.rule.category,
            "message flagged"
        );
        Some(result)
    }

    /// True if detection is effectively disabled (no rules loaded).
    pub fn is_disabled(&self) -> bool {
        self.catalog.is_empty()
    }
}
