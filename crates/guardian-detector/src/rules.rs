//! Rule catalog types and loading.
//!
//! The catalog is a static JSON list of `{keyword, type}` entries shipped with
//! the client. Severity is derived from the category at load time, never
//! stored in the catalog itself.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error, info};

/// Errors raised while loading a rule catalog.
///
/// Callers generally do not see these: [`RuleCatalog::load`] converts any
/// failure into an empty catalog. They are public for the CLI `rules`
/// validation path, which wants the real cause.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Catalog file could not be read.
    #[error("failed to read rule catalog: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog file is not valid JSON of the expected shape.
    #[error("failed to parse rule catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Category of harmful content a rule targets.
///
/// Catalog `type` strings parse case-insensitively. Unknown strings map to
/// `Other` rather than failing the whole load; a typo in one entry must not
/// disable detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    /// Directly offensive language.
    Offensive,
    /// Language that belittles the other party.
    Belittling,
    /// Generalizations about groups of people.
    Stereotype,
    /// Anything else the catalog wants flagged.
    Other,
}

impl<'de> Deserialize<'de> for RuleCategory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.to_lowercase().as_str() {
            "offensive" => Self::Offensive,
            "belittling" => Self::Belittling,
            "stereotype" => Self::Stereotype,
            _ => Self::Other,
        })
    }
}

impl RuleCategory {
    /// Severity derived from the category.
    pub fn severity(self) -> Severity {
        match self {
            Self::Offensive => Severity::High,
            Self::Belittling => Severity::Medium,
            Self::Stereotype | Self::Other => Severity::Low,
        }
    }

    /// User-facing guidance for a flagged message of this category.
    pub fn suggestion(self) -> &'static str {
        match self {
            Self::Offensive => "Consider expressing your thoughts in a more respectful way.",
            Self::Belittling => "Try rephrasing this to show respect for others' capabilities.",
            Self::Stereotype => "Consider avoiding generalizations about groups of people.",
            Self::Other => "Please consider if this message might be hurtful to others.",
        }
    }

    /// Catalog string for this category.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Offensive => "offensive",
            Self::Belittling => "belittling",
            Self::Stereotype => "stereotype",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity rank of a detection, low to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Mild concern.
    Low = 1,
    /// Inappropriate content.
    Medium = 2,
    /// Highly offensive.
    High = 3,
}

impl Severity {
    /// Numeric rank (1..=3). Also the strike weight of the legacy
    /// single-user penalty path.
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Strike weight for the legacy detection-only penalty path, where no
    /// receiver judgment is involved.
    pub fn strike_weight(self) -> f64 {
        f64::from(self.rank())
    }

    /// Short human description, used in detection summaries.
    pub fn description(self) -> &'static str {
        match self {
            Self::Low => "Mild concern",
            Self::Medium => "Inappropriate content",
            Self::High => "Highly offensive",
        }
    }
}

/// A single catalog entry: a keyword and the category it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionRule {
    /// Substring to match, case-insensitively.
    pub keyword: String,

    /// Category of the rule; severity and suggestion derive from this.
    #[serde(rename = "type")]
    pub category: RuleCategory,
}

impl DetectionRule {
    /// Severity derived from the rule's category.
    pub fn severity(&self) -> Severity {
        self.category.severity()
    }
}

/// An ordered, immutable set of detection rules.
///
/// Load order matters: it is the tiebreaker between equally severe matches.
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    rules: Vec<DetectionRule>,
}

impl RuleCatalog {
    /// Build a catalog from rules already in memory. Primarily for tests and
    /// embedded defaults.
    pub fn from_rules(rules: Vec<DetectionRule>) -> Self {
        Self { rules }
    }

    /// Load a catalog from a JSON file, degrading to an empty catalog on any
    /// failure. The failure is logged; an empty catalog simply never flags.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        match Self::try_load(path.as_ref()) {
            Ok(catalog) => {
                info!(rules = catalog.len(), "loaded detection rule catalog");
                catalog
            }
            Err(e) => {
                error!("rule catalog unavailable, detection disabled: {e}");
                Self::default()
            }
        }
    }

    /// Load a catalog from a JSON file, surfacing the failure.
    pub fn try_load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let data = std::fs::read(path.as_ref())?;
        let rules: Vec<DetectionRule> = serde_json::from_slice(&data)?;
        debug!(path = %path.as_ref().display(), rules = rules.len(), "parsed rule catalog");
        Ok(Self { rules })
    }

    /// Rules in load order.
    pub fn rules(&self) -> &[DetectionRule] {
        &self.rules
    }

    /// Number of loaded rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True if no rules are loaded (detection effectively disabled).
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Count of rules per category, for diagnostics.
    pub fn statistics(&self) -> std::collections::HashMap<RuleCategory, usize> {
        let mut stats = std::collections::HashMap::new();
        for rule in &self.rules {
            *stats.entry(rule.category).or_insert(0) += 1;
        }
        stats
    }
}
