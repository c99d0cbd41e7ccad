use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{Result, SorterError};

/// A single keyword rule; rules are applied in file order, first match wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub keyword: String,
}

#[derive(Debug, Deserialize)]
struct RulesFile {
    rules: Vec<Rule>,
}

/// Ordered, immutable rule list for one run
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
    case_sensitive: bool,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>, case_sensitive: bool) -> Self {
        Self { rules, case_sensitive }
    }

    /// Convenience constructor from bare keywords
    pub fn from_keywords<I, S>(keywords: I, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rules = keywords
            .into_iter()
            .map(|k| Rule { keyword: k.into() })
            .collect();
        Self::new(rules, case_sensitive)
    }

    /// Load `{"rules": [{"keyword": "..."}]}` from disk
    pub fn load(path: &Path, case_sensitive: bool) -> Result<Self> {
        if !path.exists() {
            return Err(SorterError::Config(format!(
                "rules file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let file: RulesFile = serde_json::from_str(&content).map_err(|e| {
            SorterError::Config(format!("invalid rules file {}: {}", path.display(), e))
        })?;

        if let Some(pos) = file.rules.iter().position(|r| r.keyword.trim().is_empty()) {
            return Err(SorterError::Config(format!(
                "rule #{} in {} has an empty keyword",
                pos + 1,
                path.display()
            )));
        }

        info!("📚 Loaded {} rules from {}", file.rules.len(), path.display());
        Ok(Self::new(file.rules, case_sensitive))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Substring containment honouring the case option
    pub fn contains(&self, haystack: &str, needle: &str) -> bool {
        contains(haystack, needle, self.case_sensitive)
    }
}

/// Substring test with optional Unicode lowercase folding
pub fn contains(haystack: &str, needle: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        haystack.contains(needle)
    } else {
        haystack.to_lowercase().contains(&needle.to_lowercase())
    }
}
