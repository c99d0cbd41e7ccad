//! Title -> category extraction for the offline partitioner.
//!
//! Two tiers, strictly ordered: the structured title pattern
//! `"<org> <category>(<date>..."` first, then an ordered keyword table.
//! Both tiers normalize by removing whitespace so one logical category
//! never splits across two partitions.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SorterError};

/// Label for titles that match neither tier
pub const UNCATEGORIZED: &str = "기타";

/// Keyword rule choosing between sub-categories of one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubRule {
    pub keywords: Vec<String>,
    pub label: String,
}

/// Fallback rule: any keyword present selects `label`, unless a sub-rule
/// matches first, in which case the sub-rule's label wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub keywords: Vec<String>,
    pub label: String,
    #[serde(default)]
    pub sub_rules: Vec<SubRule>,
}

impl CategoryRule {
    fn simple(keywords: &[&str], label: &str) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            label: label.to_string(),
            sub_rules: Vec::new(),
        }
    }

    /// The worship-service table used by the channel this tool was built for
    pub fn default_table() -> Vec<CategoryRule> {
        let sub = |keywords: &[&str], label: &str| SubRule {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            label: label.to_string(),
        };

        vec![
            Self::simple(&["새벽"], "새벽예배"),
            Self::simple(&["수요"], "수요예배"),
            Self::simple(&["금요", "철야"], "금요철야"),
            CategoryRule {
                keywords: vec!["주일".to_string()],
                label: "주일예배_기타".to_string(),
                sub_rules: vec![
                    sub(&["1부"], "주일1부예배"),
                    sub(&["2부", "2시"], "주일2부예배"),
                    sub(&["3부"], "주일3부예배"),
                ],
            },
            Self::simple(&["청년"], "청년부예배"),
            Self::simple(&["특송", "찬양", "워십"], "찬양_특송"),
        ]
    }
}

/// Remove every whitespace character
pub fn normalize_category(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

fn contains_any(haystack: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .map(|k| normalize_category(k))
        .any(|k| !k.is_empty() && haystack.contains(&k))
}

/// Two-tier category extractor
#[derive(Debug, Clone)]
pub struct CategoryExtractor {
    pattern: Regex,
    rules: Vec<CategoryRule>,
}

impl CategoryExtractor {
    pub fn new(organization_name: &str, rules: Vec<CategoryRule>) -> Result<Self> {
        let organization_name = organization_name.trim();
        if organization_name.is_empty() {
            return Err(SorterError::Config("organization name must not be empty".to_string()));
        }

        let pattern = Regex::new(&format!(r"{}\s+(.+?)\s*\(", regex::escape(organization_name)))
            .map_err(|e| SorterError::Config(format!("invalid title pattern: {}", e)))?;

        Ok(Self { pattern, rules })
    }

    /// Category from the structured `<org> <category>(` pattern, if present
    pub fn structured_category(&self, title: &str) -> Option<String> {
        let captured = self.pattern.captures(title)?.get(1)?.as_str();
        let category = normalize_category(captured);
        (!category.is_empty()).then_some(category)
    }

    /// Category from the ordered keyword table, if any rule fires
    pub fn keyword_category(&self, title: &str) -> Option<String> {
        let title = normalize_category(title);

        self.rules
            .iter()
            .find(|rule| contains_any(&title, &rule.keywords))
            .map(|rule| {
                rule.sub_rules
                    .iter()
                    .find(|sub| contains_any(&title, &sub.keywords))
                    .map(|sub| sub.label.clone())
                    .unwrap_or_else(|| rule.label.clone())
            })
            .map(|label| normalize_category(&label))
    }

    /// Category for a title; never empty, `기타` when nothing applies
    pub fn extract(&self, title: &str) -> String {
        self.structured_category(title)
            .or_else(|| self.keyword_category(title))
            .unwrap_or_else(|| UNCATEGORIZED.to_string())
    }
}
