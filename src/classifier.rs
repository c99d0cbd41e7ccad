/// Title -> destination playlist classification for the live run
use tracing::warn;

use crate::playlist_index::{PlaylistIndex, ResolveOptions};
use crate::rules::RuleSet;

/// Outcome of classifying one title. A title with no destination is a
/// valid result, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    /// Destination playlist id
    pub destination: Option<String>,
    /// Keyword of the rule that produced the destination
    pub keyword: Option<String>,
    /// Keywords that matched the title but had no playlist to go to
    pub unresolved_keywords: Vec<String>,
}

impl Classification {
    pub fn is_match(&self) -> bool {
        self.destination.is_some()
    }

    /// `(destination, keyword)` pair
    pub fn as_pair(&self) -> (Option<&str>, Option<&str>) {
        (self.destination.as_deref(), self.keyword.as_deref())
    }
}

/// Classify a title against the ordered rules.
///
/// Rules are tried in declaration order. A rule whose keyword occurs in
/// the title resolves to the first playlist in `index` whose title also
/// contains the keyword. When the keyword matches but no playlist exists,
/// a warning is emitted and the next rule is tried. Pure apart from the
/// log event: identical inputs give identical results.
pub fn classify(
    title: &str,
    rules: &RuleSet,
    index: &PlaylistIndex,
    prefer_exact_title: bool,
) -> Classification {
    let options = ResolveOptions {
        case_sensitive: rules.case_sensitive(),
        prefer_exact_title,
    };
    let mut result = Classification::default();

    for rule in rules.rules() {
        if !rules.contains(title, &rule.keyword) {
            continue;
        }

        match index.resolve(&rule.keyword, options) {
            Some(playlist_id) => {
                result.destination = Some(playlist_id.to_string());
                result.keyword = Some(rule.keyword.clone());
                return result;
            }
            None => {
                warn!(
                    "Rule '{}' matched \"{}\" but no playlist title contains it",
                    rule.keyword, title
                );
                result.unresolved_keywords.push(rule.keyword.clone());
            }
        }
    }

    result
}
