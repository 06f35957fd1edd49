//! Search text matching and custom search models.

use log::debug;
use nucleo_matcher::pattern::{AtomKind, CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Config, Matcher, Utf32Str};
use serde::Deserialize;
use serde::Serialize;

use super::FilterCondition;
use crate::model::RowData;

/// How search text is matched against a row's searchable fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMatch {
    /// Case-insensitive substring.
    #[default]
    Contains,
    /// Fuzzy subsequence match.
    Fuzzy,
}

/// Matches rows against a search text.
///
/// A row matches when any of the given fields matches.
///
/// # Example
///
/// ```
/// use gridkit_lib::model::Record;
/// use gridkit_lib::query::{SearchMatch, SearchMatcher};
///
/// let mut matcher = SearchMatcher::new("fo", SearchMatch::Contains);
/// let row = Record::new("1").set("Name", "Foo");
/// assert!(matcher.matches(&row, &["Name".to_string()]));
/// ```
pub struct SearchMatcher {
    needle: String,
    mode: SearchMatch,
    fuzzy: Option<(Matcher, Pattern)>,
    buf: Vec<char>,
}

impl SearchMatcher {
    pub fn new(text: &str, mode: SearchMatch) -> Self {
        let fuzzy = match mode {
            SearchMatch::Contains => None,
            SearchMatch::Fuzzy => Some((
                Matcher::new(Config::DEFAULT),
                Pattern::new(text, CaseMatching::Ignore, Normalization::Smart, AtomKind::Fuzzy),
            )),
        };
        Self {
            needle: text.to_lowercase(),
            mode,
            fuzzy,
            buf: Vec::new(),
        }
    }

    /// Whether any of `fields` on `row` matches. Empty text matches everything.
    pub fn matches(&mut self, row: &dyn RowData, fields: &[String]) -> bool {
        if self.needle.is_empty() {
            return true;
        }
        fields.iter().any(|field| {
            let value = row.field(field);
            if value.is_null() {
                return false;
            }
            let haystack = value.to_string();
            match (self.mode, self.fuzzy.as_mut()) {
                (SearchMatch::Fuzzy, Some((matcher, pattern))) => {
                    let text = Utf32Str::new(&haystack, &mut self.buf);
                    pattern.score(text, matcher).is_some()
                }
                _ => haystack.to_lowercase().contains(&self.needle),
            }
        })
    }

    /// Keeps only the rows that match.
    pub fn retain<T: RowData>(&mut self, rows: &mut Vec<T>, fields: &[String]) {
        let before = rows.len();
        rows.retain(|row| self.matches(row, fields));
        debug!("[search] '{}' kept {} of {} rows", self.needle, rows.len(), before);
    }
}

/// A custom advanced-search form.
///
/// The form's current inputs are turned into filter conditions on every
/// fetch; `reset` returns the form to its defaults.
pub trait SearchModel: Send + Sync {
    /// Conditions for the current inputs. Blank inputs yield nothing.
    fn conditions(&self) -> Vec<FilterCondition>;

    /// Restores the form's defaults.
    fn reset(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;
    use crate::query::FilterOperator;

    fn fields() -> Vec<String> {
        vec!["Name".to_string(), "Address".to_string()]
    }

    #[test]
    fn test_contains_any_field() {
        let mut matcher = SearchMatcher::new("STREET", SearchMatch::Contains);
        let row = Record::new("1").set("Name", "Foo").set("Address", "Main street 1");
        assert!(matcher.matches(&row, &fields()));
        let row = Record::new("2").set("Name", "Bar");
        assert!(!matcher.matches(&row, &fields()));
    }

    #[test]
    fn test_fuzzy() {
        let mut matcher = SearchMatcher::new("mst", SearchMatch::Fuzzy);
        let row = Record::new("1").set("Address", "Main street");
        assert!(matcher.matches(&row, &fields()));
        let mut matcher = SearchMatcher::new("zzz", SearchMatch::Fuzzy);
        assert!(!matcher.matches(&row, &fields()));
    }

    #[test]
    fn test_retain() {
        let mut rows = vec![
            Record::new("1").set("Name", "Foo"),
            Record::new("2").set("Name", "Bar"),
        ];
        SearchMatcher::new("fo", SearchMatch::Contains).retain(&mut rows, &fields());
        assert_eq!(rows.len(), 1);
    }

    struct NameModel {
        name: String,
    }

    impl SearchModel for NameModel {
        fn conditions(&self) -> Vec<FilterCondition> {
            if self.name.is_empty() {
                return Vec::new();
            }
            vec![FilterCondition::new("Name", FilterOperator::Contains, self.name.clone())]
        }

        fn reset(&mut self) {
            self.name.clear();
        }
    }

    #[test]
    fn test_search_model_reset() {
        let mut model = NameModel { name: "fo".into() };
        assert_eq!(model.conditions().len(), 1);
        model.reset();
        assert!(model.conditions().is_empty());
    }
}
