//! Fuzzy matching over task fields.
//!
//! Each field is scored against the query in `[0, 1]`:
//!
//! - a contiguous substring match scores exactly `1.0`
//! - otherwise the query is matched as a subsequence, left to right,
//!   greedily; an incomplete subsequence scores `0`
//! - a complete subsequence scores the mean of coverage (query length over
//!   text length), consecutiveness (longest run over query length, squared)
//!   and position (`1 - first match index / text length`)
//!
//! An item's score is the sum of its field scores divided by the number of
//! fields searched. Match spans are half-open `(start, end)` ranges of char
//! indices into the normalized field text.

use std::cmp::Ordering;

use taskdeck_core::{SearchConfig, Task};

/// Half-open span of matched char indices.
pub type MatchSpan = (usize, usize);

/// Matching behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyOptions {
    /// Results scoring below this are dropped
    pub threshold: f64,
    pub ignore_case: bool,
    /// Strip all whitespace from query and text before matching
    pub ignore_whitespace: bool,
    /// Normalized queries shorter than this match nothing
    pub min_match_length: usize,
}

impl Default for FuzzyOptions {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for FuzzyOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            threshold: config.threshold,
            ignore_case: config.ignore_case,
            ignore_whitespace: config.ignore_whitespace,
            min_match_length: config.min_match_length,
        }
    }
}

/// Score and spans for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch {
    pub field: String,
    pub score: f64,
    pub spans: Vec<MatchSpan>,
}

/// One ranked item.
#[derive(Debug, Clone)]
pub struct SearchResult<'a, T> {
    pub item: &'a T,
    pub score: f64,
    /// Fields that scored above zero
    pub matches: Vec<FieldMatch>,
}

impl<T> SearchResult<'_, T> {
    /// Spans matched in `field`, if it matched.
    pub fn spans_for(&self, field: &str) -> &[MatchSpan] {
        self.matches
            .iter()
            .find(|m| m.field == field)
            .map(|m| m.spans.as_slice())
            .unwrap_or_default()
    }
}

/// Types exposing named text fields to the matcher.
pub trait Searchable {
    fn field_text(&self, field: &str) -> Option<String>;
}

impl Searchable for Task {
    fn field_text(&self, field: &str) -> Option<String> {
        match field {
            "id" => Some(self.id.to_string()),
            "title" => Some(self.title.clone()),
            "description" => Some(self.description.clone()),
            "tags" => Some(self.tags_joined()),
            "assignee" => self.assignee.clone(),
            "status" => Some(self.status.label().to_string()),
            "priority" => Some(self.priority.label().to_string()),
            _ => None,
        }
    }
}

type Extractor<T> = Box<dyn Fn(&T) -> Option<String> + Send + Sync>;

/// A field to search: a name plus how to read its text.
pub struct SearchField<T> {
    name: String,
    extract: Extractor<T>,
}

impl<T> SearchField<T> {
    /// A field whose text is computed by `extract`.
    pub fn computed<F>(name: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&T) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            extract: Box::new(extract),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn text(&self, item: &T) -> Option<String> {
        (self.extract)(item)
    }
}

impl<T: Searchable + 'static> SearchField<T> {
    /// A field read through [`Searchable::field_text`].
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        let key = name.clone();
        Self {
            name,
            extract: Box::new(move |item: &T| item.field_text(&key)),
        }
    }
}

/// Fields the viewer searches tasks by.
pub fn task_search_fields() -> Vec<SearchField<Task>> {
    ["title", "description", "tags", "assignee"]
        .into_iter()
        .map(SearchField::named)
        .collect()
}

/// Fuzzy matcher.
#[derive(Debug, Clone, Default)]
pub struct FuzzySearch {
    options: FuzzyOptions,
}

impl FuzzySearch {
    pub fn new(options: FuzzyOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FuzzyOptions {
        &self.options
    }

    /// Rank `items` against `query`, best first. Equal scores keep input order.
    pub fn search<'a, T>(
        &self,
        items: &'a [T],
        query: &str,
        fields: &[SearchField<T>],
    ) -> Vec<SearchResult<'a, T>> {
        let query = self.normalize(query);
        if fields.is_empty() || query.is_empty() || query.len() < self.options.min_match_length {
            return Vec::new();
        }

        let mut results: Vec<SearchResult<'a, T>> = items
            .iter()
            .filter_map(|item| {
                let mut total = 0.0;
                let mut matches = Vec::new();
                for field in fields {
                    let Some(text) = field.text(item) else {
                        continue;
                    };
                    let (score, spans) = self.score_normalized(&query, &self.normalize(&text));
                    if score > 0.0 {
                        total += score;
                        matches.push(FieldMatch {
                            field: field.name.clone(),
                            score,
                            spans,
                        });
                    }
                }
                let score = total / fields.len() as f64;
                (score > 0.0 && score >= self.options.threshold).then_some(SearchResult {
                    item,
                    score,
                    matches,
                })
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        results
    }

    /// Score a single piece of text.
    pub fn score(&self, query: &str, text: &str) -> (f64, Vec<MatchSpan>) {
        let query = self.normalize(query);
        if query.is_empty() || query.len() < self.options.min_match_length {
            return (0.0, Vec::new());
        }
        self.score_normalized(&query, &self.normalize(text))
    }

    fn normalize(&self, text: &str) -> Vec<char> {
        text.chars()
            .filter(|c| !(self.options.ignore_whitespace && c.is_whitespace()))
            .flat_map(|c| {
                if self.options.ignore_case {
                    c.to_lowercase().collect()
                } else {
                    vec![c]
                }
            })
            .collect()
    }

    fn score_normalized(&self, query: &[char], text: &[char]) -> (f64, Vec<MatchSpan>) {
        if query.is_empty() || text.len() < query.len() {
            return (0.0, Vec::new());
        }

        if let Some(start) = text.windows(query.len()).position(|w| w == query) {
            return (1.0, vec![(start, start + query.len())]);
        }

        let mut spans = Vec::new();
        let mut matched = 0;
        let mut run_start: Option<usize> = None;
        for (i, &c) in text.iter().enumerate() {
            if c == query[matched] {
                run_start.get_or_insert(i);
                matched += 1;
                if matched == query.len() {
                    if let Some(start) = run_start.take() {
                        spans.push((start, i + 1));
                    }
                    break;
                }
            } else if let Some(start) = run_start.take() {
                spans.push((start, i));
            }
        }

        if matched < query.len() {
            return (0.0, Vec::new());
        }

        let query_len = query.len() as f64;
        let coverage = query_len / text.len() as f64;
        let longest = spans.iter().map(|(s, e)| e - s).max().unwrap_or(0) as f64;
        let consecutive = (longest / query_len).powi(2);
        let first = spans.first().map(|(s, _)| *s).unwrap_or(0) as f64;
        let position = 1.0 - first / text.len() as f64;

        ((coverage + consecutive + position) / 3.0, spans)
    }
}
