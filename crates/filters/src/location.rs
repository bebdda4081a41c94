//! Rule-based location classification
//!
//! Decides whether a self-reported profile location lies inside the target
//! country by looking for any gazetteer place name in it. Place names shared
//! with other countries ("Paris, Texas") still count as a match; no
//! disambiguation is attempted.

use crate::{Error, Result};
use aho_corasick::AhoCorasick;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// How a gazetteer name must appear in the location string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Name appears anywhere, even inside a longer word
    #[default]
    Substring,
    /// Name is bounded by non-alphanumeric characters or the string ends
    Token,
}

/// Lowercased, deduplicated place names of the target country.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gazetteer {
    names: BTreeSet<String>,
}

impl Gazetteer {
    /// Build a gazetteer from place names. Blank names are ignored.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: BTreeSet<String> = names
            .into_iter()
            .map(|name| canonical_place(name.as_ref()))
            .filter(|name| !name.is_empty())
            .collect();

        if names.is_empty() {
            return Err(Error::InvalidConfig(
                "gazetteer must contain at least one place name".to_string(),
            ));
        }

        Ok(Self { names })
    }

    /// Parse one name per line; `#` starts a comment line.
    pub fn from_lines(text: &str) -> Result<Self> {
        Self::new(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.starts_with('#')),
        )
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&canonical_place(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

fn canonical_place(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Matches location strings against a gazetteer.
pub struct LocationClassifier {
    matcher: AhoCorasick,
    patterns: Vec<String>,
    mode: MatchMode,
}

impl LocationClassifier {
    pub fn new(gazetteer: &Gazetteer, mode: MatchMode) -> Result<Self> {
        let patterns: Vec<String> = gazetteer.iter().map(str::to_string).collect();
        let matcher = AhoCorasick::new(&patterns)
            .map_err(|e| Error::InvalidConfig(format!("failed to build matcher: {}", e)))?;
        debug!(
            "Location matcher over {} place names ({:?} matching)",
            patterns.len(),
            mode
        );

        Ok(Self {
            matcher,
            patterns,
            mode,
        })
    }

    /// Whether the location denotes a place in the target country.
    ///
    /// Absent or blank locations are never in the target country.
    pub fn is_target_country(&self, location: Option<&str>) -> bool {
        self.matched_place(location).is_some()
    }

    /// The first gazetteer name found in the location, if any.
    pub fn matched_place(&self, location: Option<&str>) -> Option<&str> {
        let haystack = canonical_place(location?);
        if haystack.is_empty() {
            return None;
        }

        let found = match self.mode {
            MatchMode::Substring => self.matcher.find(&haystack),
            MatchMode::Token => self
                .matcher
                .find_overlapping_iter(&haystack)
                .find(|m| is_token_bounded(&haystack, m.start(), m.end())),
        };

        found.map(|m| self.patterns[m.pattern().as_usize()].as_str())
    }
}

fn is_token_bounded(haystack: &str, start: usize, end: usize) -> bool {
    let before = haystack[..start].chars().next_back();
    let after = haystack[end..].chars().next();
    let is_boundary = |c: Option<char>| c.map_or(true, |c| !c.is_alphanumeric());
    is_boundary(before) && is_boundary(after)
}
