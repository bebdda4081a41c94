//! Versioned fine-to-coarse marker category mapping

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maps raw marker category labels to coarse groups.
///
/// Labels absent from the mapping pass through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMap {
    #[serde(default)]
    version: String,
    #[serde(default)]
    mapping: BTreeMap<String, String>,
}

impl CategoryMap {
    pub fn new(version: impl Into<String>, mapping: BTreeMap<String, String>) -> Self {
        Self {
            version: version.into(),
            mapping,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Coarse group of `label`, if the mapping names one.
    pub fn lookup(&self, label: &str) -> Option<&str> {
        self.mapping.get(label).map(String::as_str)
    }

    /// Coarse group of `label`, or `label` itself.
    pub fn regroup<'a>(&'a self, label: &'a str) -> &'a str {
        self.lookup(label).unwrap_or(label)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.mapping.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CategoryMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            version: String::new(),
            mapping: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
