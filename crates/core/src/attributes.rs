//! Numeric attribute thresholds on follower records

use crate::records::FollowerRecord;
use crate::table::Table;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Numeric follower column that can be thresholded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NumericColumn {
    Followers,
    Tweets,
    Friends,
    Likes,
    Lists,
}

impl NumericColumn {
    pub fn name(self) -> &'static str {
        match self {
            NumericColumn::Followers => "followers",
            NumericColumn::Tweets => "tweets",
            NumericColumn::Friends => "friends",
            NumericColumn::Likes => "likes",
            NumericColumn::Lists => "lists",
        }
    }

    pub fn value(self, record: &FollowerRecord) -> Option<u64> {
        match self {
            NumericColumn::Followers => record.followers,
            NumericColumn::Tweets => record.tweets,
            NumericColumn::Friends => record.friends,
            NumericColumn::Likes => record.likes,
            NumericColumn::Lists => record.lists,
        }
    }
}

impl fmt::Display for NumericColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NumericColumn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "followers" | "follower_count" | "followers_count" => Ok(NumericColumn::Followers),
            "tweets" | "tweet_count" | "tweets_count" => Ok(NumericColumn::Tweets),
            "friends" | "friend_count" | "friends_count" => Ok(NumericColumn::Friends),
            "likes" | "like_count" | "likes_count" => Ok(NumericColumn::Likes),
            "lists" | "list_count" | "lists_count" => Ok(NumericColumn::Lists),
            _ => Err(Error::UnknownColumn(s.to_string())),
        }
    }
}

impl TryFrom<String> for NumericColumn {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<NumericColumn> for String {
    fn from(column: NumericColumn) -> Self {
        column.name().to_string()
    }
}

/// Inclusive lower bound on one numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttributeFilter {
    pub column: NumericColumn,
    pub min: u64,
    /// Keep rows whose value is missing instead of dropping them
    #[serde(default)]
    pub keep_missing: bool,
}

impl AttributeFilter {
    pub fn new(column: NumericColumn, min: u64) -> Self {
        Self {
            column,
            min,
            keep_missing: false,
        }
    }

    pub fn keep_missing(mut self, keep: bool) -> Self {
        self.keep_missing = keep;
        self
    }

    pub fn passes(&self, record: &FollowerRecord) -> bool {
        match self.column.value(record) {
            Some(value) => value >= self.min,
            None => self.keep_missing,
        }
    }

    /// Apply this single threshold.
    pub fn apply(&self, table: Table<FollowerRecord>) -> Table<FollowerRecord> {
        AttributeFilterSet::new(vec![*self]).apply(table)
    }
}

/// Several thresholds evaluated together in one pass over the table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeFilterSet {
    filters: Vec<AttributeFilter>,
}

impl AttributeFilterSet {
    pub fn new(filters: Vec<AttributeFilter>) -> Self {
        Self { filters }
    }

    pub fn with(mut self, filter: AttributeFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(&self) -> &[AttributeFilter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn passes(&self, record: &FollowerRecord) -> bool {
        self.filters.iter().all(|filter| filter.passes(record))
    }

    pub fn apply(&self, table: Table<FollowerRecord>) -> Table<FollowerRecord> {
        let before = table.len();
        let name = table.name().to_string();
        let rows: Vec<FollowerRecord> = table
            .into_iter()
            .filter(|record| self.passes(record))
            .collect();

        let description = self
            .filters
            .iter()
            .map(|f| format!("{} >= {}", f.column, f.min))
            .collect::<Vec<_>>()
            .join(", ");
        info!(
            "Attribute filter ({}): removed {} followers, {} left",
            description,
            before - rows.len(),
            rows.len()
        );

        Table::new(name, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Id;

    fn with_tweets(id: i64, tweets: Option<u64>) -> FollowerRecord {
        let mut record = FollowerRecord::new(id);
        record.tweets = tweets;
        record
    }

    #[test]
    fn test_tweets_scenario() {
        let table = Table::new(
            "followers",
            vec![with_tweets(1, Some(50)), with_tweets(2, Some(150))],
        );
        let filtered = AttributeFilter::new(NumericColumn::Tweets, 100).apply(table);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.rows()[0].tweets, Some(150));
    }

    #[test]
    fn test_threshold_inclusive() {
        let filter = AttributeFilter::new(NumericColumn::Tweets, 100);
        assert!(filter.passes(&with_tweets(1, Some(100))));
        assert!(!filter.passes(&with_tweets(1, Some(99))));
    }

    #[test]
    fn test_missing_values() {
        let filter = AttributeFilter::new(NumericColumn::Tweets, 0);
        assert!(!filter.passes(&with_tweets(1, None)));
        assert!(filter.keep_missing(true).passes(&with_tweets(1, None)));
    }

    #[test]
    fn test_filter_set_requires_all() {
        let set = AttributeFilterSet::default()
            .with(AttributeFilter::new(NumericColumn::Followers, 25))
            .with(AttributeFilter::new(NumericColumn::Tweets, 100));

        let mut both = with_tweets(1, Some(200));
        both.followers = Some(30);
        let mut one = with_tweets(2, Some(200));
        one.followers = Some(10);

        let filtered = set.apply(Table::new("followers", vec![both, one]));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.rows()[0].follower_id, Id::Int(1));
    }

    #[test]
    fn test_column_names() {
        assert_eq!("tweet_count".parse::<NumericColumn>().unwrap(), NumericColumn::Tweets);
        assert_eq!(" Followers ".parse::<NumericColumn>().unwrap(), NumericColumn::Followers);
        match "retweets".parse::<NumericColumn>() {
            Err(Error::UnknownColumn(name)) => assert_eq!(name, "retweets"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_count_aliases() {
        let aliases = [
            ("follower_count", NumericColumn::Followers),
            ("followers_count", NumericColumn::Followers),
            ("tweets_count", NumericColumn::Tweets),
            ("friends_count", NumericColumn::Friends),
            ("like_count", NumericColumn::Likes),
            ("lists_count", NumericColumn::Lists),
        ];
        for (name, column) in aliases {
            assert_eq!(name.parse::<NumericColumn>().unwrap(), column);
        }
        assert_eq!(String::from(NumericColumn::Followers), "followers");
    }

    #[test]
    fn test_deserialize_filters() {
        let set: AttributeFilterSet = serde_json::from_str(
            r#"[{"column": "followers", "min": 25}, {"column": "tweet_count", "min": 100, "keep_missing": true}]"#,
        )
        .unwrap();
        assert_eq!(set.filters().len(), 2);
        assert_eq!(set.filters()[1].column, NumericColumn::Tweets);
        assert!(set.filters()[1].keep_missing);

        assert!(serde_json::from_str::<AttributeFilterSet>(r#"[{"column": "bogus", "min": 1}]"#).is_err());
    }
}
