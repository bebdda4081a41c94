//! Follower, marker and edge records

use crate::identity::{Id, IdColumn, Identified};
use markerprep_filters::language::LanguageGuess;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A follower account with its bio and activity counts.
///
/// The last four fields are derived by the annotation stages and are absent
/// on freshly loaded records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowerRecord {
    pub follower_id: Id,
    #[serde(default, alias = "bio")]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, alias = "follower_count", alias = "followers_count", deserialize_with = "lenient_count")]
    pub followers: Option<u64>,
    #[serde(default, alias = "tweet_count", alias = "tweets_count", deserialize_with = "lenient_count")]
    pub tweets: Option<u64>,
    #[serde(default, alias = "friend_count", alias = "friends_count", deserialize_with = "lenient_count")]
    pub friends: Option<u64>,
    #[serde(default, alias = "like_count", alias = "likes_count", deserialize_with = "lenient_count")]
    pub likes: Option<u64>,
    #[serde(default, alias = "list_count", alias = "lists_count", deserialize_with = "lenient_count")]
    pub lists: Option<u64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub timestamp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_cleantext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_target_country: Option<bool>,
}

impl FollowerRecord {
    pub fn new(follower_id: impl Into<Id>) -> Self {
        Self {
            follower_id: follower_id.into(),
            description: None,
            location: None,
            followers: None,
            tweets: None,
            friends: None,
            likes: None,
            lists: None,
            timestamp: None,
            description_cleantext: None,
            language: None,
            language_confidence: None,
            in_target_country: None,
        }
    }

    /// Store a language guess in the flat output columns.
    pub fn set_language(&mut self, guess: &LanguageGuess) {
        self.language = Some(guess.code().to_string());
        self.language_confidence = guess.confidence();
    }

    /// Language guess from the flat columns; unclassified records are
    /// undetermined.
    pub fn language_guess(&self) -> LanguageGuess {
        match (&self.language, self.language_confidence) {
            (Some(code), Some(confidence)) => LanguageGuess::detected(code.clone(), confidence),
            _ => LanguageGuess::Undetermined,
        }
    }
}

impl Identified for FollowerRecord {
    const ID_COLUMNS: &'static [IdColumn] = &[IdColumn::FollowerId];

    fn identity(&self, column: IdColumn) -> Option<&Id> {
        match column {
            IdColumn::FollowerId => Some(&self.follower_id),
            IdColumn::MarkerId => None,
        }
    }
}

/// An organisational account being followed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerRecord {
    pub marker_id: Id,
    #[serde(default, alias = "display_name")]
    pub twitter_name: Option<String>,
    #[serde(default, rename = "type", alias = "category")]
    pub category: Option<String>,
    #[serde(default, alias = "follower_count", alias = "followers_count", deserialize_with = "lenient_count")]
    pub followers: Option<u64>,
}

impl MarkerRecord {
    pub fn new(marker_id: impl Into<Id>) -> Self {
        Self {
            marker_id: marker_id.into(),
            twitter_name: None,
            category: None,
            followers: None,
        }
    }
}

impl Identified for MarkerRecord {
    const ID_COLUMNS: &'static [IdColumn] = &[IdColumn::MarkerId];

    fn identity(&self, column: IdColumn) -> Option<&Id> {
        match column {
            IdColumn::MarkerId => Some(&self.marker_id),
            IdColumn::FollowerId => None,
        }
    }
}

/// A follower "follows" a marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub marker_id: Id,
    pub follower_id: Id,
}

impl Edge {
    pub fn new(marker_id: impl Into<Id>, follower_id: impl Into<Id>) -> Self {
        Self {
            marker_id: marker_id.into(),
            follower_id: follower_id.into(),
        }
    }
}

impl Identified for Edge {
    const ID_COLUMNS: &'static [IdColumn] = &[IdColumn::MarkerId, IdColumn::FollowerId];

    fn identity(&self, column: IdColumn) -> Option<&Id> {
        match column {
            IdColumn::MarkerId => Some(&self.marker_id),
            IdColumn::FollowerId => Some(&self.follower_id),
        }
    }
}

/// Final edge row with marker metadata attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEdge {
    pub marker_id: Id,
    pub follower_id: Id,
    pub twitter_name: Option<String>,
    #[serde(rename = "type")]
    pub category: Option<String>,
    #[serde(rename = "type2")]
    pub coarse_category: Option<String>,
    /// The marker's own global follower count
    pub marker_followers: Option<u64>,
    /// Distinct followers of the marker within the final edge list
    pub retained_followers: usize,
}

impl Identified for EnrichedEdge {
    const ID_COLUMNS: &'static [IdColumn] = &[IdColumn::MarkerId, IdColumn::FollowerId];

    fn identity(&self, column: IdColumn) -> Option<&Id> {
        match column {
            IdColumn::MarkerId => Some(&self.marker_id),
            IdColumn::FollowerId => Some(&self.follower_id),
        }
    }
}

/// Read a count that may be a number, a numeric string, null or junk.
///
/// Anything that is not a non-negative whole number becomes `None`.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(count_from_value))
}

fn count_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(whole_count)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole_count))
        }
        _ => None,
    }
}

fn whole_count(value: f64) -> Option<u64> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value < u64::MAX as f64 {
        Some(value as u64)
    } else {
        None
    }
}

/// Read free text that some exports store as a number (epoch timestamps).
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
