//! Record identities and identity columns

use crate::{Error, Result};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque stable key of a follower or marker.
///
/// Exports carry ids either as integers or as strings. Integral floats
/// (`1.2e3`, as produced by spreadsheet round trips) are read as integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum Id {
    Int(i64),
    Text(String),
}

impl Id {
    pub fn kind(&self) -> IdKind {
        match self {
            Id::Int(_) => IdKind::Integer,
            Id::Text(_) => IdKind::Text,
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Int(value) => write!(f, "{}", value),
            Id::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for Id {
    fn from(value: i64) -> Self {
        Id::Int(value)
    }
}

impl From<i32> for Id {
    fn from(value: i32) -> Self {
        Id::Int(i64::from(value))
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Id::Text(value.to_string())
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Id::Text(value)
    }
}

struct IdVisitor;

impl<'de> Visitor<'de> for IdVisitor {
    type Value = Id;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an integer or string identity")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Id, E> {
        Ok(Id::Int(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Id, E> {
        i64::try_from(value)
            .map(Id::Int)
            .map_err(|_| E::custom(format!("identity {} out of range", value)))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> std::result::Result<Id, E> {
        if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            Ok(Id::Int(value as i64))
        } else {
            Err(E::custom(format!("identity {} is not an integer", value)))
        }
    }

    fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Id, E> {
        Ok(Id::Text(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> std::result::Result<Id, E> {
        Ok(Id::Text(value))
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(IdVisitor)
    }
}

/// Storage type of an identity column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Integer,
    Text,
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdKind::Integer => f.write_str("integer"),
            IdKind::Text => f.write_str("text"),
        }
    }
}

/// Named identity column shared between tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdColumn {
    FollowerId,
    MarkerId,
}

impl IdColumn {
    pub fn name(self) -> &'static str {
        match self {
            IdColumn::FollowerId => "follower_id",
            IdColumn::MarkerId => "marker_id",
        }
    }
}

impl fmt::Display for IdColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IdColumn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "follower_id" => Ok(IdColumn::FollowerId),
            "marker_id" => Ok(IdColumn::MarkerId),
            other => Err(Error::UnknownColumn(other.to_string())),
        }
    }
}

/// Rows that expose one or more identity columns.
pub trait Identified {
    /// Identity columns this row type carries.
    const ID_COLUMNS: &'static [IdColumn];

    /// Value of `column`, or `None` when the row type lacks it.
    fn identity(&self, column: IdColumn) -> Option<&Id>;
}
