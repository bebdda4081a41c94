//! Text-level classifiers for follower bios
//!
//! This crate cleans free-text bio fields and classifies followers by
//! language and by self-reported location. Every classifier here is a pure
//! function over a single field; the record-level pipeline lives in
//! `markerprep-core`.

pub mod error;
pub mod language;
pub mod location;
pub mod text_preprocessing;

pub use error::{Error, Result};
pub use language::{LanguageClassifier, LanguageGuess, WhatlangClassifier};
pub use location::{Gazetteer, LocationClassifier, MatchMode};
pub use text_preprocessing::TextNormalizer;
