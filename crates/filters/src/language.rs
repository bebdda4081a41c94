//! Language detection for follower bios
//!
//! Detection sits behind the [`LanguageClassifier`] trait so the pipeline can
//! be driven by a deterministic stand-in during tests. The default
//! implementation uses whatlang.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use whatlang::{Detector, Lang};

/// Code reported for text whose language could not be determined.
pub const UNDETERMINED_CODE: &str = "unknown";

/// Outcome of classifying one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum LanguageGuess {
    Detected { code: String, confidence: f64 },
    Undetermined,
}

impl LanguageGuess {
    pub fn detected(code: impl Into<String>, confidence: f64) -> Self {
        Self::Detected {
            code: code.into(),
            confidence,
        }
    }

    /// Language code, or [`UNDETERMINED_CODE`].
    pub fn code(&self) -> &str {
        match self {
            Self::Detected { code, .. } => code,
            Self::Undetermined => UNDETERMINED_CODE,
        }
    }

    pub fn confidence(&self) -> Option<f64> {
        match self {
            Self::Detected { confidence, .. } => Some(*confidence),
            Self::Undetermined => None,
        }
    }

    pub fn is_undetermined(&self) -> bool {
        matches!(self, Self::Undetermined)
    }
}

/// A seedable language detector.
///
/// `seed` makes stochastic detectors reproducible within one run.
/// Deterministic detectors such as [`WhatlangClassifier`] ignore it.
/// Implementations must never fail: empty, very short or symbol-only text
/// is reported as [`LanguageGuess::Undetermined`].
pub trait LanguageClassifier: Send + Sync {
    fn classify(&self, text: &str, seed: u64) -> LanguageGuess;
}

/// Language classifier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageClassifierConfig {
    /// Restrict detection to these languages (ISO 639-1 or 639-3); empty = all
    pub candidate_languages: Vec<String>,
    /// Guesses below this confidence become undetermined (0.0 to 1.0)
    pub min_confidence: f64,
    /// Texts with fewer alphabetic characters are undetermined
    pub min_letters: usize,
    /// Guesses whatlang does not flag as reliable become undetermined
    pub require_reliable: bool,
}

impl Default for LanguageClassifierConfig {
    fn default() -> Self {
        Self {
            candidate_languages: Vec::new(),
            min_confidence: 0.0,
            min_letters: 3,
            require_reliable: true,
        }
    }
}

/// whatlang-backed classifier.
///
/// whatlang is deterministic, so every seed yields the same guess and runs
/// are reproducible regardless of the seed passed in.
pub struct WhatlangClassifier {
    detector: Detector,
    min_confidence: f64,
    min_letters: usize,
    require_reliable: bool,
}

impl WhatlangClassifier {
    pub fn new(config: LanguageClassifierConfig) -> Result<Self> {
        if !(0.0..=1.0).contains(&config.min_confidence) {
            return Err(Error::InvalidConfig(format!(
                "Confidence threshold must be between 0.0 and 1.0, got {}",
                config.min_confidence
            )));
        }

        let detector = if config.candidate_languages.is_empty() {
            Detector::new()
        } else {
            let allowlist = config
                .candidate_languages
                .iter()
                .map(|code| parse_language_code(code))
                .collect::<Result<Vec<_>>>()?;
            Detector::with_allowlist(allowlist)
        };
        debug!(
            "Language classifier: {} candidate languages, min confidence {}, reliable only: {} (whatlang is deterministic, the seed has no effect)",
            config.candidate_languages.len(),
            config.min_confidence,
            config.require_reliable
        );

        Ok(Self {
            detector,
            min_confidence: config.min_confidence,
            min_letters: config.min_letters,
            require_reliable: config.require_reliable,
        })
    }
}

impl Default for WhatlangClassifier {
    fn default() -> Self {
        let config = LanguageClassifierConfig::default();
        Self {
            detector: Detector::new(),
            min_confidence: config.min_confidence,
            min_letters: config.min_letters,
            require_reliable: config.require_reliable,
        }
    }
}

impl LanguageClassifier for WhatlangClassifier {
    fn classify(&self, text: &str, _seed: u64) -> LanguageGuess {
        let letters = text.chars().filter(|c| c.is_alphabetic()).count();
        if letters < self.min_letters.max(1) {
            return LanguageGuess::Undetermined;
        }

        match self.detector.detect(text) {
            Some(info)
                if info.confidence() >= self.min_confidence
                    && (!self.require_reliable || info.is_reliable()) =>
            {
                LanguageGuess::detected(language_code(info.lang()), info.confidence())
            }
            _ => LanguageGuess::Undetermined,
        }
    }
}

/// Parse language code (ISO 639-1 or 639-3)
pub fn parse_language_code(code: &str) -> Result<Lang> {
    match code.to_lowercase().as_str() {
        "eng" | "en" => Ok(Lang::Eng),
        "fra" | "fr" => Ok(Lang::Fra),
        "spa" | "es" => Ok(Lang::Spa),
        "deu" | "de" => Ok(Lang::Deu),
        "ita" | "it" => Ok(Lang::Ita),
        "por" | "pt" => Ok(Lang::Por),
        "nld" | "nl" => Ok(Lang::Nld),
        "ara" | "ar" => Ok(Lang::Ara),
        "tur" | "tr" => Ok(Lang::Tur),
        "rus" | "ru" => Ok(Lang::Rus),
        "pol" | "pl" => Ok(Lang::Pol),
        "ron" | "ro" => Ok(Lang::Ron),
        "cat" | "ca" => Ok(Lang::Cat),
        "jpn" | "ja" => Ok(Lang::Jpn),
        "zho" | "zh" => Ok(Lang::Cmn),
        "hin" | "hi" => Ok(Lang::Hin),
        "vie" | "vi" => Ok(Lang::Vie),
        "kor" | "ko" => Ok(Lang::Kor),
        "swe" | "sv" => Ok(Lang::Swe),
        "dan" | "da" => Ok(Lang::Dan),
        "fin" | "fi" => Ok(Lang::Fin),
        "nor" | "no" => Ok(Lang::Nob),
        _ => Err(Error::InvalidConfig(format!(
            "Unsupported language code: {}",
            code
        ))),
    }
}

/// Report code for a detected language: ISO 639-1 where the table above
/// has one, whatlang's ISO 639-3 code otherwise.
pub fn language_code(lang: Lang) -> &'static str {
    match lang {
        Lang::Eng => "en",
        Lang::Fra => "fr",
        Lang::Spa => "es",
        Lang::Deu => "de",
        Lang::Ita => "it",
        Lang::Por => "pt",
        Lang::Nld => "nl",
        Lang::Ara => "ar",
        Lang::Tur => "tr",
        Lang::Rus => "ru",
        Lang::Pol => "pl",
        Lang::Ron => "ro",
        Lang::Cat => "ca",
        Lang::Jpn => "ja",
        Lang::Cmn => "zh",
        Lang::Hin => "hi",
        Lang::Vie => "vi",
        Lang::Kor => "ko",
        Lang::Swe => "sv",
        Lang::Dan => "da",
        Lang::Fin => "fi",
        Lang::Nob => "no",
        other => other.code(),
    }
}

/// Canonical report code for a user-supplied language code, so `fra` and
/// `fr` select the same followers.
pub fn canonical_code(code: &str) -> String {
    parse_language_code(code)
        .map(|lang| language_code(lang).to_string())
        .unwrap_or_else(|_| code.to_lowercase())
}

/// Share of one language code in a classified collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageShare {
    pub code: String,
    pub count: usize,
    pub percent: f64,
}

/// Percentage share of each language code, most frequent first.
///
/// Undetermined guesses are counted under [`UNDETERMINED_CODE`]. Empty input
/// yields an empty summary.
pub fn language_shares<'a, I>(guesses: I) -> Vec<LanguageShare>
where
    I: IntoIterator<Item = &'a LanguageGuess>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut total = 0usize;
    for guess in guesses {
        total += 1;
        *counts.entry(guess.code().to_string()).or_insert(0) += 1;
    }

    if total == 0 {
        return Vec::new();
    }

    let mut shares: Vec<LanguageShare> = counts
        .into_iter()
        .map(|(code, count)| LanguageShare {
            code,
            count,
            percent: count as f64 / total as f64 * 100.0,
        })
        .collect();
    shares.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.code.cmp(&b.code)));
    shares
}
