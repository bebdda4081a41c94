//! Bio text normalization
//!
//! Scraped profile bios arrive with HTML entities, mis-decoded UTF-8,
//! emoji, stylised "fancy font" letters and stray control characters.
//! [`TextNormalizer`] folds all of that into one canonical form that the
//! language and location classifiers consume.

use htmlentity::entity::{decode, ICodedDataTrait};
use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

/// Characters kept by symbol stripping: letters, numbers, punctuation,
/// separators, currency and whitespace, all within the BMP.
static DISALLOWED_REGEX: OnceLock<Regex> = OnceLock::new();
static WHITESPACE_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_disallowed_regex() -> &'static Regex {
    DISALLOWED_REGEX.get_or_init(|| {
        Regex::new(r"[^\p{L}\p{N}\p{P}\p{Z}\p{Sc}\s]|[\x{10000}-\x{10FFFF}]")
            .expect("Failed to compile symbol regex")
    })
}

fn get_whitespace_regex() -> &'static Regex {
    WHITESPACE_REGEX.get_or_init(|| {
        Regex::new(r"\s+").expect("Failed to compile whitespace regex")
    })
}

/// Text normalization configuration
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    /// Decode HTML character entities (`&amp;`, `&#233;`, ...)
    pub decode_entities: bool,
    /// Re-decode UTF-8 that was read as Windows-1252
    pub repair_mojibake: bool,
    /// NFKC-normalize, then drop emoji, pictographs and control characters
    pub strip_symbols: bool,
    /// Collapse whitespace runs and trim
    pub collapse_whitespace: bool,
}

impl TextNormalizer {
    /// Create a new text normalizer with custom settings
    pub fn new(
        decode_entities: bool,
        repair_mojibake: bool,
        strip_symbols: bool,
        collapse_whitespace: bool,
    ) -> Self {
        Self {
            decode_entities,
            repair_mojibake,
            strip_symbols,
            collapse_whitespace,
        }
    }

    /// Full cleaning used for follower bios.
    pub fn bio() -> Self {
        Self::new(true, true, true, true)
    }

    /// Entity decoding and whitespace only; emoji and fonts are preserved.
    pub fn conservative() -> Self {
        Self::new(true, false, false, true)
    }

    /// Normalize text according to configuration
    ///
    /// Steps run in this order:
    /// 1. HTML entity decoding
    /// 2. Mojibake repair
    /// 3. NFKC + symbol stripping
    /// 4. Whitespace collapsing
    ///
    /// The sequence is repeated until the output stops changing, which
    /// unwraps double-escaped entities such as `&amp;amp;` and keeps the
    /// function idempotent.
    pub fn normalize(&self, text: &str) -> String {
        let mut current = self.normalize_once(text);
        // A productive pass after the first consumes at least one entity or
        // mojibake sequence, so the input length bounds the passes needed.
        for _ in 0..text.len() {
            let next = self.normalize_once(&current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    /// Normalize an optional field.
    ///
    /// Absent input and input that normalizes to nothing both yield `None`,
    /// so callers never have to tell an empty string apart from a missing one.
    pub fn normalize_field(&self, text: Option<&str>) -> Option<String> {
        let normalized = self.normalize(text?);
        if normalized.is_empty() {
            None
        } else {
            Some(normalized)
        }
    }

    fn normalize_once(&self, text: &str) -> String {
        let mut result = text.to_string();

        if self.decode_entities && result.contains('&') {
            if let Ok(decoded) = decode(result.as_bytes()).to_string() {
                result = decoded;
            }
        }

        if self.repair_mojibake && !result.is_ascii() {
            result = repair_mojibake(&result);
        }

        if self.strip_symbols {
            result = result.nfkc().collect::<String>();
            result = get_disallowed_regex().replace_all(&result, "").into_owned();
        }

        if self.collapse_whitespace {
            result = get_whitespace_regex()
                .replace_all(&result, " ")
                .trim()
                .to_string();
        }

        result
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::bio()
    }
}

/// Repair space-separated tokens that were UTF-8 decoded as Windows-1252.
///
/// A token is rewritten only when every character maps back to a single
/// byte and the resulting bytes are valid UTF-8 that differs from the input.
pub fn repair_mojibake(text: &str) -> String {
    text.split(' ')
        .map(|token| repair_token(token).unwrap_or_else(|| token.to_string()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn repair_token(token: &str) -> Option<String> {
    if token.is_ascii() {
        return None;
    }

    let bytes = token
        .chars()
        .map(cp1252_byte)
        .collect::<Option<Vec<u8>>>()?;

    let repaired = String::from_utf8(bytes).ok()?;
    if repaired == token {
        None
    } else {
        Some(repaired)
    }
}

/// Map a character to the Windows-1252 byte that would have produced it.
fn cp1252_byte(c: char) -> Option<u8> {
    let byte = match c {
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        c if (c as u32) <= 0xFF => c as u32 as u8,
        _ => return None,
    };
    Some(byte)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_entities() {
        let normalizer = TextNormalizer::bio();
        assert_eq!(
            normalizer.normalize("Tom &amp; Jerry, caf&eacute; &#233;t&#233;"),
            "Tom & Jerry, café été"
        );
    }

    #[test]
    fn test_double_escaped_entities() {
        let normalizer = TextNormalizer::bio();
        assert_eq!(normalizer.normalize("Rock &amp;amp; roll"), "Rock & roll");
    }

    #[test]
    fn test_mojibake_repair() {
        let normalizer = TextNormalizer::bio();
        assert_eq!(normalizer.normalize("Ã©tudiant Ã\u{a0} Paris"), "étudiant à Paris");
        assert_eq!(normalizer.normalize("Lâ€™Ã©quipe"), "L’équipe");
    }

    #[test]
    fn test_accents_are_not_treated_as_mojibake() {
        let normalizer = TextNormalizer::bio();
        let text = "Ça va très bien, œuvre à Montréal";
        assert_eq!(normalizer.normalize(text), text);
    }

    #[test]
    fn test_emoji_removed() {
        let normalizer = TextNormalizer::bio();
        assert_eq!(normalizer.normalize("Fan de foot ⚽ 🇫🇷 et de ciné 🎬"), "Fan de foot et de ciné");
        assert_eq!(normalizer.normalize("❤️ Lyon"), "Lyon");
    }

    #[test]
    fn test_fancy_fonts_folded() {
        let normalizer = TextNormalizer::bio();
        // Mathematical bold letters fold back to ASCII under NFKC
        assert_eq!(normalizer.normalize("𝐁𝐨𝐧𝐣𝐨𝐮𝐫"), "Bonjour");
    }

    #[test]
    fn test_currency_and_guillemets_kept() {
        let normalizer = TextNormalizer::bio();
        assert_eq!(normalizer.normalize("« Prix : 10 € »"), "« Prix : 10 € »");
    }

    #[test]
    fn test_control_characters_and_whitespace() {
        let normalizer = TextNormalizer::bio();
        assert_eq!(
            normalizer.normalize("  Journaliste\n\tsportif\u{0007}   -  Paris  "),
            "Journaliste sportif - Paris"
        );
    }

    #[test]
    fn test_conservative_keeps_emoji() {
        let normalizer = TextNormalizer::conservative();
        assert_eq!(normalizer.normalize("Salut &amp;  👋"), "Salut & 👋");
    }

    #[test]
    fn test_normalize_field_absent_and_empty() {
        let normalizer = TextNormalizer::bio();
        assert_eq!(normalizer.normalize_field(None), None);
        assert_eq!(normalizer.normalize_field(Some("   ")), None);
        assert_eq!(normalizer.normalize_field(Some("🎉🎉")), None);
        assert_eq!(
            normalizer.normalize_field(Some(" Bonjour ")),
            Some("Bonjour".to_string())
        );
    }

    #[test]
    fn test_deeply_nested_entities() {
        let normalizer = TextNormalizer::bio();
        let once = normalizer.normalize("a &amp;amp;amp;amp;amp;amp;amp;amp;lt;3 b");
        assert_eq!(once, "a 3 b");
        assert_eq!(normalizer.normalize(&once), once);

        let nested = format!("Rock &{} roll", "amp;".repeat(12));
        assert_eq!(normalizer.normalize(&nested), "Rock & roll");
    }

    #[test]
    fn test_normalization_idempotent() {
        let normalizer = TextNormalizer::bio();
        let samples = [
            "Hello, WORLD!!!",
            "Ã©tudiant &amp;amp; prof 👩‍🏫",
            "𝓟𝓪𝓻𝓲𝓼 ✨ &lt;3",
            "\u{feff}Bio\u{200d}\u{0000}  vide ",
            "Lâ€™Ã©quipe de France 🇫🇷 &#x26;",
            "",
        ];

        for text in samples {
            let once = normalizer.normalize(text);
            let twice = normalizer.normalize(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", text);
        }
    }

    #[test]
    fn test_repair_mojibake_leaves_ascii() {
        assert_eq!(repair_mojibake("plain ascii text"), "plain ascii text");
    }
}
