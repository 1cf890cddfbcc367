//! Text recognition over captured screen regions.
//!
//! The engine itself is a black box behind [`TextRecognizer`]; everything the
//! rest of the crate sees is a [`RecognizedTokens`] value.

pub mod engine;
pub mod preprocess;
pub mod setup;

pub use engine::TesseractRecognizer;
pub use setup::ensure_tesseract;

use anyhow::Result;
use image::RgbaImage;

/// Turns a raster image into normalized text tokens.
///
/// Constructed once at startup and handed to whoever needs to read the screen.
pub trait TextRecognizer {
    fn recognize(&self, image: &RgbaImage) -> Result<RecognizedTokens>;
}

/// Lower-cased, trimmed words from one capture.
///
/// Every word is kept in reading order so digit runs split by the engine can
/// be joined back together. The keyword queries treat the words as a set and
/// never depend on order or repetition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecognizedTokens {
    tokens: Vec<String>,
}

impl RecognizedTokens {
    /// Normalizes raw engine output.
    pub fn from_raw<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens = raw
            .into_iter()
            .map(|word| word.as_ref().trim().to_lowercase())
            .filter(|word| !word.is_empty())
            .collect();
        Self { tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.tokens.iter().any(|t| t == keyword)
    }

    /// True if every keyword is present, in any order.
    pub fn contains_all(&self, keywords: &[&str]) -> bool {
        keywords.iter().all(|k| self.contains(k))
    }

    /// Distinct tokens other than `keyword`, in order of first appearance.
    pub fn without(&self, keyword: &str) -> Vec<String> {
        let mut rest: Vec<String> = Vec::new();
        for token in self.tokens.iter().filter(|t| *t != keyword) {
            if !rest.contains(token) {
                rest.push(token.clone());
            }
        }
        rest
    }

    /// All tokens joined together in reading order.
    pub fn concat(&self) -> String {
        self.tokens.concat()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_normalizes() {
        let tokens = RecognizedTokens::from_raw(["  World", "CONGRESS ", "", "   "]);
        assert_eq!(tokens.as_slice(), &["world".to_string(), "congress".to_string()]);
    }

    #[test]
    fn test_contains_all_ignores_order() {
        let tokens = RecognizedTokens::from_raw(["session", "of", "special", "the"]);
        assert!(tokens.contains_all(&["special", "session"]));
        assert!(!tokens.contains_all(&["special", "session", "completei"]));
    }

    #[test]
    fn test_without_and_concat() {
        let tokens = RecognizedTokens::from_raw(["roman", "empire"]);
        assert_eq!(tokens.without("empire"), vec!["roman".to_string()]);

        let repeated = RecognizedTokens::from_raw(["science", "Science", "victory"]);
        assert_eq!(repeated.without("victory"), vec!["science".to_string()]);

        // Repeated digits survive so split numbers join back up
        assert_eq!(RecognizedTokens::from_raw(["turn", "1", "1"]).concat(), "turn11");
    }
}
