//! Game-state recognition from screen text.
//!
//! Each classifier samples one fixed region, recognizes its words and tests
//! them against a small keyword vocabulary. Matching is by set containment,
//! so OCR that splits, reorders or drops neighbouring words still classifies
//! correctly as long as the keywords survive. Misses are expected and are
//! absorbed by polling again on the next cycle.

use anyhow::{Context, Result};
use chrono::Local;
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::capture::{GameWindow, ScreenRegion};
use crate::error::MatchupError;
use crate::ocr::{RecognizedTokens, TextRecognizer};

// Regions for a 2560x1440 window
pub const TURN_COUNTER: ScreenRegion = ScreenRegion::new("turn_counter", 2317, 35, 2377, 45);
pub const CONGRESS_BANNER: ScreenRegion = ScreenRegion::new("congress_banner", 1000, 400, 1540, 480);
pub const MATCH_OVER_BANNER: ScreenRegion =
    ScreenRegion::new("match_over_banner", 1000, 150, 1560, 260);
pub const VICTORY_TYPE: ScreenRegion = ScreenRegion::new("victory_type", 1000, 260, 1560, 330);
pub const WINNER_NAME: ScreenRegion = ScreenRegion::new("winner_name", 1000, 330, 1560, 400);

/// How "complete!" comes back from the OCR engine. Matched literally.
pub const COMPLETE_MISREAD: &str = "completei";

/// Anything that can turn a screen region into tokens.
pub trait TokenSource {
    /// Fresh tokens for `region`. Never served from a cache.
    fn read_tokens(&self, region: &ScreenRegion) -> Result<RecognizedTokens>;

    /// Saves the current pixels of `region` for later inspection.
    fn save_debug_capture(&self, _region: &ScreenRegion) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

/// Reads the live game window through the OCR engine.
pub struct ScreenReader<W, R> {
    window: W,
    recognizer: R,
    debug_dir: PathBuf,
}

impl<W: GameWindow, R: TextRecognizer> ScreenReader<W, R> {
    pub fn new(window: W, recognizer: R, debug_dir: PathBuf) -> Self {
        Self {
            window,
            recognizer,
            debug_dir,
        }
    }
}

impl<W: GameWindow, R: TextRecognizer> TokenSource for ScreenReader<W, R> {
    fn read_tokens(&self, region: &ScreenRegion) -> Result<RecognizedTokens> {
        // A window that moved or closed mid-capture just means no text this poll
        let image = match self.window.capture(region) {
            Ok(image) => image,
            Err(e) => {
                tracing::debug!("Capture of {} failed: {:#}", region.name, e);
                return Ok(RecognizedTokens::default());
            }
        };

        let tokens = self
            .recognizer
            .recognize(&image)
            .with_context(|| format!("OCR failed for {}", region.name))?;
        tracing::trace!("{}: {:?}", region.name, tokens.as_slice());
        Ok(tokens)
    }

    fn save_debug_capture(&self, region: &ScreenRegion) -> Result<Option<PathBuf>> {
        let image = self.window.capture(region)?;
        std::fs::create_dir_all(&self.debug_dir)?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = self
            .debug_dir
            .join(format!("{}_{}.png", timestamp, region.name));
        image.save(&path)?;
        Ok(Some(path))
    }
}

fn non_digits() -> &'static Regex {
    static NON_DIGITS: OnceLock<Regex> = OnceLock::new();
    NON_DIGITS.get_or_init(|| Regex::new(r"\D+").expect("static regex"))
}

/// Joins the tokens, drops everything but digits and parses the rest.
pub fn parse_turn_count(tokens: &RecognizedTokens) -> Result<u32, MatchupError> {
    let joined = tokens.concat();
    let digits = non_digits().replace_all(&joined, "");
    digits
        .parse()
        .map_err(|_| MatchupError::TurnNotRecognized(joined))
}

pub fn is_world_congress_pending(tokens: &RecognizedTokens) -> bool {
    tokens.contains_all(&["world", "congress"]) || tokens.contains_all(&["special", "session"])
}

pub fn is_world_congress_resolved(tokens: &RecognizedTokens) -> bool {
    tokens.contains_all(&["world", "congress", COMPLETE_MISREAD])
        || tokens.contains_all(&["special", "session", COMPLETE_MISREAD])
}

/// The spectator slot always sees the defeat screen when a match ends.
pub fn is_match_over(tokens: &RecognizedTokens) -> bool {
    tokens.contains("defeat")
}

/// "science victory" → "science".
pub fn parse_victory_type(tokens: &RecognizedTokens) -> Result<String, MatchupError> {
    single_residual(tokens, "victory", "victory type")
}

/// "roman empire" → "roman".
pub fn parse_winner_adjective(tokens: &RecognizedTokens) -> Result<String, MatchupError> {
    single_residual(tokens, "empire", "winner")
}

fn single_residual(
    tokens: &RecognizedTokens,
    keyword: &str,
    what: &'static str,
) -> Result<String, MatchupError> {
    let mut rest = tokens.without(keyword);
    if rest.len() != 1 {
        return Err(MatchupError::AmbiguousResult { what, tokens: rest });
    }
    Ok(rest.remove(0))
}

pub fn turn_count<S: TokenSource + ?Sized>(screen: &S) -> Result<u32> {
    Ok(parse_turn_count(&screen.read_tokens(&TURN_COUNTER)?)?)
}

pub fn world_congress_pending<S: TokenSource + ?Sized>(screen: &S) -> Result<bool> {
    Ok(is_world_congress_pending(
        &screen.read_tokens(&CONGRESS_BANNER)?,
    ))
}

pub fn world_congress_resolved<S: TokenSource + ?Sized>(screen: &S) -> Result<bool> {
    Ok(is_world_congress_resolved(
        &screen.read_tokens(&CONGRESS_BANNER)?,
    ))
}

pub fn match_over<S: TokenSource + ?Sized>(screen: &S) -> Result<bool> {
    Ok(is_match_over(&screen.read_tokens(&MATCH_OVER_BANNER)?))
}

pub fn victory_type<S: TokenSource + ?Sized>(screen: &S) -> Result<String> {
    Ok(parse_victory_type(&screen.read_tokens(&VICTORY_TYPE)?)?)
}

pub fn winner_adjective<S: TokenSource + ?Sized>(screen: &S) -> Result<String> {
    Ok(parse_winner_adjective(&screen.read_tokens(&WINNER_NAME)?)?)
}

#[cfg(test)]
pub mod testing {
    use super::TokenSource;
    use crate::capture::ScreenRegion;
    use crate::ocr::RecognizedTokens;
    use anyhow::Result;
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};

    /// Serves scripted readings per region.
    ///
    /// Each region has a queue; the last reading repeats once the queue is
    /// down to one entry. Unscripted regions read as empty.
    #[derive(Default)]
    pub struct ScriptedScreen {
        readings: RefCell<HashMap<&'static str, VecDeque<Vec<&'static str>>>>,
        reads: RefCell<HashMap<&'static str, usize>>,
    }

    impl ScriptedScreen {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn script(self, region: &ScreenRegion, readings: Vec<Vec<&'static str>>) -> Self {
            self.readings
                .borrow_mut()
                .insert(region.name, readings.into_iter().collect());
            self
        }

        pub fn reads_of(&self, region: &ScreenRegion) -> usize {
            self.reads.borrow().get(region.name).copied().unwrap_or(0)
        }
    }

    impl TokenSource for ScriptedScreen {
        fn read_tokens(&self, region: &ScreenRegion) -> Result<RecognizedTokens> {
            *self.reads.borrow_mut().entry(region.name).or_default() += 1;

            let mut readings = self.readings.borrow_mut();
            let Some(queue) = readings.get_mut(region.name) else {
                return Ok(RecognizedTokens::default());
            };
            let words = if queue.len() > 1 {
                queue.pop_front().unwrap_or_default()
            } else {
                queue.front().cloned().unwrap_or_default()
            };
            Ok(RecognizedTokens::from_raw(words))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedScreen;
    use super::*;
    use crate::capture::WindowRect;
    use image::{Rgba, RgbaImage};

    fn tokens(words: &[&str]) -> RecognizedTokens {
        RecognizedTokens::from_raw(words.iter().copied())
    }

    #[test]
    fn test_turn_count() {
        assert_eq!(parse_turn_count(&tokens(&["turn", "47"])).unwrap(), 47);
        assert_eq!(parse_turn_count(&tokens(&["turn:", "1", "2", "3"])).unwrap(), 123);
        assert_eq!(parse_turn_count(&tokens(&["t0rn", "9"])).unwrap(), 9);
    }

    #[test]
    fn test_turn_count_without_digits() {
        let err = parse_turn_count(&tokens(&["turn"])).unwrap_err();
        assert!(matches!(err, MatchupError::TurnNotRecognized(_)));
        assert!(parse_turn_count(&tokens(&[])).is_err());
    }

    #[test]
    fn test_congress_pending() {
        assert!(is_world_congress_pending(&tokens(&["world", "congress"])));
        assert!(is_world_congress_pending(&tokens(&["congress", "the", "world"])));
        assert!(is_world_congress_pending(&tokens(&["special", "session", "vote"])));

        assert!(!is_world_congress_pending(&tokens(&["world"])));
        assert!(!is_world_congress_pending(&tokens(&["world", "session"])));
        assert!(!is_world_congress_pending(&tokens(&["special", "congress"])));
        assert!(!is_world_congress_pending(&tokens(&[])));
    }

    #[test]
    fn test_congress_resolved_needs_literal_misread() {
        assert!(is_world_congress_resolved(&tokens(&["world", "congress", "completei"])));
        assert!(is_world_congress_resolved(&tokens(&["completei", "session", "special"])));

        assert!(!is_world_congress_resolved(&tokens(&["world", "congress", "complete!"])));
        assert!(!is_world_congress_resolved(&tokens(&["world", "congress", "complete"])));
        assert!(!is_world_congress_resolved(&tokens(&["world", "completei"])));
    }

    #[test]
    fn test_match_over() {
        assert!(is_match_over(&tokens(&["defeat"])));
        assert!(is_match_over(&tokens(&["Defeat", "!"])));
        assert!(!is_match_over(&tokens(&["victory"])));
    }

    #[test]
    fn test_victory_type() {
        assert_eq!(parse_victory_type(&tokens(&["science", "victory"])).unwrap(), "science");
        assert_eq!(parse_victory_type(&tokens(&["victory", "Culture"])).unwrap(), "culture");

        for words in [&["victory"][..], &["science", "domination", "victory"][..]] {
            let err = parse_victory_type(&tokens(words)).unwrap_err();
            assert!(matches!(err, MatchupError::AmbiguousResult { what: "victory type", .. }));
        }
    }

    #[test]
    fn test_winner_adjective() {
        assert_eq!(parse_winner_adjective(&tokens(&["roman", "empire"])).unwrap(), "roman");
        assert!(parse_winner_adjective(&tokens(&["empire"])).is_err());
        assert!(parse_winner_adjective(&tokens(&["the", "roman", "empire"])).is_err());
    }

    #[test]
    fn test_classifiers_read_their_regions() {
        let screen = ScriptedScreen::new()
            .script(&TURN_COUNTER, vec![vec!["turn", "12"]])
            .script(&CONGRESS_BANNER, vec![vec!["special", "session"]])
            .script(&MATCH_OVER_BANNER, vec![vec!["defeat"]])
            .script(&VICTORY_TYPE, vec![vec!["religious", "victory"]])
            .script(&WINNER_NAME, vec![vec!["greek", "empire"]]);

        assert_eq!(turn_count(&screen).unwrap(), 12);
        assert!(world_congress_pending(&screen).unwrap());
        assert!(!world_congress_resolved(&screen).unwrap());
        assert!(match_over(&screen).unwrap());
        assert_eq!(victory_type(&screen).unwrap(), "religious");
        assert_eq!(winner_adjective(&screen).unwrap(), "greek");
        assert_eq!(screen.reads_of(&CONGRESS_BANNER), 2);
    }

    #[test]
    fn test_classifier_error_downcasts() {
        let screen = ScriptedScreen::new().script(&TURN_COUNTER, vec![vec!["turn"]]);
        let err = turn_count(&screen).unwrap_err();
        assert!(err.downcast_ref::<MatchupError>().is_some());
    }

    struct ClosedWindow;

    impl GameWindow for ClosedWindow {
        fn rect(&self) -> Result<WindowRect> {
            Ok(WindowRect::default())
        }
        fn focus(&self) -> Result<()> {
            Ok(())
        }
        fn is_alive(&self) -> bool {
            false
        }
        fn capture(&self, _region: &ScreenRegion) -> Result<RgbaImage> {
            Err(anyhow::anyhow!("window closed"))
        }
    }

    struct PanickingRecognizer;

    impl TextRecognizer for PanickingRecognizer {
        fn recognize(&self, _image: &RgbaImage) -> Result<RecognizedTokens> {
            panic!("recognizer must not run without an image");
        }
    }

    #[test]
    fn test_failed_capture_reads_as_empty() {
        let reader = ScreenReader::new(ClosedWindow, PanickingRecognizer, PathBuf::from("debug"));
        assert!(reader.read_tokens(&MATCH_OVER_BANNER).unwrap().is_empty());
        assert!(!match_over(&reader).unwrap());
    }

    struct SolidWindow;

    impl GameWindow for SolidWindow {
        fn rect(&self) -> Result<WindowRect> {
            Ok(WindowRect::default())
        }
        fn focus(&self) -> Result<()> {
            Ok(())
        }
        fn is_alive(&self) -> bool {
            true
        }
        fn capture(&self, region: &ScreenRegion) -> Result<RgbaImage> {
            Ok(RgbaImage::from_pixel(
                region.width(),
                region.height(),
                Rgba([255, 255, 255, 255]),
            ))
        }
    }

    struct FixedRecognizer(&'static [&'static str]);

    impl TextRecognizer for FixedRecognizer {
        fn recognize(&self, _image: &RgbaImage) -> Result<RecognizedTokens> {
            Ok(RecognizedTokens::from_raw(self.0.iter().copied()))
        }
    }

    #[test]
    fn test_screen_reader_recognizes_capture() {
        let reader = ScreenReader::new(
            SolidWindow,
            FixedRecognizer(&["World", "Congress"]),
            PathBuf::from("debug"),
        );
        assert!(world_congress_pending(&reader).unwrap());
    }

    #[test]
    fn test_save_debug_capture() {
        let dir = tempfile::tempdir().unwrap();
        let reader = ScreenReader::new(
            SolidWindow,
            FixedRecognizer(&[]),
            dir.path().join("debug"),
        );

        let path = reader.save_debug_capture(&WINNER_NAME).unwrap().unwrap();

        assert!(path.exists());
        assert!(path.to_string_lossy().ends_with("_winner_name.png"));
        assert_eq!(image::open(&path).unwrap().width(), WINNER_NAME.width());
    }
}
