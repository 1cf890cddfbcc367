//! Domain errors raised while reading the game state and recording results.
//!
//! Everything else (window gone, OCR engine failure, I/O) travels as a plain
//! `anyhow::Error`. The controller downcasts to [`MatchupError`] to decide
//! whether a failure is a recognition gap it can retry on the next poll.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchupError {
    /// The turn counter region held no digits this poll.
    #[error("no turn number in recognized text {0:?}")]
    TurnNotRecognized(String),

    /// A classifier expected exactly one residual token.
    #[error("expected exactly one {what} token, found {tokens:?}")]
    AmbiguousResult {
        what: &'static str,
        tokens: Vec<String>,
    },

    /// The recognized winner does not identify exactly one exported player.
    #[error("recognized winner '{adjective}' matched {matches} exported players")]
    InconsistentState { adjective: String, matches: usize },

    /// The export directory did not hold exactly one file when read.
    #[error("export directory {} holds {count} files, expected exactly one", dir.display())]
    ExportFileCount { dir: PathBuf, count: usize },

    /// The results log already exists with a different column layout.
    #[error("results log {} has header {found:?}, expected {expected:?}", path.display())]
    LogHeaderMismatch {
        path: PathBuf,
        found: String,
        expected: &'static str,
    },
}

impl MatchupError {
    /// True for failures that only mean "no usable signal this poll".
    pub fn is_recognition_gap(&self) -> bool {
        matches!(
            self,
            MatchupError::TurnNotRecognized(_) | MatchupError::AmbiguousResult { .. }
        )
    }
}
