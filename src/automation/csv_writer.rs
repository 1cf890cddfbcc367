//! CSV writer for match results.
//!
//! The results log is append-only: the header is written once when the file
//! is first created and every row is appended with a fresh open, so a crash
//! never loses a recorded match.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Terminator, Writer, WriterBuilder};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::automation::extract::MatchResult;
use crate::error::MatchupError;

/// CSV header row. Column order is fixed for the life of the file.
pub const CSV_HEADER: &str = "winner,victory,losers,duration";

const COLUMNS: [&str; 4] = ["winner", "victory", "losers", "duration"];

/// Separator between loser names inside the `losers` cell.
const LOSER_SEPARATOR: &str = ";";

/// Handle to the results log.
#[derive(Clone, Debug)]
pub struct ResultsLog {
    path: PathBuf,
}

impl ResultsLog {
    /// Opens the log, writing the header if the file is missing or empty.
    ///
    /// An existing file with a different header is refused rather than
    /// appended to.
    pub fn open(path: &Path) -> Result<Self> {
        init_csv(path)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one result row.
    pub fn append(&self, result: &MatchResult) -> Result<()> {
        // The file may have been removed since open; recreate it with a header
        init_csv(&self.path)?;

        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .context("Failed to open results CSV for append")?;

        let mut writer = row_writer(file);
        writer
            .write_record(row_fields(result))
            .context("Failed to write results CSV row")?;
        writer.flush().context("Failed to flush results CSV")?;
        Ok(())
    }
}

fn row_writer(file: File) -> Writer<File> {
    WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(file)
}

/// Initializes CSV file with header if it doesn't exist or is empty.
///
/// If the file exists and has content, the first record must be `CSV_HEADER`.
fn init_csv(path: &Path) -> Result<()> {
    if path.exists() {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .context("Failed to open existing results CSV")?;

        if let Some(first) = reader.records().next() {
            let first = first.context("Failed to read results CSV header")?;
            if !first.iter().eq(COLUMNS) {
                return Err(MatchupError::LogHeaderMismatch {
                    path: path.to_path_buf(),
                    found: first.iter().collect::<Vec<_>>().join(","),
                    expected: CSV_HEADER,
                }
                .into());
            }
            return Ok(());
        }
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("Failed to create results directory")?;
    }

    let file = File::create(path).context("Failed to create results CSV")?;
    let mut writer = row_writer(file);
    writer
        .write_record(COLUMNS)
        .context("Failed to write results CSV header")?;
    writer.flush().context("Failed to flush results CSV")?;
    Ok(())
}

/// Fields in `COLUMNS` order: winner, victory, loser1;loser2, duration.
fn row_fields(result: &MatchResult) -> [String; 4] {
    [
        result.winner.clone(),
        result.victory.clone(),
        result.losers.join(LOSER_SEPARATOR),
        format!("{:.2}", result.duration_secs),
    ]
}
