use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use super::preprocess::prepare_for_ocr;
use super::setup::TesseractPaths;
use super::{RecognizedTokens, TextRecognizer};

/// Tesseract CLI wrapper.
///
/// Each call writes the preprocessed region to a temporary PNG, runs Tesseract
/// with TSV output and keeps only the word texts.
#[derive(Clone, Debug)]
pub struct TesseractRecognizer {
    executable: PathBuf,
    tessdata: PathBuf,
    threshold: u8,
    scale: u32,
}

impl TesseractRecognizer {
    pub fn new(paths: TesseractPaths, threshold: u8, scale: u32) -> Self {
        Self {
            executable: paths.executable,
            tessdata: paths.tessdata,
            threshold,
            scale,
        }
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, image: &RgbaImage) -> Result<RecognizedTokens> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(RecognizedTokens::default());
        }

        let prepared = prepare_for_ocr(image, self.threshold, self.scale);

        let temp_input = NamedTempFile::with_suffix(".png")?;
        prepared.save(temp_input.path())?;

        // Tesseract appends .tsv to the output base itself
        let temp_output = NamedTempFile::new()?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let output = Command::new(&self.executable)
            .arg(temp_input.path())
            .arg(&output_base)
            .arg("--tessdata-dir")
            .arg(&self.tessdata)
            .arg("-l")
            .arg("eng")
            .arg("--psm")
            .arg("6") // Assume single uniform block of text
            .arg("tsv")
            .output()
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr));
        }

        let tsv_path = format!("{}.tsv", output_base);
        let tsv_content = std::fs::read_to_string(&tsv_path)
            .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))?;
        let _ = std::fs::remove_file(&tsv_path);

        Ok(RecognizedTokens::from_raw(parse_tsv_words(&tsv_content)))
    }
}

/// Pulls the word texts out of Tesseract TSV output, in reading order.
///
/// TSV fields: level, page_num, block_num, par_num, line_num, word_num,
/// left, top, width, height, conf, text. Only level 5 rows are words; rows
/// with a negative confidence carry no text.
fn parse_tsv_words(tsv: &str) -> Vec<String> {
    let mut words = Vec::new();

    for line in tsv.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        let level: i32 = fields[0].parse().unwrap_or(-1);
        let conf: f32 = fields[10].parse().unwrap_or(-1.0);
        let text = fields[11].trim();

        if level != 5 || conf < 0.0 || text.is_empty() {
            continue;
        }

        words.push(text.to_string());
    }

    words
}
