use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

#[cfg(windows)]
const TESSERACT_EXE: &str = "tesseract.exe";
#[cfg(not(windows))]
const TESSERACT_EXE: &str = "tesseract";

#[cfg(windows)]
const COMMON_INSTALL_DIRS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR",
    r"C:\Program Files (x86)\Tesseract-OCR",
];
#[cfg(not(windows))]
const COMMON_INSTALL_DIRS: &[&str] = &["/usr/bin", "/usr/local/bin", "/opt/homebrew/bin"];

#[cfg(windows)]
const COMMON_TESSDATA_DIRS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];
#[cfg(not(windows))]
const COMMON_TESSDATA_DIRS: &[&str] = &[
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
];

#[derive(Clone, Debug)]
pub struct TesseractPaths {
    pub executable: PathBuf,
    pub tessdata: PathBuf,
}

/// Returns the directory for storing our own Tesseract files
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("civ-matchup")
        .join("tesseract")
}

/// Locates Tesseract and its English model, downloading the model if no copy exists.
pub fn ensure_tesseract() -> Result<TesseractPaths> {
    let executable = find_tesseract_executable()?;

    let tessdata = match find_tessdata_dir() {
        Ok(dir) => dir,
        Err(_) => {
            tracing::info!("eng.traineddata not found locally, downloading...");
            let dir = get_tesseract_dir().join("tessdata");
            fs::create_dir_all(&dir)?;
            download_tessdata(&dir)?;
            dir
        }
    };

    tracing::info!(
        "Tesseract ready: {} (tessdata {})",
        executable.display(),
        tessdata.display()
    );

    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

/// Downloads English trained data from the tessdata repository
fn download_tessdata(tessdata_dir: &Path) -> Result<()> {
    let eng_url = format!("{}/eng.traineddata", TESSDATA_REPO);
    let eng_path = tessdata_dir.join("eng.traineddata");

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&eng_url)
        .header("User-Agent", "civ-matchup")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download eng.traineddata: HTTP {}",
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(&eng_path)
        .with_context(|| format!("Failed to create {}", eng_path.display()))?;
    file.write_all(&bytes)?;

    tracing::info!("Downloaded eng.traineddata ({} bytes)", bytes.len());
    Ok(())
}

/// Finds the Tesseract executable, checking our local dir first, then PATH,
/// then the usual install locations.
pub fn find_tesseract_executable() -> Result<PathBuf> {
    let local_exe = get_tesseract_dir().join(TESSERACT_EXE);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    COMMON_INSTALL_DIRS
        .iter()
        .map(|dir| Path::new(dir).join(TESSERACT_EXE))
        .find(|p| p.exists())
        .ok_or_else(|| anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

/// Finds a tessdata directory holding eng.traineddata
pub fn find_tessdata_dir() -> Result<PathBuf> {
    let mut candidates = vec![get_tesseract_dir().join("tessdata")];
    candidates.extend(COMMON_TESSDATA_DIRS.iter().map(PathBuf::from));

    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let prefix = PathBuf::from(prefix);
        candidates.push(prefix.join("tessdata"));
        candidates.push(prefix);
    }

    candidates
        .into_iter()
        .find(|dir| has_english_model(dir))
        .ok_or_else(|| {
            anyhow!("tessdata directory not found. Please ensure eng.traineddata is available.")
        })
}

fn has_english_model(dir: &Path) -> bool {
    dir.join("eng.traineddata").exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_has_english_model() {
        let dir = tempdir().unwrap();
        assert!(!has_english_model(dir.path()));

        std::fs::write(dir.path().join("eng.traineddata"), b"model").unwrap();
        assert!(has_english_model(dir.path()));
    }
}
