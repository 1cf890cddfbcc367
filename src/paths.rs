use std::path::PathBuf;
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Returns the directory for failed-recognition captures: `<exe_dir>/debug/`
pub fn get_debug_dir() -> PathBuf {
    get_exe_dir().join("debug")
}

/// Returns the default results log: `<exe_dir>/results.csv`
pub fn get_default_results_path() -> PathBuf {
    get_exe_dir().join("results.csv")
}

/// Returns the directory the game writes match exports into.
///
/// Lives under the user's Documents folder, falling back to the executable
/// directory when the platform has no such folder.
pub fn get_default_export_dir() -> PathBuf {
    dirs::document_dir()
        .unwrap_or_else(|| get_exe_dir().clone())
        .join("My Games")
        .join("Sid Meier's Civilization VI")
        .join("Exports")
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    std::fs::create_dir_all(get_debug_dir())?;
    Ok(())
}
