//! Session runner - main entry point for the automation loop.
//!
//! Wires the Windows window, OCR engine and input driver into a
//! `SessionController` and runs it until something fatal happens.

use anyhow::Result;

use crate::automation::config::AutomationConfig;

/// Attaches to the running game and plays matches until a fatal error.
#[cfg(windows)]
pub fn run_session(config: AutomationConfig) -> Result<()> {
    use anyhow::Context;

    use crate::automation::detection::ScreenReader;
    use crate::automation::input::SendInputDriver;
    use crate::automation::state::SessionController;
    use crate::capture::find_game_window;
    use crate::ocr::{ensure_tesseract, TesseractRecognizer};

    let window = find_game_window(&config.game_process_name)
        .with_context(|| format!("Failed to find {} window", config.game_process_name))?;
    tracing::info!("Attached to {}", config.game_process_name);

    let tesseract = ensure_tesseract().context("Tesseract is required for screen reading")?;
    tracing::debug!("Using Tesseract at {}", tesseract.executable.display());
    let recognizer = TesseractRecognizer::new(tesseract, config.ocr_threshold, config.ocr_scale);

    let screen = ScreenReader::new(window, recognizer, crate::paths::get_debug_dir());
    let input = SendInputDriver::new();

    let mut controller = SessionController::new(window, screen, input, config)?;
    let outcome = controller.run();

    tracing::info!(
        "Session ended in state {} after {} recorded matches",
        controller.state,
        controller.matches_recorded()
    );
    outcome
}

#[cfg(not(windows))]
pub fn run_session(config: AutomationConfig) -> Result<()> {
    Err(anyhow::anyhow!(
        "Driving {} requires Windows",
        config.game_process_name
    ))
}
