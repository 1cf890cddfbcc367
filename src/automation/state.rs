//! Session state machine.
//!
//! The controller sequences through: Launching → Configuring → Playing →
//! Extracting → ReturningToMenu → Configuring → ... and never terminates on
//! its own. Each step checks that the game window still exists.

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

use crate::automation::config::AutomationConfig;
use crate::automation::csv_writer::ResultsLog;
use crate::automation::detection::{
    match_over, turn_count, victory_type, winner_adjective, world_congress_pending,
    world_congress_resolved, TokenSource, VICTORY_TYPE, WINNER_NAME,
};
use crate::automation::extract::{
    build_match_result, clear_export_dir, wait_for_export, PlayerFilter,
};
use crate::automation::input::{
    self, advance_turn, click_button, dismiss_banner, park_pointer, skip_congress, Button,
    InputDriver,
};
use crate::capture::{GameWindow, ScreenRegion};
use crate::error::MatchupError;

/// How often the export directory is checked while waiting for the game.
const EXPORT_POLL: Duration = Duration::from_millis(250);

/// Clicks that take the main menu to a started match, in order.
/// The `bool` marks a double-click.
const SETUP_SEQUENCE: [(Button, bool); 8] = [
    (input::SINGLE_PLAYER, false),
    (input::CREATE_GAME, false),
    (input::ADVANCED_SETUP, false),
    (input::LOAD_CONFIGURATION, false),
    (input::FIRST_SAVED_CONFIGURATION, true),
    (input::OWN_PLAYER_SLOT, false),
    (input::SPECTATOR_OPTION, false),
    (input::START_GAME, false),
];

/// Session state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Attached to the window, not yet driving it
    Launching,
    /// Clicking through the menus to start a match
    Configuring,
    /// Polling the running match
    Playing,
    /// Reading and recording the finished match
    Extracting,
    /// Leaving the end screen for the main menu
    ReturningToMenu,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Launching => write!(f, "Launching"),
            SessionState::Configuring => write!(f, "Configuring"),
            SessionState::Playing => write!(f, "Playing"),
            SessionState::Extracting => write!(f, "Extracting"),
            SessionState::ReturningToMenu => write!(f, "Returning to menu"),
        }
    }
}

/// Drives one game window through back-to-back matches.
pub struct SessionController<W, S, I> {
    /// Current state
    pub state: SessionState,
    window: W,
    screen: S,
    input: I,
    config: AutomationConfig,
    results: ResultsLog,
    /// When the current match began
    match_started: Instant,
    /// Polls since the current match began
    polls: u32,
    last_turn: Option<u32>,
    matches_recorded: u32,
}

impl<W, S, I> SessionController<W, S, I>
where
    W: GameWindow,
    S: TokenSource,
    I: InputDriver,
{
    /// Creates a controller and opens the results log.
    pub fn new(window: W, screen: S, input: I, config: AutomationConfig) -> Result<Self> {
        let results = ResultsLog::open(&config.results_path).with_context(|| {
            format!(
                "Failed to open results log {}",
                config.results_path.display()
            )
        })?;

        Ok(Self {
            state: SessionState::Launching,
            window,
            screen,
            input,
            config,
            results,
            match_started: Instant::now(),
            polls: 0,
            last_turn: None,
            matches_recorded: 0,
        })
    }

    pub fn matches_recorded(&self) -> u32 {
        self.matches_recorded
    }

    /// Runs until a fatal error.
    pub fn run(&mut self) -> Result<()> {
        tracing::info!("Recording results to {}", self.results.path().display());
        loop {
            self.step()?;
        }
    }

    /// Advances the state machine by one step.
    pub fn step(&mut self) -> Result<()> {
        if !self.window.is_alive() {
            return Err(anyhow!("Game window closed"));
        }

        match self.state {
            SessionState::Launching => self.launch(),
            SessionState::Configuring => self.configure(),
            SessionState::Playing => self.poll(),
            SessionState::Extracting => self.extract(),
            SessionState::ReturningToMenu => self.return_to_menu(),
        }
    }

    fn launch(&mut self) -> Result<()> {
        self.window.focus()?;
        let rect = self.window.rect()?;
        tracing::info!(
            "Game window ready ({}x{} at {}, {})",
            rect.width(),
            rect.height(),
            rect.left,
            rect.top
        );
        self.transition(SessionState::Configuring);
        Ok(())
    }

    fn configure(&mut self) -> Result<()> {
        tracing::debug!("Configuring game...");
        for (button, double_click) in &SETUP_SEQUENCE {
            self.click(button, *double_click)?;
        }

        self.wait_for_launch();
        self.click(&input::BEGIN_GAME, false)?;

        self.match_started = Instant::now();
        self.polls = 0;
        self.last_turn = None;
        tracing::info!("Match {} started", self.matches_recorded + 1);
        self.transition(SessionState::Playing);
        Ok(())
    }

    fn wait_for_launch(&self) {
        if self.config.launch_delay_secs == 0 {
            return;
        }

        tracing::info!("Waiting for game to load...");
        let bar = ProgressBar::new(self.config.launch_delay_secs);
        if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len}s") {
            bar.set_style(style);
        }
        for _ in 0..self.config.launch_delay_secs {
            std::thread::sleep(Duration::from_secs(1));
            bar.inc(1);
        }
        bar.finish_and_clear();
    }

    /// One poll of a running match.
    fn poll(&mut self) -> Result<()> {
        // Keep the cursor off the capture regions
        park_pointer(&mut self.input)?;
        self.window.focus()?;
        self.polls += 1;

        if recoverable(match_over(&self.screen), "match over")? == Some(true) {
            tracing::info!(
                "Match over after {} polls ({:.0}s)",
                self.polls,
                self.match_started.elapsed().as_secs_f64()
            );
            self.transition(SessionState::Extracting);
            return Ok(());
        }

        let delay = self.config.action_delay();
        if recoverable(world_congress_resolved(&self.screen), "congress resolved")? == Some(true) {
            tracing::debug!("Dismissing world congress results");
            dismiss_banner(&mut self.input, delay)?;
        } else if recoverable(world_congress_pending(&self.screen), "congress pending")?
            == Some(true)
        {
            tracing::debug!("Skipping past world congress");
            skip_congress(&mut self.input, delay)?;
        } else if self.polls % self.config.skip_turn_every_polls.max(1) == 0 {
            advance_turn(&mut self.input, delay)?;
        }

        self.note_turn()?;
        std::thread::sleep(self.config.polling_interval());
        Ok(())
    }

    /// Logs turn progress. Never drives any decision.
    fn note_turn(&mut self) -> Result<()> {
        if let Some(turn) = recoverable(turn_count(&self.screen), "turn count")? {
            if self.last_turn != Some(turn) {
                tracing::info!("Turn {}", turn);
                self.last_turn = Some(turn);
            }
        }
        Ok(())
    }

    fn extract(&mut self) -> Result<()> {
        std::thread::sleep(self.config.end_screen_grace());

        let victory = self.read_required(victory_type(&self.screen), &VICTORY_TYPE)?;
        let winner = self.read_required(winner_adjective(&self.screen), &WINNER_NAME)?;
        tracing::debug!("Recognized {} victory for '{}'", victory, winner);

        let export_dir = self.config.export_dir.clone();
        clear_export_dir(&export_dir)?;
        self.click(&input::EXPORT_GAME, false)?;

        let export = wait_for_export(&export_dir, self.config.export_timeout(), EXPORT_POLL)?;

        let filter = PlayerFilter {
            num_players: self.config.num_players,
            spectator_id: self.config.spectator_id,
        };
        let result = build_match_result(
            &export,
            filter,
            &winner,
            &victory,
            self.match_started.elapsed(),
        )?;

        self.results.append(&result)?;
        self.matches_recorded += 1;
        tracing::info!(
            "Recorded match {}: {} won a {} victory over {:?} in {:.0}s",
            self.matches_recorded,
            result.winner,
            result.victory,
            result.losers,
            result.duration_secs
        );

        self.transition(SessionState::ReturningToMenu);
        Ok(())
    }

    /// Unwraps an end-of-match reading, keeping a capture of the region if it
    /// could not be read.
    fn read_required<T>(&self, reading: Result<T>, region: &ScreenRegion) -> Result<T> {
        match reading {
            Ok(value) => Ok(value),
            Err(e) => {
                if self.config.save_debug_captures {
                    match self.screen.save_debug_capture(region) {
                        Ok(Some(path)) => {
                            tracing::warn!("Saved {} capture to {}", region.name, path.display())
                        }
                        Ok(None) => {}
                        Err(save_err) => {
                            tracing::warn!("Could not save {} capture: {:#}", region.name, save_err)
                        }
                    }
                }
                Err(e.context(format!("Cannot record match: {} unreadable", region.name)))
            }
        }
    }

    fn return_to_menu(&mut self) -> Result<()> {
        self.click(&input::MAIN_MENU, false)?;
        self.click(&input::CONFIRM_EXIT, false)?;
        std::thread::sleep(self.config.menu_load_delay());
        self.transition(SessionState::Configuring);
        Ok(())
    }

    fn click(&mut self, button: &Button, double_click: bool) -> Result<()> {
        click_button(
            &self.window,
            &mut self.input,
            button,
            double_click,
            self.config.action_delay(),
        )
        .with_context(|| format!("Failed to click {}", button.name))
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!("{} -> {}", self.state, next);
        self.state = next;
    }
}

/// Turns recognition gaps into "no signal"; anything else stays an error.
fn recoverable<T>(reading: Result<T>, what: &str) -> Result<Option<T>> {
    match reading {
        Ok(value) => Ok(Some(value)),
        Err(e) => match e.downcast_ref::<MatchupError>() {
            Some(gap) if gap.is_recognition_gap() => {
                tracing::debug!("No {} signal this poll: {}", what, gap);
                Ok(None)
            }
            _ => Err(e),
        },
    }
}
