//! Synthetic mouse and keyboard input.
//!
//! The controller talks to an [`InputDriver`]; on Windows that is
//! [`SendInputDriver`], which simulates hardware-level input. The game reads
//! input through DirectInput, so keys are sent as scan codes and clicks need
//! the window in the foreground.

use anyhow::Result;
use std::time::Duration;

use crate::capture::GameWindow;

/// Keys the automation presses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Shift,
    Enter,
    Escape,
}

impl Key {
    /// Set 1 hardware scan code.
    pub fn scan_code(self) -> u16 {
        match self {
            Key::Shift => 0x2A,
            Key::Enter => 0x1C,
            Key::Escape => 0x01,
        }
    }
}

/// A button location in window-relative pixels (2560x1440 layout).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Button {
    pub name: &'static str,
    pub x: i32,
    pub y: i32,
}

impl Button {
    pub const fn new(name: &'static str, x: i32, y: i32) -> Self {
        Self { name, x, y }
    }
}

// Main menu and game setup
pub const SINGLE_PLAYER: Button = Button::new("Single Player", 1280, 630);
pub const CREATE_GAME: Button = Button::new("Create Game", 1420, 860);
pub const ADVANCED_SETUP: Button = Button::new("Advanced Setup", 1280, 1300);
pub const LOAD_CONFIGURATION: Button = Button::new("Load Configuration", 950, 1370);
pub const FIRST_SAVED_CONFIGURATION: Button = Button::new("Saved Configuration", 1100, 290);
pub const OWN_PLAYER_SLOT: Button = Button::new("Own Player Slot", 1000, 290);
pub const SPECTATOR_OPTION: Button = Button::new("Spectator", 1000, 490);
pub const START_GAME: Button = Button::new("Start Game", 1550, 1350);
pub const BEGIN_GAME: Button = Button::new("Begin Game", 1050, 1000);

// End-of-match screen
pub const EXPORT_GAME: Button = Button::new("Export Game", 2300, 1370);
pub const MAIN_MENU: Button = Button::new("Main Menu", 1280, 1370);
pub const CONFIRM_EXIT: Button = Button::new("Confirm Exit", 1420, 800);

/// Low-level input operations, all in absolute screen coordinates.
pub trait InputDriver {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()>;
    fn click(&mut self) -> Result<()>;
    fn double_click(&mut self) -> Result<()>;
    fn key_down(&mut self, key: Key) -> Result<()>;
    fn key_up(&mut self, key: Key) -> Result<()>;

    fn tap(&mut self, key: Key) -> Result<()> {
        self.key_down(key)?;
        self.key_up(key)
    }
}

/// Focuses the window and clicks a window-relative button, then waits for
/// the game to catch up.
pub fn click_button<W, I>(
    window: &W,
    input: &mut I,
    button: &Button,
    double_click: bool,
    delay: Duration,
) -> Result<()>
where
    W: GameWindow + ?Sized,
    I: InputDriver + ?Sized,
{
    let (x, y) = window.rect()?.to_screen(button.x, button.y);
    window.focus()?;

    tracing::debug!("Clicking {} at ({}, {})", button.name, x, y);
    input.move_to(x, y)?;
    if double_click {
        input.double_click()?;
    } else {
        input.click()?;
    }

    std::thread::sleep(delay);
    Ok(())
}

/// Moves the pointer out of the way of every capture region.
pub fn park_pointer<I: InputDriver + ?Sized>(input: &mut I) -> Result<()> {
    input.move_to(0, 0)
}

/// Acknowledges a "complete!" banner.
pub fn dismiss_banner<I: InputDriver + ?Sized>(input: &mut I, delay: Duration) -> Result<()> {
    input.tap(Key::Escape)?;
    std::thread::sleep(delay);
    Ok(())
}

/// Ends the turn while a world congress prompt is up, without opening it.
pub fn skip_congress<I: InputDriver + ?Sized>(input: &mut I, delay: Duration) -> Result<()> {
    with_key_held(input, Key::Shift, delay, |input| {
        input.tap(Key::Escape)?;
        std::thread::sleep(delay);
        input.tap(Key::Enter)?;
        std::thread::sleep(delay);
        Ok(())
    })
}

/// Forces the next turn (Shift+Enter).
pub fn advance_turn<I: InputDriver + ?Sized>(input: &mut I, delay: Duration) -> Result<()> {
    with_key_held(input, Key::Shift, delay, |input| {
        input.tap(Key::Enter)?;
        std::thread::sleep(delay);
        Ok(())
    })
}

/// Runs `body` with `key` pressed. The key is released even when `body`
/// fails, so a modifier is never left down on the desktop.
fn with_key_held<I, F>(input: &mut I, key: Key, delay: Duration, body: F) -> Result<()>
where
    I: InputDriver + ?Sized,
    F: FnOnce(&mut I) -> Result<()>,
{
    input.key_down(key)?;
    std::thread::sleep(delay);

    let outcome = body(input);
    let released = input.key_up(key);
    std::thread::sleep(delay);

    outcome.and(released)
}

#[cfg(windows)]
pub use sendinput::SendInputDriver;

#[cfg(windows)]
mod sendinput {
    use anyhow::{anyhow, Result};
    use std::time::Duration;

    use windows::Win32::UI::Input::KeyboardAndMouse::{
        SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYEVENTF_KEYUP,
        KEYEVENTF_SCANCODE, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
        MOUSEEVENTF_MOVE, MOUSEINPUT, MOUSE_EVENT_FLAGS,
    };
    use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

    use super::{InputDriver, Key};

    /// `SendInput`-backed driver. Moves the real cursor.
    #[derive(Debug, Default)]
    pub struct SendInputDriver {
        /// Last absolute position, normalized to 0-65535
        position: (i32, i32),
    }

    impl SendInputDriver {
        pub fn new() -> Self {
            Self::default()
        }

        fn send_mouse(&self, flags: MOUSE_EVENT_FLAGS) -> Result<()> {
            let input = INPUT {
                r#type: INPUT_MOUSE,
                Anonymous: INPUT_0 {
                    mi: MOUSEINPUT {
                        dx: self.position.0,
                        dy: self.position.1,
                        dwFlags: flags | MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_MOVE,
                        ..Default::default()
                    },
                },
            };
            send(&input)
        }

        fn send_key(&self, key: Key, up: bool) -> Result<()> {
            let flags = if up {
                KEYEVENTF_SCANCODE | KEYEVENTF_KEYUP
            } else {
                KEYEVENTF_SCANCODE
            };
            let input = INPUT {
                r#type: INPUT_KEYBOARD,
                Anonymous: INPUT_0 {
                    ki: KEYBDINPUT {
                        wScan: key.scan_code(),
                        dwFlags: flags,
                        ..Default::default()
                    },
                },
            };
            send(&input)
        }
    }

    fn send(input: &INPUT) -> Result<()> {
        let sent = unsafe {
            SendInput(std::slice::from_ref(input), std::mem::size_of::<INPUT>() as i32)
        };
        if sent != 1 {
            return Err(anyhow!("SendInput was blocked"));
        }
        Ok(())
    }

    impl InputDriver for SendInputDriver {
        fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
            let screen_width = unsafe { GetSystemMetrics(SM_CXSCREEN) }.max(1);
            let screen_height = unsafe { GetSystemMetrics(SM_CYSCREEN) }.max(1);

            // MOUSEEVENTF_ABSOLUTE expects 0-65535 on both axes
            self.position = (
                ((x as i64 * 65535) / screen_width as i64) as i32,
                ((y as i64 * 65535) / screen_height as i64) as i32,
            );
            self.send_mouse(MOUSE_EVENT_FLAGS(0))
        }

        fn click(&mut self) -> Result<()> {
            self.send_mouse(MOUSEEVENTF_LEFTDOWN)?;
            std::thread::sleep(Duration::from_millis(50));
            self.send_mouse(MOUSEEVENTF_LEFTUP)
        }

        fn double_click(&mut self) -> Result<()> {
            self.click()?;
            std::thread::sleep(Duration::from_millis(50));
            self.click()
        }

        fn key_down(&mut self, key: Key) -> Result<()> {
            self.send_key(key, false)
        }

        fn key_up(&mut self, key: Key) -> Result<()> {
            self.send_key(key, true)
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::{InputDriver, Key};
    use anyhow::Result;

    /// One recorded input operation.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum InputEvent {
        MoveTo(i32, i32),
        Click,
        DoubleClick,
        KeyDown(Key),
        KeyUp(Key),
    }

    /// Records every operation and optionally reacts to clicks.
    #[derive(Default)]
    pub struct RecordingInput {
        pub events: Vec<InputEvent>,
        position: (i32, i32),
        on_click: Option<Box<dyn FnMut((i32, i32))>>,
        failing_key: Option<Key>,
    }

    impl RecordingInput {
        pub fn new() -> Self {
            Self::default()
        }

        /// Runs `hook` with the pointer position on every click.
        pub fn on_click(mut self, hook: impl FnMut((i32, i32)) + 'static) -> Self {
            self.on_click = Some(Box::new(hook));
            self
        }

        /// Makes every press of `key` fail, as a rejected SendInput would.
        pub fn fail_key_down(mut self, key: Key) -> Self {
            self.failing_key = Some(key);
            self
        }

        pub fn clicks_at(&self, x: i32, y: i32) -> usize {
            let mut count = 0;
            let mut at = (0, 0);
            for event in &self.events {
                match event {
                    InputEvent::MoveTo(mx, my) => at = (*mx, *my),
                    InputEvent::Click | InputEvent::DoubleClick if at == (x, y) => count += 1,
                    _ => {}
                }
            }
            count
        }

        pub fn key_downs(&self, key: Key) -> usize {
            self.events
                .iter()
                .filter(|e| **e == InputEvent::KeyDown(key))
                .count()
        }

        fn fire_click(&mut self) {
            let position = self.position;
            if let Some(hook) = self.on_click.as_mut() {
                hook(position);
            }
        }
    }

    impl InputDriver for RecordingInput {
        fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
            self.position = (x, y);
            self.events.push(InputEvent::MoveTo(x, y));
            Ok(())
        }

        fn click(&mut self) -> Result<()> {
            self.events.push(InputEvent::Click);
            self.fire_click();
            Ok(())
        }

        fn double_click(&mut self) -> Result<()> {
            self.events.push(InputEvent::DoubleClick);
            self.fire_click();
            Ok(())
        }

        fn key_down(&mut self, key: Key) -> Result<()> {
            if self.failing_key == Some(key) {
                anyhow::bail!("SendInput rejected {:?}", key);
            }
            self.events.push(InputEvent::KeyDown(key));
            Ok(())
        }

        fn key_up(&mut self, key: Key) -> Result<()> {
            self.events.push(InputEvent::KeyUp(key));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{InputEvent, RecordingInput};
    use super::*;

    #[test]
    fn test_skip_congress_holds_shift() {
        let mut input = RecordingInput::new();
        skip_congress(&mut input, Duration::ZERO).unwrap();

        assert_eq!(
            input.events,
            vec![
                InputEvent::KeyDown(Key::Shift),
                InputEvent::KeyDown(Key::Escape),
                InputEvent::KeyUp(Key::Escape),
                InputEvent::KeyDown(Key::Enter),
                InputEvent::KeyUp(Key::Enter),
                InputEvent::KeyUp(Key::Shift),
            ]
        );
    }

    #[test]
    fn test_advance_turn_is_shift_enter() {
        let mut input = RecordingInput::new();
        advance_turn(&mut input, Duration::ZERO).unwrap();

        assert_eq!(input.key_downs(Key::Shift), 1);
        assert_eq!(input.key_downs(Key::Enter), 1);
        assert_eq!(input.key_downs(Key::Escape), 0);
        assert_eq!(input.events.last(), Some(&InputEvent::KeyUp(Key::Shift)));
    }

    #[test]
    fn test_shift_released_when_key_press_fails() {
        let mut input = RecordingInput::new().fail_key_down(Key::Enter);
        assert!(skip_congress(&mut input, Duration::ZERO).is_err());
        assert_eq!(input.events.last(), Some(&InputEvent::KeyUp(Key::Shift)));

        let mut input = RecordingInput::new().fail_key_down(Key::Enter);
        let err = advance_turn(&mut input, Duration::ZERO).unwrap_err();
        assert!(err.to_string().contains("Enter"));
        assert_eq!(
            input.events,
            vec![InputEvent::KeyDown(Key::Shift), InputEvent::KeyUp(Key::Shift)]
        );
    }

    #[test]
    fn test_scan_codes() {
        assert_eq!(Key::Escape.scan_code(), 0x01);
        assert_eq!(Key::Enter.scan_code(), 0x1C);
        assert_eq!(Key::Shift.scan_code(), 0x2A);
    }
}
