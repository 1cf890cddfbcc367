//! Screen capture and window access for the game window.
//!
//! This module provides:
//! - The `GameWindow` trait the controller and classifiers talk to
//! - Window-relative screen regions (`ScreenRegion`)
//! - The Windows implementation: window discovery and Graphics Capture

pub mod region;
#[cfg(windows)]
pub mod screenshot;
#[cfg(windows)]
pub mod window;

pub use region::{crop_region, ScreenRegion};
#[cfg(windows)]
pub use window::{find_game_window, WindowHandle};

use anyhow::Result;
use image::RgbaImage;

/// Outer rectangle of a window in screen coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl WindowRect {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Translates a window-relative point into absolute screen coordinates.
    pub fn to_screen(&self, x: i32, y: i32) -> (i32, i32) {
        (self.left + x, self.top + y)
    }
}

/// The attached game window.
///
/// Owned by the session controller for the whole run.
pub trait GameWindow {
    /// Current outer rectangle of the window.
    fn rect(&self) -> Result<WindowRect>;

    /// Brings the window to the foreground.
    fn focus(&self) -> Result<()>;

    /// False once the window has been closed.
    fn is_alive(&self) -> bool;

    /// Grabs the pixels of a window-relative region.
    fn capture(&self, region: &ScreenRegion) -> Result<RgbaImage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_rect_translation() {
        let rect = WindowRect {
            left: 100,
            top: 50,
            right: 2660,
            bottom: 1490,
        };
        assert_eq!(rect.width(), 2560);
        assert_eq!(rect.height(), 1440);
        assert_eq!(rect.to_screen(1280, 630), (1380, 680));
    }
}
