//! OS window-system seam.
//!
//! Display enumeration, window geometry, and the "position this window"
//! primitive are platform services supplied by the embedding binary. The
//! engine consumes them through [`WindowSystem`] so tiling and focus logic
//! stay testable with in-memory fakes.

use serde::{Deserialize, Serialize};

use jacques_protocol::TerminalIdentity;

#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    #[error("No window found for terminal key: {key}")]
    WindowNotFound { key: String },

    #[error("No displays available")]
    NoDisplays,

    #[error("Window operation failed: {message}")]
    OperationFailed { message: String },
}

/// Pixel rectangle in global screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center point, used to vote windows onto displays.
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Whether a point falls inside this rectangle.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// One attached display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub id: String,
    /// Display rectangle minus menu bar / dock.
    pub work_area: Rect,
    pub is_primary: bool,
}

/// Platform window services consumed by tiling and the focus watcher.
pub trait WindowSystem: Send + Sync {
    /// All attached displays.
    fn list_displays(&self) -> Result<Vec<DisplayInfo>, WindowError>;

    /// Current bounds of the window hosting the given terminal key, if the
    /// window can be located.
    fn window_bounds(&self, terminal_key: &str) -> Option<Rect>;

    /// Move/resize the window hosting the given terminal key.
    fn position_window(&self, terminal_key: &str, bounds: &Rect) -> Result<(), WindowError>;

    /// Raise and focus the window hosting the given terminal key.
    fn focus_window(&self, terminal_key: &str) -> Result<(), WindowError>;

    /// Identity of the front-most terminal window, if one is frontmost.
    fn frontmost_terminal(&self) -> Option<TerminalIdentity>;
}

/// Window system for platforms without an automation backend.
///
/// Reports no displays and no windows; tiling and focus degrade to no-ops
/// with errors surfaced in the request replies.
pub struct NullWindowSystem;

impl WindowSystem for NullWindowSystem {
    fn list_displays(&self) -> Result<Vec<DisplayInfo>, WindowError> {
        Ok(Vec::new())
    }

    fn window_bounds(&self, _terminal_key: &str) -> Option<Rect> {
        None
    }

    fn position_window(&self, terminal_key: &str, _bounds: &Rect) -> Result<(), WindowError> {
        Err(WindowError::WindowNotFound {
            key: terminal_key.to_string(),
        })
    }

    fn focus_window(&self, terminal_key: &str) -> Result<(), WindowError> {
        Err(WindowError::WindowNotFound {
            key: terminal_key.to_string(),
        })
    }

    fn frontmost_terminal(&self) -> Option<TerminalIdentity> {
        None
    }
}
