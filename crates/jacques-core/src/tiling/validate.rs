//! Layout validation.
//!
//! Window managers, users, and the OS all move windows behind Jacques'
//! back; clients ask "is the screen still in the state we tiled?" before
//! trusting a stored layout.

use super::state::TileState;
use crate::window::Rect;

/// Per-dimension slack when comparing live bounds to tiled geometry.
pub const BOUNDS_TOLERANCE_PX: i32 = 50;

/// Whether every slot's window is still (approximately) where the tile put
/// it. A missing window invalidates the layout.
pub fn validate_bounds(state: &TileState, get_bounds: impl Fn(&str) -> Option<Rect>) -> bool {
    state.slots.iter().all(|slot| {
        match get_bounds(&slot.terminal_key) {
            Some(bounds) => rects_close(&bounds, &slot.geometry),
            None => false,
        }
    })
}

/// Whether every slot's session still exists.
pub fn validate_sessions(state: &TileState, exists: impl Fn(&str) -> bool) -> bool {
    state.slots.iter().all(|slot| exists(&slot.session_id))
}

fn rects_close(a: &Rect, b: &Rect) -> bool {
    (a.x - b.x).abs() <= BOUNDS_TOLERANCE_PX
        && (a.y - b.y).abs() <= BOUNDS_TOLERANCE_PX
        && (a.width - b.width).abs() <= BOUNDS_TOLERANCE_PX
        && (a.height - b.height).abs() <= BOUNDS_TOLERANCE_PX
}
