//! Per-display tile state.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use jacques_protocol::epoch_ms;

use super::layout::{columns_per_row, compute_grid};
use crate::window::Rect;

/// One window slot in a tiled layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileSlot {
    pub terminal_key: String,
    pub session_id: String,
    pub geometry: Rect,
    pub column: usize,
    pub row: usize,
}

/// The layout Jacques last applied to one display.
///
/// Exists only for displays currently hosting a managed layout; invariant:
/// `columns_per_row` sums to `slots.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileState {
    pub display_id: String,
    pub work_area: Rect,
    pub columns_per_row: Vec<usize>,
    pub slots: Vec<TileSlot>,
    /// When the layout was applied, ms epoch.
    pub tiled_at: i64,
}

/// Build a tile state by computing the grid for the given sessions.
pub fn build_tile_state(
    display_id: &str,
    work_area: Rect,
    sessions: &[(String, String)],
) -> TileState {
    let geometries = compute_grid(&work_area, sessions.len());
    let slots = sessions
        .iter()
        .zip(geometries)
        .map(|((terminal_key, session_id), geometry)| TileSlot {
            terminal_key: terminal_key.clone(),
            session_id: session_id.clone(),
            geometry: geometry.rect,
            column: geometry.column,
            row: geometry.row,
        })
        .collect();
    TileState {
        display_id: display_id.to_string(),
        work_area,
        columns_per_row: columns_per_row(sessions.len()),
        slots,
        tiled_at: epoch_ms(),
    }
}

/// Owner of all per-display tile states.
#[derive(Default)]
pub struct TileStateManager {
    states: Mutex<HashMap<String, TileState>>,
}

impl TileStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_tile_state(&self, display_id: &str) -> Option<TileState> {
        self.lock().get(display_id).cloned()
    }

    pub fn set_tile_state(&self, state: TileState) {
        self.lock().insert(state.display_id.clone(), state);
    }

    pub fn clear_tile_state(&self, display_id: &str) {
        self.lock().remove(display_id);
    }

    /// Arbitrary tile state, when any display is tiled.
    pub fn get_any_tile_state(&self) -> Option<TileState> {
        self.lock().values().next().cloned()
    }

    /// Record a manually applied layout: compute the grid for the sessions,
    /// persist, and return it.
    pub fn build_from_manual_tile(
        &self,
        display_id: &str,
        work_area: Rect,
        sessions: &[(String, String)],
    ) -> TileState {
        let state = build_tile_state(display_id, work_area, sessions);
        self.set_tile_state(state.clone());
        state
    }

    /// Drop a session from whatever tile holds it and re-tile the remainder.
    ///
    /// Re-tiling from scratch keeps `sum(columns_per_row) == slots.len()`
    /// trivially true. Returns the rebuilt state, or `None` if the session
    /// was not tiled (the state is deleted when it was the last slot).
    pub fn remove_session(&self, session_id: &str) -> Option<TileState> {
        let mut states = self.lock();
        let display_id = states
            .values()
            .find(|state| state.slots.iter().any(|slot| slot.session_id == session_id))?
            .display_id
            .clone();

        let state = states.get(&display_id)?;
        let remaining: Vec<(String, String)> = state
            .slots
            .iter()
            .filter(|slot| slot.session_id != session_id)
            .map(|slot| (slot.terminal_key.clone(), slot.session_id.clone()))
            .collect();

        if remaining.is_empty() {
            states.remove(&display_id);
            return None;
        }
        let rebuilt = build_tile_state(&display_id, state.work_area, &remaining);
        states.insert(display_id, rebuilt.clone());
        Some(rebuilt)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, TileState>> {
        match self.states.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
