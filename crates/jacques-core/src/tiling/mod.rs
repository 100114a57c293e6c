//! Window tiling coordination.

pub mod display;
pub mod layout;
pub mod state;
pub mod validate;

pub use display::select_target_display;
pub use layout::{columns_per_row, compute_grid, SlotGeometry};
pub use state::{build_tile_state, TileSlot, TileState, TileStateManager};
pub use validate::{validate_bounds, validate_sessions, BOUNDS_TOLERANCE_PX};

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::window::{WindowError, WindowSystem};

/// Pause between consecutive positioning calls — the OS automation layer is
/// sensitive to concurrent window mutations.
pub const POSITION_STEP_DELAY: Duration = Duration::from_millis(100);

/// Result of a tile execution. Partial success is possible.
#[derive(Debug, Clone, PartialEq)]
pub struct TileOutcome {
    pub success: bool,
    pub positioned: usize,
    pub total: usize,
    pub errors: Vec<String>,
}

/// Orchestrates grid computation, positioning, and tile-state bookkeeping.
pub struct TilingCoordinator {
    window_system: Arc<dyn WindowSystem>,
    states: TileStateManager,
}

impl TilingCoordinator {
    pub fn new(window_system: Arc<dyn WindowSystem>) -> Self {
        Self {
            window_system,
            states: TileStateManager::new(),
        }
    }

    pub fn states(&self) -> &TileStateManager {
        &self.states
    }

    /// Tile the given `(terminal_key, session_id)` pairs.
    ///
    /// The target display is `display_id` when given, else the majority
    /// vote of where the windows currently sit.
    pub async fn tile_windows(
        &self,
        sessions: &[(String, String)],
        display_id: Option<&str>,
    ) -> TileOutcome {
        let total = sessions.len();
        let displays = match self.window_system.list_displays() {
            Ok(displays) if !displays.is_empty() => displays,
            Ok(_) => {
                return TileOutcome {
                    success: false,
                    positioned: 0,
                    total,
                    errors: vec![WindowError::NoDisplays.to_string()],
                }
            }
            Err(e) => {
                return TileOutcome {
                    success: false,
                    positioned: 0,
                    total,
                    errors: vec![e.to_string()],
                }
            }
        };

        let keys: Vec<String> = sessions.iter().map(|(key, _)| key.clone()).collect();
        let target = match display_id.and_then(|id| displays.iter().find(|d| d.id == id)) {
            Some(display) => display,
            None => {
                match select_target_display(&keys, &displays, |key| {
                    self.window_system.window_bounds(key)
                }) {
                    Some(display) => display,
                    None => {
                        return TileOutcome {
                            success: false,
                            positioned: 0,
                            total,
                            errors: vec![WindowError::NoDisplays.to_string()],
                        }
                    }
                }
            }
        };

        info!(
            event = "core.tiling.tile_started",
            display = %target.id,
            windows = total,
        );
        let state = build_tile_state(&target.id, target.work_area, sessions);
        let outcome = self.apply_layout(&state).await;
        self.states.set_tile_state(state);
        info!(
            event = "core.tiling.tile_completed",
            display = %target.id,
            positioned = outcome.positioned,
            total = outcome.total,
        );
        outcome
    }

    /// Expand one session's window to its display's full work area.
    ///
    /// Reuses the 1-slot grid path end to end.
    pub async fn maximize_window(&self, terminal_key: &str, session_id: &str) -> TileOutcome {
        let sessions = vec![(terminal_key.to_string(), session_id.to_string())];
        let displays = match self.window_system.list_displays() {
            Ok(displays) => displays,
            Err(e) => {
                return TileOutcome {
                    success: false,
                    positioned: 0,
                    total: 1,
                    errors: vec![e.to_string()],
                }
            }
        };
        let keys = vec![terminal_key.to_string()];
        let Some(target) = select_target_display(&keys, &displays, |key| {
            self.window_system.window_bounds(key)
        }) else {
            return TileOutcome {
                success: false,
                positioned: 0,
                total: 1,
                errors: vec![WindowError::NoDisplays.to_string()],
            };
        };
        let state = build_tile_state(&target.id, target.work_area, &sessions);
        // Maximize is transient — it does not replace the display's tile state.
        self.apply_layout(&state).await
    }

    /// Drop an unregistered session from its tile and reposition the rest.
    pub async fn rebalance_on_remove(&self, session_id: &str) {
        if let Some(rebuilt) = self.states.remove_session(session_id) {
            info!(
                event = "core.tiling.rebalance_started",
                display = %rebuilt.display_id,
                remaining = rebuilt.slots.len(),
            );
            let outcome = self.apply_layout(&rebuilt).await;
            if !outcome.success {
                warn!(
                    event = "core.tiling.rebalance_incomplete",
                    display = %rebuilt.display_id,
                    errors = ?outcome.errors,
                );
            }
        }
    }

    async fn apply_layout(&self, state: &TileState) -> TileOutcome {
        let mut positioned = 0;
        let mut errors = Vec::new();
        for (index, slot) in state.slots.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(POSITION_STEP_DELAY).await;
            }
            match self
                .window_system
                .position_window(&slot.terminal_key, &slot.geometry)
            {
                Ok(()) => positioned += 1,
                Err(e) => {
                    warn!(
                        event = "core.tiling.position_failed",
                        terminal_key = %slot.terminal_key,
                        error = %e,
                    );
                    errors.push(format!("{}: {}", slot.terminal_key, e));
                }
            }
        }
        TileOutcome {
            success: positioned == state.slots.len(),
            positioned,
            total: state.slots.len(),
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{DisplayInfo, Rect};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeWindowSystem {
        displays: Vec<DisplayInfo>,
        bounds: Mutex<HashMap<String, Rect>>,
        fail_keys: Vec<String>,
    }

    impl FakeWindowSystem {
        fn new(displays: Vec<DisplayInfo>) -> Self {
            Self {
                displays,
                bounds: Mutex::new(HashMap::new()),
                fail_keys: Vec::new(),
            }
        }
    }

    impl WindowSystem for FakeWindowSystem {
        fn list_displays(&self) -> Result<Vec<DisplayInfo>, WindowError> {
            Ok(self.displays.clone())
        }

        fn window_bounds(&self, terminal_key: &str) -> Option<Rect> {
            self.bounds.lock().unwrap().get(terminal_key).copied()
        }

        fn position_window(&self, terminal_key: &str, bounds: &Rect) -> Result<(), WindowError> {
            if self.fail_keys.iter().any(|k| k == terminal_key) {
                return Err(WindowError::WindowNotFound {
                    key: terminal_key.to_string(),
                });
            }
            self.bounds
                .lock()
                .unwrap()
                .insert(terminal_key.to_string(), *bounds);
            Ok(())
        }

        fn focus_window(&self, _terminal_key: &str) -> Result<(), WindowError> {
            Ok(())
        }

        fn frontmost_terminal(&self) -> Option<jacques_protocol::TerminalIdentity> {
            None
        }
    }

    fn one_display() -> Vec<DisplayInfo> {
        vec![DisplayInfo {
            id: "d1".to_string(),
            work_area: Rect::new(0, 0, 1200, 800),
            is_primary: true,
        }]
    }

    fn pairs(n: usize) -> Vec<(String, String)> {
        (0..n)
            .map(|i| (format!("PID:{}", i + 1), format!("S{}", i + 1)))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_tile_windows_positions_all() {
        let ws = Arc::new(FakeWindowSystem::new(one_display()));
        let coordinator = TilingCoordinator::new(ws.clone());

        let outcome = coordinator.tile_windows(&pairs(3), None).await;
        assert!(outcome.success);
        assert_eq!(outcome.positioned, 3);
        assert_eq!(outcome.total, 3);

        let state = coordinator.states().get_tile_state("d1").unwrap();
        assert_eq!(state.columns_per_row, vec![3]);
        // Windows ended up at their slot geometry.
        for slot in &state.slots {
            assert_eq!(ws.window_bounds(&slot.terminal_key), Some(slot.geometry));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tile_windows_partial_failure() {
        let mut fake = FakeWindowSystem::new(one_display());
        fake.fail_keys = vec!["PID:2".to_string()];
        let coordinator = TilingCoordinator::new(Arc::new(fake));

        let outcome = coordinator.tile_windows(&pairs(3), None).await;
        assert!(!outcome.success);
        assert_eq!(outcome.positioned, 2);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tile_windows_no_displays() {
        let coordinator = TilingCoordinator::new(Arc::new(FakeWindowSystem::new(vec![])));
        let outcome = coordinator.tile_windows(&pairs(2), None).await;
        assert!(!outcome.success);
        assert_eq!(outcome.positioned, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rebalance_on_remove_repositions() {
        let ws = Arc::new(FakeWindowSystem::new(one_display()));
        let coordinator = TilingCoordinator::new(ws.clone());
        coordinator.tile_windows(&pairs(2), None).await;

        coordinator.rebalance_on_remove("S2").await;
        let state = coordinator.states().get_tile_state("d1").unwrap();
        assert_eq!(state.columns_per_row, vec![1]);
        // The survivor now spans the whole work area.
        assert_eq!(
            ws.window_bounds("PID:1"),
            Some(Rect::new(0, 0, 1200, 800))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_maximize_does_not_persist_state() {
        let ws = Arc::new(FakeWindowSystem::new(one_display()));
        let coordinator = TilingCoordinator::new(ws.clone());
        let outcome = coordinator.maximize_window("PID:9", "S9").await;
        assert!(outcome.success);
        assert_eq!(ws.window_bounds("PID:9"), Some(Rect::new(0, 0, 1200, 800)));
        assert!(coordinator.states().get_tile_state("d1").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_display_selection() {
        let displays = vec![
            DisplayInfo {
                id: "d1".to_string(),
                work_area: Rect::new(0, 0, 1200, 800),
                is_primary: true,
            },
            DisplayInfo {
                id: "d2".to_string(),
                work_area: Rect::new(1200, 0, 1000, 700),
                is_primary: false,
            },
        ];
        let coordinator = TilingCoordinator::new(Arc::new(FakeWindowSystem::new(displays)));
        coordinator.tile_windows(&pairs(1), Some("d2")).await;
        assert!(coordinator.states().get_tile_state("d2").is_some());
        assert!(coordinator.states().get_tile_state("d1").is_none());
    }
}
