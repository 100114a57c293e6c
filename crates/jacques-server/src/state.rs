use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use jacques_core::divergence::DivergenceService;
use jacques_core::launch::SessionLauncher;
use jacques_core::notify::NotificationEngine;
use jacques_core::tiling::TilingCoordinator;
use jacques_core::window::WindowSystem;
use jacques_core::SessionRegistry;
use jacques_protocol::ServerMessage;

/// Shared server state handed to every connection.
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub engine: Arc<NotificationEngine>,
    pub tiling: Arc<TilingCoordinator>,
    pub divergence: Arc<DivergenceService>,
    pub window_system: Arc<dyn WindowSystem>,
    pub launcher: Arc<dyn SessionLauncher>,
    /// True while the startup discovery pass is running.
    scanning: AtomicBool,
    /// Server-held global autocompact toggle.
    autocompact_enabled: AtomicBool,
    /// Terminal keys of connected dashboards; excluded from tiling so a
    /// layout never paves over the pane the user is steering from.
    dashboard_keys: Mutex<HashSet<String>>,
    /// Fan-out channel for messages addressed to every client
    /// (`autocompact_toggled`, `server_status`).
    pub broadcasts: broadcast::Sender<ServerMessage>,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        registry: Arc<SessionRegistry>,
        engine: Arc<NotificationEngine>,
        tiling: Arc<TilingCoordinator>,
        divergence: Arc<DivergenceService>,
        window_system: Arc<dyn WindowSystem>,
        launcher: Arc<dyn SessionLauncher>,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let (broadcasts, _) = broadcast::channel(64);
        Arc::new(Self {
            registry,
            engine,
            tiling,
            divergence,
            window_system,
            launcher,
            scanning: AtomicBool::new(true),
            autocompact_enabled: AtomicBool::new(true),
            dashboard_keys: Mutex::new(HashSet::new()),
            broadcasts,
            shutdown,
        })
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    pub fn set_scanning(&self, scanning: bool) {
        self.scanning.store(scanning, Ordering::SeqCst);
    }

    pub fn autocompact_enabled(&self) -> bool {
        self.autocompact_enabled.load(Ordering::SeqCst)
    }

    /// Set or flip the global autocompact toggle; returns the new value.
    pub fn toggle_autocompact(&self, explicit: Option<bool>) -> bool {
        match explicit {
            Some(value) => {
                self.autocompact_enabled.store(value, Ordering::SeqCst);
                value
            }
            None => !self.autocompact_enabled.fetch_xor(true, Ordering::SeqCst),
        }
    }

    pub fn register_dashboard(&self, terminal_key: &str) {
        self.dashboard_keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(terminal_key.to_string());
    }

    /// Whether a terminal key belongs to a registered dashboard pane.
    pub fn is_dashboard_terminal(&self, terminal_key: &str) -> bool {
        self.dashboard_keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .any(|key| jacques_core::terminal::matches(key, terminal_key))
    }

    /// Broadcast a message to every connected client.
    pub fn broadcast(&self, message: ServerMessage) {
        let _ = self.broadcasts.send(message);
    }

    pub fn server_status(&self) -> ServerMessage {
        ServerMessage::ServerStatus {
            status: "ok".to_string(),
            session_count: self.registry.session_count(),
            scanning: Some(self.is_scanning()),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use jacques_core::divergence::DivergenceConfig;
    use jacques_core::launch::LaunchError;
    use jacques_core::notify::backends::NullNotifierBackend;
    use jacques_core::notify::{NotificationEngine, NotificationSettings};
    use jacques_core::window::NullWindowSystem;
    use jacques_protocol::NotificationCategory;
    use std::path::Path;

    /// Launcher that records calls instead of spawning.
    pub struct RecordingLauncher {
        pub launches: Mutex<Vec<(std::path::PathBuf, bool)>>,
    }

    impl SessionLauncher for RecordingLauncher {
        fn launch(
            &self,
            cwd: &Path,
            dangerously_skip_permissions: bool,
        ) -> Result<u32, LaunchError> {
            self.launches
                .lock()
                .unwrap()
                .push((cwd.to_path_buf(), dangerously_skip_permissions));
            Ok(4242)
        }
    }

    pub fn app_state() -> Arc<AppState> {
        let registry = SessionRegistry::new();
        let mut settings = NotificationSettings::default();
        for category in NotificationCategory::ALL {
            settings.categories.insert(category, true);
        }
        let engine = NotificationEngine::new(None, settings, Arc::new(NullNotifierBackend));
        let window_system: Arc<dyn WindowSystem> = Arc::new(NullWindowSystem);
        let state = AppState::new(
            Arc::clone(&registry),
            engine,
            Arc::new(TilingCoordinator::new(Arc::clone(&window_system))),
            DivergenceService::new(Arc::clone(&registry), DivergenceConfig::default()),
            window_system,
            Arc::new(RecordingLauncher {
                launches: Mutex::new(Vec::new()),
            }),
            CancellationToken::new(),
        );
        state.set_scanning(false);
        state
    }
}
