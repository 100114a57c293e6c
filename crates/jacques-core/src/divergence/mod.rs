//! Branch divergence tracking.
//!
//! Periodically computes ahead/behind against the default branch plus a
//! working-tree dirty bit for every session that knows its repository and
//! branch. Sessions sharing `(repo_root, branch)` share one ahead/behind
//! query and sessions sharing a cwd share one dirty query, so a dashboard
//! full of panes in the same worktree costs a handful of git calls per
//! cycle. Updates are only broadcast when a value actually changed.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::registry::SessionRegistry;

/// Periodic cycle cadence.
pub const CYCLE_INTERVAL: Duration = Duration::from_secs(30);

/// Debounce applied to on-demand refresh requests.
pub const REFRESH_DEBOUNCE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct DivergenceConfig {
    pub interval: Duration,
    pub debounce: Duration,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        Self {
            interval: CYCLE_INTERVAL,
            debounce: REFRESH_DEBOUNCE,
        }
    }
}

pub struct DivergenceService {
    registry: Arc<SessionRegistry>,
    config: DivergenceConfig,
    /// Overlap suppression: a cycle in flight makes later ones no-ops.
    checking: AtomicBool,
    refresh: Notify,
}

impl DivergenceService {
    pub fn new(registry: Arc<SessionRegistry>, config: DivergenceConfig) -> Arc<Self> {
        Arc::new(Self {
            registry,
            config,
            checking: AtomicBool::new(false),
            refresh: Notify::new(),
        })
    }

    /// Request an out-of-cycle refresh (debounced).
    pub fn request_refresh(&self) {
        self.refresh.notify_one();
    }

    /// One divergence cycle. Overlapping calls return immediately.
    pub async fn run_cycle(&self) {
        if self.checking.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cycle_inner().await;
        self.checking.store(false, Ordering::SeqCst);
    }

    async fn cycle_inner(&self) {
        let sessions: Vec<_> = self
            .registry
            .get_all_sessions()
            .into_iter()
            .filter(|s| s.git_repo_root.is_some() && s.git_branch.is_some())
            .collect();
        if sessions.is_empty() {
            return;
        }
        debug!(event = "core.divergence.cycle_started", sessions = sessions.len());

        // Independent groupings: divergence by (repo, branch), dirtiness by cwd.
        let mut branch_groups: HashMap<(PathBuf, String), Vec<String>> = HashMap::new();
        let mut cwd_groups: HashMap<PathBuf, Vec<String>> = HashMap::new();
        for session in &sessions {
            let repo = session.git_repo_root.clone().unwrap_or_default();
            let branch = session.git_branch.clone().unwrap_or_default();
            branch_groups
                .entry((repo, branch))
                .or_default()
                .push(session.session_id.clone());
            cwd_groups
                .entry(session.cwd.clone())
                .or_default()
                .push(session.session_id.clone());
        }

        // Per-cycle default-branch cache.
        let mut default_cache: HashMap<PathBuf, String> = HashMap::new();
        let mut divergence: HashMap<String, (u32, u32)> = HashMap::new();
        for ((repo, branch), session_ids) in &branch_groups {
            let default = match default_cache.get(repo) {
                Some(default) => default.clone(),
                None => {
                    let default = jacques_git::default_branch(repo).await;
                    default_cache.insert(repo.clone(), default.clone());
                    default
                }
            };
            let counts = if *branch == default {
                (0, 0)
            } else {
                match jacques_git::ahead_behind(repo, branch, &default).await {
                    Ok(counts) => counts,
                    Err(e) => {
                        debug!(
                            event = "core.divergence.ahead_behind_failed",
                            repo = %repo.display(),
                            branch = %branch,
                            error = %e,
                        );
                        continue;
                    }
                }
            };
            for session_id in session_ids {
                divergence.insert(session_id.clone(), counts);
            }
        }

        let mut dirtiness: HashMap<String, bool> = HashMap::new();
        for (cwd, session_ids) in &cwd_groups {
            match jacques_git::is_dirty(cwd).await {
                Ok(dirty) => {
                    for session_id in session_ids {
                        dirtiness.insert(session_id.clone(), dirty);
                    }
                }
                Err(e) => {
                    debug!(
                        event = "core.divergence.dirty_check_failed",
                        cwd = %cwd.display(),
                        error = %e,
                    );
                }
            }
        }

        let mut changed = 0usize;
        for session in &sessions {
            let (ahead, behind) = divergence
                .get(&session.session_id)
                .map(|(a, b)| (Some(*a), Some(*b)))
                .unwrap_or((session.git_ahead, session.git_behind));
            let dirty = dirtiness
                .get(&session.session_id)
                .copied()
                .or(session.git_dirty);
            if self
                .registry
                .update_git_divergence(&session.session_id, ahead, behind, dirty)
            {
                changed += 1;
            }
        }
        debug!(event = "core.divergence.cycle_completed", changed = changed);
    }

    /// Spawn the periodic loop; stops when `cancel` fires.
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(service.config.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!(event = "core.divergence.stopped");
                        break;
                    }
                    _ = interval.tick() => service.run_cycle().await,
                    _ = service.refresh.notified() => {
                        tokio::time::sleep(service.config.debounce).await;
                        service.run_cycle().await;
                    }
                }
            }
        })
    }
}
