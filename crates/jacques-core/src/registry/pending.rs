use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

/// Default lifetime of a pending-bypass mark.
pub const PENDING_BYPASS_TTL: Duration = Duration::from_secs(60);

/// Working directories expecting a bypass-permissions session.
///
/// When Jacques launches an agent with `--dangerously-skip-permissions` the
/// flag is marked here by cwd; the next session created in that directory
/// consumes it and starts with `is_bypass = true`, covering the window
/// before the process monitor can observe the command line.
#[derive(Debug)]
pub struct PendingBypass {
    entries: HashMap<String, Instant>,
    ttl: Duration,
}

impl PendingBypass {
    pub fn new() -> Self {
        Self::with_ttl(PENDING_BYPASS_TTL)
    }

    /// Explicit TTL, for tests.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Normalize a cwd for table keys: trailing slashes stripped.
    fn normalize(cwd: &Path) -> String {
        let s = cwd.to_string_lossy();
        let trimmed = s.trim_end_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            trimmed.to_string()
        }
    }

    pub fn mark(&mut self, cwd: &Path) {
        self.entries.insert(Self::normalize(cwd), Instant::now());
    }

    /// Consume the flag for a cwd. Returns true when a live mark existed.
    pub fn consume(&mut self, cwd: &Path) -> bool {
        self.purge_expired();
        self.entries.remove(&Self::normalize(cwd)).is_some()
    }

    fn purge_expired(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, marked| marked.elapsed() < ttl);
    }
}

impl Default for PendingBypass {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_consume_returns_true_once() {
        let mut table = PendingBypass::new();
        table.mark(&PathBuf::from("/p"));
        assert!(table.consume(&PathBuf::from("/p")));
        assert!(!table.consume(&PathBuf::from("/p")));
    }

    #[test]
    fn test_trailing_slash_is_normalized() {
        let mut table = PendingBypass::new();
        table.mark(&PathBuf::from("/p/"));
        assert!(table.consume(&PathBuf::from("/p")));
    }

    #[test]
    fn test_unmarked_cwd_is_false() {
        let mut table = PendingBypass::new();
        assert!(!table.consume(&PathBuf::from("/other")));
    }

    #[test]
    fn test_expired_mark_is_not_consumed() {
        let mut table = PendingBypass::with_ttl(Duration::from_millis(0));
        table.mark(&PathBuf::from("/p"));
        assert!(!table.consume(&PathBuf::from("/p")));
    }

    #[test]
    fn test_root_path_normalizes_to_slash() {
        let mut table = PendingBypass::new();
        table.mark(&PathBuf::from("/"));
        assert!(table.consume(&PathBuf::from("/")));
    }
}
