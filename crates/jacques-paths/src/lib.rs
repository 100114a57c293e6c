use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("home directory not found — set $HOME environment variable")]
    HomeNotFound,
}

/// Centralized path construction for the `~/.jacques/` directory layout.
///
/// Single source of truth for every path under `~/.jacques/`. Use `resolve()`
/// in production code and `from_dir()` in tests.
#[derive(Debug, Clone)]
pub struct JacquesPaths {
    jacques_dir: PathBuf,
}

impl JacquesPaths {
    /// Resolve paths from the user's home directory (`~/.jacques`).
    pub fn resolve() -> Result<Self, PathError> {
        let home = dirs::home_dir().ok_or(PathError::HomeNotFound)?;
        Ok(Self {
            jacques_dir: home.join(".jacques"),
        })
    }

    /// Create paths from an explicit base directory. Use in tests.
    pub fn from_dir(jacques_dir: PathBuf) -> Self {
        Self { jacques_dir }
    }

    /// The base `~/.jacques` directory.
    pub fn jacques_dir(&self) -> &Path {
        &self.jacques_dir
    }

    /// Server + notification settings, `~/.jacques/config.json`.
    pub fn config_file(&self) -> PathBuf {
        self.jacques_dir.join("config.json")
    }

    /// Temp file written next to the config for atomic rename.
    pub fn config_tmp_file(&self) -> PathBuf {
        self.jacques_dir.join("config.json.tmp")
    }

    /// Plan documents written by agents, `~/.jacques/plans/`.
    pub fn plans_dir(&self) -> PathBuf {
        self.jacques_dir.join("plans")
    }

    /// Server log directory, `~/.jacques/logs/`.
    pub fn logs_dir(&self) -> PathBuf {
        self.jacques_dir.join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_dir_uses_given_base() {
        let paths = JacquesPaths::from_dir(PathBuf::from("/tmp/jacques-test"));
        assert_eq!(paths.jacques_dir(), Path::new("/tmp/jacques-test"));
        assert_eq!(
            paths.config_file(),
            PathBuf::from("/tmp/jacques-test/config.json")
        );
    }

    #[test]
    fn test_config_tmp_is_sibling_of_config() {
        let paths = JacquesPaths::from_dir(PathBuf::from("/base"));
        assert_eq!(
            paths.config_tmp_file().parent(),
            paths.config_file().parent()
        );
    }

    #[test]
    fn test_plans_dir_under_base() {
        let paths = JacquesPaths::from_dir(PathBuf::from("/base"));
        assert_eq!(paths.plans_dir(), PathBuf::from("/base/plans"));
    }

    #[test]
    fn test_resolve_uses_home() {
        // Only asserts the suffix — the home prefix depends on the environment.
        if let Ok(paths) = JacquesPaths::resolve() {
            assert!(paths.jacques_dir().ends_with(".jacques"));
        }
    }
}
