// SPDX-License-Identifier: MPL-2.0
//! Config directory resolution.
//!
//! # Resolution Order
//!
//! 1. Explicit override (tests, `--config` on the demo binary)
//! 2. `LAZY_MOUNT_CONFIG_DIR` environment variable (if set and non-empty)
//! 3. Platform-specific config directory with the app name appended:
//!    - Linux: `~/.config/LazyMount/`
//!    - macOS: `~/Library/Application Support/LazyMount/`
//!    - Windows: `C:\Users\<User>\AppData\Roaming\LazyMount\`

use std::path::PathBuf;

/// Application name used for the platform config directory.
pub const APP_NAME: &str = "LazyMount";

/// Environment variable overriding the config directory.
pub const ENV_CONFIG_DIR: &str = "LAZY_MOUNT_CONFIG_DIR";

/// Returns the config directory, or `None` if it cannot be determined.
#[must_use]
pub fn get_app_config_dir() -> Option<PathBuf> {
    get_app_config_dir_with_override(None)
}

/// Returns the config directory with an optional override taking priority.
#[must_use]
pub fn get_app_config_dir_with_override(override_path: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return Some(path);
    }

    if let Ok(env_path) = std::env::var(ENV_CONFIG_DIR) {
        if !env_path.is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }

    dirs::config_dir().map(|mut path| {
        path.push(APP_NAME);
        path
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to prevent parallel tests from interfering with each other's env vars
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn override_takes_priority() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let custom = PathBuf::from("/tmp/lazy_mount_override");
        assert_eq!(
            get_app_config_dir_with_override(Some(custom.clone())),
            Some(custom)
        );
    }

    #[test]
    fn env_var_is_used_when_set() {
        let _lock = ENV_MUTEX.lock().unwrap();
        std::env::set_var(ENV_CONFIG_DIR, "/tmp/lazy_mount_env");
        let dir = get_app_config_dir();
        std::env::remove_var(ENV_CONFIG_DIR);

        assert_eq!(dir, Some(PathBuf::from("/tmp/lazy_mount_env")));
    }

    #[test]
    fn empty_env_var_falls_back_to_platform_dir() {
        let _lock = ENV_MUTEX.lock().unwrap();
        std::env::set_var(ENV_CONFIG_DIR, "");
        let dir = get_app_config_dir();
        std::env::remove_var(ENV_CONFIG_DIR);

        if let Some(dir) = dir {
            assert!(dir.ends_with(APP_NAME));
        }
    }
}
