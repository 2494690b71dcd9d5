//! Store path utilities - uses ~/.cache/defstore/<app-hash>/ unless configured

use std::path::{Path, PathBuf};

/// File name of the redb database inside a data directory
pub const STORE_FILE: &str = "store.redb";

/// Get the default data directory for an application.
/// Uses ~/.cache/defstore/<app-hash>/ on Unix, %LOCALAPPDATA%/defstore/<app-hash>/ on Windows.
pub fn default_data_dir(app_name: &str) -> PathBuf {
    let base = if cfg!(windows) {
        std::env::var("LOCALAPPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".")))
    } else {
        dirs::cache_dir().unwrap_or_else(|| {
            // Fallback to ~/.cache
            dirs::home_dir()
                .map(|h| h.join(".cache"))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    };

    base.join("defstore").join(app_dir_name(app_name))
}

/// Database file inside `data_dir`
pub fn store_file(data_dir: &Path) -> PathBuf {
    data_dir.join(STORE_FILE)
}

/// User config file: ~/.config/defstore/config.toml
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("defstore").join("config.toml"))
}

/// Sanitized application name plus a hash of the full name, so distinct
/// apps never share a directory even when their names sanitize alike.
fn app_dir_name(app_name: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    app_name.hash(&mut hasher);
    let hash = hasher.finish();

    let readable = app_name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .take(20)
        .collect::<String>();
    let readable = if readable.is_empty() { "app".to_string() } else { readable };

    format!("{}-{:012x}", readable, hash & 0xffff_ffff_ffff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_dir_deterministic() {
        assert_eq!(app_dir_name("my-app"), app_dir_name("my-app"));
        assert_ne!(app_dir_name("my app"), app_dir_name("my/app"));
    }

    #[test]
    fn test_data_dir_format() {
        let dir = default_data_dir("checkout-ui");
        assert!(dir.to_string_lossy().contains("defstore"));
        assert!(dir.to_string_lossy().contains("checkout-ui"));
    }

    #[test]
    fn test_unprintable_name_falls_back() {
        assert!(app_dir_name("///").starts_with("app-"));
    }

    #[test]
    fn test_store_file_name() {
        assert!(store_file(Path::new("/tmp/x")).ends_with(STORE_FILE));
    }
}
