// src/infra/paths.rs — Config and credential locations
//
// All paths respect the KINDRED_HOME environment variable for isolation.
// When KINDRED_HOME is set, config and saved keys live under that directory.
// When unset, they live under ~/.kindred/.

use std::path::PathBuf;

/// Returns the KINDRED_HOME override, if set.
fn kindred_home() -> Option<PathBuf> {
    std::env::var_os("KINDRED_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Configuration directory: $KINDRED_HOME/ or ~/.kindred/
pub fn config_dir() -> PathBuf {
    if let Some(home) = kindred_home() {
        return home;
    }
    dirs_home().join(".kindred")
}

/// Home directory; the working directory if none can be determined.
pub fn dirs_home() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Saved API keys, one `<provider>.key` file each.
pub fn credentials_dir() -> PathBuf {
    config_dir().join("credentials")
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

