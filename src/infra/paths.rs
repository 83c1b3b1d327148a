// src/infra/paths.rs — Config path resolution
//
// DUALQA_HOME overrides everything; otherwise config lives in ~/.dualqa/.

use std::path::PathBuf;

fn dualqa_home() -> Option<PathBuf> {
    std::env::var_os("DUALQA_HOME").map(PathBuf::from)
}

/// Configuration directory: $DUALQA_HOME/ or ~/.dualqa/
///
/// Falls back to the working directory when no home directory can be found.
pub fn config_dir() -> PathBuf {
    if let Some(home) = dualqa_home() {
        return home;
    }
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".dualqa"))
        .unwrap_or_else(|| PathBuf::from(".dualqa"))
}

pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}
