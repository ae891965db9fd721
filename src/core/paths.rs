use std::path::PathBuf;

/// Root data directory. `NEXA_DATA_DIR` overrides the default `~/.nexa`,
/// which keeps tests and parallel instances isolated.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("NEXA_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".nexa")
}

pub fn settings_file() -> PathBuf {
    data_dir().join("config").join("settings.json")
}

pub fn cache_dir() -> PathBuf {
    data_dir().join("cache")
}

pub fn run_dir() -> PathBuf {
    data_dir().join("run")
}
