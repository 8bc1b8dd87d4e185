use std::path::PathBuf;

const DATA_DIR_NAME: &str = "kanadojo";

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub log_level: String,
    /// Daily rolling log files are written here when set.
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        let data_dir = env_string("KANADOJO_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let log_level = env_string("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let file_logs = env_string("ENABLE_FILE_LOGS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let log_dir = file_logs.then(|| {
            env_string("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("logs"))
        });

        Self {
            data_dir,
            log_level,
            log_dir,
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(DATA_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".").join(DATA_DIR_NAME))
}
