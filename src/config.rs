use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings, read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub history_path: PathBuf,
    pub hooks_dir: Option<PathBuf>,
    pub refresh_interval: Duration,
    pub request_timeout: Duration,
    pub max_connections_per_host: usize,
    pub hook_timeout: Duration,
    pub history_flush_delay: Duration,
    pub history_retention_days: i64,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        let database_path = std::env::var("DATABASE_PATH").unwrap_or_else(|_| "statusbar.db".into());
        let history_path = std::env::var("HISTORY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("statusbar-history.json"));
        let hooks_dir = std::env::var("HOOKS_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Config {
            database_path,
            history_path,
            hooks_dir,
            refresh_interval: Duration::from_secs(env_parse("REFRESH_INTERVAL_SECONDS").unwrap_or(120u64).max(15)),
            request_timeout: Duration::from_secs(env_parse("REQUEST_TIMEOUT_SECONDS").unwrap_or(15u64).clamp(1, 120)),
            max_connections_per_host: env_parse("MAX_CONNECTIONS_PER_HOST").unwrap_or(6usize).max(1),
            hook_timeout: Duration::from_secs(env_parse("HOOK_TIMEOUT_SECONDS").unwrap_or(30u64).max(1)),
            history_flush_delay: Duration::from_millis(env_parse("HISTORY_FLUSH_DELAY_MS").unwrap_or(2000u64)),
            history_retention_days: env_parse("HISTORY_RETENTION_DAYS").unwrap_or(30i64).max(1),
        }
    }
}
