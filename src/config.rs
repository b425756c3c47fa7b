use std::path::PathBuf;
use std::time::Duration;

use crate::rate_gate::DEFAULT_DELAY;

/// application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// directory uploads are stored in
    pub files_dir: PathBuf,
    /// listen address
    pub host: String,
    /// listen port
    pub port: u16,
    /// minimum time between two progress events of one file
    pub progress_delay: Duration,
    /// maximum upload size in bytes
    pub max_upload_size: usize,
    /// number of tokio worker threads
    pub worker_threads: usize,
    /// cors allowed origins (comma-separated)
    pub cors_origins: Vec<String>,
    /// request rate limit: replenished requests per second
    pub rate_limit_per_second: u64,
    /// request rate limit: burst size
    pub rate_limit_burst: u32,
}

impl Config {
    /// load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        // parse cors origins
        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            files_dir: std::env::var("FILES_DIR")
                .unwrap_or_else(|_| "./downloads".to_string())
                .into(),
            host: std::env::var("HOST")
                .unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            progress_delay: std::env::var("PROGRESS_DELAY_MS")
                .ok()
                .and_then(|d| d.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_DELAY),
            max_upload_size: std::env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10 * 1024 * 1024 * 1024), // 10GB default
            worker_threads: std::env::var("WORKER_THREADS")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(8),
            cors_origins,
            rate_limit_per_second: std::env::var("RATE_LIMIT_PER_SECOND")
                .ok()
                .and_then(|r| r.parse().ok())
                .unwrap_or(2),
            rate_limit_burst: std::env::var("RATE_LIMIT_BURST")
                .ok()
                .and_then(|r| r.parse().ok())
                .unwrap_or(5),
        }
    }
}
