use driveway::config::Config;
use std::env;
use std::time::Duration;

// helper to clear env vars
fn clear_env() {
    env::remove_var("FILES_DIR");
    env::remove_var("HOST");
    env::remove_var("PORT");
    env::remove_var("PROGRESS_DELAY_MS");
    env::remove_var("MAX_UPLOAD_SIZE");
    env::remove_var("WORKER_THREADS");
    env::remove_var("CORS_ORIGINS");
    env::remove_var("RATE_LIMIT_PER_SECOND");
    env::remove_var("RATE_LIMIT_BURST");
}

#[test]
fn test_config_behavior() {
    // Run these sequentially to avoid race conditions with environment variables

    // 1. Test Defaults
    clear_env();

    let config = Config::from_env();

    assert_eq!(config.files_dir.to_str().unwrap(), "./downloads");
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.port, 3000);
    assert_eq!(config.progress_delay, Duration::from_millis(1000));
    assert_eq!(config.max_upload_size, 10 * 1024 * 1024 * 1024);
    assert_eq!(config.worker_threads, 8);
    assert_eq!(config.cors_origins.len(), 2);
    assert_eq!(config.rate_limit_per_second, 2);
    assert_eq!(config.rate_limit_burst, 5);

    // 2. Test From Env
    clear_env();

    env::set_var("FILES_DIR", "/tmp/test_files");
    env::set_var("PORT", "9090");
    env::set_var("PROGRESS_DELAY_MS", "250");
    env::set_var("WORKER_THREADS", "4");
    env::set_var("CORS_ORIGINS", "https://drive.example.com, ,");

    let config = Config::from_env();

    assert_eq!(config.files_dir.to_str().unwrap(), "/tmp/test_files");
    assert_eq!(config.port, 9090);
    assert_eq!(config.progress_delay, Duration::from_millis(250));
    assert_eq!(config.worker_threads, 4);
    assert_eq!(config.cors_origins, vec!["https://drive.example.com".to_string()]);

    // 3. Garbage falls back to defaults
    clear_env();

    env::set_var("PROGRESS_DELAY_MS", "soon");
    env::set_var("PORT", "-1");

    let config = Config::from_env();

    assert_eq!(config.progress_delay, Duration::from_millis(1000));
    assert_eq!(config.port, 3000);

    // Cleanup
    clear_env();
}
