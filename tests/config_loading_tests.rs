//! 配置加载集成测试

use log_sentinel::error::AppError;
use log_sentinel::ConfigLoader;
use rstest::rstest;
use tempfile::TempDir;

const VALID_YAML: &str = "webhook_url: https://hooks.example.com/services/T000/B000/XXX
monitor_directory: /var/log/app
alert_on_keywords:
  - ERROR
  - CRITICAL
cpu_threshold: 80
";

#[test]
fn test_defaults_applied_to_agent_section() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, VALID_YAML).unwrap();

    let config = ConfigLoader::new(&path).without_env().load().unwrap();

    assert_eq!(config.alert_on_keywords, vec!["ERROR", "CRITICAL"]);
    assert_eq!(config.cpu_threshold, 80.0);
    assert_eq!(config.agent.log_suffix, ".log");
    assert_eq!(config.agent.cold_start_lines, 10);
    assert_eq!(config.agent.check_interval_secs, 10);
    assert!(config.agent.cpu_debounce_secs.is_none());
}

#[rstest]
#[case::missing_webhook("monitor_directory: /tmp\nalert_on_keywords: [ERROR]\ncpu_threshold: 80\n")]
#[case::empty_keywords("webhook_url: https://h.example.com/x\nmonitor_directory: /tmp\nalert_on_keywords: []\ncpu_threshold: 80\n")]
#[case::threshold_over_100("webhook_url: https://h.example.com/x\nmonitor_directory: /tmp\nalert_on_keywords: [ERROR]\ncpu_threshold: 150\n")]
#[case::bad_url("webhook_url: not a url\nmonitor_directory: /tmp\nalert_on_keywords: [ERROR]\ncpu_threshold: 80\n")]
fn test_invalid_configuration_is_config_error(#[case] body: &str) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, body).unwrap();

    let err = ConfigLoader::new(&path).without_env().load().unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let err = ConfigLoader::new(dir.path().join("absent.yaml"))
        .without_env()
        .load()
        .unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}
