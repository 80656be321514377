// Integration tests for logging functionality
// Installs the global subscriber, so everything lives in one test.

use ledgerbridge::infrastructure::logging::{
    sanitize_body, LogConfig, LogFormat, LoggerImpl, RotationPolicy,
};
use std::fs;
use tempfile::TempDir;
use tracing::{info, instrument};

#[instrument]
async fn fetch_invoice(invoice_id: u32) -> u32 {
    info!(invoice_id, "fetching invoice");
    invoice_id
}

#[test]
fn test_file_logging_is_json_and_scrubbed() {
    let temp_dir = TempDir::new().unwrap();

    let config = LogConfig {
        level: "info".to_string(),
        format: LogFormat::Json,
        log_dir: Some(temp_dir.path().to_path_buf()),
        enable_console: false,
        rotation: RotationPolicy::Never,
    };

    let logger = LoggerImpl::init(&config).unwrap();

    let remote_error = sanitize_body(r#"{"error":"expired","access_token":"tok-SECRET-123"}"#);
    info!(error = %remote_error, "remote call failed");

    let runtime = tokio::runtime::Runtime::new().unwrap();
    assert_eq!(runtime.block_on(fetch_invoice(4711)), 4711);

    // Dropping the logger flushes the non-blocking writer.
    drop(logger);

    let contents = fs::read_to_string(temp_dir.path().join("ledgerbridge.log")).unwrap();
    let lines: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).expect("log lines are JSON"))
        .collect();

    assert!(lines
        .iter()
        .any(|line| line["fields"]["message"] == "remote call failed"));
    assert!(lines
        .iter()
        .any(|line| line["span"]["name"] == "fetch_invoice"));
    assert!(!contents.contains("tok-SECRET-123"));
}
