//! Status CLI command.

use anyhow::Result;
use clap::Args;

use crate::application::Gateway;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, ConnectivityReport};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Resource to probe instead of the configured probe path
    #[arg(long)]
    pub probe_path: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct StatusOutput {
    pub base_url: String,
    pub probe_path: String,
    #[serde(flatten)]
    pub report: ConnectivityReport,
}

const fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        let report = &self.report;
        let mut lines = vec![
            format!("API:           {}", self.base_url),
            format!("Probe:         {}", self.probe_path),
            format!(
                "Credentials:   {}",
                report
                    .credential_kind
                    .map_or_else(|| "none".to_string(), |kind| kind.to_string())
            ),
            format!("Reachable:     {}", yes_no(report.reachable)),
            format!("Authenticated: {}", yes_no(report.authenticated)),
            format!("Latency:       {} ms", report.latency_ms),
        ];
        if let Some(status) = report.status {
            lines.push(format!("HTTP status:   {status}"));
        }
        if let Some(error) = &report.error {
            lines.push(format!("Error:         {error}"));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: StatusArgs, config: Config, json_mode: bool) -> Result<()> {
    let probe_path = args
        .probe_path
        .unwrap_or_else(|| config.api.probe_path.clone());
    let base_url = config.api.base_url.clone();

    let gateway = Gateway::from_env(config)?;
    let report = gateway.test_connectivity(Some(&probe_path)).await;
    gateway.shutdown().await;

    let healthy = report.is_healthy();
    output(
        &StatusOutput {
            base_url,
            probe_path,
            report,
        },
        json_mode,
    );

    if !healthy {
        anyhow::bail!("Connectivity check failed");
    }
    Ok(())
}
