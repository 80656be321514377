//! Fetch CLI command.

use anyhow::{Context, Result};
use clap::Args;

use crate::application::Gateway;
use crate::cli::output::{format_stats_table, output, CommandOutput};
use crate::domain::models::{CacheCategory, CacheStatistics, Config, RequestDescriptor};

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Resource path relative to the API base URL
    pub path: String,

    /// Cache category (master_data, transactional, analytical, real_time)
    #[arg(short = 'C', long, default_value = "transactional")]
    pub category: CacheCategory,

    /// Query parameter (format: "key=value"); repeatable
    #[arg(short, long = "param")]
    pub params: Vec<String>,

    /// Skip the cache lookup and fetch from the API
    #[arg(short, long)]
    pub force: bool,

    /// Print cache statistics after the fetch
    #[arg(long)]
    pub stats: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct FetchOutput {
    pub cache_key: String,
    pub category: CacheCategory,
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<CacheStatistics>,
}

impl CommandOutput for FetchOutput {
    fn to_human(&self) -> String {
        let mut out = serde_json::to_string_pretty(&self.data).unwrap_or_default();
        if let Some(stats) = &self.stats {
            out.push_str("\n\nCache statistics:\n");
            out.push_str(&format_stats_table(stats));
        }
        out
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Split `key=value` arguments into pairs
pub fn parse_params(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|param| {
            let (key, value) = param
                .split_once('=')
                .with_context(|| format!("Invalid parameter '{param}': expected key=value"))?;
            if key.is_empty() {
                anyhow::bail!("Invalid parameter '{param}': empty key");
            }
            Ok((key.to_string(), value.to_string()))
        })
        .collect()
}

pub async fn execute(args: FetchArgs, config: Config, json_mode: bool) -> Result<()> {
    let descriptor = RequestDescriptor::get(args.category, args.path)
        .params(parse_params(&args.params)?)
        .force_refresh(args.force)
        .build();
    let cache_key = descriptor.cache_key().to_string();

    let gateway = Gateway::from_env(config)?;
    let result = gateway.fetch(descriptor).await;
    let stats = args.stats.then(|| gateway.cache_stats());
    gateway.shutdown().await;

    let data = result.with_context(|| format!("Failed to fetch {cache_key}"))?;
    output(
        &FetchOutput {
            cache_key,
            category: args.category,
            data,
            stats,
        },
        json_mode,
    );
    Ok(())
}
